//! steprunner CLI Entry Point
//!
//! Inspects execution snapshots written by the file snapshot store.
//!
//! # Usage
//!
//! ```bash
//! # List every execution in the default state directory
//! steprunner
//!
//! # List executions in another directory
//! steprunner /var/lib/steprunner
//!
//! # Only failed executions of one workflow
//! steprunner --status failed --name billing
//!
//! # Show one execution with its steps and timeline
//! steprunner --id 5b0a1c2e-8c1d-4c4f-9f57-2d0f3f1e8a90
//! ```

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use chrono::Utc;
use colored::{ColoredString, Colorize};
use log::{debug, info};

use steprunner::config::{load_config, load_config_or_default, CONFIG_PATH};
use steprunner::execution::ExecutionFilter;
use steprunner::monitoring::ExecutionTimeline;
use steprunner::workflow::{FileSnapshotStore, StepStatus, WorkflowExecution, WorkflowStatus};
use steprunner::{APP_NAME, VERSION};

/// Command-line configuration parsed from arguments.
#[derive(Debug, Default)]
struct Config {
    state_dir: Option<PathBuf>,
    config_path: Option<PathBuf>,
    status: Option<WorkflowStatus>,
    name: Option<String>,
    id: Option<String>,
    verbose: bool,
}

/// Configures the logging system with appropriate formatting.
fn setup_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format(|buf, record| {
            use std::io::Write;

            match record.level() {
                log::Level::Warn | log::Level::Error => {
                    writeln!(buf, "[{}] {}", record.level(), record.args())
                }
                _ => writeln!(buf, "{}", record.args()),
            }
        })
        .init();
}

/// Prints usage information.
fn print_usage() {
    println!("Usage: steprunner [OPTIONS] [STATE_DIR]");
    println!();
    println!("Arguments:");
    println!("  [STATE_DIR]         Snapshot directory (default: state_dir from config)");
    println!();
    println!("Options:");
    println!("  --status STATUS     Only list executions with this status");
    println!("                      (pending, running, completed, failed, cancelled, timed_out)");
    println!("  --name NAME         Only list executions of this workflow");
    println!("  --id ID             Show one execution with its steps and timeline");
    println!("  --config PATH       Engine config file (default: $STEPRUNNER_CONFIG or steprunner.yaml)");
    println!("  --verbose           Enable debug logging");
    println!("  --help              Show this help message");
    println!("  --version           Show version information");
}

/// Returns the value following an option, advancing the cursor.
fn option_value<'a>(args: &'a [String], i: &mut usize, option: &str) -> Result<&'a str, String> {
    *i += 1;
    args.get(*i)
        .map(String::as_str)
        .ok_or_else(|| format!("{} requires an argument", option))
}

/// Parses command-line arguments into a Config struct.
fn parse_arguments(args: &[String]) -> Result<Config, String> {
    let mut config = Config::default();
    let mut i = 1; // Skip program name

    while i < args.len() {
        let arg = &args[i];

        match arg.as_str() {
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("{} {}", APP_NAME, VERSION);
                std::process::exit(0);
            }
            "--verbose" | "-v" => {
                config.verbose = true;
            }
            "--status" => {
                let value = option_value(args, &mut i, "--status")?;
                config.status = Some(
                    WorkflowStatus::parse(value)
                        .ok_or_else(|| format!("Unknown status: {}", value))?,
                );
            }
            "--name" => {
                config.name = Some(option_value(args, &mut i, "--name")?.to_string());
            }
            "--id" => {
                config.id = Some(option_value(args, &mut i, "--id")?.to_string());
            }
            "--config" => {
                config.config_path = Some(PathBuf::from(option_value(args, &mut i, "--config")?));
            }
            arg if arg.starts_with('-') => {
                return Err(format!("Unknown option: {}", arg));
            }
            _ => {
                if config.state_dir.is_some() {
                    return Err(format!("Unexpected argument: {}", arg));
                }
                config.state_dir = Some(PathBuf::from(arg));
            }
        }
        i += 1;
    }

    Ok(config)
}

fn colorize(status: WorkflowStatus) -> ColoredString {
    let label = status.as_str();
    match status {
        WorkflowStatus::Pending => label.normal(),
        WorkflowStatus::Running => label.cyan(),
        WorkflowStatus::Completed => label.green(),
        WorkflowStatus::Failed => label.red(),
        WorkflowStatus::Cancelled => label.yellow(),
        WorkflowStatus::TimedOut => label.magenta(),
    }
}

/// Pads a colored label to `width` visible characters.
fn pad(label: ColoredString, width: usize) -> String {
    let visible = label.chars().count();
    format!("{}{}", label, " ".repeat(width.saturating_sub(visible)))
}

fn colorize_step(status: StepStatus) -> ColoredString {
    let label = status.to_string();
    match status {
        StepStatus::Completed => label.green(),
        StepStatus::Failed => label.red(),
        StepStatus::Running | StepStatus::Retrying => label.cyan(),
        StepStatus::Pending | StepStatus::Cancelled => label.normal(),
    }
}

/// Elapsed time of an execution, up to now if it has not finished.
fn elapsed(execution: &WorkflowExecution) -> String {
    let end = execution.end_time.unwrap_or_else(Utc::now);
    let ms = (end - execution.start_time).num_milliseconds().max(0);
    if ms < 1_000 {
        format!("{}ms", ms)
    } else {
        format!("{:.1}s", ms as f64 / 1_000.0)
    }
}

/// Prints a one-line-per-execution table.
fn print_listing(executions: &[WorkflowExecution]) {
    println!(
        "{:<38} {:<20} {:<10} {:>5}  {:<20} {:>8}",
        "ID", "NAME", "STATUS", "STEPS", "STARTED", "ELAPSED"
    );

    for execution in executions {
        println!(
            "{:<38} {:<20} {} {:>5}  {:<20} {:>8}",
            execution.id,
            execution.name,
            pad(colorize(execution.status), 10),
            execution.len(),
            execution.start_time.format("%Y-%m-%d %H:%M:%S"),
            elapsed(execution)
        );
    }
}

/// Prints one execution in detail.
fn print_execution(execution: &WorkflowExecution) -> Result<(), Box<dyn std::error::Error>> {
    println!("{} {}", "Execution:".bold(), execution.id);
    println!("  Workflow:  {}", execution.name);
    println!("  Status:    {}", colorize(execution.status));
    println!("  Started:   {}", execution.start_time.to_rfc3339());
    if let Some(end) = execution.end_time {
        println!("  Ended:     {}", end.to_rfc3339());
    }
    println!("  Elapsed:   {}", elapsed(execution));
    if let Some(timeout) = execution.timeout {
        println!("  Timeout:   {}ms", timeout);
    }
    println!("  Args:      {}", serde_json::to_string(&execution.args)?);
    if let Some(result) = &execution.result {
        println!("  Result:    {}", serde_json::to_string(result)?);
    }
    if let Some(error) = &execution.error {
        println!("  Error:     {}", error.message.red());
        if let Some(stack) = &error.stack {
            for line in stack.lines() {
                println!("             {}", line);
            }
        }
    }

    println!();
    println!("{}", "Steps:".bold());
    if execution.is_empty() {
        println!("  (none)");
    }
    for step in &execution.steps {
        let duration = step
            .duration_ms()
            .map(|ms| format!("{}ms", ms))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {:<24} {} retries={:<3} {:>8}",
            step.name,
            pad(colorize_step(step.status), 10),
            step.retry_count,
            duration
        );
        if let Some(error) = &step.error {
            println!("    {}", error.message.red());
        }
    }

    println!();
    print!("{}", ExecutionTimeline::from_execution(execution).gantt_chart());
    Ok(())
}

/// Main application entry point.
async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    // Parse arguments
    let config = parse_arguments(&args).map_err(|e| {
        eprintln!("Error: {}", e);
        eprintln!();
        print_usage();
        e
    })?;

    setup_logging(config.verbose);

    let engine_config = match &config.config_path {
        Some(path) => load_config(path)?,
        None => load_config_or_default(&*CONFIG_PATH)?,
    };

    let state_dir = config.state_dir.unwrap_or(engine_config.state_dir);
    debug!("State directory: {}", state_dir.display());
    let store = FileSnapshotStore::new(state_dir);

    if let Some(id) = config.id {
        let execution = store
            .load(&id)
            .await
            .map_err(|e| format!("Could not load execution '{}': {}", id, e))?;
        return print_execution(&execution);
    }

    let filter = ExecutionFilter {
        status: config.status,
        name: config.name,
    };
    let executions: Vec<WorkflowExecution> = store
        .load_all()
        .await?
        .into_iter()
        .filter(|execution| filter.matches(execution))
        .collect();

    if executions.is_empty() {
        info!("No executions found in {}", store.dir().display());
        return Ok(());
    }

    print_listing(&executions);
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!();
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
