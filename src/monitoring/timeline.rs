//! Execution Timeline
//!
//! Derives step start/end events from an execution record for timing
//! reports and Gantt charts.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::workflow::{StepStatus, WorkflowExecution};

/// Width of the chart area in characters.
const CHART_WIDTH: f64 = 50.0;

/// Type of timeline event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    /// Step started executing
    Started,
    /// Step completed successfully
    Completed,
    /// Step failed
    Failed,
}

/// A single event in the execution timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineEvent {
    /// Name of the step
    pub step: String,
    /// Type of event
    pub event_type: EventType,
    /// When the event occurred
    pub timestamp: DateTime<Utc>,
}

/// Timeline of one execution.
///
/// Steps still running (for example, waiting on an event) have a start
/// event but no end event.
#[derive(Debug, Clone)]
pub struct ExecutionTimeline {
    events: Vec<TimelineEvent>,
    start_time: DateTime<Utc>,
    end_time: Option<DateTime<Utc>>,
}

impl ExecutionTimeline {
    /// Builds the timeline from the step timestamps of an execution.
    pub fn from_execution(execution: &WorkflowExecution) -> Self {
        let mut events = Vec::new();

        for step in &execution.steps {
            let Some(started) = step.start_time else {
                continue;
            };
            events.push(TimelineEvent {
                step: step.name.clone(),
                event_type: EventType::Started,
                timestamp: started,
            });

            let finished = match step.status {
                StepStatus::Completed => Some(EventType::Completed),
                StepStatus::Failed => Some(EventType::Failed),
                _ => None,
            };
            if let (Some(event_type), Some(ended)) = (finished, step.end_time) {
                events.push(TimelineEvent {
                    step: step.name.clone(),
                    event_type,
                    timestamp: ended,
                });
            }
        }

        events.sort_by_key(|event| event.timestamp);

        Self {
            events,
            start_time: execution.start_time,
            end_time: execution.end_time,
        }
    }

    /// Returns all events in time order.
    pub fn get_events(&self) -> &[TimelineEvent] {
        &self.events
    }

    /// Milliseconds from execution start to its end, or to the last event
    /// while it is still running.
    pub fn total_ms(&self) -> i64 {
        let end = self
            .end_time
            .or_else(|| self.events.last().map(|event| event.timestamp))
            .unwrap_or(self.start_time);
        (end - self.start_time).num_milliseconds().max(0)
    }

    /// Generates an ASCII Gantt chart representation.
    ///
    /// Each finished step is a bar placed relative to the execution start.
    /// Unfinished steps are listed without a bar.
    pub fn gantt_chart(&self) -> String {
        let mut output = String::from("Execution Timeline:\n\n");

        let total = self.total_ms();
        let scale = if total > 0 {
            CHART_WIDTH / total as f64
        } else {
            0.0
        };

        let mut spans: Vec<(String, i64, Option<i64>)> = Vec::new();
        for event in &self.events {
            let offset = self.offset_ms(event.timestamp);
            match event.event_type {
                EventType::Started => spans.push((event.step.clone(), offset, None)),
                EventType::Completed | EventType::Failed => {
                    if let Some(span) = spans.iter_mut().find(|(step, _, _)| *step == event.step) {
                        span.2 = Some(offset);
                    }
                }
            }
        }

        for (step, start, end) in spans {
            match end {
                Some(end) => {
                    // steps written after the execution ended would run past the chart
                    let start_pos = ((start as f64 * scale) as usize).min(CHART_WIDTH as usize - 1);
                    let width = (((end - start) as f64 * scale).max(1.0) as usize)
                        .min(CHART_WIDTH as usize - start_pos);

                    let mut bar = " ".repeat(start_pos);
                    bar.push_str(&"#".repeat(width));

                    output.push_str(&format!(
                        "{} |{:<pad$}| ({} ms)\n",
                        truncate(&step, 16),
                        bar,
                        end - start,
                        pad = CHART_WIDTH as usize + 1
                    ));
                }
                None => {
                    output.push_str(&format!("{} | (still running)\n", truncate(&step, 16)));
                }
            }
        }

        output.push_str(&format!("\nTotal: {} ms\n", total));
        output
    }

    /// Returns durations of finished steps in milliseconds.
    pub fn get_durations(&self) -> HashMap<String, i64> {
        let mut starts: HashMap<&str, DateTime<Utc>> = HashMap::new();
        let mut durations = HashMap::new();

        for event in &self.events {
            match event.event_type {
                EventType::Started => {
                    starts.insert(&event.step, event.timestamp);
                }
                EventType::Completed | EventType::Failed => {
                    if let Some(start) = starts.get(event.step.as_str()) {
                        durations.insert(
                            event.step.clone(),
                            (event.timestamp - *start).num_milliseconds(),
                        );
                    }
                }
            }
        }

        durations
    }

    fn offset_ms(&self, at: DateTime<Utc>) -> i64 {
        (at - self.start_time).num_milliseconds().max(0)
    }
}

/// Pads or truncates a name to exactly `max_len` characters.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        format!("{:width$}", s, width = max_len)
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::{ErrorInfo, WorkflowStatus};
    use chrono::Duration;
    use serde_json::json;

    fn execution() -> WorkflowExecution {
        let mut execution = WorkflowExecution::new("e1", "demo", json!({}), 3, None);
        let t0 = execution.start_time;

        let fetch = execution.step_entry("fetch");
        fetch.begin(None);
        fetch.complete(json!(1));
        fetch.start_time = Some(t0);
        fetch.end_time = Some(t0 + Duration::milliseconds(100));

        let charge = execution.step_entry("charge");
        charge.begin(None);
        charge.fail(ErrorInfo::new("declined"));
        charge.start_time = Some(t0 + Duration::milliseconds(100));
        charge.end_time = Some(t0 + Duration::milliseconds(300));

        let wait = execution.step_entry("approval");
        wait.begin(Some(json!({})));
        wait.start_time = Some(t0 + Duration::milliseconds(300));

        execution
    }

    #[test]
    fn test_events_from_steps() {
        let timeline = ExecutionTimeline::from_execution(&execution());
        let kinds: Vec<EventType> = timeline.get_events().iter().map(|e| e.event_type).collect();

        assert_eq!(
            kinds,
            vec![
                EventType::Started,
                EventType::Completed,
                EventType::Started,
                EventType::Failed,
                EventType::Started,
            ]
        );
    }

    #[test]
    fn test_get_durations() {
        let durations = ExecutionTimeline::from_execution(&execution()).get_durations();
        assert_eq!(durations.get("fetch"), Some(&100));
        assert_eq!(durations.get("charge"), Some(&200));
        assert!(!durations.contains_key("approval"));
    }

    #[test]
    fn test_total_uses_end_time() {
        let mut record = execution();
        record.end_time = Some(record.start_time + Duration::milliseconds(1_000));
        record.status = WorkflowStatus::Failed;

        assert_eq!(ExecutionTimeline::from_execution(&record).total_ms(), 1_000);
    }

    #[test]
    fn test_gantt_chart_generation() {
        let chart = ExecutionTimeline::from_execution(&execution()).gantt_chart();

        assert!(chart.contains("Execution Timeline"));
        assert!(chart.contains("fetch"));
        assert!(chart.contains("(100 ms)"));
        assert!(chart.contains("(still running)"));
        assert!(chart.contains("Total: 300 ms"));
    }

    #[test]
    fn test_late_steps_stay_inside_chart() {
        let mut record = execution();
        let t0 = record.start_time;
        record.end_time = Some(t0 + Duration::milliseconds(100));

        let late = record.step_entry("late");
        late.begin(None);
        late.complete(json!(null));
        late.start_time = Some(t0 + Duration::milliseconds(5_000));
        late.end_time = Some(t0 + Duration::milliseconds(60_000));

        let chart = ExecutionTimeline::from_execution(&record).gantt_chart();
        for line in chart.lines().filter(|line| line.contains("ms)")) {
            let bar = line.split('|').nth(1).unwrap();
            assert_eq!(bar.chars().count(), CHART_WIDTH as usize + 1, "{}", line);
        }
        assert!(chart.contains("(55000 ms)"));
    }

    #[test]
    fn test_empty_execution() {
        let record = WorkflowExecution::new("e1", "demo", json!({}), 3, None);
        let timeline = ExecutionTimeline::from_execution(&record);

        assert!(timeline.get_events().is_empty());
        assert!(timeline.get_durations().is_empty());
        assert_eq!(timeline.total_ms(), 0);
        assert!(timeline.gantt_chart().contains("Total: 0 ms"));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("abc", 5), "abc  ");
        assert_eq!(truncate("abcdefgh", 6), "abc...");
    }
}
