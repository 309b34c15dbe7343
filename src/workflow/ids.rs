//! Execution identifiers.

use uuid::Uuid;

/// Generates a globally-unique execution identifier.
pub fn generate_execution_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_ids_are_unique() {
        let ids: HashSet<String> = (0..1000).map(|_| generate_execution_id()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_id_is_uuid() {
        let id = generate_execution_id();
        assert!(Uuid::parse_str(&id).is_ok());
    }
}
