//! Strongly-typed task name wrapper.

use crate::newtype_string::define_newtype_string;

define_newtype_string! {
    /// Name of a task (one operator instance) in a pipeline.
    ///
    /// Unique within a task graph; used as the key for node state, events and
    /// failure reports.
    pub struct TaskName;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_try_new_rejects_empty() {
        assert!(TaskName::try_new("").is_none());
        assert_eq!(TaskName::try_new("stage_events").unwrap(), "stage_events");
    }

    #[test]
    fn test_deserialize_rejects_empty() {
        let err = serde_yaml::from_str::<TaskName>("''").unwrap_err();
        assert!(err.to_string().contains("TaskName must not be empty"));
    }

    #[test]
    fn test_ordering_is_lexical() {
        let mut names = vec![TaskName::new("load_users"), TaskName::new("create_songs")];
        names.sort();
        assert_eq!(names[0], "create_songs");
    }
}
