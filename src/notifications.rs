//! Read/unread state of notifications, owned in one place.
//!
//! Screens query and update the tracker instead of handing read lists to
//! each other.

use std::collections::HashSet;

use serde_json::Value;

use crate::{Record, schema::id_to_path};

#[derive(Debug, Default, Clone)]
pub struct ReadTracker {
    read: HashSet<String>,
}

impl ReadTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the notification was previously unread.
    pub fn mark_read(&mut self, id: &str) -> bool {
        self.read.insert(id.to_string())
    }

    pub fn mark_unread(&mut self, id: &str) -> bool {
        self.read.remove(id)
    }

    pub fn is_read(&self, id: &str) -> bool {
        self.read.contains(id)
    }

    fn record_id(record: &Record) -> Option<String> {
        record.get("id").and_then(id_to_path)
    }

    pub fn unread<'r>(&self, notifications: &'r [Record]) -> Vec<&'r Record> {
        notifications
            .iter()
            .filter(|n| Self::record_id(n).is_some_and(|id| !self.is_read(&id)))
            .collect()
    }

    pub fn unread_count(&self, notifications: &[Record]) -> usize {
        self.unread(notifications).len()
    }

    /// Seeds the tracker from records carrying a `leida` flag.
    pub fn sync_from(&mut self, notifications: &[Record]) {
        for record in notifications {
            let Some(Value::Bool(true)) = record.get("leida") else {
                continue;
            };
            if let Some(id) = Self::record_id(record) {
                self.read.insert(id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn notifications() -> Vec<Record> {
        [json!({"id": 1}), json!({"id": 2, "leida": true}), json!({"id": "3"})]
            .into_iter()
            .map(|v| v.as_object().cloned().unwrap())
            .collect()
    }

    #[test]
    fn test_mark_and_count() {
        let list = notifications();
        let mut tracker = ReadTracker::new();
        assert_eq!(tracker.unread_count(&list), 3);
        assert!(tracker.mark_read("1"));
        assert!(!tracker.mark_read("1"));
        assert_eq!(tracker.unread_count(&list), 2);
        assert!(tracker.mark_unread("1"));
        assert!(!tracker.is_read("1"));
    }

    #[test]
    fn test_sync_from_flags() {
        let list = notifications();
        let mut tracker = ReadTracker::new();
        tracker.sync_from(&list);
        assert!(tracker.is_read("2"));
        let unread: Vec<_> = tracker.unread(&list).iter().map(|r| r["id"].clone()).collect();
        assert_eq!(unread, vec![json!(1), json!("3")]);
    }
}
