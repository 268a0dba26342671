//! Operator-visible activity log
//!
//! Keeps the most recent events in memory for the dashboard, and mirrors
//! each one to tracing.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Mutex;

use chrono::{DateTime, Local};
use tracing::{error, info, warn};

/// Entries kept before the oldest is dropped
pub const ACTIVITY_CAPACITY: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityEntry {
    pub timestamp: DateTime<Local>,
    pub level: ActivityLevel,
    pub message: String,
}

impl fmt::Display for ActivityEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.level {
            ActivityLevel::Info => "INFO",
            ActivityLevel::Warning => "WARN",
            ActivityLevel::Error => "ERROR",
        };
        write!(f, "[{}] {:5} {}", self.timestamp.format("%Y/%m/%d %H:%M:%S"), tag, self.message)
    }
}

/// Bounded, newest-last event log
#[derive(Debug)]
pub struct ActivityLog {
    entries: Mutex<VecDeque<ActivityEntry>>,
    capacity: usize,
}

impl ActivityLog {
    pub fn new() -> Self {
        Self::with_capacity(ACTIVITY_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity: capacity.max(1),
        }
    }

    pub fn info(&self, message: impl Into<String>) {
        self.push(ActivityLevel::Info, message.into());
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.push(ActivityLevel::Warning, message.into());
    }

    pub fn error(&self, message: impl Into<String>) {
        self.push(ActivityLevel::Error, message.into());
    }

    /// Oldest first
    pub fn entries(&self) -> Vec<ActivityEntry> {
        match self.entries.lock() {
            Ok(entries) => entries.iter().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().iter().cloned().collect(),
        }
    }

    fn push(&self, level: ActivityLevel, message: String) {
        match level {
            ActivityLevel::Info => info!("{}", message),
            ActivityLevel::Warning => warn!("{}", message),
            ActivityLevel::Error => error!("{}", message),
        }

        let entry = ActivityEntry {
            timestamp: Local::now(),
            level,
            message,
        };
        let mut entries = match self.entries.lock() {
            Ok(entries) => entries,
            Err(poisoned) => poisoned.into_inner(),
        };
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entries_in_order() {
        let log = ActivityLog::new();
        log.info("loaded a.torrent");
        log.warning("tracker timeout");
        log.error("bad file");

        let entries = log.entries();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].message, "loaded a.torrent");
        assert_eq!(entries[1].level, ActivityLevel::Warning);
        assert!(entries[2].to_string().contains("ERROR bad file"));
    }

    #[test]
    fn test_capacity_drops_oldest() {
        let log = ActivityLog::with_capacity(3);
        for i in 0..5 {
            log.info(format!("event {}", i));
        }

        let messages: Vec<_> = log.entries().into_iter().map(|e| e.message).collect();
        assert_eq!(messages, vec!["event 2", "event 3", "event 4"]);
        assert_eq!(ActivityLog::new().capacity, ACTIVITY_CAPACITY);
    }
}
