//! Seeder module
//!
//! The set of loaded torrents, their control loop and the operator-facing
//! activity log.

pub mod activity;
pub mod manager;

pub use activity::{ActivityEntry, ActivityLevel, ActivityLog};
pub use manager::{ResourceSummary, SeederManager};
