//! Subsystems. Each owns its tables, its operations and a `schema()` description.

pub mod assessment;
pub mod attachment;
pub mod checklist;
pub mod issue;
pub mod newsletter;
pub mod phase;
pub mod project;
pub mod report;
pub mod scoring;
pub mod session;
pub mod team;
