//! State module for tracking download task progress
//!
//! Every file download moves through `Pending → Running → {Saved | Skipped | Failed}`.
//! Terminal states are final: there are no retries.

mod task_state;

pub use task_state::TaskState;
