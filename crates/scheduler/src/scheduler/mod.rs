//! Peer-local scheduler.
//!
//! Split into focused submodules:
//! - `core`: Scheduler struct, membership, scheduling, and clock exchange
//! - `handle`: `Arc<RwLock<_>>` wrapper serializing concurrent callers
//! - `types`: outcome and status records returned to callers

mod core;
mod handle;
pub mod types;

pub use self::core::Scheduler;
pub use handle::SchedulerHandle;
pub use types::{Assignment, ClockStatus, RejectReason, ScheduleOutcome, SchedulerStatus};
