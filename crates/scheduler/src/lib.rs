//! Decentralized workflow scheduling.
//!
//! Each peer runs a [`Scheduler`]. Incoming workflows are checked for
//! eligibility, the peer's [`MerkleClock`] ticks, and [`assign`] maps the
//! fresh clock fingerprint plus the workflow to exactly one known peer by
//! Hamming distance. Workflows that land on the local peer wait in a
//! [`FibonacciHeap`] until taken in priority order.

pub mod assignment;
pub mod clock;
pub mod digest;
pub mod error;
pub mod heap;
pub mod scheduler;

pub use assignment::{assign, hamming_distance, workflow_fingerprint};
pub use clock::{ClockSnapshot, FixedTime, MerkleClock, SystemTime, TimeSource};
pub use error::SchedulerError;
pub use heap::{FibonacciHeap, HeapHandle};
pub use scheduler::{
    Assignment, ClockStatus, RejectReason, ScheduleOutcome, Scheduler, SchedulerHandle,
    SchedulerStatus,
};
