use thiserror::Error;

/// Errors surfaced by the scheduler and its data structures.
///
/// Eligibility rejections are not errors; they are returned as
/// [`crate::ScheduleOutcome::Rejected`].
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("heap handle is stale or belongs to another heap")]
    StaleHandle,

    #[error("new key {requested} is greater than current key {current}")]
    KeyIncrease { current: f64, requested: f64 },

    #[error("cannot remove the local peer '{0}'")]
    CannotRemoveSelf(String),

    #[error("clock snapshot fingerprint mismatch: declared {declared}, computed {computed}")]
    FingerprintMismatch { declared: String, computed: String },

    #[error("logical clock counter {0} cannot advance further")]
    CounterOverflow(u64),

    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),
}
