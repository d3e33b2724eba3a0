use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use peerflow_core::WorkflowDefinition;

use crate::clock::ClockSnapshot;
use crate::error::SchedulerError;

use super::core::Scheduler;
use super::types::{ScheduleOutcome, SchedulerStatus};

/// Thread-safe handle to a [`Scheduler`].
///
/// The whole scheduler is one unit of mutual exclusion: every mutating call
/// holds the write lock for its full duration, so a clock tick and the queue
/// insertion that depends on it are never interleaved with another call.
/// `status` and other reads share the read lock.
#[derive(Clone)]
pub struct SchedulerHandle {
    inner: Arc<RwLock<Scheduler>>,
}

impl SchedulerHandle {
    pub fn new(scheduler: Scheduler) -> Self {
        Self {
            inner: Arc::new(RwLock::new(scheduler)),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Scheduler>, SchedulerError> {
        self.inner
            .read()
            .map_err(|e| SchedulerError::LockPoisoned(e.to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Scheduler>, SchedulerError> {
        self.inner
            .write()
            .map_err(|e| SchedulerError::LockPoisoned(e.to_string()))
    }

    pub fn schedule(
        &self,
        workflow: WorkflowDefinition,
    ) -> Result<ScheduleOutcome, SchedulerError> {
        Ok(self.write()?.schedule(workflow))
    }

    pub fn next_local_item(&self) -> Result<Option<Arc<WorkflowDefinition>>, SchedulerError> {
        Ok(self.write()?.next_local_item())
    }

    pub fn add_peer(&self, peer_id: impl Into<String>) -> Result<bool, SchedulerError> {
        Ok(self.write()?.add_peer(peer_id))
    }

    pub fn remove_peer(&self, peer_id: &str) -> Result<bool, SchedulerError> {
        self.write()?.remove_peer(peer_id)
    }

    pub fn merge_remote_snapshot(
        &self,
        snapshot: ClockSnapshot,
    ) -> Result<String, SchedulerError> {
        self.write()?.merge_remote_snapshot(snapshot)
    }

    pub fn clock_snapshot(&self) -> Result<ClockSnapshot, SchedulerError> {
        Ok(self.read()?.clock_snapshot())
    }

    pub fn status(&self) -> Result<SchedulerStatus, SchedulerError> {
        Ok(self.read()?.status())
    }

    /// Run `f` against the scheduler under the read lock.
    pub fn with_read<R>(&self, f: impl FnOnce(&Scheduler) -> R) -> Result<R, SchedulerError> {
        Ok(f(&*self.read()?))
    }
}
