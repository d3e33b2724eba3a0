use std::collections::BTreeSet;

use peerflow_core::{WorkflowId, WorkflowTag};
use serde::Serialize;

/// Why a workflow was not scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// Neither `eligible-for-local-execution` nor `must-execute-locally` is set.
    RequiresExternalSystem,
    /// A workflow with the same id was already accepted.
    DuplicateId,
    /// The local clock counter is at its maximum and cannot tick.
    ClockExhausted,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::RequiresExternalSystem => write!(f, "requires external system"),
            RejectReason::DuplicateId => write!(f, "duplicate workflow id"),
            RejectReason::ClockExhausted => write!(f, "logical clock exhausted"),
        }
    }
}

/// Where an accepted workflow went.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Assignment {
    pub workflow_id: WorkflowId,
    pub assigned_peer: String,
    pub is_local: bool,
    /// Local queue depth after insertion. Only set for local assignments.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_size: Option<usize>,
    /// Fingerprint of the clock the decision was made under. Any peer can
    /// re-derive the same assignment from it.
    pub clock_fingerprint: String,
}

/// Result of [`super::Scheduler::schedule`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ScheduleOutcome {
    Assigned(Assignment),
    Rejected {
        workflow_id: WorkflowId,
        reason: RejectReason,
        tags: BTreeSet<WorkflowTag>,
    },
}

impl ScheduleOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ScheduleOutcome::Assigned(_))
    }

    pub fn assignment(&self) -> Option<&Assignment> {
        match self {
            ScheduleOutcome::Assigned(a) => Some(a),
            ScheduleOutcome::Rejected { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClockStatus {
    pub counter: u64,
    pub fingerprint: String,
}

/// Read-only snapshot for health checks and dashboards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchedulerStatus {
    pub self_id: String,
    pub peer_count: usize,
    pub clock: ClockStatus,
    /// Locally assigned workflows still waiting to be taken.
    pub queue_size: usize,
    /// Workflows ever assigned to this peer.
    pub locally_assigned_count: usize,
    pub externally_assigned_count: usize,
    /// Every accepted workflow, local or external.
    pub total_items: usize,
    pub rejected_count: u64,
}
