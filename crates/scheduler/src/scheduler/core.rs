use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use peerflow_core::{NodeConfig, WorkflowDefinition, WorkflowId};
use tracing::{debug, info, warn};

use crate::assignment::assign;
use crate::clock::{ClockSnapshot, MerkleClock, SystemTime, TimeSource};
use crate::error::SchedulerError;
use crate::heap::FibonacciHeap;

use super::types::{Assignment, ClockStatus, RejectReason, ScheduleOutcome, SchedulerStatus};

/// Decentralized workflow scheduler for one peer.
///
/// Owns the peer's logical clock and a priority queue of workflows assigned
/// to it. Every accepted workflow ticks the clock, and the fresh clock
/// fingerprint decides which known peer is responsible.
pub struct Scheduler {
    self_id: String,
    /// Always contains `self_id`.
    known_peers: BTreeSet<String>,
    clock: MerkleClock,
    queue: FibonacciHeap<Arc<WorkflowDefinition>>,
    all_items: HashMap<WorkflowId, Arc<WorkflowDefinition>>,
    locally_assigned: HashSet<WorkflowId>,
    external_assignments: HashMap<WorkflowId, String>,
    rejected_count: u64,
    time: Arc<dyn TimeSource>,
}

impl Scheduler {
    /// Create a scheduler for `self_id`, timestamping clocks with the wall clock.
    pub fn new(self_id: impl Into<String>) -> Self {
        Self::with_time_source(self_id, Arc::new(SystemTime))
    }

    /// Create a scheduler whose clock timestamps come from `time`.
    pub fn with_time_source(self_id: impl Into<String>, time: Arc<dyn TimeSource>) -> Self {
        let self_id = self_id.into();
        let clock = MerkleClock::at(self_id.clone(), time.now());
        Self {
            known_peers: BTreeSet::from([self_id.clone()]),
            self_id,
            clock,
            queue: FibonacciHeap::new(),
            all_items: HashMap::new(),
            locally_assigned: HashSet::new(),
            external_assignments: HashMap::new(),
            rejected_count: 0,
            time,
        }
    }

    /// Create a scheduler with the membership described by `config`.
    pub fn from_config(config: &NodeConfig, time: Arc<dyn TimeSource>) -> Self {
        let mut scheduler = Self::with_time_source(config.peer_id.clone(), time);
        for peer in config.effective_peers() {
            scheduler.add_peer(peer);
        }
        scheduler
    }

    // ── Membership ───────────────────────────────────────────

    /// Add a peer. Returns `false` if it was already known.
    pub fn add_peer(&mut self, peer_id: impl Into<String>) -> bool {
        let peer_id = peer_id.into();
        let added = self.known_peers.insert(peer_id.clone());
        if added {
            info!(peer = %peer_id, peers = self.known_peers.len(), "peer added");
        }
        added
    }

    /// Remove a peer. Returns `Ok(false)` if it was not known.
    pub fn remove_peer(&mut self, peer_id: &str) -> Result<bool, SchedulerError> {
        if peer_id == self.self_id {
            return Err(SchedulerError::CannotRemoveSelf(peer_id.to_string()));
        }
        let removed = self.known_peers.remove(peer_id);
        if removed {
            info!(peer = %peer_id, peers = self.known_peers.len(), "peer removed");
        }
        Ok(removed)
    }

    // ── Scheduling ───────────────────────────────────────────

    /// Decide which peer is responsible for `workflow`.
    ///
    /// Ineligible and duplicate workflows are rejected without touching the
    /// clock or the queue. The only state a rejection changes is
    /// `rejected_count` in [`SchedulerStatus`].
    pub fn schedule(&mut self, workflow: WorkflowDefinition) -> ScheduleOutcome {
        if !workflow.is_peer_eligible() {
            return self.reject(workflow, RejectReason::RequiresExternalSystem);
        }
        if self.all_items.contains_key(&workflow.id) {
            return self.reject(workflow, RejectReason::DuplicateId);
        }
        assert!(
            self.known_peers.contains(&self.self_id),
            "local peer missing from known peers"
        );

        self.clock = match self.clock.tick_at(self.time.now()) {
            Ok(next) => next,
            Err(_) => return self.reject(workflow, RejectReason::ClockExhausted),
        };
        let clock_fingerprint = self.clock.fingerprint();
        let responsible = assign(
            &clock_fingerprint,
            &workflow,
            self.known_peers.iter().map(String::as_str),
        )
        .expect("known peers is never empty")
        .to_string();

        let workflow_id = workflow.id.clone();
        let workflow = Arc::new(workflow);
        self.all_items
            .insert(workflow_id.clone(), Arc::clone(&workflow));

        let is_local = responsible == self.self_id;
        let queue_size = if is_local {
            self.queue.insert(workflow.priority, Arc::clone(&workflow));
            self.locally_assigned.insert(workflow_id.clone());
            Some(self.queue.len())
        } else {
            self.external_assignments
                .insert(workflow_id.clone(), responsible.clone());
            None
        };

        debug!(
            workflow = %workflow_id,
            peer = %responsible,
            is_local,
            counter = self.clock.counter(),
            "workflow assigned"
        );

        ScheduleOutcome::Assigned(Assignment {
            workflow_id,
            assigned_peer: responsible,
            is_local,
            queue_size,
            clock_fingerprint,
        })
    }

    fn reject(&mut self, workflow: WorkflowDefinition, reason: RejectReason) -> ScheduleOutcome {
        self.rejected_count += 1;
        warn!(workflow = %workflow.id, %reason, "workflow rejected");
        ScheduleOutcome::Rejected {
            workflow_id: workflow.id,
            reason,
            tags: workflow.tags,
        }
    }

    /// Take the most urgent locally assigned workflow.
    pub fn next_local_item(&mut self) -> Option<Arc<WorkflowDefinition>> {
        self.queue.extract_min().map(|(_, workflow)| workflow)
    }

    /// Look at the most urgent locally assigned workflow without taking it.
    pub fn peek_local_item(&self) -> Option<&WorkflowDefinition> {
        self.queue.find_min().map(|(_, workflow)| &**workflow)
    }

    /// Peer a previously accepted workflow was assigned to.
    pub fn assignment_of(&self, workflow_id: &str) -> Option<&str> {
        if self.locally_assigned.contains(workflow_id) {
            return Some(self.self_id.as_str());
        }
        self.external_assignments.get(workflow_id).map(String::as_str)
    }

    pub fn workflow(&self, workflow_id: &str) -> Option<&WorkflowDefinition> {
        self.all_items.get(workflow_id).map(Arc::as_ref)
    }

    // ── Clock exchange ───────────────────────────────────────

    /// Fold a remote clock into ours. Returns the new fingerprint.
    ///
    /// A remote counter that leaves no successor is refused with
    /// [`SchedulerError::CounterOverflow`] and the local clock is unchanged.
    pub fn merge_remote_clock(&mut self, remote: &MerkleClock) -> Result<String, SchedulerError> {
        self.clock = self.clock.merge_at(remote, self.time.now())?;
        let fingerprint = self.clock.fingerprint();
        info!(
            remote = %remote.owner_peer_id(),
            remote_counter = remote.counter(),
            counter = self.clock.counter(),
            fingerprint = %fingerprint,
            "merged remote clock"
        );
        Ok(fingerprint)
    }

    /// Verify and merge a clock received from another peer.
    pub fn merge_remote_snapshot(
        &mut self,
        snapshot: ClockSnapshot,
    ) -> Result<String, SchedulerError> {
        let remote = MerkleClock::try_from(snapshot)?;
        self.merge_remote_clock(&remote)
    }

    pub fn clock(&self) -> &MerkleClock {
        &self.clock
    }

    pub fn clock_snapshot(&self) -> ClockSnapshot {
        self.clock.snapshot()
    }

    // ── Introspection ────────────────────────────────────────

    pub fn self_id(&self) -> &str {
        &self.self_id
    }

    pub fn known_peers(&self) -> &BTreeSet<String> {
        &self.known_peers
    }

    pub fn status(&self) -> SchedulerStatus {
        SchedulerStatus {
            self_id: self.self_id.clone(),
            peer_count: self.known_peers.len(),
            clock: ClockStatus {
                counter: self.clock.counter(),
                fingerprint: self.clock.fingerprint(),
            },
            queue_size: self.queue.len(),
            locally_assigned_count: self.locally_assigned.len(),
            externally_assigned_count: self.external_assignments.len(),
            total_items: self.all_items.len(),
            rejected_count: self.rejected_count,
        }
    }
}
