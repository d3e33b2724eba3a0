//! End-to-end tests for scheduling across a small peer group.
//!
//! Peers are independent `Scheduler` instances; clock exchange goes through
//! JSON snapshots the way an external transport would carry them.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};

use peerflow_core::{WorkflowDefinition, WorkflowTag};
use peerflow_scheduler::{
    assign, ClockSnapshot, FibonacciHeap, FixedTime, MerkleClock, RejectReason, ScheduleOutcome,
    Scheduler, SchedulerHandle,
};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 2, 14, 8, 0, 0).unwrap()
}

fn peer(self_id: &str, others: &[&str]) -> Scheduler {
    let mut s = Scheduler::with_time_source(self_id, Arc::new(FixedTime(t0())));
    for p in others {
        s.add_peer(*p);
    }
    s
}

fn eligible(id: &str, priority: f64) -> WorkflowDefinition {
    WorkflowDefinition::new("integration", priority)
        .with_id(id)
        .with_created_at(t0())
        .with_tag(WorkflowTag::EligibleForLocalExecution)
}

#[test]
fn merkle_clock_merge_scenario() {
    let a = MerkleClock::from_parts("peer1", 3, None, t0());
    let b = MerkleClock::from_parts("peer2", 5, None, t0());
    assert_eq!(a.merge(&b).unwrap().counter(), 6);
}

#[test]
fn heap_extracts_example_keys_in_order() {
    let mut heap = FibonacciHeap::new();
    for key in [5.0, 2.0, 8.0, 1.0] {
        heap.insert(key, ());
    }
    let keys: Vec<f64> = std::iter::from_fn(|| heap.extract_min().map(|(k, _)| k)).collect();
    assert_eq!(keys, vec![1.0, 2.0, 5.0, 8.0]);
}

/// First `{prefix}-{n}` that the scheduler's next tick would assign to `target`.
fn id_landing_on(s: &Scheduler, target: &str, prefix: &str) -> String {
    let next = s.clock().tick_at(t0()).unwrap().fingerprint();
    (0..)
        .map(|n| format!("{prefix}-{n}"))
        .find(|id| {
            let wf = eligible(id, 0.0);
            assign(&next, &wf, s.known_peers().iter().map(String::as_str)) == Some(target)
        })
        .unwrap()
}

#[test]
fn three_peer_priority_scenario() {
    let mut s = peer("peer1", &["peer2", "peer3"]);
    let mut local = Vec::new();
    for p in [2.0, 1.0, 3.0] {
        let id = id_landing_on(&s, "peer1", &format!("wf-{p}"));
        if let ScheduleOutcome::Assigned(a) = s.schedule(eligible(&id, p)) {
            assert!(["peer1", "peer2", "peer3"].contains(&a.assigned_peer.as_str()));
            assert!(a.is_local, "{id} was predicted to stay on peer1");
            local.push(p);
        } else {
            panic!("eligible workflow {id} was rejected");
        }
    }
    assert_eq!(local.len(), 3);

    let drained: Vec<f64> = std::iter::from_fn(|| s.next_local_item())
        .map(|wf| wf.priority)
        .collect();
    assert_eq!(drained, vec![1.0, 2.0, 3.0]);
}

#[test]
fn mixed_assignments_still_drain_in_priority_order() {
    let mut s = peer("peer1", &["peer2", "peer3"]);
    let mut local = Vec::new();
    for i in 0..60 {
        let p = ((i * 37) % 60) as f64;
        let outcome = s.schedule(eligible(&format!("mixed-{i}"), p));
        if outcome.assignment().unwrap().is_local {
            local.push(p);
        }
    }
    assert!(!local.is_empty());
    assert!(local.len() < 60);

    local.sort_by(f64::total_cmp);
    let drained: Vec<f64> = std::iter::from_fn(|| s.next_local_item())
        .map(|wf| wf.priority)
        .collect();
    assert_eq!(drained, local);
}

#[test]
fn external_system_workflow_is_rejected() {
    let mut s = peer("peer1", &["peer2"]);
    let wf = WorkflowDefinition::new("crm-sync", 1.0)
        .with_id("wf-ext")
        .with_tags([WorkflowTag::RequiresExternalSystem, WorkflowTag::DataProcessing]);

    match s.schedule(wf) {
        ScheduleOutcome::Rejected { reason, tags, .. } => {
            assert_eq!(reason, RejectReason::RequiresExternalSystem);
            assert!(tags.contains(&WorkflowTag::RequiresExternalSystem));
        }
        other => panic!("expected rejection, got {other:?}"),
    }
    let status = s.status();
    assert_eq!(status.queue_size, 0);
    assert_eq!(status.locally_assigned_count, 0);
}

#[test]
fn clock_exchange_through_json_snapshots() {
    let mut p1 = peer("peer1", &["peer2"]);
    let mut p2 = peer("peer2", &["peer1"]);

    for i in 0..3 {
        p1.schedule(eligible(&format!("p1-{i}"), 1.0));
    }
    for i in 0..5 {
        p2.schedule(eligible(&format!("p2-{i}"), 1.0));
    }

    let wire = serde_json::to_string(&p2.clock_snapshot()).unwrap();
    let received: ClockSnapshot = serde_json::from_str(&wire).unwrap();
    p1.merge_remote_snapshot(received).unwrap();
    assert_eq!(p1.clock().counter(), 6);
    assert_eq!(p1.clock().owner_peer_id(), "peer1");

    // The merged clock dominates both inputs; the next tick continues from it.
    p1.schedule(eligible("after-merge", 1.0));
    assert_eq!(p1.clock().counter(), 7);
}

#[test]
fn decisions_are_reproducible_from_published_fingerprint() {
    let mut p1 = peer("peer1", &["peer2", "peer3"]);
    let members = ["peer1", "peer2", "peer3"];
    for i in 0..25 {
        let wf = eligible(&format!("wf-{i}"), i as f64);
        let outcome = p1.schedule(wf.clone());
        let decision = outcome.assignment().unwrap();
        let rederived = assign(&decision.clock_fingerprint, &wf, members).unwrap();
        assert_eq!(rederived, decision.assigned_peer);
    }
}

#[test]
fn shared_handle_serves_status_alongside_writers() {
    let handle = SchedulerHandle::new(peer("peer1", &["peer2", "peer3"]));
    std::thread::scope(|s| {
        let writer = handle.clone();
        s.spawn(move || {
            for i in 0..50 {
                writer.schedule(eligible(&format!("wf-{i}"), i as f64)).unwrap();
            }
        });
        let reader = handle.clone();
        s.spawn(move || {
            for _ in 0..50 {
                let status = reader.status().unwrap();
                assert_eq!(status.clock.counter as usize, status.total_items);
            }
        });
    });
    assert_eq!(handle.status().unwrap().total_items, 50);
}
