//! Per-peer logical clock with a content-addressed fingerprint.
//!
//! Successive ticks on one peer form a hash chain: every clock records the
//! fingerprint of its predecessor as `parent_fingerprint`. A merge produces a
//! node whose parent is the hash of *both* contributing fingerprints, so the
//! history across peers is a two-parent causal DAG rather than a Merkle tree.
//!
//! Clocks are immutable values. `tick` and `merge` return new clocks.
//!
//! The fingerprint covers the timestamp, so two otherwise identical states
//! taken at different instants differ. Callers that need reproducible
//! fingerprints inject a [`TimeSource`] (see [`FixedTime`]).

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::digest::sha256_hex;
use crate::error::SchedulerError;

/// Source of timestamps for new clock values.
pub trait TimeSource: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTime;

impl TimeSource for SystemTime {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Always returns the same instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedTime(pub DateTime<Utc>);

impl TimeSource for FixedTime {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleClock {
    owner_peer_id: String,
    counter: u64,
    parent_fingerprint: Option<String>,
    timestamp: DateTime<Utc>,
}

impl MerkleClock {
    /// A fresh clock at counter 0, stamped with the wall clock.
    pub fn new(owner_peer_id: impl Into<String>) -> Self {
        Self::at(owner_peer_id, Utc::now())
    }

    /// A fresh clock at counter 0 with an explicit timestamp.
    pub fn at(owner_peer_id: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self::from_parts(owner_peer_id, 0, None, timestamp)
    }

    pub fn from_parts(
        owner_peer_id: impl Into<String>,
        counter: u64,
        parent_fingerprint: Option<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            owner_peer_id: owner_peer_id.into(),
            counter,
            parent_fingerprint,
            timestamp,
        }
    }

    pub fn owner_peer_id(&self) -> &str {
        &self.owner_peer_id
    }

    pub fn counter(&self) -> u64 {
        self.counter
    }

    pub fn parent_fingerprint(&self) -> Option<&str> {
        self.parent_fingerprint.as_deref()
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Hex SHA-256 over `(owner_peer_id, counter, parent_fingerprint, timestamp)`.
    pub fn fingerprint(&self) -> String {
        // Owner is length-prefixed so no choice of id can collide with the
        // separator. Parent is either a hex digest or "-".
        let canonical = format!(
            "{}:{}:{}:{}:{}",
            self.owner_peer_id.len(),
            self.owner_peer_id,
            self.counter,
            self.parent_fingerprint.as_deref().unwrap_or("-"),
            self.timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true),
        );
        sha256_hex(canonical)
    }

    /// Next clock in this peer's chain, stamped with the wall clock.
    pub fn tick(&self) -> Result<Self, SchedulerError> {
        self.tick_at(Utc::now())
    }

    /// Fails with [`SchedulerError::CounterOverflow`] at `u64::MAX`.
    pub fn tick_at(&self, timestamp: DateTime<Utc>) -> Result<Self, SchedulerError> {
        Ok(Self {
            owner_peer_id: self.owner_peer_id.clone(),
            counter: successor(self.counter)?,
            parent_fingerprint: Some(self.fingerprint()),
            timestamp,
        })
    }

    /// Join `self` with a remote clock. The result is owned by `self`'s owner
    /// and dominates both inputs.
    pub fn merge(&self, remote: &MerkleClock) -> Result<Self, SchedulerError> {
        self.merge_at(remote, Utc::now())
    }

    /// Fails with [`SchedulerError::CounterOverflow`] when either counter is
    /// already `u64::MAX`.
    pub fn merge_at(
        &self,
        remote: &MerkleClock,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, SchedulerError> {
        let counter = successor(self.counter.max(remote.counter))?;
        let joined = format!("{}{}", self.fingerprint(), remote.fingerprint());
        Ok(Self {
            owner_peer_id: self.owner_peer_id.clone(),
            counter,
            parent_fingerprint: Some(sha256_hex(joined)),
            timestamp,
        })
    }

    /// Whether `self` was produced by ticking `earlier`.
    pub fn chains_to(&self, earlier: &MerkleClock) -> bool {
        self.parent_fingerprint.as_deref() == Some(earlier.fingerprint().as_str())
    }

    /// Serializable record for shipping this clock to other peers.
    pub fn snapshot(&self) -> ClockSnapshot {
        ClockSnapshot {
            owner_peer_id: self.owner_peer_id.clone(),
            counter: self.counter,
            parent_fingerprint: self.parent_fingerprint.clone(),
            timestamp: self.timestamp,
            fingerprint: self.fingerprint(),
        }
    }
}

fn successor(counter: u64) -> Result<u64, SchedulerError> {
    counter
        .checked_add(1)
        .ok_or(SchedulerError::CounterOverflow(counter))
}

/// Wire form of a [`MerkleClock`]. Any structured encoding preserving these
/// five fields is sufficient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockSnapshot {
    pub owner_peer_id: String,
    pub counter: u64,
    pub parent_fingerprint: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub fingerprint: String,
}

impl TryFrom<ClockSnapshot> for MerkleClock {
    type Error = SchedulerError;

    /// Rebuild a clock, rejecting snapshots whose declared fingerprint does
    /// not match their fields.
    fn try_from(snapshot: ClockSnapshot) -> Result<Self, Self::Error> {
        let clock = MerkleClock::from_parts(
            snapshot.owner_peer_id,
            snapshot.counter,
            snapshot.parent_fingerprint,
            snapshot.timestamp,
        );
        let computed = clock.fingerprint();
        if computed != snapshot.fingerprint {
            return Err(SchedulerError::FingerprintMismatch {
                declared: snapshot.fingerprint,
                computed,
            });
        }
        Ok(clock)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
    }

    fn clock(owner: &str, counter: u64) -> MerkleClock {
        MerkleClock::from_parts(owner, counter, None, t0())
    }

    #[test]
    fn new_clock_starts_at_zero() {
        let c = MerkleClock::new("peer1");
        assert_eq!(c.counter(), 0);
        assert_eq!(c.owner_peer_id(), "peer1");
        assert!(c.parent_fingerprint().is_none());
    }

    #[test]
    fn tick_increments_and_chains() {
        let c0 = MerkleClock::at("peer1", t0());
        let c1 = c0.tick_at(t0()).unwrap();
        let c2 = c1.tick_at(t0()).unwrap();

        assert_eq!(c1.counter(), 1);
        assert_eq!(c2.counter(), 2);
        assert!(c1.chains_to(&c0));
        assert!(c2.chains_to(&c1));
        assert!(!c2.chains_to(&c0));
        assert_eq!(c0.counter(), 0, "tick must not mutate the source clock");
    }

    #[test]
    fn fingerprint_is_deterministic() {
        let a = MerkleClock::from_parts("peer1", 7, Some("ab".into()), t0());
        let b = MerkleClock::from_parts("peer1", 7, Some("ab".into()), t0());
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);
    }

    #[test]
    fn fingerprint_changes_with_each_field() {
        let base = MerkleClock::from_parts("peer1", 7, Some("ab".into()), t0());
        let variants = [
            MerkleClock::from_parts("peer2", 7, Some("ab".into()), t0()),
            MerkleClock::from_parts("peer1", 8, Some("ab".into()), t0()),
            MerkleClock::from_parts("peer1", 7, Some("cd".into()), t0()),
            MerkleClock::from_parts("peer1", 7, None, t0()),
            MerkleClock::from_parts(
                "peer1",
                7,
                Some("ab".into()),
                t0() + chrono::Duration::nanoseconds(1),
            ),
        ];
        for v in &variants {
            assert_ne!(base.fingerprint(), v.fingerprint(), "{v:?}");
        }
    }

    #[test]
    fn merge_counter_is_max_plus_one() {
        let a = clock("peer1", 3);
        let b = clock("peer2", 5);
        assert_eq!(a.merge_at(&b, t0()).unwrap().counter(), 6);
        assert_eq!(b.merge_at(&a, t0()).unwrap().counter(), 6);

        let c = clock("peer3", 9);
        assert_eq!(a.merge_at(&c, t0()).unwrap().counter(), 10);
        assert_eq!(a.merge_at(&a, t0()).unwrap().counter(), 4);
    }

    #[test]
    fn merge_keeps_local_owner_and_hashes_both_parents() {
        let a = clock("peer1", 3);
        let b = clock("peer2", 5);
        let m = a.merge_at(&b, t0()).unwrap();

        assert_eq!(m.owner_peer_id(), "peer1");
        let expected = sha256_hex(format!("{}{}", a.fingerprint(), b.fingerprint()));
        assert_eq!(m.parent_fingerprint(), Some(expected.as_str()));
        assert!(!m.chains_to(&a));
    }

    #[test]
    fn merge_parent_depends_on_remote() {
        let a = clock("peer1", 3);
        let with_b = a.merge_at(&clock("peer2", 5), t0()).unwrap();
        let with_c = a.merge_at(&clock("peer3", 5), t0()).unwrap();
        assert_eq!(with_b.counter(), with_c.counter());
        assert_ne!(with_b.parent_fingerprint(), with_c.parent_fingerprint());
    }

    #[test]
    fn counter_at_max_cannot_advance() {
        let top = clock("peer2", u64::MAX);
        let err = top.tick_at(t0()).unwrap_err();
        assert!(matches!(err, SchedulerError::CounterOverflow(u64::MAX)));

        let local = clock("peer1", 3);
        assert!(matches!(
            local.merge_at(&top, t0()),
            Err(SchedulerError::CounterOverflow(u64::MAX))
        ));
        assert!(matches!(
            top.merge_at(&local, t0()),
            Err(SchedulerError::CounterOverflow(_))
        ));

        let near = clock("peer2", u64::MAX - 1);
        assert_eq!(local.merge_at(&near, t0()).unwrap().counter(), u64::MAX);
    }

    #[test]
    fn snapshot_round_trip() {
        let c = MerkleClock::at("peer1", t0()).tick_at(t0()).unwrap();
        let snap = c.snapshot();
        assert_eq!(snap.fingerprint, c.fingerprint());

        let json = serde_json::to_string(&snap).unwrap();
        let decoded: ClockSnapshot = serde_json::from_str(&json).unwrap();
        let rebuilt = MerkleClock::try_from(decoded).unwrap();
        assert_eq!(rebuilt, c);
    }

    #[test]
    fn tampered_snapshot_is_rejected() {
        let mut snap = clock("peer2", 5).snapshot();
        snap.counter = 50;
        let err = MerkleClock::try_from(snap).unwrap_err();
        assert!(matches!(err, SchedulerError::FingerprintMismatch { .. }));
    }

    #[test]
    fn fixed_time_source_is_stable() {
        let source = FixedTime(t0());
        assert_eq!(source.now(), source.now());
        assert!(SystemTime.now() > t0());
    }
}
