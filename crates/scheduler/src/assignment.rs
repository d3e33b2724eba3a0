//! Deterministic workflow → peer assignment.
//!
//! Every peer computes the same answer from the same inputs, so no
//! coordinator is needed: the workflow and the current clock fingerprint are
//! hashed together and the peer whose own hash is nearest in Hamming distance
//! wins. Ties go to the lexicographically smallest peer id.

use chrono::SecondsFormat;
use peerflow_core::WorkflowDefinition;

use crate::digest::sha256_hex;

/// Content hash identifying a workflow for assignment purposes.
pub fn workflow_fingerprint(workflow: &WorkflowDefinition) -> String {
    sha256_hex(format!(
        "{}:{}:{}",
        workflow.id,
        workflow.name,
        workflow
            .created_at
            .to_rfc3339_opts(SecondsFormat::Nanos, true)
    ))
}

/// Number of differing bits between two equal-length hex strings.
///
/// # Panics
///
/// If the operands differ in length or contain non-hex characters. Both are
/// caller errors: digests handled here are always fixed-width SHA-256 hex.
pub fn hamming_distance(a: &str, b: &str) -> u32 {
    assert_eq!(
        a.len(),
        b.len(),
        "hamming_distance operands must have equal length"
    );
    a.chars()
        .zip(b.chars())
        .map(|(x, y)| {
            let x = x.to_digit(16).expect("hamming_distance operand is not hex");
            let y = y.to_digit(16).expect("hamming_distance operand is not hex");
            (x ^ y).count_ones()
        })
        .sum()
}

/// Pick the peer responsible for `workflow` under `clock_fingerprint`.
///
/// Returns `None` only when `peers` is empty. The result does not depend on
/// the iteration order of `peers`.
pub fn assign<'a, I>(
    clock_fingerprint: &str,
    workflow: &WorkflowDefinition,
    peers: I,
) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let combined = sha256_hex(format!(
        "{}:{}",
        clock_fingerprint,
        workflow_fingerprint(workflow)
    ));
    peers
        .into_iter()
        .map(|peer| (hamming_distance(&combined, &sha256_hex(peer)), peer))
        .min()
        .map(|(_, peer)| peer)
}
