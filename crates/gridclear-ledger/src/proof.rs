//! Settlement-line proof hashes.
//!
//! Each line carries a SHA-256 hex digest over a canonical JSON document of
//! its identifying fields. Canonical means: keys sorted lexicographically,
//! compact separators, and the amount rescaled to exactly two decimal
//! places before stringification. Any re-serialization of the same line
//! yields the same digest; any drift in amount or description does not.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use sha2::{Digest, Sha256};

use gridclear_types::{BatchId, ParticipantId, Result, SettlementLine, constants};

/// Compute the canonical proof hash for one settlement line.
pub fn proof_hash(
    batch_id: BatchId,
    participant_id: ParticipantId,
    amount_eur: Decimal,
    description: &str,
) -> Result<String> {
    let mut amount = amount_eur;
    amount.rescale(constants::AMOUNT_SCALE);

    // BTreeMap gives the sorted key order; serde_json emits it compactly.
    let canonical: BTreeMap<&str, String> = BTreeMap::from([
        ("amount_eur", amount.to_string()),
        ("batch_id", batch_id.0.to_string()),
        ("description", description.to_string()),
        ("participant_id", participant_id.0.to_string()),
    ]);
    let payload = serde_json::to_string(&canonical)?;

    let mut hasher = Sha256::new();
    hasher.update(payload.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Recompute a line's proof hash and compare against the stored one.
///
/// A mismatch is a finding, not an error: committed lines are immutable,
/// so the caller reports `false` rather than failing the audit.
#[must_use]
pub fn verify_line(line: &SettlementLine) -> bool {
    proof_hash(
        line.batch_id,
        line.participant_id,
        line.amount_eur,
        &line.description,
    )
    .map(|recomputed| recomputed == line.proof_hash)
    .unwrap_or(false)
}
