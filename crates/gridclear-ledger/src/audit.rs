//! Read-only audit over committed batches.
//!
//! An audit never mutates the ledger and never fails on a bad hash: a
//! proof mismatch is reported per line as `is_verified = false`, because
//! committed batches are immutable and cannot be repaired in place. The
//! audit stays resilient to reference drift too: a line whose participant
//! is no longer registered still appears, flagged with a placeholder name.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::warn;

use gridclear_types::{
    BatchId, EnergyUnit, EventKind, LineId, ParticipantId, ParticipantRole, Result,
    SettlementWindow, UsageEvent, constants,
};

use crate::proof::verify_line;
use crate::store::LedgerStore;

/// One audited settlement line.
#[derive(Debug, Clone, Serialize)]
pub struct AuditLine {
    pub line_id: LineId,
    pub participant_id: ParticipantId,
    pub participant_name: String,
    pub participant_role: Option<ParticipantRole>,
    pub amount_eur: Decimal,
    pub description: String,
    pub proof_hash: String,
    /// Whether the recomputed proof hash matches the stored one.
    pub is_verified: bool,
    /// Plain-language reading of the amount, present when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

/// The full audit payload for one batch.
#[derive(Debug, Clone, Serialize)]
pub struct AuditReport {
    pub batch_id: BatchId,
    pub use_case: String,
    pub window: SettlementWindow,
    pub created_at: DateTime<Utc>,
    /// True iff every line's proof hash verified.
    pub all_verified: bool,
    pub lines: Vec<AuditLine>,
}

/// Audit a committed batch: re-derive every line's proof hash and compare.
///
/// # Errors
/// [`gridclear_types::GridclearError::BatchNotFound`] if no such batch was
/// committed. Hash mismatches are findings, not errors.
pub fn audit_batch(store: &LedgerStore, batch_id: BatchId, explain: bool) -> Result<AuditReport> {
    let batch = store.batch(batch_id)?;
    let lines = store.lines_for_batch(batch_id)?;
    let summaries = if explain {
        summarize_window(&store.events_in_window(&batch.window))
    } else {
        BTreeMap::new()
    };

    let mut audited = Vec::with_capacity(lines.len());
    let mut all_verified = true;
    for line in lines {
        let is_verified = verify_line(line);
        if !is_verified {
            warn!(line = %line.id, participant = %line.participant_id, "proof hash mismatch");
            all_verified = false;
        }

        let (participant_name, participant_role) = match store.participant(line.participant_id) {
            Ok(p) => (p.name.clone(), Some(p.role)),
            Err(_) => ("unknown participant".to_string(), None),
        };

        audited.push(AuditLine {
            line_id: line.id,
            participant_id: line.participant_id,
            participant_name,
            participant_role,
            amount_eur: line.amount_eur,
            description: line.description.clone(),
            proof_hash: line.proof_hash.clone(),
            is_verified,
            explanation: explain
                .then(|| explain_line(summaries.get(&line.participant_id), line.amount_eur)),
        });
    }

    Ok(AuditReport {
        batch_id,
        use_case: batch.use_case.clone(),
        window: batch.window,
        created_at: batch.created_at,
        all_verified,
        lines: audited,
    })
}

/// Per-participant activity totals over the batch window, recomputed from
/// stored events. Tolerant by construction: events for unregistered
/// participants still count here.
#[derive(Debug, Default)]
struct WindowSummary {
    local_kwh: Decimal,
    grid_kwh: Decimal,
    generated_kwh: Decimal,
    fees_eur: Decimal,
}

fn summarize_window(events: &[UsageEvent]) -> BTreeMap<ParticipantId, WindowSummary> {
    let mut summaries: BTreeMap<ParticipantId, WindowSummary> = BTreeMap::new();
    for event in events {
        let summary = summaries.entry(event.participant_id).or_default();
        if event.unit == EnergyUnit::Eur {
            summary.fees_eur += event.quantity;
            continue;
        }
        match event.kind {
            EventKind::Consumption => {
                if event.bucket().is_local() {
                    summary.local_kwh += event.quantity;
                } else {
                    summary.grid_kwh += event.quantity;
                }
            }
            EventKind::Generation
            | EventKind::Production
            | EventKind::GridFeed
            | EventKind::BatteryDischarge
            | EventKind::VppSale => {
                summary.generated_kwh += event.quantity;
            }
            EventKind::BaseFee | EventKind::BatteryCharge => {}
        }
    }
    summaries
}

/// Positive amounts are owed by the participant, negative are owed to
/// them; the wording follows that convention.
fn explain_line(summary: Option<&WindowSummary>, amount_eur: Decimal) -> String {
    let mut rescaled = amount_eur;
    rescaled.rescale(constants::AMOUNT_SCALE);
    let verdict = if rescaled > Decimal::ZERO {
        format!("Pays {rescaled} EUR.")
    } else if rescaled < Decimal::ZERO {
        format!("Receives {} EUR.", -rescaled)
    } else {
        "Settled (0 EUR).".to_string()
    };

    let mut parts = Vec::new();
    if let Some(s) = summary {
        if s.local_kwh > Decimal::ZERO {
            parts.push(format!("consumed {} kWh from local sources", s.local_kwh));
        }
        if s.grid_kwh > Decimal::ZERO {
            parts.push(format!("consumed {} kWh from the grid", s.grid_kwh));
        }
        if s.generated_kwh > Decimal::ZERO {
            parts.push(format!("generated or exported {} kWh", s.generated_kwh));
        }
        if s.fees_eur > Decimal::ZERO {
            parts.push(format!("was charged {} EUR in fees", s.fees_eur));
        }
    }
    if parts.is_empty() {
        verdict
    } else {
        format!("Participant {}. {verdict}", parts.join(", "))
    }
}
