//! Settlement batch model: windows, batches, lines, transfers, statistics.
//!
//! A batch is one atomic, immutable run of the engine over a bounded time
//! window. Batches and their lines are append-only — corrections are
//! issued as a new batch, never as updates.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{BatchId, GridclearError, LineId, ParticipantId, Result};

// ---------------------------------------------------------------------------
// SettlementWindow
// ---------------------------------------------------------------------------

/// Half-open time window `[start, end)`.
///
/// An event with `timestamp == end` belongs to the *next* batch. This is
/// what prevents double counting across adjacent settlement runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl SettlementWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if end <= start {
            return Err(GridclearError::InvalidWindow {
                reason: format!("end {end} must be after start {start}"),
            });
        }
        Ok(Self { start, end })
    }

    /// Whether `ts` falls inside `[start, end)`.
    #[must_use]
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.start <= ts && ts < self.end
    }
}

impl std::fmt::Display for SettlementWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}, {})",
            self.start.to_rfc3339(),
            self.end.to_rfc3339()
        )
    }
}

// ---------------------------------------------------------------------------
// SettlementBatch / SettlementLine
// ---------------------------------------------------------------------------

/// One immutable settlement batch. Created once, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementBatch {
    pub id: BatchId,
    pub use_case: String,
    pub window: SettlementWindow,
    pub created_at: DateTime<Utc>,
}

impl SettlementBatch {
    #[must_use]
    pub fn new(use_case: impl Into<String>, window: SettlementWindow) -> Self {
        Self {
            id: BatchId::new(),
            use_case: use_case.into(),
            window,
            created_at: Utc::now(),
        }
    }
}

/// One settlement line: a participant's final signed net amount.
///
/// Sign convention: positive ⇒ the participant owes, negative ⇒ the
/// participant is owed. Written once alongside its batch in the same
/// atomic unit of work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementLine {
    pub id: LineId,
    pub batch_id: BatchId,
    pub participant_id: ParticipantId,
    /// Signed, rounded to two decimal places.
    pub amount_eur: Decimal,
    pub description: String,
    /// SHA-256 hex digest over the line's canonical fields
    /// (batch_id, participant_id, amount_eur, description).
    pub proof_hash: String,
}

// ---------------------------------------------------------------------------
// Transfer / NettingStats
// ---------------------------------------------------------------------------

/// A single debtor-to-creditor payment produced by the netting algorithm's
/// pairwise-matching phase. Derived, not always persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub debtor: ParticipantId,
    pub creditor: ParticipantId,
    pub amount_eur: Decimal,
}

/// Statistics bundle for one netting run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NettingStats {
    /// Number of pairwise transfers after netting.
    pub transfer_count: usize,
    /// Sum of |credit| + |debit| across all participants before netting.
    pub gross_volume: Decimal,
    /// Sum of |net| across all participants after netting.
    pub net_volume: Decimal,
    /// `1 − net_volume / gross_volume`; zero when gross volume is zero.
    pub efficiency: Decimal,
}

impl NettingStats {
    #[must_use]
    pub fn compute(transfer_count: usize, gross_volume: Decimal, net_volume: Decimal) -> Self {
        let efficiency = if gross_volume > Decimal::ZERO {
            Decimal::ONE - net_volume / gross_volume
        } else {
            Decimal::ZERO
        };
        Self {
            transfer_count,
            gross_volume,
            net_volume,
            efficiency,
        }
    }
}
