//! Bilateral netting: balances → rounded nets → pairwise transfers.
//!
//! Rounding happens exactly once, on each participant's net, never on
//! intermediate postings. Thresholding happens after rounding: a net whose
//! magnitude falls below the participant's minimum payout is suppressed
//! rather than settled, and carried separately so conservation can still
//! account for it.
//!
//! Transfer matching is greedy largest-debtor against largest-creditor.
//! This minimizes transfer count well in practice but is not guaranteed
//! optimal; ties break on ascending participant id so reruns produce
//! byte-identical output.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use tracing::debug;

use gridclear_types::{
    BalanceEntry, GridclearError, NettingPolicy, NettingStats, ParticipantId, ParticipantRole,
    Result, Transfer, constants,
};

// ---------------------------------------------------------------------------
// NettingOutcome
// ---------------------------------------------------------------------------

/// The complete result of one netting run.
#[derive(Debug, Clone, Default)]
pub struct NettingOutcome {
    /// Final signed nets that survived thresholding, rounded to cents.
    /// Positive ⇒ owes, negative ⇒ is owed.
    pub final_net: BTreeMap<ParticipantId, Decimal>,
    /// Rounded nets zeroed by the minimum-payout threshold.
    pub suppressed: BTreeMap<ParticipantId, Decimal>,
    /// Pairwise payments settling `final_net`, largest pairs first.
    pub transfers: Vec<Transfer>,
    pub stats: NettingStats,
}

// ---------------------------------------------------------------------------
// net_balances
// ---------------------------------------------------------------------------

/// Net accumulated balances into final amounts and pairwise transfers.
///
/// Participants absent from `roles` fall back to the policy-wide minimum
/// payout. Exact-zero nets appear in neither map.
#[must_use]
pub fn net_balances(
    balances: &BTreeMap<ParticipantId, BalanceEntry>,
    roles: &BTreeMap<ParticipantId, ParticipantRole>,
    policy: &NettingPolicy,
) -> NettingOutcome {
    let strategy = policy.rounding.strategy();

    let mut gross_volume = Decimal::ZERO;
    let mut net_volume = Decimal::ZERO;
    let mut final_net: BTreeMap<ParticipantId, Decimal> = BTreeMap::new();
    let mut suppressed: BTreeMap<ParticipantId, Decimal> = BTreeMap::new();

    for (id, entry) in balances {
        gross_volume += entry.gross();

        // The single rounding step of the pipeline.
        let rounded = entry.net().round_dp_with_strategy(constants::AMOUNT_SCALE, strategy);
        if rounded.is_zero() {
            continue;
        }
        net_volume += rounded.abs();

        let threshold = roles
            .get(id)
            .map_or(policy.min_payout_eur, |role| policy.min_payout_for(*role));
        if rounded.abs() < threshold {
            debug!(participant = %id, net = %rounded, %threshold, "net below minimum payout, suppressed");
            suppressed.insert(*id, rounded);
        } else {
            final_net.insert(*id, rounded);
        }
    }

    let transfers = match_transfers(&final_net);
    let stats = NettingStats::compute(transfers.len(), gross_volume, net_volume);

    NettingOutcome {
        final_net,
        suppressed,
        transfers,
        stats,
    }
}

/// Greedy pairwise matching over the surviving nets.
fn match_transfers(final_net: &BTreeMap<ParticipantId, Decimal>) -> Vec<Transfer> {
    let mut debtors: Vec<(ParticipantId, Decimal)> = Vec::new();
    let mut creditors: Vec<(ParticipantId, Decimal)> = Vec::new();
    for (id, net) in final_net {
        if *net > Decimal::ZERO {
            debtors.push((*id, *net));
        } else {
            creditors.push((*id, -*net));
        }
    }

    // Largest magnitude first; ascending participant id on ties.
    let by_magnitude = |a: &(ParticipantId, Decimal), b: &(ParticipantId, Decimal)| {
        b.1.cmp(&a.1).then(a.0.cmp(&b.0))
    };
    debtors.sort_by(by_magnitude);
    creditors.sort_by(by_magnitude);

    let mut transfers = Vec::new();
    let mut di = 0;
    let mut ci = 0;
    while di < debtors.len() && ci < creditors.len() {
        let amount = debtors[di].1.min(creditors[ci].1);
        if amount > Decimal::ZERO {
            transfers.push(Transfer {
                debtor: debtors[di].0,
                creditor: creditors[ci].0,
                amount_eur: amount,
            });
        }
        debtors[di].1 -= amount;
        creditors[ci].1 -= amount;
        if debtors[di].1.is_zero() {
            di += 1;
        }
        if creditors[ci].1.is_zero() {
            ci += 1;
        }
    }

    transfers
}

// ---------------------------------------------------------------------------
// check_conservation
// ---------------------------------------------------------------------------

/// Verify that rounding and thresholding did not create or destroy value.
///
/// The sum of final nets plus suppressed nets must match the exact
/// posting-implied sum within one rounding bound per participant.
///
/// # Errors
/// [`GridclearError::ConservationViolation`] when the drift exceeds the
/// tolerance.
pub fn check_conservation(
    balances: &BTreeMap<ParticipantId, BalanceEntry>,
    outcome: &NettingOutcome,
) -> Result<()> {
    let expected: Decimal = balances.values().map(BalanceEntry::net).sum();
    let actual: Decimal =
        outcome.final_net.values().sum::<Decimal>() + outcome.suppressed.values().sum::<Decimal>();
    let tolerance = constants::PER_LINE_ROUNDING_BOUND * Decimal::from(balances.len());

    if (actual - expected).abs() > tolerance {
        return Err(GridclearError::ConservationViolation {
            expected,
            actual,
            tolerance,
        });
    }
    Ok(())
}
