//! Settlement execution: drive the engine over stored events and commit
//! the result as one immutable batch.
//!
//! Synthetic counterparties (the external market, and the fee collector
//! for energy communities) are registered idempotently on first use, so a
//! run never fails just because nobody created them by hand.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::info;

use gridclear_engine::{
    CounterpartyDirectory, NettingOutcome, accumulate_balances, aggregate, check_conservation,
    evaluate, net_balances,
};
use gridclear_types::{
    BalanceEntry, GridclearError, LineId, NettingStats, ParticipantId, ParticipantRole, Policy,
    Result, SettlementBatch, SettlementLine, SettlementWindow, Transfer, constants,
};

use crate::proof::proof_hash;
use crate::store::LedgerStore;

/// The committed result of one settlement run.
#[derive(Debug, Clone, Serialize)]
pub struct SettlementReport {
    pub batch: SettlementBatch,
    /// One line per surviving participant, ascending participant id.
    pub lines: Vec<SettlementLine>,
    pub stats: NettingStats,
    pub transfers: Vec<Transfer>,
}

/// Run the full pipeline and commit the batch.
///
/// # Errors
/// [`GridclearError::NoEventsInWindow`] when the window is empty; any
/// aggregation, evaluation, or conservation error aborts before commit.
pub fn execute_settlement(
    store: &mut LedgerStore,
    policy: &Policy,
    window: SettlementWindow,
) -> Result<SettlementReport> {
    ensure_counterparties(store, policy);
    let (_, outcome) = run_pipeline(store, policy, &window)?;

    let batch = SettlementBatch::new(policy.use_case(), window);
    let description = format!("{} settlement {}", batch.use_case, batch.window);

    let mut lines = Vec::with_capacity(outcome.final_net.len());
    for (participant_id, amount_eur) in &outcome.final_net {
        lines.push(SettlementLine {
            id: LineId::deterministic(batch.id, *participant_id),
            batch_id: batch.id,
            participant_id: *participant_id,
            amount_eur: *amount_eur,
            description: description.clone(),
            proof_hash: proof_hash(batch.id, *participant_id, *amount_eur, &description)?,
        });
    }

    store.commit_batch(batch.clone(), lines.clone())?;
    info!(
        batch = %batch.id,
        use_case = %batch.use_case,
        lines = lines.len(),
        transfers = outcome.transfers.len(),
        efficiency = %outcome.stats.efficiency,
        "settlement executed"
    );

    Ok(SettlementReport {
        batch,
        lines,
        stats: outcome.stats,
        transfers: outcome.transfers,
    })
}

/// Run the pipeline without committing anything.
///
/// Same computation as [`execute_settlement`], same errors; the only
/// store mutation is the idempotent registration of synthetic
/// counterparties.
pub fn preview_netting(
    store: &mut LedgerStore,
    policy: &Policy,
    window: &SettlementWindow,
) -> Result<NettingOutcome> {
    ensure_counterparties(store, policy);
    let (_, outcome) = run_pipeline(store, policy, window)?;
    Ok(outcome)
}

fn ensure_counterparties(store: &mut LedgerStore, policy: &Policy) {
    store.upsert_participant(
        constants::EXTERNAL_MARKET_EXTERNAL_ID,
        "External Market",
        ParticipantRole::ExternalMarket,
    );
    if matches!(policy, Policy::EnergyCommunity(_)) {
        store.upsert_participant(
            constants::FEE_COLLECTOR_EXTERNAL_ID,
            "Community Fee Collector",
            ParticipantRole::FeeCollector,
        );
    }
}

fn run_pipeline(
    store: &LedgerStore,
    policy: &Policy,
    window: &SettlementWindow,
) -> Result<(BTreeMap<ParticipantId, BalanceEntry>, NettingOutcome)> {
    let events = store.events_in_window(window);
    if events.is_empty() {
        return Err(GridclearError::NoEventsInWindow);
    }

    let participants = store.participants();
    let directory = CounterpartyDirectory::from_participants(participants);
    let usage = aggregate(&events, participants, window)?;
    let postings = evaluate(&usage, participants, policy, &directory)?;
    let balances = accumulate_balances(&postings);

    let roles: BTreeMap<ParticipantId, ParticipantRole> =
        participants.values().map(|p| (p.id, p.role)).collect();
    let outcome = net_balances(&balances, &roles, policy.netting());
    check_conservation(&balances, &outcome)?;

    Ok((balances, outcome))
}
