//! Policy evaluation: one classified event → zero, one, or two postings.
//!
//! Each use case carries a rule table mapping (event kind, source bucket,
//! participant role) to a priced double-entry posting pair. Price
//! resolution order: the event's own price (if positive), else the policy
//! default, else the use-case constant. EUR-denominated events pass their
//! quantity through as the monetary amount.
//!
//! Counterparties are resolved through an explicit [`CounterpartyDirectory`]
//! passed into every call — the evaluator holds no state of its own.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use tracing::debug;

use gridclear_types::{
    BalanceEntry, EnergyCommunityPolicy, EnergyUnit, EventKind, GridclearError, MieterstromPolicy,
    Participant, ParticipantId, ParticipantRole, Policy, Posting, Result, SourceBucket,
    UnknownSourceTreatment, UsageEvent, constants,
};

use crate::aggregator::{ClassifiedEvent, WindowedUsage};

// ---------------------------------------------------------------------------
// CounterpartyDirectory
// ---------------------------------------------------------------------------

/// Role → participant lookup for the offsetting side of each posting.
///
/// Built per run from the participant set; the first participant per role
/// in stable id order wins. No module-level caches.
#[derive(Debug, Clone, Default)]
pub struct CounterpartyDirectory {
    by_role: BTreeMap<ParticipantRole, ParticipantId>,
}

impl CounterpartyDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a participant set. Iterate in stable id order so the
    /// chosen counterparty per role is deterministic.
    #[must_use]
    pub fn from_participants(participants: &BTreeMap<ParticipantId, Participant>) -> Self {
        let mut dir = Self::new();
        for participant in participants.values() {
            dir.by_role.entry(participant.role).or_insert(participant.id);
        }
        dir
    }

    pub fn insert(&mut self, role: ParticipantRole, id: ParticipantId) {
        self.by_role.insert(role, id);
    }

    #[must_use]
    pub fn get(&self, role: ParticipantRole) -> Option<ParticipantId> {
        self.by_role.get(&role).copied()
    }

    /// Resolve a role or fail the run.
    pub fn require(&self, role: ParticipantRole) -> Result<ParticipantId> {
        self.get(role)
            .ok_or(GridclearError::MissingCounterparty { role })
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// Evaluate every event in the sealed window against the policy's rule
/// table, producing double-entry postings in accumulation order.
///
/// # Errors
/// - [`GridclearError::MissingCounterparty`] if a rule needs a role no
///   participant holds.
/// - [`GridclearError::InvalidEvent`] for events the use case cannot price
///   (e.g. a kWh-denominated base fee in an energy community).
pub fn evaluate(
    usage: &WindowedUsage,
    participants: &BTreeMap<ParticipantId, Participant>,
    policy: &Policy,
    directory: &CounterpartyDirectory,
) -> Result<Vec<Posting>> {
    let mut postings = Vec::new();

    for classified in &usage.events {
        let participant = participants
            .get(&classified.event.participant_id)
            .ok_or(GridclearError::UnknownParticipant(classified.event.participant_id))?;

        // Synthetic counterparties do not originate billable events.
        if matches!(
            participant.role,
            ParticipantRole::ExternalMarket | ParticipantRole::FeeCollector
        ) {
            debug!(participant = %participant.external_id, "skipping event from synthetic counterparty");
            continue;
        }

        match policy {
            Policy::EnergyCommunity(p) => {
                evaluate_energy_community(p, classified, directory, &mut postings)?;
            }
            Policy::Mieterstrom(p) => {
                evaluate_mieterstrom(p, classified, directory, &mut postings)?;
            }
        }
    }

    Ok(postings)
}

fn evaluate_energy_community(
    policy: &EnergyCommunityPolicy,
    classified: &ClassifiedEvent,
    directory: &CounterpartyDirectory,
    postings: &mut Vec<Posting>,
) -> Result<()> {
    let ev = &classified.event;
    let who = ev.participant_id;

    match ev.kind {
        EventKind::Consumption => {
            if classified.bucket.is_local() {
                let amount = monetary_amount(ev, policy.consumer_buy_price);
                let pool = directory.require(ParticipantRole::FeeCollector)?;
                push(postings, who, pool, amount, "local consumption", ev);
                push(
                    postings,
                    who,
                    pool,
                    amount * policy.community_fee_rate,
                    "community fee",
                    ev,
                );
            } else if classified.bucket == SourceBucket::Grid {
                let amount = monetary_amount(ev, constants::FALLBACK_GRID_PRICE_EUR_PER_KWH);
                let market = directory.require(ParticipantRole::ExternalMarket)?;
                push(postings, who, market, amount, "grid consumption", ev);
            } else {
                unclassified_consumption(policy.unknown_source, ev, directory, postings)?;
            }
        }
        EventKind::Generation | EventKind::Production => {
            let amount = monetary_amount(ev, policy.prosumer_sell_price);
            let pool = directory.require(ParticipantRole::FeeCollector)?;
            push(postings, pool, who, amount, "generation", ev);
        }
        EventKind::BatteryDischarge => {
            let amount = monetary_amount(ev, policy.prosumer_sell_price);
            let pool = directory.require(ParticipantRole::FeeCollector)?;
            push(postings, pool, who, amount, "battery discharge", ev);
        }
        EventKind::BatteryCharge => {
            // Energy movement into storage; no monetary effect.
        }
        EventKind::GridFeed => {
            let amount = monetary_amount(ev, policy.grid_feed_price);
            let market = directory.require(ParticipantRole::ExternalMarket)?;
            push(postings, market, who, amount, "grid feed", ev);
        }
        EventKind::VppSale => {
            let amount = monetary_amount(ev, policy.grid_feed_price);
            let market = directory.require(ParticipantRole::ExternalMarket)?;
            push(postings, market, who, amount, "vpp sale", ev);
        }
        EventKind::BaseFee => {
            if ev.unit != EnergyUnit::Eur {
                return Err(GridclearError::InvalidEvent {
                    reason: format!(
                        "base_fee event {} must be EUR-denominated for energy_community",
                        ev.id
                    ),
                });
            }
            let pool = directory.require(ParticipantRole::FeeCollector)?;
            push(postings, who, pool, ev.quantity, "base fee", ev);
        }
    }
    Ok(())
}

fn evaluate_mieterstrom(
    policy: &MieterstromPolicy,
    classified: &ClassifiedEvent,
    directory: &CounterpartyDirectory,
    postings: &mut Vec<Posting>,
) -> Result<()> {
    let ev = &classified.event;
    let who = ev.participant_id;

    match ev.kind {
        EventKind::Consumption => {
            if classified.bucket.is_local() {
                let amount = monetary_amount(ev, policy.tenant_price_per_kwh);
                let landlord = directory.require(ParticipantRole::Landlord)?;
                push(postings, who, landlord, amount, "local consumption", ev);

                let fee = amount * policy.operator_fee_rate;
                if !fee.is_zero() {
                    let operator = directory.require(ParticipantRole::Operator)?;
                    push(postings, landlord, operator, fee, "operator service fee", ev);
                }
            } else if classified.bucket == SourceBucket::Grid {
                let amount = monetary_amount(ev, constants::FALLBACK_GRID_PRICE_EUR_PER_KWH);
                let market = directory.require(ParticipantRole::ExternalMarket)?;
                push(postings, who, market, amount, "grid consumption", ev);
            } else {
                unclassified_consumption(policy.unknown_source, ev, directory, postings)?;
            }
        }
        EventKind::GridFeed | EventKind::VppSale => {
            // Export proceeds from the external market, split between
            // landlord and operator by the configured revenue share.
            let amount = monetary_amount(ev, policy.grid_compensation);
            let market = directory.require(ParticipantRole::ExternalMarket)?;
            let landlord = directory.require(ParticipantRole::Landlord)?;
            let landlord_cut = amount * policy.landlord_revenue_share;
            push(
                postings,
                market,
                landlord,
                landlord_cut,
                "export proceeds (landlord share)",
                ev,
            );
            let operator_cut = amount - landlord_cut;
            if !operator_cut.is_zero() {
                let operator = directory.require(ParticipantRole::Operator)?;
                push(
                    postings,
                    market,
                    operator,
                    operator_cut,
                    "export proceeds (operator share)",
                    ev,
                );
            }
        }
        EventKind::BaseFee => {
            let amount = match ev.unit {
                EnergyUnit::Eur => ev.quantity,
                EnergyUnit::Kwh => ev.quantity * policy.base_fee_per_unit,
            };
            let operator = directory.require(ParticipantRole::Operator)?;
            push(postings, who, operator, amount, "base fee", ev);
        }
        // Self-consumed generation is settled through the tenants'
        // consumption events; storage flows carry no direct price.
        EventKind::Generation
        | EventKind::Production
        | EventKind::BatteryCharge
        | EventKind::BatteryDischarge => {}
    }
    Ok(())
}

fn unclassified_consumption(
    treatment: UnknownSourceTreatment,
    ev: &UsageEvent,
    directory: &CounterpartyDirectory,
    postings: &mut Vec<Posting>,
) -> Result<()> {
    match treatment {
        UnknownSourceTreatment::ExternalMarket => {
            let amount = monetary_amount(ev, constants::FALLBACK_GRID_PRICE_EUR_PER_KWH);
            let market = directory.require(ParticipantRole::ExternalMarket)?;
            push(postings, ev.participant_id, market, amount, "unclassified consumption", ev);
        }
        UnknownSourceTreatment::ZeroPriced => {
            debug!(
                event = %ev.id,
                source = %ev.source,
                "unclassified source zero-priced per policy"
            );
        }
    }
    Ok(())
}

/// Monetary amount of an event: EUR quantities pass through; kWh
/// quantities are priced by the event's own price first, else the rule's
/// default.
fn monetary_amount(ev: &UsageEvent, default_price: Decimal) -> Decimal {
    match ev.unit {
        EnergyUnit::Eur => ev.quantity,
        EnergyUnit::Kwh => {
            let price = match ev.price_eur_per_kwh {
                Some(p) if p > Decimal::ZERO => p,
                _ => default_price,
            };
            ev.quantity * price
        }
    }
}

fn push(
    postings: &mut Vec<Posting>,
    debtor: ParticipantId,
    creditor: ParticipantId,
    amount: Decimal,
    memo: &str,
    ev: &UsageEvent,
) {
    // Zero-value and self-postings net to nothing.
    if amount.is_zero() || debtor == creditor {
        return;
    }
    postings.push(Posting {
        debtor,
        creditor,
        amount_eur: amount,
        memo: memo.to_string(),
        event_id: ev.id,
    });
}

// ---------------------------------------------------------------------------
// Balance accumulation
// ---------------------------------------------------------------------------

/// Fold postings into per-participant credit/debit balances, in posting
/// order.
#[must_use]
pub fn accumulate_balances(postings: &[Posting]) -> BTreeMap<ParticipantId, BalanceEntry> {
    let mut balances: BTreeMap<ParticipantId, BalanceEntry> = BTreeMap::new();
    for posting in postings {
        balances
            .entry(posting.debtor)
            .or_default()
            .add_debit(posting.amount_eur);
        balances
            .entry(posting.creditor)
            .or_default()
            .add_credit(posting.amount_eur);
    }
    balances
}
