//! Event aggregation: window filtering, classification, per-participant totals.
//!
//! The aggregator seals the input for the rest of the pipeline: events are
//! filtered to the half-open window `[start, end)`, validated against the
//! participant set, classified by source bucket, and sorted into the fixed
//! accumulation order (timestamp, then event id). Every downstream stage
//! iterates this sealed order, which is what makes rounding reproducible
//! across runs.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use tracing::debug;

use gridclear_types::{
    EventKind, GridclearError, Participant, ParticipantId, Result, SettlementWindow, SourceBucket,
    UsageEvent,
};

/// An event paired with its normalized source classification.
#[derive(Debug, Clone)]
pub struct ClassifiedEvent {
    pub event: UsageEvent,
    pub bucket: SourceBucket,
}

/// Running totals for one participant, keyed by event kind and source.
#[derive(Debug, Clone, Default)]
pub struct UsageTotals {
    /// kWh quantities keyed by (kind, bucket).
    pub kwh: BTreeMap<(EventKind, SourceBucket), Decimal>,
    /// EUR quantities (fee events) keyed by kind.
    pub eur: BTreeMap<EventKind, Decimal>,
}

impl UsageTotals {
    /// kWh consumed from local sources (PV, battery).
    #[must_use]
    pub fn local_consumption_kwh(&self) -> Decimal {
        self.kwh
            .iter()
            .filter(|((kind, bucket), _)| *kind == EventKind::Consumption && bucket.is_local())
            .map(|(_, qty)| *qty)
            .sum()
    }

    /// kWh consumed from the grid or unclassified sources.
    #[must_use]
    pub fn grid_consumption_kwh(&self) -> Decimal {
        self.kwh
            .iter()
            .filter(|((kind, bucket), _)| *kind == EventKind::Consumption && !bucket.is_local())
            .map(|(_, qty)| *qty)
            .sum()
    }

    /// kWh generated or exported (generation, production, grid feed,
    /// battery discharge, VPP sales).
    #[must_use]
    pub fn generated_kwh(&self) -> Decimal {
        self.kwh
            .iter()
            .filter(|((kind, _), _)| {
                matches!(
                    kind,
                    EventKind::Generation
                        | EventKind::Production
                        | EventKind::GridFeed
                        | EventKind::BatteryDischarge
                        | EventKind::VppSale
                )
            })
            .map(|(_, qty)| *qty)
            .sum()
    }

    /// Total EUR-denominated fees.
    #[must_use]
    pub fn fees_eur(&self) -> Decimal {
        self.eur.values().copied().sum()
    }
}

/// The sealed output of aggregation: classified events in accumulation
/// order plus per-participant totals.
#[derive(Debug, Clone, Default)]
pub struct WindowedUsage {
    /// Events inside the window, sorted by (timestamp, event id).
    pub events: Vec<ClassifiedEvent>,
    /// Per-participant running totals.
    pub totals: BTreeMap<ParticipantId, UsageTotals>,
}

/// Aggregate events for one settlement window.
///
/// Filters to `[start, end)` (an event exactly at `end` belongs to the
/// next batch), rejects events referencing unknown participants or
/// carrying invalid quantities, and fixes the accumulation order.
///
/// # Errors
/// - [`GridclearError::UnknownParticipant`] if an event references a
///   participant not present in `participants` — the whole run aborts.
/// - [`GridclearError::InvalidEvent`] for structurally invalid events.
pub fn aggregate(
    events: &[UsageEvent],
    participants: &BTreeMap<ParticipantId, Participant>,
    window: &SettlementWindow,
) -> Result<WindowedUsage> {
    let mut selected: Vec<ClassifiedEvent> = Vec::new();

    for event in events {
        if !window.contains(event.timestamp) {
            continue;
        }
        if !participants.contains_key(&event.participant_id) {
            return Err(GridclearError::UnknownParticipant(event.participant_id));
        }
        event.validate()?;
        selected.push(ClassifiedEvent {
            bucket: event.bucket(),
            event: event.clone(),
        });
    }

    // Fixed accumulation order: timestamp, then event id.
    selected.sort_by(|a, b| {
        a.event
            .timestamp
            .cmp(&b.event.timestamp)
            .then(a.event.id.cmp(&b.event.id))
    });

    let mut totals: BTreeMap<ParticipantId, UsageTotals> = BTreeMap::new();
    for classified in &selected {
        let event = &classified.event;
        let entry = totals.entry(event.participant_id).or_default();
        match event.unit {
            gridclear_types::EnergyUnit::Kwh => {
                *entry
                    .kwh
                    .entry((event.kind, classified.bucket))
                    .or_insert(Decimal::ZERO) += event.quantity;
            }
            gridclear_types::EnergyUnit::Eur => {
                *entry.eur.entry(event.kind).or_insert(Decimal::ZERO) += event.quantity;
            }
        }
    }

    debug!(
        window = %window,
        events = selected.len(),
        participants = totals.len(),
        "aggregated usage window"
    );

    Ok(WindowedUsage {
        events: selected,
        totals,
    })
}
