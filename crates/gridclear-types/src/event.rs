//! Usage event model: one metered reading or fee charge per event.
//!
//! Events are immutable once recorded. The free-form `source` tag is
//! case-normalized into a [`SourceBucket`] before classification; the
//! raw string is preserved for audit.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{EventId, GridclearError, ParticipantId, Result};

// ---------------------------------------------------------------------------
// EventKind
// ---------------------------------------------------------------------------

/// The closed set of event kinds. A decoded kind outside this set is
/// rejected and aborts the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Local energy generation (PV panels, CHP).
    Generation,
    /// Energy consumed by the participant.
    Consumption,
    /// Energy exported into the public grid.
    GridFeed,
    /// Recurring base fee (usually a EUR amount, not kWh).
    BaseFee,
    /// Energy stored into a battery.
    BatteryCharge,
    /// Energy drawn out of a battery.
    BatteryDischarge,
    /// Generic production reading (alias kind used by some meters).
    Production,
    /// Sale into a virtual power plant.
    VppSale,
}

impl EventKind {
    /// Parse a kind from its wire representation; rejects unknown strings.
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "generation" => Ok(Self::Generation),
            "consumption" => Ok(Self::Consumption),
            "grid_feed" => Ok(Self::GridFeed),
            "base_fee" => Ok(Self::BaseFee),
            "battery_charge" => Ok(Self::BatteryCharge),
            "battery_discharge" => Ok(Self::BatteryDischarge),
            "production" => Ok(Self::Production),
            "vpp_sale" => Ok(Self::VppSale),
            other => Err(GridclearError::UnknownEventKind(other.to_string())),
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Generation => "generation",
            Self::Consumption => "consumption",
            Self::GridFeed => "grid_feed",
            Self::BaseFee => "base_fee",
            Self::BatteryCharge => "battery_charge",
            Self::BatteryDischarge => "battery_discharge",
            Self::Production => "production",
            Self::VppSale => "vpp_sale",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// EnergyUnit
// ---------------------------------------------------------------------------

/// Unit tag on an event quantity. `Eur` means the quantity *is* the
/// monetary amount; `Kwh` quantities are priced by the policy evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnergyUnit {
    Kwh,
    Eur,
}

impl EnergyUnit {
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "kwh" => Ok(Self::Kwh),
            "eur" => Ok(Self::Eur),
            other => Err(GridclearError::InvalidEvent {
                reason: format!("unknown unit {other:?}, expected kWh or EUR"),
            }),
        }
    }
}

impl std::fmt::Display for EnergyUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Kwh => write!(f, "kWh"),
            Self::Eur => write!(f, "EUR"),
        }
    }
}

// ---------------------------------------------------------------------------
// SourceBucket
// ---------------------------------------------------------------------------

/// Normalized classification of an event's free-form `source` tag.
///
/// The raw tag is trimmed and lower-cased before matching. Anything that is
/// not a recognized local source or the grid lands in `Other`; how `Other`
/// is priced is an explicit policy decision
/// ([`crate::UnknownSourceTreatment`]), never an inferred default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceBucket {
    /// Locally generated PV energy.
    LocalPv,
    /// Local battery storage.
    Battery,
    /// Public grid.
    Grid,
    /// Unrecognized source tag.
    Other,
}

impl SourceBucket {
    /// Classify a raw source tag. Case- and whitespace-insensitive.
    #[must_use]
    pub fn classify(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "local_pv" | "pv" | "rooftop_pv" => Self::LocalPv,
            "battery" | "local_battery" => Self::Battery,
            "grid" | "" => Self::Grid,
            _ => Self::Other,
        }
    }

    /// Whether this bucket counts as locally produced energy.
    #[must_use]
    pub fn is_local(self) -> bool {
        matches!(self, Self::LocalPv | Self::Battery)
    }
}

impl std::fmt::Display for SourceBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::LocalPv => "local_pv",
            Self::Battery => "battery",
            Self::Grid => "grid",
            Self::Other => "other",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// UsageEvent
// ---------------------------------------------------------------------------

/// One immutable metered usage/generation event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageEvent {
    pub id: EventId,
    pub participant_id: ParticipantId,
    pub kind: EventKind,
    /// kWh for energy events, EUR for fee events — see `unit`.
    pub quantity: Decimal,
    pub unit: EnergyUnit,
    pub timestamp: DateTime<Utc>,
    /// Raw source tag as ingested (e.g. "local_pv", "Battery", "grid").
    pub source: String,
    /// Price carried by the event itself; takes precedence over policy
    /// defaults during evaluation.
    pub price_eur_per_kwh: Option<Decimal>,
}

impl UsageEvent {
    /// Normalized source classification.
    #[must_use]
    pub fn bucket(&self) -> SourceBucket {
        SourceBucket::classify(&self.source)
    }

    /// Structural validation: quantity must be finite and non-negative.
    pub fn validate(&self) -> Result<()> {
        if self.quantity < Decimal::ZERO {
            return Err(GridclearError::InvalidEvent {
                reason: format!(
                    "negative quantity {} for event {}",
                    self.quantity, self.id
                ),
            });
        }
        if let Some(price) = self.price_eur_per_kwh {
            if price < Decimal::ZERO {
                return Err(GridclearError::InvalidEvent {
                    reason: format!("negative price {price} for event {}", self.id),
                });
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

#[cfg(any(test, feature = "test-helpers"))]
impl UsageEvent {
    /// Fixture: a kWh event at the given timestamp with no embedded price.
    #[must_use]
    pub fn fixture(
        participant_id: ParticipantId,
        kind: EventKind,
        quantity: Decimal,
        source: &str,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: EventId::new(),
            participant_id,
            kind,
            quantity,
            unit: EnergyUnit::Kwh,
            timestamp,
            source: source.to_string(),
            price_eur_per_kwh: None,
        }
    }

    /// Fixture: a kWh event carrying its own unit price.
    #[must_use]
    pub fn fixture_priced(
        participant_id: ParticipantId,
        kind: EventKind,
        quantity: Decimal,
        source: &str,
        price: Decimal,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let mut ev = Self::fixture(participant_id, kind, quantity, source, timestamp);
        ev.price_eur_per_kwh = Some(price);
        ev
    }

    /// Fixture: a EUR-denominated fee event.
    #[must_use]
    pub fn fixture_fee(
        participant_id: ParticipantId,
        amount_eur: Decimal,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: EventId::new(),
            participant_id,
            kind: EventKind::BaseFee,
            quantity: amount_eur,
            unit: EnergyUnit::Eur,
            timestamp,
            source: "grid".to_string(),
            price_eur_per_kwh: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_parse_rejects_unknown() {
        let err = EventKind::parse("teleportation").unwrap_err();
        assert!(matches!(err, GridclearError::UnknownEventKind(_)));
    }

    #[test]
    fn kind_parse_normalizes_case() {
        assert_eq!(EventKind::parse(" Grid_Feed ").unwrap(), EventKind::GridFeed);
    }

    #[test]
    fn source_classification() {
        assert_eq!(SourceBucket::classify("local_pv"), SourceBucket::LocalPv);
        assert_eq!(SourceBucket::classify(" Battery "), SourceBucket::Battery);
        assert_eq!(SourceBucket::classify("LOCAL_BATTERY"), SourceBucket::Battery);
        assert_eq!(SourceBucket::classify("grid"), SourceBucket::Grid);
        assert_eq!(SourceBucket::classify("diesel_genset"), SourceBucket::Other);
    }

    #[test]
    fn local_buckets() {
        assert!(SourceBucket::LocalPv.is_local());
        assert!(SourceBucket::Battery.is_local());
        assert!(!SourceBucket::Grid.is_local());
        assert!(!SourceBucket::Other.is_local());
    }

    #[test]
    fn negative_quantity_rejected() {
        let ev = UsageEvent::fixture(
            ParticipantId::new(),
            EventKind::Consumption,
            Decimal::new(-5, 0),
            "grid",
            Utc::now(),
        );
        let err = ev.validate().unwrap_err();
        assert!(matches!(err, GridclearError::InvalidEvent { .. }));
    }

    #[test]
    fn unit_parse() {
        assert_eq!(EnergyUnit::parse("kWh").unwrap(), EnergyUnit::Kwh);
        assert_eq!(EnergyUnit::parse("EUR").unwrap(), EnergyUnit::Eur);
        assert!(EnergyUnit::parse("USD").is_err());
    }

    #[test]
    fn event_serde_roundtrip() {
        let ev = UsageEvent::fixture_priced(
            ParticipantId::new(),
            EventKind::Consumption,
            Decimal::new(10, 0),
            "local_pv",
            Decimal::new(20, 2),
            Utc::now(),
        );
        let json = serde_json::to_string(&ev).unwrap();
        let back: UsageEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(ev.id, back.id);
        assert_eq!(ev.quantity, back.quantity);
        assert_eq!(back.bucket(), SourceBucket::LocalPv);
    }
}
