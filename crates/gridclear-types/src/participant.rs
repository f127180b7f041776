//! Participant model: economic actors within one settlement window.
//!
//! A participant's role is immutable for the duration of a settlement
//! window; participants are created idempotently on first reference,
//! keyed by their stable external ID.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{GridclearError, ParticipantId, Result};

/// The closed set of economic roles a participant can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantRole {
    /// Pure consumer of energy.
    Consumer,
    /// Residential tenant in a landlord-to-tenant supply model.
    Tenant,
    /// Commercial tenant (shops, offices) — may carry its own payout threshold.
    CommercialTenant,
    /// Building owner selling locally generated energy to tenants.
    Landlord,
    /// Technical operator of the generation/metering infrastructure.
    Operator,
    /// Participant that both consumes and produces.
    Prosumer,
    /// Synthetic counterparty for money flowing to/from outside the
    /// closed participant set (grid operator, wholesale market).
    ExternalMarket,
    /// Collector of community fees; doubles as the community pool.
    FeeCollector,
}

impl ParticipantRole {
    /// Parse a role from its wire representation. Unknown strings are
    /// rejected — the role set is closed.
    ///
    /// Accepts the legacy aliases `commercial` and `community_fee_collector`.
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "consumer" => Ok(Self::Consumer),
            "tenant" => Ok(Self::Tenant),
            "commercial_tenant" | "commercial" => Ok(Self::CommercialTenant),
            "landlord" => Ok(Self::Landlord),
            "operator" => Ok(Self::Operator),
            "prosumer" => Ok(Self::Prosumer),
            "external_market" => Ok(Self::ExternalMarket),
            "fee_collector" | "community_fee_collector" => Ok(Self::FeeCollector),
            other => Err(GridclearError::UnknownRole(other.to_string())),
        }
    }
}

impl fmt::Display for ParticipantRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Consumer => "consumer",
            Self::Tenant => "tenant",
            Self::CommercialTenant => "commercial_tenant",
            Self::Landlord => "landlord",
            Self::Operator => "operator",
            Self::Prosumer => "prosumer",
            Self::ExternalMarket => "external_market",
            Self::FeeCollector => "fee_collector",
        };
        write!(f, "{s}")
    }
}

/// A settlement participant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    /// Internal identifier.
    pub id: ParticipantId,
    /// Stable external identity (meter ID, customer number, ...).
    pub external_id: String,
    /// Display name. Not part of any proof hash — it may drift.
    pub name: String,
    /// Economic role; immutable once assigned for a settlement window.
    pub role: ParticipantRole,
}

impl Participant {
    #[must_use]
    pub fn new(external_id: impl Into<String>, name: impl Into<String>, role: ParticipantRole) -> Self {
        Self {
            id: ParticipantId::new(),
            external_id: external_id.into(),
            name: name.into(),
            role,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_canonical_roles() {
        assert_eq!(
            ParticipantRole::parse("tenant").unwrap(),
            ParticipantRole::Tenant
        );
        assert_eq!(
            ParticipantRole::parse("  Landlord ").unwrap(),
            ParticipantRole::Landlord
        );
        assert_eq!(
            ParticipantRole::parse("external_market").unwrap(),
            ParticipantRole::ExternalMarket
        );
    }

    #[test]
    fn parse_legacy_aliases() {
        assert_eq!(
            ParticipantRole::parse("commercial").unwrap(),
            ParticipantRole::CommercialTenant
        );
        assert_eq!(
            ParticipantRole::parse("community_fee_collector").unwrap(),
            ParticipantRole::FeeCollector
        );
    }

    #[test]
    fn parse_rejects_unknown() {
        let err = ParticipantRole::parse("wizard").unwrap_err();
        assert!(matches!(err, GridclearError::UnknownRole(r) if r == "wizard"));
    }

    #[test]
    fn role_serde_is_snake_case() {
        let json = serde_json::to_string(&ParticipantRole::CommercialTenant).unwrap();
        assert_eq!(json, "\"commercial_tenant\"");
    }

    #[test]
    fn display_roundtrips_through_parse() {
        for role in [
            ParticipantRole::Consumer,
            ParticipantRole::Tenant,
            ParticipantRole::CommercialTenant,
            ParticipantRole::Landlord,
            ParticipantRole::Operator,
            ParticipantRole::Prosumer,
            ParticipantRole::ExternalMarket,
            ParticipantRole::FeeCollector,
        ] {
            assert_eq!(ParticipantRole::parse(&role.to_string()).unwrap(), role);
        }
    }
}
