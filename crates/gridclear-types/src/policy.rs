//! Policy configuration: validated, per-use-case parameter structs.
//!
//! A policy is a named configuration bound to exactly one settlement run.
//! Instead of a dynamic dictionary read with defaulted lookups, each use
//! case has an explicit struct listing every recognized parameter and its
//! default; [`Policy::from_parameters`] rejects unknown keys and
//! out-of-range values at load time, not at point-of-use.

use std::collections::BTreeMap;
use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{GridclearError, ParticipantRole, Result, constants};

// ---------------------------------------------------------------------------
// RoundingMode
// ---------------------------------------------------------------------------

/// Rounding mode for net amounts, applied once per participant at
/// two decimal places.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundingMode {
    /// Round half away from zero ("commercial rounding").
    HalfUp,
    /// Round half to even ("banker's rounding").
    HalfEven,
}

impl RoundingMode {
    #[must_use]
    pub fn strategy(self) -> RoundingStrategy {
        match self {
            Self::HalfUp => RoundingStrategy::MidpointAwayFromZero,
            Self::HalfEven => RoundingStrategy::MidpointNearestEven,
        }
    }

    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "half_up" => Ok(Self::HalfUp),
            "half_even" => Ok(Self::HalfEven),
            other => Err(GridclearError::InvalidPolicyValue {
                key: "rounding".to_string(),
                reason: format!("unknown rounding mode {other:?}, expected half_up or half_even"),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// UnknownSourceTreatment
// ---------------------------------------------------------------------------

/// How the evaluator prices an event whose `source` tag matches no known
/// bucket. Historical variants of the evaluator disagreed on this; it is
/// now an explicit policy decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownSourceTreatment {
    /// Treat the event like grid consumption: debit the participant,
    /// credit the external market.
    ExternalMarket,
    /// Produce no postings for the event. The event is still counted and
    /// visible in the audit trail, never silently lost.
    ZeroPriced,
}

impl UnknownSourceTreatment {
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "external_market" => Ok(Self::ExternalMarket),
            "zero_priced" => Ok(Self::ZeroPriced),
            other => Err(GridclearError::InvalidPolicyValue {
                key: "unknown_source".to_string(),
                reason: format!(
                    "unknown treatment {other:?}, expected external_market or zero_priced"
                ),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// NettingPolicy
// ---------------------------------------------------------------------------

/// Parameters consumed by the netting engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NettingPolicy {
    /// Minimum |net| for a settlement line to be issued. Final amounts
    /// below the threshold are zeroed and their lines suppressed.
    pub min_payout_eur: Decimal,
    /// Role-specific overrides of the minimum payout.
    pub role_min_payout: BTreeMap<ParticipantRole, Decimal>,
    /// Rounding mode for the single per-participant rounding step.
    pub rounding: RoundingMode,
}

impl Default for NettingPolicy {
    fn default() -> Self {
        Self {
            min_payout_eur: constants::DEFAULT_MIN_PAYOUT_EUR,
            role_min_payout: BTreeMap::new(),
            rounding: RoundingMode::HalfUp,
        }
    }
}

impl NettingPolicy {
    /// Effective minimum payout for a participant with the given role.
    #[must_use]
    pub fn min_payout_for(&self, role: ParticipantRole) -> Decimal {
        self.role_min_payout
            .get(&role)
            .copied()
            .unwrap_or(self.min_payout_eur)
    }
}

// ---------------------------------------------------------------------------
// Use-case policies
// ---------------------------------------------------------------------------

/// Pricing policy for a peer-to-peer energy community.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnergyCommunityPolicy {
    /// EUR/kWh paid by the community pool to prosumers for generation.
    pub prosumer_sell_price: Decimal,
    /// EUR/kWh paid by consumers for locally sourced energy.
    pub consumer_buy_price: Decimal,
    /// Fraction of each local-consumption amount charged as community fee.
    pub community_fee_rate: Decimal,
    /// EUR/kWh the external market pays for energy fed into the grid.
    pub grid_feed_price: Decimal,
    pub unknown_source: UnknownSourceTreatment,
    pub netting: NettingPolicy,
}

impl Default for EnergyCommunityPolicy {
    fn default() -> Self {
        Self {
            prosumer_sell_price: Decimal::new(15, 2), // 0.15
            consumer_buy_price: Decimal::new(12, 2),  // 0.12
            community_fee_rate: Decimal::new(2, 2),   // 0.02
            grid_feed_price: Decimal::new(8, 2),      // 0.08
            unknown_source: UnknownSourceTreatment::ExternalMarket,
            netting: NettingPolicy::default(),
        }
    }
}

/// Pricing policy for a landlord-to-tenant ("Mieterstrom") supply model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MieterstromPolicy {
    /// EUR/kWh tenants pay the landlord for locally sourced energy.
    pub tenant_price_per_kwh: Decimal,
    /// Landlord's share of grid-feed / VPP proceeds; the remainder goes
    /// to the operator.
    pub landlord_revenue_share: Decimal,
    /// Fraction of local-consumption revenue the landlord pays the
    /// operator as a service fee.
    pub operator_fee_rate: Decimal,
    /// EUR/kWh the external market pays for exported energy.
    pub grid_compensation: Decimal,
    /// EUR per unit for kWh-less base-fee events.
    pub base_fee_per_unit: Decimal,
    pub unknown_source: UnknownSourceTreatment,
    pub netting: NettingPolicy,
}

impl Default for MieterstromPolicy {
    fn default() -> Self {
        Self {
            tenant_price_per_kwh: Decimal::new(18, 2),   // 0.18
            landlord_revenue_share: Decimal::new(60, 2), // 0.60
            operator_fee_rate: Decimal::new(15, 2),      // 0.15
            grid_compensation: Decimal::new(8, 2),       // 0.08
            base_fee_per_unit: Decimal::new(500, 2),     // 5.00
            unknown_source: UnknownSourceTreatment::ExternalMarket,
            netting: NettingPolicy::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// A named, immutable pricing configuration. One policy is bound to one
/// settlement run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "use_case", rename_all = "snake_case")]
pub enum Policy {
    EnergyCommunity(EnergyCommunityPolicy),
    Mieterstrom(MieterstromPolicy),
}

impl Policy {
    /// The use-case identifier this policy belongs to.
    #[must_use]
    pub fn use_case(&self) -> &'static str {
        match self {
            Self::EnergyCommunity(_) => "energy_community",
            Self::Mieterstrom(_) => "mieterstrom",
        }
    }

    #[must_use]
    pub fn netting(&self) -> &NettingPolicy {
        match self {
            Self::EnergyCommunity(p) => &p.netting,
            Self::Mieterstrom(p) => &p.netting,
        }
    }

    #[must_use]
    pub fn unknown_source(&self) -> UnknownSourceTreatment {
        match self {
            Self::EnergyCommunity(p) => p.unknown_source,
            Self::Mieterstrom(p) => p.unknown_source,
        }
    }

    /// Default policy catalog entry for a use case.
    pub fn default_for(use_case: &str) -> Result<Self> {
        match use_case.trim().to_ascii_lowercase().as_str() {
            "energy_community" => Ok(Self::EnergyCommunity(EnergyCommunityPolicy::default())),
            "mieterstrom" => Ok(Self::Mieterstrom(MieterstromPolicy::default())),
            other => Err(GridclearError::UnknownUseCase(other.to_string())),
        }
    }

    /// Build a policy from a loose parameter map, starting from the use
    /// case's defaults.
    ///
    /// Every recognized key is listed below; anything else is rejected with
    /// [`GridclearError::UnknownPolicyParameter`]. Values may be JSON
    /// numbers or numeric strings. Rates must lie in `[0, 1]`, prices and
    /// thresholds must be non-negative.
    pub fn from_parameters(use_case: &str, params: &BTreeMap<String, Value>) -> Result<Self> {
        let mut policy = Self::default_for(use_case)?;
        let use_case = policy.use_case();

        for (key, value) in params {
            match (&mut policy, key.as_str()) {
                // Common keys.
                (_, "use_case") => {
                    let declared = string_param(key, value)?;
                    if declared.trim().to_ascii_lowercase() != use_case {
                        return Err(GridclearError::InvalidPolicyValue {
                            key: key.clone(),
                            reason: format!("policy body declares {declared:?}, run uses {use_case:?}"),
                        });
                    }
                }
                (p, "min_payout_eur") => {
                    netting_mut(p).min_payout_eur = price_param(key, value)?;
                }
                (p, "rounding") => {
                    netting_mut(p).rounding = RoundingMode::parse(&string_param(key, value)?)?;
                }
                (p, "unknown_source") => {
                    let treatment = UnknownSourceTreatment::parse(&string_param(key, value)?)?;
                    match p {
                        Self::EnergyCommunity(ec) => ec.unknown_source = treatment,
                        Self::Mieterstrom(ms) => ms.unknown_source = treatment,
                    }
                }

                // Energy community keys.
                (Self::EnergyCommunity(p), "prosumer_sell_price") => {
                    p.prosumer_sell_price = price_param(key, value)?;
                }
                (Self::EnergyCommunity(p), "consumer_buy_price") => {
                    p.consumer_buy_price = price_param(key, value)?;
                }
                (Self::EnergyCommunity(p), "community_fee_rate") => {
                    p.community_fee_rate = rate_param(key, value)?;
                }
                (Self::EnergyCommunity(p), "grid_feed_price") => {
                    p.grid_feed_price = price_param(key, value)?;
                }

                // Mieterstrom keys.
                (Self::Mieterstrom(p), "tenant_price_per_kwh") => {
                    p.tenant_price_per_kwh = price_param(key, value)?;
                }
                (Self::Mieterstrom(p), "landlord_revenue_share") => {
                    p.landlord_revenue_share = rate_param(key, value)?;
                }
                (Self::Mieterstrom(p), "operator_fee_rate") => {
                    p.operator_fee_rate = rate_param(key, value)?;
                }
                (Self::Mieterstrom(p), "grid_compensation") => {
                    p.grid_compensation = price_param(key, value)?;
                }
                (Self::Mieterstrom(p), "base_fee_per_unit") => {
                    p.base_fee_per_unit = price_param(key, value)?;
                }

                (_, _) => {
                    return Err(GridclearError::UnknownPolicyParameter {
                        use_case: use_case.to_string(),
                        key: key.clone(),
                    });
                }
            }
        }

        Ok(policy)
    }
}

fn netting_mut(policy: &mut Policy) -> &mut NettingPolicy {
    match policy {
        Policy::EnergyCommunity(p) => &mut p.netting,
        Policy::Mieterstrom(p) => &mut p.netting,
    }
}

// ---------------------------------------------------------------------------
// Parameter parsing helpers
// ---------------------------------------------------------------------------

fn decimal_param(key: &str, value: &Value) -> Result<Decimal> {
    let parsed = match value {
        Value::Number(n) => n.as_f64().and_then(|f| Decimal::try_from(f).ok()),
        Value::String(s) => Decimal::from_str(s.trim()).ok(),
        _ => None,
    };
    parsed.ok_or_else(|| GridclearError::InvalidPolicyValue {
        key: key.to_string(),
        reason: format!("expected a number, got {value}"),
    })
}

fn price_param(key: &str, value: &Value) -> Result<Decimal> {
    let price = decimal_param(key, value)?;
    if price < Decimal::ZERO {
        return Err(GridclearError::InvalidPolicyValue {
            key: key.to_string(),
            reason: format!("must be non-negative, got {price}"),
        });
    }
    Ok(price)
}

fn rate_param(key: &str, value: &Value) -> Result<Decimal> {
    let rate = decimal_param(key, value)?;
    if rate < Decimal::ZERO || rate > Decimal::ONE {
        return Err(GridclearError::InvalidPolicyValue {
            key: key.to_string(),
            reason: format!("must lie in [0, 1], got {rate}"),
        });
    }
    Ok(rate)
}

fn string_param(key: &str, value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        other => Err(GridclearError::InvalidPolicyValue {
            key: key.to_string(),
            reason: format!("expected a string, got {other}"),
        }),
    }
}
