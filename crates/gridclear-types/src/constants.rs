//! System-wide constants for the GridClear settlement engine.

use rust_decimal::Decimal;

/// Monetary amounts are stored with two decimal places (euro cents).
pub const AMOUNT_SCALE: u32 = 2;

/// Absolute tolerance used to decide whether a pre-rounding balance is zero.
pub const ZERO_EPSILON: Decimal = Decimal::from_parts(1, 0, 0, false, 9); // 1e-9

/// Default minimum payout per settlement line: one euro cent.
pub const DEFAULT_MIN_PAYOUT_EUR: Decimal = Decimal::from_parts(1, 0, 0, false, 2); // 0.01

/// Fallback price for grid-sourced consumption when neither the event nor
/// the policy carries a price (EUR per kWh).
pub const FALLBACK_GRID_PRICE_EUR_PER_KWH: Decimal = Decimal::from_parts(35, 0, 0, false, 2); // 0.35

/// Rounding error bound per settlement line: half of the smallest currency
/// unit. Conservation checks allow at most this much drift per line.
pub const PER_LINE_ROUNDING_BOUND: Decimal = Decimal::from_parts(1, 0, 0, false, 2); // 0.01

/// External ID of the synthetic external-market counterparty, created
/// idempotently on first reference.
pub const EXTERNAL_MARKET_EXTERNAL_ID: &str = "external-market";

/// External ID of the synthetic community fee collector.
pub const FEE_COLLECTOR_EXTERNAL_ID: &str = "community-fee-collector";
