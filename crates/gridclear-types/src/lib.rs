//! # gridclear-types
//!
//! Shared types, errors, and configuration for the **GridClear** settlement engine.
//!
//! This crate is the leaf dependency of the workspace — every other crate
//! depends on it. It defines:
//!
//! - **Identifiers**: [`ParticipantId`], [`EventId`], [`BatchId`], [`LineId`]
//! - **Participant model**: [`Participant`], [`ParticipantRole`]
//! - **Event model**: [`UsageEvent`], [`EventKind`], [`EnergyUnit`], [`SourceBucket`]
//! - **Double-entry model**: [`Posting`], [`BalanceEntry`]
//! - **Policy configuration**: [`Policy`], [`EnergyCommunityPolicy`], [`MieterstromPolicy`], [`NettingPolicy`]
//! - **Settlement model**: [`SettlementWindow`], [`SettlementBatch`], [`SettlementLine`], [`Transfer`], [`NettingStats`]
//! - **Errors**: [`GridclearError`] with `GC_ERR_` prefix codes
//! - **Constants**: system-wide precision and fallback values

pub mod balance;
pub mod constants;
pub mod error;
pub mod event;
pub mod ids;
pub mod participant;
pub mod policy;
pub mod settlement;

// Re-export all primary types at crate root for ergonomic imports:
//   use gridclear_types::{UsageEvent, Policy, SettlementBatch, ...};

pub use balance::*;
pub use error::*;
pub use event::*;
pub use ids::*;
pub use participant::*;
pub use policy::*;
pub use settlement::*;

// Constants are accessed via `gridclear_types::constants::FOO`
// (not re-exported to avoid name collisions).
