//! # gridclear-engine
//!
//! **Pure settlement compute plane for GridClear.**
//!
//! The engine takes an already-loaded set of usage events plus a validated
//! policy and produces net positions and pairwise transfers. It has:
//!
//! - **Zero side effects**: no persistence, no clock reads, no globals
//! - **Deterministic output**: fixed accumulation order (timestamp, then
//!   event id), fixed sort tie-breaks, single rounding step
//! - **Fail-fast validation**: unknown participants or event kinds abort
//!   the whole run before anything is produced
//!
//! Pipeline: [`aggregate`] → [`evaluate`] → [`accumulate_balances`] →
//! [`net_balances`] → [`check_conservation`].

pub mod aggregator;
pub mod evaluator;
pub mod netting;

pub use aggregator::{ClassifiedEvent, UsageTotals, WindowedUsage, aggregate};
pub use evaluator::{CounterpartyDirectory, accumulate_balances, evaluate};
pub use netting::{NettingOutcome, check_conservation, net_balances};
