//! # gridclear-ledger
//!
//! **Append-only settlement ledger and audit surface for GridClear.**
//!
//! This crate owns everything the pure engine must not touch: participant
//! and event storage, batch commits, proof hashing, and the audit trail.
//!
//! - [`LedgerStore`]: in-memory system of record. Participants upsert
//!   idempotently by external id; batches and lines commit atomically and
//!   are never mutated afterwards.
//! - [`execute_settlement`] / [`preview_netting`]: drive the engine
//!   pipeline over stored events and commit (or merely report) the result.
//! - [`proof_hash`] / [`verify_line`]: canonical SHA-256 digest binding
//!   each settlement line to its batch, participant, amount, and
//!   description.
//! - [`audit_batch`]: read-only reconstruction of a committed batch with
//!   per-line hash verification.

pub mod audit;
pub mod proof;
pub mod run;
pub mod store;

pub use audit::{AuditLine, AuditReport, audit_batch};
pub use proof::{proof_hash, verify_line};
pub use run::{SettlementReport, execute_settlement, preview_netting};
pub use store::LedgerStore;
