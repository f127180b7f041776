//! Error types for the GridClear settlement engine.
//!
//! All errors use the `GC_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Event / participant validation errors
//! - 2xx: Policy configuration errors
//! - 3xx: Evaluation errors
//! - 4xx: Ledger errors
//! - 5xx: Audit / lookup errors
//! - 6xx: Consistency errors
//! - 9xx: General / internal errors
//!
//! Validation errors (1xx–3xx) always fail the whole batch before any
//! persistence. Consistency errors (6xx) indicate a violated invariant on
//! committed state. A proof-hash mismatch during audit is *not* an error —
//! it is reported as `is_verified = false` in the audit payload, because
//! the batch is immutable and cannot self-heal.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::{BatchId, ParticipantId, ParticipantRole};

/// Central error enum for all GridClear operations.
#[derive(Debug, Error)]
pub enum GridclearError {
    // =================================================================
    // Event / Participant Validation Errors (1xx)
    // =================================================================
    /// An event references a participant that does not exist.
    #[error("GC_ERR_100: Event references unknown participant: {0}")]
    UnknownParticipant(ParticipantId),

    /// The event failed validation (negative quantity, bad unit, etc.).
    #[error("GC_ERR_101: Invalid event: {reason}")]
    InvalidEvent { reason: String },

    /// A decoded event kind is outside the closed set.
    #[error("GC_ERR_102: Unknown event kind: {0:?}")]
    UnknownEventKind(String),

    /// A decoded participant role is outside the closed set.
    #[error("GC_ERR_103: Unknown participant role: {0:?}")]
    UnknownRole(String),

    /// A settlement window with `end <= start`.
    #[error("GC_ERR_104: Invalid settlement window: {reason}")]
    InvalidWindow { reason: String },

    // =================================================================
    // Policy Errors (2xx)
    // =================================================================
    /// The requested use case is not known to the engine.
    #[error("GC_ERR_200: Unknown use case: {0:?}")]
    UnknownUseCase(String),

    /// A policy parameter key is not recognized by the use case.
    #[error("GC_ERR_201: Unknown policy parameter {key:?} for use case {use_case:?}")]
    UnknownPolicyParameter { use_case: String, key: String },

    /// A policy parameter value failed validation.
    #[error("GC_ERR_202: Invalid policy value for {key:?}: {reason}")]
    InvalidPolicyValue { key: String, reason: String },

    // =================================================================
    // Evaluation Errors (3xx)
    // =================================================================
    /// A pricing rule needs a counterparty role that no participant holds.
    #[error("GC_ERR_300: No participant available for counterparty role {role}")]
    MissingCounterparty { role: ParticipantRole },

    // =================================================================
    // Ledger Errors (4xx)
    // =================================================================
    /// A batch with this ID has already been committed (batches are
    /// append-only; corrections must be issued as a new batch).
    #[error("GC_ERR_400: Batch already committed: {0}")]
    BatchAlreadyCommitted(BatchId),

    /// A settlement line does not belong to the batch it is committed with.
    #[error("GC_ERR_401: Line/batch mismatch: line carries batch {line_batch}, committing {batch}")]
    LineBatchMismatch { batch: BatchId, line_batch: BatchId },

    /// The settlement window contains no events.
    #[error("GC_ERR_402: No events in settlement window")]
    NoEventsInWindow,

    // =================================================================
    // Audit / Lookup Errors (5xx)
    // =================================================================
    /// The requested batch does not exist.
    #[error("GC_ERR_500: Batch not found: {0}")]
    BatchNotFound(BatchId),

    // =================================================================
    // Consistency Errors (6xx)
    // =================================================================
    /// Conservation of value violated: the sum of final net amounts drifted
    /// from the sum implied by the double-entry postings beyond the
    /// per-line rounding bound.
    #[error(
        "GC_ERR_600: Conservation violated: net sum {actual} != posting sum {expected} (tolerance {tolerance})"
    )]
    ConservationViolation {
        expected: Decimal,
        actual: Decimal,
        tolerance: Decimal,
    },

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// Unrecoverable internal error.
    #[error("GC_ERR_900: Internal error: {0}")]
    Internal(String),

    /// Serialization / deserialization error.
    #[error("GC_ERR_901: Serialization error: {0}")]
    Serialization(String),
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, GridclearError>;

impl From<serde_json::Error> for GridclearError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
