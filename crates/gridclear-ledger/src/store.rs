//! In-memory system of record for participants, events, and batches.
//!
//! The store enforces the ledger's two structural guarantees:
//!
//! - **Idempotent participants**: upserts key on `external_id`; replaying
//!   the same registration returns the existing participant unchanged.
//! - **Append-only batches**: a batch and its lines commit in one atomic
//!   step, exactly once. There is no update or delete path; corrections
//!   are a new batch.

use std::collections::BTreeMap;

use tracing::{debug, info};

use gridclear_types::{
    BatchId, GridclearError, Participant, ParticipantId, ParticipantRole, Result, SettlementBatch,
    SettlementLine, SettlementWindow, UsageEvent,
};

#[derive(Debug, Clone, Default)]
pub struct LedgerStore {
    participants: BTreeMap<ParticipantId, Participant>,
    by_external_id: BTreeMap<String, ParticipantId>,
    events: Vec<UsageEvent>,
    batches: BTreeMap<BatchId, SettlementBatch>,
    lines: BTreeMap<BatchId, Vec<SettlementLine>>,
}

impl LedgerStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ---------- participants ----------

    /// Register a participant, keyed by external id. If the external id is
    /// already registered the existing participant wins; the stored name
    /// and role are *not* overwritten.
    pub fn upsert_participant(
        &mut self,
        external_id: &str,
        name: &str,
        role: ParticipantRole,
    ) -> Participant {
        if let Some(id) = self.by_external_id.get(external_id) {
            if let Some(existing) = self.participants.get(id) {
                debug!(%external_id, "participant upsert matched existing registration");
                return existing.clone();
            }
        }
        let participant = Participant::new(external_id, name, role);
        self.by_external_id
            .insert(external_id.to_string(), participant.id);
        self.participants.insert(participant.id, participant.clone());
        info!(%external_id, %role, id = %participant.id, "registered participant");
        participant
    }

    /// Resolve an external id to a participant, creating one with default
    /// identity on first reference. Ingestion paths use this so a feed can
    /// mention a meter before anyone registered it.
    pub fn ensure_participant(&mut self, external_id: &str) -> Participant {
        self.upsert_participant(
            external_id,
            &format!("Participant {external_id}"),
            ParticipantRole::Prosumer,
        )
    }

    pub fn participant(&self, id: ParticipantId) -> Result<&Participant> {
        self.participants
            .get(&id)
            .ok_or(GridclearError::UnknownParticipant(id))
    }

    #[must_use]
    pub fn participant_by_external_id(&self, external_id: &str) -> Option<&Participant> {
        self.by_external_id
            .get(external_id)
            .and_then(|id| self.participants.get(id))
    }

    #[must_use]
    pub fn participants(&self) -> &BTreeMap<ParticipantId, Participant> {
        &self.participants
    }

    // ---------- events ----------

    /// Record a batch of usage events. All-or-nothing: every event must
    /// validate and reference a registered participant before any is
    /// stored.
    pub fn record_events(&mut self, events: Vec<UsageEvent>) -> Result<usize> {
        for event in &events {
            if !self.participants.contains_key(&event.participant_id) {
                return Err(GridclearError::UnknownParticipant(event.participant_id));
            }
            event.validate()?;
        }
        let recorded = events.len();
        self.events.extend(events);
        debug!(recorded, total = self.events.len(), "recorded usage events");
        Ok(recorded)
    }

    /// Events inside the half-open window, in insertion order.
    #[must_use]
    pub fn events_in_window(&self, window: &SettlementWindow) -> Vec<UsageEvent> {
        self.events
            .iter()
            .filter(|ev| window.contains(ev.timestamp))
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    // ---------- batches ----------

    /// Commit a batch and its lines atomically. Nothing persists unless
    /// every check passes.
    pub fn commit_batch(
        &mut self,
        batch: SettlementBatch,
        lines: Vec<SettlementLine>,
    ) -> Result<()> {
        if self.batches.contains_key(&batch.id) {
            return Err(GridclearError::BatchAlreadyCommitted(batch.id));
        }
        for line in &lines {
            if line.batch_id != batch.id {
                return Err(GridclearError::LineBatchMismatch {
                    batch: batch.id,
                    line_batch: line.batch_id,
                });
            }
        }
        info!(batch = %batch.id, use_case = %batch.use_case, lines = lines.len(), "committed settlement batch");
        self.lines.insert(batch.id, lines);
        self.batches.insert(batch.id, batch);
        Ok(())
    }

    pub fn batch(&self, id: BatchId) -> Result<&SettlementBatch> {
        self.batches.get(&id).ok_or(GridclearError::BatchNotFound(id))
    }

    pub fn lines_for_batch(&self, id: BatchId) -> Result<&[SettlementLine]> {
        self.lines
            .get(&id)
            .map(Vec::as_slice)
            .ok_or(GridclearError::BatchNotFound(id))
    }

    #[must_use]
    pub fn batches(&self) -> impl Iterator<Item = &SettlementBatch> {
        self.batches.values()
    }
}

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

#[cfg(any(test, feature = "test-helpers"))]
impl LedgerStore {
    /// Corrupt a committed line's amount in place. Exists only so audit
    /// tests can exercise proof-hash failure on "drifted" storage.
    pub fn tamper_line_amount(
        &mut self,
        batch_id: BatchId,
        participant_id: ParticipantId,
        amount_eur: rust_decimal::Decimal,
    ) -> bool {
        if let Some(lines) = self.lines.get_mut(&batch_id) {
            for line in lines {
                if line.participant_id == participant_id {
                    line.amount_eur = amount_eur;
                    return true;
                }
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use gridclear_types::{EventKind, LineId};
    use rust_decimal::Decimal;

    fn window() -> SettlementWindow {
        SettlementWindow::new(
            Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 6, 2, 0, 0, 0).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn upsert_is_idempotent_by_external_id() {
        let mut store = LedgerStore::new();
        let first = store.upsert_participant("meter-7", "Tenant 7", ParticipantRole::Tenant);
        let second = store.upsert_participant("meter-7", "Renamed", ParticipantRole::Landlord);

        assert_eq!(first.id, second.id);
        // Existing registration wins.
        assert_eq!(second.name, "Tenant 7");
        assert_eq!(second.role, ParticipantRole::Tenant);
        assert_eq!(store.participants().len(), 1);
    }

    #[test]
    fn ensure_participant_defaults_then_sticks() {
        let mut store = LedgerStore::new();
        let auto = store.ensure_participant("meter-42");
        assert_eq!(auto.name, "Participant meter-42");
        assert_eq!(auto.role, ParticipantRole::Prosumer);

        // A later explicit registration does not replace the first one.
        let again = store.upsert_participant("meter-42", "Rooftop PV", ParticipantRole::Landlord);
        assert_eq!(again.id, auto.id);
        assert_eq!(again.role, ParticipantRole::Prosumer);
    }

    #[test]
    fn record_events_is_all_or_nothing() {
        let mut store = LedgerStore::new();
        let tenant = store.upsert_participant("t1", "Tenant 1", ParticipantRole::Tenant);
        let ghost = ParticipantId::new();

        let events = vec![
            UsageEvent::fixture(tenant.id, EventKind::Consumption, Decimal::ONE, "grid", window().start),
            UsageEvent::fixture(ghost, EventKind::Consumption, Decimal::ONE, "grid", window().start),
        ];
        assert!(store.record_events(events).is_err());
        assert_eq!(store.event_count(), 0, "no partial writes");
    }

    #[test]
    fn events_filtered_by_window() {
        let mut store = LedgerStore::new();
        let tenant = store.upsert_participant("t1", "Tenant 1", ParticipantRole::Tenant);
        let w = window();
        store
            .record_events(vec![
                UsageEvent::fixture(tenant.id, EventKind::Consumption, Decimal::ONE, "grid", w.start),
                UsageEvent::fixture(tenant.id, EventKind::Consumption, Decimal::ONE, "grid", w.end),
            ])
            .unwrap();

        assert_eq!(store.events_in_window(&w).len(), 1);
    }

    #[test]
    fn duplicate_batch_commit_rejected() {
        let mut store = LedgerStore::new();
        let batch = SettlementBatch::new("mieterstrom", window());
        store.commit_batch(batch.clone(), Vec::new()).unwrap();

        let err = store.commit_batch(batch.clone(), Vec::new()).unwrap_err();
        assert!(matches!(err, GridclearError::BatchAlreadyCommitted(id) if id == batch.id));
    }

    #[test]
    fn foreign_line_rejected_and_nothing_persists() {
        let mut store = LedgerStore::new();
        let batch = SettlementBatch::new("mieterstrom", window());
        let foreign_batch = BatchId::new();
        let participant = ParticipantId::new();
        let line = SettlementLine {
            id: LineId::deterministic(foreign_batch, participant),
            batch_id: foreign_batch,
            participant_id: participant,
            amount_eur: Decimal::ONE,
            description: "stray".to_string(),
            proof_hash: String::new(),
        };

        let err = store.commit_batch(batch.clone(), vec![line]).unwrap_err();
        assert!(matches!(err, GridclearError::LineBatchMismatch { .. }));
        assert!(store.batch(batch.id).is_err(), "atomic: batch not committed");
    }

    #[test]
    fn missing_batch_lookup() {
        let store = LedgerStore::new();
        let id = BatchId::new();
        assert!(matches!(store.batch(id).unwrap_err(), GridclearError::BatchNotFound(_)));
        assert!(store.lines_for_batch(id).is_err());
    }
}
