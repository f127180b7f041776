//! Full-stack settlement runs: record events, execute, audit.

use std::collections::BTreeMap;

use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use serde_json::json;

use gridclear_ledger::{LedgerStore, audit_batch, execute_settlement, preview_netting, verify_line};
use gridclear_types::{
    EventKind, GridclearError, ParticipantRole, Policy, SettlementWindow, UsageEvent,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

fn june() -> SettlementWindow {
    SettlementWindow::new(
        Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2025, 7, 1, 0, 0, 0).unwrap(),
    )
    .unwrap()
}

#[test]
fn mieterstrom_two_tenants_one_landlord() {
    init_tracing();
    let mut store = LedgerStore::new();
    let tenant_a = store.upsert_participant("tenant-a", "Tenant A", ParticipantRole::Tenant);
    let tenant_b = store.upsert_participant("tenant-b", "Tenant B", ParticipantRole::Tenant);
    let landlord = store.upsert_participant("landlord", "Landlord", ParticipantRole::Landlord);

    let window = june();
    let price = Decimal::new(20, 2); // 0.20 EUR/kWh carried on the events
    store
        .record_events(vec![
            UsageEvent::fixture_priced(tenant_a.id, EventKind::Consumption, Decimal::new(10, 0), "local_pv", price, window.start),
            UsageEvent::fixture_priced(tenant_b.id, EventKind::Consumption, Decimal::new(4, 0), "local_pv", price, window.start),
        ])
        .unwrap();

    let policy = Policy::from_parameters(
        "mieterstrom",
        &BTreeMap::from([("operator_fee_rate".to_string(), json!(0.0))]),
    )
    .unwrap();

    let report = execute_settlement(&mut store, &policy, window).unwrap();

    let amount = |id| {
        report
            .lines
            .iter()
            .find(|l| l.participant_id == id)
            .map(|l| l.amount_eur)
    };
    assert_eq!(amount(tenant_a.id), Some(Decimal::new(200, 2)));
    assert_eq!(amount(tenant_b.id), Some(Decimal::new(80, 2)));
    assert_eq!(amount(landlord.id), Some(Decimal::new(-280, 2)));

    // Largest debtor settles first.
    assert_eq!(report.transfers.len(), 2);
    assert_eq!(report.transfers[0].debtor, tenant_a.id);
    assert_eq!(report.transfers[0].amount_eur, Decimal::new(200, 2));
    assert_eq!(report.transfers[1].debtor, tenant_b.id);
    assert_eq!(report.transfers[1].amount_eur, Decimal::new(80, 2));
    assert!(report.transfers.iter().all(|t| t.creditor == landlord.id));

    assert!(report.lines.iter().all(verify_line));
}

#[test]
fn energy_community_full_cycle_with_audit() {
    init_tracing();
    let mut store = LedgerStore::new();
    let prosumer = store.upsert_participant("prosumer", "Prosumer", ParticipantRole::Prosumer);
    let consumer = store.upsert_participant("consumer", "Consumer", ParticipantRole::Consumer);

    let window = june();
    store
        .record_events(vec![
            UsageEvent::fixture(prosumer.id, EventKind::Generation, Decimal::new(100, 0), "local_pv", window.start),
            UsageEvent::fixture(consumer.id, EventKind::Consumption, Decimal::new(50, 0), "local_pv", window.start),
            UsageEvent::fixture(consumer.id, EventKind::Consumption, Decimal::new(20, 0), "grid", window.start),
            UsageEvent::fixture(prosumer.id, EventKind::GridFeed, Decimal::new(30, 0), "local_pv", window.start),
        ])
        .unwrap();

    let policy = Policy::default_for("energy_community").unwrap();
    let report = execute_settlement(&mut store, &policy, window).unwrap();

    // Prosumer: generation 100 * 0.15 + grid feed 30 * 0.08 = 17.40 owed to them.
    let prosumer_line = report
        .lines
        .iter()
        .find(|l| l.participant_id == prosumer.id)
        .unwrap();
    assert_eq!(prosumer_line.amount_eur, Decimal::new(-1740, 2));

    // Consumer: 50 * 0.12 * 1.02 community fee + 20 * 0.35 fallback = 13.12.
    let consumer_line = report
        .lines
        .iter()
        .find(|l| l.participant_id == consumer.id)
        .unwrap();
    assert_eq!(consumer_line.amount_eur, Decimal::new(1312, 2));

    let audit = audit_batch(&store, report.batch.id, true).unwrap();
    assert!(audit.all_verified);
    assert_eq!(audit.use_case, "energy_community");
    let audited_consumer = audit
        .lines
        .iter()
        .find(|l| l.participant_id == consumer.id)
        .unwrap();
    let explanation = audited_consumer.explanation.as_deref().unwrap();
    assert!(explanation.contains("consumed 50 kWh from local sources"), "{explanation}");
    assert!(explanation.contains("consumed 20 kWh from the grid"), "{explanation}");
    assert!(explanation.ends_with("Pays 13.12 EUR."), "{explanation}");
}

#[test]
fn adjacent_windows_never_double_count() {
    init_tracing();
    let mut store = LedgerStore::new();
    let tenant = store.upsert_participant("t", "Tenant", ParticipantRole::Tenant);
    store.upsert_participant("l", "Landlord", ParticipantRole::Landlord);
    store.upsert_participant("o", "Operator", ParticipantRole::Operator);

    let june = june();
    let july = SettlementWindow::new(
        june.end,
        Utc.with_ymd_and_hms(2025, 8, 1, 0, 0, 0).unwrap(),
    )
    .unwrap();

    // One event exactly at the boundary: belongs to July, not June.
    store
        .record_events(vec![
            UsageEvent::fixture(tenant.id, EventKind::Consumption, Decimal::new(10, 0), "local_pv", june.start),
            UsageEvent::fixture(tenant.id, EventKind::Consumption, Decimal::new(7, 0), "local_pv", june.end),
        ])
        .unwrap();

    let policy = Policy::default_for("mieterstrom").unwrap();
    let june_report = execute_settlement(&mut store, &policy, june).unwrap();
    let july_report = execute_settlement(&mut store, &policy, july).unwrap();

    let tenant_amount = |report: &gridclear_ledger::SettlementReport| {
        report
            .lines
            .iter()
            .find(|l| l.participant_id == tenant.id)
            .unwrap()
            .amount_eur
    };
    // June: 10 * 0.18; July: 7 * 0.18.
    assert_eq!(tenant_amount(&june_report), Decimal::new(180, 2));
    assert_eq!(tenant_amount(&july_report), Decimal::new(126, 2));
}

#[test]
fn preview_matches_subsequent_execution() {
    init_tracing();
    let mut store = LedgerStore::new();
    let tenant = store.upsert_participant("t", "Tenant", ParticipantRole::Tenant);
    store.upsert_participant("l", "Landlord", ParticipantRole::Landlord);
    store.upsert_participant("o", "Operator", ParticipantRole::Operator);

    let window = june();
    store
        .record_events(vec![UsageEvent::fixture(
            tenant.id,
            EventKind::Consumption,
            Decimal::new(25, 0),
            "local_pv",
            window.start,
        )])
        .unwrap();

    let policy = Policy::default_for("mieterstrom").unwrap();
    let preview = preview_netting(&mut store, &policy, &window).unwrap();
    assert_eq!(store.batches().count(), 0);

    let report = execute_settlement(&mut store, &policy, window).unwrap();
    let committed: BTreeMap<_, _> = report
        .lines
        .iter()
        .map(|l| (l.participant_id, l.amount_eur))
        .collect();
    assert_eq!(preview.final_net, committed);
    assert_eq!(preview.transfers, report.transfers);
}

#[test]
fn rerun_over_same_window_is_a_new_batch() {
    init_tracing();
    let mut store = LedgerStore::new();
    let tenant = store.upsert_participant("t", "Tenant", ParticipantRole::Tenant);
    store.upsert_participant("l", "Landlord", ParticipantRole::Landlord);
    store.upsert_participant("o", "Operator", ParticipantRole::Operator);

    let window = june();
    store
        .record_events(vec![UsageEvent::fixture(
            tenant.id,
            EventKind::Consumption,
            Decimal::new(10, 0),
            "local_pv",
            window.start,
        )])
        .unwrap();

    let policy = Policy::default_for("mieterstrom").unwrap();
    let first = execute_settlement(&mut store, &policy, window).unwrap();
    let second = execute_settlement(&mut store, &policy, window).unwrap();

    assert_ne!(first.batch.id, second.batch.id);
    assert_eq!(store.batches().count(), 2);
    // Same inputs, same amounts, line ids differ only through the batch.
    for (a, b) in first.lines.iter().zip(&second.lines) {
        assert_eq!(a.participant_id, b.participant_id);
        assert_eq!(a.amount_eur, b.amount_eur);
        assert_ne!(a.id, b.id);
    }
}

#[test]
fn missing_counterparty_aborts_before_commit() {
    init_tracing();
    let mut store = LedgerStore::new();
    let tenant = store.upsert_participant("t", "Tenant", ParticipantRole::Tenant);
    // No landlord registered.
    let window = june();
    store
        .record_events(vec![UsageEvent::fixture(
            tenant.id,
            EventKind::Consumption,
            Decimal::new(10, 0),
            "local_pv",
            window.start,
        )])
        .unwrap();

    let policy = Policy::default_for("mieterstrom").unwrap();
    let err = execute_settlement(&mut store, &policy, window).unwrap_err();
    assert!(matches!(
        err,
        GridclearError::MissingCounterparty {
            role: ParticipantRole::Landlord
        }
    ));
    assert_eq!(store.batches().count(), 0);
}
