//! Pipeline determinism: shuffled input must produce identical output.

use std::collections::BTreeMap;

use chrono::{Duration, TimeZone, Utc};
use rand::seq::SliceRandom;
use rand::{SeedableRng, rngs::StdRng};
use rust_decimal::Decimal;

use gridclear_engine::{accumulate_balances, aggregate, evaluate, net_balances, CounterpartyDirectory};
use gridclear_types::{
    EventKind, Participant, ParticipantId, ParticipantRole, Policy, SettlementWindow, UsageEvent,
};

fn setup() -> (
    BTreeMap<ParticipantId, Participant>,
    SettlementWindow,
    Vec<UsageEvent>,
) {
    let roles = [
        ("T1", ParticipantRole::Tenant),
        ("T2", ParticipantRole::Tenant),
        ("T3", ParticipantRole::CommercialTenant),
        ("L", ParticipantRole::Landlord),
        ("O", ParticipantRole::Operator),
        ("MKT", ParticipantRole::ExternalMarket),
    ];
    let participants: BTreeMap<ParticipantId, Participant> = roles
        .iter()
        .map(|(ext, role)| {
            let p = Participant::new(*ext, format!("Participant {ext}"), *role);
            (p.id, p)
        })
        .collect();
    let window = SettlementWindow::new(
        Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2025, 6, 2, 0, 0, 0).unwrap(),
    )
    .unwrap();

    let id = |ext: &str| {
        participants
            .values()
            .find(|p| p.external_id == ext)
            .unwrap()
            .id
    };

    let mut events = Vec::new();
    for hour in 0..24 {
        let ts = window.start + Duration::hours(hour);
        events.push(UsageEvent::fixture(
            id("T1"),
            EventKind::Consumption,
            Decimal::new(1 + hour % 3, 0),
            "local_pv",
            ts,
        ));
        events.push(UsageEvent::fixture(
            id("T2"),
            EventKind::Consumption,
            Decimal::new(2, 0),
            "grid",
            ts,
        ));
        events.push(UsageEvent::fixture(
            id("T3"),
            EventKind::Consumption,
            Decimal::new(7, 1), // 0.7 kWh, exercises sub-cent pricing
            "local_pv",
            ts,
        ));
        events.push(UsageEvent::fixture(
            id("L"),
            EventKind::GridFeed,
            Decimal::new(3, 0),
            "local_pv",
            ts,
        ));
    }
    events.push(UsageEvent::fixture_fee(
        id("T1"),
        Decimal::new(500, 2),
        window.start,
    ));

    (participants, window, events)
}

#[test]
fn shuffled_input_is_byte_identical() {
    let (participants, window, events) = setup();
    let policy = Policy::default_for("mieterstrom").unwrap();
    let directory = CounterpartyDirectory::from_participants(&participants);
    let netting = policy.netting().clone();
    let roles: BTreeMap<_, _> = participants.values().map(|p| (p.id, p.role)).collect();

    let run = |input: &[UsageEvent]| {
        let usage = aggregate(input, &participants, &window).unwrap();
        let postings = evaluate(&usage, &participants, &policy, &directory).unwrap();
        let balances = accumulate_balances(&postings);
        let outcome = net_balances(&balances, &roles, &netting);
        (balances, outcome)
    };

    let (baseline_balances, baseline) = run(&events);

    let mut rng = StdRng::seed_from_u64(42);
    for _ in 0..5 {
        let mut shuffled = events.clone();
        shuffled.shuffle(&mut rng);
        let (balances, outcome) = run(&shuffled);
        assert_eq!(balances, baseline_balances);
        assert_eq!(outcome.final_net, baseline.final_net);
        assert_eq!(outcome.suppressed, baseline.suppressed);
        assert_eq!(outcome.transfers, baseline.transfers);
    }
}

#[test]
fn nets_balance_across_the_whole_run() {
    let (participants, window, events) = setup();
    let policy = Policy::default_for("mieterstrom").unwrap();
    let directory = CounterpartyDirectory::from_participants(&participants);

    let usage = aggregate(&events, &participants, &window).unwrap();
    let postings = evaluate(&usage, &participants, &policy, &directory).unwrap();
    let balances = accumulate_balances(&postings);

    let sum: Decimal = balances.values().map(gridclear_types::BalanceEntry::net).sum();
    assert_eq!(sum, Decimal::ZERO);

    let outcome = net_balances(&balances, &BTreeMap::new(), policy.netting());
    gridclear_engine::check_conservation(&balances, &outcome).unwrap();
}
