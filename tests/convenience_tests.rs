// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::NaiveDate;
use payclip::actor::Actor;
use payclip::commands::convenience::{
    self, ChargeFilter, ChargeUpdate, NewCharge, charges_for_employee, create_charge,
    decide_charge, decide_many, delete_charge, get_charge, list_charges, update_own_charge,
};
use payclip::commands::employees::{NewEmployee, create_employee};
use payclip::error::HrError;
use payclip::models::ChargeStatus;
use payclip::visibility::Scope;
use payclip::{cli, db};
use rusqlite::Connection;
use rust_decimal::Decimal;

fn day(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn setup() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    db::init_schema(&conn).unwrap();
    conn
}

fn hire(conn: &Connection, first: &str) -> (i64, Actor) {
    let email = format!("{}@example.com", first.to_lowercase());
    let id = create_employee(
        conn,
        &Actor::system(),
        NewEmployee {
            first_name: first.into(),
            last_name: "Nair".into(),
            work_email: email.clone(),
            ..Default::default()
        },
        day("2024-01-01"),
    )
    .unwrap()
    .id;
    (id, Actor::resolve(conn, &email).unwrap())
}

fn charge(title: &str, amount: i64, date: &str) -> NewCharge {
    NewCharge {
        title: title.into(),
        amount: Decimal::from(amount),
        date: day(date),
    }
}

#[test]
fn employees_file_only_for_themselves() {
    let conn = setup();
    let (me, me_actor) = hire(&conn, "Gita");
    let (other, _) = hire(&conn, "Hari");

    let c = create_charge(&conn, &me_actor, me, charge("Taxi", 300, "2025-03-02")).unwrap();
    assert_eq!(c.status, ChargeStatus::Pending);
    assert!(c.approved_by.is_none());

    assert!(matches!(
        create_charge(&conn, &me_actor, other, charge("Taxi", 300, "2025-03-02")).unwrap_err(),
        HrError::Forbidden(_)
    ));
    assert!(matches!(
        create_charge(&conn, &me_actor, me, charge("  ", 300, "2025-03-02")).unwrap_err(),
        HrError::Validation(_)
    ));
    assert!(matches!(
        create_charge(&conn, &me_actor, me, charge("Taxi", 0, "2025-03-02")).unwrap_err(),
        HrError::Validation(_)
    ));
    assert!(matches!(
        create_charge(&conn, &Actor::system(), 999, charge("Taxi", 1, "2025-03-02")).unwrap_err(),
        HrError::NotFound(_)
    ));
}

#[test]
fn a_charge_is_decided_once() {
    let conn = setup();
    let (me, me_actor) = hire(&conn, "Jaya");
    let hr = Actor::system();
    let c = create_charge(&conn, &me_actor, me, charge("Lunch", 250, "2025-03-05")).unwrap();

    let rejected = decide_charge(
        &conn,
        &hr,
        c.id,
        ChargeStatus::Rejected,
        Some("No receipt".into()),
    )
    .unwrap();
    assert_eq!(rejected.status, ChargeStatus::Rejected);
    assert_eq!(rejected.rejection_reason.as_deref(), Some("No receipt"));
    assert!(rejected.approval_date.is_some());

    let again = decide_charge(&conn, &hr, c.id, ChargeStatus::Approved, None).unwrap_err();
    match again {
        HrError::Forbidden(msg) => assert_eq!(msg, "Only pending charges can be approved/rejected"),
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(matches!(
        decide_charge(&conn, &hr, c.id, ChargeStatus::Pending, None).unwrap_err(),
        HrError::Validation(_)
    ));
}

#[test]
fn approval_clears_any_reason() {
    let conn = setup();
    let (me, me_actor) = hire(&conn, "Kiran");
    let c = create_charge(&conn, &me_actor, me, charge("Train", 900, "2025-03-05")).unwrap();
    let approved = decide_charge(
        &conn,
        &Actor::system(),
        c.id,
        ChargeStatus::Approved,
        Some("ignored".into()),
    )
    .unwrap();
    assert_eq!(approved.status, ChargeStatus::Approved);
    assert!(approved.rejection_reason.is_none());
}

#[test]
fn owner_edits_pending_or_rejected_only() {
    let conn = setup();
    let (me, me_actor) = hire(&conn, "Lata");
    let (_, other_actor) = hire(&conn, "Mohan");
    let c = create_charge(&conn, &me_actor, me, charge("Bus", 40, "2025-03-07")).unwrap();

    let upd = || ChargeUpdate {
        amount: Some(Decimal::from(45)),
        ..Default::default()
    };
    match update_own_charge(&conn, &other_actor, c.id, upd()).unwrap_err() {
        HrError::Forbidden(msg) => assert_eq!(msg, "You can only edit your own charges"),
        other => panic!("unexpected error: {:?}", other),
    }

    let edited = update_own_charge(&conn, &me_actor, c.id, upd()).unwrap();
    assert_eq!(edited.amount, Decimal::from(45));
    assert_eq!(edited.title, "Bus");
    assert_eq!(edited.status, ChargeStatus::Pending);

    decide_charge(&conn, &Actor::system(), c.id, ChargeStatus::Rejected, None).unwrap();
    let edited = update_own_charge(&conn, &me_actor, c.id, upd()).unwrap();
    assert_eq!(edited.status, ChargeStatus::Rejected);

    let approved = create_charge(&conn, &me_actor, me, charge("Cab", 400, "2025-03-08")).unwrap();
    decide_charge(&conn, &Actor::system(), approved.id, ChargeStatus::Approved, None).unwrap();
    assert!(matches!(
        update_own_charge(&conn, &me_actor, approved.id, upd()).unwrap_err(),
        HrError::Forbidden(_)
    ));
    assert!(matches!(
        delete_charge(&conn, &me_actor, approved.id).unwrap_err(),
        HrError::Forbidden(_)
    ));
    assert!(matches!(
        delete_charge(&conn, &other_actor, c.id).unwrap_err(),
        HrError::Forbidden(_)
    ));
    delete_charge(&conn, &me_actor, c.id).unwrap();
    assert!(matches!(
        get_charge(&conn, &me_actor, c.id).unwrap_err(),
        HrError::NotFound(_)
    ));
}

#[test]
fn employees_see_only_their_own_charges() {
    let conn = setup();
    let (me, me_actor) = hire(&conn, "Nisha");
    let (other, other_actor) = hire(&conn, "Omar");
    let theirs = create_charge(&conn, &other_actor, other, charge("Tea", 20, "2025-03-09")).unwrap();

    assert!(matches!(
        get_charge(&conn, &me_actor, theirs.id).unwrap_err(),
        HrError::NotFound(_)
    ));
    match charges_for_employee(&conn, &me_actor, other).unwrap_err() {
        HrError::Forbidden(msg) => assert_eq!(msg, "You can only access your own charges"),
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(charges_for_employee(&conn, &me_actor, me).unwrap().is_empty());
    assert_eq!(get_charge(&conn, &Actor::system(), theirs.id).unwrap().id, theirs.id);
}

#[test]
fn pending_queue_is_oldest_first() {
    let conn = setup();
    let (me, me_actor) = hire(&conn, "Pooja");
    let a = create_charge(&conn, &me_actor, me, charge("First", 10, "2025-03-20")).unwrap();
    let b = create_charge(&conn, &me_actor, me, charge("Second", 10, "2025-03-01")).unwrap();

    let queue = list_charges(
        &conn,
        &Scope::unrestricted(),
        &ChargeFilter {
            status: Some(ChargeStatus::Pending),
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(queue.iter().map(|c| c.id).collect::<Vec<_>>(), [a.id, b.id]);

    let all = list_charges(&conn, &Scope::unrestricted(), &ChargeFilter::default()).unwrap();
    assert_eq!(all.iter().map(|c| c.id).collect::<Vec<_>>(), [a.id, b.id]);
    assert_eq!(all[0].date, day("2025-03-20"));
}

#[test]
fn bulk_decisions_report_each_failure() {
    let conn = setup();
    let (me, me_actor) = hire(&conn, "Quinn");
    let a = create_charge(&conn, &me_actor, me, charge("A", 10, "2025-03-01")).unwrap();
    let b = create_charge(&conn, &me_actor, me, charge("B", 10, "2025-03-02")).unwrap();
    decide_charge(&conn, &Actor::system(), b.id, ChargeStatus::Approved, None).unwrap();

    let summary = decide_many(
        &conn,
        &Actor::system(),
        &[a.id, b.id, 999],
        ChargeStatus::Approved,
        None,
    );
    assert_eq!(summary.total, 3);
    assert_eq!(summary.processed, 1);
    assert_eq!(summary.failed, 2);
    assert!(summary.errors[0].starts_with(&format!("Charge {}:", b.id)));
    assert!(summary.errors[1].starts_with("Charge 999:"));
}

#[test]
fn cli_bulk_approve_takes_comma_separated_ids() {
    let conn = setup();
    let (me, me_actor) = hire(&conn, "Ravi");
    let a = create_charge(&conn, &me_actor, me, charge("A", 10, "2025-03-01")).unwrap();
    let b = create_charge(&conn, &me_actor, me, charge("B", 10, "2025-03-02")).unwrap();

    let ids = format!("{}, {}", a.id, b.id);
    let matches = cli::build_cli().get_matches_from(["payclip", "convenience", "approve", &ids]);
    if let Some(("convenience", sub)) = matches.subcommand() {
        convenience::handle(&conn, &Actor::system(), sub).unwrap();
    } else {
        panic!("no convenience subcommand");
    }
    let approved = list_charges(
        &conn,
        &Scope::unrestricted(),
        &ChargeFilter {
            status: Some(ChargeStatus::Approved),
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(approved.len(), 2);
}
