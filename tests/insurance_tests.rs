// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::NaiveDate;
use payclip::actor::Actor;
use payclip::commands::employees::{NewEmployee, create_employee};
use payclip::commands::insurance::{
    FinancialUpdate, InsuranceUpdate, NewInsurance, claim_ecash, create_insurance, get_insurance,
    update_financial, update_insurance,
};
use payclip::db;
use payclip::error::HrError;
use rusqlite::Connection;
use rust_decimal::Decimal;

fn day(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn hire(conn: &Connection, first: &str) -> (i64, Actor) {
    let email = format!("{}@example.com", first.to_lowercase());
    let id = create_employee(
        conn,
        &Actor::system(),
        NewEmployee {
            first_name: first.into(),
            last_name: "Joshi".into(),
            work_email: email.clone(),
            ..Default::default()
        },
        day("2024-01-01"),
    )
    .unwrap()
    .id;
    (id, Actor::resolve(conn, &email).unwrap())
}

fn policy(employee_id: i64) -> NewInsurance {
    NewInsurance {
        employee_id,
        policy_number: " HLT-77 ".into(),
        provider: "Star Health".into(),
        start_date: day("2025-04-01"),
        end_date: day("2026-03-31"),
        coverage_amount: Decimal::from(300000),
        bonus_percent: Some(Decimal::from(5)),
        ctc_file_url: None,
        e_cash_amount: Decimal::ZERO,
        convenience_fee: None,
    }
}

#[test]
fn create_validates_dates_and_parties() {
    let conn = Connection::open_in_memory().unwrap();
    db::init_schema(&conn).unwrap();
    let (emp, _) = hire(&conn, "Yash");

    let ins = create_insurance(&conn, &Actor::system(), policy(emp)).unwrap();
    assert_eq!(ins.policy_number, "HLT-77");
    assert_eq!(ins.bonus_percent, Some(Decimal::from(5)));

    let mut backwards = policy(emp);
    backwards.end_date = day("2025-01-01");
    assert!(matches!(
        create_insurance(&conn, &Actor::system(), backwards).unwrap_err(),
        HrError::Validation(_)
    ));
    assert!(matches!(
        create_insurance(&conn, &Actor::system(), policy(999)).unwrap_err(),
        HrError::NotFound(_)
    ));
    assert!(matches!(
        update_insurance(
            &conn,
            &Actor::system(),
            ins.id,
            InsuranceUpdate {
                start_date: Some(day("2026-06-01")),
                ..Default::default()
            },
        )
        .unwrap_err(),
        HrError::Validation(_)
    ));
}

#[test]
fn ecash_is_claimed_on_own_policy_only() {
    let conn = Connection::open_in_memory().unwrap();
    db::init_schema(&conn).unwrap();
    let (owner, owner_actor) = hire(&conn, "Zara");
    let (_, other_actor) = hire(&conn, "Abhi");
    let ins = create_insurance(&conn, &Actor::system(), policy(owner)).unwrap();

    assert!(matches!(
        claim_ecash(&conn, &other_actor, ins.id, Decimal::from(100)).unwrap_err(),
        HrError::Forbidden(_)
    ));
    assert!(matches!(
        get_insurance(&conn, &other_actor, ins.id).unwrap_err(),
        HrError::NotFound(_)
    ));

    let claimed = claim_ecash(&conn, &owner_actor, ins.id, Decimal::from(1500)).unwrap();
    assert_eq!(claimed.e_cash_amount, Decimal::from(1500));
    assert_eq!(claimed.bonus_percent, Some(Decimal::from(5)));

    assert!(matches!(
        update_financial(
            &conn,
            &Actor::system(),
            ins.id,
            FinancialUpdate {
                convenience_fee: Some(Decimal::from(-1)),
                ..Default::default()
            },
        )
        .unwrap_err(),
        HrError::Validation(_)
    ));
}

#[test]
fn negative_amounts_are_rejected() {
    let conn = Connection::open_in_memory().unwrap();
    db::init_schema(&conn).unwrap();
    let (emp, _) = hire(&conn, "Kiran");

    let mut coverage = policy(emp);
    coverage.coverage_amount = Decimal::from(-1);
    let mut ecash = policy(emp);
    ecash.e_cash_amount = Decimal::from(-250);
    let mut fee = policy(emp);
    fee.convenience_fee = Some(Decimal::from(-10));
    let mut bonus = policy(emp);
    bonus.bonus_percent = Some(Decimal::from(-5));
    for bad in [coverage, ecash, fee, bonus] {
        assert!(matches!(
            create_insurance(&conn, &Actor::system(), bad).unwrap_err(),
            HrError::Validation(_)
        ));
    }
    let n: i64 = conn
        .query_row("SELECT COUNT(*) FROM insurances", [], |r| r.get(0))
        .unwrap();
    assert_eq!(n, 0);

    let ins = create_insurance(&conn, &Actor::system(), policy(emp)).unwrap();
    assert!(matches!(
        update_insurance(
            &conn,
            &Actor::system(),
            ins.id,
            InsuranceUpdate {
                coverage_amount: Some(Decimal::from(-100)),
                ..Default::default()
            },
        )
        .unwrap_err(),
        HrError::Validation(_)
    ));
    let kept = get_insurance(&conn, &Actor::system(), ins.id).unwrap();
    assert_eq!(kept.coverage_amount, Decimal::from(300000));
}
