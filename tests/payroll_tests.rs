// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::NaiveDate;
use payclip::actor::Actor;
use payclip::commands::convenience::{NewCharge, create_charge, decide_charge, find_charge};
use payclip::commands::employees::{NewEmployee, create_employee, set_compensation};
use payclip::commands::payroll::{
    PayslipInput, ensure_current_run, generate_payslip, get_payslip, get_run, publish, start_run,
};
use payclip::db;
use payclip::error::HrError;
use payclip::models::{ChargeStatus, RunStatus};
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

fn hire(conn: &Connection, first: &str) -> i64 {
    create_employee(
        conn,
        &Actor::system(),
        NewEmployee {
            first_name: first.into(),
            last_name: "Iyer".into(),
            work_email: format!("{}@example.com", first.to_lowercase()),
            ..Default::default()
        },
        day("2024-02-01"),
    )
    .unwrap()
    .id
}

fn april_run(conn: &Connection) -> i64 {
    start_run(conn, day("2025-04-01"), day("2025-04-30"), day("2025-05-05"))
        .unwrap()
        .id
}

fn input(employee_id: i64, run_id: i64) -> PayslipInput {
    PayslipInput {
        employee_id,
        run_id,
        basic: Decimal::from(30000),
        hra: Decimal::from(12000),
        leave_deduction: Decimal::from(1000),
        professional_tax: Decimal::from(200),
        ..Default::default()
    }
}

#[test]
fn payslip_totals_and_lines() {
    let conn = setup();
    let emp = hire(&conn, "Kavya");
    let run = april_run(&conn);
    assert_eq!(get_run(&conn, run).unwrap().status, RunStatus::Draft);

    let p = generate_payslip(&conn, &Actor::system(), input(emp, run), "INR").unwrap();
    assert_eq!(p.gross, Decimal::from(42000));
    assert_eq!(p.deductions, Decimal::from(1200));
    assert_eq!(p.net, Decimal::from(40800));
    assert_eq!(p.currency, "INR");

    let labels: Vec<&str> = p.lines.iter().map(|l| l.label.as_str()).collect();
    assert_eq!(
        labels,
        [
            "Basic",
            "HRA",
            "Conveyance",
            "Medical",
            "Bonus",
            "Other Earnings",
            "Leave Deduction",
            "Professional Tax",
            "Other Deductions",
            "Gross",
            "Total Deductions",
            "Net Pay"
        ]
    );
    assert_eq!(p.lines[6].amount, Decimal::from(-1000));
    assert_eq!(p.lines[8].amount.to_string(), "0");
    assert_eq!(p.lines[11].amount, Decimal::from(40800));

    assert_eq!(get_run(&conn, run).unwrap().status, RunStatus::Paid);
}

#[test]
fn second_payslip_for_same_run_is_duplicate() {
    let conn = setup();
    let emp = hire(&conn, "Rohan");
    let run = april_run(&conn);
    generate_payslip(&conn, &Actor::system(), input(emp, run), "INR").unwrap();

    let err = generate_payslip(&conn, &Actor::system(), input(emp, run), "INR").unwrap_err();
    assert!(matches!(err, HrError::Duplicate(_)));
    let n: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM payslips WHERE employee_id = ?1 AND payroll_run_id = ?2",
            [emp, run],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(n, 1);
}

#[test]
fn negative_components_and_missing_parties_are_rejected() {
    let conn = setup();
    let emp = hire(&conn, "Neel");
    let run = april_run(&conn);

    let mut bad = input(emp, run);
    bad.bonus = Decimal::from(-1);
    assert!(matches!(
        generate_payslip(&conn, &Actor::system(), bad, "INR").unwrap_err(),
        HrError::Validation(_)
    ));
    assert!(matches!(
        generate_payslip(&conn, &Actor::system(), input(emp, 999), "INR").unwrap_err(),
        HrError::NotFound(_)
    ));
    assert!(matches!(
        generate_payslip(&conn, &Actor::system(), input(999, run), "INR").unwrap_err(),
        HrError::NotFound(_)
    ));
}

#[test]
fn currency_falls_back_to_compensation() {
    let conn = setup();
    let emp = hire(&conn, "Anya");
    set_compensation(&conn, emp, Decimal::from(90000), "USD").unwrap();
    let run = april_run(&conn);
    let p = generate_payslip(&conn, &Actor::system(), input(emp, run), "INR").unwrap();
    assert_eq!(p.currency, "USD");
}

#[test]
fn publish_fills_missing_payslips_from_base_salary() {
    let conn = setup();
    let done = hire(&conn, "Zoya");
    let pending = hire(&conn, "Kabir");
    set_compensation(&conn, pending, Decimal::from(55000), "INR").unwrap();
    let run = april_run(&conn);
    generate_payslip(&conn, &Actor::system(), input(done, run), "INR").unwrap();

    let created = publish(&conn, &Actor::system(), run, "INR").unwrap();
    assert_eq!(created, 1);
    assert_eq!(get_run(&conn, run).unwrap().status, RunStatus::Paid);

    let (net, lines): (String, String) = conn
        .query_row(
            "SELECT net, lines FROM payslips WHERE employee_id = ?1 AND payroll_run_id = ?2",
            [pending, run],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .unwrap();
    assert_eq!(net, "55000");
    assert!(lines.contains("Base Salary"));

    assert_eq!(publish(&conn, &Actor::system(), run, "INR").unwrap(), 0);
}

#[test]
fn approved_charges_are_folded_in_once() {
    let conn = setup();
    let emp = hire(&conn, "Leela");
    let run = april_run(&conn);
    let admin = Actor::system();
    let charge = create_charge(
        &conn,
        &admin,
        emp,
        NewCharge {
            title: "Cab to client".into(),
            amount: Decimal::from(450),
            date: day("2025-04-12"),
        },
    )
    .unwrap();
    let outside = create_charge(
        &conn,
        &admin,
        emp,
        NewCharge {
            title: "Hotel".into(),
            amount: Decimal::from(3000),
            date: day("2025-03-28"),
        },
    )
    .unwrap();
    decide_charge(&conn, &admin, charge.id, ChargeStatus::Approved, None).unwrap();
    decide_charge(&conn, &admin, outside.id, ChargeStatus::Approved, None).unwrap();

    let mut with_charges = input(emp, run);
    with_charges.include_charges = true;
    let p = generate_payslip(&conn, &admin, with_charges, "INR").unwrap();
    assert_eq!(p.other_earnings, Decimal::from(450));
    assert_eq!(p.gross, Decimal::from(42450));

    assert_eq!(find_charge(&conn, charge.id).unwrap().unwrap().payslip_id, Some(p.id));
    assert_eq!(find_charge(&conn, outside.id).unwrap().unwrap().payslip_id, None);
}

#[test]
fn ensure_current_run_is_idempotent() {
    let conn = setup();
    let today = day("2025-07-14");
    let run = ensure_current_run(&conn, today, 5).unwrap();
    assert_eq!(run.period_start, day("2025-07-01"));
    assert_eq!(run.period_end, day("2025-07-31"));
    assert_eq!(run.pay_date, day("2025-08-05"));

    let again = ensure_current_run(&conn, day("2025-07-30"), 10).unwrap();
    assert_eq!(again.id, run.id);
    assert_eq!(again.pay_date, day("2025-08-10"));
}

#[test]
fn run_period_must_be_ordered() {
    let conn = setup();
    let err = start_run(&conn, day("2025-04-30"), day("2025-04-01"), day("2025-05-05")).unwrap_err();
    assert!(matches!(err, HrError::Validation(_)));
}

#[test]
fn employees_only_read_their_own_payslips() {
    let conn = setup();
    let mine = hire(&conn, "Owner");
    let other = hire(&conn, "Other");
    let run = april_run(&conn);
    let own = generate_payslip(&conn, &Actor::system(), input(mine, run), "INR").unwrap();
    let theirs = generate_payslip(&conn, &Actor::system(), input(other, run), "INR").unwrap();

    let me = Actor::resolve(&conn, "owner@example.com").unwrap();
    assert_eq!(get_payslip(&conn, &me, own.id).unwrap().id, own.id);
    assert!(matches!(
        get_payslip(&conn, &me, theirs.id).unwrap_err(),
        HrError::NotFound(_)
    ));
}
