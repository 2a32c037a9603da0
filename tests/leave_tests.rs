// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::NaiveDate;
use payclip::actor::Actor;
use payclip::commands::employees::{NewEmployee, create_employee, set_status};
use payclip::commands::leave::{
    self, NewLeaveRequest, approve_request, cancel_request, create_request, get_request,
};
use payclip::commands::ledger::{adjust_balance, find_balance, set_initial_allocation};
use payclip::commands::policies::{NewPolicy, SPECIAL_LEAVE, create_policy};
use payclip::error::HrError;
use payclip::models::{LeaveStatus, Period};
use payclip::{cli, db};
use rusqlite::Connection;
use rust_decimal::Decimal;
use std::str::FromStr;

fn d(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn day(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn march() -> Period {
    Period::new(2025, 3).unwrap()
}

fn setup() -> (Connection, i64, i64) {
    let conn = Connection::open_in_memory().unwrap();
    db::init_schema(&conn).unwrap();
    let emp = create_employee(
        &conn,
        &Actor::system(),
        NewEmployee {
            first_name: "Asha".into(),
            last_name: "Rao".into(),
            work_email: "asha@example.com".into(),
            ..Default::default()
        },
        day("2024-01-15"),
    )
    .unwrap();
    let policy = create_policy(&conn, NewPolicy::named("Casual")).unwrap();
    (conn, emp.id, policy.id)
}

fn request(policy_id: i64, start: &str, end: &str, days: &str) -> NewLeaveRequest {
    NewLeaveRequest {
        policy_id,
        start_date: day(start),
        end_date: day(end),
        days: d(days),
        half_day: false,
        reason: None,
    }
}

#[test]
fn assignment_resets_the_period_row() {
    let (conn, emp, pol) = setup();
    let b = set_initial_allocation(&conn, emp, pol, d("10"), march()).unwrap();
    assert_eq!((b.opening, b.allotted, b.closing), (d("10"), d("10"), d("10")));
    assert_eq!(b.used, Decimal::ZERO);

    let req = create_request(&conn, emp, request(pol, "2025-03-03", "2025-03-04", "2"), march())
        .unwrap();
    approve_request(&conn, req.id, &Actor::system(), march()).unwrap();
    adjust_balance(&conn, emp, pol, march(), d("1.5")).unwrap();

    let b = set_initial_allocation(&conn, emp, pol, d("12"), march()).unwrap();
    assert_eq!(b.opening, d("12"));
    assert_eq!(b.closing, d("12"));
    assert_eq!(b.used, Decimal::ZERO);
    assert_eq!(b.adjusted, Decimal::ZERO);
}

#[test]
fn approval_debits_exactly_once() {
    let (conn, emp, pol) = setup();
    set_initial_allocation(&conn, emp, pol, d("10"), march()).unwrap();
    let req = create_request(&conn, emp, request(pol, "2025-03-10", "2025-03-11", "2"), march())
        .unwrap();

    // Submission alone leaves the ledger untouched.
    let b = find_balance(&conn, emp, pol, march()).unwrap().unwrap();
    assert_eq!(b.closing, d("10"));

    let approved = approve_request(&conn, req.id, &Actor::system(), march()).unwrap();
    assert_eq!(approved.status, LeaveStatus::Approved);
    assert!(approved.approved_at.is_some());
    let b = find_balance(&conn, emp, pol, march()).unwrap().unwrap();
    assert_eq!(b.used, d("2"));
    assert_eq!(b.closing, d("8"));
    assert_eq!(b.closing, b.expected_closing());

    let err = approve_request(&conn, req.id, &Actor::system(), march()).unwrap_err();
    assert!(matches!(err, HrError::Validation(_)));
    let b = find_balance(&conn, emp, pol, march()).unwrap().unwrap();
    assert_eq!(b.closing, d("8"));
}

#[test]
fn half_day_is_debited_as_half() {
    let (conn, emp, pol) = setup();
    set_initial_allocation(&conn, emp, pol, d("1"), march()).unwrap();
    let mut r = request(pol, "2025-03-12", "2025-03-12", "0.5");
    r.half_day = true;
    let req = create_request(&conn, emp, r, march()).unwrap();
    approve_request(&conn, req.id, &Actor::system(), march()).unwrap();
    let b = find_balance(&conn, emp, pol, march()).unwrap().unwrap();
    assert_eq!(b.closing, d("0.5"));
}

#[test]
fn over_balance_request_is_loss_of_pay() {
    let (conn, emp, pol) = setup();
    set_initial_allocation(&conn, emp, pol, d("3"), march()).unwrap();
    let err = create_request(&conn, emp, request(pol, "2025-03-03", "2025-03-06", "4"), march())
        .unwrap_err();
    match err {
        HrError::Validation(msg) => assert!(msg.contains("Loss of Pay")),
        other => panic!("unexpected error: {:?}", other),
    }
    let n: i64 = conn
        .query_row("SELECT COUNT(*) FROM leave_requests", [], |r| r.get(0))
        .unwrap();
    assert_eq!(n, 0);
    let b = find_balance(&conn, emp, pol, march()).unwrap().unwrap();
    assert_eq!(b.closing, d("3"));
}

#[test]
fn request_without_balance_row_is_rejected() {
    let (conn, emp, pol) = setup();
    let err = create_request(&conn, emp, request(pol, "2025-03-03", "2025-03-03", "1"), march())
        .unwrap_err();
    assert!(matches!(err, HrError::Validation(_)));
}

#[test]
fn unknown_policy_is_invalid() {
    let (conn, emp, _) = setup();
    let err = create_request(&conn, emp, request(999, "2025-03-03", "2025-03-03", "1"), march())
        .unwrap_err();
    match err {
        HrError::Validation(msg) => assert_eq!(msg, "Invalid leave policy"),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn probation_blocks_paid_leave() {
    let (conn, emp, pol) = setup();
    set_initial_allocation(&conn, emp, pol, d("5"), march()).unwrap();
    set_status(&conn, &Actor::system(), emp, "Probation", None).unwrap();
    let err = create_request(&conn, emp, request(pol, "2025-03-03", "2025-03-03", "1"), march())
        .unwrap_err();
    assert!(matches!(err, HrError::Forbidden(_)));
}

#[test]
fn special_leave_allows_one_per_month() {
    let (conn, emp, _) = setup();
    let special = create_policy(&conn, NewPolicy::named(SPECIAL_LEAVE)).unwrap();
    set_initial_allocation(&conn, emp, special.id, d("30"), march()).unwrap();

    for month in 1..=12 {
        let date = format!("2025-{:02}-10", month);
        create_request(&conn, emp, request(special.id, &date, &date, "1"), march()).unwrap();
    }

    let second_in_month =
        create_request(&conn, emp, request(special.id, "2025-05-20", "2025-05-20", "1"), march())
            .unwrap_err();
    match second_in_month {
        HrError::Validation(msg) => assert!(msg.contains("per month")),
        other => panic!("unexpected error: {:?}", other),
    }

    // A cancelled request frees its month; the next year starts from zero.
    let first = get_request(&conn, 1).unwrap();
    cancel_request(&conn, emp, first.id).unwrap();
    create_request(&conn, emp, request(special.id, "2025-01-20", "2025-01-20", "1"), march())
        .unwrap();
    let next_year =
        create_request(&conn, emp, request(special.id, "2026-01-05", "2026-01-05", "1"), march());
    assert!(next_year.is_ok());
}

#[test]
fn cancel_only_own_pending_requests() {
    let (conn, emp, pol) = setup();
    set_initial_allocation(&conn, emp, pol, d("5"), march()).unwrap();
    let req = create_request(&conn, emp, request(pol, "2025-03-03", "2025-03-03", "1"), march())
        .unwrap();
    assert!(matches!(
        cancel_request(&conn, emp + 1, req.id).unwrap_err(),
        HrError::NotFound(_)
    ));
    let c = cancel_request(&conn, emp, req.id).unwrap();
    assert_eq!(c.status, LeaveStatus::Cancelled);
    assert!(matches!(
        cancel_request(&conn, emp, req.id).unwrap_err(),
        HrError::Validation(_)
    ));
}

#[test]
fn cli_half_day_request_defaults_to_half() {
    let (conn, emp, pol) = setup();
    set_initial_allocation(&conn, emp, pol, d("2"), march()).unwrap();
    let actor = Actor::resolve(&conn, "asha@example.com").unwrap();

    let matches = cli::build_cli().get_matches_from([
        "payclip",
        "leave",
        "request",
        "--policy",
        " Casual ",
        "--start",
        "2025-03-14",
        "--half-day",
        "--period",
        "2025-03",
    ]);
    if let Some(("leave", leave_m)) = matches.subcommand() {
        leave::handle(&conn, &actor, leave_m).unwrap();
    } else {
        panic!("no leave subcommand");
    }

    let req = get_request(&conn, 1).unwrap();
    assert_eq!(req.days, d("0.5"));
    assert!(req.half_day);
    assert_eq!(req.status, LeaveStatus::Pending);
}
