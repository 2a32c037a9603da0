// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::NaiveDate;
use payclip::actor::Actor;
use payclip::commands::employees::{
    self, EmployeeUpdate, NewEmployee, code_allowed, create_employee, get_compensation,
    next_employee_code, set_compensation, update_employee,
};
use payclip::commands::users::{add_user, find_user, set_role};
use payclip::error::HrError;
use payclip::models::Role;
use payclip::{cli, db};
use rusqlite::Connection;
use rust_decimal::Decimal;

fn setup() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    db::init_schema(&conn).unwrap();
    conn
}

fn new_employee(first: &str) -> NewEmployee {
    NewEmployee {
        first_name: first.into(),
        last_name: "Das".into(),
        work_email: format!("{}@example.com", first.to_lowercase()),
        ..Default::default()
    }
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 2, 10).unwrap()
}

#[test]
fn code_numbers_with_eight_are_skipped() {
    assert!(code_allowed(1));
    assert!(code_allowed(9));
    assert!(!code_allowed(8));
    assert!(!code_allowed(17));
    assert!(!code_allowed(18));
    assert!(!code_allowed(26));
    assert!(!code_allowed(80));
    assert!(code_allowed(19));
}

#[test]
fn generated_codes_skip_eight_and_digit_sum_eight() {
    let conn = setup();
    let mut codes = Vec::new();
    for i in 0..8 {
        let e = create_employee(
            &conn,
            &Actor::system(),
            new_employee(&format!("Emp{}", i)),
            today(),
        )
        .unwrap();
        codes.push(e.person_no);
    }
    assert_eq!(
        codes,
        ["EMP0001", "EMP0002", "EMP0003", "EMP0004", "EMP0005", "EMP0006", "EMP0007", "EMP0009"]
    );

    conn.execute("UPDATE employees SET person_no = 'EMP0016' WHERE person_no = 'EMP0009'", [])
        .unwrap();
    assert_eq!(next_employee_code(&conn).unwrap(), "EMP0019");
}

#[test]
fn oversized_stored_code_exhausts_the_space() {
    let conn = setup();
    create_employee(&conn, &Actor::system(), new_employee("Huge"), today()).unwrap();
    conn.execute("UPDATE employees SET person_no = 'EMP4294967295'", [])
        .unwrap();
    assert!(matches!(
        next_employee_code(&conn).unwrap_err(),
        HrError::Validation(_)
    ));
    assert!(matches!(
        create_employee(&conn, &Actor::system(), new_employee("Next"), today()).unwrap_err(),
        HrError::Validation(_)
    ));
}

#[test]
fn create_links_or_creates_the_user() {
    let conn = setup();
    add_user(&conn, "Boss@Example.com", Role::Md).unwrap();

    let boss = create_employee(
        &conn,
        &Actor::system(),
        NewEmployee {
            first_name: "Big".into(),
            last_name: "Boss".into(),
            work_email: "boss@example.com".into(),
            ..Default::default()
        },
        today(),
    )
    .unwrap();
    let linked = find_user(&conn, "boss@example.com").unwrap().unwrap();
    assert_eq!(boss.user_id, Some(linked.id));
    assert_eq!(linked.role, Role::Md);

    let e = create_employee(&conn, &Actor::system(), new_employee("Priya"), today()).unwrap();
    assert_eq!(e.status, "Active");
    assert_eq!(e.hire_date, today());
    let u = find_user(&conn, "priya@example.com").unwrap().unwrap();
    assert_eq!(u.role, Role::Employee);
}

#[test]
fn duplicate_work_email_is_rejected() {
    let conn = setup();
    create_employee(&conn, &Actor::system(), new_employee("Sam"), today()).unwrap();
    let err = create_employee(&conn, &Actor::system(), new_employee("Sam"), today()).unwrap_err();
    assert!(matches!(err, HrError::Duplicate(_)));
    let n: i64 = conn
        .query_row("SELECT COUNT(*) FROM employees", [], |r| r.get(0))
        .unwrap();
    assert_eq!(n, 1);
}

#[test]
fn only_hr_or_the_owner_may_update() {
    let conn = setup();
    let a = create_employee(&conn, &Actor::system(), new_employee("Alpha"), today()).unwrap();
    create_employee(&conn, &Actor::system(), new_employee("Beta"), today()).unwrap();

    let beta = Actor::resolve(&conn, "beta@example.com").unwrap();
    let err = update_employee(
        &conn,
        &beta,
        a.id,
        EmployeeUpdate {
            location: Some("Pune".into()),
            ..Default::default()
        },
    )
    .unwrap_err();
    assert!(matches!(err, HrError::Forbidden(_)));

    let alpha = Actor::resolve(&conn, "alpha@example.com").unwrap();
    let updated = update_employee(
        &conn,
        &alpha,
        a.id,
        EmployeeUpdate {
            location: Some("Pune".into()),
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(updated.location.as_deref(), Some("Pune"));

    let changes: String = conn
        .query_row(
            "SELECT changes FROM audit_logs WHERE module = 'EMPLOYEE' AND action = 'UPDATE'",
            [],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(changes, "location: null → Pune");
}

#[test]
fn compensation_must_not_be_negative() {
    let conn = setup();
    let e = create_employee(&conn, &Actor::system(), new_employee("Chen"), today()).unwrap();
    assert!(matches!(
        set_compensation(&conn, e.id, Decimal::from(-5), "INR").unwrap_err(),
        HrError::Validation(_)
    ));
    set_compensation(&conn, e.id, Decimal::from(40000), "INR").unwrap();
    set_compensation(&conn, e.id, Decimal::from(45000), "INR").unwrap();
    let c = get_compensation(&conn, e.id).unwrap().unwrap();
    assert_eq!(c.base_salary, Decimal::from(45000));
    assert!(matches!(
        set_compensation(&conn, 999, Decimal::from(1), "INR").unwrap_err(),
        HrError::NotFound(_)
    ));
}

#[test]
fn cli_add_trims_inputs() {
    let conn = setup();
    let matches = cli::build_cli().get_matches_from([
        "payclip",
        "employee",
        "add",
        "--first",
        "  Ira ",
        "--last",
        " Sen ",
        "--email",
        " IRA@Example.com ",
        "--department",
        " Finance ",
    ]);
    if let Some(("employee", sub)) = matches.subcommand() {
        employees::handle(&conn, &Actor::system(), "INR", sub).unwrap();
    } else {
        panic!("no employee subcommand");
    }
    let (name, email, dept): (String, String, String) = conn
        .query_row(
            "SELECT first_name, work_email, department FROM employees",
            [],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
        )
        .unwrap();
    assert_eq!(name, "Ira");
    assert_eq!(email, "ira@example.com");
    assert_eq!(dept, "Finance");
}

#[test]
fn employees_cannot_manage_users() {
    let conn = setup();
    create_employee(&conn, &Actor::system(), new_employee("Plain"), today()).unwrap();
    let plain = Actor::resolve(&conn, "plain@example.com").unwrap();
    let matches = cli::build_cli().get_matches_from(["payclip", "user", "add", "x@example.com"]);
    if let Some(("user", sub)) = matches.subcommand() {
        let err = payclip::commands::users::handle(&conn, &plain, sub).unwrap_err();
        assert!(matches!(err.downcast_ref::<HrError>(), Some(HrError::Forbidden(_))));
    } else {
        panic!("no user subcommand");
    }
}

#[test]
fn only_admin_grants_executive_roles() {
    let conn = setup();
    add_user(&conn, "hr@example.com", Role::Hr).unwrap();
    add_user(&conn, "md@example.com", Role::Md).unwrap();
    add_user(&conn, "staff@example.com", Role::Employee).unwrap();
    let hr = Actor::resolve(&conn, "hr@example.com").unwrap();

    for role in [Role::Md, Role::Cao, Role::Admin] {
        assert!(matches!(
            set_role(&conn, &hr, "hr@example.com", role).unwrap_err(),
            HrError::Forbidden(_)
        ));
    }
    assert!(matches!(
        set_role(&conn, &hr, "md@example.com", Role::Employee).unwrap_err(),
        HrError::Forbidden(_)
    ));
    assert_eq!(
        find_user(&conn, "md@example.com").unwrap().unwrap().role,
        Role::Md
    );

    let promoted = set_role(&conn, &hr, "staff@example.com", Role::Manager).unwrap();
    assert_eq!(promoted.role, Role::Manager);
    let granted = set_role(&conn, &Actor::system(), "staff@example.com", Role::Cao).unwrap();
    assert_eq!(granted.role, Role::Cao);

    let matches =
        cli::build_cli().get_matches_from(["payclip", "user", "add", "x@example.com", "MD"]);
    let Some(("user", sub)) = matches.subcommand() else {
        panic!("no user subcommand");
    };
    let err = payclip::commands::users::handle(&conn, &hr, sub).unwrap_err();
    assert!(matches!(err.downcast_ref::<HrError>(), Some(HrError::Forbidden(_))));
    assert!(find_user(&conn, "x@example.com").unwrap().is_none());
}
