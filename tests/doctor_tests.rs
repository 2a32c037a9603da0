// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::NaiveDate;
use payclip::actor::Actor;
use payclip::commands::doctor::{self, diagnose};
use payclip::commands::employees::{NewEmployee, create_employee};
use payclip::commands::ledger::set_initial_allocation;
use payclip::commands::payroll::{PayslipInput, generate_payslip, start_run};
use payclip::commands::policies::{NewPolicy, create_policy};
use payclip::commands::users::add_user;
use payclip::error::HrError;
use payclip::models::{Period, Role};
use payclip::visibility::Scope;
use payclip::{cli, db};
use rusqlite::Connection;
use rust_decimal::Decimal;

fn day(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn seeded() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    db::init_schema(&conn).unwrap();
    let emp = create_employee(
        &conn,
        &Actor::system(),
        NewEmployee {
            first_name: "Uma".into(),
            last_name: "Bose".into(),
            work_email: "uma@example.com".into(),
            ..Default::default()
        },
        day("2024-01-01"),
    )
    .unwrap()
    .id;
    let pol = create_policy(&conn, NewPolicy::named("Casual")).unwrap().id;
    set_initial_allocation(&conn, emp, pol, Decimal::from(5), Period::new(2025, 1).unwrap())
        .unwrap();
    let run = start_run(&conn, day("2025-01-01"), day("2025-01-31"), day("2025-02-05"))
        .unwrap()
        .id;
    generate_payslip(
        &conn,
        &Actor::system(),
        PayslipInput {
            employee_id: emp,
            run_id: run,
            basic: Decimal::from(10000),
            ..Default::default()
        },
        "INR",
    )
    .unwrap();
    conn
}

#[test]
fn consistent_data_has_no_issues() {
    let conn = seeded();
    assert!(diagnose(&conn, &Scope::unrestricted()).unwrap().is_empty());
}

#[test]
fn drifted_rows_and_overlaps_are_reported() {
    let conn = seeded();
    conn.execute("UPDATE leave_balances SET closing = '9'", []).unwrap();
    conn.execute("UPDATE payslips SET net = '1'", []).unwrap();
    start_run(&conn, day("2025-01-15"), day("2025-02-14"), day("2025-02-20")).unwrap();

    let kinds: Vec<&str> = diagnose(&conn, &Scope::unrestricted())
        .unwrap()
        .iter()
        .map(|i| i.kind)
        .collect();
    assert_eq!(
        kinds,
        ["ledger_closing_mismatch", "payslip_net_mismatch", "overlapping_runs"]
    );
}

#[test]
fn executive_rows_are_masked_and_employees_are_refused() {
    let conn = seeded();
    add_user(&conn, "chief@example.com", Role::Md).unwrap();
    let chief = create_employee(
        &conn,
        &Actor::system(),
        NewEmployee {
            first_name: "Chief".into(),
            last_name: "Rao".into(),
            work_email: "chief@example.com".into(),
            ..Default::default()
        },
        day("2020-01-01"),
    )
    .unwrap()
    .id;
    let pol = create_policy(&conn, NewPolicy::named("Earned")).unwrap().id;
    set_initial_allocation(&conn, chief, pol, Decimal::from(3), Period::new(2025, 1).unwrap())
        .unwrap();
    conn.execute(
        "UPDATE leave_balances SET closing = '99' WHERE employee_id = ?1",
        [chief],
    )
    .unwrap();

    assert!(diagnose(&conn, &Scope::for_role(Role::Hr)).unwrap().is_empty());
    let seen = diagnose(&conn, &Scope::for_role(Role::Md)).unwrap();
    assert_eq!(seen.len(), 1);
    assert!(seen[0].detail.contains("EMP0002"));

    let uma = Actor::resolve(&conn, "uma@example.com").unwrap();
    let matches = cli::build_cli().get_matches_from(["payclip", "doctor"]);
    let Some(("doctor", sub)) = matches.subcommand() else {
        panic!("no doctor subcommand");
    };
    let err = doctor::handle(&conn, &uma, sub).unwrap_err();
    assert!(matches!(err.downcast_ref::<HrError>(), Some(HrError::Forbidden(_))));
}
