// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::NaiveDate;
use payclip::actor::Actor;
use payclip::commands::employees::list_employees;
use payclip::commands::importer::{self, import_charges, import_employees};
use payclip::error::HrError;
use payclip::visibility::Scope;
use payclip::{cli, db};
use rusqlite::Connection;
use std::fs;
use tempfile::tempdir;

fn setup() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    db::init_schema(&conn).unwrap();
    conn
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()
}

const HEADER: &str =
    "first_name,last_name,work_email,department,designation,location,status,hire_date,birthdate\n";

#[test]
fn import_employees_assigns_codes_in_file_order() {
    let conn = setup();
    let dir = tempdir().unwrap();
    let path = dir.path().join("people.csv");
    fs::write(
        &path,
        format!(
            "{}Anil,Kapoor,anil@example.com,Sales,Rep,Delhi,,2024-04-01,\n\
             Bina,Roy, BINA@example.com ,,,,Probation,,1990-02-03\n",
            HEADER
        ),
    )
    .unwrap();

    let ids = import_employees(&conn, &Actor::system(), &path, today()).unwrap();
    assert_eq!(ids.len(), 2);

    let emps = list_employees(&conn, &Scope::unrestricted()).unwrap();
    let anil = emps.iter().find(|e| e.first_name == "Anil").unwrap();
    let bina = emps.iter().find(|e| e.first_name == "Bina").unwrap();
    assert_eq!(anil.person_no, "EMP0001");
    assert_eq!(anil.hire_date, NaiveDate::from_ymd_opt(2024, 4, 1).unwrap());
    assert_eq!(anil.department.as_deref(), Some("Sales"));
    assert_eq!(bina.person_no, "EMP0002");
    assert_eq!(bina.work_email, "bina@example.com");
    assert_eq!(bina.status, "Probation");
    assert_eq!(bina.hire_date, today());

    let audited: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM audit_logs WHERE module = 'EMPLOYEE' AND action = 'IMPORT'",
            [],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(audited, 1);
}

#[test]
fn a_bad_row_rolls_back_the_whole_import() {
    let conn = setup();
    let dir = tempdir().unwrap();
    let path = dir.path().join("people.csv");
    fs::write(
        &path,
        format!(
            "{}Chitra,Menon,chitra@example.com,,,,,,\n\
             Dinesh,Iqbal,chitra@example.com,,,,,,\n",
            HEADER
        ),
    )
    .unwrap();

    let err = import_employees(&conn, &Actor::system(), &path, today()).unwrap_err();
    match err.downcast_ref::<HrError>() {
        Some(HrError::Duplicate(msg)) => assert!(msg.starts_with("Line 3:")),
        other => panic!("unexpected error: {:?}", other),
    }
    let n: i64 = conn
        .query_row("SELECT COUNT(*) FROM employees", [], |r| r.get(0))
        .unwrap();
    assert_eq!(n, 0);
    let users: i64 = conn
        .query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0))
        .unwrap();
    assert_eq!(users, 0);
}

#[test]
fn import_charges_reports_bad_rows() {
    let conn = setup();
    let dir = tempdir().unwrap();
    let people = dir.path().join("people.csv");
    fs::write(&people, format!("{}Esha,Gupta,esha@example.com,,,,,,\n", HEADER)).unwrap();
    let ids = import_employees(&conn, &Actor::system(), &people, today()).unwrap();

    let charges = dir.path().join("charges.csv");
    fs::write(
        &charges,
        "title,amount,date\n\
         Cab,350,2025-02-10\n\
         ,100,2025-02-11\n\
         Dinner,abc,2025-02-12\n\
         Parking,-5,2025-02-13\n\
         Metro,40,2025-02-14\n",
    )
    .unwrap();

    let esha = Actor::resolve(&conn, "esha@example.com").unwrap();
    let summary = import_charges(&conn, &esha, ids[0], &charges).unwrap();
    assert_eq!(summary.total, 5);
    assert_eq!(summary.processed, 2);
    assert_eq!(summary.failed, 3);
    assert_eq!(summary.errors.len(), 3);

    let filed: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM convenience_charges WHERE status = 'PENDING'",
            [],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(filed, 2);
}

#[test]
fn cli_import_employees_requires_hr() {
    let conn = setup();
    let dir = tempdir().unwrap();
    let path = dir.path().join("people.csv");
    fs::write(&path, format!("{}Farah,Khan,farah@example.com,,,,,,\n", HEADER)).unwrap();
    let path_str = path.to_string_lossy().to_string();

    let matches = cli::build_cli().get_matches_from(["payclip", "import", "employees", &path_str]);
    let Some(("import", sub)) = matches.subcommand() else {
        panic!("no import subcommand");
    };
    importer::handle(&conn, &Actor::system(), today(), sub).unwrap();

    let farah = Actor::resolve(&conn, "farah@example.com").unwrap();
    let err = importer::handle(&conn, &farah, today(), sub).unwrap_err();
    assert!(matches!(err.downcast_ref::<HrError>(), Some(HrError::Forbidden(_))));
}
