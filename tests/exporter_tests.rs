// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::NaiveDate;
use payclip::actor::Actor;
use payclip::commands::employees::{NewEmployee, create_employee};
use payclip::commands::exporter::{self, export_payslips};
use payclip::commands::payroll::{PayslipInput, generate_payslip, start_run};
use payclip::visibility::Scope;
use payclip::{cli, db};
use rusqlite::Connection;
use rust_decimal::Decimal;
use tempfile::tempdir;

fn day(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn run_with_payslip() -> (Connection, i64) {
    let conn = Connection::open_in_memory().unwrap();
    db::init_schema(&conn).unwrap();
    let emp = create_employee(
        &conn,
        &Actor::system(),
        NewEmployee {
            first_name: "Vani".into(),
            last_name: "Pillai".into(),
            work_email: "vani@example.com".into(),
            ..Default::default()
        },
        day("2024-01-01"),
    )
    .unwrap();
    let run = start_run(&conn, day("2025-01-01"), day("2025-01-31"), day("2025-02-05"))
        .unwrap()
        .id;
    generate_payslip(
        &conn,
        &Actor::system(),
        PayslipInput {
            employee_id: emp.id,
            run_id: run,
            basic: Decimal::from(20000),
            hra: Decimal::from(8000),
            professional_tax: Decimal::from(200),
            ..Default::default()
        },
        "INR",
    )
    .unwrap();
    (conn, run)
}

#[test]
fn export_payslips_writes_csv_rows() {
    let (conn, run) = run_with_payslip();
    let dir = tempdir().unwrap();
    let out = dir.path().join("payslips.csv");

    let n = export_payslips(&conn, &Scope::unrestricted(), run, "CSV", &out).unwrap();
    assert_eq!(n, 1);

    let mut rdr = csv::Reader::from_path(&out).unwrap();
    let headers = rdr.headers().unwrap().clone();
    assert_eq!(&headers[0], "employee_code");
    assert_eq!(&headers[16], "net");
    let rows: Vec<csv::StringRecord> = rdr.records().map(|r| r.unwrap()).collect();
    assert_eq!(rows.len(), 1);
    assert_eq!(&rows[0][0], "EMP0001");
    assert_eq!(&rows[0][1], "Vani Pillai");
    assert_eq!(&rows[0][2], "2025-01-01");
    assert_eq!(&rows[0][14], "28000");
    assert_eq!(&rows[0][16], "27800");
}

#[test]
fn cli_export_payslips_as_json() {
    let (conn, run) = run_with_payslip();
    let dir = tempdir().unwrap();
    let out = dir.path().join("payslips.json");
    let out_str = out.to_string_lossy().to_string();
    let run_str = run.to_string();

    let matches = cli::build_cli().get_matches_from([
        "payclip",
        "export",
        "payslips",
        "--run",
        run_str.as_str(),
        "--format",
        "json",
        "--out",
        out_str.as_str(),
    ]);
    if let Some(("export", sub)) = matches.subcommand() {
        exporter::handle(&conn, &Actor::system(), sub).unwrap();
    } else {
        panic!("no export subcommand");
    }

    let doc: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(doc["run"]["id"], run);
    let slips = doc["payslips"].as_array().unwrap();
    assert_eq!(slips.len(), 1);
    assert_eq!(slips[0]["employeeCode"], "EMP0001");
    assert_eq!(slips[0]["net"], "27800");
}

#[test]
fn unknown_format_is_rejected() {
    let (conn, run) = run_with_payslip();
    let dir = tempdir().unwrap();
    let err = export_payslips(
        &conn,
        &Scope::unrestricted(),
        run,
        "xml",
        &dir.path().join("out.xml"),
    )
    .unwrap_err();
    assert!(err.to_string().contains("Unknown format"));
}
