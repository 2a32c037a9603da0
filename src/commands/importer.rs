// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::actor::Actor;
use crate::commands::audit::{self, AuditEntry};
use crate::commands::convenience::{BulkSummary, NewCharge, create_many};
use crate::commands::employees::{NewEmployee, insert_employee};
use crate::db::unit_of_work;
use crate::error::HrError;
use crate::models::HR_ADMINS;
use crate::utils::{id_for_employee, opt_str, parse_date, parse_decimal, req_str};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord};
use rusqlite::Connection;
use std::path::Path;

pub fn handle(
    conn: &Connection,
    actor: &Actor,
    today: NaiveDate,
    m: &clap::ArgMatches,
) -> Result<()> {
    match m.subcommand() {
        Some(("employees", sub)) => {
            actor.require(HR_ADMINS)?;
            let path = req_str(sub, "path")?;
            let ids = import_employees(conn, actor, Path::new(&path), today)?;
            println!("Imported {} employees from {}", ids.len(), path);
        }
        Some(("charges", sub)) => {
            let employee_id = match opt_str(sub, "employee") {
                Some(code) => id_for_employee(conn, &code)?,
                None => actor.own_employee()?,
            };
            let path = req_str(sub, "path")?;
            let summary = import_charges(conn, actor, employee_id, Path::new(&path))?;
            println!(
                "{} charges: {} filed, {} failed",
                summary.total, summary.processed, summary.failed
            );
            for e in &summary.errors {
                println!("  {}", e);
            }
        }
        _ => {}
    }
    Ok(())
}

fn field(rec: &StringRecord, idx: usize) -> Option<String> {
    rec.get(idx)
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

fn optional_date(rec: &StringRecord, idx: usize, line: usize) -> Result<Option<NaiveDate>> {
    field(rec, idx)
        .map(|raw| parse_date(&raw).with_context(|| format!("Line {}: invalid date '{}'", line, raw)))
        .transpose()
}

/// Load employees from a CSV with header
/// `first_name,last_name,work_email,department,designation,location,status,hire_date,birthdate`.
/// All rows are inserted in one transaction; any bad row aborts the import.
pub fn import_employees(
    conn: &Connection,
    actor: &Actor,
    path: &Path,
    today: NaiveDate,
) -> Result<Vec<i64>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("Open CSV {}", path.display()))?;

    let mut rows = Vec::new();
    for (i, result) in rdr.records().enumerate() {
        let line = i + 2;
        let rec = result?;
        rows.push(NewEmployee {
            first_name: field(&rec, 0).with_context(|| format!("Line {}: first_name missing", line))?,
            last_name: field(&rec, 1).with_context(|| format!("Line {}: last_name missing", line))?,
            work_email: field(&rec, 2).with_context(|| format!("Line {}: work_email missing", line))?,
            department: field(&rec, 3),
            designation: field(&rec, 4),
            location: field(&rec, 5),
            status: field(&rec, 6),
            hire_date: optional_date(&rec, 7, line)?,
            birthdate: optional_date(&rec, 8, line)?,
            manager_id: None,
        });
    }

    let ids = unit_of_work(conn, |tx| {
        let mut ids = Vec::with_capacity(rows.len());
        for (i, new) in rows.iter().enumerate() {
            let id = insert_employee(tx, new, today).map_err(|e| match e {
                HrError::Validation(m) => HrError::validation(format!("Line {}: {}", i + 2, m)),
                HrError::Duplicate(m) => HrError::duplicate(format!("Line {}: {}", i + 2, m)),
                other => other,
            })?;
            ids.push(id);
        }
        Ok(ids)
    })?;

    log::info!("imported {} employees from {}", ids.len(), path.display());
    audit::record(
        conn,
        actor,
        AuditEntry::new("EMPLOYEE", "IMPORT", "Employee", 0)
            .changes(format!("Imported {} employees from CSV", ids.len())),
    );
    Ok(ids)
}

/// File convenience charges from a CSV with header `title,amount,date`.
/// Rows are independent: bad rows are reported in the summary.
pub fn import_charges(
    conn: &Connection,
    actor: &Actor,
    employee_id: i64,
    path: &Path,
) -> Result<BulkSummary> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("Open CSV {}", path.display()))?;

    let mut parsed = Vec::new();
    let mut rejected = Vec::new();
    for (i, result) in rdr.records().enumerate() {
        let line = i + 2;
        let rec = result?;
        let title = field(&rec, 0);
        let amount = field(&rec, 1);
        let (Some(title), Some(amount)) = (title, amount) else {
            rejected.push(format!("Line {}: each charge must have a title and amount", line));
            continue;
        };
        let amount = match parse_decimal(&amount) {
            Ok(a) => a,
            Err(e) => {
                rejected.push(format!("Line {}: {}", line, e));
                continue;
            }
        };
        let date = match field(&rec, 2).map(|d| parse_date(&d)) {
            Some(Ok(d)) => d,
            Some(Err(e)) => {
                rejected.push(format!("Line {}: {}", line, e));
                continue;
            }
            None => {
                rejected.push(format!("Line {}: date missing", line));
                continue;
            }
        };
        parsed.push(NewCharge { title, amount, date });
    }

    let mut summary = create_many(conn, actor, employee_id, parsed)?;
    summary.total += rejected.len();
    summary.failed += rejected.len();
    summary.errors.extend(rejected);
    Ok(summary)
}
