// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use once_cell::sync::Lazy;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::fs;
use std::path::{Path, PathBuf};

static APP: Lazy<(&str, &str, &str)> =
    Lazy::new(|| ("com.alphavelocity", "Payclip", "payclip"));

pub fn db_path(configured: Option<&Path>) -> Result<PathBuf> {
    if let Some(p) = configured {
        if let Some(parent) = p.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(parent).context("Failed to create database dir")?;
        }
        return Ok(p.to_path_buf());
    }
    let proj = ProjectDirs::from(APP.0, APP.1, APP.2)
        .context("Could not determine platform-specific data dir")?;
    let data_dir = proj.data_dir();
    fs::create_dir_all(data_dir).context("Failed to create data dir")?;
    Ok(data_dir.join("payclip.sqlite"))
}

pub fn open_or_init(configured: Option<&Path>) -> Result<Connection> {
    let path = db_path(configured)?;
    let conn =
        Connection::open(&path).with_context(|| format!("Open DB at {}", path.display()))?;
    init_schema(&conn)?;
    log::debug!("database ready at {}", path.display());
    Ok(conn)
}

/// Run `f` inside one IMMEDIATE transaction; commits on `Ok`, rolls back on `Err`.
/// Callers must not nest units of work.
pub fn unit_of_work<T>(
    conn: &Connection,
    f: impl FnOnce(&Transaction<'_>) -> crate::error::Result<T>,
) -> crate::error::Result<T> {
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    let out = f(&tx)?;
    tx.commit()?;
    Ok(out)
}

pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
    PRAGMA foreign_keys = ON;

    CREATE TABLE IF NOT EXISTS users(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        email TEXT NOT NULL UNIQUE,
        role TEXT NOT NULL CHECK(role IN ('ADMIN','HR','MANAGER','EMPLOYEE','MD','CAO')),
        created_at TEXT NOT NULL DEFAULT (datetime('now'))
    );

    CREATE TABLE IF NOT EXISTS employees(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        person_no TEXT NOT NULL UNIQUE,
        first_name TEXT NOT NULL,
        last_name TEXT NOT NULL,
        work_email TEXT NOT NULL UNIQUE,
        department TEXT,
        designation TEXT,
        location TEXT,
        status TEXT NOT NULL DEFAULT 'Active',
        hire_date TEXT NOT NULL,
        birthdate TEXT,
        termination_date TEXT,
        manager_id INTEGER,
        user_id INTEGER UNIQUE,
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        FOREIGN KEY(manager_id) REFERENCES employees(id) ON DELETE SET NULL,
        FOREIGN KEY(user_id) REFERENCES users(id) ON DELETE SET NULL
    );

    CREATE TABLE IF NOT EXISTS compensations(
        employee_id INTEGER PRIMARY KEY,
        base_salary TEXT NOT NULL,
        currency TEXT NOT NULL,
        FOREIGN KEY(employee_id) REFERENCES employees(id) ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS leave_policies(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        region TEXT NOT NULL,
        accrual_per_month TEXT NOT NULL,
        annual_quota INTEGER NOT NULL,
        carry_forward INTEGER NOT NULL,
        max_carry_forward INTEGER NOT NULL,
        requires_doc_after INTEGER NOT NULL,
        created_at TEXT NOT NULL DEFAULT (datetime('now'))
    );

    CREATE TABLE IF NOT EXISTS leave_balances(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        employee_id INTEGER NOT NULL,
        policy_id INTEGER NOT NULL,
        period TEXT NOT NULL, -- YYYY-MM
        opening TEXT NOT NULL DEFAULT '0',
        accrued TEXT NOT NULL DEFAULT '0',
        used TEXT NOT NULL DEFAULT '0',
        adjusted TEXT NOT NULL DEFAULT '0',
        allotted TEXT NOT NULL DEFAULT '0',
        closing TEXT NOT NULL DEFAULT '0',
        UNIQUE(employee_id, policy_id, period),
        FOREIGN KEY(employee_id) REFERENCES employees(id) ON DELETE CASCADE,
        FOREIGN KEY(policy_id) REFERENCES leave_policies(id) ON DELETE RESTRICT
    );
    CREATE INDEX IF NOT EXISTS idx_leave_balances_period ON leave_balances(period);

    CREATE TABLE IF NOT EXISTS leave_requests(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        employee_id INTEGER NOT NULL,
        policy_id INTEGER NOT NULL,
        start_date TEXT NOT NULL,
        end_date TEXT NOT NULL,
        days TEXT NOT NULL,
        half_day INTEGER NOT NULL DEFAULT 0,
        reason TEXT,
        status TEXT NOT NULL DEFAULT 'PENDING'
            CHECK(status IN ('PENDING','APPROVED','REJECTED','CANCELLED')),
        approver_id INTEGER,
        approved_at TEXT,
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        FOREIGN KEY(employee_id) REFERENCES employees(id) ON DELETE CASCADE,
        FOREIGN KEY(policy_id) REFERENCES leave_policies(id) ON DELETE CASCADE,
        FOREIGN KEY(approver_id) REFERENCES users(id) ON DELETE SET NULL
    );
    CREATE INDEX IF NOT EXISTS idx_leave_requests_start ON leave_requests(start_date);

    CREATE TABLE IF NOT EXISTS payroll_runs(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        period_start TEXT NOT NULL,
        period_end TEXT NOT NULL,
        pay_date TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'DRAFT' CHECK(status IN ('DRAFT','APPROVED','PAID')),
        created_at TEXT NOT NULL DEFAULT (datetime('now'))
    );

    CREATE TABLE IF NOT EXISTS payslips(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        employee_id INTEGER NOT NULL,
        payroll_run_id INTEGER NOT NULL,
        gross TEXT NOT NULL,
        deductions TEXT NOT NULL,
        net TEXT NOT NULL,
        currency TEXT NOT NULL,
        lines TEXT NOT NULL, -- JSON [{label, amount}]
        basic TEXT NOT NULL DEFAULT '0',
        hra TEXT NOT NULL DEFAULT '0',
        conveyance TEXT NOT NULL DEFAULT '0',
        medical TEXT NOT NULL DEFAULT '0',
        bonus TEXT NOT NULL DEFAULT '0',
        other_earnings TEXT NOT NULL DEFAULT '0',
        leave_deduction TEXT NOT NULL DEFAULT '0',
        professional_tax TEXT NOT NULL DEFAULT '0',
        other_deductions TEXT NOT NULL DEFAULT '0',
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        UNIQUE(employee_id, payroll_run_id),
        FOREIGN KEY(employee_id) REFERENCES employees(id) ON DELETE CASCADE,
        FOREIGN KEY(payroll_run_id) REFERENCES payroll_runs(id) ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS insurances(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        employee_id INTEGER NOT NULL,
        policy_number TEXT NOT NULL,
        provider TEXT NOT NULL,
        start_date TEXT NOT NULL,
        end_date TEXT NOT NULL,
        coverage_amount TEXT NOT NULL,
        bonus_percent TEXT,
        ctc_file_url TEXT,
        e_cash_amount TEXT NOT NULL DEFAULT '0',
        convenience_fee TEXT,
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        updated_at TEXT NOT NULL DEFAULT (datetime('now')),
        FOREIGN KEY(employee_id) REFERENCES employees(id) ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS convenience_charges(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        employee_id INTEGER NOT NULL,
        title TEXT NOT NULL,
        amount TEXT NOT NULL,
        date TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'PENDING' CHECK(status IN ('PENDING','APPROVED','REJECTED')),
        approved_by INTEGER,
        approval_date TEXT,
        rejection_reason TEXT,
        payslip_id INTEGER,
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        FOREIGN KEY(employee_id) REFERENCES employees(id) ON DELETE CASCADE,
        FOREIGN KEY(approved_by) REFERENCES users(id) ON DELETE SET NULL,
        FOREIGN KEY(payslip_id) REFERENCES payslips(id) ON DELETE SET NULL
    );

    -- append-only
    CREATE TABLE IF NOT EXISTS audit_logs(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        module TEXT NOT NULL,
        action TEXT NOT NULL,
        entity_type TEXT NOT NULL,
        entity_id TEXT NOT NULL,
        employee_id INTEGER,
        actor_id INTEGER,
        actor_role TEXT,
        old_data TEXT,
        new_data TEXT,
        changes TEXT,
        status TEXT NOT NULL DEFAULT 'SUCCESS',
        error_message TEXT,
        created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now'))
    );
    CREATE INDEX IF NOT EXISTS idx_audit_logs_entity ON audit_logs(entity_id);
    "#,
    )
}
