// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::actor::Actor;
use crate::error::Result;
use crate::models::{Period, Role};
use crate::utils::{dec, json_flags, maybe_print_json, pretty_table};
use crate::visibility::Scope;
use chrono::{Days, NaiveDate};
use rusqlite::{Connection, OptionalExtension, params};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

const DASHBOARD_ROLES: &[Role] = &[Role::Admin, Role::Hr, Role::Manager];
const LIST_LIMIT: i64 = 5;

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub active_employees: i64,
    pub pending_leave_requests: i64,
    pub draft_payroll_runs: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonDate {
    pub employee_id: i64,
    pub name: String,
    pub department: Option<String>,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveAvailability {
    pub period: String,
    pub allotted: Decimal,
    pub used: Decimal,
    /// Share of allotted days still unused, rounded to whole percent.
    pub available_percent: Decimal,
    /// Σ closing per policy name.
    pub by_policy: BTreeMap<String, Decimal>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub stats: Stats,
    pub department_counts: BTreeMap<String, i64>,
    pub new_joiners: Vec<PersonDate>,
    pub departing: Vec<PersonDate>,
    pub leave_availability: LeaveAvailability,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeDashboard {
    pub employee_id: i64,
    pub period: String,
    pub leave_balances: BTreeMap<String, Decimal>,
    pub pending_leave_requests: i64,
    pub pending_charges: i64,
    pub latest_net_pay: Option<Decimal>,
}

fn count(conn: &Connection, sql: &str) -> Result<i64> {
    Ok(conn.query_row(sql, [], |r| r.get(0))?)
}

fn people(conn: &Connection, sql: &str, a: NaiveDate, b: NaiveDate) -> Result<Vec<PersonDate>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params![a, b, LIST_LIMIT], |r| {
        Ok(PersonDate {
            employee_id: r.get(0)?,
            name: r.get(1)?,
            department: r.get(2)?,
            date: r.get(3)?,
        })
    })?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Aggregate leave quantities of `period` across every visible employee.
pub fn leave_availability(
    conn: &Connection,
    scope: &Scope,
    period: Period,
) -> Result<LeaveAvailability> {
    let sql = format!(
        "SELECT p.name, b.allotted, b.used, b.closing FROM leave_balances b
         JOIN leave_policies p ON p.id = b.policy_id
         WHERE b.period = ?1 AND {}",
        scope.employee_filter("b.employee_id")
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![period], |r| {
        Ok((r.get::<_, String>(0)?, dec(r, 1)?, dec(r, 2)?, dec(r, 3)?))
    })?;
    let mut out = LeaveAvailability {
        period: period.to_string(),
        ..Default::default()
    };
    for row in rows {
        let (policy, allotted, used, closing) = row?;
        out.allotted += allotted;
        out.used += used;
        *out.by_policy.entry(policy).or_default() += closing;
    }
    out.available_percent = if out.allotted.is_zero() {
        Decimal::ONE_HUNDRED
    } else {
        ((out.allotted - out.used) / out.allotted * Decimal::ONE_HUNDRED).round()
    };
    Ok(out)
}

/// Organisation overview as seen through `scope`.
pub fn summary(conn: &Connection, scope: &Scope, today: NaiveDate) -> Result<Dashboard> {
    let emp = scope.employee_filter("e.id");
    let stats = Stats {
        active_employees: count(
            conn,
            &format!(
                "SELECT COUNT(*) FROM employees e WHERE lower(trim(e.status)) = 'active' AND {}",
                emp
            ),
        )?,
        pending_leave_requests: count(
            conn,
            &format!(
                "SELECT COUNT(*) FROM leave_requests r WHERE r.status = 'PENDING' AND {}",
                scope.employee_filter("r.employee_id")
            ),
        )?,
        draft_payroll_runs: count(
            conn,
            "SELECT COUNT(*) FROM payroll_runs WHERE status = 'DRAFT'",
        )?,
    };

    let mut department_counts = BTreeMap::new();
    let mut stmt = conn.prepare(&format!(
        "SELECT COALESCE(NULLIF(trim(e.department), ''), 'Unassigned'), COUNT(*)
         FROM employees e WHERE lower(trim(e.status)) = 'active' AND {}
         GROUP BY 1",
        emp
    ))?;
    let mut rows = stmt.query([])?;
    while let Some(r) = rows.next()? {
        department_counts.insert(r.get::<_, String>(0)?, r.get::<_, i64>(1)?);
    }

    let month_ago = today.checked_sub_days(Days::new(30)).unwrap_or(today);
    let month_ahead = today.checked_add_days(Days::new(30)).unwrap_or(today);
    let new_joiners = people(
        conn,
        &format!(
            "SELECT e.id, e.first_name || ' ' || e.last_name, e.department, e.hire_date
             FROM employees e
             WHERE lower(trim(e.status)) = 'active' AND e.hire_date >= ?1 AND e.hire_date <= ?2 AND {}
             ORDER BY e.hire_date DESC LIMIT ?3",
            emp
        ),
        month_ago,
        today,
    )?;
    let departing = people(
        conn,
        &format!(
            "SELECT e.id, e.first_name || ' ' || e.last_name, e.department, e.termination_date
             FROM employees e
             WHERE e.termination_date >= ?1 AND e.termination_date <= ?2 AND {}
             ORDER BY e.termination_date ASC LIMIT ?3",
            emp
        ),
        today,
        month_ahead,
    )?;

    Ok(Dashboard {
        stats,
        department_counts,
        new_joiners,
        departing,
        leave_availability: leave_availability(conn, scope, Period::from_date(today))?,
    })
}

/// A single employee's own figures.
pub fn employee_summary(
    conn: &Connection,
    employee_id: i64,
    today: NaiveDate,
) -> Result<EmployeeDashboard> {
    let period = Period::from_date(today);
    let mut leave_balances = BTreeMap::new();
    let mut stmt = conn.prepare(
        "SELECT p.name, b.closing FROM leave_balances b
         JOIN leave_policies p ON p.id = b.policy_id
         WHERE b.employee_id = ?1 AND b.period = ?2 ORDER BY p.name",
    )?;
    let rows = stmt.query_map(params![employee_id, period], |r| {
        Ok((r.get::<_, String>(0)?, dec(r, 1)?))
    })?;
    for row in rows {
        let (name, closing) = row?;
        leave_balances.insert(name, closing);
    }
    let pending_leave_requests: i64 = conn.query_row(
        "SELECT COUNT(*) FROM leave_requests WHERE employee_id = ?1 AND status = 'PENDING'",
        params![employee_id],
        |r| r.get(0),
    )?;
    let pending_charges: i64 = conn.query_row(
        "SELECT COUNT(*) FROM convenience_charges WHERE employee_id = ?1 AND status = 'PENDING'",
        params![employee_id],
        |r| r.get(0),
    )?;
    let latest_net_pay = conn
        .query_row(
            "SELECT s.net FROM payslips s JOIN payroll_runs r ON r.id = s.payroll_run_id
             WHERE s.employee_id = ?1 ORDER BY r.period_start DESC LIMIT 1",
            params![employee_id],
            |r| dec(r, 0),
        )
        .optional()?;
    Ok(EmployeeDashboard {
        employee_id,
        period: period.to_string(),
        leave_balances,
        pending_leave_requests,
        pending_charges,
        latest_net_pay,
    })
}

pub fn handle(
    conn: &Connection,
    actor: &Actor,
    today: NaiveDate,
    m: &clap::ArgMatches,
) -> anyhow::Result<()> {
    let (json_flag, jsonl_flag) = json_flags(m);
    if actor.role == Role::Employee || m.get_flag("mine") {
        let d = employee_summary(conn, actor.own_employee()?, today)?;
        if !maybe_print_json(json_flag, jsonl_flag, &d)? {
            let mut rows: Vec<Vec<String>> = d
                .leave_balances
                .iter()
                .map(|(k, v)| vec![format!("Leave: {}", k), v.to_string()])
                .collect();
            rows.push(vec![
                "Pending leave requests".into(),
                d.pending_leave_requests.to_string(),
            ]);
            rows.push(vec!["Pending charges".into(), d.pending_charges.to_string()]);
            rows.push(vec![
                "Latest net pay".into(),
                d.latest_net_pay
                    .map(|n| format!("{:.2}", n))
                    .unwrap_or_else(|| "-".into()),
            ]);
            println!("{}", pretty_table(&["Item", "Value"], rows));
        }
        return Ok(());
    }
    actor.require(DASHBOARD_ROLES)?;
    let d = summary(conn, &actor.scope(), today)?;
    if !maybe_print_json(json_flag, jsonl_flag, &d)? {
        let mut rows = vec![
            vec!["Active employees".to_string(), d.stats.active_employees.to_string()],
            vec![
                "Pending leave requests".to_string(),
                d.stats.pending_leave_requests.to_string(),
            ],
            vec![
                "Draft payroll runs".to_string(),
                d.stats.draft_payroll_runs.to_string(),
            ],
            vec![
                format!("Leave available ({})", d.leave_availability.period),
                format!("{}%", d.leave_availability.available_percent),
            ],
        ];
        for (dept, n) in &d.department_counts {
            rows.push(vec![format!("Department: {}", dept), n.to_string()]);
        }
        for p in &d.new_joiners {
            rows.push(vec![format!("Joined {}", p.date), p.name.clone()]);
        }
        for p in &d.departing {
            rows.push(vec![format!("Leaving {}", p.date), p.name.clone()]);
        }
        println!("{}", pretty_table(&["Item", "Value"], rows));
    }
    Ok(())
}
