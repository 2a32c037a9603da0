// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Per (employee, policy, period) leave balances.
//!
//! Every writer keeps `closing = opening + accrued + adjusted - used`.
//! Quantities are TEXT decimals, so arithmetic happens here rather than in SQL;
//! multi-row callers wrap these in [`crate::db::unit_of_work`].

use crate::commands::employees::find_employee;
use crate::commands::policies::find_policy;
use crate::error::{HrError, Result};
use crate::models::{LeaveBalance, Period};
use crate::utils::dec;
use crate::visibility::Scope;
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use rust_decimal::Decimal;
use serde::Serialize;

const SELECT_BALANCE: &str = "SELECT b.id, b.employee_id, b.policy_id, b.period, b.opening, b.accrued,
        b.used, b.adjusted, b.allotted, b.closing FROM leave_balances b";

fn balance_from_row(r: &Row<'_>) -> rusqlite::Result<LeaveBalance> {
    Ok(LeaveBalance {
        id: r.get(0)?,
        employee_id: r.get(1)?,
        policy_id: r.get(2)?,
        period: r.get(3)?,
        opening: dec(r, 4)?,
        accrued: dec(r, 5)?,
        used: dec(r, 6)?,
        adjusted: dec(r, 7)?,
        allotted: dec(r, 8)?,
        closing: dec(r, 9)?,
    })
}

pub fn find_balance(
    conn: &Connection,
    employee_id: i64,
    policy_id: i64,
    period: Period,
) -> Result<Option<LeaveBalance>> {
    let sql = format!(
        "{} WHERE b.employee_id = ?1 AND b.policy_id = ?2 AND b.period = ?3",
        SELECT_BALANCE
    );
    Ok(conn
        .query_row(&sql, params![employee_id, policy_id, period], balance_from_row)
        .optional()?)
}

fn require_balance(
    conn: &Connection,
    employee_id: i64,
    policy_id: i64,
    period: Period,
) -> Result<LeaveBalance> {
    find_balance(conn, employee_id, policy_id, period)?
        .ok_or_else(|| HrError::not_found(format!("No leave balance for period {}", period)))
}

fn write_amounts(conn: &Connection, b: &LeaveBalance) -> Result<()> {
    conn.execute(
        "UPDATE leave_balances SET opening=?1, accrued=?2, used=?3, adjusted=?4, allotted=?5, closing=?6
         WHERE id=?7",
        params![
            b.opening.to_string(),
            b.accrued.to_string(),
            b.used.to_string(),
            b.adjusted.to_string(),
            b.allotted.to_string(),
            b.closing.to_string(),
            b.id
        ],
    )?;
    Ok(())
}

fn ensure_parties(conn: &Connection, employee_id: i64, policy_id: i64) -> Result<()> {
    if find_employee(conn, employee_id)?.is_none() {
        return Err(HrError::not_found("Employee not found"));
    }
    if find_policy(conn, policy_id)?.is_none() {
        return Err(HrError::not_found("Leave policy not found"));
    }
    Ok(())
}

/// Create or overwrite the row: opening = allotted = closing = `days`, the
/// other quantities reset to zero. Usage already recorded for `period` is lost.
pub fn set_initial_allocation(
    conn: &Connection,
    employee_id: i64,
    policy_id: i64,
    days: Decimal,
    period: Period,
) -> Result<LeaveBalance> {
    if days < Decimal::ZERO {
        return Err(HrError::validation("Allocated days must not be negative"));
    }
    ensure_parties(conn, employee_id, policy_id)?;
    let d = days.to_string();
    conn.execute(
        "INSERT INTO leave_balances(employee_id, policy_id, period, opening, accrued, used, adjusted, allotted, closing)
         VALUES (?1,?2,?3,?4,'0','0','0',?4,?4)
         ON CONFLICT(employee_id, policy_id, period) DO UPDATE SET
            opening=excluded.opening, accrued='0', used='0', adjusted='0',
            allotted=excluded.allotted, closing=excluded.closing",
        params![employee_id, policy_id, period, &d],
    )?;
    log::info!(
        "allocated {} days to employee {} policy {} for {}",
        days,
        employee_id,
        policy_id,
        period
    );
    require_balance(conn, employee_id, policy_id, period)
}

/// Add `amount` to opening and closing of the `period` row, creating it if needed.
pub fn roll_unused_forward(
    conn: &Connection,
    employee_id: i64,
    policy_id: i64,
    amount: Decimal,
    period: Period,
) -> Result<LeaveBalance> {
    match find_balance(conn, employee_id, policy_id, period)? {
        Some(mut b) => {
            b.opening += amount;
            b.closing += amount;
            write_amounts(conn, &b)?;
            Ok(b)
        }
        None => {
            let a = amount.to_string();
            conn.execute(
                "INSERT INTO leave_balances(employee_id, policy_id, period, opening, closing)
                 VALUES (?1,?2,?3,?4,?4)",
                params![employee_id, policy_id, period, &a],
            )?;
            require_balance(conn, employee_id, policy_id, period)
        }
    }
}

/// used += days, closing -= days. `None` when no row exists for `period`.
pub fn debit(
    conn: &Connection,
    employee_id: i64,
    policy_id: i64,
    period: Period,
    days: Decimal,
) -> Result<Option<LeaveBalance>> {
    let Some(mut b) = find_balance(conn, employee_id, policy_id, period)? else {
        return Ok(None);
    };
    b.used += days;
    b.closing -= days;
    write_amounts(conn, &b)?;
    Ok(Some(b))
}

/// adjusted += delta, closing += delta on an existing row.
pub fn adjust_balance(
    conn: &Connection,
    employee_id: i64,
    policy_id: i64,
    period: Period,
    delta: Decimal,
) -> Result<LeaveBalance> {
    let mut b = require_balance(conn, employee_id, policy_id, period)?;
    b.adjusted += delta;
    b.closing += delta;
    write_amounts(conn, &b)?;
    log::info!(
        "adjusted employee {} policy {} for {} by {}",
        employee_id,
        policy_id,
        period,
        delta
    );
    Ok(b)
}

/// Credit each policy's monthly accrual to every `period` row of active,
/// non-probation employees. Returns the number of rows credited.
pub fn accrue_monthly(conn: &Connection, period: Period) -> Result<usize> {
    let mut stmt = conn.prepare(
        "SELECT b.id, p.accrual_per_month FROM leave_balances b
         JOIN leave_policies p ON p.id = b.policy_id
         JOIN employees e ON e.id = b.employee_id
         WHERE b.period = ?1 AND lower(trim(e.status)) = 'active'",
    )?;
    let targets = stmt
        .query_map(params![period], |r| Ok((r.get::<_, i64>(0)?, dec(r, 1)?)))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    let mut credited = 0;
    for (id, accrual) in targets {
        if accrual.is_zero() {
            continue;
        }
        let sql = format!("{} WHERE b.id = ?1", SELECT_BALANCE);
        let mut b = conn.query_row(&sql, params![id], balance_from_row)?;
        b.accrued += accrual;
        b.closing += accrual;
        write_amounts(conn, &b)?;
        credited += 1;
    }
    log::info!("accrued {} balances for {}", credited, period);
    Ok(credited)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceView {
    #[serde(flatten)]
    pub balance: LeaveBalance,
    pub employee_code: String,
    pub policy_name: String,
}

#[derive(Debug, Clone, Default)]
pub struct BalanceFilter {
    pub employee_id: Option<i64>,
    pub policy_id: Option<i64>,
    pub period: Option<Period>,
}

/// Newest period first.
pub fn list_balances(
    conn: &Connection,
    scope: &Scope,
    filter: &BalanceFilter,
) -> Result<Vec<BalanceView>> {
    let mut sql = format!(
        "SELECT b.id, b.employee_id, b.policy_id, b.period, b.opening, b.accrued, b.used, b.adjusted,
                b.allotted, b.closing, e.person_no, p.name
         FROM leave_balances b
         JOIN employees e ON e.id = b.employee_id
         JOIN leave_policies p ON p.id = b.policy_id
         WHERE {}",
        scope.employee_filter("b.employee_id")
    );
    let mut args: Vec<SqlValue> = Vec::new();
    if let Some(e) = filter.employee_id {
        sql.push_str(" AND b.employee_id = ?");
        args.push(SqlValue::Integer(e));
    }
    if let Some(p) = filter.policy_id {
        sql.push_str(" AND b.policy_id = ?");
        args.push(SqlValue::Integer(p));
    }
    if let Some(p) = filter.period {
        sql.push_str(" AND b.period = ?");
        args.push(SqlValue::Text(p.to_string()));
    }
    sql.push_str(" ORDER BY b.period DESC, e.person_no, p.name");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(args), |r| {
        Ok(BalanceView {
            balance: balance_from_row(r)?,
            employee_code: r.get(10)?,
            policy_name: r.get(11)?,
        })
    })?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}
