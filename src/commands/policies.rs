// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::error::{HrError, Result};
use crate::models::LeavePolicy;
use crate::utils::dec;
use rusqlite::{Connection, OptionalExtension, Row, params};
use rust_decimal::Decimal;

/// Policy with per-month request caps.
pub const SPECIAL_LEAVE: &str = "Special Leave";

#[derive(Debug, Clone)]
pub struct NewPolicy {
    pub name: String,
    pub region: String,
    pub accrual_per_month: Decimal,
    pub annual_quota: i64,
    pub carry_forward: bool,
    pub max_carry_forward: i64,
    pub requires_doc_after: i64,
}

impl NewPolicy {
    pub fn named(name: impl Into<String>) -> Self {
        NewPolicy {
            name: name.into(),
            region: "IN".to_string(),
            accrual_per_month: Decimal::new(175, 2),
            annual_quota: 12,
            carry_forward: true,
            max_carry_forward: 12,
            requires_doc_after: 3,
        }
    }
}

const SELECT_POLICY: &str = "SELECT id, name, region, accrual_per_month, annual_quota, carry_forward,
        max_carry_forward, requires_doc_after FROM leave_policies";

fn policy_from_row(r: &Row<'_>) -> rusqlite::Result<LeavePolicy> {
    Ok(LeavePolicy {
        id: r.get(0)?,
        name: r.get(1)?,
        region: r.get(2)?,
        accrual_per_month: dec(r, 3)?,
        annual_quota: r.get(4)?,
        carry_forward: r.get(5)?,
        max_carry_forward: r.get(6)?,
        requires_doc_after: r.get(7)?,
    })
}

pub fn create_policy(conn: &Connection, new: NewPolicy) -> Result<LeavePolicy> {
    let name = new.name.trim();
    if name.is_empty() {
        return Err(HrError::validation("Policy name is required"));
    }
    if new.accrual_per_month < Decimal::ZERO || new.annual_quota < 0 || new.max_carry_forward < 0
    {
        return Err(HrError::validation("Policy quantities must not be negative"));
    }
    if find_policy_by_name(conn, name)?.is_some() {
        return Err(HrError::duplicate(format!("Policy \"{}\" already exists", name)));
    }
    conn.execute(
        "INSERT INTO leave_policies(name, region, accrual_per_month, annual_quota, carry_forward,
                                    max_carry_forward, requires_doc_after)
         VALUES (?1,?2,?3,?4,?5,?6,?7)",
        params![
            name,
            new.region.trim(),
            new.accrual_per_month.to_string(),
            new.annual_quota,
            new.carry_forward,
            new.max_carry_forward,
            new.requires_doc_after
        ],
    )?;
    let id = conn.last_insert_rowid();
    log::info!("leave policy '{}' created", name);
    get_policy(conn, id)
}

pub fn get_policy(conn: &Connection, id: i64) -> Result<LeavePolicy> {
    find_policy(conn, id)?.ok_or_else(|| HrError::not_found("Leave policy not found"))
}

pub fn find_policy(conn: &Connection, id: i64) -> Result<Option<LeavePolicy>> {
    let sql = format!("{} WHERE id = ?1", SELECT_POLICY);
    Ok(conn.query_row(&sql, params![id], policy_from_row).optional()?)
}

pub fn find_policy_by_name(conn: &Connection, name: &str) -> Result<Option<LeavePolicy>> {
    let sql = format!("{} WHERE name = ?1", SELECT_POLICY);
    Ok(conn
        .query_row(&sql, params![name.trim()], policy_from_row)
        .optional()?)
}

pub fn list_policies(conn: &Connection) -> Result<Vec<LeavePolicy>> {
    let sql = format!("{} ORDER BY name", SELECT_POLICY);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], policy_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

#[derive(Debug, Clone, Default)]
pub struct PolicyUpdate {
    pub region: Option<String>,
    pub accrual_per_month: Option<Decimal>,
    pub annual_quota: Option<i64>,
    pub carry_forward: Option<bool>,
    pub max_carry_forward: Option<i64>,
    pub requires_doc_after: Option<i64>,
}

pub fn update_policy(conn: &Connection, id: i64, upd: PolicyUpdate) -> Result<LeavePolicy> {
    get_policy(conn, id)?;
    conn.execute(
        "UPDATE leave_policies SET
            region = COALESCE(?1, region),
            accrual_per_month = COALESCE(?2, accrual_per_month),
            annual_quota = COALESCE(?3, annual_quota),
            carry_forward = COALESCE(?4, carry_forward),
            max_carry_forward = COALESCE(?5, max_carry_forward),
            requires_doc_after = COALESCE(?6, requires_doc_after)
         WHERE id = ?7",
        params![
            upd.region,
            upd.accrual_per_month.map(|d| d.to_string()),
            upd.annual_quota,
            upd.carry_forward,
            upd.max_carry_forward,
            upd.requires_doc_after,
            id
        ],
    )?;
    get_policy(conn, id)
}

/// Refused while any balance row references the policy.
pub fn delete_policy(conn: &Connection, id: i64) -> Result<()> {
    let policy = get_policy(conn, id)?;
    let in_use: i64 = conn.query_row(
        "SELECT COUNT(*) FROM leave_balances WHERE policy_id = ?1",
        params![id],
        |r| r.get(0),
    )?;
    if in_use > 0 {
        return Err(HrError::validation(
            "Cannot delete policy; it is assigned to one or more employees",
        ));
    }
    conn.execute("DELETE FROM leave_policies WHERE id = ?1", params![id])?;
    log::info!("leave policy '{}' deleted", policy.name);
    Ok(())
}
