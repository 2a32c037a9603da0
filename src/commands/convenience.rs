// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Employee-submitted convenience charges and their approval workflow.
//!
//! A charge starts PENDING. ADMIN/HR decide it once; approved charges that are
//! not yet attached to a payslip are picked up by payroll.

use crate::actor::Actor;
use crate::commands::audit::{self, AuditEntry};
use crate::commands::employees::find_employee;
use crate::error::{HrError, Result};
use crate::models::{ChargeStatus, ConvenienceCharge, HR_ADMINS, Role};
use crate::utils::{
    dec, id_for_employee, json_flags, maybe_print_json, opt_date, opt_decimal, opt_str,
    parse_date, parse_decimal, pretty_table, print_record, req_id, req_str,
};
use crate::visibility::Scope;
use chrono::{NaiveDate, Utc};
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Debug, Clone)]
pub struct NewCharge {
    pub title: String,
    pub amount: Decimal,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Default)]
pub struct ChargeUpdate {
    pub title: Option<String>,
    pub amount: Option<Decimal>,
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default)]
pub struct ChargeFilter {
    pub employee_id: Option<i64>,
    pub status: Option<ChargeStatus>,
}

/// Outcome of deciding or creating several charges in one call.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkSummary {
    pub total: usize,
    pub processed: usize,
    pub failed: usize,
    pub errors: Vec<String>,
}

impl BulkSummary {
    fn ok(&mut self) {
        self.total += 1;
        self.processed += 1;
    }

    fn fail(&mut self, msg: String) {
        self.total += 1;
        self.failed += 1;
        self.errors.push(msg);
    }
}

const SELECT_CHARGE: &str = "SELECT c.id, c.employee_id, c.title, c.amount, c.date, c.status,
        c.approved_by, c.approval_date, c.rejection_reason, c.payslip_id
        FROM convenience_charges c";

pub(crate) fn charge_from_row(r: &Row<'_>) -> rusqlite::Result<ConvenienceCharge> {
    Ok(ConvenienceCharge {
        id: r.get(0)?,
        employee_id: r.get(1)?,
        title: r.get(2)?,
        amount: dec(r, 3)?,
        date: r.get(4)?,
        status: r.get(5)?,
        approved_by: r.get(6)?,
        approval_date: r.get(7)?,
        rejection_reason: r.get(8)?,
        payslip_id: r.get(9)?,
    })
}

pub fn find_charge(conn: &Connection, id: i64) -> Result<Option<ConvenienceCharge>> {
    let sql = format!("{} WHERE c.id = ?1", SELECT_CHARGE);
    Ok(conn.query_row(&sql, params![id], charge_from_row).optional()?)
}

fn require_charge(conn: &Connection, id: i64) -> Result<ConvenienceCharge> {
    find_charge(conn, id)?.ok_or_else(|| HrError::not_found("Convenience charge not found"))
}

fn validate_fields(title: &str, amount: Decimal) -> Result<()> {
    if title.trim().is_empty() {
        return Err(HrError::validation("Charge title is required"));
    }
    if amount <= Decimal::ZERO {
        return Err(HrError::validation("Charge amount must be positive"));
    }
    Ok(())
}

/// Record a PENDING charge for `employee_id`. Employees may only file for
/// themselves; ADMIN/HR may file for anyone.
pub fn create_charge(
    conn: &Connection,
    actor: &Actor,
    employee_id: i64,
    new: NewCharge,
) -> Result<ConvenienceCharge> {
    if !actor.has_role(HR_ADMINS) && actor.employee_id != Some(employee_id) {
        return Err(HrError::forbidden("You can only file charges for yourself"));
    }
    if find_employee(conn, employee_id)?.is_none() {
        return Err(HrError::not_found("Employee not found"));
    }
    validate_fields(&new.title, new.amount)?;
    conn.execute(
        "INSERT INTO convenience_charges(employee_id, title, amount, date, status)
         VALUES (?1,?2,?3,?4,'PENDING')",
        params![
            employee_id,
            new.title.trim(),
            new.amount.to_string(),
            new.date
        ],
    )?;
    let charge = require_charge(conn, conn.last_insert_rowid())?;
    log::info!(
        "charge {} filed for employee {}: {} {}",
        charge.id,
        employee_id,
        charge.title,
        charge.amount
    );
    audit::record(
        conn,
        actor,
        AuditEntry::new("CONVENIENCE", "CREATE", "ConvenienceCharge", charge.id)
            .employee(employee_id)
            .new_data(serde_json::to_value(&charge)?)
            .changes(format!("Filed charge \"{}\" for {}", charge.title, charge.amount)),
    );
    Ok(charge)
}

/// EMPLOYEE viewers only see their own charges; others go through the scope.
pub fn get_charge(conn: &Connection, actor: &Actor, id: i64) -> Result<ConvenienceCharge> {
    let charge = require_charge(conn, id)?;
    if actor.role == Role::Employee && actor.employee_id != Some(charge.employee_id) {
        return Err(HrError::not_found("Convenience charge not found"));
    }
    actor
        .scope()
        .ensure_visible(conn, charge.employee_id, "Convenience charge")?;
    Ok(charge)
}

/// Newest first, except a PENDING-only listing which is the approval queue and
/// runs oldest first.
pub fn list_charges(
    conn: &Connection,
    scope: &Scope,
    filter: &ChargeFilter,
) -> Result<Vec<ConvenienceCharge>> {
    let mut sql = format!(
        "{} WHERE {}",
        SELECT_CHARGE,
        scope.employee_filter("c.employee_id")
    );
    let mut args: Vec<SqlValue> = Vec::new();
    if let Some(e) = filter.employee_id {
        sql.push_str(" AND c.employee_id = ?");
        args.push(SqlValue::Integer(e));
    }
    if let Some(s) = filter.status {
        sql.push_str(" AND c.status = ?");
        args.push(SqlValue::Text(s.as_str().to_string()));
    }
    if filter.status == Some(ChargeStatus::Pending) {
        sql.push_str(" ORDER BY c.created_at ASC, c.id ASC");
    } else {
        sql.push_str(" ORDER BY c.date DESC, c.id DESC");
    }
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(args), charge_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Charges of one employee. An EMPLOYEE asking for someone else is refused.
pub fn charges_for_employee(
    conn: &Connection,
    actor: &Actor,
    employee_id: i64,
) -> Result<Vec<ConvenienceCharge>> {
    if actor.role == Role::Employee && actor.employee_id != Some(employee_id) {
        return Err(HrError::forbidden("You can only access your own charges"));
    }
    if find_employee(conn, employee_id)?.is_none() {
        return Err(HrError::not_found("Employee not found"));
    }
    list_charges(
        conn,
        &actor.scope(),
        &ChargeFilter {
            employee_id: Some(employee_id),
            status: None,
        },
    )
}

/// APPROVED charges dated within `[from, to]` that no payslip has claimed yet.
pub fn approved_charges_between(
    conn: &Connection,
    employee_id: i64,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<ConvenienceCharge>> {
    let sql = format!(
        "{} WHERE c.employee_id = ?1 AND c.status = 'APPROVED' AND c.payslip_id IS NULL
           AND c.date >= ?2 AND c.date <= ?3 ORDER BY c.date, c.id",
        SELECT_CHARGE
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![employee_id, from, to], charge_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

fn editable(charge: &ConvenienceCharge) -> bool {
    matches!(charge.status, ChargeStatus::Pending | ChargeStatus::Rejected)
}

/// Owner edits a PENDING or REJECTED charge. The status is left unchanged.
pub fn update_own_charge(
    conn: &Connection,
    actor: &Actor,
    id: i64,
    upd: ChargeUpdate,
) -> Result<ConvenienceCharge> {
    let employee_id = actor.own_employee()?;
    let before = require_charge(conn, id)?;
    if before.employee_id != employee_id {
        return Err(HrError::forbidden("You can only edit your own charges"));
    }
    if !editable(&before) {
        return Err(HrError::forbidden(
            "Can only edit charges that are pending or rejected",
        ));
    }
    let title = upd.title.unwrap_or_else(|| before.title.clone());
    let amount = upd.amount.unwrap_or(before.amount);
    validate_fields(&title, amount)?;
    conn.execute(
        "UPDATE convenience_charges SET title = ?1, amount = ?2, date = ?3 WHERE id = ?4",
        params![
            title.trim(),
            amount.to_string(),
            upd.date.unwrap_or(before.date),
            id
        ],
    )?;
    let after = require_charge(conn, id)?;
    audit::record(
        conn,
        actor,
        AuditEntry::new("CONVENIENCE", "UPDATE", "ConvenienceCharge", id)
            .employee(after.employee_id)
            .old(serde_json::to_value(&before)?)
            .new_data(serde_json::to_value(&after)?)
            .diffed(),
    );
    Ok(after)
}

/// Owner (or ADMIN/HR) deletes a PENDING or REJECTED charge.
pub fn delete_charge(conn: &Connection, actor: &Actor, id: i64) -> Result<()> {
    let charge = require_charge(conn, id)?;
    if !actor.has_role(HR_ADMINS) && actor.employee_id != Some(charge.employee_id) {
        return Err(HrError::forbidden("You can only delete your own charges"));
    }
    if !editable(&charge) {
        return Err(HrError::forbidden(
            "Can only delete pending or rejected charges",
        ));
    }
    conn.execute("DELETE FROM convenience_charges WHERE id = ?1", params![id])?;
    log::info!("charge {} deleted", id);
    audit::record(
        conn,
        actor,
        AuditEntry::new("CONVENIENCE", "DELETE", "ConvenienceCharge", id)
            .employee(charge.employee_id)
            .old(serde_json::to_value(&charge)?)
            .changes(format!("Deleted charge \"{}\"", charge.title)),
    );
    Ok(())
}

/// Approve or reject a PENDING charge. A rejection keeps `reason`; an approval
/// clears it.
pub fn decide_charge(
    conn: &Connection,
    actor: &Actor,
    id: i64,
    decision: ChargeStatus,
    reason: Option<String>,
) -> Result<ConvenienceCharge> {
    if decision == ChargeStatus::Pending {
        return Err(HrError::validation("Decision must be APPROVED or REJECTED"));
    }
    let before = require_charge(conn, id)?;
    actor
        .scope()
        .ensure_visible(conn, before.employee_id, "Convenience charge")?;
    if before.status != ChargeStatus::Pending {
        return Err(HrError::forbidden(
            "Only pending charges can be approved/rejected",
        ));
    }
    let reason = match decision {
        ChargeStatus::Rejected => reason,
        _ => None,
    };
    conn.execute(
        "UPDATE convenience_charges
         SET status = ?1, approved_by = ?2, approval_date = ?3, rejection_reason = ?4
         WHERE id = ?5",
        params![decision, actor.user_id, Utc::now(), reason, id],
    )?;
    let after = require_charge(conn, id)?;
    log::info!("charge {} {}", id, decision);
    let action = match decision {
        ChargeStatus::Approved => "APPROVE",
        _ => "REJECT",
    };
    audit::record(
        conn,
        actor,
        AuditEntry::new("CONVENIENCE", action, "ConvenienceCharge", id)
            .employee(after.employee_id)
            .old(serde_json::to_value(&before)?)
            .new_data(serde_json::to_value(&after)?)
            .diffed(),
    );
    Ok(after)
}

/// Decide several charges; failures are collected rather than aborting.
pub fn decide_many(
    conn: &Connection,
    actor: &Actor,
    ids: &[i64],
    decision: ChargeStatus,
    reason: Option<String>,
) -> BulkSummary {
    let mut summary = BulkSummary::default();
    for id in ids {
        match decide_charge(conn, actor, *id, decision, reason.clone()) {
            Ok(_) => summary.ok(),
            Err(e) => summary.fail(format!("Charge {}: {}", id, e)),
        }
    }
    log::info!(
        "bulk {}: {} processed, {} failed",
        decision,
        summary.processed,
        summary.failed
    );
    summary
}

/// File several charges for one employee; invalid rows are reported, not fatal.
pub fn create_many(
    conn: &Connection,
    actor: &Actor,
    employee_id: i64,
    charges: Vec<NewCharge>,
) -> Result<BulkSummary> {
    if find_employee(conn, employee_id)?.is_none() {
        return Err(HrError::not_found("Employee not found"));
    }
    let mut summary = BulkSummary::default();
    for (i, c) in charges.into_iter().enumerate() {
        match create_charge(conn, actor, employee_id, c) {
            Ok(_) => summary.ok(),
            Err(e) => summary.fail(format!("Row {}: {}", i + 1, e)),
        }
    }
    Ok(summary)
}

fn print_charges(list: &[ConvenienceCharge]) {
    let rows = list
        .iter()
        .map(|c| {
            vec![
                c.id.to_string(),
                c.employee_id.to_string(),
                c.date.to_string(),
                c.title.clone(),
                format!("{:.2}", c.amount),
                c.status.to_string(),
                c.payslip_id.map(|p| p.to_string()).unwrap_or_default(),
            ]
        })
        .collect();
    println!(
        "{}",
        pretty_table(
            &["ID", "Employee", "Date", "Title", "Amount", "Status", "Payslip"],
            rows
        )
    );
}

fn parse_ids(raw: &str) -> Result<Vec<i64>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>()
                .map_err(|_| HrError::validation(format!("Invalid charge id '{}'", s)))
        })
        .collect()
}

pub fn handle(conn: &Connection, actor: &Actor, m: &clap::ArgMatches) -> anyhow::Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => {
            let employee_id = match opt_str(sub, "employee") {
                Some(code) => id_for_employee(conn, &code)?,
                None => actor.own_employee()?,
            };
            let new = NewCharge {
                title: req_str(sub, "title")?,
                amount: parse_decimal(&req_str(sub, "amount")?)?,
                date: parse_date(&req_str(sub, "date")?)?,
            };
            let c = create_charge(conn, actor, employee_id, new)?;
            println!("Filed charge {} ({})", c.id, c.status);
        }
        Some(("list", sub)) => {
            let status = opt_str(sub, "status")
                .map(|s| s.parse::<ChargeStatus>())
                .transpose()?;
            let list = if actor.role == Role::Employee || sub.get_flag("mine") {
                let own = actor.own_employee()?;
                let mut all = charges_for_employee(conn, actor, own)?;
                if let Some(s) = status {
                    all.retain(|c| c.status == s);
                }
                all
            } else {
                actor.require(HR_ADMINS)?;
                let employee_id = opt_str(sub, "employee")
                    .map(|c| id_for_employee(conn, &c))
                    .transpose()?;
                list_charges(conn, &actor.scope(), &ChargeFilter { employee_id, status })?
            };
            let (json_flag, jsonl_flag) = json_flags(sub);
            if !maybe_print_json(json_flag, jsonl_flag, &list)? {
                print_charges(&list);
            }
        }
        Some(("pending", sub)) => {
            actor.require(HR_ADMINS)?;
            let list = list_charges(
                conn,
                &actor.scope(),
                &ChargeFilter {
                    employee_id: None,
                    status: Some(ChargeStatus::Pending),
                },
            )?;
            let (json_flag, jsonl_flag) = json_flags(sub);
            if !maybe_print_json(json_flag, jsonl_flag, &list)? {
                print_charges(&list);
            }
        }
        Some(("show", sub)) => {
            let c = get_charge(conn, actor, req_id(sub, "id")?)?;
            print_record(sub, &c)?;
        }
        Some(("update", sub)) => {
            let upd = ChargeUpdate {
                title: opt_str(sub, "title"),
                amount: opt_decimal(sub, "amount")?,
                date: opt_date(sub, "date")?,
            };
            let c = update_own_charge(conn, actor, req_id(sub, "id")?, upd)?;
            println!("Updated charge {}", c.id);
        }
        Some(("delete", sub)) => {
            let id = req_id(sub, "id")?;
            delete_charge(conn, actor, id)?;
            println!("Deleted charge {}", id);
        }
        Some((verb @ ("approve" | "reject"), sub)) => {
            actor.require(HR_ADMINS)?;
            let decision = if verb == "approve" {
                ChargeStatus::Approved
            } else {
                ChargeStatus::Rejected
            };
            let ids = parse_ids(&req_str(sub, "ids")?)?;
            let reason = opt_str(sub, "reason");
            if ids.len() == 1 {
                let c = decide_charge(conn, actor, ids[0], decision, reason)?;
                println!("Charge {} {}", c.id, c.status);
            } else {
                let summary = decide_many(conn, actor, &ids, decision, reason);
                let (json_flag, jsonl_flag) = json_flags(sub);
                if !maybe_print_json(json_flag, jsonl_flag, &[&summary])? {
                    println!(
                        "{} charges: {} processed, {} failed",
                        summary.total, summary.processed, summary.failed
                    );
                    for e in &summary.errors {
                        println!("  {}", e);
                    }
                }
            }
        }
        _ => {}
    }
    Ok(())
}
