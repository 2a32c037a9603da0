// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::actor::Actor;
use crate::commands::carry_forward::carry_forward;
use crate::commands::employees::find_employee;
use crate::commands::ledger::{
    self, BalanceFilter, accrue_monthly, adjust_balance, find_balance, list_balances,
    set_initial_allocation,
};
use crate::commands::policies::{
    self, NewPolicy, PolicyUpdate, SPECIAL_LEAVE, create_policy, find_policy, list_policies,
    update_policy,
};
use crate::db::unit_of_work;
use crate::error::{HrError, Result};
use crate::models::{HR_ADMINS, HR_EXECUTIVES, LeaveRequest, LeaveStatus, Period, Role};
use crate::utils::{
    dec, id_for_employee, id_for_policy, json_flags, maybe_print_json, opt_decimal, opt_str,
    parse_date, parse_decimal, parse_period, pretty_table, req_id, req_str,
};
use crate::visibility::Scope;
use chrono::{Datelike, NaiveDate, Utc};
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use rust_decimal::Decimal;
use serde::Serialize;

/// Special Leave caps, counting PENDING and APPROVED requests by start date.
const SPECIAL_PER_MONTH: i64 = 1;
const SPECIAL_PER_YEAR: i64 = 12;

#[derive(Debug, Clone)]
pub struct NewLeaveRequest {
    pub policy_id: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub days: Decimal,
    pub half_day: bool,
    pub reason: Option<String>,
}

const SELECT_REQUEST: &str = "SELECT r.id, r.employee_id, r.policy_id, r.start_date, r.end_date, r.days,
        r.half_day, r.reason, r.status, r.approver_id, r.approved_at FROM leave_requests r";

fn request_from_row(r: &Row<'_>) -> rusqlite::Result<LeaveRequest> {
    Ok(LeaveRequest {
        id: r.get(0)?,
        employee_id: r.get(1)?,
        policy_id: r.get(2)?,
        start_date: r.get(3)?,
        end_date: r.get(4)?,
        days: dec(r, 5)?,
        half_day: r.get(6)?,
        reason: r.get(7)?,
        status: r.get(8)?,
        approver_id: r.get(9)?,
        approved_at: r.get(10)?,
    })
}

pub fn get_request(conn: &Connection, id: i64) -> Result<LeaveRequest> {
    let sql = format!("{} WHERE r.id = ?1", SELECT_REQUEST);
    conn.query_row(&sql, params![id], request_from_row)
        .optional()?
        .ok_or_else(|| HrError::not_found("Leave request not found"))
}

fn count_special(
    conn: &Connection,
    employee_id: i64,
    policy_id: i64,
    from: NaiveDate,
    until: NaiveDate,
) -> Result<i64> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM leave_requests
         WHERE employee_id = ?1 AND policy_id = ?2 AND status IN ('PENDING','APPROVED')
           AND start_date >= ?3 AND start_date < ?4",
        params![employee_id, policy_id, from, until],
        |r| r.get(0),
    )?)
}

fn check_special_caps(
    conn: &Connection,
    employee_id: i64,
    policy_id: i64,
    start: NaiveDate,
) -> Result<()> {
    let month = Period::from_date(start);
    if count_special(conn, employee_id, policy_id, month.first_day(), month.next().first_day())?
        >= SPECIAL_PER_MONTH
    {
        return Err(HrError::validation(
            "You can apply for only 1 Special Leave per month",
        ));
    }
    let year_start = Period::new(start.year(), 1)?;
    let next_year = Period::new(start.year() + 1, 1)?;
    if count_special(
        conn,
        employee_id,
        policy_id,
        year_start.first_day(),
        next_year.first_day(),
    )? >= SPECIAL_PER_YEAR
    {
        return Err(HrError::validation(
            "You cannot exceed 12 Special Leaves per year",
        ));
    }
    Ok(())
}

/// Submit a PENDING request against the `period` ledger row. Nothing in the
/// ledger changes until approval.
pub fn create_request(
    conn: &Connection,
    employee_id: i64,
    req: NewLeaveRequest,
    period: Period,
) -> Result<LeaveRequest> {
    let employee =
        find_employee(conn, employee_id)?.ok_or_else(|| HrError::not_found("Employee not found"))?;
    if employee.is_on_probation() {
        return Err(HrError::forbidden(
            "You are currently on probation. Paid leave not allowed",
        ));
    }
    let policy = find_policy(conn, req.policy_id)?
        .ok_or_else(|| HrError::validation("Invalid leave policy"))?;
    if policy.name == SPECIAL_LEAVE {
        check_special_caps(conn, employee_id, policy.id, req.start_date)?;
    }
    let balance = find_balance(conn, employee_id, policy.id, period)?
        .ok_or_else(|| HrError::validation("No leave balance available for this policy"))?;
    if req.days > balance.closing {
        return Err(HrError::validation(
            "Insufficient leave balance; applying this leave would result in Loss of Pay",
        ));
    }
    if req.end_date < req.start_date {
        return Err(HrError::validation("End date must not be before start date"));
    }
    if req.days <= Decimal::ZERO {
        return Err(HrError::validation("Requested days must be positive"));
    }

    conn.execute(
        "INSERT INTO leave_requests(employee_id, policy_id, start_date, end_date, days, half_day, reason, status)
         VALUES (?1,?2,?3,?4,?5,?6,?7,?8)",
        params![
            employee_id,
            policy.id,
            req.start_date,
            req.end_date,
            req.days.to_string(),
            req.half_day,
            req.reason,
            LeaveStatus::Pending
        ],
    )?;
    let id = conn.last_insert_rowid();
    log::info!(
        "leave request {} submitted by {} for {} days of {}",
        id,
        employee.person_no,
        req.days,
        policy.name
    );
    get_request(conn, id)
}

/// Withdraw one of the employee's own PENDING requests.
pub fn cancel_request(conn: &Connection, employee_id: i64, id: i64) -> Result<LeaveRequest> {
    let req = get_request(conn, id)?;
    if req.employee_id != employee_id {
        return Err(HrError::not_found("Leave request not found"));
    }
    if req.status != LeaveStatus::Pending {
        return Err(HrError::validation("Only pending requests can be cancelled"));
    }
    conn.execute(
        "UPDATE leave_requests SET status = ?1 WHERE id = ?2",
        params![LeaveStatus::Cancelled, id],
    )?;
    log::info!("leave request {} cancelled", id);
    get_request(conn, id)
}

/// Mark APPROVED and debit the `period` ledger row in one transaction.
pub fn approve_request(
    conn: &Connection,
    id: i64,
    approver: &Actor,
    period: Period,
) -> Result<LeaveRequest> {
    unit_of_work(conn, |tx| {
        let req = get_request(tx, id)?;
        if req.status != LeaveStatus::Pending {
            return Err(HrError::validation("Only pending requests can be approved"));
        }
        tx.execute(
            "UPDATE leave_requests SET status = ?1, approver_id = ?2, approved_at = ?3 WHERE id = ?4",
            params![LeaveStatus::Approved, approver.user_id, Utc::now(), id],
        )?;
        if ledger::debit(tx, req.employee_id, req.policy_id, period, req.days)?.is_none() {
            log::warn!(
                "approved leave request {} has no {} balance row to debit",
                id,
                period
            );
        }
        Ok(())
    })?;
    log::info!("leave request {} approved by {}", id, approver.email);
    get_request(conn, id)
}

pub fn reject_request(conn: &Connection, id: i64, approver: &Actor) -> Result<LeaveRequest> {
    let req = get_request(conn, id)?;
    if req.status != LeaveStatus::Pending {
        return Err(HrError::validation("Only pending requests can be rejected"));
    }
    conn.execute(
        "UPDATE leave_requests SET status = ?1, approver_id = ?2, approved_at = ?3 WHERE id = ?4",
        params![LeaveStatus::Rejected, approver.user_id, Utc::now(), id],
    )?;
    log::info!("leave request {} rejected by {}", id, approver.email);
    get_request(conn, id)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestView {
    #[serde(flatten)]
    pub request: LeaveRequest,
    pub employee_code: String,
    pub employee_name: String,
    pub policy_name: String,
}

#[derive(Debug, Clone, Default)]
pub struct RequestFilter {
    pub status: Option<LeaveStatus>,
    pub employee_id: Option<i64>,
}

/// Newest first.
pub fn list_requests(
    conn: &Connection,
    scope: &Scope,
    filter: &RequestFilter,
) -> Result<Vec<RequestView>> {
    let mut sql = format!(
        "SELECT r.id, r.employee_id, r.policy_id, r.start_date, r.end_date, r.days, r.half_day, r.reason,
                r.status, r.approver_id, r.approved_at, e.person_no, e.first_name || ' ' || e.last_name, p.name
         FROM leave_requests r
         JOIN employees e ON e.id = r.employee_id
         JOIN leave_policies p ON p.id = r.policy_id
         WHERE {}",
        scope.employee_filter("r.employee_id")
    );
    let mut args: Vec<SqlValue> = Vec::new();
    if let Some(s) = filter.status {
        sql.push_str(" AND r.status = ?");
        args.push(SqlValue::Text(s.as_str().to_string()));
    }
    if let Some(e) = filter.employee_id {
        sql.push_str(" AND r.employee_id = ?");
        args.push(SqlValue::Integer(e));
    }
    sql.push_str(" ORDER BY r.created_at DESC, r.id DESC");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(args), |r| {
        Ok(RequestView {
            request: request_from_row(r)?,
            employee_code: r.get(11)?,
            employee_name: r.get(12)?,
            policy_name: r.get(13)?,
        })
    })?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

fn period_arg(m: &clap::ArgMatches) -> Result<Period> {
    match opt_str(m, "period") {
        Some(p) => parse_period(&p),
        None => Ok(Period::current()),
    }
}

pub fn handle(conn: &Connection, actor: &Actor, m: &clap::ArgMatches) -> anyhow::Result<()> {
    match m.subcommand() {
        Some(("policy", sub)) => handle_policy(conn, actor, sub)?,
        Some(("assign", sub)) => {
            actor.require(HR_EXECUTIVES)?;
            let employee_id = id_for_employee(conn, &req_str(sub, "employee")?)?;
            actor.scope().ensure_visible(conn, employee_id, "Employee")?;
            let policy_id = id_for_policy(conn, &req_str(sub, "policy")?)?;
            let days = parse_decimal(&req_str(sub, "days")?)?;
            let period = period_arg(sub)?;
            let b = set_initial_allocation(conn, employee_id, policy_id, days, period)?;
            println!(
                "Assigned {} days for {} (closing {})",
                b.opening, b.period, b.closing
            );
        }
        Some(("adjust", sub)) => {
            actor.require(HR_ADMINS)?;
            let employee_id = id_for_employee(conn, &req_str(sub, "employee")?)?;
            actor.scope().ensure_visible(conn, employee_id, "Employee")?;
            let policy_id = id_for_policy(conn, &req_str(sub, "policy")?)?;
            let delta = parse_decimal(&req_str(sub, "delta")?)?;
            let b = adjust_balance(conn, employee_id, policy_id, period_arg(sub)?, delta)?;
            println!("Adjusted {} by {} (closing {})", b.period, delta, b.closing);
        }
        Some(("accrue", sub)) => {
            actor.require(HR_ADMINS)?;
            let period = period_arg(sub)?;
            let n = accrue_monthly(conn, period)?;
            println!("Accrued {} balances for {}", n, period);
        }
        Some(("balances", sub)) => {
            let mut filter = BalanceFilter {
                period: opt_str(sub, "period").map(|p| parse_period(&p)).transpose()?,
                ..Default::default()
            };
            if let Some(p) = opt_str(sub, "policy") {
                filter.policy_id = Some(id_for_policy(conn, &p)?);
            }
            if sub.get_flag("mine") || actor.role == Role::Employee {
                filter.employee_id = Some(actor.own_employee()?);
            } else {
                actor.require(HR_EXECUTIVES)?;
                if let Some(code) = opt_str(sub, "employee") {
                    filter.employee_id = Some(id_for_employee(conn, &code)?);
                }
            }
            let rows = list_balances(conn, &actor.scope(), &filter)?;
            let (json_flag, jsonl_flag) = json_flags(sub);
            if !maybe_print_json(json_flag, jsonl_flag, &rows)? {
                let table = rows
                    .iter()
                    .map(|v| {
                        let b = &v.balance;
                        vec![
                            v.employee_code.clone(),
                            v.policy_name.clone(),
                            b.period.to_string(),
                            b.opening.to_string(),
                            b.accrued.to_string(),
                            b.used.to_string(),
                            b.adjusted.to_string(),
                            b.closing.to_string(),
                        ]
                    })
                    .collect();
                println!(
                    "{}",
                    pretty_table(
                        &[
                            "Employee", "Policy", "Period", "Opening", "Accrued", "Used",
                            "Adjusted", "Closing"
                        ],
                        table
                    )
                );
            }
        }
        Some(("request", sub)) => {
            let employee_id = actor.own_employee()?;
            let policy_id = id_for_policy(conn, &req_str(sub, "policy")?)
                .map_err(|_| HrError::validation("Invalid leave policy"))?;
            let start = parse_date(&req_str(sub, "start")?)?;
            let end = match opt_str(sub, "end") {
                Some(e) => parse_date(&e)?,
                None => start,
            };
            let half_day = sub.get_flag("half-day");
            let days = match opt_decimal(sub, "days")? {
                Some(d) => d,
                None if half_day => Decimal::new(5, 1),
                None => Decimal::from((end - start).num_days() + 1),
            };
            let req = NewLeaveRequest {
                policy_id,
                start_date: start,
                end_date: end,
                days,
                half_day,
                reason: opt_str(sub, "reason"),
            };
            let created = create_request(conn, employee_id, req, period_arg(sub)?)?;
            println!("Leave request {} submitted ({} days)", created.id, created.days);
        }
        Some(("cancel", sub)) => {
            let r = cancel_request(conn, actor.own_employee()?, req_id(sub, "id")?)?;
            println!("Leave request {} cancelled", r.id);
        }
        Some(("approve", sub)) => {
            actor.require(HR_EXECUTIVES)?;
            let id = req_id(sub, "id")?;
            let req = get_request(conn, id)?;
            actor.scope().ensure_visible(conn, req.employee_id, "Leave request")?;
            let r = approve_request(conn, id, actor, period_arg(sub)?)?;
            println!("Leave request {} approved", r.id);
        }
        Some(("reject", sub)) => {
            actor.require(HR_EXECUTIVES)?;
            let id = req_id(sub, "id")?;
            let req = get_request(conn, id)?;
            actor.scope().ensure_visible(conn, req.employee_id, "Leave request")?;
            let r = reject_request(conn, id, actor)?;
            println!("Leave request {} rejected", r.id);
        }
        Some(("requests", sub)) => {
            let mut filter = RequestFilter {
                status: opt_str(sub, "status")
                    .map(|s| s.parse::<LeaveStatus>())
                    .transpose()?,
                ..Default::default()
            };
            if sub.get_flag("mine") || actor.role == Role::Employee {
                filter.employee_id = Some(actor.own_employee()?);
            } else {
                actor.require(HR_EXECUTIVES)?;
            }
            let rows = list_requests(conn, &actor.scope(), &filter)?;
            let (json_flag, jsonl_flag) = json_flags(sub);
            if !maybe_print_json(json_flag, jsonl_flag, &rows)? {
                let table = rows
                    .iter()
                    .map(|v| {
                        let r = &v.request;
                        vec![
                            r.id.to_string(),
                            v.employee_code.clone(),
                            v.employee_name.clone(),
                            v.policy_name.clone(),
                            r.start_date.to_string(),
                            r.end_date.to_string(),
                            r.days.to_string(),
                            r.status.to_string(),
                        ]
                    })
                    .collect();
                println!(
                    "{}",
                    pretty_table(
                        &["ID", "Employee", "Name", "Policy", "From", "To", "Days", "Status"],
                        table
                    )
                );
            }
        }
        Some(("carry-forward", sub)) => {
            actor.require(HR_EXECUTIVES)?;
            let period = period_arg(sub)?;
            let report = carry_forward(conn, period)?;
            let (json_flag, jsonl_flag) = json_flags(sub);
            if !maybe_print_json(json_flag, jsonl_flag, &report)? {
                println!(
                    "Carried forward {} balances into {} (skipped: {} e-cash, {} empty)",
                    report.rolled,
                    period.next(),
                    report.skipped_ecash,
                    report.skipped_zero
                );
            }
        }
        _ => {}
    }
    Ok(())
}

fn handle_policy(conn: &Connection, actor: &Actor, m: &clap::ArgMatches) -> anyhow::Result<()> {
    match m.subcommand() {
        Some(("create", sub)) => {
            actor.require(HR_ADMINS)?;
            let mut new = NewPolicy::named(req_str(sub, "name")?);
            if let Some(r) = opt_str(sub, "region") {
                new.region = r;
            }
            if let Some(a) = opt_decimal(sub, "accrual")? {
                new.accrual_per_month = a;
            }
            if let Some(q) = sub.get_one::<i64>("quota") {
                new.annual_quota = *q;
            }
            if let Some(c) = sub.get_one::<bool>("carry-forward") {
                new.carry_forward = *c;
            }
            if let Some(c) = sub.get_one::<i64>("max-carry") {
                new.max_carry_forward = *c;
            }
            if let Some(d) = sub.get_one::<i64>("doc-after") {
                new.requires_doc_after = *d;
            }
            let p = create_policy(conn, new)?;
            println!("Created leave policy '{}' id={}", p.name, p.id);
        }
        Some(("list", sub)) => {
            let list = list_policies(conn)?;
            let (json_flag, jsonl_flag) = json_flags(sub);
            if !maybe_print_json(json_flag, jsonl_flag, &list)? {
                let rows = list
                    .iter()
                    .map(|p| {
                        vec![
                            p.name.clone(),
                            p.region.clone(),
                            p.accrual_per_month.to_string(),
                            p.annual_quota.to_string(),
                            if p.carry_forward { "yes" } else { "no" }.to_string(),
                            p.max_carry_forward.to_string(),
                            p.requires_doc_after.to_string(),
                        ]
                    })
                    .collect();
                println!(
                    "{}",
                    pretty_table(
                        &["Name", "Region", "Accrual/mo", "Quota", "Carry", "Max carry", "Doc after"],
                        rows
                    )
                );
            }
        }
        Some(("update", sub)) => {
            actor.require(HR_ADMINS)?;
            let id = id_for_policy(conn, &req_str(sub, "name")?)?;
            let upd = PolicyUpdate {
                region: opt_str(sub, "region"),
                accrual_per_month: opt_decimal(sub, "accrual")?,
                annual_quota: sub.get_one::<i64>("quota").copied(),
                carry_forward: sub.get_one::<bool>("carry-forward").copied(),
                max_carry_forward: sub.get_one::<i64>("max-carry").copied(),
                requires_doc_after: sub.get_one::<i64>("doc-after").copied(),
            };
            let p = update_policy(conn, id, upd)?;
            println!("Updated leave policy '{}'", p.name);
        }
        Some(("delete", sub)) => {
            actor.require(HR_ADMINS)?;
            let name = req_str(sub, "name")?;
            let id = id_for_policy(conn, &name)?;
            policies::delete_policy(conn, id)?;
            println!("Deleted leave policy '{}'", name);
        }
        _ => {}
    }
    Ok(())
}
