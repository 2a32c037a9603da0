// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::actor::Actor;
use crate::commands::audit::{self, AuditEntry};
use crate::commands::employees::find_employee;
use crate::error::{HrError, Result};
use crate::models::{HR_EXECUTIVES, Insurance, Role};
use crate::utils::{
    dec, id_for_employee, json_flags, maybe_print_json, opt_date, opt_dec,
    opt_decimal, opt_str, parse_date, parse_decimal, pretty_table, print_record, req_id, req_str,
};
use crate::visibility::Scope;
use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, Row, params};
use rust_decimal::Decimal;

#[derive(Debug, Clone)]
pub struct NewInsurance {
    pub employee_id: i64,
    pub policy_number: String,
    pub provider: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub coverage_amount: Decimal,
    pub bonus_percent: Option<Decimal>,
    pub ctc_file_url: Option<String>,
    pub e_cash_amount: Decimal,
    pub convenience_fee: Option<Decimal>,
}

#[derive(Debug, Clone, Default)]
pub struct InsuranceUpdate {
    pub policy_number: Option<String>,
    pub provider: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub coverage_amount: Option<Decimal>,
    pub ctc_file_url: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct FinancialUpdate {
    pub bonus_percent: Option<Decimal>,
    pub e_cash_amount: Option<Decimal>,
    pub convenience_fee: Option<Decimal>,
}

const SELECT_INSURANCE: &str = "SELECT i.id, i.employee_id, i.policy_number, i.provider, i.start_date,
        i.end_date, i.coverage_amount, i.bonus_percent, i.ctc_file_url, i.e_cash_amount, i.convenience_fee
        FROM insurances i";

fn insurance_from_row(r: &Row<'_>) -> rusqlite::Result<Insurance> {
    Ok(Insurance {
        id: r.get(0)?,
        employee_id: r.get(1)?,
        policy_number: r.get(2)?,
        provider: r.get(3)?,
        start_date: r.get(4)?,
        end_date: r.get(5)?,
        coverage_amount: dec(r, 6)?,
        bonus_percent: opt_dec(r, 7)?,
        ctc_file_url: r.get(8)?,
        e_cash_amount: dec(r, 9)?,
        convenience_fee: opt_dec(r, 10)?,
    })
}

fn find_insurance(conn: &Connection, id: i64) -> Result<Option<Insurance>> {
    let sql = format!("{} WHERE i.id = ?1", SELECT_INSURANCE);
    Ok(conn.query_row(&sql, params![id], insurance_from_row).optional()?)
}

pub fn create_insurance(conn: &Connection, actor: &Actor, new: NewInsurance) -> Result<Insurance> {
    if find_employee(conn, new.employee_id)?.is_none() {
        return Err(HrError::not_found("Employee not found"));
    }
    if new.end_date < new.start_date {
        return Err(HrError::validation("Policy end date must not be before its start"));
    }
    if new.policy_number.trim().is_empty() || new.provider.trim().is_empty() {
        return Err(HrError::validation("Policy number and provider are required"));
    }
    if [
        Some(new.coverage_amount),
        Some(new.e_cash_amount),
        new.bonus_percent,
        new.convenience_fee,
    ]
    .iter()
    .flatten()
    .any(|d| *d < Decimal::ZERO)
    {
        return Err(HrError::validation("Insurance amounts must not be negative"));
    }
    conn.execute(
        "INSERT INTO insurances(employee_id, policy_number, provider, start_date, end_date, coverage_amount,
                                bonus_percent, ctc_file_url, e_cash_amount, convenience_fee)
         VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10)",
        params![
            new.employee_id,
            new.policy_number.trim(),
            new.provider.trim(),
            new.start_date,
            new.end_date,
            new.coverage_amount.to_string(),
            new.bonus_percent.map(|d| d.to_string()),
            new.ctc_file_url,
            new.e_cash_amount.to_string(),
            new.convenience_fee.map(|d| d.to_string()),
        ],
    )?;
    let ins = find_insurance(conn, conn.last_insert_rowid())?
        .ok_or_else(|| HrError::not_found("Insurance record not found"))?;
    log::info!("insurance {} created for employee {}", ins.policy_number, ins.employee_id);
    audit::record(
        conn,
        actor,
        AuditEntry::new("INSURANCE", "CREATE", "Insurance", ins.id)
            .employee(ins.employee_id)
            .new_data(serde_json::to_value(&ins)?)
            .changes(format!(
                "Created insurance policy {} for employee {}",
                ins.policy_number, ins.employee_id
            )),
    );
    Ok(ins)
}

/// Scoped detail read; EMPLOYEE viewers only see their own records.
pub fn get_insurance(conn: &Connection, actor: &Actor, id: i64) -> Result<Insurance> {
    let ins = find_insurance(conn, id)?
        .ok_or_else(|| HrError::not_found("Insurance record not found"))?;
    if actor.role == Role::Employee && actor.employee_id != Some(ins.employee_id) {
        return Err(HrError::not_found("Insurance record not found"));
    }
    actor
        .scope()
        .ensure_visible(conn, ins.employee_id, "Insurance record")?;
    Ok(ins)
}

pub fn list_insurances(
    conn: &Connection,
    scope: &Scope,
    employee_id: Option<i64>,
) -> Result<Vec<Insurance>> {
    let mut sql = format!(
        "{} WHERE {}",
        SELECT_INSURANCE,
        scope.employee_filter("i.employee_id")
    );
    if employee_id.is_some() {
        sql.push_str(" AND i.employee_id = ?1");
    }
    sql.push_str(" ORDER BY i.created_at DESC, i.id DESC");
    let mut stmt = conn.prepare(&sql)?;
    let rows = match employee_id {
        Some(e) => stmt
            .query_map(params![e], insurance_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?,
        None => stmt
            .query_map([], insurance_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?,
    };
    Ok(rows)
}

fn write_update(
    conn: &Connection,
    actor: &Actor,
    before: Insurance,
    action_label: &str,
) -> Result<Insurance> {
    let after = find_insurance(conn, before.id)?
        .ok_or_else(|| HrError::not_found("Insurance not found"))?;
    log::info!("insurance {} {}", after.id, action_label);
    audit::record(
        conn,
        actor,
        AuditEntry::new("INSURANCE", "UPDATE", "Insurance", after.id)
            .employee(after.employee_id)
            .old(serde_json::to_value(&before)?)
            .new_data(serde_json::to_value(&after)?)
            .diffed(),
    );
    Ok(after)
}

pub fn update_insurance(
    conn: &Connection,
    actor: &Actor,
    id: i64,
    upd: InsuranceUpdate,
) -> Result<Insurance> {
    let before = get_insurance(conn, actor, id)?;
    let start = upd.start_date.unwrap_or(before.start_date);
    let end = upd.end_date.unwrap_or(before.end_date);
    if end < start {
        return Err(HrError::validation("Policy end date must not be before its start"));
    }
    if upd.coverage_amount.is_some_and(|d| d < Decimal::ZERO) {
        return Err(HrError::validation("Insurance amounts must not be negative"));
    }
    conn.execute(
        "UPDATE insurances SET
            policy_number = COALESCE(?1, policy_number),
            provider = COALESCE(?2, provider),
            start_date = ?3,
            end_date = ?4,
            coverage_amount = COALESCE(?5, coverage_amount),
            ctc_file_url = COALESCE(?6, ctc_file_url),
            updated_at = datetime('now')
         WHERE id = ?7",
        params![
            upd.policy_number,
            upd.provider,
            start,
            end,
            upd.coverage_amount.map(|d| d.to_string()),
            upd.ctc_file_url,
            id
        ],
    )?;
    write_update(conn, actor, before, "updated")
}

pub fn update_financial(
    conn: &Connection,
    actor: &Actor,
    id: i64,
    upd: FinancialUpdate,
) -> Result<Insurance> {
    if [upd.bonus_percent, upd.e_cash_amount, upd.convenience_fee]
        .iter()
        .flatten()
        .any(|d| *d < Decimal::ZERO)
    {
        return Err(HrError::validation("Financial amounts must not be negative"));
    }
    let before = get_insurance(conn, actor, id)?;
    conn.execute(
        "UPDATE insurances SET
            bonus_percent = COALESCE(?1, bonus_percent),
            e_cash_amount = COALESCE(?2, e_cash_amount),
            convenience_fee = COALESCE(?3, convenience_fee),
            updated_at = datetime('now')
         WHERE id = ?4",
        params![
            upd.bonus_percent.map(|d| d.to_string()),
            upd.e_cash_amount.map(|d| d.to_string()),
            upd.convenience_fee.map(|d| d.to_string()),
            id
        ],
    )?;
    write_update(conn, actor, before, "financials updated")
}

/// An employee records an e-cash claim against their own policy.
pub fn claim_ecash(
    conn: &Connection,
    actor: &Actor,
    id: i64,
    amount: Decimal,
) -> Result<Insurance> {
    let employee_id = actor.own_employee()?;
    let ins = find_insurance(conn, id)?
        .ok_or_else(|| HrError::not_found("Insurance record not found"))?;
    if ins.employee_id != employee_id {
        return Err(HrError::forbidden("You can only claim e-cash on your own policy"));
    }
    update_financial(
        conn,
        actor,
        id,
        FinancialUpdate {
            e_cash_amount: Some(amount),
            ..Default::default()
        },
    )
}

pub fn remove_insurance(conn: &Connection, actor: &Actor, id: i64) -> Result<()> {
    let ins = get_insurance(conn, actor, id)?;
    conn.execute("DELETE FROM insurances WHERE id = ?1", params![id])?;
    log::info!("insurance {} removed", id);
    audit::record(
        conn,
        actor,
        AuditEntry::new("INSURANCE", "DELETE", "Insurance", id)
            .employee(ins.employee_id)
            .old(serde_json::to_value(&ins)?)
            .changes(format!(
                "Deleted insurance policy {} (coverage: {})",
                ins.policy_number, ins.coverage_amount
            )),
    );
    Ok(())
}

pub fn handle(conn: &Connection, actor: &Actor, m: &clap::ArgMatches) -> anyhow::Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => {
            actor.require(HR_EXECUTIVES)?;
            let employee_id = id_for_employee(conn, &req_str(sub, "employee")?)?;
            actor.scope().ensure_visible(conn, employee_id, "Employee")?;
            let new = NewInsurance {
                employee_id,
                policy_number: req_str(sub, "policy-number")?,
                provider: req_str(sub, "provider")?,
                start_date: parse_date(&req_str(sub, "start")?)?,
                end_date: parse_date(&req_str(sub, "end")?)?,
                coverage_amount: parse_decimal(&req_str(sub, "coverage")?)?,
                bonus_percent: opt_decimal(sub, "bonus-percent")?,
                ctc_file_url: opt_str(sub, "ctc-file-url"),
                e_cash_amount: opt_decimal(sub, "e-cash")?.unwrap_or(Decimal::ZERO),
                convenience_fee: opt_decimal(sub, "convenience-fee")?,
            };
            let ins = create_insurance(conn, actor, new)?;
            println!("Created insurance {} ({})", ins.id, ins.policy_number);
        }
        Some(("list", sub)) => {
            let employee_id = if actor.role == Role::Employee || sub.get_flag("mine") {
                Some(actor.own_employee()?)
            } else {
                actor.require(HR_EXECUTIVES)?;
                opt_str(sub, "employee")
                    .map(|c| id_for_employee(conn, &c))
                    .transpose()?
            };
            let list = list_insurances(conn, &actor.scope(), employee_id)?;
            let (json_flag, jsonl_flag) = json_flags(sub);
            if !maybe_print_json(json_flag, jsonl_flag, &list)? {
                let rows = list
                    .iter()
                    .map(|i| {
                        vec![
                            i.id.to_string(),
                            i.employee_id.to_string(),
                            i.policy_number.clone(),
                            i.provider.clone(),
                            format!("{}..{}", i.start_date, i.end_date),
                            format!("{:.2}", i.coverage_amount),
                            format!("{:.2}", i.e_cash_amount),
                        ]
                    })
                    .collect();
                println!(
                    "{}",
                    pretty_table(
                        &["ID", "Employee", "Policy", "Provider", "Term", "Coverage", "E-cash"],
                        rows
                    )
                );
            }
        }
        Some(("show", sub)) => {
            let ins = get_insurance(conn, actor, req_id(sub, "id")?)?;
            print_record(sub, &ins)?;
        }
        Some(("update", sub)) => {
            actor.require(HR_EXECUTIVES)?;
            let upd = InsuranceUpdate {
                policy_number: opt_str(sub, "policy-number"),
                provider: opt_str(sub, "provider"),
                start_date: opt_date(sub, "start")?,
                end_date: opt_date(sub, "end")?,
                coverage_amount: opt_decimal(sub, "coverage")?,
                ctc_file_url: opt_str(sub, "ctc-file-url"),
            };
            let ins = update_insurance(conn, actor, req_id(sub, "id")?, upd)?;
            println!("Updated insurance {}", ins.id);
        }
        Some(("financial", sub)) => {
            actor.require(HR_EXECUTIVES)?;
            let upd = FinancialUpdate {
                bonus_percent: opt_decimal(sub, "bonus-percent")?,
                e_cash_amount: opt_decimal(sub, "e-cash")?,
                convenience_fee: opt_decimal(sub, "convenience-fee")?,
            };
            let ins = update_financial(conn, actor, req_id(sub, "id")?, upd)?;
            println!(
                "Insurance {}: bonus {}%, e-cash {:.2}, convenience fee {}",
                ins.id,
                ins.bonus_percent.unwrap_or_default(),
                ins.e_cash_amount,
                ins.convenience_fee.unwrap_or_default()
            );
        }
        Some(("ecash", sub)) => {
            let amount = parse_decimal(&req_str(sub, "amount")?)?;
            let ins = claim_ecash(conn, actor, req_id(sub, "id")?, amount)?;
            println!("Recorded e-cash {:.2} on insurance {}", ins.e_cash_amount, ins.id);
        }
        Some(("remove", sub)) => {
            actor.require(HR_EXECUTIVES)?;
            let id = req_id(sub, "id")?;
            remove_insurance(conn, actor, id)?;
            println!("Removed insurance {}", id);
        }
        _ => {}
    }
    Ok(())
}
