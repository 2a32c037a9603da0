// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::actor::Actor;
use crate::commands::audit::{self, AuditEntry};
use crate::commands::convenience::approved_charges_between;
use crate::commands::employees::{find_employee, get_compensation};
use crate::db::unit_of_work;
use crate::error::{HrError, Result};
use crate::models::{HR_EXECUTIVES, Payslip, PayslipLine, Period, PayrollRun, Role, RunStatus};
use crate::utils::{
    dec, fmt_money, id_for_employee, json_flags, maybe_print_json, opt_decimal, opt_str,
    parse_date, pretty_table, print_record, req_id, req_str,
};
use crate::visibility::Scope;
use chrono::{NaiveDate, Utc};
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use rust_decimal::Decimal;
use serde::Serialize;

const SELECT_RUN: &str = "SELECT id, period_start, period_end, pay_date, status FROM payroll_runs";

fn run_from_row(r: &Row<'_>) -> rusqlite::Result<PayrollRun> {
    Ok(PayrollRun {
        id: r.get(0)?,
        period_start: r.get(1)?,
        period_end: r.get(2)?,
        pay_date: r.get(3)?,
        status: r.get(4)?,
    })
}

pub fn find_run(conn: &Connection, id: i64) -> Result<Option<PayrollRun>> {
    let sql = format!("{} WHERE id = ?1", SELECT_RUN);
    Ok(conn.query_row(&sql, params![id], run_from_row).optional()?)
}

pub fn get_run(conn: &Connection, id: i64) -> Result<PayrollRun> {
    find_run(conn, id)?.ok_or_else(|| HrError::not_found(format!("Payroll run {} not found", id)))
}

/// Newest first.
pub fn list_runs(conn: &Connection) -> Result<Vec<PayrollRun>> {
    let sql = format!("{} ORDER BY period_start DESC, id DESC", SELECT_RUN);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], run_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Most recently created run whose period contains `date`.
pub fn run_covering(conn: &Connection, date: NaiveDate) -> Result<Option<PayrollRun>> {
    let sql = format!(
        "{} WHERE period_start <= ?1 AND period_end >= ?1 ORDER BY id DESC LIMIT 1",
        SELECT_RUN
    );
    Ok(conn.query_row(&sql, params![date], run_from_row).optional()?)
}

/// Create a DRAFT run. Overlapping periods are allowed and only logged.
pub fn start_run(
    conn: &Connection,
    period_start: NaiveDate,
    period_end: NaiveDate,
    pay_date: NaiveDate,
) -> Result<PayrollRun> {
    if period_end < period_start {
        return Err(HrError::validation(
            "Payroll period end must not be before its start",
        ));
    }
    let overlapping: i64 = conn.query_row(
        "SELECT COUNT(*) FROM payroll_runs WHERE period_start <= ?2 AND period_end >= ?1",
        params![period_start, period_end],
        |r| r.get(0),
    )?;
    if overlapping > 0 {
        log::warn!(
            "payroll run {}..{} overlaps {} existing run(s)",
            period_start,
            period_end,
            overlapping
        );
    }
    conn.execute(
        "INSERT INTO payroll_runs(period_start, period_end, pay_date, status) VALUES (?1,?2,?3,?4)",
        params![period_start, period_end, pay_date, RunStatus::Draft],
    )?;
    let run = get_run(conn, conn.last_insert_rowid())?;
    log::info!("payroll run {} started for {}..{}", run.id, period_start, period_end);
    Ok(run)
}

fn pay_date_after(period: Period, pay_day: u32) -> Result<NaiveDate> {
    let next = period.next();
    NaiveDate::from_ymd_opt(next.year(), next.month(), pay_day)
        .ok_or_else(|| HrError::validation(format!("Invalid pay day {}", pay_day)))
}

/// Make sure a run covers `today`. An existing run gets its pay date moved to
/// `pay_day` of the following month; otherwise a DRAFT run for the calendar
/// month is created.
pub fn ensure_current_run(
    conn: &Connection,
    today: NaiveDate,
    pay_day: u32,
) -> Result<PayrollRun> {
    let period = Period::from_date(today);
    let pay_date = pay_date_after(period, pay_day)?;
    match run_covering(conn, today)? {
        Some(run) => {
            conn.execute(
                "UPDATE payroll_runs SET pay_date = ?1 WHERE id = ?2",
                params![pay_date, run.id],
            )?;
            log::debug!("payroll run {} covers {}; pay date {}", run.id, today, pay_date);
            get_run(conn, run.id)
        }
        None => start_run(conn, period.first_day(), period.last_day(), pay_date),
    }
}

pub fn delete_run(conn: &Connection, actor: &Actor, id: i64) -> Result<()> {
    let run = get_run(conn, id)?;
    conn.execute("DELETE FROM payroll_runs WHERE id = ?1", params![id])?;
    log::info!("payroll run {} deleted", id);
    audit::record(
        conn,
        actor,
        AuditEntry::new("PAYROLL", "DELETE", "PayrollRun", id)
            .old(serde_json::to_value(&run)?)
            .changes(format!("Deleted payroll run {}..{}", run.period_start, run.period_end)),
    );
    Ok(())
}

/// Component amounts for one payslip. Deductions are given as positive values.
#[derive(Debug, Clone, Default)]
pub struct PayslipInput {
    pub employee_id: i64,
    pub run_id: i64,
    pub currency: Option<String>,
    pub basic: Decimal,
    pub hra: Decimal,
    pub conveyance: Decimal,
    pub medical: Decimal,
    pub bonus: Decimal,
    pub other_earnings: Decimal,
    pub leave_deduction: Decimal,
    pub professional_tax: Decimal,
    pub other_deductions: Decimal,
    /// Fold approved, unattached convenience charges dated inside the run
    /// into Other Earnings and attach them to the payslip.
    pub include_charges: bool,
}

impl PayslipInput {
    pub fn gross(&self) -> Decimal {
        self.basic + self.hra + self.conveyance + self.medical + self.bonus + self.other_earnings
    }

    pub fn deductions(&self) -> Decimal {
        self.leave_deduction + self.professional_tax + self.other_deductions
    }

    fn validate(&self) -> Result<()> {
        let parts = [
            self.basic,
            self.hra,
            self.conveyance,
            self.medical,
            self.bonus,
            self.other_earnings,
            self.leave_deduction,
            self.professional_tax,
            self.other_deductions,
        ];
        if parts.iter().any(|d| *d < Decimal::ZERO) {
            return Err(HrError::validation("Payslip components must not be negative"));
        }
        Ok(())
    }
}

// Avoids rendering "-0" for empty deductions.
fn negated(d: Decimal) -> Decimal {
    if d.is_zero() {
        Decimal::ZERO
    } else {
        -d
    }
}

/// Itemized lines in payslip order; deductions carry a negative sign.
pub fn build_lines(input: &PayslipInput) -> Vec<PayslipLine> {
    let gross = input.gross();
    let deductions = input.deductions();
    [
        ("Basic", input.basic),
        ("HRA", input.hra),
        ("Conveyance", input.conveyance),
        ("Medical", input.medical),
        ("Bonus", input.bonus),
        ("Other Earnings", input.other_earnings),
        ("Leave Deduction", negated(input.leave_deduction)),
        ("Professional Tax", negated(input.professional_tax)),
        ("Other Deductions", negated(input.other_deductions)),
        ("Gross", gross),
        ("Total Deductions", negated(deductions)),
        ("Net Pay", gross - deductions),
    ]
    .into_iter()
    .map(|(label, amount)| PayslipLine {
        label: label.to_string(),
        amount,
    })
    .collect()
}

const SELECT_PAYSLIP: &str = "SELECT s.id, s.employee_id, s.payroll_run_id, s.gross, s.deductions, s.net,
        s.currency, s.lines, s.basic, s.hra, s.conveyance, s.medical, s.bonus, s.other_earnings,
        s.leave_deduction, s.professional_tax, s.other_deductions FROM payslips s";

fn payslip_from_row(r: &Row<'_>) -> rusqlite::Result<Payslip> {
    let raw: String = r.get(7)?;
    let lines: Vec<PayslipLine> = serde_json::from_str(&raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(7, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(Payslip {
        id: r.get(0)?,
        employee_id: r.get(1)?,
        payroll_run_id: r.get(2)?,
        gross: dec(r, 3)?,
        deductions: dec(r, 4)?,
        net: dec(r, 5)?,
        currency: r.get(6)?,
        lines,
        basic: dec(r, 8)?,
        hra: dec(r, 9)?,
        conveyance: dec(r, 10)?,
        medical: dec(r, 11)?,
        bonus: dec(r, 12)?,
        other_earnings: dec(r, 13)?,
        leave_deduction: dec(r, 14)?,
        professional_tax: dec(r, 15)?,
        other_deductions: dec(r, 16)?,
    })
}

fn find_payslip(conn: &Connection, id: i64) -> Result<Option<Payslip>> {
    let sql = format!("{} WHERE s.id = ?1", SELECT_PAYSLIP);
    Ok(conn.query_row(&sql, params![id], payslip_from_row).optional()?)
}

fn payslip_exists(conn: &Connection, employee_id: i64, run_id: i64) -> Result<bool> {
    let n: i64 = conn.query_row(
        "SELECT COUNT(*) FROM payslips WHERE employee_id = ?1 AND payroll_run_id = ?2",
        params![employee_id, run_id],
        |r| r.get(0),
    )?;
    Ok(n > 0)
}

/// One payslip for (employee, run). A second call for the same pair fails
/// with `Duplicate`. Flips a DRAFT run to PAID.
pub fn generate_payslip(
    conn: &Connection,
    actor: &Actor,
    mut input: PayslipInput,
    default_currency: &str,
) -> Result<Payslip> {
    input.validate()?;
    let id = unit_of_work(conn, |tx| {
        if find_employee(tx, input.employee_id)?.is_none() {
            return Err(HrError::not_found("Employee not found"));
        }
        let run = find_run(tx, input.run_id)?
            .ok_or_else(|| HrError::not_found("Payroll run not found"))?;
        if payslip_exists(tx, input.employee_id, run.id)? {
            return Err(HrError::duplicate(
                "Payslip already exists for this employee and run",
            ));
        }
        let charges = if input.include_charges {
            approved_charges_between(tx, input.employee_id, run.period_start, run.period_end)?
        } else {
            Vec::new()
        };
        for c in &charges {
            input.other_earnings += c.amount;
        }
        let currency = match input.currency.clone() {
            Some(c) => c,
            None => get_compensation(tx, input.employee_id)?
                .map(|c| c.currency)
                .unwrap_or_else(|| default_currency.to_string()),
        };
        let lines = build_lines(&input);
        let gross = input.gross();
        let deductions = input.deductions();
        tx.execute(
            "INSERT INTO payslips(employee_id, payroll_run_id, gross, deductions, net, currency, lines,
                                  basic, hra, conveyance, medical, bonus, other_earnings,
                                  leave_deduction, professional_tax, other_deductions)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16)",
            params![
                input.employee_id,
                run.id,
                gross.to_string(),
                deductions.to_string(),
                (gross - deductions).to_string(),
                currency.trim().to_uppercase(),
                serde_json::to_string(&lines)?,
                input.basic.to_string(),
                input.hra.to_string(),
                input.conveyance.to_string(),
                input.medical.to_string(),
                input.bonus.to_string(),
                input.other_earnings.to_string(),
                input.leave_deduction.to_string(),
                input.professional_tax.to_string(),
                input.other_deductions.to_string(),
            ],
        )?;
        let payslip_id = tx.last_insert_rowid();
        for c in &charges {
            tx.execute(
                "UPDATE convenience_charges SET payslip_id = ?1 WHERE id = ?2",
                params![payslip_id, c.id],
            )?;
        }
        if run.status == RunStatus::Draft {
            tx.execute(
                "UPDATE payroll_runs SET status = ?1 WHERE id = ?2",
                params![RunStatus::Paid, run.id],
            )?;
            log::info!("payroll run {} marked PAID by first payslip", run.id);
        }
        Ok(payslip_id)
    })?;

    let payslip = find_payslip(conn, id)?.ok_or_else(|| HrError::not_found("Payslip not found"))?;
    log::info!(
        "payslip {} generated for employee {} in run {} (net {})",
        payslip.id,
        payslip.employee_id,
        payslip.payroll_run_id,
        payslip.net
    );
    audit::record(
        conn,
        actor,
        AuditEntry::new("PAYSLIP", "CREATE", "Payslip", payslip.id)
            .employee(payslip.employee_id)
            .new_data(serde_json::to_value(&payslip)?)
            .changes(format!("Created payslip for employee {}", payslip.employee_id)),
    );
    Ok(payslip)
}

/// Give every employee still without a payslip in the run a base-salary
/// payslip, then mark the run PAID. Returns the number of payslips created.
pub fn publish(
    conn: &Connection,
    actor: &Actor,
    run_id: i64,
    default_currency: &str,
) -> Result<usize> {
    let created = unit_of_work(conn, |tx| {
        let run = find_run(tx, run_id)?
            .ok_or_else(|| HrError::not_found(format!("Payroll run {} not found", run_id)))?;
        let mut stmt = tx.prepare(
            "SELECT e.id, c.base_salary, c.currency FROM employees e
             LEFT JOIN compensations c ON c.employee_id = e.id
             WHERE e.id NOT IN (SELECT employee_id FROM payslips WHERE payroll_run_id = ?1)
             ORDER BY e.id",
        )?;
        let pending = stmt
            .query_map(params![run.id], |r| {
                Ok((
                    r.get::<_, i64>(0)?,
                    crate::utils::opt_dec(r, 1)?,
                    r.get::<_, Option<String>>(2)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        for (employee_id, base, currency) in &pending {
            let gross = base.unwrap_or(Decimal::ZERO);
            let lines = vec![
                PayslipLine {
                    label: "Base Salary".to_string(),
                    amount: gross,
                },
                PayslipLine {
                    label: "Net Pay".to_string(),
                    amount: gross,
                },
            ];
            tx.execute(
                "INSERT INTO payslips(employee_id, payroll_run_id, gross, deductions, net, currency, lines, basic)
                 VALUES (?1,?2,?3,'0',?3,?4,?5,?3)",
                params![
                    employee_id,
                    run.id,
                    gross.to_string(),
                    currency.as_deref().unwrap_or(default_currency),
                    serde_json::to_string(&lines)?,
                ],
            )?;
        }
        tx.execute(
            "UPDATE payroll_runs SET status = ?1 WHERE id = ?2",
            params![RunStatus::Paid, run.id],
        )?;
        Ok(pending.len())
    })?;
    log::info!("payroll run {} published; {} payslips created", run_id, created);
    audit::record(
        conn,
        actor,
        AuditEntry::new("PAYROLL", "PUBLISH", "PayrollRun", run_id)
            .changes(format!("Published run with {} new payslips", created)),
    );
    Ok(created)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayslipView {
    #[serde(flatten)]
    pub payslip: Payslip,
    pub employee_code: String,
    pub employee_name: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
}

#[derive(Debug, Clone, Default)]
pub struct PayslipFilter {
    pub run_id: Option<i64>,
    pub employee_id: Option<i64>,
}

pub fn list_payslips(
    conn: &Connection,
    scope: &Scope,
    filter: &PayslipFilter,
) -> Result<Vec<PayslipView>> {
    let mut sql = format!(
        "SELECT s.id, s.employee_id, s.payroll_run_id, s.gross, s.deductions, s.net, s.currency, s.lines,
                s.basic, s.hra, s.conveyance, s.medical, s.bonus, s.other_earnings, s.leave_deduction,
                s.professional_tax, s.other_deductions,
                e.person_no, e.first_name || ' ' || e.last_name, r.period_start, r.period_end
         FROM payslips s
         JOIN employees e ON e.id = s.employee_id
         JOIN payroll_runs r ON r.id = s.payroll_run_id
         WHERE {}",
        scope.employee_filter("s.employee_id")
    );
    let mut args: Vec<SqlValue> = Vec::new();
    if let Some(r) = filter.run_id {
        sql.push_str(" AND s.payroll_run_id = ?");
        args.push(SqlValue::Integer(r));
    }
    if let Some(e) = filter.employee_id {
        sql.push_str(" AND s.employee_id = ?");
        args.push(SqlValue::Integer(e));
    }
    sql.push_str(" ORDER BY r.period_start DESC, e.person_no");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(args), |r| {
        Ok(PayslipView {
            payslip: payslip_from_row(r)?,
            employee_code: r.get(17)?,
            employee_name: r.get(18)?,
            period_start: r.get(19)?,
            period_end: r.get(20)?,
        })
    })?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Scoped detail read; EMPLOYEE viewers only see their own payslips.
pub fn get_payslip(conn: &Connection, actor: &Actor, id: i64) -> Result<Payslip> {
    let payslip =
        find_payslip(conn, id)?.ok_or_else(|| HrError::not_found(format!("Payslip {} not found", id)))?;
    if actor.role == Role::Employee && actor.employee_id != Some(payslip.employee_id) {
        return Err(HrError::not_found(format!("Payslip {} not found", id)));
    }
    actor
        .scope()
        .ensure_visible(conn, payslip.employee_id, &format!("Payslip {}", id))?;
    Ok(payslip)
}

/// The employee's payslip in the run covering `today`.
pub fn current_payslip(conn: &Connection, employee_id: i64, today: NaiveDate) -> Result<Payslip> {
    let run = run_covering(conn, today)?
        .ok_or_else(|| HrError::not_found("No payroll run found for this month"))?;
    let sql = format!(
        "{} WHERE s.employee_id = ?1 AND s.payroll_run_id = ?2",
        SELECT_PAYSLIP
    );
    conn.query_row(&sql, params![employee_id, run.id], payslip_from_row)
        .optional()?
        .ok_or_else(|| HrError::not_found("No payslip found for this month"))
}

pub fn delete_payslip(conn: &Connection, actor: &Actor, id: i64) -> Result<()> {
    let payslip = get_payslip(conn, actor, id)?;
    conn.execute("DELETE FROM payslips WHERE id = ?1", params![id])?;
    log::info!("payslip {} deleted", id);
    audit::record(
        conn,
        actor,
        AuditEntry::new("PAYSLIP", "DELETE", "Payslip", id)
            .employee(payslip.employee_id)
            .old(serde_json::to_value(&payslip)?)
            .changes(format!(
                "Deleted payslip (gross: {}, net: {})",
                payslip.gross, payslip.net
            )),
    );
    Ok(())
}

fn amount(m: &clap::ArgMatches, id: &str) -> Result<Decimal> {
    Ok(opt_decimal(m, id)?.unwrap_or(Decimal::ZERO))
}

fn print_payslips(sub: &clap::ArgMatches, rows: &[PayslipView]) -> anyhow::Result<()> {
    let (json_flag, jsonl_flag) = json_flags(sub);
    if maybe_print_json(json_flag, jsonl_flag, &rows)? {
        return Ok(());
    }
    let table = rows
        .iter()
        .map(|v| {
            let p = &v.payslip;
            vec![
                p.id.to_string(),
                v.employee_code.clone(),
                v.employee_name.clone(),
                format!("{}..{}", v.period_start, v.period_end),
                fmt_money(&p.gross, &p.currency),
                fmt_money(&p.deductions, &p.currency),
                fmt_money(&p.net, &p.currency),
            ]
        })
        .collect();
    println!(
        "{}",
        pretty_table(
            &["ID", "Employee", "Name", "Period", "Gross", "Deductions", "Net"],
            table
        )
    );
    Ok(())
}

fn print_lines(p: &Payslip) {
    let rows = p
        .lines
        .iter()
        .map(|l| vec![l.label.clone(), format!("{:.2}", l.amount)])
        .collect();
    println!("{}", pretty_table(&["Item", p.currency.as_str()], rows));
}

pub fn handle(
    conn: &Connection,
    actor: &Actor,
    default_currency: &str,
    pay_day: u32,
    m: &clap::ArgMatches,
) -> anyhow::Result<()> {
    match m.subcommand() {
        Some(("run", sub)) => match sub.subcommand() {
            Some(("start", s)) => {
                actor.require(HR_EXECUTIVES)?;
                let run = start_run(
                    conn,
                    parse_date(&req_str(s, "start")?)?,
                    parse_date(&req_str(s, "end")?)?,
                    parse_date(&req_str(s, "pay-date")?)?,
                )?;
                println!("Started payroll run {} ({}..{})", run.id, run.period_start, run.period_end);
            }
            Some(("ensure", _)) => {
                actor.require(HR_EXECUTIVES)?;
                let run = ensure_current_run(conn, Utc::now().date_naive(), pay_day)?;
                println!("Current payroll run {} pays on {}", run.id, run.pay_date);
            }
            Some(("list", s)) => {
                actor.require(HR_EXECUTIVES)?;
                let runs = list_runs(conn)?;
                let (json_flag, jsonl_flag) = json_flags(s);
                if !maybe_print_json(json_flag, jsonl_flag, &runs)? {
                    let rows = runs
                        .iter()
                        .map(|r| {
                            vec![
                                r.id.to_string(),
                                r.period_start.to_string(),
                                r.period_end.to_string(),
                                r.pay_date.to_string(),
                                r.status.to_string(),
                            ]
                        })
                        .collect();
                    println!(
                        "{}",
                        pretty_table(&["ID", "Start", "End", "Pay date", "Status"], rows)
                    );
                }
            }
            Some(("show", s)) => {
                actor.require(HR_EXECUTIVES)?;
                print_record(s, &get_run(conn, req_id(s, "id")?)?)?;
            }
            Some(("publish", s)) => {
                actor.require(HR_EXECUTIVES)?;
                let id = req_id(s, "id")?;
                let n = publish(conn, actor, id, default_currency)?;
                println!("Published payroll run {} ({} payslips created)", id, n);
            }
            Some(("delete", s)) => {
                actor.require(HR_EXECUTIVES)?;
                let id = req_id(s, "id")?;
                delete_run(conn, actor, id)?;
                println!("Deleted payroll run {}", id);
            }
            _ => {}
        },
        Some(("generate", sub)) => {
            actor.require(HR_EXECUTIVES)?;
            let employee_id = id_for_employee(conn, &req_str(sub, "employee")?)?;
            actor.scope().ensure_visible(conn, employee_id, "Employee")?;
            let input = PayslipInput {
                employee_id,
                run_id: req_id(sub, "run")?,
                currency: opt_str(sub, "currency"),
                basic: amount(sub, "basic")?,
                hra: amount(sub, "hra")?,
                conveyance: amount(sub, "conveyance")?,
                medical: amount(sub, "medical")?,
                bonus: amount(sub, "bonus")?,
                other_earnings: amount(sub, "other")?,
                leave_deduction: amount(sub, "leave-deduction")?,
                professional_tax: amount(sub, "professional-tax")?,
                other_deductions: amount(sub, "other-deductions")?,
                include_charges: sub.get_flag("include-charges"),
            };
            let p = generate_payslip(conn, actor, input, default_currency)?;
            println!("Generated payslip {}", p.id);
            print_lines(&p);
        }
        Some(("payslips", sub)) => {
            let mut filter = PayslipFilter {
                run_id: opt_str(sub, "run")
                    .map(|r| {
                        r.parse::<i64>()
                            .map_err(|_| HrError::validation(format!("Invalid id '{}'", r)))
                    })
                    .transpose()?,
                ..Default::default()
            };
            if actor.role == Role::Employee {
                filter.employee_id = Some(actor.own_employee()?);
            } else {
                actor.require(&[Role::Admin, Role::Hr, Role::Manager, Role::Md, Role::Cao])?;
                if let Some(code) = opt_str(sub, "employee") {
                    filter.employee_id = Some(id_for_employee(conn, &code)?);
                }
            }
            print_payslips(sub, &list_payslips(conn, &actor.scope(), &filter)?)?;
        }
        Some(("payslip", sub)) => {
            let p = get_payslip(conn, actor, req_id(sub, "id")?)?;
            let (json_flag, jsonl_flag) = json_flags(sub);
            if !maybe_print_json(json_flag, jsonl_flag, &p)? {
                print_lines(&p);
            }
        }
        Some(("my", sub)) => {
            let filter = PayslipFilter {
                employee_id: Some(actor.own_employee()?),
                ..Default::default()
            };
            print_payslips(sub, &list_payslips(conn, &Scope::unrestricted(), &filter)?)?;
        }
        Some(("my-current", sub)) => {
            let p = current_payslip(conn, actor.own_employee()?, Utc::now().date_naive())?;
            let (json_flag, jsonl_flag) = json_flags(sub);
            if !maybe_print_json(json_flag, jsonl_flag, &p)? {
                print_lines(&p);
            }
        }
        Some(("delete-payslip", sub)) => {
            actor.require(HR_EXECUTIVES)?;
            let id = req_id(sub, "id")?;
            delete_payslip(conn, actor, id)?;
            println!("Deleted payslip {}", id);
        }
        _ => {}
    }
    Ok(())
}
