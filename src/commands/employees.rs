// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::actor::Actor;
use crate::commands::audit::{self, AuditEntry};
use crate::commands::users::find_user;
use crate::db::unit_of_work;
use crate::error::{HrError, Result};
use crate::models::{Compensation, Employee, HR_ADMINS, Role};
use crate::utils::{
    dec, fmt_money, id_for_employee, json_flags, maybe_print_json, opt_date, opt_str,
    parse_decimal, pretty_table, print_record, req_str,
};
use crate::visibility::Scope;
use chrono::{NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::{Connection, OptionalExtension, Row, params};
use rust_decimal::Decimal;

static CODE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^EMP(\d{4,})$").unwrap());

const CODE_LIMIT: u32 = 9999;

/// A code number is usable when its 4-digit form has no `8` and its digits
/// do not sum to 8.
pub fn code_allowed(n: u32) -> bool {
    let s = format!("{:04}", n);
    !s.contains('8') && s.chars().filter_map(|c| c.to_digit(10)).sum::<u32>() != 8
}

pub fn next_employee_code(conn: &Connection) -> Result<String> {
    let mut stmt = conn.prepare("SELECT person_no FROM employees")?;
    let codes = stmt.query_map([], |r| r.get::<_, String>(0))?;
    let mut highest = 0u32;
    for code in codes {
        let code = code?;
        if let Some(n) = CODE_RE
            .captures(code.trim())
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<u32>().ok())
        {
            highest = highest.max(n);
        }
    }
    let first = highest
        .checked_add(1)
        .ok_or_else(|| HrError::validation("Employee code space exhausted"))?;
    (first..=CODE_LIMIT)
        .find(|n| code_allowed(*n))
        .map(|n| format!("EMP{:04}", n))
        .ok_or_else(|| HrError::validation("Employee code space exhausted"))
}

#[derive(Debug, Clone, Default)]
pub struct NewEmployee {
    pub first_name: String,
    pub last_name: String,
    pub work_email: String,
    pub department: Option<String>,
    pub designation: Option<String>,
    pub location: Option<String>,
    pub status: Option<String>,
    pub hire_date: Option<NaiveDate>,
    pub birthdate: Option<NaiveDate>,
    pub manager_id: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct EmployeeUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub department: Option<String>,
    pub designation: Option<String>,
    pub location: Option<String>,
    pub birthdate: Option<NaiveDate>,
    pub manager_id: Option<i64>,
}

const SELECT_EMPLOYEE: &str = "SELECT e.id, e.person_no, e.first_name, e.last_name, e.work_email, e.department,
        e.designation, e.location, e.status, e.hire_date, e.birthdate, e.termination_date, e.manager_id, e.user_id
        FROM employees e";

pub(crate) fn employee_from_row(r: &Row<'_>) -> rusqlite::Result<Employee> {
    Ok(Employee {
        id: r.get(0)?,
        person_no: r.get(1)?,
        first_name: r.get(2)?,
        last_name: r.get(3)?,
        work_email: r.get(4)?,
        department: r.get(5)?,
        designation: r.get(6)?,
        location: r.get(7)?,
        status: r.get(8)?,
        hire_date: r.get(9)?,
        birthdate: r.get(10)?,
        termination_date: r.get(11)?,
        manager_id: r.get(12)?,
        user_id: r.get(13)?,
    })
}

/// Unscoped lookup for internal checks.
pub fn find_employee(conn: &Connection, id: i64) -> Result<Option<Employee>> {
    let sql = format!("{} WHERE e.id = ?1", SELECT_EMPLOYEE);
    Ok(conn
        .query_row(&sql, params![id], employee_from_row)
        .optional()?)
}

pub fn get_employee(conn: &Connection, scope: &Scope, id: i64) -> Result<Employee> {
    let sql = format!(
        "{} WHERE e.id = ?1 AND {}",
        SELECT_EMPLOYEE,
        scope.employee_filter("e.id")
    );
    conn.query_row(&sql, params![id], employee_from_row)
        .optional()?
        .ok_or_else(|| HrError::not_found("Employee not found"))
}

pub fn list_employees(conn: &Connection, scope: &Scope) -> Result<Vec<Employee>> {
    let sql = format!(
        "{} WHERE {} ORDER BY e.person_no",
        SELECT_EMPLOYEE,
        scope.employee_filter("e.id")
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], employee_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Insert one employee inside the caller's transaction and return its id.
/// Links the existing user for the work email or creates an EMPLOYEE user.
pub(crate) fn insert_employee(conn: &Connection, new: &NewEmployee, today: NaiveDate) -> Result<i64> {
    let first = new.first_name.trim();
    let last = new.last_name.trim();
    let email = new.work_email.trim().to_lowercase();
    if first.is_empty() || last.is_empty() {
        return Err(HrError::validation("First and last name are required"));
    }
    if !email.contains('@') {
        return Err(HrError::validation(format!("Invalid work email '{}'", email)));
    }
    let taken: i64 = conn.query_row(
        "SELECT COUNT(*) FROM employees WHERE work_email = ?1 COLLATE NOCASE",
        params![&email],
        |r| r.get(0),
    )?;
    if taken > 0 {
        return Err(HrError::duplicate(format!(
            "An employee with work email '{}' already exists",
            email
        )));
    }
    let user_id = match find_user(conn, &email)? {
        Some(u) => u.id,
        None => {
            conn.execute(
                "INSERT INTO users(email, role) VALUES (?1, ?2)",
                params![&email, Role::Employee],
            )?;
            conn.last_insert_rowid()
        }
    };
    let code = next_employee_code(conn)?;
    conn.execute(
        "INSERT INTO employees(person_no, first_name, last_name, work_email, department, designation,
                               location, status, hire_date, birthdate, manager_id, user_id)
         VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12)",
        params![
            code,
            first,
            last,
            &email,
            new.department,
            new.designation,
            new.location,
            new.status.as_deref().unwrap_or("Active"),
            new.hire_date.unwrap_or(today),
            new.birthdate,
            new.manager_id,
            user_id,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Creates the employee and links (or creates) an EMPLOYEE user for the work email.
pub fn create_employee(
    conn: &Connection,
    actor: &Actor,
    new: NewEmployee,
    today: NaiveDate,
) -> Result<Employee> {
    let id = unit_of_work(conn, |tx| insert_employee(tx, &new, today))?;

    let emp = find_employee(conn, id)?.ok_or_else(|| HrError::not_found("Employee not found"))?;
    log::info!("employee {} created ({})", emp.person_no, emp.full_name());
    audit::record(
        conn,
        actor,
        AuditEntry::new("EMPLOYEE", "CREATE", "Employee", emp.id)
            .employee(emp.id)
            .new_data(serde_json::to_value(&emp)?)
            .changes(format!("Created employee {}", emp.person_no)),
    );
    Ok(emp)
}

/// ADMIN/HR or the employee themself.
pub fn update_employee(
    conn: &Connection,
    actor: &Actor,
    id: i64,
    upd: EmployeeUpdate,
) -> Result<Employee> {
    let before = get_employee(conn, &actor.scope(), id)?;
    let is_owner = actor.employee_id == Some(id)
        || (actor.user_id.is_some() && actor.user_id == before.user_id);
    if !actor.has_role(HR_ADMINS) && !is_owner {
        return Err(HrError::forbidden("Not authorized to update this profile"));
    }
    conn.execute(
        "UPDATE employees SET
            first_name = COALESCE(?1, first_name),
            last_name = COALESCE(?2, last_name),
            department = COALESCE(?3, department),
            designation = COALESCE(?4, designation),
            location = COALESCE(?5, location),
            birthdate = COALESCE(?6, birthdate),
            manager_id = COALESCE(?7, manager_id)
         WHERE id = ?8",
        params![
            upd.first_name,
            upd.last_name,
            upd.department,
            upd.designation,
            upd.location,
            upd.birthdate,
            upd.manager_id,
            id
        ],
    )?;
    let after = get_employee(conn, &actor.scope(), id)?;
    audit::record(
        conn,
        actor,
        AuditEntry::new("EMPLOYEE", "UPDATE", "Employee", id)
            .employee(id)
            .old(serde_json::to_value(&before)?)
            .new_data(serde_json::to_value(&after)?)
            .diffed(),
    );
    Ok(after)
}

pub fn set_status(
    conn: &Connection,
    actor: &Actor,
    id: i64,
    status: &str,
    termination_date: Option<NaiveDate>,
) -> Result<Employee> {
    let status = status.trim();
    if status.is_empty() {
        return Err(HrError::validation("Status must not be empty"));
    }
    let before = get_employee(conn, &actor.scope(), id)?;
    conn.execute(
        "UPDATE employees SET status = ?1, termination_date = COALESCE(?2, termination_date) WHERE id = ?3",
        params![status, termination_date, id],
    )?;
    let after = get_employee(conn, &actor.scope(), id)?;
    log::info!("employee {} status {} -> {}", after.person_no, before.status, after.status);
    audit::record(
        conn,
        actor,
        AuditEntry::new("EMPLOYEE", "UPDATE", "Employee", id)
            .employee(id)
            .old(serde_json::to_value(&before)?)
            .new_data(serde_json::to_value(&after)?)
            .diffed(),
    );
    Ok(after)
}

pub fn set_compensation(
    conn: &Connection,
    employee_id: i64,
    base_salary: Decimal,
    currency: &str,
) -> Result<Compensation> {
    if base_salary < Decimal::ZERO {
        return Err(HrError::validation("Base salary must not be negative"));
    }
    if find_employee(conn, employee_id)?.is_none() {
        return Err(HrError::not_found("Employee not found"));
    }
    let currency = currency.trim().to_uppercase();
    conn.execute(
        "INSERT INTO compensations(employee_id, base_salary, currency) VALUES (?1,?2,?3)
         ON CONFLICT(employee_id) DO UPDATE SET base_salary=excluded.base_salary, currency=excluded.currency",
        params![employee_id, base_salary.to_string(), &currency],
    )?;
    Ok(Compensation {
        employee_id,
        base_salary,
        currency,
    })
}

pub fn get_compensation(conn: &Connection, employee_id: i64) -> Result<Option<Compensation>> {
    Ok(conn
        .query_row(
            "SELECT employee_id, base_salary, currency FROM compensations WHERE employee_id = ?1",
            params![employee_id],
            |r| {
                Ok(Compensation {
                    employee_id: r.get(0)?,
                    base_salary: dec(r, 1)?,
                    currency: r.get(2)?,
                })
            },
        )
        .optional()?)
}

pub fn remove_employee(conn: &Connection, actor: &Actor, id: i64) -> Result<()> {
    let emp = get_employee(conn, &actor.scope(), id)?;
    conn.execute("DELETE FROM employees WHERE id = ?1", params![id])?;
    log::info!("employee {} removed", emp.person_no);
    audit::record(
        conn,
        actor,
        AuditEntry::new("EMPLOYEE", "DELETE", "Employee", id)
            .old(serde_json::to_value(&emp)?)
            .changes(format!("Deleted employee {}", emp.person_no)),
    );
    Ok(())
}

pub fn handle(
    conn: &Connection,
    actor: &Actor,
    currency: &str,
    m: &clap::ArgMatches,
) -> anyhow::Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => {
            actor.require(HR_ADMINS)?;
            let manager_id = opt_str(sub, "manager")
                .map(|c| id_for_employee(conn, &c))
                .transpose()?;
            let new = NewEmployee {
                first_name: req_str(sub, "first")?,
                last_name: req_str(sub, "last")?,
                work_email: req_str(sub, "email")?,
                department: opt_str(sub, "department"),
                designation: opt_str(sub, "designation"),
                location: opt_str(sub, "location"),
                status: opt_str(sub, "status"),
                hire_date: opt_date(sub, "hire-date")?,
                birthdate: opt_date(sub, "birthdate")?,
                manager_id,
            };
            let emp = create_employee(conn, actor, new, Utc::now().date_naive())?;
            println!("Created {} {} <{}>", emp.person_no, emp.full_name(), emp.work_email);
        }
        Some(("list", sub)) => {
            let emps = list_employees(conn, &actor.scope())?;
            let (json_flag, jsonl_flag) = json_flags(sub);
            if !maybe_print_json(json_flag, jsonl_flag, &emps)? {
                let rows = emps
                    .iter()
                    .map(|e| {
                        vec![
                            e.person_no.clone(),
                            e.full_name(),
                            e.work_email.clone(),
                            e.department.clone().unwrap_or_default(),
                            e.status.clone(),
                            e.hire_date.to_string(),
                        ]
                    })
                    .collect();
                println!(
                    "{}",
                    pretty_table(&["Code", "Name", "Email", "Department", "Status", "Hired"], rows)
                );
            }
        }
        Some(("show", sub)) => {
            let id = id_for_employee(conn, &req_str(sub, "code")?)?;
            let emp = get_employee(conn, &actor.scope(), id)?;
            print_record(sub, &emp)?;
            if let Some(c) = get_compensation(conn, id)? {
                println!("Base salary: {}", fmt_money(&c.base_salary, &c.currency));
            }
        }
        Some(("me", sub)) => {
            let emp = get_employee(conn, &actor.scope(), actor.own_employee()?)?;
            print_record(sub, &emp)?;
        }
        Some(("update", sub)) => {
            let id = id_for_employee(conn, &req_str(sub, "code")?)?;
            let manager_id = opt_str(sub, "manager")
                .map(|c| id_for_employee(conn, &c))
                .transpose()?;
            let upd = EmployeeUpdate {
                first_name: opt_str(sub, "first"),
                last_name: opt_str(sub, "last"),
                department: opt_str(sub, "department"),
                designation: opt_str(sub, "designation"),
                location: opt_str(sub, "location"),
                birthdate: opt_date(sub, "birthdate")?,
                manager_id,
            };
            let emp = update_employee(conn, actor, id, upd)?;
            println!("Updated {}", emp.person_no);
        }
        Some(("status", sub)) => {
            actor.require(HR_ADMINS)?;
            let id = id_for_employee(conn, &req_str(sub, "code")?)?;
            let emp = set_status(
                conn,
                actor,
                id,
                &req_str(sub, "status")?,
                opt_date(sub, "termination-date")?,
            )?;
            println!("{} is now {}", emp.person_no, emp.status);
        }
        Some(("compensation", sub)) => {
            actor.require(HR_ADMINS)?;
            let id = id_for_employee(conn, &req_str(sub, "code")?)?;
            actor.scope().ensure_visible(conn, id, "Employee")?;
            let salary = parse_decimal(&req_str(sub, "salary")?)?;
            let ccy = opt_str(sub, "currency").unwrap_or_else(|| currency.to_string());
            let c = set_compensation(conn, id, salary, &ccy)?;
            println!("Base salary set to {}", fmt_money(&c.base_salary, &c.currency));
        }
        Some(("remove", sub)) => {
            actor.require(HR_ADMINS)?;
            let code = req_str(sub, "code")?;
            let id = id_for_employee(conn, &code)?;
            remove_employee(conn, actor, id)?;
            println!("Removed {}", code);
        }
        _ => {}
    }
    Ok(())
}
