// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::actor::Actor;
use crate::error::Result;
use crate::models::{AuditLog, AuditStatus, HR_EXECUTIVES};
use crate::utils::{json_flags, maybe_print_json, opt_date, opt_str, pretty_table};
use crate::visibility::Scope;
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, Row, params, params_from_iter};
use serde_json::Value;
use std::collections::BTreeSet;

pub const DEFAULT_LIMIT: usize = 100;

#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub module: &'static str,
    pub action: &'static str,
    pub entity_type: &'static str,
    pub entity_id: String,
    pub employee_id: Option<i64>,
    pub old_data: Option<Value>,
    pub new_data: Option<Value>,
    pub changes: Option<String>,
    pub status: AuditStatus,
    pub error_message: Option<String>,
}

impl AuditEntry {
    pub fn new(
        module: &'static str,
        action: &'static str,
        entity_type: &'static str,
        entity_id: impl ToString,
    ) -> Self {
        AuditEntry {
            module,
            action,
            entity_type,
            entity_id: entity_id.to_string(),
            employee_id: None,
            old_data: None,
            new_data: None,
            changes: None,
            status: AuditStatus::Success,
            error_message: None,
        }
    }

    pub fn employee(mut self, id: i64) -> Self {
        self.employee_id = Some(id);
        self
    }

    pub fn old(mut self, v: Value) -> Self {
        self.old_data = Some(v);
        self
    }

    pub fn new_data(mut self, v: Value) -> Self {
        self.new_data = Some(v);
        self
    }

    pub fn changes(mut self, text: impl Into<String>) -> Self {
        self.changes = Some(text.into());
        self
    }

    /// Fill `changes` from the old/new snapshots.
    pub fn diffed(mut self) -> Self {
        self.changes = Some(describe_changes(
            self.old_data.as_ref(),
            self.new_data.as_ref(),
        ));
        self
    }
}

/// `key: old → new` for every top-level key whose value differs.
pub fn describe_changes(old: Option<&Value>, new: Option<&Value>) -> String {
    let (Some(Value::Object(old)), Some(Value::Object(new))) = (old, new) else {
        return "Data updated".to_string();
    };
    let keys: BTreeSet<&String> = old.keys().chain(new.keys()).collect();
    let parts: Vec<String> = keys
        .into_iter()
        .filter_map(|k| {
            let a = old.get(k).unwrap_or(&Value::Null);
            let b = new.get(k).unwrap_or(&Value::Null);
            (a != b).then(|| format!("{}: {} → {}", k, display(a), display(b)))
        })
        .collect();
    if parts.is_empty() {
        "Data updated".to_string()
    } else {
        parts.join(", ")
    }
}

fn display(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Append an entry. Failures are logged and swallowed.
pub fn record(conn: &Connection, actor: &Actor, entry: AuditEntry) {
    let res = (|| -> Result<()> {
        let old = entry.old_data.as_ref().map(serde_json::to_string).transpose()?;
        let new = entry.new_data.as_ref().map(serde_json::to_string).transpose()?;
        conn.execute(
            "INSERT INTO audit_logs(module, action, entity_type, entity_id, employee_id, actor_id, actor_role,
                                    old_data, new_data, changes, status, error_message)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12)",
            params![
                entry.module,
                entry.action,
                entry.entity_type,
                &entry.entity_id,
                entry.employee_id,
                actor.user_id,
                actor.role.as_str(),
                old,
                new,
                &entry.changes,
                entry.status,
                &entry.error_message,
            ],
        )?;
        Ok(())
    })();
    if let Err(e) = res {
        log::warn!(
            "audit log write failed for {} {} {}: {}",
            entry.module,
            entry.action,
            entry.entity_id,
            e
        );
    }
}

#[derive(Debug, Clone, Default)]
pub struct AuditQuery {
    pub module: Option<String>,
    pub action: Option<String>,
    pub entity_type: Option<String>,
    pub employee_id: Option<i64>,
    pub from: Option<chrono::NaiveDate>,
    pub to: Option<chrono::NaiveDate>,
    pub limit: Option<usize>,
    pub skip: Option<usize>,
}

const SELECT_AUDIT: &str = "SELECT id, module, action, entity_type, entity_id, employee_id, actor_id, actor_role,
        old_data, new_data, changes, status, error_message, created_at FROM audit_logs";

fn audit_from_row(r: &Row<'_>) -> rusqlite::Result<AuditLog> {
    let parse = |idx: usize, s: Option<String>| -> rusqlite::Result<Option<Value>> {
        s.map(|s| {
            serde_json::from_str(&s).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    idx,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })
        })
        .transpose()
    };
    Ok(AuditLog {
        id: r.get(0)?,
        module: r.get(1)?,
        action: r.get(2)?,
        entity_type: r.get(3)?,
        entity_id: r.get(4)?,
        employee_id: r.get(5)?,
        actor_id: r.get(6)?,
        actor_role: r.get(7)?,
        old_data: parse(8, r.get(8)?)?,
        new_data: parse(9, r.get(9)?)?,
        changes: r.get(10)?,
        status: r.get(11)?,
        error_message: r.get(12)?,
        created_at: r.get(13)?,
    })
}

/// Entries about a masked employee are left out; entries with no employee stay.
fn visible_to(scope: &Scope) -> String {
    format!("(employee_id IS NULL OR {})", scope.employee_filter("employee_id"))
}

/// Newest first.
pub fn query(conn: &Connection, scope: &Scope, q: &AuditQuery) -> Result<Vec<AuditLog>> {
    let visible = visible_to(scope);
    let mut clauses: Vec<&str> = vec![visible.as_str()];
    let mut args: Vec<SqlValue> = Vec::new();
    if let Some(m) = &q.module {
        clauses.push("module = ?");
        args.push(SqlValue::Text(m.to_uppercase()));
    }
    if let Some(a) = &q.action {
        clauses.push("action = ?");
        args.push(SqlValue::Text(a.to_uppercase()));
    }
    if let Some(t) = &q.entity_type {
        clauses.push("entity_type = ?");
        args.push(SqlValue::Text(t.clone()));
    }
    if let Some(e) = q.employee_id {
        clauses.push("employee_id = ?");
        args.push(SqlValue::Integer(e));
    }
    if let Some(d) = q.from {
        clauses.push("substr(created_at, 1, 10) >= ?");
        args.push(SqlValue::Text(d.to_string()));
    }
    if let Some(d) = q.to {
        clauses.push("substr(created_at, 1, 10) <= ?");
        args.push(SqlValue::Text(d.to_string()));
    }
    let mut sql = SELECT_AUDIT.to_string();
    sql.push_str(" WHERE ");
    sql.push_str(&clauses.join(" AND "));
    sql.push_str(" ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?");
    args.push(SqlValue::Integer(q.limit.unwrap_or(DEFAULT_LIMIT) as i64));
    args.push(SqlValue::Integer(q.skip.unwrap_or(0) as i64));

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(args), audit_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Oldest first.
pub fn entity_trail(conn: &Connection, scope: &Scope, entity_id: &str) -> Result<Vec<AuditLog>> {
    let sql = format!(
        "{} WHERE entity_id = ?1 AND {} ORDER BY created_at ASC, id ASC",
        SELECT_AUDIT,
        visible_to(scope)
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![entity_id.trim()], audit_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub fn handle(conn: &Connection, actor: &Actor, m: &clap::ArgMatches) -> anyhow::Result<()> {
    actor.require(HR_EXECUTIVES)?;
    match m.subcommand() {
        Some(("list", sub)) => {
            let employee_id = opt_str(sub, "employee")
                .map(|code| crate::utils::id_for_employee(conn, &code))
                .transpose()?;
            let q = AuditQuery {
                module: opt_str(sub, "module"),
                action: opt_str(sub, "action"),
                entity_type: opt_str(sub, "entity-type"),
                employee_id,
                from: opt_date(sub, "from")?,
                to: opt_date(sub, "to")?,
                limit: sub.get_one::<usize>("limit").copied(),
                skip: sub.get_one::<usize>("skip").copied(),
            };
            print_logs(sub, &query(conn, &actor.scope(), &q)?)?;
        }
        Some(("trail", sub)) => {
            let entity = sub.get_one::<String>("entity").map(|s| s.trim()).unwrap_or("");
            print_logs(sub, &entity_trail(conn, &actor.scope(), entity)?)?;
        }
        _ => {}
    }
    Ok(())
}

fn print_logs(sub: &clap::ArgMatches, logs: &[AuditLog]) -> anyhow::Result<()> {
    let (json_flag, jsonl_flag) = json_flags(sub);
    if maybe_print_json(json_flag, jsonl_flag, &logs)? {
        return Ok(());
    }
    let rows = logs
        .iter()
        .map(|l| {
            vec![
                l.created_at.clone(),
                l.module.clone(),
                l.action.clone(),
                format!("{} {}", l.entity_type, l.entity_id),
                l.actor_role.clone().unwrap_or_default(),
                l.status.to_string(),
                l.changes.clone().unwrap_or_default(),
            ]
        })
        .collect();
    println!(
        "{}",
        pretty_table(
            &["When", "Module", "Action", "Entity", "Actor", "Status", "Changes"],
            rows
        )
    );
    Ok(())
}
