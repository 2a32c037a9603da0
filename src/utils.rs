// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::error::{HrError, Result};
use crate::models::Period;
use chrono::NaiveDate;
use comfy_table::{Cell, Table, presets::UTF8_FULL};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};
use rust_decimal::Decimal;

pub fn parse_date(s: &str) -> Result<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| HrError::validation(format!("Invalid date '{}', expected YYYY-MM-DD", s)))
}

pub fn parse_period(s: &str) -> Result<Period> {
    s.parse()
}

pub fn parse_decimal(s: &str) -> Result<Decimal> {
    let s = s.trim();
    s.parse::<Decimal>()
        .map_err(|_| HrError::validation(format!("Invalid decimal '{}'", s)))
}

/// Optional CLI argument helpers; values are trimmed like every other input.
pub fn opt_str(m: &clap::ArgMatches, id: &str) -> Option<String> {
    m.get_one::<String>(id)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub fn req_str(m: &clap::ArgMatches, id: &str) -> Result<String> {
    opt_str(m, id).ok_or_else(|| HrError::validation(format!("--{} is required", id)))
}

pub fn opt_decimal(m: &clap::ArgMatches, id: &str) -> Result<Option<Decimal>> {
    opt_str(m, id).map(|s| parse_decimal(&s)).transpose()
}

pub fn opt_date(m: &clap::ArgMatches, id: &str) -> Result<Option<NaiveDate>> {
    opt_str(m, id).map(|s| parse_date(&s)).transpose()
}

pub fn req_id(m: &clap::ArgMatches, id: &str) -> Result<i64> {
    let raw = req_str(m, id)?;
    raw.parse::<i64>()
        .map_err(|_| HrError::validation(format!("Invalid id '{}'", raw)))
}

/// Read a decimal stored as TEXT.
pub fn dec(r: &Row<'_>, idx: usize) -> rusqlite::Result<Decimal> {
    let s: String = r.get(idx)?;
    s.parse::<Decimal>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub fn opt_dec(r: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Decimal>> {
    let s: Option<String> = r.get(idx)?;
    s.map(|s| {
        s.parse::<Decimal>()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

pub fn fmt_money(d: &Decimal, ccy: &str) -> String {
    format!("{} {:.2}", ccy, d.round_dp(2))
}

pub fn pretty_table(headers: &[&str], rows: Vec<Vec<String>>) -> Table {
    let mut t = Table::new();
    t.load_preset(UTF8_FULL);
    t.set_header(headers.iter().map(|h| Cell::new(*h)));
    for r in rows {
        t.add_row(r.into_iter().map(Cell::new));
    }
    t
}

pub fn id_for_employee(conn: &Connection, code: &str) -> Result<i64> {
    let code = code.trim();
    conn.query_row(
        "SELECT id FROM employees WHERE person_no=?1 COLLATE NOCASE",
        params![code],
        |r| r.get(0),
    )
    .optional()?
    .ok_or_else(|| HrError::not_found(format!("Employee '{}' not found", code)))
}

pub fn id_for_policy(conn: &Connection, name: &str) -> Result<i64> {
    let name = name.trim();
    conn.query_row(
        "SELECT id FROM leave_policies WHERE name=?1",
        params![name],
        |r| r.get(0),
    )
    .optional()?
    .ok_or_else(|| HrError::not_found(format!("Leave policy '{}' not found", name)))
}

pub fn maybe_print_json<T: serde::Serialize>(
    json_flag: bool,
    jsonl_flag: bool,
    v: &T,
) -> anyhow::Result<bool> {
    if json_flag {
        println!("{}", serde_json::to_string_pretty(v)?);
        return Ok(true);
    }
    if jsonl_flag {
        // One line per array element.
        let val = serde_json::to_value(v)?;
        if let Some(arr) = val.as_array() {
            for item in arr {
                println!("{}", serde_json::to_string(item)?);
            }
        } else {
            println!("{}", serde_json::to_string(&val)?);
        }
        return Ok(true);
    }
    Ok(false)
}

/// `--json`/`--jsonl` aware output for a single record.
pub fn print_record<T: serde::Serialize>(m: &clap::ArgMatches, v: &T) -> anyhow::Result<()> {
    let json_flag = m.try_get_one::<bool>("json").ok().flatten().copied().unwrap_or(false);
    let jsonl_flag = m.try_get_one::<bool>("jsonl").ok().flatten().copied().unwrap_or(false);
    if !maybe_print_json(json_flag, jsonl_flag, v)? {
        println!("{}", serde_json::to_string_pretty(v)?);
    }
    Ok(())
}

pub fn json_flags(m: &clap::ArgMatches) -> (bool, bool) {
    (
        m.try_get_one::<bool>("json").ok().flatten().copied().unwrap_or(false),
        m.try_get_one::<bool>("jsonl").ok().flatten().copied().unwrap_or(false),
    )
}
