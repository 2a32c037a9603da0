// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::actor::Actor;
use crate::commands::payroll::{PayslipFilter, get_run, list_payslips};
use crate::models::HR_EXECUTIVES;
use crate::utils::{req_id, req_str};
use crate::visibility::Scope;
use anyhow::{Result, bail};
use rusqlite::Connection;
use serde_json::json;
use std::path::Path;

pub fn handle(conn: &Connection, actor: &Actor, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("payslips", sub)) => {
            actor.require(HR_EXECUTIVES)?;
            let run_id = req_id(sub, "run")?;
            let fmt = req_str(sub, "format")?;
            let out = req_str(sub, "out")?;
            let n = export_payslips(conn, &actor.scope(), run_id, &fmt, Path::new(&out))?;
            println!("Exported {} payslips of run {} to {}", n, run_id, out);
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Write the visible payslips of one run to `out` as `csv` or `json`.
/// Returns the number of payslips written.
pub fn export_payslips(
    conn: &Connection,
    scope: &Scope,
    run_id: i64,
    format: &str,
    out: &Path,
) -> Result<usize> {
    let run = get_run(conn, run_id)?;
    let slips = list_payslips(
        conn,
        scope,
        &PayslipFilter {
            run_id: Some(run.id),
            employee_id: None,
        },
    )?;

    match format.to_lowercase().as_str() {
        "csv" => {
            let mut wtr = csv::Writer::from_path(out)?;
            wtr.write_record([
                "employee_code",
                "employee_name",
                "period_start",
                "period_end",
                "currency",
                "basic",
                "hra",
                "conveyance",
                "medical",
                "bonus",
                "other_earnings",
                "leave_deduction",
                "professional_tax",
                "other_deductions",
                "gross",
                "deductions",
                "net",
            ])?;
            for v in &slips {
                let p = &v.payslip;
                wtr.write_record([
                    v.employee_code.clone(),
                    v.employee_name.clone(),
                    v.period_start.to_string(),
                    v.period_end.to_string(),
                    p.currency.clone(),
                    p.basic.to_string(),
                    p.hra.to_string(),
                    p.conveyance.to_string(),
                    p.medical.to_string(),
                    p.bonus.to_string(),
                    p.other_earnings.to_string(),
                    p.leave_deduction.to_string(),
                    p.professional_tax.to_string(),
                    p.other_deductions.to_string(),
                    p.gross.to_string(),
                    p.deductions.to_string(),
                    p.net.to_string(),
                ])?;
            }
            wtr.flush()?;
        }
        "json" => {
            let doc = json!({
                "run": run,
                "payslips": slips,
            });
            std::fs::write(out, serde_json::to_string_pretty(&doc)?)?;
        }
        other => bail!("Unknown format: {} (use csv|json)", other),
    }
    log::info!("exported {} payslips of run {}", slips.len(), run_id);
    Ok(slips.len())
}
