// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::actor::Actor;
use crate::error::Result;
use crate::models::HR_EXECUTIVES;
use crate::utils::{dec, json_flags, maybe_print_json, pretty_table};
use crate::visibility::Scope;
use rusqlite::Connection;
use serde::Serialize;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Issue {
    pub kind: &'static str,
    pub detail: String,
}

/// Consistency checks over the stored ledger, payslips and runs. Ledger rows
/// and payslips outside `scope` are not inspected.
pub fn diagnose(conn: &Connection, scope: &Scope) -> Result<Vec<Issue>> {
    let mut issues = Vec::new();

    // 1) Ledger rows whose closing drifted from opening + accrued + adjusted - used
    let mut stmt = conn.prepare(&format!(
        "SELECT b.id, e.person_no, p.name, b.period, b.opening, b.accrued, b.adjusted, b.used, b.closing
         FROM leave_balances b
         JOIN employees e ON e.id = b.employee_id
         JOIN leave_policies p ON p.id = b.policy_id
         WHERE {}
         ORDER BY b.period, e.person_no",
        scope.employee_filter("b.employee_id")
    ))?;
    let mut cur = stmt.query([])?;
    while let Some(r) = cur.next()? {
        let expected = dec(r, 4)? + dec(r, 5)? + dec(r, 6)? - dec(r, 7)?;
        let closing = dec(r, 8)?;
        if closing != expected {
            issues.push(Issue {
                kind: "ledger_closing_mismatch",
                detail: format!(
                    "balance {} ({} / {} / {}): closing {} expected {}",
                    r.get::<_, i64>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, String>(2)?,
                    r.get::<_, String>(3)?,
                    closing,
                    expected
                ),
            });
        }
    }

    // 2) Payslips whose net is not gross - deductions
    let mut stmt2 = conn.prepare(&format!(
        "SELECT s.id, s.gross, s.deductions, s.net FROM payslips s WHERE {} ORDER BY s.id",
        scope.employee_filter("s.employee_id")
    ))?;
    let mut cur2 = stmt2.query([])?;
    while let Some(r) = cur2.next()? {
        let (gross, deductions, net) = (dec(r, 1)?, dec(r, 2)?, dec(r, 3)?);
        if net != gross - deductions {
            issues.push(Issue {
                kind: "payslip_net_mismatch",
                detail: format!(
                    "payslip {}: net {} but gross {} - deductions {}",
                    r.get::<_, i64>(0)?,
                    net,
                    gross,
                    deductions
                ),
            });
        }
    }

    // 3) Overlapping payroll runs
    let mut stmt3 = conn.prepare(
        "SELECT a.id, b.id, a.period_start, a.period_end, b.period_start, b.period_end
         FROM payroll_runs a JOIN payroll_runs b ON a.id < b.id
         WHERE a.period_start <= b.period_end AND b.period_start <= a.period_end
         ORDER BY a.id, b.id",
    )?;
    let mut cur3 = stmt3.query([])?;
    while let Some(r) = cur3.next()? {
        issues.push(Issue {
            kind: "overlapping_runs",
            detail: format!(
                "run {} ({}..{}) overlaps run {} ({}..{})",
                r.get::<_, i64>(0)?,
                r.get::<_, String>(2)?,
                r.get::<_, String>(3)?,
                r.get::<_, i64>(1)?,
                r.get::<_, String>(4)?,
                r.get::<_, String>(5)?
            ),
        });
    }

    Ok(issues)
}

pub fn handle(conn: &Connection, actor: &Actor, m: &clap::ArgMatches) -> anyhow::Result<()> {
    actor.require(HR_EXECUTIVES)?;
    let issues = diagnose(conn, &actor.scope())?;
    let (json_flag, jsonl_flag) = json_flags(m);
    if maybe_print_json(json_flag, jsonl_flag, &issues)? {
        return Ok(());
    }
    if issues.is_empty() {
        println!("doctor: no issues found");
    } else {
        let rows = issues
            .into_iter()
            .map(|i| vec![i.kind.to_string(), i.detail])
            .collect();
        println!("{}", pretty_table(&["Issue", "Detail"], rows));
    }
    Ok(())
}
