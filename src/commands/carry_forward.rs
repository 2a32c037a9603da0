// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::commands::ledger::roll_unused_forward;
use crate::db::unit_of_work;
use crate::error::Result;
use crate::models::Period;
use crate::utils::dec;
use rusqlite::{Connection, params};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CarryForwardReport {
    pub rolled: usize,
    pub skipped_ecash: usize,
    pub skipped_zero: usize,
}

/// Whether the employee cashed out leave through an insurance e-cash claim.
pub fn has_ecash_claim(conn: &Connection, employee_id: i64) -> Result<bool> {
    let mut stmt =
        conn.prepare("SELECT e_cash_amount FROM insurances WHERE employee_id = ?1")?;
    let amounts = stmt.query_map(params![employee_id], |r| dec(r, 0))?;
    for a in amounts {
        if a? > Decimal::ZERO {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Roll every positive `period` closing balance of a carry-forward policy into
/// the next month's opening. Only active employees are considered; probation
/// is a separate status and never rolls. In December, employees holding an
/// e-cash claim are skipped.
///
/// Additive: running twice for the same period credits the next month twice.
pub fn carry_forward(conn: &Connection, period: Period) -> Result<CarryForwardReport> {
    let target = period.next();
    let report = unit_of_work(conn, |tx| {
        let mut stmt = tx.prepare(
            "SELECT b.employee_id, b.policy_id, b.closing
             FROM leave_balances b
             JOIN leave_policies p ON p.id = b.policy_id
             JOIN employees e ON e.id = b.employee_id
             WHERE b.period = ?1 AND p.carry_forward = 1 AND lower(trim(e.status)) = 'active'
             ORDER BY b.employee_id, b.policy_id",
        )?;
        let rows = stmt
            .query_map(params![period], |r| {
                Ok((r.get::<_, i64>(0)?, r.get::<_, i64>(1)?, dec(r, 2)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut report = CarryForwardReport::default();
        let mut ecash: HashMap<i64, bool> = HashMap::new();
        for (employee_id, policy_id, closing) in rows {
            if closing <= Decimal::ZERO {
                report.skipped_zero += 1;
                continue;
            }
            if period.is_december() {
                let claimed = match ecash.get(&employee_id) {
                    Some(v) => *v,
                    None => {
                        let v = has_ecash_claim(tx, employee_id)?;
                        ecash.insert(employee_id, v);
                        v
                    }
                };
                if claimed {
                    log::debug!(
                        "employee {} claimed e-cash; not carrying policy {}",
                        employee_id,
                        policy_id
                    );
                    report.skipped_ecash += 1;
                    continue;
                }
            }
            roll_unused_forward(tx, employee_id, policy_id, closing, target)?;
            report.rolled += 1;
        }
        Ok(report)
    })?;
    log::info!(
        "carry-forward {} -> {}: rolled {}, skipped e-cash {}, skipped zero {}",
        period,
        target,
        report.rolled,
        report.skipped_ecash,
        report.skipped_zero
    );
    Ok(report)
}
