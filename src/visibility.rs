// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Executive masking. Records of employees whose linked user is MD or CAO
//! are only visible to MD and CAO viewers. Every scoped query takes a
//! [`Scope`] and splices [`Scope::employee_filter`] into its WHERE clause.

use crate::error::{HrError, Result};
use crate::models::Role;
use rusqlite::{Connection, params};

pub fn should_hide(viewer: Role) -> bool {
    !matches!(viewer, Role::Md | Role::Cao)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scope {
    hide_executives: bool,
}

impl Scope {
    pub fn for_role(viewer: Role) -> Self {
        Scope {
            hide_executives: should_hide(viewer),
        }
    }

    /// No masking. Used by batch jobs that must see every employee.
    pub fn unrestricted() -> Self {
        Scope {
            hide_executives: false,
        }
    }

    /// SQL predicate over `column`, an employee id expression.
    pub fn employee_filter(&self, column: &str) -> String {
        if self.hide_executives {
            format!(
                "{} NOT IN (SELECT xe.id FROM employees xe JOIN users xu ON xe.user_id = xu.id \
                 WHERE xu.role IN ('MD','CAO'))",
                column
            )
        } else {
            "1=1".to_string()
        }
    }

    pub fn can_see(&self, conn: &Connection, employee_id: i64) -> Result<bool> {
        if !self.hide_executives {
            return Ok(true);
        }
        let sql = format!(
            "SELECT COUNT(*) FROM employees WHERE id = ?1 AND {}",
            self.employee_filter("id")
        );
        let n: i64 = conn.query_row(&sql, params![employee_id], |r| r.get(0))?;
        Ok(n > 0)
    }

    /// Hidden records read as missing.
    pub fn ensure_visible(&self, conn: &Connection, employee_id: i64, what: &str) -> Result<()> {
        if self.can_see(conn, employee_id)? {
            Ok(())
        } else {
            Err(HrError::not_found(format!("{} not found", what)))
        }
    }
}
