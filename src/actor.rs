// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! The user a command runs as.

use crate::error::{HrError, Result};
use crate::models::Role;
use crate::visibility::Scope;
use rusqlite::{Connection, OptionalExtension, params};

#[derive(Debug, Clone)]
pub struct Actor {
    pub user_id: Option<i64>,
    pub email: String,
    pub role: Role,
    pub employee_id: Option<i64>,
}

impl Actor {
    /// Local operator: ADMIN with no user row. Used when `--user` is omitted
    /// and for startup jobs.
    pub fn system() -> Self {
        Actor {
            user_id: None,
            email: "system".to_string(),
            role: Role::Admin,
            employee_id: None,
        }
    }

    pub fn resolve(conn: &Connection, email: &str) -> Result<Self> {
        let email = email.trim();
        let row: Option<(i64, String, Role)> = conn
            .query_row(
                "SELECT id, email, role FROM users WHERE email = ?1 COLLATE NOCASE",
                params![email],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
            )
            .optional()?;
        let (user_id, email, role) =
            row.ok_or_else(|| HrError::forbidden(format!("Unknown user '{}'", email)))?;
        let employee_id: Option<i64> = conn
            .query_row(
                "SELECT id FROM employees WHERE user_id = ?1",
                params![user_id],
                |r| r.get(0),
            )
            .optional()?;
        log::debug!("acting as {} ({})", email, role);
        Ok(Actor {
            user_id: Some(user_id),
            email,
            role,
            employee_id,
        })
    }

    pub fn has_role(&self, roles: &[Role]) -> bool {
        roles.contains(&self.role)
    }

    pub fn require(&self, roles: &[Role]) -> Result<()> {
        if self.has_role(roles) {
            Ok(())
        } else {
            Err(HrError::forbidden(format!(
                "Role {} is not allowed to perform this action",
                self.role
            )))
        }
    }

    /// The employee record linked to this user.
    pub fn own_employee(&self) -> Result<i64> {
        self.employee_id
            .ok_or_else(|| HrError::forbidden("No employee record is linked to this user"))
    }

    pub fn scope(&self) -> Scope {
        Scope::for_role(self.role)
    }
}
