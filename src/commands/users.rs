// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::actor::Actor;
use crate::error::{HrError, Result};
use crate::models::{HR_ADMINS, Role, User};
use crate::utils::{json_flags, maybe_print_json, pretty_table};
use rusqlite::{Connection, OptionalExtension, params};

pub fn add_user(conn: &Connection, email: &str, role: Role) -> Result<User> {
    let email = email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(HrError::validation(format!("Invalid email '{}'", email)));
    }
    if find_user(conn, &email)?.is_some() {
        return Err(HrError::duplicate(format!("User '{}' already exists", email)));
    }
    conn.execute(
        "INSERT INTO users(email, role) VALUES (?1, ?2)",
        params![&email, role],
    )?;
    log::info!("user {} added as {}", email, role);
    Ok(User {
        id: conn.last_insert_rowid(),
        email,
        role,
    })
}

pub fn find_user(conn: &Connection, email: &str) -> Result<Option<User>> {
    Ok(conn
        .query_row(
            "SELECT id, email, role FROM users WHERE email = ?1 COLLATE NOCASE",
            params![email.trim()],
            |r| {
                Ok(User {
                    id: r.get(0)?,
                    email: r.get(1)?,
                    role: r.get(2)?,
                })
            },
        )
        .optional()?)
}

pub fn list_users(conn: &Connection) -> Result<Vec<User>> {
    let mut stmt = conn.prepare("SELECT id, email, role FROM users ORDER BY email")?;
    let rows = stmt.query_map([], |r| {
        Ok(User {
            id: r.get(0)?,
            email: r.get(1)?,
            role: r.get(2)?,
        })
    })?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

const PRIVILEGED: &[Role] = &[Role::Admin, Role::Md, Role::Cao];

/// Only ADMIN may hand out ADMIN, MD or CAO.
pub fn ensure_can_grant(actor: &Actor, role: Role) -> Result<()> {
    if PRIVILEGED.contains(&role) && actor.role != Role::Admin {
        return Err(HrError::forbidden(format!(
            "Only an administrator can grant the {} role",
            role
        )));
    }
    Ok(())
}

/// Changing an ADMIN, MD or CAO account, or granting one of those roles,
/// is reserved to ADMIN.
pub fn set_role(conn: &Connection, actor: &Actor, email: &str, role: Role) -> Result<User> {
    let user = find_user(conn, email)?
        .ok_or_else(|| HrError::not_found(format!("User '{}' not found", email.trim())))?;
    ensure_can_grant(actor, role)?;
    if PRIVILEGED.contains(&user.role) && actor.role != Role::Admin {
        return Err(HrError::forbidden(format!(
            "Only an administrator can change a {} account",
            user.role
        )));
    }
    conn.execute(
        "UPDATE users SET role = ?1 WHERE id = ?2",
        params![role, user.id],
    )?;
    log::info!("user {} role {} -> {}", user.email, user.role, role);
    Ok(User { role, ..user })
}

pub fn handle(conn: &Connection, actor: &Actor, m: &clap::ArgMatches) -> anyhow::Result<()> {
    actor.require(HR_ADMINS)?;
    match m.subcommand() {
        Some(("add", sub)) => {
            let email = sub.get_one::<String>("email").map(|s| s.as_str()).unwrap_or("");
            let role: Role = sub
                .get_one::<String>("role")
                .map(|s| s.parse::<Role>())
                .transpose()?
                .unwrap_or(Role::Employee);
            ensure_can_grant(actor, role)?;
            let user = add_user(conn, email, role)?;
            println!("Added user {} ({}) id={}", user.email, user.role, user.id);
        }
        Some(("list", sub)) => {
            let users = list_users(conn)?;
            let (json_flag, jsonl_flag) = json_flags(sub);
            if !maybe_print_json(json_flag, jsonl_flag, &users)? {
                let rows = users
                    .iter()
                    .map(|u| vec![u.id.to_string(), u.email.clone(), u.role.to_string()])
                    .collect();
                println!("{}", pretty_table(&["ID", "Email", "Role"], rows));
            }
        }
        Some(("set-role", sub)) => {
            let email = sub.get_one::<String>("email").map(|s| s.as_str()).unwrap_or("");
            let role: Role = sub
                .get_one::<String>("role")
                .map(|s| s.as_str())
                .unwrap_or("")
                .parse()?;
            let user = set_role(conn, actor, email, role)?;
            println!("{} is now {}", user.email, user.role);
        }
        _ => {}
    }
    Ok(())
}
