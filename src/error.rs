// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Domain errors and the uniform error envelope printed by the CLI.

use chrono::Utc;
use rusqlite::ErrorCode;
use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, HrError>;

#[derive(Debug, Error)]
pub enum HrError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Duplicate(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error(transparent)]
    Database(#[from] rusqlite::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl HrError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        HrError::NotFound(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        HrError::Forbidden(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        HrError::Validation(msg.into())
    }

    pub fn duplicate(msg: impl Into<String>) -> Self {
        HrError::Duplicate(msg.into())
    }

    /// HTTP-style status and machine code for this error.
    pub fn classify(&self) -> (u16, String, String) {
        match self {
            HrError::NotFound(m) => (404, "NOT_FOUND".into(), m.clone()),
            HrError::Forbidden(m) => (403, "FORBIDDEN".into(), m.clone()),
            HrError::Validation(m) => (400, "BAD_REQUEST".into(), m.clone()),
            HrError::Duplicate(m) => (409, "DUPLICATE_RECORD".into(), m.clone()),
            HrError::Config(m) => (500, "CONFIG_ERROR".into(), m.clone()),
            HrError::Database(e) => classify_sqlite(e),
            HrError::Json(e) => (500, "INTERNAL_ERROR".into(), e.to_string()),
        }
    }
}

fn classify_sqlite(e: &rusqlite::Error) -> (u16, String, String) {
    match e {
        rusqlite::Error::QueryReturnedNoRows => (
            404,
            "RECORD_NOT_FOUND".into(),
            "The requested record was not found".into(),
        ),
        rusqlite::Error::SqliteFailure(err, _) if err.code == ErrorCode::ConstraintViolation => {
            match err.extended_code {
                rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                | rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY => (
                    400,
                    "UNIQUE_CONSTRAINT_VIOLATION".into(),
                    "Duplicate record violates unique constraint".into(),
                ),
                rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY => (
                    400,
                    "FOREIGN_KEY_CONSTRAINT_FAILED".into(),
                    "Related record constraint failed".into(),
                ),
                _ => (
                    400,
                    "DATABASE_ERROR".into(),
                    "Database request error".into(),
                ),
            }
        }
        _ => (
            400,
            "DATABASE_ERROR".into(),
            "Database request error".into(),
        ),
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEnvelope {
    pub success: bool,
    pub status_code: u16,
    pub error: ErrorBody,
    pub path: String,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ErrorEnvelope {
    /// Map any failure raised by a command into the envelope. `path` is the
    /// command path that failed (e.g. `leave approve`).
    pub fn from_anyhow(err: &anyhow::Error, path: &str, production: bool) -> Self {
        let (status_code, code, message) = if let Some(hr) = err.downcast_ref::<HrError>() {
            hr.classify()
        } else if let Some(db) = err.downcast_ref::<rusqlite::Error>() {
            classify_sqlite(db)
        } else {
            (500, "INTERNAL_ERROR".to_string(), err.to_string())
        };
        let detail = if production {
            None
        } else {
            Some(format!("{:#}", err))
        };
        ErrorEnvelope {
            success: false,
            status_code,
            error: ErrorBody { code, message },
            path: path.to_string(),
            timestamp: Utc::now().to_rfc3339(),
            detail,
        }
    }
}
