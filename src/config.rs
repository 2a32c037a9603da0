// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Layered settings: an optional TOML file overridden by `PAYCLIP__*`
//! environment variables (e.g. `PAYCLIP__PAYROLL__PAY_DAY=10`).

use crate::error::{HrError, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "config/payclip.toml";
const ENV_PREFIX: &str = "PAYCLIP";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub app: AppSettings,
    #[serde(default)]
    pub payroll: PayrollSettings,
    /// Problems met while loading, logged by the caller once logging is up.
    #[serde(skip)]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DatabaseSettings {
    /// Explicit SQLite file. Falls back to the platform data dir.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_environment")]
    pub environment: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        AppSettings {
            environment: default_environment(),
            log_level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PayrollSettings {
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default = "default_pay_day")]
    pub pay_day: u32,
    #[serde(default = "default_true")]
    pub ensure_run_on_startup: bool,
}

impl Default for PayrollSettings {
    fn default() -> Self {
        PayrollSettings {
            currency: default_currency(),
            pay_day: default_pay_day(),
            ensure_run_on_startup: true,
        }
    }
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_currency() -> String {
    "INR".to_string()
}

fn default_pay_day() -> u32 {
    5
}

fn default_true() -> bool {
    true
}

impl Settings {
    /// Load settings from `path` (optional file) and the environment. A file
    /// that exists but fails to parse is skipped and noted in `warnings`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_PATH));
        let builder = Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

        let mut warnings = Vec::new();
        let cfg = match builder.build() {
            Ok(cfg) => cfg,
            Err(err) => {
                warnings.push(format!(
                    "failed to load config file {}, falling back to env: {}",
                    path.display(),
                    err
                ));
                Config::builder()
                    .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
                    .build()
                    .map_err(|e| HrError::Config(e.to_string()))?
            }
        };

        let mut settings: Settings = cfg
            .try_deserialize()
            .map_err(|e| HrError::Config(e.to_string()))?;
        if !(1..=28).contains(&settings.payroll.pay_day) {
            return Err(HrError::Config(format!(
                "payroll.pay_day must be between 1 and 28, got {}",
                settings.payroll.pay_day
            )));
        }
        settings.warnings = warnings;
        Ok(settings)
    }

    pub fn is_production(&self) -> bool {
        self.app.environment.eq_ignore_ascii_case("production")
    }
}
