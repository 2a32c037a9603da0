// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::Result;
use chrono::Utc;
use std::path::Path;
use std::process::ExitCode;

use payclip::actor::Actor;
use payclip::config::Settings;
use payclip::error::ErrorEnvelope;
use payclip::{cli, commands, db};

fn command_path(m: &clap::ArgMatches) -> String {
    let mut parts = Vec::new();
    let mut cur = m;
    while let Some((name, sub)) = cur.subcommand() {
        parts.push(name);
        cur = sub;
    }
    parts.join(" ")
}

fn run(matches: &clap::ArgMatches, settings: &Settings) -> Result<()> {
    let conn = db::open_or_init(settings.database.path.as_deref())?;
    let today = Utc::now().date_naive();

    if settings.payroll.ensure_run_on_startup {
        let run = commands::payroll::ensure_current_run(&conn, today, settings.payroll.pay_day)?;
        log::debug!("current payroll run {} ({})", run.id, run.status);
    }

    let actor = match matches.get_one::<String>("user").map(|s| s.trim()) {
        Some(email) if !email.is_empty() => Actor::resolve(&conn, email)?,
        _ => Actor::system(),
    };
    let currency = settings.payroll.currency.as_str();

    match matches.subcommand() {
        Some(("init", _)) => {
            let path = db::db_path(settings.database.path.as_deref())?;
            println!("Database initialized at {}", path.display());
        }
        Some(("user", sub)) => commands::users::handle(&conn, &actor, sub)?,
        Some(("employee", sub)) => commands::employees::handle(&conn, &actor, currency, sub)?,
        Some(("leave", sub)) => commands::leave::handle(&conn, &actor, sub)?,
        Some(("payroll", sub)) => commands::payroll::handle(
            &conn,
            &actor,
            currency,
            settings.payroll.pay_day,
            sub,
        )?,
        Some(("insurance", sub)) => commands::insurance::handle(&conn, &actor, sub)?,
        Some(("convenience", sub)) => commands::convenience::handle(&conn, &actor, sub)?,
        Some(("audit", sub)) => commands::audit::handle(&conn, &actor, sub)?,
        Some(("dashboard", sub)) => commands::dashboard::handle(&conn, &actor, today, sub)?,
        Some(("doctor", sub)) => commands::doctor::handle(&conn, &actor, sub)?,
        Some(("export", sub)) => commands::exporter::handle(&conn, &actor, sub)?,
        Some(("import", sub)) => commands::importer::handle(&conn, &actor, today, sub)?,
        _ => {
            cli::build_cli().print_help()?;
            println!();
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let matches = cli::build_cli().get_matches();

    let config_path = matches.get_one::<String>("config").map(Path::new);
    let settings = match Settings::load(config_path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let level = if matches.get_flag("verbose") {
        "debug"
    } else if matches.get_flag("quiet") {
        "error"
    } else {
        settings.app.log_level.as_str()
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
    for w in &settings.warnings {
        log::warn!("{}", w);
    }

    match run(&matches, &settings) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let envelope =
                ErrorEnvelope::from_anyhow(&err, &command_path(&matches), settings.is_production());
            if matches.get_flag("json-errors") {
                match serde_json::to_string_pretty(&envelope) {
                    Ok(s) => eprintln!("{}", s),
                    Err(_) => eprintln!("Error: {}", envelope.error.message),
                }
            } else {
                eprintln!(
                    "Error [{} {}]: {}",
                    envelope.status_code, envelope.error.code, envelope.error.message
                );
            }
            ExitCode::FAILURE
        }
    }
}
