// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Ortung demo
//
// Entry point. Initialises logging, loads the location config, and plays a
// scripted session against the simulated platform.

mod demo;
mod services;

use std::process::ExitCode;

use ortung_core::error::Result;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("Ortung starting");

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "demo failed");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let dir = services::data_dir::data_dir()?;
    let config = services::settings::load_or_init(&dir)?;
    tracing::info!(
        dir = %dir.display(),
        provider = %config.provider,
        interval_ms = config.update_interval_ms,
        "config loaded"
    );

    let report = demo::run(&config)?;
    for step in &report.steps {
        println!("{:<20} {:?}", step.action, step.outcomes);
    }
    for (handler, event) in &report.events {
        println!("{handler:<8} {}", serde_json::to_string(event)?);
    }
    Ok(())
}
