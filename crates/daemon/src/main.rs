// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! convoyd: the Convoy fleet coordinator daemon.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod bootstrap;
mod config;

use config::DaemonConfig;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

fn config_path() -> PathBuf {
    std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .or_else(|| std::env::var("CONVOY_CONFIG").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("convoy.toml"))
}

fn init_tracing(config: &DaemonConfig) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log.filter.clone()));
    match &config.log.dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "convoyd.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
            None
        }
    }
}

#[tokio::main]
async fn main() {
    let path = config_path();
    let config = match DaemonConfig::load(&path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("convoyd: {e}");
            std::process::exit(2);
        }
    };
    let _log_guard = init_tracing(&config);
    tracing::info!(config = %path.display(), "convoyd starting");

    if let Err(e) = bootstrap::run(config).await {
        tracing::error!(error = %e, "convoyd failed");
        std::process::exit(1);
    }
}
