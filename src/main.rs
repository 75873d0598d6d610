use std::fs::File;

use anyhow::{Context, Result, anyhow};
use brewd::{application::Application, config::ConfigManager};
use clap::Parser;
use daemonize::Daemonize;
use log::{LevelFilter, info};
use syslog::{BasicLogger, Facility, Formatter3164};

mod cli;

const DAEMON_OUTPUT: &str = "/var/tmp/brewd.log";

fn init_log() -> Result<()> {
    syslog::unix(Formatter3164 {
        facility: Facility::LOG_USER,
        hostname: None,
        process: "brewd".into(),
        pid: std::process::id(),
    })
    .map_err(|e| anyhow!("{e}"))
    .and_then(|logger| {
        log::set_boxed_logger(Box::new(BasicLogger::new(logger)))
            .map(|_| log::set_max_level(LevelFilter::Info))
            .map_err(|e| anyhow!("{e}"))
    })
}

fn into_daemon() -> Result<()> {
    File::create(DAEMON_OUTPUT)
        .and_then(|out| Ok((out.try_clone()?, out)))
        .with_context(|| format!("Failed to open {DAEMON_OUTPUT}"))
        .and_then(|(stderr, stdout)| {
            Daemonize::new()
                .stdout(stdout)
                .stderr(stderr)
                .start()
                .map_err(|e| anyhow!("{e}"))
        })
}

async fn run(cli: cli::Cli) -> Result<()> {
    let config_manager = ConfigManager::load(cli.config)
        .await
        .context("Failed to load configuration")?;

    let reason = Application::builder()
        .with_config_manager(config_manager)
        .build()?
        .run()
        .await?;

    info!("brewd stopped: {reason:?}");
    Ok(())
}

fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    if let Err(e) = init_log() {
        eprintln!("syslog unavailable, continuing without it: {e}");
    }

    // Fork before the runtime spawns its worker threads.
    if cli.daemonize {
        into_daemon()?;
    }

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start the async runtime")?
        .block_on(run(cli))
}
