mod config;
mod demo;

use std::sync::Arc;

use anyhow::Context;
use nix::sys::signal::Signal;
use tracing::info;

use spawnd_core::Daemon;
use spawnd_observe::{Journal, LoggerConfig, logger_init};

use crate::config::AgentConfig;

fn main() -> anyhow::Result<()> {
    // 1) Config
    let cfg = AgentConfig::load()?;

    // 2) Logger
    let logger = match cfg.logger.clone() {
        Some(logger) => logger,
        None => LoggerConfig::from_env()?,
    };
    logger_init(&logger)?;
    info!(name = %cfg.daemon.name, daemonize = cfg.daemon.daemonize, "logger initialized");

    // 3) Daemon + journal listener + demo producer
    let mut daemon = Daemon::builder(cfg.daemon.clone())
        .with_global_listener(0, Arc::new(Journal::new()))
        .with_producer(demo::Squares::new(cfg.demo.clone()))
        .build()?;

    // 4) Signals: handled at the top of each loop iteration
    for signal in [Signal::SIGTERM, Signal::SIGINT] {
        let stop = daemon.stop_handle();
        daemon.signals_mut().add(
            signal,
            Arc::new(move |sig: Signal| {
                info!(signal = ?sig, "shutdown requested");
                stop.stop();
            }),
        )?;
    }
    daemon.signals_mut().add(
        Signal::SIGHUP,
        Arc::new(|_: Signal| info!("SIGHUP received; configuration is only read at startup")),
    )?;

    // 5) Run until stopped
    daemon.start().context("supervisor terminated early")?;
    info!("bye");
    Ok(())
}
