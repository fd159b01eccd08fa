use std::path::PathBuf;

use chrono::Utc;
use clap::Parser;
use eyre::{Error, WrapErr};
use tokio::signal::unix::{SignalKind, signal};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{Level, debug, error, info};

use crate::board::HttpBoardService;
use crate::config::Config;
use crate::loader::MysqlLoader;
use crate::orchestrator::Orchestrator;

mod board;
mod collector;
mod config;
mod expirer;
mod loader;
mod model;
mod orchestrator;
mod selector;
mod tagger;

#[derive(Debug, Parser)]
#[command(version)]
#[command(about = "Assemble project teams and create their collaboration boards")]
struct Args {
    /// Use FILE instead of teamforge.toml
    #[arg(short, long, value_name = "FILE", default_value = "teamforge.toml")]
    config: PathBuf,
    /// Do not write results back or call the board service
    #[arg(short = 'n', long)]
    dry_run: bool,
    /// Run a single tick and exit
    #[arg(long)]
    once: bool,
    /// Set verbosity level
    #[arg(short, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn log_level(verbose: u8) -> Level {
    match verbose {
        0 => Level::ERROR,
        1 => Level::WARN,
        2 => Level::INFO,
        3 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// A token cancelled on SIGTERM or SIGINT, checked between ticks. An
/// in-flight tick finishes before the loop notices.
fn install_shutdown_handler() -> Result<CancellationToken, Error> {
    let token = CancellationToken::new();
    let mut sigterm = signal(SignalKind::terminate()).wrap_err("cannot listen for SIGTERM")?;
    let mut sigint = signal(SignalKind::interrupt()).wrap_err("cannot listen for SIGINT")?;
    let handle = token.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
            _ = sigint.recv() => info!("Received SIGINT, shutting down"),
        }
        handle.cancel();
    });
    Ok(token)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    color_eyre::install()?;
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_max_level(log_level(args.verbose))
        .init();
    let config = Config::load(&args.config)?;
    let loader = MysqlLoader::connect(&config.storage.url).await?;
    let board = HttpBoardService::new(&config.board)?;
    let mut orchestrator = Orchestrator::new(
        loader,
        board,
        config.team.clone(),
        config.scheduler.clone(),
        args.dry_run,
    );

    let shutdown = install_shutdown_handler()?;
    let interval = config.scheduler.tick_interval();
    info!(
        "Assembling teams every {} minutes{}",
        config.scheduler.tick_interval_minutes,
        if args.dry_run { " (dry run)" } else { "" }
    );
    loop {
        match orchestrator.tick(Utc::now()).await {
            Ok(outcome) => debug!("Tick complete: {:?}", outcome),
            Err(err) if args.once => return Err(err),
            Err(err) => error!("Tick failed, will retry next tick: {:#}", err),
        }
        if args.once {
            break;
        }
        tokio::select! {
            () = sleep(interval) => {}
            () = shutdown.cancelled() => {
                info!("Shutting down");
                break;
            }
        }
    }
    Ok(())
}
