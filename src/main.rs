mod cli;

use clap::Parser;
use cli::{Cli, Commands, RunArgs};
use stallsweep::client::HttpManagerClient;
use stallsweep::config::Config;
use stallsweep::evaluator::StallEvaluator;
use stallsweep::observability;
use stallsweep::scheduler::{self, Scheduler};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[tokio::main]
async fn main() -> Result<(), AnyError> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => run(args).await?,
    }

    Ok(())
}

async fn run(args: RunArgs) -> Result<(), AnyError> {
    let config = {
        let _bootstrap = observability::bootstrap_tracing();
        Config::load_with(args.config)?
    };

    if let Some(path) = observability::init_tracing(&config.logging)? {
        info!(path = %path.display(), "Writing logs to file");
    }

    let cancel = CancellationToken::new();
    let client = HttpManagerClient::new(config.http_config(), cancel.clone())?;
    let evaluator = StallEvaluator::new(
        config.scheduler.strike_threshold,
        config.scheduler.stall_message.as_str(),
    );

    let mut scheduler = Scheduler::new(
        Arc::new(client),
        config.targets()?,
        evaluator,
        config.scheduler.poll_interval.as_duration(),
        cancel.clone(),
    );

    let shutdown = cancel.clone();
    tokio::spawn(async move {
        scheduler::shutdown_signal().await;
        shutdown.cancel();
    });

    scheduler.run().await;
    info!("Exiting stallsweep");

    Ok(())
}
