mod cli;

use clap::Parser;
use cli::{Cli, Commands, ServeArgs};
use tracing::info;

use grabd::api::{self, AppState};
use grabd::config::Config;
use grabd::observability::init_tracing;
use grabd::storage::StorageClient;
use grabd::tracker::JobTracker;

type AnyError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), AnyError> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve(args) => serve(args).await?,
    }

    Ok(())
}

async fn serve(args: ServeArgs) -> Result<(), AnyError> {
    let mut config = Config::load_with(args.config)?;
    if let Some(address) = args.address {
        config.server.bind_addr = address;
    }

    init_tracing(config.server.debug);
    info!(
        bind_addr = %config.server.bind_addr,
        output_path = %config.download.output_path.display(),
        history_capacity = config.jobs.history_capacity,
        max_concurrent_jobs = config.jobs.max_concurrent_jobs,
        "Configuration loaded"
    );

    let storage = StorageClient::local(&config.download.output_path)?;
    let tracker = JobTracker::from_config(&config, storage)?;

    let address = config.server.bind_addr;
    api::run(address, AppState::new(config, tracker)).await
}
