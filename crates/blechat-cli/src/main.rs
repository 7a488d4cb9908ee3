//! blechat console client entry point

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use blechat_cli::{
    app::{ChatApp, Outcome},
    cli::Cli,
    error::{CliError, Result},
};
use blechat_core::MessageStore;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match run(cli).await {
        Ok(Outcome::Quit) => ExitCode::SUCCESS,
        Ok(Outcome::ConnectionLost) => ExitCode::FAILURE,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<Outcome> {
    let store = open_store(&cli)?;
    let nickname = resolve_nickname(&cli, &store)?;
    info!(nickname = %nickname, peer = %cli.peer, "starting blechat");

    let app = ChatApp::new(&cli, store, nickname)?;
    app.run().await
}

/// Open the history store under the configured data directory.
fn open_store(cli: &Cli) -> Result<Arc<MessageStore>> {
    let data_dir = match &cli.data_dir {
        Some(dir) => dir.clone(),
        None => dirs::home_dir().ok_or(CliError::NoDataDir)?.join(".blechat"),
    };
    Ok(Arc::new(MessageStore::open(data_dir.join("history.json"))?))
}

/// Use the nickname from the command line (persisting it), else the stored
/// one, else a default.
fn resolve_nickname(cli: &Cli, store: &MessageStore) -> Result<String> {
    if let Some(name) = &cli.nickname {
        store.save_nickname(name)?;
        return Ok(name.clone());
    }
    Ok(store
        .load_nickname()
        .unwrap_or_else(|| "Anonymous".to_string()))
}

/// Setup logging based on verbosity level
fn setup_logging(verbose: bool) {
    let log_level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();
}
