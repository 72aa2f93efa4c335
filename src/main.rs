use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use log::{LevelFilter, error, info, warn};
use tokio_util::sync::CancellationToken;

use ember_poker_lib::commands::{self, Action, Command};
use ember_poker_lib::config::SessionConfig;
use ember_poker_lib::core::BluetoothManager;
use ember_poker_lib::logging;

#[derive(Parser)]
#[command(name = "poker")]
#[command(about = "A utility for controlling Ember devices.", version)]
struct Cli {
    /// Session config file (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = SessionConfig::load_config(cli.config.as_deref()).await;
    let level = match (&config, cli.verbose) {
        (_, true) => LevelFilter::Debug,
        (Ok(config), false) => logging::parse_level(&config.log_level),
        (Err(_), false) => LevelFilter::Info,
    };
    if let Err(e) = logging::init(level) {
        eprintln!("Failed to initialise logging: {}", e);
    }
    let config = config?;
    info!("Session config: {:?}", config);

    // reject malformed arguments before touching the radio
    let action = cli.command.action()?;
    let identity = cli.command.identity();

    let cancel_token = CancellationToken::new();
    let cancel_on_signal = cancel_token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling");
            cancel_on_signal.cancel();
        }
    });

    let manager = BluetoothManager::new(identity, &config).await?;
    let outcome = session(&manager, action, &cancel_token).await;

    if let Err(e) = manager.shutdown().await {
        warn!("Failed to disconnect cleanly: {}", e);
    }

    if let Some(output) = outcome? {
        println!("{}", output);
    }
    Ok(())
}

async fn session(
    manager: &BluetoothManager,
    action: Action,
    cancel_token: &CancellationToken,
) -> Result<Option<String>> {
    manager.wait_until_ready(cancel_token).await?;
    commands::execute(manager.bridge(), action).await
}
