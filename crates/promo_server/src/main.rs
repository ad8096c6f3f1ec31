//! Promo Server - unified CLI
//!
//! Serves the result endpoint or plays a game in the terminal.

#![warn(missing_docs)]

mod cli;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Command};
use promo_server::{
    AppState, BOT_TOKEN_ENV, NotificationQueue, PlaySession, ResultClient, ServerConfig,
    SystemClock, router,
};
use promo_tictactoe::{Difficulty, Side};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve { config, host, port } => run_server(config, host, port).await,
        Command::Play {
            server_url,
            difficulty,
            computer_first,
            think_delay_ms,
        } => run_play(server_url, difficulty, computer_first, think_delay_ms).await,
    }
}

/// Run the HTTP result endpoint
#[instrument(skip_all, fields(config_path = %config_path.display()))]
async fn run_server(config_path: PathBuf, host: Option<String>, port: Option<u16>) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,promo_server=debug")),
        )
        .init();

    let config = ServerConfig::load(&config_path)?.with_bind(host, port);
    info!(?config, "Configuration loaded");

    let notifier = config.build_notifier(std::env::var(BOT_TOKEN_ENV).ok());
    let notifications = NotificationQueue::spawn(notifier);
    let state = AppState::from_config(&config, Arc::new(SystemClock), notifications)?;
    let app = router(state);

    let listener = tokio::net::TcpListener::bind((config.host().as_str(), *config.port())).await?;
    info!(addr = %listener.local_addr()?, "Server ready");
    axum::serve(listener, app).await?;

    Ok(())
}

/// Run the terminal game
async fn run_play(
    server_url: Option<String>,
    difficulty: Difficulty,
    computer_first: bool,
    think_delay_ms: u64,
) -> Result<()> {
    // Logs go to stderr so the board stays readable
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let first = if computer_first {
        Side::Computer
    } else {
        Side::Human
    };
    let client = server_url.as_deref().map(ResultClient::new);
    let mut session = PlaySession::new(
        first,
        difficulty,
        Duration::from_millis(think_delay_ms),
        client,
    );

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut stdout = std::io::stdout();
    session.run(stdin, &mut stdout).await
}
