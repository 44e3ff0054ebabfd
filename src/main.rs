use std::sync::Arc;

use clap::Parser;

use foodkeeper::{
    app::App,
    cli::{self, Cli},
    config::ClientConfig,
    routes::ConsoleNavigator,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "foodkeeper=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    // stdout carries command output
    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    }

    let cli = Cli::parse();
    let config = ClientConfig::from_env()?;
    tracing::debug!(api = %config.api_base_url, token_path = %config.token_path.display(), "configuration loaded");

    let app = App::new(config, Arc::new(ConsoleNavigator))?;
    cli::run(cli, &app).await
}
