//! meilisearch-mcp: MCP server for Meilisearch over stdio.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use meilisearch_mcp::{McpServer, Router, ServerConfig, ServerContext};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "meilisearch-mcp")]
#[command(about = "Model Context Protocol server for Meilisearch")]
#[command(version)]
struct Cli {
    /// Meilisearch URL (overrides MEILI_HTTP_ADDR)
    #[arg(long)]
    url: Option<String>,

    /// Meilisearch API key (overrides MEILI_MASTER_KEY)
    #[arg(long)]
    api_key: Option<String>,

    /// Log filter used when RUST_LOG is unset (overrides LOG_LEVEL)
    #[arg(long)]
    log_level: Option<String>,
}

fn load_config(cli: &Cli) -> meilisearch_mcp::Result<ServerConfig> {
    let mut config = ServerConfig::from_env()?;
    if let Some(url) = &cli.url {
        config = config.with_url(url)?;
    }
    if let Some(key) = &cli.api_key {
        config = config.with_api_key(key);
    }
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    Ok(config)
}

/// Logs go to stderr; stdout carries the protocol.
fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("meilisearch-mcp: {}", e);
            return ExitCode::FAILURE;
        }
    };
    init_tracing(&config.log_level);

    let ctx = Arc::new(ServerContext::from_config(&config));
    tracing::info!(url = %ctx.connection_settings().await.url, "Starting Meilisearch MCP server");

    let server = McpServer::new(Arc::clone(&ctx), Router::new());
    let outcome = tokio::select! {
        result = server.run_stdio() => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted, shutting down");
            ctx.shutdown().await;
            Ok(())
        }
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Server failed");
            ExitCode::FAILURE
        }
    }
}
