use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use fruitstore_core::config::{ServerConfig, TransportKind};
use fruitstore_core::mcp::{McpServer, SseMcpServer, serve_stdio};
use fruitstore_core::{Dispatcher, Fruit, SERVER_NAME, Store};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod args;

use args::Args;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr: stdout carries the stdio protocol stream
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(args.log_level()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = args.resolve_config()?;

    let store = Arc::new(Store::new());
    let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&store)));
    let server = Arc::new(McpServer::new(
        dispatcher,
        SERVER_NAME,
        env!("CARGO_PKG_VERSION"),
    ));

    match config.transport {
        TransportKind::Stdio => serve_stdio(&server).await?,
        TransportKind::Sse => run_sse(server, &store, &config.server).await?,
    }
    Ok(())
}

async fn run_sse(server: Arc<McpServer>, store: &Store, config: &ServerConfig) -> Result<()> {
    let sse = SseMcpServer::start(server, config.socket_addr()?).await?;

    info!("Fruit store MCP server starting on {}", config.base_url());
    info!("SSE endpoint: {}/sse", config.base_url());
    let inventory = store.inventory().await;
    let levels: Vec<String> = Fruit::ALL
        .iter()
        .map(|f| {
            let level = inventory.get(f).copied().unwrap_or_default();
            format!("{}={}", f.display_name(), level)
        })
        .collect();
    info!("Initial inventory: {}", levels.join(", "));
    info!("Listening on {}, waiting for connections", sse.local_addr());

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    sse.shutdown().await;
    Ok(())
}
