use std::net::SocketAddr;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use rmcp::{ServiceExt, transport::stdio};

use exa_lens::adapter::{AdapterSettings, SearchAdapter};
use exa_lens::api::create_router;
use exa_lens::cache::ResultCache;
use exa_lens::config::Config;
use exa_lens::exa::ExaClient;
use exa_lens::mcp::ExaLensServer;
use exa_lens::storage::{FileStore, KvStore, MemoryStore};

#[derive(Parser)]
#[command(name = "exa-lens", version, about = "Exa search over MCP with cached, progressive disclosure")]
struct Cli {
    /// Log at debug level
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve MCP over stdin/stdout (default)
    Stdio,
    /// Serve the JSON HTTP API
    Http {
        #[arg(long, default_value = "127.0.0.1:8080")]
        addr: SocketAddr,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // stdout carries the MCP protocol, so logs go to stderr
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(if cli.debug {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .with_target(true)
        .init();

    let config = Config::from_env()?;

    let store: Arc<dyn KvStore> = match &config.cache_dir {
        Some(dir) => {
            tracing::info!(dir = %dir.display(), "using file-backed result cache");
            Arc::new(FileStore::new(dir).await?)
        }
        None => Arc::new(MemoryStore::new()),
    };
    let cache = Arc::new(ResultCache::new(store, config.cache_config()));
    cache.start_eviction();

    let client = ExaClient::new(
        config.exa_api_key.clone(),
        config.exa_base_url.clone(),
        config.request_timeout,
    )?;
    let adapter = Arc::new(SearchAdapter::new(
        Arc::new(client),
        cache.clone(),
        AdapterSettings {
            max_total_tokens: config.max_response_tokens,
            price_per_million: config.price_per_million_tokens,
        },
    ));

    let served = match cli.command.unwrap_or(Command::Stdio) {
        Command::Stdio => serve_stdio(adapter).await,
        Command::Http { addr } => serve_http(adapter, addr).await,
    };

    cache.shutdown().await;
    served
}

async fn serve_stdio(adapter: Arc<SearchAdapter>) -> anyhow::Result<()> {
    tracing::info!("serving MCP on stdio");
    let service = ExaLensServer::new(adapter).serve(stdio()).await?;
    service.waiting().await?;
    Ok(())
}

async fn serve_http(adapter: Arc<SearchAdapter>, addr: SocketAddr) -> anyhow::Result<()> {
    let app = create_router(adapter);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "serving HTTP API");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("failed to listen for ctrl-c: {e}");
            }
        })
        .await?;
    Ok(())
}
