use anyhow::Result;
use rise_server::app;
use rise_server::config::ServerConfig;
use rise_server::state::AppState;
use rise_storage::SqliteProfileStore;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::signal;
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG_PATH: &str = "config/rise.toml";

#[allow(clippy::print_stderr)]
fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  rise-server [config.toml]    Start the server (default: {DEFAULT_CONFIG_PATH})");
    eprintln!("  rise-server --help           Show this message");
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("rise=info".parse()?))
        .init();

    let args: Vec<String> = std::env::args().collect();

    match args.get(1).map(|s| s.as_str()) {
        Some("-h") | Some("--help") => {
            print_usage();
            Ok(())
        }
        Some(path) => {
            let config = ServerConfig::load(path)?;
            run_server(config).await
        }
        None => {
            let config = if Path::new(DEFAULT_CONFIG_PATH).exists() {
                ServerConfig::load(DEFAULT_CONFIG_PATH)?
            } else {
                tracing::info!(
                    path = DEFAULT_CONFIG_PATH,
                    "No config file found, using defaults"
                );
                ServerConfig::default()
            };
            run_server(config).await
        }
    }
}

async fn run_server(config: ServerConfig) -> Result<()> {
    tracing::info!(
        http_port = config.http_port,
        data_dir = %config.data_dir,
        ai_provider = %config.ai.provider,
        "rise-server starting"
    );

    let store = Arc::new(SqliteProfileStore::open(Path::new(&config.data_dir))?);
    let analyzer = app::build_analyzer(&config.ai)?;
    tracing::info!(
        provider = analyzer.provider(),
        model = analyzer.model_name(),
        "AI analyzer ready"
    );

    let options = config.analysis_options();
    let http_addr: SocketAddr = format!("0.0.0.0:{}", config.http_port).parse()?;
    let state = AppState::new(store, analyzer, options, config);
    let http_app = app::build_http_app(state);

    let listener = tokio::net::TcpListener::bind(http_addr).await?;
    tracing::info!(http = %http_addr, "Server started");

    if let Err(e) = axum::serve(listener, http_app)
        .with_graceful_shutdown(async {
            signal::ctrl_c().await.ok();
            tracing::info!("Shutting down gracefully");
        })
        .await
    {
        tracing::error!(error = %e, "HTTP server error");
    }

    tracing::info!("Server stopped");
    Ok(())
}
