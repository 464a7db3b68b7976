//! jobflow HTTP service: runs the fetch pipeline on request.

mod routes;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use color_eyre::eyre::{Result, WrapErr};
use jobflow_retriever::HttpListingSource;
use jobflow_shared::load_layered;
use jobflow_sink::SheetsSink;
use tokio::net::TcpListener;
use tracing::info;

use routes::{AppState, create_router};

/// Serve the jobflow pipeline over HTTP.
#[derive(Parser)]
#[command(name = "jobflow-server", version, long_about = None)]
struct Args {
    /// Config file (defaults to ~/.jobflow/jobflow.toml).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Listen address, overriding `server.listen_addr`.
    #[arg(long)]
    listen: Option<String>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text")]
    log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

fn init_tracing(args: &Args) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match args.verbose {
        0 => "jobflow=info,tower_http=info",
        1 => "jobflow=debug,tower_http=debug",
        _ => "jobflow=trace,tower_http=trace",
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match args.log_format {
        LogFormat::Text => fmt().with_env_filter(env_filter).with_target(false).init(),
        LogFormat::Json => fmt().json().with_env_filter(env_filter).init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();
    let args = Args::parse();
    init_tracing(&args);

    let config = load_layered(args.config.as_deref())?;
    let listen = args
        .listen
        .clone()
        .unwrap_or_else(|| config.server.listen_addr.clone());
    let addr: SocketAddr = listen
        .parse()
        .wrap_err_with(|| format!("invalid listen address '{listen}'"))?;

    let source = HttpListingSource::new(&config.backend.endpoint, config.backend.timeout_secs)?;
    let sink = SheetsSink::new()?;
    let state = AppState::new(config, Arc::new(source), Arc::new(sink));
    let app = create_router(state);

    let listener = TcpListener::bind(addr)
        .await
        .wrap_err_with(|| format!("failed to bind {addr}"))?;
    info!(%addr, "jobflow server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down");
        })
        .await
        .wrap_err("HTTP server error")?;

    Ok(())
}
