use anyhow::Result;
use clap::Parser;
use std::net::SocketAddr;
use ticketpilot_agent::server::{router, AppState};
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "TicketPilot Agent - helpdesk ticket automation over headless Chromium"
)]
struct Args {
    /// Host to bind to
    #[arg(long, default_value = "127.0.0.1", env = "AGENT_HOST")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value = "3000", env = "AGENT_PORT")]
    port: u16,

    /// Enable permissive CORS (for browser-based workflow tools)
    #[arg(long)]
    cors: bool,

    /// Maximum concurrent browser sessions
    #[arg(long, default_value = "1", env = "MAX_CONCURRENT_RUNS")]
    max_concurrent_runs: usize,
}

fn init_logging() {
    let default_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging();

    info!("TicketPilot Agent v{}", env!("CARGO_PKG_VERSION"));
    info!(
        max_concurrent_runs = args.max_concurrent_runs,
        "Initializing automation server"
    );

    let state = AppState::new(args.max_concurrent_runs);
    let mut app = router(state);
    if args.cors {
        info!("CORS enabled");
        app = app.layer(CorsLayer::permissive());
    }

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("Automation server running on http://{addr}");
    info!("Available endpoints:");
    info!("  POST http://{addr}/automate");
    info!("  GET  http://{addr}/status/{{jobId}}");
    info!("  GET  http://{addr}/health");
    info!("  GET  http://{addr}/ready");
    info!("Press Ctrl+C to stop");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("Received shutdown signal");
        })
        .await?;

    Ok(())
}
