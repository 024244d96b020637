use clap::Parser;
use dotenvy::dotenv;
use line_drive_relay::config::AppConfig;
use line_drive_relay::line::LineClient;
use line_drive_relay::services::drive::DriveClient;
use line_drive_relay::services::pipeline::UploadPipeline;
use line_drive_relay::services::staging::StagingManager;
use line_drive_relay::{AppState, create_app};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Bind host; overrides the HOST environment variable
    #[arg(long)]
    host: Option<String>,

    /// Bind port; overrides the PORT environment variable
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "line_drive_relay=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = AppConfig::from_env()?;
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    info!(
        "🚀 Starting LINE Drive relay (max size {} MB, {} allowed extensions)",
        config.max_file_size / 1024 / 1024,
        config.allowed_extensions.len()
    );

    let staging = StagingManager::new(
        config.temp_dir.clone(),
        config.max_file_size,
        config.allowed_extensions.clone(),
    )?;

    let messaging = Arc::new(LineClient::new(config.channel_access_token.clone())?);
    let storage: Arc<DriveClient> =
        Arc::new(DriveClient::connect(&config.credentials, &config.folder).await?);

    let pipeline = Arc::new(UploadPipeline::new(
        staging,
        storage.clone(),
        messaging,
        config.allowed_extensions.clone(),
    ));

    let state = AppState {
        config: Arc::new(config.clone()),
        pipeline,
        storage,
    };

    let trace_layer = TraceLayer::new_for_http().make_span_with(
        |request: &axum::http::Request<_>| {
            tracing::info_span!(
                "http_request",
                method = %request.method(),
                uri = %request.uri(),
            )
        },
    );

    let app = create_app(state).layer(trace_layer);
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("✅ Listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("👋 Relay exited cleanly.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("⌨️  Ctrl+C received, shutting down...");
        },
        _ = terminate => {
            info!("💤 SIGTERM received, shutting down...");
        },
    }
}
