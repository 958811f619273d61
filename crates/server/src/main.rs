//! Server entry point

use std::path::PathBuf;

use anyhow::Context;
use tracing_subscriber::EnvFilter;
use voice_dialog_config::{ensure_directories, load_settings};
use voice_dialog_server::{create_router, init_metrics, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let settings = match &config_path {
        Some(path) => load_settings(Some(path)).context("loading configuration")?,
        None => {
            let default = PathBuf::from("config.yaml");
            if default.exists() {
                load_settings(Some(&default)).context("loading configuration")?
            } else {
                load_settings(None).context("loading configuration")?
            }
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.log.level.clone()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    ensure_directories(&settings).context("creating configured directories")?;
    init_metrics();

    let bind = format!("{}:{}", settings.server.ip, settings.server.port);
    let state = AppState::new(settings);
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("binding {bind}"))?;
    tracing::info!("server is running at ws://{bind}/ws/<agent_id>");

    axum::serve(listener, router).await.context("serving")?;
    Ok(())
}
