//! Site admin API server: content, assets, action log and login.

use site_api::{server, ApiConfig, AppState};
use site_assets::{HttpUploadClient, UploadClient};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ApiConfig::from_env()?;
    let kv = config.open_store()?;
    let upload: Option<Arc<dyn UploadClient>> = config
        .upload_url
        .clone()
        .map(|url| Arc::new(HttpUploadClient::new(url)) as Arc<dyn UploadClient>);
    if upload.is_none() {
        tracing::info!("no upload server configured, images are stored inline");
    }
    let state = Arc::new(AppState::new(
        kv,
        upload,
        config.upload_timeout,
        config.credentials.clone(),
    ));

    let app = server::router(state);
    tracing::info!(storage = ?config.storage, "site admin API listening on {}", config.listen);
    axum::serve(
        tokio::net::TcpListener::bind(config.listen).await?,
        app.into_make_service(),
    )
    .await?;
    Ok(())
}
