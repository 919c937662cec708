mod config;

use std::sync::Arc;

use anyhow::Context;
use axum::http::{
    HeaderValue, Method,
    header::{AUTHORIZATION, CONTENT_TYPE},
};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use vidtube_api::media::{CloudinaryUploader, DiskUploader, MediaUploader};
use vidtube_api::routes::build_router;
use vidtube_api::tokens::TokenIssuer;
use vidtube_api::{AppState, AppStateInner};
use vidtube_db::Database;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vidtube=debug,vidtube_api=debug,vidtube_db=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    let db = Database::open(&config.db_path)
        .with_context(|| format!("opening database {}", config.db_path.display()))?;

    let uploader: Arc<dyn MediaUploader> = match config.cloudinary.clone() {
        Some(cloudinary) => {
            info!("Uploading media to Cloudinary cloud '{}'", cloudinary.cloud_name);
            Arc::new(CloudinaryUploader::new(cloudinary))
        }
        None => {
            warn!(
                "Cloudinary is not configured; storing media in {}",
                config.media_dir.display()
            );
            let public_base = format!("{}/media", config.public_url.trim_end_matches('/'));
            Arc::new(DiskUploader::new(config.media_dir.clone(), public_base).await?)
        }
    };

    let state: AppState = Arc::new(AppStateInner {
        db,
        tokens: TokenIssuer::new(&config.tokens),
        uploader,
        temp_dir: config.temp_dir.clone(),
    });

    let cors = match &config.cors_origin {
        Some(origin) => CorsLayer::new()
            .allow_origin(
                origin
                    .parse::<HeaderValue>()
                    .context("VIDTUBE_CORS_ORIGIN is not a valid origin")?,
            )
            .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::OPTIONS])
            .allow_headers([AUTHORIZATION, CONTENT_TYPE])
            .allow_credentials(true),
        None => CorsLayer::permissive(),
    };

    let app = build_router(state)
        .nest_service("/media", ServeDir::new(&config.media_dir))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    info!("VidTube server listening on {}", config.addr);
    let listener = tokio::net::TcpListener::bind(config.addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate());
        match sigterm {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                warn!("Could not install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
