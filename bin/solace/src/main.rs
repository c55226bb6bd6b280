//! # Solace Binary
//!
//! The entry point that assembles the application from the enabled plugins.

use std::sync::Arc;

use anyhow::Context;
use secrecy::ExposeSecret;
use solace_api::{middleware, AppState};
use solace_configs::{LogSettings, Settings};
use solace_core::Clock;
use solace_services::{
    AchievementService, CheckInService, ForumService, JournalService, SystemClock, UploadService,
};
use tower_http::services::ServeDir;
use tracing_subscriber::EnvFilter;

#[cfg(feature = "db-sqlite")]
use solace_db_sqlite::SqliteStore;

#[cfg(feature = "storage-local")]
use solace_storage_local::LocalMediaStore;

#[cfg(feature = "auth-simple")]
use solace_auth_simple::SimpleAuthProvider;

#[cfg(not(all(feature = "db-sqlite", feature = "storage-local", feature = "auth-simple")))]
compile_error!("solace needs a database, a media store and an auth provider feature enabled");

fn init_tracing(log: &LogSettings) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.filter));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if log.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().context("loading settings")?;
    init_tracing(&settings.log);
    if let Some(path) = &settings.env_file {
        tracing::debug!(path = %path.display(), "loaded .env");
    }

    if settings.uses_dev_secret() {
        tracing::warn!("auth.secret is the development default; set SOLACE__AUTH__SECRET");
    }

    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new(settings.locale.utc_offset_minutes));

    // 1. Initialize Database Implementation
    let store = Arc::new(
        SqliteStore::connect(&settings.database.url, settings.database.max_connections)
            .await
            .context("opening database")?,
    );

    // 2. Initialize Storage Implementation
    let media = Arc::new(LocalMediaStore::new(
        settings.media.root.clone(),
        settings.media.url_prefix.clone(),
    ));

    // 3. Initialize Auth Implementation
    let auth = Arc::new(SimpleAuthProvider::new(settings.auth.secret.expose_secret())?);

    // 4. Services
    let achievements = Arc::new(AchievementService::new(store.clone(), clock.clone()));
    let state = AppState {
        forum: Arc::new(
            ForumService::new(store.clone(), clock.clone()).with_achievements(achievements.clone()),
        ),
        check_ins: Arc::new(
            CheckInService::new(store.clone(), clock.clone()).with_achievements(achievements.clone()),
        ),
        journal: Arc::new(
            JournalService::new(store.clone(), clock.clone()).with_achievements(achievements.clone()),
        ),
        uploads: Arc::new(
            UploadService::new(media, clock.clone()).with_max_bytes(settings.media.max_upload_bytes),
        ),
        achievements,
        users: store,
        auth,
        clock,
        upload_limit: settings.media.max_upload_bytes,
    };

    let media_path = settings.media.url_prefix.trim_end_matches('/');
    let app = solace_api::router(state)
        .nest_service(media_path, ServeDir::new(&settings.media.root))
        .layer(middleware::nosniff())
        .layer(middleware::cors_policy())
        .layer(middleware::trace_layer());

    let address = settings.server_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("binding {address}"))?;
    tracing::info!(%address, "solace listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
    tracing::info!("shutting down");
}
