use std::{net::SocketAddr, sync::Arc};

use notifier::{LogDispatcher, NotificationDispatcher, ResendConfig, ResendDispatcher};
use reservations::ApiContext;
use storage::Storage;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod api;
mod app_state;
mod auth;
mod config;

use crate::{
    app_state::AppState,
    auth::AuthConfig,
    config::{load_settings, prepare_database_url, Settings, DEFAULT_JWT_SECRET},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = load_settings()?;
    if settings.jwt_secret == DEFAULT_JWT_SECRET {
        warn!("using the built-in JWT secret; set APP__JWT_SECRET outside development");
    }

    let database_url = prepare_database_url(&settings.database_url)?;
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open SQLite database; verify parent directory exists and permissions are correct"
        );
        error
    })?;

    let ctx = ApiContext::new(Arc::new(storage.clone()), select_dispatcher(&settings))
        .with_notify_timeout(settings.notify_timeout());
    let state = AppState {
        ctx,
        storage,
        auth: AuthConfig {
            jwt_secret: settings.jwt_secret.clone(),
            token_ttl_minutes: settings.token_ttl_minutes,
        },
        require_seating_area: settings.require_seating_area,
    };
    let app = api::build_router(Arc::new(state), settings.cors_origin.as_deref())?;

    let addr: SocketAddr = settings.bind_addr.parse()?;
    info!(%addr, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// Resend when an API key is configured, otherwise emails are only logged.
fn select_dispatcher(settings: &Settings) -> Arc<dyn NotificationDispatcher> {
    match settings.resend_api_key.as_deref() {
        Some(api_key) => {
            info!(base_url = %settings.resend_base_url, "sending notifications through Resend");
            Arc::new(ResendDispatcher::new(ResendConfig {
                api_key: api_key.to_string(),
                base_url: settings.resend_base_url.clone(),
                from: settings.mail_from.clone(),
                restaurant_name: settings.restaurant_name.clone(),
                timeout: settings.notify_timeout(),
            }))
        }
        None => {
            warn!("no Resend API key configured; notifications will only be logged");
            Arc::new(LogDispatcher::new(settings.restaurant_name.clone()))
        }
    }
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
