use std::sync::Arc;

use rapid_response::api;
use rapid_response::config::{Config, LogFormat};
use rapid_response::error::AppError;
use rapid_response::intake::{GeminiExtractor, NominatimGeocoder};
use rapid_response::security::sweeper::run_sweeper;
use rapid_response::state::AppState;
use rapid_response::store::MemoryStore;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = Config::from_env()?;

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .with_target(false);
    match config.log_format {
        LogFormat::Json => subscriber.json().init(),
        LogFormat::Compact => subscriber.compact().init(),
    }

    let mut app_state = AppState::new(Arc::new(MemoryStore::new()), config.rate_limits.clone())
        .with_geocoder(Arc::new(NominatimGeocoder::new(
            config.geocoder_url.clone(),
            config.geocoder_country_codes.clone(),
        )))
        .with_intake_settings(config.intake.clone());

    match &config.gemini_api_key {
        Some(api_key) => {
            app_state = app_state.with_extractor(Arc::new(
                GeminiExtractor::new(api_key.clone(), config.gemini_model.clone())
                    .with_base_url(config.gemini_base_url.clone()),
            ));
            tracing::info!(model = %config.gemini_model, "conversation extraction enabled");
        }
        None => {
            tracing::warn!("GEMINI_API_KEY not set; intake will only ask follow-up questions");
        }
    }

    let shared_state = Arc::new(app_state);
    let app = api::rest::router(shared_state.clone());

    tokio::spawn(run_sweeper(shared_state.clone(), config.sweep_interval));

    let bind_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| AppError::Internal(format!("failed to bind {bind_addr}: {err}")))?;

    tracing::info!(http_port = config.http_port, "http server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::Internal(format!("server error: {err}")))?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
