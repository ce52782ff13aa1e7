use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use parcel_engine::api;
use parcel_engine::config::Config;
use parcel_engine::engine::auto_confirm::run_auto_confirm_sweeper;
use parcel_engine::error::AppError;
use parcel_engine::geocoder::GeocoderSettings;
use parcel_engine::geocoder::nominatim::NominatimProvider;
use parcel_engine::models::event::TransitionEvent;
use parcel_engine::observability::logging::init_tracing;
use parcel_engine::state::AppState;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = Config::from_env()?;
    init_tracing(&config);

    let provider = NominatimProvider::new(
        &config.geocoder_base_url,
        &config.geocoder_user_agent,
        config.geocoder_country_codes.clone(),
        config.geocoder_timeout,
    )?;
    let settings = GeocoderSettings {
        timeout: config.geocoder_timeout,
        fallback: config.fallback.clone(),
    };

    let shared_state = Arc::new(AppState::new(
        config.event_buffer_size,
        Arc::new(provider),
        settings,
    ));

    let app = api::rest::router(shared_state.clone());

    tokio::spawn(run_auto_confirm_sweeper(
        shared_state.clone(),
        config.auto_confirm_after,
        config.auto_confirm_interval,
    ));
    tokio::spawn(relay_notifications(
        shared_state.transition_events_tx.subscribe(),
    ));

    let bind_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| AppError::Internal(format!("failed to bind {bind_addr}: {err}")))?;

    tracing::info!(
        http_port = config.http_port,
        geocoder = %config.geocoder_base_url,
        "http server started"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::Internal(format!("server error: {err}")))?;

    Ok(())
}

async fn relay_notifications(mut events: broadcast::Receiver<TransitionEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => tracing::info!(
                parcel_id = %event.parcel_id,
                tracking_number = %event.tracking_number,
                action = %event.action,
                to = %event.to,
                "notify parcel parties"
            ),
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "notification relay lagged; events dropped");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
