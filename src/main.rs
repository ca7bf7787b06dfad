use std::sync::Arc;

use image_insight_api::config::Config;
use image_insight_api::inference::GeminiClient;
use image_insight_api::server::{app, AppState};

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = Config::from_env();
    for warning in config.warnings() {
        tracing::warn!("{}", warning);
    }

    let client = match GeminiClient::new(&config) {
        Ok(client) => client,
        Err(e) => {
            tracing::error!(error = %e, "failed to build inference client");
            std::process::exit(1);
        }
    };
    tracing::info!(model = %config.model, endpoint = %client.endpoint(), "inference client ready");

    let state = AppState {
        client: Arc::new(client),
    };
    let router = app(state, config.max_body_bytes);

    let listener = match tokio::net::TcpListener::bind(&config.bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(addr = %config.bind_addr, error = %e, "failed to bind");
            std::process::exit(1);
        }
    };
    if let Ok(addr) = listener.local_addr() {
        tracing::info!("listening on {}", addr);
    }
    if let Err(e) = axum::serve(listener, router).await {
        tracing::error!(error = %e, "server error");
    }
}
