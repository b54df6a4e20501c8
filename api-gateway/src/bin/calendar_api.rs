//! Calendar API - Serves the photo calendar endpoints.
//!
//! Runs under the Lambda runtime when `AWS_LAMBDA_RUNTIME_API` is set and as a
//! plain HTTP server on `PORT` otherwise.

use api_gateway::{handler, server, AppState};
use lambda_http::{run, service_fn, Error};
use shared::Config;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let config = Config::from_env()?;
    let port = config.port;
    let state = Arc::new(AppState::from_config(config).await?);

    if std::env::var_os("AWS_LAMBDA_RUNTIME_API").is_some() {
        info!("Starting calendar API on the Lambda runtime");
        return run(service_fn(move |event| {
            let state = Arc::clone(&state);
            async move { handler(state, event).await }
        }))
        .await;
    }

    server::serve(state, port).await?;
    Ok(())
}
