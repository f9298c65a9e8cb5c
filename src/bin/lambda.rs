//! AWS Lambda entry point for the smus crawler
//!
//! Deploy with `cargo lambda build --release --features lambda`.
//! Trigger from EventBridge schedules with `{"job": "detour"}`,
//! `{"job": "bus_notice"}` or `{"job": "school_notice"}`.

use lambda_runtime::{Error as LambdaError, service_fn};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the AWS Lambda function.
#[tokio::main]
async fn main() -> Result<(), LambdaError> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("smus Lambda crawler starting...");
    lambda_runtime::run(service_fn(smus_crawler::lambda::handler)).await
}
