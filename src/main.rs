//! Call cost processor
//!
//! Consumes call lifecycle events from RabbitMQ, prices incoming calls
//! through the cost API and keeps one row per call in PostgreSQL.

use anyhow::Context;
use callcost_consumer::{Dispatcher, QueueConsumer};
use callcost_core::config::LoggingConfig;
use callcost_core::AppConfig;
use callcost_db::{create_pool, PgCallRepository};
use callcost_quote::QuoteGateway;
use callcost_services::CallLifecycleEngine;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing/logging
fn init_tracing(config: &LoggingConfig) {
    let level = &config.level;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "callcost_processor={level},callcost_consumer={level},callcost_services={level},\
             callcost_quote={level},callcost_db={level},lapin=warn,sqlx=warn"
        ))
    });

    let registry = tracing_subscriber::registry().with(env_filter);

    if config.json {
        registry.with(fmt::layer().json().with_target(true)).init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_line_number(true),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;

    init_tracing(&config.logging);

    info!(
        "Starting call cost processor v{}",
        env!("CARGO_PKG_VERSION")
    );

    let pool = create_pool(&config.database)
        .await
        .context("Failed to create database pool")?;
    let repository = Arc::new(PgCallRepository::new(pool));

    let quotes = Arc::new(
        QuoteGateway::from_config(&config.quote).context("Failed to build cost API client")?,
    );
    info!(base_url = %config.quote.base_url, "Cost API client configured");

    let engine = Arc::new(CallLifecycleEngine::new(repository, quotes));
    let dispatcher = Dispatcher::for_engine(engine);

    let consumer = QueueConsumer::connect(&config.rabbitmq)
        .await
        .context("Failed to connect to RabbitMQ")?;

    let stats = consumer.run(&dispatcher).await?;
    info!(
        received = stats.received,
        handled = stats.handled,
        "Processor stopped"
    );

    Ok(())
}
