//! Mock cost API server

use actix_web::{App, HttpServer};
use callcost_core::config::MockServerConfig;
use std::env;
use tracing::info;
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing/logging
fn init_tracing() {
    let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("callcost_mock={},actix_web=info", log_level))
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true))
        .init();
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = MockServerConfig::load().map_err(|e| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string())
    })?;
    let bind_addr = config.bind_addr();

    info!(
        "Starting mock cost API v{} on http://{}",
        env!("CARGO_PKG_VERSION"),
        bind_addr
    );

    HttpServer::new(|| {
        App::new()
            .wrap(TracingLogger::default())
            .configure(callcost_mock::configure)
    })
    .bind(&bind_addr)?
    .run()
    .await
}
