//! Mock cost API
//!
//! Stand-in for the external cost service during local runs. Two reserved
//! call ids trigger the failure paths; every other id gets a random quote.

use actix_web::{web, HttpResponse};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use tracing::{debug, instrument};

/// Call id answered with a 500
pub const SERVER_ERROR_CALL_ID: &str = "123e4567-e89b-12d3-a456-426614174999";

/// Call id answered with a 404
pub const NOT_FOUND_CALL_ID: &str = "123e4567-e89b-12d3-a456-426614174998";

const CURRENCIES: [&str; 3] = ["ARS", "USD", "EUR"];

#[derive(Debug, Serialize)]
struct CostBody {
    cost: f64,
    currency: &'static str,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    message: &'static str,
    code: &'static str,
}

/// Random cost in [3, 13) with two decimals
fn random_quote() -> CostBody {
    let mut rng = rand::thread_rng();
    let cost = (rng.gen_range(3.0..13.0_f64) * 100.0).floor() / 100.0;
    let currency = CURRENCIES.choose(&mut rng).copied().unwrap_or("USD");
    CostBody { cost, currency }
}

/// Cost lookup
///
/// GET /calls/{call_id}/cost
#[instrument]
pub async fn get_call_cost(path: web::Path<String>) -> HttpResponse {
    let call_id = path.into_inner();

    match call_id.as_str() {
        SERVER_ERROR_CALL_ID => HttpResponse::InternalServerError().json(ErrorBody {
            message: "Algo explotó",
            code: "internal_server_error",
        }),
        NOT_FOUND_CALL_ID => HttpResponse::NotFound().json(ErrorBody {
            message: "Llamada no encontrada",
            code: "call_not_found",
        }),
        _ => {
            let body = random_quote();
            debug!(cost = body.cost, currency = body.currency, "Quote generated");
            HttpResponse::Ok().json(body)
        }
    }
}

/// Health check endpoint
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "callcost-mock",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Configure mock routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check))
        .route("/calls/{call_id}/cost", web::get().to(get_call_cost));
}
