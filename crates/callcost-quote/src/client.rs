//! HTTP client for the cost API
//!
//! Performs exactly one request per call and maps every outcome onto
//! [`QuoteError`]. Retrying and circuit breaking are layered on top by
//! [`crate::QuoteGateway`].

use async_trait::async_trait;
use callcost_core::config::QuoteApiConfig;
use callcost_core::models::Quote;
use callcost_core::QuoteError;
use reqwest::{Client, ClientBuilder, StatusCode};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Single-attempt cost lookup
#[async_trait]
pub trait QuoteFetcher: Send + Sync {
    async fn fetch(&self, call_id: &str) -> Result<Quote, QuoteError>;
}

/// Success body of `GET /calls/{call_id}/cost`
#[derive(Debug, Deserialize)]
struct CostResponse {
    cost: Decimal,
    currency: String,
}

/// Error body returned by the cost API on failures
#[derive(Debug, Default, Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

/// Cost API client
pub struct HttpQuoteClient {
    http_client: Client,
    base_url: String,
    timeout_ms: u64,
}

impl HttpQuoteClient {
    /// Create a new client
    ///
    /// # Arguments
    ///
    /// * `base_url` - Root of the cost API (e.g. "http://localhost:8080")
    /// * `timeout` - Per-request timeout
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, QuoteError> {
        let http_client = ClientBuilder::new()
            .timeout(timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .build()
            .map_err(|e| QuoteError::Transport(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout_ms: timeout.as_millis() as u64,
        })
    }

    pub fn from_config(config: &QuoteApiConfig) -> Result<Self, QuoteError> {
        Self::new(&config.base_url, config.request_timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn cost_url(&self, call_id: &str) -> String {
        format!(
            "{}/calls/{}/cost",
            self.base_url,
            urlencoding::encode(call_id)
        )
    }

    fn map_transport_error(&self, err: reqwest::Error) -> QuoteError {
        if err.is_timeout() {
            QuoteError::Timeout(self.timeout_ms)
        } else {
            QuoteError::Transport(err.to_string())
        }
    }
}

/// Render an error body as `"<message> (<code>)"`, falling back to the raw text
fn describe_error_body(status: StatusCode, body: &[u8]) -> String {
    let parsed: ErrorResponse = serde_json::from_slice(body).unwrap_or_default();

    match (parsed.message, parsed.code) {
        (Some(message), Some(code)) => format!("{} ({})", message, code),
        (Some(message), None) => message,
        (None, Some(code)) => code,
        (None, None) => {
            let text = String::from_utf8_lossy(body);
            let text = text.trim();
            if text.is_empty() {
                status
                    .canonical_reason()
                    .unwrap_or("no response body")
                    .to_string()
            } else {
                text.chars().take(200).collect()
            }
        }
    }
}

/// Classify a non-success status
fn classify_status(status: StatusCode, body: &[u8]) -> QuoteError {
    let detail = describe_error_body(status, body);

    if status == StatusCode::NOT_FOUND {
        QuoteError::NotFound { detail }
    } else if status.is_client_error() {
        QuoteError::Rejected {
            status: status.as_u16(),
            detail,
        }
    } else {
        QuoteError::Server {
            status: status.as_u16(),
            detail,
        }
    }
}

/// Parse and validate a success body
fn parse_quote(body: &[u8]) -> Result<Quote, QuoteError> {
    let response: CostResponse = serde_json::from_slice(body)
        .map_err(|e| QuoteError::InvalidResponse(format!("malformed cost body: {}", e)))?;

    let quote = Quote::new(response.cost, response.currency.trim().to_uppercase());
    if !quote.is_well_formed() {
        return Err(QuoteError::InvalidResponse(format!(
            "unusable quote: cost {} currency '{}'",
            response.cost, response.currency
        )));
    }

    Ok(quote)
}

#[async_trait]
impl QuoteFetcher for HttpQuoteClient {
    #[instrument(skip(self))]
    async fn fetch(&self, call_id: &str) -> Result<Quote, QuoteError> {
        let url = self.cost_url(call_id);
        debug!("Requesting quote from {}", url);

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        if status.is_success() {
            return parse_quote(&body);
        }

        let err = classify_status(status, &body);
        warn!(
            status = status.as_u16(),
            code = err.error_code(),
            "Cost API returned an error: {}",
            err
        );
        Err(err)
    }
}
