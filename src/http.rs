//! HTTP utilities for embedding providers

use std::time::Duration;

use reqwest::{Client, Response, StatusCode};

use crate::error::{Error, Result};

/// Create a reqwest client with connection pooling and sensible defaults
///
/// The client is configured with:
/// - Connection pooling (max 10 idle connections per host)
/// - The given request timeout
/// - Keepalive connections
pub fn create_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .pool_max_idle_per_host(10)
        .pool_idle_timeout(Duration::from_secs(90))
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(30))
        .build()
        .map_err(|e| Error::ProviderUnavailable(format!("failed to create HTTP client: {}", e)))
}

/// Map a transport failure to a provider error
pub fn request_error(service_name: &str, err: reqwest::Error) -> Error {
    if err.status() == Some(StatusCode::TOO_MANY_REQUESTS) {
        return Error::RateLimited(format!("{}: {}", service_name, err));
    }
    Error::ProviderUnavailable(format!("{}: {}", service_name, err))
}

/// Check HTTP response status and return detailed error if not successful
///
/// 429 becomes [`Error::RateLimited`]; every other failure status becomes
/// [`Error::ProviderUnavailable`] carrying the API's error message.
pub async fn check_response(response: Response, service_name: &str) -> Result<Response> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(status_error(service_name, status, &body))
}

fn status_error(service_name: &str, status: StatusCode, body: &str) -> Error {
    // Try to extract error message from JSON response
    let error_detail = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|json| {
            json.get("error")
                .and_then(|e| e.get("message").and_then(|m| m.as_str()).or_else(|| e.as_str()))
                .or_else(|| json.get("message").and_then(|m| m.as_str()))
                .or_else(|| json.get("detail").and_then(|d| d.as_str()))
                .map(|s| s.to_string())
        })
        .unwrap_or_else(|| body.to_string());

    let message = format!("{} API error {}: {}", service_name, status, error_detail);
    if status == StatusCode::TOO_MANY_REQUESTS {
        Error::RateLimited(message)
    } else {
        Error::ProviderUnavailable(message)
    }
}
