//! Shared `reqwest` plumbing for the service adapters.

use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::errors::IntegrationError;

pub fn build_client(service: &str, timeout_secs: u64) -> Result<reqwest::Client, IntegrationError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|error| IntegrationError::transport(service, error.to_string(), false))
}

/// Timeouts are transient; refused connections and TLS failures are not.
pub fn send_error(service: &str, error: reqwest::Error) -> IntegrationError {
    IntegrationError::transport(service, error.to_string(), error.is_timeout())
}

/// Checks the status and decodes a JSON body.
pub async fn read_json<T: DeserializeOwned>(
    service: &str,
    response: reqwest::Response,
) -> Result<T, IntegrationError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(IntegrationError::from_status(service, status.as_u16(), body));
    }

    response.json::<T>().await.map_err(|error| {
        if error.is_timeout() {
            send_error(service, error)
        } else {
            IntegrationError::decode(service, error.to_string())
        }
    })
}
