use std::time::Duration;

use reqwest::{Client, Response};

use crate::error::{Error, Result};

/// Build the HTTP client shared by the gateway and payment clients.
///
/// `Client::clone()` is just an `Arc` increment, so one pool serves every
/// call. `timeout` bounds each request end to end.
pub fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .pool_max_idle_per_host(5)
        .pool_idle_timeout(Duration::from_secs(90))
        .timeout(timeout)
        .build()
        .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))
}

/// Body text of a failed response, for error reports. A body that cannot be
/// read is reported as such rather than as an empty string.
pub async fn error_body(response: Response) -> String {
    let status = response.status();
    match response.text().await {
        Ok(body) => body,
        Err(e) => {
            log::warn!("Failed to read body of {} response: {}", status, e);
            format!("<unreadable body: {}>", e)
        }
    }
}
