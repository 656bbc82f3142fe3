//! Shared HTTP client construction (spec 4.3): one `reqwest::Client` per
//! orchestrator instance, threaded through every fetcher and the downloader
//! rather than built as a process-wide singleton (design note 9). Grounded
//! on the donor's `ParallelDownloader` client builder in
//! `utils_ext/performance.rs`.

use std::time::Duration;

use reqwest::Client;

use crate::error::{DepotError, Result};

#[must_use]
pub fn build_client(max_idle_per_host: usize) -> Client {
    Client::builder()
        .user_agent(concat!("depot/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(60))
        .pool_max_idle_per_host(max_idle_per_host.max(1))
        .pool_idle_timeout(Duration::from_secs(30))
        .tcp_keepalive(Duration::from_secs(60))
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()
        .expect("static client configuration is always valid")
}

/// Issues a GET and maps non-2xx responses into the crate's error taxonomy,
/// distinguishing terminal 4xx from transient/network failures.
pub async fn get_bytes(client: &Client, url: &str) -> Result<Vec<u8>> {
    let response = client.get(url).send().await.map_err(|source| DepotError::Network {
        coord: None,
        url: url.to_string(),
        source,
    })?;
    let status = response.status();
    if status.is_client_error() {
        return Err(DepotError::Http4xx {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }
    if !status.is_success() {
        return Err(DepotError::ParseError {
            context: "http".to_string(),
            message: format!("unexpected status {status} for {url}"),
        });
    }
    response
        .bytes()
        .await
        .map(|b| b.to_vec())
        .map_err(|source| DepotError::Network { coord: None, url: url.to_string(), source })
}
