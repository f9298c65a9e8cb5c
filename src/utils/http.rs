// src/utils/http.rs

//! HTTP client utilities.

use std::time::Duration;

use crate::error::{AppError, Result};
use crate::models::CrawlerConfig;

/// Create the shared asynchronous HTTP client.
///
/// The timeout applies to every request made through it, so no upstream
/// fetch, notification or alert can block a cycle indefinitely.
pub fn create_async_client(config: &CrawlerConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;
    Ok(client)
}

/// Download raw bytes, retrying transport failures up to `retries` extra times.
pub async fn fetch_bytes_with_retry(
    client: &reqwest::Client,
    url: &str,
    retries: u32,
) -> Result<Vec<u8>> {
    let mut attempt = 0;
    loop {
        let result = async {
            let response = client.get(url).send().await?.error_for_status()?;
            Ok::<_, AppError>(response.bytes().await?.to_vec())
        }
        .await;

        match result {
            Ok(bytes) => return Ok(bytes),
            Err(e) if attempt < retries => {
                attempt += 1;
                log::warn!(
                    "Download of {} failed ({}), retry {}/{}",
                    url,
                    e,
                    attempt,
                    retries
                );
                tokio::time::sleep(Duration::from_millis(500 * u64::from(attempt))).await;
            }
            Err(e) => return Err(e),
        }
    }
}
