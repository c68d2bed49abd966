use anyhow::{Context, Result};
use reqwest::Client;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use std::time::Duration;
use url::Url;

pub struct HttpClientFactory;

impl HttpClientFactory {
    /// Creates a new HTTP client with retry middleware
    pub fn create_client() -> ClientWithMiddleware {
        Self::create_client_with_timeout(Duration::from_secs(30))
    }

    /// Same as [`create_client`](Self::create_client) with a custom request
    /// timeout. Long-polling clients need one longer than their poll window.
    pub fn create_client_with_timeout(timeout: Duration) -> ClientWithMiddleware {
        // Exponential backoff, max 3 retries on transient failures
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(3);

        let client = Client::builder()
            .pool_max_idle_per_host(5)
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| Client::new());

        ClientBuilder::new(client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build()
    }

    /// Plain client for requests that must not be repeated, such as posting
    /// a chat message: a retry after a timeout can deliver it twice.
    pub fn create_client_without_retry(timeout: Duration) -> ClientWithMiddleware {
        let client = Client::builder()
            .pool_max_idle_per_host(5)
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| Client::new());

        ClientBuilder::new(client).build()
    }
}

/// Joins `path` onto `base_url` and appends URL-encoded query parameters.
pub fn build_url_with_query<K, V>(base_url: &str, path: &str, params: &[(K, V)]) -> Result<Url>
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let raw = format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    let mut url = Url::parse(&raw).with_context(|| format!("Invalid URL: {}", raw))?;
    if !params.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (k, v) in params {
            pairs.append_pair(k.as_ref(), v.as_ref());
        }
    }
    Ok(url)
}
