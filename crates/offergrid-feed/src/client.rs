//! HTTP client for merchant feed endpoints (Shopify-format `products.json`).

use std::time::Duration;

use reqwest::{header::HeaderValue, Client, StatusCode};

use crate::error::FeedError;
use crate::retry::retry_with_backoff;
use crate::types::FeedProductsResponse;

/// Default wait before retrying a 429 that carried no `Retry-After` header.
const DEFAULT_RETRY_AFTER_SECS: u64 = 30;

/// HTTP client for a merchant's product feed.
///
/// Handles rate limiting (429), not-found (404), and other non-2xx responses
/// as typed errors. Transient errors (429, network failures) are
/// automatically retried with exponential backoff up to `max_retries`
/// additional attempts.
pub struct FeedClient {
    client: Client,
    /// Maximum number of retry attempts after the first failure.
    max_retries: u32,
    /// Base delay in seconds for exponential backoff: `backoff_base_secs * 2^attempt`.
    backoff_base_secs: u64,
}

impl FeedClient {
    /// Creates a `FeedClient` with configured timeout, `User-Agent`, and retry policy.
    ///
    /// `max_retries` is the number of additional attempts after the first
    /// failure for retriable errors (429, network errors). Set to `0` to
    /// disable retries.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed (e.g., invalid TLS config).
    pub fn new(
        timeout_secs: u64,
        user_agent: &str,
        max_retries: u32,
        backoff_base_secs: u64,
    ) -> Result<Self, FeedError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;
        Ok(Self {
            client,
            max_retries,
            backoff_base_secs,
        })
    }

    /// Fetches the merchant's full product list as raw JSON values, with
    /// automatic retry on transient errors.
    ///
    /// `access_token`, when present, is sent as the `X-Shopify-Access-Token`
    /// header; public storefront feeds need no token.
    ///
    /// # Errors
    ///
    /// - [`FeedError::InvalidStoreUrl`] if `store_url` is empty or not http(s).
    /// - [`FeedError::NotFound`] on 404.
    /// - [`FeedError::RateLimited`] on 429 after retries are exhausted.
    /// - [`FeedError::UnexpectedStatus`] on any other non-2xx status.
    /// - [`FeedError::Deserialize`] if the body is not a products payload.
    /// - [`FeedError::Http`] on network-level failures after retries.
    pub async fn fetch_products(
        &self,
        store_url: &str,
        access_token: Option<&str>,
    ) -> Result<Vec<serde_json::Value>, FeedError> {
        let url = products_url(store_url)?;

        retry_with_backoff(self.max_retries, self.backoff_base_secs, || {
            self.fetch_products_once(&url, access_token)
        })
        .await
    }

    async fn fetch_products_once(
        &self,
        url: &str,
        access_token: Option<&str>,
    ) -> Result<Vec<serde_json::Value>, FeedError> {
        let mut request = self.client.get(url);
        if let Some(token) = access_token {
            request = request.header("X-Shopify-Access-Token", token);
        }

        let response = request.send().await?;
        let status = response.status();

        match status {
            StatusCode::NOT_FOUND => {
                return Err(FeedError::NotFound {
                    url: url.to_string(),
                })
            }
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after_secs = response
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v: &HeaderValue| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
                return Err(FeedError::RateLimited {
                    domain: domain_of(url),
                    retry_after_secs,
                });
            }
            s if !s.is_success() => {
                return Err(FeedError::UnexpectedStatus {
                    status: s.as_u16(),
                    url: url.to_string(),
                })
            }
            _ => {}
        }

        let body = response.text().await?;
        let parsed: FeedProductsResponse =
            serde_json::from_str(&body).map_err(|source| FeedError::Deserialize {
                context: format!("products payload from {url}"),
                source,
            })?;

        Ok(parsed.products)
    }
}

/// Builds the `products.json` URL from a configured store URL.
fn products_url(store_url: &str) -> Result<String, FeedError> {
    let trimmed = store_url.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(FeedError::InvalidStoreUrl {
            store_url: store_url.to_string(),
            reason: "store URL is empty".to_string(),
        });
    }
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(FeedError::InvalidStoreUrl {
            store_url: store_url.to_string(),
            reason: "store URL must start with http:// or https://".to_string(),
        });
    }
    Ok(format!("{trimmed}/products.json"))
}

fn domain_of(url: &str) -> String {
    url.trim_start_matches("https://")
        .trim_start_matches("http://")
        .split('/')
        .next()
        .unwrap_or(url)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn products_url_appends_endpoint() {
        assert_eq!(
            products_url("https://shop.example.com").unwrap(),
            "https://shop.example.com/products.json"
        );
    }

    #[test]
    fn products_url_strips_trailing_slash() {
        assert_eq!(
            products_url("https://shop.example.com/").unwrap(),
            "https://shop.example.com/products.json"
        );
    }

    #[test]
    fn products_url_rejects_empty() {
        let err = products_url("   ").unwrap_err();
        assert!(matches!(err, FeedError::InvalidStoreUrl { .. }));
    }

    #[test]
    fn products_url_rejects_missing_scheme() {
        let err = products_url("shop.example.com").unwrap_err();
        assert!(matches!(err, FeedError::InvalidStoreUrl { .. }));
    }

    #[test]
    fn domain_of_extracts_host() {
        assert_eq!(
            domain_of("https://shop.example.com/products.json"),
            "shop.example.com"
        );
    }
}
