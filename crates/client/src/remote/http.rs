//! HTTP implementations of the remote collaborator traits.
//!
//! Thin `reqwest` clients against the storefront REST backend. Errors are
//! returned to the engines, which apply their own policies; nothing here
//! retries or swallows.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::Deserialize;
use url::Url;

use cloudberry_core::ProductRef;

use super::{RemoteCart, RemoteCartLine, RemoteError, RemoteFavorites};
use crate::config::ClientConfig;

/// Wrapper for list responses from the backend.
#[derive(Debug, Deserialize)]
struct ItemsResponse<T> {
    items: Vec<T>,
}

/// Build the shared HTTP client with default headers.
fn build_client(config: &ClientConfig) -> Result<reqwest::Client, RemoteError> {
    let mut headers = HeaderMap::new();
    if let Some(token) = &config.api_token {
        let value = format!("Bearer {}", token.expose_secret());
        headers.insert(
            "Authorization",
            HeaderValue::from_str(&value)
                .map_err(|e| RemoteError::Parse(format!("Invalid API token format: {e}")))?,
        );
    }
    Ok(reqwest::Client::builder().default_headers(headers).build()?)
}

/// Join path segments onto the configured base URL.
///
/// Segments are percent-encoded, so product references are safe in paths.
fn endpoint(base: &Url, segments: &[&str]) -> Result<Url, RemoteError> {
    let mut url = base.clone();
    {
        let mut path = url
            .path_segments_mut()
            .map_err(|()| RemoteError::Parse("API base URL cannot be a base".to_string()))?;
        path.pop_if_empty();
        path.extend(segments);
    }
    Ok(url)
}

/// Map a non-success response to `RemoteError::Api`.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(RemoteError::Api {
        status: status.as_u16(),
        message,
    })
}

/// HTTP client for the remote cart API.
#[derive(Clone)]
pub struct HttpCartApi {
    client: reqwest::Client,
    base: Url,
}

impl HttpCartApi {
    /// Create a cart API client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build or the token is
    /// malformed.
    pub fn new(config: &ClientConfig) -> Result<Self, RemoteError> {
        Ok(Self {
            client: build_client(config)?,
            base: config.api_base_url.clone(),
        })
    }
}

#[async_trait]
impl RemoteCart for HttpCartApi {
    async fn fetch_cart(&self) -> Result<Vec<RemoteCartLine>, RemoteError> {
        let url = endpoint(&self.base, &["api", "cart"])?;
        let response = check_status(self.client.get(url).send().await?).await?;
        let body: ItemsResponse<RemoteCartLine> = response
            .json()
            .await
            .map_err(|e| RemoteError::Parse(e.to_string()))?;
        Ok(body.items)
    }

    async fn set_line(&self, product: &ProductRef, quantity: u32) -> Result<(), RemoteError> {
        let url = endpoint(&self.base, &["api", "cart", "items", product.as_str()])?;
        let body = serde_json::json!({ "quantity": quantity });
        check_status(self.client.put(url).json(&body).send().await?).await?;
        Ok(())
    }

    async fn remove_line(&self, product: &ProductRef) -> Result<(), RemoteError> {
        let url = endpoint(&self.base, &["api", "cart", "items", product.as_str()])?;
        check_status(self.client.delete(url).send().await?).await?;
        Ok(())
    }

    async fn clear(&self) -> Result<(), RemoteError> {
        let url = endpoint(&self.base, &["api", "cart"])?;
        check_status(self.client.delete(url).send().await?).await?;
        Ok(())
    }
}

/// HTTP client for the remote favorites API.
#[derive(Clone)]
pub struct HttpFavoritesApi {
    client: reqwest::Client,
    base: Url,
}

impl HttpFavoritesApi {
    /// Create a favorites API client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build or the token is
    /// malformed.
    pub fn new(config: &ClientConfig) -> Result<Self, RemoteError> {
        Ok(Self {
            client: build_client(config)?,
            base: config.api_base_url.clone(),
        })
    }
}

#[async_trait]
impl RemoteFavorites for HttpFavoritesApi {
    async fn fetch_favorites(&self) -> Result<Vec<ProductRef>, RemoteError> {
        let url = endpoint(&self.base, &["api", "favorites"])?;
        let response = check_status(self.client.get(url).send().await?).await?;
        let body: ItemsResponse<ProductRef> = response
            .json()
            .await
            .map_err(|e| RemoteError::Parse(e.to_string()))?;
        Ok(body.items)
    }

    async fn add(&self, product: &ProductRef) -> Result<(), RemoteError> {
        let url = endpoint(&self.base, &["api", "favorites", product.as_str()])?;
        check_status(self.client.put(url).send().await?).await?;
        Ok(())
    }

    async fn remove(&self, product: &ProductRef) -> Result<(), RemoteError> {
        let url = endpoint(&self.base, &["api", "favorites", product.as_str()])?;
        check_status(self.client.delete(url).send().await?).await?;
        Ok(())
    }
}
