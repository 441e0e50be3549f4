//! HTTP client for the hosted list store.
//!
//! The store exposes one REST surface per logical collection, keyed by user
//! and by each item's natural key. [`HttpRemoteStore`] owns the connection
//! and token; typed per-collection handles implement the core
//! [`RemoteCollection`] trait on top of it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;
use std::time::Duration;

use watchdeck_core::errors::{Error as CoreError, Result as CoreResult};
use watchdeck_core::sync::{NaturalKeyed, RemoteCollection};

use crate::error::{RemoteStoreError, Result};

/// Default timeout for API requests.
const DEFAULT_TIMEOUT_SECS: u64 = 10;
const MAX_LOG_BODY_CHARS: usize = 512;

/// Watermark payload returned by the last-modified endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LastModifiedResponse {
    last_modified_at: Option<String>,
}

/// Client for the hosted store REST API.
#[derive(Debug, Clone)]
pub struct HttpRemoteStore {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl HttpRemoteStore {
    /// Create a new client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Base URL of the store API (e.g., "https://api.watchdeck.app")
    /// * `token` - Bearer token for the current session
    pub fn new(base_url: &str, token: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    /// A typed handle for one named collection.
    pub fn collection<T>(&self, name: &str) -> CollectionHandle<T> {
        CollectionHandle {
            store: self.clone(),
            name: name.to_string(),
            _marker: PhantomData,
        }
    }

    fn collection_url(&self, user_id: &str, collection: &str) -> String {
        format!(
            "{}/users/{}/collections/{}",
            self.base_url,
            urlencoding::encode(user_id),
            urlencoding::encode(collection)
        )
    }

    fn item_url(&self, user_id: &str, collection: &str, natural_key: &str) -> String {
        format!(
            "{}/items/{}",
            self.collection_url(user_id, collection),
            urlencoding::encode(natural_key)
        )
    }

    fn log_response(status: reqwest::StatusCode, body: &str) {
        if status.is_success() {
            debug!("store response status: {}", status);
            return;
        }
        let mut preview = body.chars().take(MAX_LOG_BODY_CHARS).collect::<String>();
        if body.chars().count() > MAX_LOG_BODY_CHARS {
            preview.push_str("...");
        }
        debug!("store response error ({}): {}", status, preview);
    }

    async fn send_json<B: Serialize, R: DeserializeOwned>(
        &self,
        method: reqwest::Method,
        url: &str,
        body: Option<&B>,
    ) -> Result<R> {
        let mut request = self
            .client
            .request(method, url)
            .bearer_auth(&self.token);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        Self::log_response(status, &text);

        if !status.is_success() {
            return Err(RemoteStoreError::api(status.as_u16(), text));
        }
        if text.is_empty() {
            // endpoints with empty bodies deserialize from null
            return Ok(serde_json::from_value(serde_json::Value::Null)?);
        }
        Ok(serde_json::from_str(&text)?)
    }
}

/// Typed view of one remote collection. Cheap to clone and share.
#[derive(Debug, Clone)]
pub struct CollectionHandle<T> {
    store: HttpRemoteStore,
    name: String,
    _marker: PhantomData<fn() -> T>,
}

impl<T> CollectionHandle<T> {
    fn unavailable(err: RemoteStoreError) -> CoreError {
        CoreError::remote_unavailable(err.to_string())
    }
}

#[async_trait]
impl<T> RemoteCollection<T> for CollectionHandle<T>
where
    T: NaturalKeyed + Serialize + DeserializeOwned + Send + Sync,
{
    async fn list(&self, user_id: &str) -> CoreResult<Vec<T>> {
        let url = self.store.collection_url(user_id, &self.name);
        self.store
            .send_json::<(), Vec<T>>(reqwest::Method::GET, &url, None)
            .await
            .map_err(Self::unavailable)
    }

    async fn upsert(&self, user_id: &str, item: &T) -> CoreResult<()> {
        let url = self
            .store
            .item_url(user_id, &self.name, &item.natural_key());
        self.store
            .send_json::<T, serde_json::Value>(reqwest::Method::PUT, &url, Some(item))
            .await
            .map_err(Self::unavailable)?;
        Ok(())
    }

    async fn delete(&self, user_id: &str, natural_key: &str) -> CoreResult<()> {
        let url = self.store.item_url(user_id, &self.name, natural_key);
        match self
            .store
            .send_json::<(), serde_json::Value>(reqwest::Method::DELETE, &url, None)
            .await
        {
            Ok(_) => Ok(()),
            // deleting an absent item is idempotent success
            Err(RemoteStoreError::Api { status: 404, .. }) => Ok(()),
            Err(e) => Err(Self::unavailable(e)),
        }
    }

    async fn replace_all(&self, user_id: &str, items: &[T]) -> CoreResult<()> {
        // one request; the server swaps the collection atomically, so a
        // failed replace never leaves a deleted-but-not-reinserted window
        let url = self.store.collection_url(user_id, &self.name);
        let body: Vec<&T> = items.iter().collect();
        self.store
            .send_json::<Vec<&T>, serde_json::Value>(reqwest::Method::PUT, &url, Some(&body))
            .await
            .map_err(Self::unavailable)?;
        Ok(())
    }

    async fn last_modified_at(&self, user_id: &str) -> CoreResult<Option<DateTime<Utc>>> {
        let url = format!(
            "{}/last-modified",
            self.store.collection_url(user_id, &self.name)
        );
        let response: LastModifiedResponse = self
            .store
            .send_json::<(), LastModifiedResponse>(reqwest::Method::GET, &url, None)
            .await
            .map_err(Self::unavailable)?;

        Ok(response
            .last_modified_at
            .and_then(|raw| DateTime::parse_from_rfc3339(&raw).ok())
            .map(|dt| dt.with_timezone(&Utc)))
    }
}
