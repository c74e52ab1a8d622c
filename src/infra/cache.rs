//! Time-bounded cache of rendered pages.
//!
//! Entries expire after the configured TTL and are otherwise only dropped by
//! [`PageCache::clear`]. Writes to posts do not touch the cache.

use std::{collections::HashMap, sync::Arc, time::Duration};

use axum::{
    body::Body,
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header},
    response::Response,
};
use bytes::Bytes;
use http_body_util::BodyExt;
use thiserror::Error;
use tokio::{sync::RwLock, time::Instant};

pub const INDEX_PAGE_PREFIX: &str = "index_page";

#[derive(Clone)]
pub struct PageCache {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
    ttl: Duration,
}

#[derive(Clone)]
struct Entry {
    stored_at: Instant,
    response: CachedResponse,
}

impl PageCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fresh entry for `key`, if any. Expired entries are evicted on read.
    pub async fn get(&self, key: &str) -> Option<Response<Body>> {
        {
            let guard = self.entries.read().await;
            match guard.get(key) {
                Some(entry) if entry.stored_at.elapsed() < self.ttl => {
                    return Some(entry.response.clone().into_response());
                }
                Some(_) => {}
                None => return None,
            }
        }

        let mut guard = self.entries.write().await;
        if guard
            .get(key)
            .is_some_and(|entry| entry.stored_at.elapsed() >= self.ttl)
        {
            guard.remove(key);
        }
        None
    }

    pub async fn put(&self, key: String, response: CachedResponse) {
        let mut guard = self.entries.write().await;
        guard.insert(
            key,
            Entry {
                stored_at: Instant::now(),
                response,
            },
        );
    }

    /// Buffer `response`, store it under `key` and hand back an equivalent response.
    pub async fn store_response(
        &self,
        key: &str,
        response: Response,
    ) -> Result<Response, (Response, CacheStoreError)> {
        let (rebuilt, cached) = buffer_response(response).await?;
        self.put(key.to_string(), cached).await;
        Ok(rebuilt)
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Key for the index page as seen by `viewer` at `uri` (path and query).
pub fn index_page_key(viewer: Option<i64>, uri: &str) -> String {
    match viewer {
        Some(id) => format!("{INDEX_PAGE_PREFIX}:{id}:{uri}"),
        None => format!("{INDEX_PAGE_PREFIX}:anon:{uri}"),
    }
}

#[derive(Clone)]
pub struct CachedResponse {
    status: StatusCode,
    headers: Vec<(HeaderName, HeaderValue)>,
    body: Bytes,
}

impl CachedResponse {
    pub fn new(status: StatusCode, headers: &HeaderMap, body: Bytes) -> Self {
        Self {
            status,
            headers: headers
                .iter()
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect(),
            body,
        }
    }

    fn into_response(self) -> Response<Body> {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;

        let headers = response.headers_mut();
        headers.clear();
        for (name, value) in self.headers {
            headers.append(name, value);
        }
        response
    }
}

#[derive(Debug, Error)]
pub enum CacheStoreError {
    #[error("failed to buffer response body: {0}")]
    Buffer(String),
}

/// Only plain successful pages are cached; anything setting a cookie is per-client.
pub fn should_store_response(response: &Response) -> bool {
    response.status() == StatusCode::OK && !response.headers().contains_key(header::SET_COOKIE)
}

pub async fn buffer_response(
    response: Response,
) -> Result<(Response, CachedResponse), (Response, CacheStoreError)> {
    let (parts, body) = response.into_parts();
    match BodyExt::collect(body).await {
        Ok(collected) => {
            let bytes = collected.to_bytes();
            let cached = CachedResponse::new(parts.status, &parts.headers, bytes.clone());
            Ok((Response::from_parts(parts, Body::from(bytes)), cached))
        }
        Err(error) => Err((
            Response::from_parts(parts, Body::empty()),
            CacheStoreError::Buffer(error.to_string()),
        )),
    }
}
