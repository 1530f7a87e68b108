//! Whole-response page cache for the home feed.
//!
//! Responses are cached keyed by request URL (path + query) for a fixed TTL.
//! Entries expire naturally or are cleared explicitly; nothing invalidates
//! them on writes, so a freshly published post may stay invisible on the
//! home feed for up to one TTL. That staleness window is accepted.

use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use axum::{
    body::Body,
    extract::State,
    http::{HeaderName, HeaderValue, Method, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use bytes::Bytes;
use http_body_util::BodyExt;
use metrics::counter;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct PageCache {
    ttl: Duration,
    entries: Arc<RwLock<HashMap<String, CacheEntry>>>,
}

struct CacheEntry {
    stored_at: Instant,
    response: CachedResponse,
}

impl PageCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fetch a live entry; expired entries are dropped and count as misses.
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

        // Entry exists but expired; evict it under the write lock.
        let mut guard = self.entries.write().await;
        if let Some(entry) = guard.get(key)
            && entry.stored_at.elapsed() >= self.ttl
        {
            guard.remove(key);
        }
        None
    }

    pub async fn put(&self, key: String, response: CachedResponse) {
        let mut guard = self.entries.write().await;
        guard.insert(
            key,
            CacheEntry {
                stored_at: Instant::now(),
                response,
            },
        );
    }

    /// Buffer and store a response, handing back an equivalent response for
    /// the client.
    pub async fn store_response(
        &self,
        key: &str,
        response: Response,
    ) -> Result<Response, (Response, CacheStoreError)> {
        match buffer_response(response).await {
            Ok((rebuilt, cached)) => {
                self.put(key.to_string(), cached).await;
                Ok(rebuilt)
            }
            Err((rebuilt, error)) => Err((rebuilt, error)),
        }
    }

    /// Drop every entry. Exists for tests and operational hooks; normal
    /// operation relies on expiry alone.
    pub async fn invalidate_all(&self) {
        let mut guard = self.entries.write().await;
        guard.clear();
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[derive(Clone)]
pub struct CachedResponse {
    status: StatusCode,
    headers: Vec<(HeaderName, HeaderValue)>,
    body: Bytes,
}

impl CachedResponse {
    pub fn new(status: StatusCode, headers: &axum::http::HeaderMap, body: Bytes) -> Self {
        let mut stored_headers = Vec::with_capacity(headers.len());
        for (name, value) in headers.iter() {
            stored_headers.push((name.clone(), value.clone()));
        }

        Self {
            status,
            headers: stored_headers,
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

/// Only plain successful pages are cacheable; responses that set cookies or
/// stream are passed through untouched.
pub fn should_store_response(response: &Response) -> bool {
    use axum::http::header;

    if response.status() != StatusCode::OK {
        return false;
    }

    if response.headers().contains_key(header::SET_COOKIE) {
        return false;
    }

    if response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("text/event-stream"))
    {
        return false;
    }

    true
}

pub async fn buffer_response(
    response: Response,
) -> Result<(Response, CachedResponse), (Response, CacheStoreError)> {
    let (parts, body) = response.into_parts();
    match BodyExt::collect(body).await {
        Ok(collected) => {
            let bytes = collected.to_bytes();
            let cached = CachedResponse::new(parts.status, &parts.headers, bytes.clone());
            let rebuilt = Response::from_parts(parts, Body::from(bytes));
            Ok((rebuilt, cached))
        }
        Err(error) => {
            let rebuilt = Response::from_parts(parts, Body::empty());
            Err((rebuilt, CacheStoreError::Buffer(error.to_string())))
        }
    }
}

/// Middleware caching GET responses keyed by request URL.
pub async fn page_cache_layer(
    State(cache): State<PageCache>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if request.method() != Method::GET {
        return next.run(request).await;
    }

    let key = match request.uri().query() {
        Some(query) => format!("{}?{query}", request.uri().path()),
        None => request.uri().path().to_string(),
    };

    if let Some(cached) = cache.get(&key).await {
        counter!("canto_page_cache_hit_total").increment(1);
        debug!(target = "canto::cache", key = %key, outcome = "hit", "serving cached page");
        return cached;
    }

    counter!("canto_page_cache_miss_total").increment(1);
    let response = next.run(request).await;

    if !should_store_response(&response) {
        return response;
    }

    match cache.store_response(&key, response).await {
        Ok(rebuilt) => {
            counter!("canto_page_cache_store_total").increment(1);
            rebuilt
        }
        Err((rebuilt, error)) => {
            warn!(target = "canto::cache", key = %key, error = %error, "failed to cache page");
            rebuilt
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::{CONTENT_TYPE, SET_COOKIE};
    use axum::response::IntoResponse;

    fn html_response(body: &'static str) -> Response {
        (StatusCode::OK, [(CONTENT_TYPE, "text/html")], body).into_response()
    }

    #[tokio::test]
    async fn cached_page_roundtrip() {
        let cache = PageCache::new(Duration::from_secs(20));
        assert!(cache.get("/").await.is_none());

        cache
            .store_response("/", html_response("<html>feed</html>"))
            .await
            .expect("storing should succeed");

        let cached = cache.get("/").await.expect("entry should be live");
        assert_eq!(cached.status(), StatusCode::OK);
        assert_eq!(cache.len().await, 1);

        cache.invalidate_all().await;
        assert!(cache.get("/").await.is_none());
    }

    #[tokio::test]
    async fn entries_expire_after_ttl() {
        let cache = PageCache::new(Duration::from_millis(30));
        cache
            .store_response("/", html_response("stale soon"))
            .await
            .expect("storing should succeed");

        assert!(cache.get("/").await.is_some());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(cache.get("/").await.is_none());
        // Expired entry is evicted, not retained.
        assert_eq!(cache.len().await, 0);
    }

    #[tokio::test]
    async fn keys_distinguish_query_strings() {
        let cache = PageCache::new(Duration::from_secs(20));
        cache
            .store_response("/?page=1", html_response("page one"))
            .await
            .expect("storing should succeed");

        assert!(cache.get("/?page=1").await.is_some());
        assert!(cache.get("/?page=2").await.is_none());
        assert!(cache.get("/").await.is_none());
    }

    #[test]
    fn cookie_setting_responses_are_not_cacheable() {
        let response = (
            StatusCode::OK,
            [(SET_COOKIE, "session=abc")],
            "logged in",
        )
            .into_response();
        assert!(!should_store_response(&response));
    }

    #[test]
    fn non_ok_responses_are_not_cacheable() {
        let response = (StatusCode::NOT_FOUND, "missing").into_response();
        assert!(!should_store_response(&response));

        let redirect = axum::response::Redirect::to("/").into_response();
        assert!(!should_store_response(&redirect));
    }
}
