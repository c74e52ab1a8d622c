use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::{Method, Request},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use metrics::counter;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::{
    application::{accounts::SessionAuthError, error::ErrorReport},
    infra::{
        cache::{index_page_key, should_store_response},
        telemetry::{INDEX_CACHE_HIT, INDEX_CACHE_MISS, INDEX_CACHE_STORE_FAILED},
    },
};

use super::{HttpState, Viewer};

#[derive(Clone)]
pub struct RequestContext {
    pub request_id: String,
}

pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let ctx = RequestContext {
        request_id: Uuid::new_v4().to_string(),
    };
    request.extensions_mut().insert(ctx.clone());

    let mut response = next.run(request).await;
    response.extensions_mut().insert(ctx);
    response
}

pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let request_id = request
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| ctx.request_id.clone())
        .unwrap_or_default();
    let viewer = request
        .extensions()
        .get::<Viewer>()
        .and_then(|viewer| viewer.0.as_ref().map(|user| user.username.clone()))
        .unwrap_or_default();

    let mut response = next.run(request).await;
    let status = response.status();

    if status.is_client_error() || status.is_server_error() {
        let elapsed_ms = start.elapsed().as_millis();
        let report = response.extensions_mut().remove::<ErrorReport>();
        let (source, messages) = match report {
            Some(report) => (report.source, report.messages),
            None => ("unknown", Vec::new()),
        };
        let detail = messages
            .first()
            .cloned()
            .unwrap_or_else(|| "no diagnostic available".to_string());

        if status.is_server_error() {
            error!(
                target = "yatube::http::response",
                status = status.as_u16(),
                method = %method,
                path = %uri.path(),
                query = uri.query().unwrap_or(""),
                elapsed_ms = elapsed_ms,
                source = source,
                detail = %detail,
                chain = ?messages,
                request_id = request_id,
                viewer = viewer,
                "request failed",
            );
        } else {
            warn!(
                target = "yatube::http::response",
                status = status.as_u16(),
                method = %method,
                path = %uri.path(),
                query = uri.query().unwrap_or(""),
                elapsed_ms = elapsed_ms,
                source = source,
                detail = %detail,
                chain = ?messages,
                request_id = request_id,
                viewer = viewer,
                "client request error",
            );
        }
    }

    response
}

/// Resolve the session cookie into a [`Viewer`] request extension.
pub async fn resolve_viewer(
    State(state): State<HttpState>,
    jar: CookieJar,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let viewer = match jar.get(&state.session_cookie.name) {
        Some(cookie) => match state.accounts.authenticate(cookie.value()).await {
            Ok(user) => Some(user),
            Err(SessionAuthError::Repo(err)) => {
                error!(
                    target = "yatube::http::session",
                    error = %err,
                    "failed to resolve session"
                );
                None
            }
            Err(err) => {
                debug!(target = "yatube::http::session", reason = %err, "ignoring session cookie");
                None
            }
        },
        None => None,
    };

    request.extensions_mut().insert(Viewer(viewer));
    next.run(request).await
}

/// Serve the index page from the page cache while the stored copy is fresh.
pub async fn cache_index_page(
    State(state): State<HttpState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let Some(cache) = state.page_cache.clone() else {
        return next.run(request).await;
    };
    if request.method() != Method::GET {
        return next.run(request).await;
    }

    let viewer_id = request
        .extensions()
        .get::<Viewer>()
        .and_then(|viewer| viewer.0.as_ref().map(|user| user.id));
    let uri = request
        .uri()
        .path_and_query()
        .map(|value| value.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());
    let key = index_page_key(viewer_id, &uri);

    if let Some(cached) = cache.get(&key).await {
        counter!(INDEX_CACHE_HIT).increment(1);
        debug!(target = "yatube::cache", key = %key, outcome = "hit", "serving cached page");
        return cached;
    }

    counter!(INDEX_CACHE_MISS).increment(1);
    debug!(target = "yatube::cache", key = %key, outcome = "miss", "rendering page");

    let response = next.run(request).await;
    if !should_store_response(&response) {
        return response;
    }

    match cache.store_response(&key, response).await {
        Ok(response) => response,
        Err((response, err)) => {
            counter!(INDEX_CACHE_STORE_FAILED).increment(1);
            warn!(target = "yatube::cache", key = %key, error = %err, "failed to cache page");
            response
        }
    }
}
