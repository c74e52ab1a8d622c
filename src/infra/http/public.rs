//! Router assembly and the read-only public pages.

use std::io::ErrorKind;

use axum::{
    Router,
    body::Body,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{
        HeaderValue, StatusCode,
        header::{CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE},
    },
    middleware,
    response::{IntoResponse, Response},
    routing::get,
};
use bytes::Bytes;
use serde::Deserialize;
use tracing::error;

use crate::{
    application::error::HttpError,
    infra::uploads::UploadStorageError,
    presentation::views::{
        FeedView, GroupTemplate, GroupView, IndexTemplate, LayoutContext, NavView,
        PostDetailTemplate, PostDetailView, ProfileTemplate, ProfileView,
        render_not_found_response, render_template_response,
    },
};

use super::{
    HttpState, Viewer, auth, db_health_response, follows,
    middleware::{cache_index_page, log_responses, resolve_viewer, set_request_context},
    posts,
};

pub fn build_router(state: HttpState) -> Router {
    let index = get(index).layer(middleware::from_fn_with_state(
        state.clone(),
        cache_index_page,
    ));

    Router::new()
        .route("/", index)
        .route("/group/{slug}/", get(group_posts))
        .route("/profile/{username}/", get(profile))
        .route("/profile/{username}/follow/", get(follows::profile_follow))
        .route("/profile/{username}/unfollow/", get(follows::profile_unfollow))
        .route("/follow/", get(follows::follow_index))
        .route("/posts/{id}/", get(post_detail))
        .route(
            "/posts/{id}/edit/",
            get(posts::edit_form).post(posts::edit_submit),
        )
        .route("/posts/{id}/comment/", axum::routing::post(posts::add_comment))
        .route(
            "/create/",
            get(posts::create_form).post(posts::create_submit),
        )
        .route(
            "/auth/signup/",
            get(auth::signup_form).post(auth::signup_submit),
        )
        .route(
            "/auth/login/",
            get(auth::login_form).post(auth::login_submit),
        )
        .route("/auth/logout/", get(auth::logout).post(auth::logout))
        .route("/media/{*path}", get(serve_media))
        .route("/_health/db", get(db_health))
        .fallback(fallback)
        .layer(DefaultBodyLimit::max(state.max_request_bytes))
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn_with_state(state.clone(), resolve_viewer))
        .layer(middleware::from_fn(set_request_context))
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct PageQuery {
    pub(super) page: Option<String>,
}

async fn index(
    State(state): State<HttpState>,
    viewer: Viewer,
    Query(query): Query<PageQuery>,
) -> Response {
    let request = state.feed.page_request(query.page.as_deref());
    match state.feed.index(request).await {
        Ok(page) => {
            let view = LayoutContext::new(
                NavView::new(viewer.user(), "index"),
                FeedView::from_page(page),
            );
            render_template_response(IndexTemplate { view }, StatusCode::OK)
        }
        Err(err) => HttpError::from(err).into_response(),
    }
}

async fn group_posts(
    State(state): State<HttpState>,
    viewer: Viewer,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
) -> Response {
    let request = state.feed.page_request(query.page.as_deref());
    match state.feed.group_posts(&slug, request).await {
        Ok(feed) => {
            let view = LayoutContext::new(NavView::new(viewer.user(), ""), GroupView::from(feed));
            render_template_response(GroupTemplate { view }, StatusCode::OK)
        }
        Err(err) => HttpError::from(err).into_response(),
    }
}

async fn profile(
    State(state): State<HttpState>,
    viewer: Viewer,
    Path(username): Path<String>,
    Query(query): Query<PageQuery>,
) -> Response {
    let request = state.feed.page_request(query.page.as_deref());
    match state.feed.profile(&username, viewer.user(), request).await {
        Ok(feed) => {
            let content = ProfileView::new(feed, viewer.user().is_some());
            let view = LayoutContext::new(NavView::new(viewer.user(), ""), content);
            render_template_response(ProfileTemplate { view }, StatusCode::OK)
        }
        Err(err) => HttpError::from(err).into_response(),
    }
}

async fn post_detail(
    State(state): State<HttpState>,
    viewer: Viewer,
    Path(id): Path<String>,
) -> Response {
    let Ok(id) = id.parse::<i64>() else {
        return render_not_found_response();
    };
    match state.feed.post_detail(id).await {
        Ok(detail) => {
            let content = PostDetailView::new(detail, viewer.user());
            let view = LayoutContext::new(NavView::new(viewer.user(), ""), content);
            render_template_response(PostDetailTemplate { view }, StatusCode::OK)
        }
        Err(err) => HttpError::from(err).into_response(),
    }
}

async fn serve_media(State(state): State<HttpState>, Path(path): Path<String>) -> Response {
    const SOURCE: &str = "infra::http::public::serve_media";

    match state.uploads.read(&path).await {
        Ok(bytes) => build_media_response(&path, bytes),
        Err(UploadStorageError::InvalidPath) => {
            HttpError::not_found(SOURCE, "Media path rejected").into_response()
        }
        Err(UploadStorageError::Io(err)) if err.kind() == ErrorKind::NotFound => {
            HttpError::not_found(SOURCE, "Media file missing").into_response()
        }
        Err(err) => {
            error!(target = SOURCE, path = %path, error = %err, "failed to read media file");
            HttpError::internal(SOURCE, &err).into_response()
        }
    }
}

fn build_media_response(path: &str, bytes: Bytes) -> Response {
    let length = bytes.len();
    let mut response = Response::new(Body::from(bytes));

    let headers = response.headers_mut();
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    if let Ok(value) = HeaderValue::from_str(mime.as_ref()) {
        headers.insert(CONTENT_TYPE, value);
    }
    headers.insert(CONTENT_LENGTH, HeaderValue::from(length));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("public, max-age=86400"));
    response
}

async fn db_health(State(state): State<HttpState>) -> Response {
    db_health_response(state.health.health_check().await)
}

async fn fallback() -> Response {
    render_not_found_response()
}
