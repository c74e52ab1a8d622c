mod auth;
mod follows;
mod forms;
mod middleware;
mod posts;
mod public;

pub use auth::{CurrentUser, Viewer, login_redirect_target};
pub use public::build_router;

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::application::{
    accounts::AccountService, error::ErrorReport, feed::FeedService, follows::FollowService,
    posts::PostService, repos::HealthRepo, repos::RepoError,
};
use crate::infra::{cache::PageCache, uploads::UploadStorage};

/// Session cookie attributes shared by the login, signup and logout handlers.
#[derive(Clone, Debug)]
pub struct SessionCookieConfig {
    pub name: String,
    pub ttl: Duration,
}

#[derive(Clone)]
pub struct HttpState {
    pub feed: Arc<FeedService>,
    pub posts: Arc<PostService>,
    pub follows: Arc<FollowService>,
    pub accounts: Arc<AccountService>,
    pub health: Arc<dyn HealthRepo>,
    pub uploads: Arc<UploadStorage>,
    /// `None` disables the index page cache.
    pub page_cache: Option<PageCache>,
    pub session_cookie: SessionCookieConfig,
    pub max_request_bytes: usize,
}

fn db_health_response(result: Result<(), RepoError>) -> Response {
    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
            ErrorReport::from_error(
                "infra::http::db_health",
                StatusCode::SERVICE_UNAVAILABLE,
                &err,
            )
            .attach(&mut response);
            response
        }
    }
}
