use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};

use crate::{
    application::error::HttpError,
    presentation::views::{
        FeedView, FollowIndexTemplate, LayoutContext, NavView, render_template_response,
    },
};

use super::{CurrentUser, HttpState, public::PageQuery};

pub(super) async fn follow_index(
    State(state): State<HttpState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<PageQuery>,
) -> Response {
    let request = state.feed.page_request(query.page.as_deref());
    match state.feed.follow_index(&user, request).await {
        Ok(page) => {
            let view = LayoutContext::new(
                NavView::new(Some(&user), "follow"),
                FeedView::from_page(page),
            );
            render_template_response(FollowIndexTemplate { view }, StatusCode::OK)
        }
        Err(err) => HttpError::from(err).into_response(),
    }
}

pub(super) async fn profile_follow(
    State(state): State<HttpState>,
    CurrentUser(user): CurrentUser,
    Path(username): Path<String>,
) -> Response {
    match state.follows.follow(&user, &username).await {
        Ok(_) => Redirect::to(&format!("/profile/{username}/")).into_response(),
        Err(err) => HttpError::from(err).into_response(),
    }
}

pub(super) async fn profile_unfollow(
    State(state): State<HttpState>,
    CurrentUser(user): CurrentUser,
    Path(username): Path<String>,
) -> Response {
    match state.follows.unfollow(&user, &username).await {
        Ok(_) => Redirect::to(&format!("/profile/{username}/")).into_response(),
        Err(err) => HttpError::from(err).into_response(),
    }
}
