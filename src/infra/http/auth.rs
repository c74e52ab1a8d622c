//! Session-backed viewer extraction and the account forms.

use std::convert::Infallible;

use axum::{
    extract::{Form, FromRequestParts, Query, State},
    http::{StatusCode, Uri, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use tracing::{error, info};
use url::form_urlencoded;

use crate::{
    application::{
        accounts::{AccountError, IssuedSession, SignupForm},
        error::HttpError,
    },
    domain::entities::UserRecord,
    presentation::views::{
        LayoutContext, LoggedOutTemplate, LoginTemplate, LoginView, NavView, SignupTemplate,
        SignupView, render_template_response,
    },
};

use super::HttpState;

pub const LOGIN_PATH: &str = "/auth/login/";

/// The signed-in user for this request, if any.
#[derive(Clone, Debug, Default)]
pub struct Viewer(pub Option<UserRecord>);

impl Viewer {
    pub fn user(&self) -> Option<&UserRecord> {
        self.0.as_ref()
    }
}

impl<S> FromRequestParts<S> for Viewer
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<Viewer>().cloned().unwrap_or_default())
    }
}

/// A signed-in user. Anonymous requests are redirected to the login form.
#[derive(Clone, Debug)]
pub struct CurrentUser(pub UserRecord);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = Redirect;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<Viewer>().and_then(|viewer| viewer.0.clone()) {
            Some(user) => Ok(CurrentUser(user)),
            None => Err(Redirect::to(&login_redirect_target(&parts.uri))),
        }
    }
}

/// `/auth/login/?next=<path and query>` for the given original request target.
pub fn login_redirect_target(uri: &Uri) -> String {
    let target = uri
        .path_and_query()
        .map(|value| value.as_str())
        .unwrap_or("/");
    let encoded: String = form_urlencoded::byte_serialize(target.as_bytes()).collect();
    format!("{LOGIN_PATH}?next={}", encoded.replace("%2F", "/"))
}

/// Only same-site absolute paths are honoured as post-login targets.
fn safe_next(next: Option<&str>) -> Option<&str> {
    let next = next?.trim();
    let local = next.starts_with('/')
        && !next.starts_with("//")
        && !next.contains('\\')
        && !next.contains("://");
    local.then_some(next)
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct NextQuery {
    next: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct LoginFields {
    username: String,
    password: String,
    next: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct SignupFields {
    username: String,
    first_name: String,
    last_name: String,
    email: String,
    password1: String,
    password2: String,
}

fn session_cookie(state: &HttpState, session: &IssuedSession) -> Cookie<'static> {
    Cookie::build((state.session_cookie.name.clone(), session.token.clone()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .expires(session.expires_at)
        .build()
}

fn removal_cookie(state: &HttpState) -> Cookie<'static> {
    Cookie::build((state.session_cookie.name.clone(), ""))
        .path("/")
        .build()
}

pub(super) async fn login_form(viewer: Viewer, Query(query): Query<NextQuery>) -> Response {
    let content = LoginView {
        next: safe_next(query.next.as_deref()).unwrap_or_default().to_string(),
        ..LoginView::default()
    };
    let view = LayoutContext::new(NavView::new(viewer.user(), "login"), content);
    render_template_response(LoginTemplate { view }, StatusCode::OK)
}

pub(super) async fn login_submit(
    State(state): State<HttpState>,
    viewer: Viewer,
    jar: CookieJar,
    Query(query): Query<NextQuery>,
    Form(fields): Form<LoginFields>,
) -> Response {
    let next = fields.next.as_deref().or(query.next.as_deref());
    let next = safe_next(next).map(str::to_string);

    match state.accounts.login(&fields.username, &fields.password).await {
        Ok(session) => {
            info!(target = "yatube::auth", username = %session.user.username, "login succeeded");
            let jar = jar.add(session_cookie(&state, &session));
            let target = next.unwrap_or_else(|| "/".to_string());
            (jar, Redirect::to(&target)).into_response()
        }
        Err(AccountError::Validation(errors)) => {
            let content = LoginView {
                username: fields.username.trim().to_string(),
                next: next.unwrap_or_default(),
                errors,
            };
            let view = LayoutContext::new(NavView::new(viewer.user(), "login"), content);
            render_template_response(LoginTemplate { view }, StatusCode::OK)
        }
        Err(err) => HttpError::from(err).into_response(),
    }
}

pub(super) async fn signup_form(viewer: Viewer) -> Response {
    let view = LayoutContext::new(NavView::new(viewer.user(), "signup"), SignupView::default());
    render_template_response(SignupTemplate { view }, StatusCode::OK)
}

pub(super) async fn signup_submit(
    State(state): State<HttpState>,
    viewer: Viewer,
    jar: CookieJar,
    Form(fields): Form<SignupFields>,
) -> Response {
    let form = SignupForm {
        username: fields.username.clone(),
        first_name: fields.first_name.clone(),
        last_name: fields.last_name.clone(),
        email: fields.email.clone(),
        password1: fields.password1,
        password2: fields.password2,
    };

    match state.accounts.signup(form).await {
        Ok(session) => {
            let jar = jar.add(session_cookie(&state, &session));
            (jar, Redirect::to("/")).into_response()
        }
        Err(AccountError::Validation(errors)) => {
            let content = SignupView {
                username: fields.username.trim().to_string(),
                first_name: fields.first_name,
                last_name: fields.last_name,
                email: fields.email,
                errors,
            };
            let view = LayoutContext::new(NavView::new(viewer.user(), "signup"), content);
            render_template_response(SignupTemplate { view }, StatusCode::OK)
        }
        Err(err) => HttpError::from(err).into_response(),
    }
}

pub(super) async fn logout(State(state): State<HttpState>, jar: CookieJar) -> Response {
    if let Some(cookie) = jar.get(&state.session_cookie.name)
        && let Err(err) = state.accounts.logout(cookie.value()).await
    {
        error!(target = "yatube::auth", error = %err, "failed to revoke session");
    }

    let jar = jar.remove(removal_cookie(&state));
    let view = LayoutContext::new(NavView::anonymous(), ());
    (
        jar,
        render_template_response(LoggedOutTemplate { view }, StatusCode::OK),
    )
        .into_response()
}
