use std::error::Error as StdError;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{
    application::{
        accounts::AccountError, feed::FeedError, follows::FollowError, groups::GroupError,
        posts::PostError,
    },
    infra::error::InfraError,
    presentation::views,
};

/// Error chain attached to failed responses for the logging middleware.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = vec![error.to_string()];
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn from_message(
        source: &'static str,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source,
            status,
            messages: vec![message.into()],
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

/// Handler-facing error. 404s render the not-found page; everything else is plain text.
#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    public_message: &'static str,
    report: ErrorReport,
}

const INTERNAL: &str = "Internal server error";

impl HttpError {
    pub fn new(
        source: &'static str,
        status: StatusCode,
        public_message: &'static str,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            status,
            public_message,
            report: ErrorReport::from_message(source, status, detail),
        }
    }

    pub fn from_error(
        source: &'static str,
        status: StatusCode,
        public_message: &'static str,
        error: &dyn StdError,
    ) -> Self {
        Self {
            status,
            public_message,
            report: ErrorReport::from_error(source, status, error),
        }
    }

    pub fn not_found(source: &'static str, detail: impl Into<String>) -> Self {
        Self::new(source, StatusCode::NOT_FOUND, "Not found", detail)
    }

    pub fn internal(source: &'static str, error: &dyn StdError) -> Self {
        Self::from_error(source, StatusCode::INTERNAL_SERVER_ERROR, INTERNAL, error)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let mut response = if self.status == StatusCode::NOT_FOUND {
            views::render_not_found_response()
        } else {
            (self.status, self.public_message).into_response()
        };
        self.report.attach(&mut response);
        response
    }
}

impl From<FeedError> for HttpError {
    fn from(error: FeedError) -> Self {
        const SOURCE: &str = "application::error::feed_error";
        match error {
            FeedError::UnknownGroup => HttpError::not_found(SOURCE, "Group slug did not match"),
            FeedError::UnknownAuthor => HttpError::not_found(SOURCE, "Username did not match"),
            FeedError::UnknownPost => HttpError::not_found(SOURCE, "Post id did not match"),
            FeedError::Repo(err) => HttpError::internal(SOURCE, &err),
        }
    }
}

impl From<PostError> for HttpError {
    fn from(error: PostError) -> Self {
        const SOURCE: &str = "application::error::post_error";
        match error {
            PostError::NotFound => HttpError::not_found(SOURCE, "Post id did not match"),
            PostError::Validation(errors) => HttpError::new(
                SOURCE,
                StatusCode::BAD_REQUEST,
                "Invalid submission",
                errors.to_string(),
            ),
            PostError::Media(err) => HttpError::internal(SOURCE, &err),
            PostError::Repo(err) => HttpError::internal(SOURCE, &err),
        }
    }
}

impl From<FollowError> for HttpError {
    fn from(error: FollowError) -> Self {
        const SOURCE: &str = "application::error::follow_error";
        match error {
            FollowError::UnknownAuthor => HttpError::not_found(SOURCE, "Username did not match"),
            FollowError::Repo(err) => HttpError::internal(SOURCE, &err),
        }
    }
}

impl From<AccountError> for HttpError {
    fn from(error: AccountError) -> Self {
        const SOURCE: &str = "application::error::account_error";
        match error {
            AccountError::Validation(errors) => HttpError::new(
                SOURCE,
                StatusCode::BAD_REQUEST,
                "Invalid submission",
                errors.to_string(),
            ),
            other => HttpError::internal(SOURCE, &other),
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Group(#[from] GroupError),
    #[error("resource not found")]
    NotFound,
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Validation(_)
            | AppError::Group(
                GroupError::Empty(_)
                | GroupError::TitleTooLong
                | GroupError::InvalidSlug(_)
                | GroupError::SlugTaken(_),
            ) => StatusCode::BAD_REQUEST,
            AppError::Infra(InfraError::Database { .. } | InfraError::Migration { .. }) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            AppError::Infra(_)
            | AppError::Group(GroupError::Repo(_))
            | AppError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let report = ErrorReport::from_error("application::error::AppError", status, &self);
        let mut response = if status == StatusCode::NOT_FOUND {
            views::render_not_found_response()
        } else {
            (status, INTERNAL).into_response()
        };
        report.attach(&mut response);
        response
    }
}
