//! Post authoring, editing and commenting handlers.

use axum::{
    extract::{Form, Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::Multipart;
use serde::Deserialize;

use crate::{
    application::{
        error::HttpError,
        posts::{EditAccess, EditOutcome, PostDraft, PostError},
    },
    domain::entities::{GroupRecord, UserRecord},
    presentation::views::{
        LayoutContext, NavView, PostFormTemplate, PostFormView, render_not_found_response,
        render_template_response,
    },
};

use super::{CurrentUser, HttpState, forms::read_post_draft};

fn detail_path(id: i64) -> String {
    format!("/posts/{id}/")
}

/// Post ids in the path are integers; anything else names no post.
fn parse_post_id(raw: &str) -> Option<i64> {
    raw.parse().ok()
}

fn profile_path(username: &str) -> String {
    format!("/profile/{username}/")
}

async fn render_form(
    state: &HttpState,
    user: &UserRecord,
    form: impl FnOnce(Vec<GroupRecord>) -> PostFormView,
) -> Response {
    match state.posts.group_choices().await {
        Ok(groups) => {
            let form = form(groups);
            let active = if form.is_edit { "" } else { "create" };
            let view = LayoutContext::new(NavView::new(Some(user), active), form);
            render_template_response(PostFormTemplate { view }, StatusCode::OK)
        }
        Err(err) => HttpError::from(err).into_response(),
    }
}

pub(super) async fn create_form(
    State(state): State<HttpState>,
    CurrentUser(user): CurrentUser,
) -> Response {
    render_form(&state, &user, |groups| PostFormView::new(groups, None)).await
}

pub(super) async fn create_submit(
    State(state): State<HttpState>,
    CurrentUser(user): CurrentUser,
    mut multipart: Multipart,
) -> Response {
    let draft = match read_post_draft(&mut multipart).await {
        Ok(draft) => draft,
        Err(err) => return err.into_response(),
    };
    let text = draft.text.clone();
    let group = draft.group.clone();

    match state.posts.create_post(&user, draft).await {
        Ok(_) => Redirect::to(&profile_path(&user.username)).into_response(),
        Err(PostError::Validation(errors)) => {
            render_form(&state, &user, |groups| {
                PostFormView::new(groups, group.as_deref())
                    .with_text(text)
                    .with_errors(errors)
            })
            .await
        }
        Err(err) => HttpError::from(err).into_response(),
    }
}

pub(super) async fn edit_form(
    State(state): State<HttpState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Response {
    let Some(id) = parse_post_id(&id) else {
        return render_not_found_response();
    };
    match state.posts.edit_access(&user, id).await {
        Ok(EditAccess::Owner(post)) => {
            let selected = post.group_id.map(|id| id.to_string());
            render_form(&state, &user, |groups| {
                PostFormView::new(groups, selected.as_deref())
                    .editing(post.id, post.image.as_deref())
                    .with_text(post.text.clone())
            })
            .await
        }
        Ok(EditAccess::NotOwner) => Redirect::to(&detail_path(id)).into_response(),
        Err(err) => HttpError::from(err).into_response(),
    }
}

pub(super) async fn edit_submit(
    State(state): State<HttpState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> Response {
    let Some(id) = parse_post_id(&id) else {
        return render_not_found_response();
    };
    let draft: PostDraft = match read_post_draft(&mut multipart).await {
        Ok(draft) => draft,
        Err(err) => return err.into_response(),
    };
    let text = draft.text.clone();
    let group = draft.group.clone();

    match state.posts.edit_post(&user, id, draft).await {
        Ok(EditOutcome::Updated(post)) => Redirect::to(&detail_path(post.id)).into_response(),
        Ok(EditOutcome::NotOwner) => Redirect::to(&detail_path(id)).into_response(),
        Err(PostError::Validation(errors)) => {
            let current_image = match state.posts.edit_access(&user, id).await {
                Ok(EditAccess::Owner(post)) => post.image,
                _ => None,
            };
            render_form(&state, &user, |groups| {
                PostFormView::new(groups, group.as_deref())
                    .editing(id, current_image.as_deref())
                    .with_text(text)
                    .with_errors(errors)
            })
            .await
        }
        Err(err) => HttpError::from(err).into_response(),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct CommentFields {
    text: String,
}

pub(super) async fn add_comment(
    State(state): State<HttpState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    Form(fields): Form<CommentFields>,
) -> Response {
    let Some(id) = parse_post_id(&id) else {
        return render_not_found_response();
    };
    match state.posts.add_comment(&user, id, &fields.text).await {
        Ok(_) => Redirect::to(&detail_path(id)).into_response(),
        Err(err) => HttpError::from(err).into_response(),
    }
}
