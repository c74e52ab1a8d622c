//! Multipart decoding for the post form.

use axum::http::StatusCode;
use axum_extra::extract::Multipart;
use axum_extra::extract::multipart::MultipartError;

use crate::{
    application::{error::HttpError, media::ImageUpload, posts::PostDraft},
    domain::posts::sniff_image,
};

const SOURCE: &str = "infra::http::forms::read_post_draft";

/// Collect `text`, `group` and `image` fields. Unknown fields are skipped.
///
/// An empty file input counts as "no image"; a non-empty payload that does not
/// sniff as a supported raster format sets `image_rejected`.
pub(super) async fn read_post_draft(multipart: &mut Multipart) -> Result<PostDraft, HttpError> {
    let mut draft = PostDraft::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        match field.name() {
            Some("text") => {
                draft.text = field.text().await.map_err(multipart_error)?;
            }
            Some("group") => {
                draft.group = Some(field.text().await.map_err(multipart_error)?);
            }
            Some("image") => {
                let original_name = field
                    .file_name()
                    .map(|value| value.trim().to_string())
                    .unwrap_or_default();
                let data = field.bytes().await.map_err(multipart_error)?;
                if data.is_empty() && original_name.is_empty() {
                    continue;
                }
                match sniff_image(&data) {
                    Some(kind) => {
                        draft.image = Some(ImageUpload {
                            original_name,
                            kind,
                            data,
                        });
                        draft.image_rejected = false;
                    }
                    None => {
                        draft.image = None;
                        draft.image_rejected = true;
                    }
                }
            }
            _ => continue,
        }
    }

    Ok(draft)
}

fn multipart_error(err: MultipartError) -> HttpError {
    let status = err.status();
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        HttpError::from_error(SOURCE, status, "Uploaded file is too large", &err)
    } else {
        HttpError::from_error(SOURCE, StatusCode::BAD_REQUEST, "Malformed form data", &err)
    }
}
