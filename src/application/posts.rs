//! Post authoring, owner-gated editing and comments.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::application::forms::{FieldErrors, REQUIRED};
use crate::application::media::{ImageUpload, MediaError, MediaStore, StoredImage};
use crate::application::repos::{
    CommentsRepo, CreateCommentParams, CreatePostParams, GroupsRepo, PostsRepo, PostsWriteRepo,
    RepoError, UpdatePostParams,
};
use crate::domain::entities::{CommentRecord, GroupRecord, PostRecord, UserRecord};
use crate::domain::posts::normalize_text;

pub const INVALID_GROUP: &str = "Select a valid choice. That choice is not one of the available choices.";
pub const INVALID_IMAGE: &str =
    "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";

#[derive(Debug, Error)]
pub enum PostError {
    #[error("post not found")]
    NotFound,
    #[error("invalid submission: {0}")]
    Validation(FieldErrors),
    #[error(transparent)]
    Media(#[from] MediaError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Raw post form values after multipart decoding.
#[derive(Debug, Clone, Default)]
pub struct PostDraft {
    pub text: String,
    /// Group id as submitted; blank means "no group".
    pub group: Option<String>,
    pub image: Option<ImageUpload>,
    /// Set when a file was attached but could not be recognised as an image.
    pub image_rejected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOutcome {
    Updated(PostRecord),
    /// The actor does not own the post; nothing was written.
    NotOwner,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditAccess {
    Owner(PostRecord),
    NotOwner,
}

struct ValidDraft {
    text: String,
    group_id: Option<i64>,
    image: Option<ImageUpload>,
}

#[derive(Clone)]
pub struct PostService {
    reader: Arc<dyn PostsRepo>,
    writer: Arc<dyn PostsWriteRepo>,
    groups: Arc<dyn GroupsRepo>,
    comments: Arc<dyn CommentsRepo>,
    media: Arc<dyn MediaStore>,
}

impl PostService {
    pub fn new(
        reader: Arc<dyn PostsRepo>,
        writer: Arc<dyn PostsWriteRepo>,
        groups: Arc<dyn GroupsRepo>,
        comments: Arc<dyn CommentsRepo>,
        media: Arc<dyn MediaStore>,
    ) -> Self {
        Self {
            reader,
            writer,
            groups,
            comments,
            media,
        }
    }

    /// Groups offered by the post form selector.
    pub async fn group_choices(&self) -> Result<Vec<GroupRecord>, PostError> {
        self.groups.list_groups().await.map_err(PostError::from)
    }

    pub async fn create_post(
        &self,
        author: &UserRecord,
        draft: PostDraft,
    ) -> Result<PostRecord, PostError> {
        let valid = self.validate(draft).await?;
        let image = self.store_image(valid.image).await?;

        let created = self
            .writer
            .create_post(CreatePostParams {
                author_id: author.id,
                text: valid.text,
                group_id: valid.group_id,
                image: image.as_ref().map(|stored| stored.path.clone()),
            })
            .await;
        let post = match created {
            Ok(post) => post,
            Err(err) => {
                self.discard_unreferenced(image.as_ref()).await;
                return Err(err.into());
            }
        };

        info!(
            target = "yatube::posts",
            post_id = post.id,
            author = %author.username,
            "post created"
        );
        Ok(post)
    }

    /// Load a post for the edit form, reporting whether `actor` may edit it.
    pub async fn edit_access(&self, actor: &UserRecord, id: i64) -> Result<EditAccess, PostError> {
        let post = self
            .reader
            .find_record(id)
            .await?
            .ok_or(PostError::NotFound)?;
        if post.author_id == actor.id {
            Ok(EditAccess::Owner(post))
        } else {
            Ok(EditAccess::NotOwner)
        }
    }

    pub async fn edit_post(
        &self,
        actor: &UserRecord,
        id: i64,
        draft: PostDraft,
    ) -> Result<EditOutcome, PostError> {
        let post = match self.edit_access(actor, id).await? {
            EditAccess::Owner(post) => post,
            EditAccess::NotOwner => return Ok(EditOutcome::NotOwner),
        };

        let valid = self.validate(draft).await?;
        let image = self.store_image(valid.image).await?;

        let result = self
            .writer
            .update_post(UpdatePostParams {
                id: post.id,
                text: valid.text,
                group_id: valid.group_id,
                image: image.as_ref().map(|stored| stored.path.clone()),
            })
            .await;
        let updated = match result {
            Ok(updated) => updated,
            Err(err) => {
                self.discard_unreferenced(image.as_ref()).await;
                return Err(err.into());
            }
        };

        info!(
            target = "yatube::posts",
            post_id = updated.id,
            author = %actor.username,
            "post updated"
        );
        Ok(EditOutcome::Updated(updated))
    }

    /// Attach a comment to `post_id`. Blank text is ignored and yields `Ok(None)`.
    pub async fn add_comment(
        &self,
        author: &UserRecord,
        post_id: i64,
        text: &str,
    ) -> Result<Option<CommentRecord>, PostError> {
        let post = self
            .reader
            .find_record(post_id)
            .await?
            .ok_or(PostError::NotFound)?;

        let Some(text) = normalize_text(text) else {
            return Ok(None);
        };

        let comment = self
            .comments
            .create_comment(CreateCommentParams {
                post_id: post.id,
                author_id: author.id,
                text,
            })
            .await?;
        Ok(Some(comment))
    }

    async fn store_image(
        &self,
        upload: Option<ImageUpload>,
    ) -> Result<Option<StoredImage>, PostError> {
        match upload {
            Some(upload) => Ok(Some(self.media.store_image(upload).await?)),
            None => Ok(None),
        }
    }

    /// Drop a freshly written image after the row that would reference it failed to save.
    /// Files that were already on disk may belong to another post and stay.
    async fn discard_unreferenced(&self, image: Option<&StoredImage>) {
        let Some(image) = image.filter(|image| image.created) else {
            return;
        };
        if let Err(err) = self.media.discard_image(&image.path).await {
            warn!(
                target = "yatube::posts",
                path = %image.path,
                error = %err,
                "failed to remove unreferenced image"
            );
        }
    }

    async fn validate(&self, draft: PostDraft) -> Result<ValidDraft, PostError> {
        let mut errors = FieldErrors::new();

        let text = normalize_text(&draft.text);
        if text.is_none() {
            errors.add("text", REQUIRED);
        }

        let group_id = match draft.group.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => match raw.parse::<i64>() {
                Ok(id) => match self.groups.find_by_id(id).await? {
                    Some(group) => Some(group.id),
                    None => {
                        errors.add("group", INVALID_GROUP);
                        None
                    }
                },
                Err(_) => {
                    errors.add("group", INVALID_GROUP);
                    None
                }
            },
        };

        if draft.image_rejected {
            errors.add("image", INVALID_IMAGE);
        }

        match text {
            Some(text) if errors.is_empty() => Ok(ValidDraft {
                text,
                group_id,
                image: draft.image,
            }),
            _ => Err(PostError::Validation(errors)),
        }
    }
}
