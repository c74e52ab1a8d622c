use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::application::repos::{CreateGroupParams, GroupsRepo, RepoError};
use crate::domain::entities::GroupRecord;
use crate::domain::slug::{
    MAX_SLUG_LEN, SlugAsyncError, SlugError, generate_unique_slug_async, is_valid_slug,
};

pub const MAX_TITLE_LEN: usize = 200;

#[derive(Debug, Error)]
pub enum GroupError {
    #[error("`{0}` must not be empty")]
    Empty(&'static str),
    #[error("title exceeds {MAX_TITLE_LEN} characters")]
    TitleTooLong,
    #[error("slug `{0}` is not a valid slug")]
    InvalidSlug(String),
    #[error("slug `{0}` is already taken")]
    SlugTaken(String),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone)]
pub struct CreateGroupCommand {
    pub title: String,
    /// Derived from the title when absent.
    pub slug: Option<String>,
    pub description: String,
}

#[derive(Clone)]
pub struct GroupService {
    repo: Arc<dyn GroupsRepo>,
}

impl GroupService {
    pub fn new(repo: Arc<dyn GroupsRepo>) -> Self {
        Self { repo }
    }

    pub async fn list_groups(&self) -> Result<Vec<GroupRecord>, GroupError> {
        self.repo.list_groups().await.map_err(GroupError::from)
    }

    pub async fn create_group(&self, command: CreateGroupCommand) -> Result<GroupRecord, GroupError> {
        let title = command.title.trim().to_string();
        if title.is_empty() {
            return Err(GroupError::Empty("title"));
        }
        if title.chars().count() > MAX_TITLE_LEN {
            return Err(GroupError::TitleTooLong);
        }

        let slug = match command.slug.map(|slug| slug.trim().to_string()) {
            Some(slug) if !slug.is_empty() => {
                if !is_valid_slug(&slug) || slug.len() > MAX_SLUG_LEN {
                    return Err(GroupError::InvalidSlug(slug));
                }
                if self.repo.find_by_slug(&slug).await?.is_some() {
                    return Err(GroupError::SlugTaken(slug));
                }
                slug
            }
            _ => self.derive_unique_slug(&title).await?,
        };

        let group = self
            .repo
            .create_group(CreateGroupParams {
                title,
                slug: slug.clone(),
                description: command.description.trim().to_string(),
            })
            .await
            .map_err(|err| match err {
                RepoError::Duplicate { .. } => GroupError::SlugTaken(slug),
                other => GroupError::Repo(other),
            })?;

        info!(
            target = "yatube::groups",
            group_id = group.id,
            slug = %group.slug,
            "group created"
        );
        Ok(group)
    }

    async fn derive_unique_slug(&self, title: &str) -> Result<String, GroupError> {
        let repo = self.repo.clone();
        match generate_unique_slug_async(title, move |candidate| {
            let repo = repo.clone();
            let candidate = candidate.to_string();
            async move {
                repo.find_by_slug(&candidate)
                    .await
                    .map(|existing| existing.is_none())
            }
        })
        .await
        {
            Ok(slug) => Ok(slug),
            Err(SlugAsyncError::Slug(SlugError::Exhausted { base })) => {
                Err(GroupError::SlugTaken(base))
            }
            Err(SlugAsyncError::Slug(_)) => Err(GroupError::InvalidSlug(title.to_string())),
            Err(SlugAsyncError::Predicate(err)) => Err(GroupError::Repo(err)),
        }
    }
}
