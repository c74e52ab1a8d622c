//! Read-side assembly of the paginated post feeds and the post detail view.

use std::sync::Arc;

use thiserror::Error;

use crate::application::pagination::{Page, PageRequest};
use crate::application::repos::{
    CommentsRepo, FollowsRepo, GroupsRepo, PostScope, PostsRepo, RepoError, UsersRepo,
};
use crate::domain::entities::{CommentRecord, GroupRecord, PostEntry, UserRecord};

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("unknown group")]
    UnknownGroup,
    #[error("unknown author")]
    UnknownAuthor,
    #[error("unknown post")]
    UnknownPost,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone)]
pub struct GroupFeed {
    pub group: GroupRecord,
    pub page: Page<PostEntry>,
}

#[derive(Debug, Clone)]
pub struct ProfileFeed {
    pub author: UserRecord,
    pub page: Page<PostEntry>,
    /// Whether the viewer already follows `author`; always false for anonymous viewers.
    pub following: bool,
    pub is_self: bool,
    pub followers: u64,
    pub following_count: u64,
}

#[derive(Debug, Clone)]
pub struct PostDetail {
    pub post: PostEntry,
    pub author_post_count: u64,
    pub comments: Vec<CommentRecord>,
}

#[derive(Clone)]
pub struct FeedService {
    posts: Arc<dyn PostsRepo>,
    groups: Arc<dyn GroupsRepo>,
    users: Arc<dyn UsersRepo>,
    follows: Arc<dyn FollowsRepo>,
    comments: Arc<dyn CommentsRepo>,
    page_size: u32,
}

impl FeedService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        groups: Arc<dyn GroupsRepo>,
        users: Arc<dyn UsersRepo>,
        follows: Arc<dyn FollowsRepo>,
        comments: Arc<dyn CommentsRepo>,
        page_size: u32,
    ) -> Self {
        Self {
            posts,
            groups,
            users,
            follows,
            comments,
            page_size: page_size.max(1),
        }
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn page_request(&self, raw: Option<&str>) -> PageRequest {
        PageRequest::parse(raw, self.page_size)
    }

    /// Every post, newest first.
    pub async fn index(&self, request: PageRequest) -> Result<Page<PostEntry>, FeedError> {
        self.scoped_page(PostScope::All, request).await
    }

    pub async fn group_posts(
        &self,
        slug: &str,
        request: PageRequest,
    ) -> Result<GroupFeed, FeedError> {
        let group = self
            .groups
            .find_by_slug(slug)
            .await?
            .ok_or(FeedError::UnknownGroup)?;
        let page = self.scoped_page(PostScope::Group(group.id), request).await?;
        Ok(GroupFeed { group, page })
    }

    pub async fn profile(
        &self,
        username: &str,
        viewer: Option<&UserRecord>,
        request: PageRequest,
    ) -> Result<ProfileFeed, FeedError> {
        let author = self
            .users
            .find_by_username(username)
            .await?
            .ok_or(FeedError::UnknownAuthor)?;

        let page = self.scoped_page(PostScope::Author(author.id), request).await?;

        let following = match viewer {
            Some(viewer) if viewer.id != author.id => {
                self.follows.is_following(viewer.id, author.id).await?
            }
            _ => false,
        };
        let is_self = viewer.is_some_and(|viewer| viewer.id == author.id);
        let followers = self.follows.count_followers(author.id).await?;
        let following_count = self.follows.count_following(author.id).await?;

        Ok(ProfileFeed {
            author,
            page,
            following,
            is_self,
            followers,
            following_count,
        })
    }

    /// Posts by the authors `viewer` follows.
    pub async fn follow_index(
        &self,
        viewer: &UserRecord,
        request: PageRequest,
    ) -> Result<Page<PostEntry>, FeedError> {
        self.scoped_page(PostScope::FollowedBy(viewer.id), request)
            .await
    }

    pub async fn post_detail(&self, id: i64) -> Result<PostDetail, FeedError> {
        let post = self
            .posts
            .find_entry(id)
            .await?
            .ok_or(FeedError::UnknownPost)?;
        let author_post_count = self
            .posts
            .count_posts(PostScope::Author(post.author.id))
            .await?;
        let comments = self.comments.list_for_post(post.id).await?;

        Ok(PostDetail {
            post,
            author_post_count,
            comments,
        })
    }

    async fn scoped_page(
        &self,
        scope: PostScope,
        request: PageRequest,
    ) -> Result<Page<PostEntry>, FeedError> {
        let total = self.posts.count_posts(scope).await?;
        let window = request.resolve(total);
        let items = if total == 0 {
            Vec::new()
        } else {
            self.posts
                .list_posts(scope, window.offset, window.limit)
                .await?
        };
        Ok(window.into_page(items))
    }
}
