#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{HeaderMap, Request, Response, header},
};
use tempfile::TempDir;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tower::ServiceExt;

use yatube::application::accounts::{AccountService, hash_password};
use yatube::application::feed::FeedService;
use yatube::application::follows::FollowService;
use yatube::application::posts::PostService;
use yatube::application::repos::{
    CommentsRepo, CreateCommentParams, CreateGroupParams, CreatePostParams, CreateSessionParams,
    CreateUserParams, FollowsRepo, GroupsRepo, HealthRepo, PostScope, PostsRepo, PostsWriteRepo,
    RepoError, SessionsRepo, UpdatePostParams, UsersRepo,
};
use yatube::domain::entities::{
    CommentRecord, FollowRecord, GroupRecord, GroupSummary, PostEntry, PostRecord, SessionRecord,
    UserRecord,
};
use yatube::infra::cache::PageCache;
use yatube::infra::http::{HttpState, SessionCookieConfig, build_router};
use yatube::infra::uploads::UploadStorage;

pub const SESSION_COOKIE: &str = "yatube_session";
pub const BOUNDARY: &str = "yatube-test-boundary";

pub const SMALL_GIF: &[u8] = &[
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x02, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00, 0x00,
    0xFF, 0xFF, 0xFF, 0x21, 0xF9, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0x2C, 0x00, 0x00, 0x00, 0x00,
    0x02, 0x00, 0x01, 0x00, 0x00, 0x02, 0x02, 0x0C, 0x0A, 0x00, 0x3B,
];

#[derive(Default)]
struct Tables {
    users: Vec<UserRecord>,
    sessions: Vec<SessionRecord>,
    groups: Vec<GroupRecord>,
    posts: Vec<PostRecord>,
    comments: Vec<CommentRecord>,
    follows: Vec<FollowRecord>,
    next_id: i64,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn entry(&self, post: &PostRecord) -> Option<PostEntry> {
        let author = self.users.iter().find(|user| user.id == post.author_id)?;
        let group = post.group_id.and_then(|id| {
            self.groups.iter().find(|group| group.id == id).map(|group| GroupSummary {
                id: group.id,
                title: group.title.clone(),
                slug: group.slug.clone(),
            })
        });
        Some(PostEntry {
            id: post.id,
            text: post.text.clone(),
            created_at: post.created_at,
            image: post.image.clone(),
            author: author.summary(),
            group,
        })
    }

    fn in_scope(&self, post: &PostRecord, scope: PostScope) -> bool {
        match scope {
            PostScope::All => true,
            PostScope::Group(id) => post.group_id == Some(id),
            PostScope::Author(id) => post.author_id == id,
            PostScope::FollowedBy(user_id) => self
                .follows
                .iter()
                .any(|edge| edge.user_id == user_id && edge.author_id == post.author_id),
        }
    }
}

/// In-memory stand-in for every repository the HTTP stack touches.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub async fn insert_group(&self, title: &str, slug: &str) -> GroupRecord {
        self.create_group(CreateGroupParams {
            title: title.to_string(),
            slug: slug.to_string(),
            description: format!("About {title}"),
        })
        .await
        .expect("insert group")
    }

    pub async fn insert_post(&self, author: &UserRecord, text: &str, group: Option<i64>) -> PostRecord {
        self.create_post(CreatePostParams {
            author_id: author.id,
            text: text.to_string(),
            group_id: group,
            image: None,
        })
        .await
        .expect("insert post")
    }

    pub async fn post(&self, id: i64) -> Option<PostRecord> {
        self.find_record(id).await.expect("find post")
    }

    pub async fn latest_post(&self) -> Option<PostRecord> {
        self.tables.lock().await.posts.last().cloned()
    }

    pub async fn post_count(&self) -> usize {
        self.tables.lock().await.posts.len()
    }

    pub async fn comment_count(&self, post_id: i64) -> usize {
        self.tables
            .lock()
            .await
            .comments
            .iter()
            .filter(|comment| comment.post_id == post_id)
            .count()
    }

    pub async fn follow_count(&self) -> usize {
        self.tables.lock().await.follows.len()
    }

    pub async fn session_count(&self) -> usize {
        self.tables.lock().await.sessions.len()
    }
}

#[async_trait]
impl UsersRepo for MemoryStore {
    async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord, RepoError> {
        let mut tables = self.tables.lock().await;
        if tables.users.iter().any(|user| user.username == params.username) {
            return Err(RepoError::Duplicate {
                constraint: "users_username_key".to_string(),
            });
        }
        let user = UserRecord {
            id: tables.next_id(),
            username: params.username,
            first_name: params.first_name,
            last_name: params.last_name,
            email: params.email,
            password_hash: params.password_hash,
            date_joined: OffsetDateTime::now_utc(),
        };
        tables.users.push(user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<UserRecord>, RepoError> {
        let tables = self.tables.lock().await;
        Ok(tables.users.iter().find(|user| user.id == id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, RepoError> {
        let tables = self.tables.lock().await;
        Ok(tables.users.iter().find(|user| user.username == username).cloned())
    }
}

#[async_trait]
impl SessionsRepo for MemoryStore {
    async fn create_session(
        &self,
        params: CreateSessionParams,
    ) -> Result<SessionRecord, RepoError> {
        let mut tables = self.tables.lock().await;
        let session = SessionRecord {
            id: tables.next_id(),
            prefix: params.prefix,
            hashed_secret: params.hashed_secret,
            user_id: params.user_id,
            created_at: OffsetDateTime::now_utc(),
            expires_at: params.expires_at,
        };
        tables.sessions.push(session.clone());
        Ok(session)
    }

    async fn find_by_prefix(&self, prefix: &str) -> Result<Option<SessionRecord>, RepoError> {
        let tables = self.tables.lock().await;
        Ok(tables.sessions.iter().find(|s| s.prefix == prefix).cloned())
    }

    async fn delete_session(&self, prefix: &str) -> Result<(), RepoError> {
        self.tables.lock().await.sessions.retain(|s| s.prefix != prefix);
        Ok(())
    }

    async fn delete_expired(&self, now: OffsetDateTime) -> Result<u64, RepoError> {
        let mut tables = self.tables.lock().await;
        let before = tables.sessions.len();
        tables.sessions.retain(|s| s.expires_at > now);
        Ok((before - tables.sessions.len()) as u64)
    }
}

#[async_trait]
impl GroupsRepo for MemoryStore {
    async fn list_groups(&self) -> Result<Vec<GroupRecord>, RepoError> {
        let mut groups = self.tables.lock().await.groups.clone();
        groups.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(groups)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<GroupRecord>, RepoError> {
        let tables = self.tables.lock().await;
        Ok(tables.groups.iter().find(|group| group.id == id).cloned())
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<GroupRecord>, RepoError> {
        let tables = self.tables.lock().await;
        Ok(tables.groups.iter().find(|group| group.slug == slug).cloned())
    }

    async fn create_group(&self, params: CreateGroupParams) -> Result<GroupRecord, RepoError> {
        let mut tables = self.tables.lock().await;
        if tables.groups.iter().any(|group| group.slug == params.slug) {
            return Err(RepoError::Duplicate {
                constraint: "groups_slug_key".to_string(),
            });
        }
        let group = GroupRecord {
            id: tables.next_id(),
            title: params.title,
            slug: params.slug,
            description: params.description,
        };
        tables.groups.push(group.clone());
        Ok(group)
    }
}

#[async_trait]
impl PostsRepo for MemoryStore {
    async fn count_posts(&self, scope: PostScope) -> Result<u64, RepoError> {
        let tables = self.tables.lock().await;
        Ok(tables.posts.iter().filter(|post| tables.in_scope(post, scope)).count() as u64)
    }

    async fn list_posts(
        &self,
        scope: PostScope,
        offset: u64,
        limit: u32,
    ) -> Result<Vec<PostEntry>, RepoError> {
        let tables = self.tables.lock().await;
        let mut posts: Vec<&PostRecord> = tables
            .posts
            .iter()
            .filter(|post| tables.in_scope(post, scope))
            .collect();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(posts
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .filter_map(|post| tables.entry(post))
            .collect())
    }

    async fn find_entry(&self, id: i64) -> Result<Option<PostEntry>, RepoError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .posts
            .iter()
            .find(|post| post.id == id)
            .and_then(|post| tables.entry(post)))
    }

    async fn find_record(&self, id: i64) -> Result<Option<PostRecord>, RepoError> {
        let tables = self.tables.lock().await;
        Ok(tables.posts.iter().find(|post| post.id == id).cloned())
    }
}

#[async_trait]
impl PostsWriteRepo for MemoryStore {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        let mut tables = self.tables.lock().await;
        let post = PostRecord {
            id: tables.next_id(),
            text: params.text,
            created_at: OffsetDateTime::now_utc(),
            author_id: params.author_id,
            group_id: params.group_id,
            image: params.image,
        };
        tables.posts.push(post.clone());
        Ok(post)
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError> {
        let mut tables = self.tables.lock().await;
        let post = tables
            .posts
            .iter_mut()
            .find(|post| post.id == params.id)
            .ok_or(RepoError::NotFound)?;
        post.text = params.text;
        post.group_id = params.group_id;
        if let Some(image) = params.image {
            post.image = Some(image);
        }
        Ok(post.clone())
    }
}

#[async_trait]
impl CommentsRepo for MemoryStore {
    async fn list_for_post(&self, post_id: i64) -> Result<Vec<CommentRecord>, RepoError> {
        let tables = self.tables.lock().await;
        let mut comments: Vec<CommentRecord> = tables
            .comments
            .iter()
            .filter(|comment| comment.post_id == post_id)
            .cloned()
            .collect();
        comments.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(comments)
    }

    async fn create_comment(
        &self,
        params: CreateCommentParams,
    ) -> Result<CommentRecord, RepoError> {
        let mut tables = self.tables.lock().await;
        if !tables.posts.iter().any(|post| post.id == params.post_id) {
            return Err(RepoError::Integrity {
                message: "comments_post_id_fkey".to_string(),
            });
        }
        let author = tables
            .users
            .iter()
            .find(|user| user.id == params.author_id)
            .map(UserRecord::summary)
            .ok_or(RepoError::NotFound)?;
        let comment = CommentRecord {
            id: tables.next_id(),
            post_id: params.post_id,
            author,
            text: params.text,
            created_at: OffsetDateTime::now_utc(),
        };
        tables.comments.push(comment.clone());
        Ok(comment)
    }
}

#[async_trait]
impl FollowsRepo for MemoryStore {
    async fn is_following(&self, user_id: i64, author_id: i64) -> Result<bool, RepoError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .follows
            .iter()
            .any(|edge| edge.user_id == user_id && edge.author_id == author_id))
    }

    async fn create_follow(&self, user_id: i64, author_id: i64) -> Result<bool, RepoError> {
        let mut tables = self.tables.lock().await;
        if user_id == author_id {
            return Err(RepoError::Integrity {
                message: "follows_no_self_follow".to_string(),
            });
        }
        if tables
            .follows
            .iter()
            .any(|edge| edge.user_id == user_id && edge.author_id == author_id)
        {
            return Ok(false);
        }
        let id = tables.next_id();
        tables.follows.push(FollowRecord {
            id,
            user_id,
            author_id,
        });
        Ok(true)
    }

    async fn delete_follow(&self, user_id: i64, author_id: i64) -> Result<bool, RepoError> {
        let mut tables = self.tables.lock().await;
        let before = tables.follows.len();
        tables
            .follows
            .retain(|edge| !(edge.user_id == user_id && edge.author_id == author_id));
        Ok(tables.follows.len() != before)
    }

    async fn count_followers(&self, author_id: i64) -> Result<u64, RepoError> {
        let tables = self.tables.lock().await;
        Ok(tables.follows.iter().filter(|edge| edge.author_id == author_id).count() as u64)
    }

    async fn count_following(&self, user_id: i64) -> Result<u64, RepoError> {
        let tables = self.tables.lock().await;
        Ok(tables.follows.iter().filter(|edge| edge.user_id == user_id).count() as u64)
    }
}

#[async_trait]
impl HealthRepo for MemoryStore {
    async fn health_check(&self) -> Result<(), RepoError> {
        Ok(())
    }
}

pub struct TestApp {
    pub store: Arc<MemoryStore>,
    pub state: HttpState,
    pub uploads_dir: TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_cache(None)
    }

    pub fn with_cache(page_cache: Option<PageCache>) -> Self {
        let store = Arc::new(MemoryStore::default());
        let uploads_dir = TempDir::new().expect("uploads tempdir");
        let uploads =
            Arc::new(UploadStorage::new(uploads_dir.path().to_path_buf()).expect("upload storage"));

        let feed = Arc::new(FeedService::new(
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            10,
        ));
        let posts = Arc::new(PostService::new(
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            uploads.clone(),
        ));
        let follows = Arc::new(FollowService::new(store.clone(), store.clone()));
        let session_ttl = Duration::from_secs(3600);
        let accounts = Arc::new(AccountService::new(store.clone(), store.clone(), session_ttl));

        let state = HttpState {
            feed,
            posts,
            follows,
            accounts,
            health: store.clone(),
            uploads,
            page_cache,
            session_cookie: SessionCookieConfig {
                name: SESSION_COOKIE.to_string(),
                ttl: session_ttl,
            },
            max_request_bytes: 1024 * 1024,
        };

        Self {
            store,
            state,
            uploads_dir,
        }
    }

    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    pub async fn create_user(&self, username: &str) -> UserRecord {
        self.create_user_with_password(username, "not-used-in-tests").await
    }

    pub async fn create_user_with_password(&self, username: &str, password: &str) -> UserRecord {
        let password_hash = hash_password(password).expect("hash password");
        self.store
            .create_user(CreateUserParams {
                username: username.to_string(),
                first_name: String::new(),
                last_name: String::new(),
                email: format!("{username}@example.com"),
                password_hash,
            })
            .await
            .expect("create user")
    }

    /// `Cookie` header value carrying a fresh session for `user`.
    pub async fn login_cookie(&self, user: &UserRecord) -> String {
        let session = self
            .state
            .accounts
            .start_session(user)
            .await
            .expect("start session");
        format!("{SESSION_COOKIE}={}", session.token)
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> Response<Body> {
        let mut request = Request::builder().method("GET").uri(uri);
        if let Some(cookie) = cookie {
            request = request.header(header::COOKIE, cookie);
        }
        self.send(request.body(Body::empty()).expect("request")).await
    }

    pub async fn post_form(&self, uri: &str, cookie: Option<&str>, body: &str) -> Response<Body> {
        let mut request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            request = request.header(header::COOKIE, cookie);
        }
        self.send(request.body(Body::from(body.to_string())).expect("request"))
            .await
    }

    pub async fn post_multipart(
        &self,
        uri: &str,
        cookie: Option<&str>,
        body: Vec<u8>,
    ) -> Response<Body> {
        let mut request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            );
        if let Some(cookie) = cookie {
            request = request.header(header::COOKIE, cookie);
        }
        self.send(request.body(Body::from(body)).expect("request")).await
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router().oneshot(request).await.expect("router response")
    }
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}

pub fn location(headers: &HeaderMap) -> Option<&str> {
    headers.get(header::LOCATION).and_then(|value| value.to_str().ok())
}

/// Builder for `multipart/form-data` bodies using [`BOUNDARY`].
#[derive(Default)]
pub struct MultipartBody {
    bytes: Vec<u8>,
}

impl MultipartBody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.bytes.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, filename: &str, content_type: &str, data: &[u8]) -> Self {
        self.bytes.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        self.bytes.extend_from_slice(data);
        self.bytes.extend_from_slice(b"\r\n");
        self
    }

    pub fn finish(mut self) -> Vec<u8> {
        self.bytes
            .extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        self.bytes
    }
}
