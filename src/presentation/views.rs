use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;
use time::{OffsetDateTime, format_description::BorrowedFormatItem, macros::format_description};

use crate::{
    application::{
        error::{ErrorReport, HttpError},
        feed::{GroupFeed, PostDetail, ProfileFeed},
        forms::FieldErrors,
        pagination::Page,
    },
    domain::entities::{CommentRecord, GroupRecord, PostEntry, UserRecord},
};

const DATE_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[day padding:none] [month repr:short] [year] [hour]:[minute]");

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        HttpError::from_error(
            err.source,
            StatusCode::INTERNAL_SERVER_ERROR,
            err.public_message,
            &err.error,
        )
    }
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, HttpError> {
    template.render().map(Html).map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
        .into()
    })
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => (status, html).into_response(),
        Err(err) => err.into_response(),
    }
}

/// Render the 404 page. Rendered without a viewer so it can be produced from any error path.
pub fn render_not_found_response() -> Response {
    let view = LayoutContext::new(NavView::anonymous(), NotFoundView::default());
    let mut response = render_template_response(NotFoundTemplate { view }, StatusCode::NOT_FOUND);
    ErrorReport::from_message(
        "presentation::views::render_not_found_response",
        StatusCode::NOT_FOUND,
        "Resource not found",
    )
    .attach(&mut response);
    response
}

pub fn format_timestamp(value: OffsetDateTime) -> String {
    value.format(DATE_FORMAT).unwrap_or_default()
}

pub fn media_url(path: &str) -> String {
    format!("/media/{path}")
}

#[derive(Clone, Debug)]
pub struct NavUserView {
    pub username: String,
    pub full_name: String,
}

#[derive(Clone, Debug)]
pub struct NavView {
    pub viewer: Option<NavUserView>,
    pub active: &'static str,
}

impl NavView {
    pub fn new(viewer: Option<&UserRecord>, active: &'static str) -> Self {
        Self {
            viewer: viewer.map(|user| NavUserView {
                username: user.username.clone(),
                full_name: user.full_name(),
            }),
            active,
        }
    }

    pub fn anonymous() -> Self {
        Self {
            viewer: None,
            active: "",
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.viewer.is_some()
    }
}

#[derive(Clone, Debug)]
pub struct LayoutContext<T> {
    pub nav: NavView,
    pub content: T,
}

impl<T> LayoutContext<T> {
    pub fn new(nav: NavView, content: T) -> Self {
        Self { nav, content }
    }
}

#[derive(Clone, Debug)]
pub struct GroupBadgeView {
    pub title: String,
    pub slug: String,
}

#[derive(Clone, Debug)]
pub struct PostCardView {
    pub id: i64,
    pub text: String,
    pub created_at: String,
    pub image_url: Option<String>,
    pub author_username: String,
    pub author_full_name: String,
    pub group: Option<GroupBadgeView>,
}

impl From<PostEntry> for PostCardView {
    fn from(entry: PostEntry) -> Self {
        Self {
            id: entry.id,
            text: entry.text,
            created_at: format_timestamp(entry.created_at),
            image_url: entry.image.as_deref().map(media_url),
            author_username: entry.author.username,
            author_full_name: entry.author.full_name,
            group: entry.group.map(|group| GroupBadgeView {
                title: group.title,
                slug: group.slug,
            }),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageLinkView {
    pub number: u64,
    pub current: bool,
}

#[derive(Clone, Debug)]
pub struct PaginatorView {
    pub number: u64,
    pub total_pages: u64,
    pub previous: Option<u64>,
    pub next: Option<u64>,
    pub pages: Vec<PageLinkView>,
}

impl PaginatorView {
    const WINDOW: u64 = 2;

    pub fn from_page<T>(page: &Page<T>) -> Self {
        let first = page.number.saturating_sub(Self::WINDOW).max(1);
        let last = (page.number + Self::WINDOW).min(page.total_pages);
        Self {
            number: page.number,
            total_pages: page.total_pages,
            previous: page.previous_number(),
            next: page.next_number(),
            pages: (first..=last)
                .map(|number| PageLinkView {
                    number,
                    current: number == page.number,
                })
                .collect(),
        }
    }

    pub fn is_visible(&self) -> bool {
        self.total_pages > 1
    }
}

#[derive(Clone, Debug)]
pub struct FeedView {
    pub posts: Vec<PostCardView>,
    pub paginator: PaginatorView,
}

impl FeedView {
    pub fn from_page(page: Page<PostEntry>) -> Self {
        let paginator = PaginatorView::from_page(&page);
        Self {
            posts: page.items.into_iter().map(PostCardView::from).collect(),
            paginator,
        }
    }
}

#[derive(Template)]
#[template(path = "posts/index.html")]
pub struct IndexTemplate {
    pub view: LayoutContext<FeedView>,
}

#[derive(Template)]
#[template(path = "posts/follow.html")]
pub struct FollowIndexTemplate {
    pub view: LayoutContext<FeedView>,
}

#[derive(Clone, Debug)]
pub struct GroupView {
    pub title: String,
    pub slug: String,
    pub description: String,
    pub feed: FeedView,
}

impl From<GroupFeed> for GroupView {
    fn from(feed: GroupFeed) -> Self {
        Self {
            title: feed.group.title,
            slug: feed.group.slug,
            description: feed.group.description,
            feed: FeedView::from_page(feed.page),
        }
    }
}

#[derive(Template)]
#[template(path = "posts/group_list.html")]
pub struct GroupTemplate {
    pub view: LayoutContext<GroupView>,
}

#[derive(Clone, Debug)]
pub struct ProfileView {
    pub username: String,
    pub full_name: String,
    pub post_count: u64,
    pub followers: u64,
    pub following_count: u64,
    pub following: bool,
    /// Follow controls are offered to signed-in viewers other than the author.
    pub can_follow: bool,
    pub feed: FeedView,
}

impl ProfileView {
    pub fn new(profile: ProfileFeed, authenticated: bool) -> Self {
        Self {
            full_name: profile.author.full_name(),
            username: profile.author.username,
            post_count: profile.page.total_items,
            followers: profile.followers,
            following_count: profile.following_count,
            following: profile.following,
            can_follow: authenticated && !profile.is_self,
            feed: FeedView::from_page(profile.page),
        }
    }
}

#[derive(Template)]
#[template(path = "posts/profile.html")]
pub struct ProfileTemplate {
    pub view: LayoutContext<ProfileView>,
}

#[derive(Clone, Debug)]
pub struct CommentView {
    pub author_username: String,
    pub author_full_name: String,
    pub text: String,
    pub created_at: String,
}

impl From<CommentRecord> for CommentView {
    fn from(comment: CommentRecord) -> Self {
        Self {
            author_username: comment.author.username,
            author_full_name: comment.author.full_name,
            text: comment.text,
            created_at: format_timestamp(comment.created_at),
        }
    }
}

#[derive(Clone, Debug)]
pub struct PostDetailView {
    pub post: PostCardView,
    pub author_post_count: u64,
    pub comments: Vec<CommentView>,
    pub can_edit: bool,
    pub can_comment: bool,
}

impl PostDetailView {
    pub fn new(detail: PostDetail, viewer: Option<&UserRecord>) -> Self {
        let can_edit = viewer.is_some_and(|viewer| viewer.id == detail.post.author.id);
        Self {
            post: PostCardView::from(detail.post),
            author_post_count: detail.author_post_count,
            comments: detail.comments.into_iter().map(CommentView::from).collect(),
            can_edit,
            can_comment: viewer.is_some(),
        }
    }
}

#[derive(Template)]
#[template(path = "posts/post_detail.html")]
pub struct PostDetailTemplate {
    pub view: LayoutContext<PostDetailView>,
}

#[derive(Clone, Debug)]
pub struct GroupOptionView {
    pub id: i64,
    pub title: String,
    pub selected: bool,
}

#[derive(Clone, Debug)]
pub struct PostFormView {
    pub is_edit: bool,
    pub post_id: Option<i64>,
    pub text: String,
    pub groups: Vec<GroupOptionView>,
    pub current_image: Option<String>,
    pub errors: FieldErrors,
}

impl PostFormView {
    pub fn new(groups: Vec<GroupRecord>, selected: Option<&str>) -> Self {
        let selected = selected.map(str::trim).filter(|value| !value.is_empty());
        Self {
            is_edit: false,
            post_id: None,
            text: String::new(),
            groups: groups
                .into_iter()
                .map(|group| GroupOptionView {
                    selected: selected == Some(group.id.to_string().as_str()),
                    id: group.id,
                    title: group.title,
                })
                .collect(),
            current_image: None,
            errors: FieldErrors::new(),
        }
    }

    pub fn editing(mut self, post_id: i64, current_image: Option<&str>) -> Self {
        self.is_edit = true;
        self.post_id = Some(post_id);
        self.current_image = current_image.map(media_url);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_errors(mut self, errors: FieldErrors) -> Self {
        self.errors = errors;
        self
    }

    pub fn action(&self) -> String {
        match self.post_id {
            Some(id) if self.is_edit => format!("/posts/{id}/edit/"),
            _ => "/create/".to_string(),
        }
    }
}

#[derive(Template)]
#[template(path = "posts/create_post.html")]
pub struct PostFormTemplate {
    pub view: LayoutContext<PostFormView>,
}

#[derive(Clone, Debug, Default)]
pub struct LoginView {
    pub username: String,
    pub next: String,
    pub errors: FieldErrors,
}

#[derive(Template)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub view: LayoutContext<LoginView>,
}

#[derive(Clone, Debug, Default)]
pub struct SignupView {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub errors: FieldErrors,
}

#[derive(Template)]
#[template(path = "auth/signup.html")]
pub struct SignupTemplate {
    pub view: LayoutContext<SignupView>,
}

#[derive(Template)]
#[template(path = "auth/logged_out.html")]
pub struct LoggedOutTemplate {
    pub view: LayoutContext<()>,
}

#[derive(Clone, Debug)]
pub struct NotFoundView {
    pub message: &'static str,
}

impl Default for NotFoundView {
    fn default() -> Self {
        Self {
            message: "The page you requested does not exist.",
        }
    }
}

#[derive(Template)]
#[template(path = "404.html")]
pub struct NotFoundTemplate {
    pub view: LayoutContext<NotFoundView>,
}
