use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;
use time::macros::format_description;

use crate::application::error::{AppError, ErrorReport, HttpError};
use crate::application::pagination::Page;
use crate::application::posts::PostFormErrors;
use crate::domain::entities::{CommentRecord, GroupRecord, PostRecord, UserRecord};

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
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
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

/// The custom 404 page.
pub fn render_not_found_response(user: Option<&UserRecord>) -> Response {
    let content = ErrorPageView {
        title: "Page Not Found".to_string(),
        message: "The page you requested does not exist. Head back to the feed to keep reading."
            .to_string(),
    };
    let view = LayoutContext::new("Page Not Found", user, content);
    let mut response = render_template_response(ErrorTemplate { view }, StatusCode::NOT_FOUND);
    ErrorReport::from_message(
        "presentation::views::render_not_found_response",
        StatusCode::NOT_FOUND,
        "Resource not found",
    )
    .attach(&mut response);
    response
}

/// The custom error page for internal failures.
pub fn render_server_error_response(
    source: &'static str,
    error: &AppError,
    user: Option<&UserRecord>,
) -> Response {
    let content = ErrorPageView {
        title: "Something Went Wrong".to_string(),
        message: "The server hit an unexpected problem handling your request. Try again shortly."
            .to_string(),
    };
    let view = LayoutContext::new("Something Went Wrong", user, content);
    let mut response =
        render_template_response(ErrorTemplate { view }, StatusCode::INTERNAL_SERVER_ERROR);
    ErrorReport::from_error(source, StatusCode::INTERNAL_SERVER_ERROR, error).attach(&mut response);
    response
}

/// Route an application error to the right error page.
pub fn render_app_error(
    source: &'static str,
    error: AppError,
    user: Option<&UserRecord>,
) -> Response {
    if error.is_not_found() {
        render_not_found_response(user)
    } else {
        render_server_error_response(source, &error, user)
    }
}

/// The logged-in user as the layout shows them.
#[derive(Clone)]
pub struct UserChip {
    pub username: String,
    pub profile_href: String,
}

/// Shared layout wrapper: page title, the current user for the navigation
/// bar, and the page body.
pub struct LayoutContext<T> {
    pub title: String,
    pub user: Option<UserChip>,
    pub content: T,
}

impl<T> LayoutContext<T> {
    pub fn new(title: impl Into<String>, user: Option<&UserRecord>, content: T) -> Self {
        Self {
            title: title.into(),
            user: user.map(|user| UserChip {
                profile_href: format!("/{}", user.username),
                username: user.username.clone(),
            }),
            content,
        }
    }
}

#[derive(Clone)]
pub struct GroupBadge {
    pub title: String,
    pub href: String,
}

/// One post as every feed shows it.
#[derive(Clone)]
pub struct PostCard {
    pub href: String,
    pub author_username: String,
    pub author_href: String,
    pub text: String,
    pub published: String,
    pub group: Option<GroupBadge>,
    pub image_src: Option<String>,
}

/// Pagination controls under a feed.
#[derive(Clone)]
pub struct Pager {
    pub number: u64,
    pub page_count: u64,
    pub total_items: u64,
    pub previous_href: Option<String>,
    pub next_href: Option<String>,
}

pub struct FeedContext {
    pub heading: String,
    pub posts: Vec<PostCard>,
    pub pager: Pager,
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub view: LayoutContext<FeedContext>,
}

pub struct GroupContext {
    pub title: String,
    pub description: String,
    pub posts: Vec<PostCard>,
    pub pager: Pager,
}

#[derive(Template)]
#[template(path = "group.html")]
pub struct GroupTemplate {
    pub view: LayoutContext<GroupContext>,
}

pub struct ProfileContext {
    pub username: String,
    pub post_count: u64,
    pub viewer_is_following: bool,
    pub show_follow_controls: bool,
    pub follow_href: String,
    pub unfollow_href: String,
    pub posts: Vec<PostCard>,
    pub pager: Pager,
}

#[derive(Template)]
#[template(path = "profile.html")]
pub struct ProfileTemplate {
    pub view: LayoutContext<ProfileContext>,
}

#[derive(Template)]
#[template(path = "follow.html")]
pub struct FollowTemplate {
    pub view: LayoutContext<FeedContext>,
}

pub struct CommentView {
    pub author_label: String,
    pub created: String,
    pub text: String,
}

pub struct PostDetailContext {
    pub post: PostCard,
    pub can_edit: bool,
    pub edit_href: String,
    pub comment_action: String,
    pub show_comment_form: bool,
    pub comments: Vec<CommentView>,
}

#[derive(Template)]
#[template(path = "post.html")]
pub struct PostTemplate {
    pub view: LayoutContext<PostDetailContext>,
}

pub struct GroupChoice {
    pub id: i64,
    pub title: String,
    pub selected: bool,
}

/// Validation messages shown next to the post form fields.
#[derive(Default)]
pub struct PostFormErrorView {
    pub text: Option<&'static str>,
    pub group: Option<&'static str>,
    pub image: Option<&'static str>,
}

impl From<PostFormErrors> for PostFormErrorView {
    fn from(errors: PostFormErrors) -> Self {
        Self {
            text: errors.text,
            group: errors.group,
            image: errors.image,
        }
    }
}

pub struct PostFormContext {
    pub heading: String,
    pub action: String,
    pub submit_label: String,
    pub text: String,
    pub groups: Vec<GroupChoice>,
    pub errors: PostFormErrorView,
}

#[derive(Template)]
#[template(path = "post_form.html")]
pub struct PostFormTemplate {
    pub view: LayoutContext<PostFormContext>,
}

#[derive(Default)]
pub struct SignupErrorView {
    pub username: Option<&'static str>,
    pub password: Option<&'static str>,
}

pub struct SignupContext {
    pub username: String,
    pub errors: SignupErrorView,
}

#[derive(Template)]
#[template(path = "signup.html")]
pub struct SignupTemplate {
    pub view: LayoutContext<SignupContext>,
}

pub struct LoginContext {
    pub username: String,
    pub next: String,
    pub error: Option<&'static str>,
}

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    pub view: LayoutContext<LoginContext>,
}

pub struct ErrorPageView {
    pub title: String,
    pub message: String,
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub view: LayoutContext<ErrorPageView>,
}

/// Render a post's publication instant the way the templates show it.
pub fn format_published(record: &PostRecord) -> String {
    let format = format_description!("[day].[month].[year] [hour]:[minute]");
    record
        .pub_date
        .format(&format)
        .unwrap_or_else(|_| record.pub_date.to_string())
}

pub fn post_card(record: &PostRecord) -> PostCard {
    PostCard {
        href: format!("/{}/{}", record.author_username, record.id),
        author_href: format!("/{}", record.author_username),
        author_username: record.author_username.clone(),
        text: record.text.clone(),
        published: format_published(record),
        group: record.group.as_ref().map(|group| GroupBadge {
            title: group.title.clone(),
            href: format!("/group/{}", group.slug),
        }),
        image_src: record
            .image_path
            .as_ref()
            .map(|path| format!("/media/{path}")),
    }
}

pub fn post_cards(page: &Page<PostRecord>) -> Vec<PostCard> {
    page.items.iter().map(post_card).collect()
}

/// Build pagination links for a feed rooted at `base_path`.
pub fn pager(page: &Page<PostRecord>, base_path: &str) -> Pager {
    let href = |number: u64| format!("{base_path}?page={number}");
    Pager {
        number: page.number,
        page_count: page.page_count,
        total_items: page.total_items,
        previous_href: page.has_previous().then(|| href(page.number - 1)),
        next_href: page.has_next().then(|| href(page.number + 1)),
    }
}

pub fn comment_view(record: &CommentRecord) -> CommentView {
    let format = format_description!("[day].[month].[year] [hour]:[minute]");
    CommentView {
        author_label: record
            .author_username
            .clone()
            .unwrap_or_else(|| "deleted account".to_string()),
        created: record
            .created
            .format(&format)
            .unwrap_or_else(|_| record.created.to_string()),
        text: record.text.clone(),
    }
}

pub fn group_choices(groups: &[GroupRecord], selected: Option<i64>) -> Vec<GroupChoice> {
    groups
        .iter()
        .map(|group| GroupChoice {
            id: group.id,
            title: group.title.clone(),
            selected: selected == Some(group.id),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;

    fn sample_post() -> PostRecord {
        PostRecord {
            id: 7,
            text: "hello world".to_string(),
            pub_date: OffsetDateTime::from_unix_timestamp(1_700_000_000).expect("valid timestamp"),
            author_id: 1,
            author_username: "ada".to_string(),
            group: Some(crate::domain::entities::GroupRef {
                id: 3,
                slug: "rust".to_string(),
                title: "Rust".to_string(),
            }),
            image_path: Some("2024/01/02/abc-cat.png".to_string()),
        }
    }

    #[test]
    fn post_card_builds_links() {
        let card = post_card(&sample_post());
        assert_eq!(card.href, "/ada/7");
        assert_eq!(card.author_href, "/ada");
        assert_eq!(
            card.image_src.as_deref(),
            Some("/media/2024/01/02/abc-cat.png")
        );
        let group = card.group.expect("group badge");
        assert_eq!(group.href, "/group/rust");
    }

    #[test]
    fn pager_links_only_where_pages_exist() {
        let page = Page::new(vec![sample_post()], 2, 3, 25);
        let pager = pager(&page, "/group/rust");
        assert_eq!(pager.previous_href.as_deref(), Some("/group/rust?page=1"));
        assert_eq!(pager.next_href.as_deref(), Some("/group/rust?page=3"));

        let single = Page::new(vec![sample_post()], 1, 1, 1);
        let pager = super::pager(&single, "/");
        assert!(pager.previous_href.is_none());
        assert!(pager.next_href.is_none());
    }

    #[test]
    fn index_template_renders() {
        let content = FeedContext {
            heading: "Latest posts".to_string(),
            posts: vec![post_card(&sample_post())],
            pager: pager(&Page::new(vec![sample_post()], 1, 1, 1), "/"),
        };
        let view = LayoutContext::new("Canto", None, content);
        let html = IndexTemplate { view }.render().expect("render index");
        assert!(html.contains("hello world"));
        assert!(html.contains("/ada/7"));
    }
}
