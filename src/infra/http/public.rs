//! Read-only pages: feeds, profiles, post details, media, health.

use axum::{
    Extension,
    body::Body,
    extract::{Path, Query, State},
    http::{
        StatusCode,
        header::{CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE},
    },
    http::HeaderValue,
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use serde::Deserialize;
use tracing::error;

use crate::application::error::HttpError;
use crate::application::pagination::PageRequest;
use crate::infra::uploads::UploadStorageError;
use crate::presentation::views::{
    FeedContext, GroupContext, GroupTemplate, IndexTemplate, LayoutContext, PostDetailContext,
    PostTemplate, ProfileContext, ProfileTemplate, comment_view, pager, post_card, post_cards,
    render_app_error, render_not_found_response, render_template_response,
};

use super::{CurrentUser, HttpState, db_health_response};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct PageQuery {
    page: Option<String>,
}

impl PageQuery {
    pub(super) fn request(&self) -> PageRequest {
        PageRequest::from_query(self.page.as_deref())
    }
}

/// Parse a numeric post id out of the URL. Non-numeric ids are treated like
/// any other unknown resource.
pub(super) fn parse_post_id(raw: &str) -> Option<i64> {
    raw.parse::<i64>().ok().filter(|&id| id > 0)
}

pub(super) async fn home(
    State(state): State<HttpState>,
    Extension(current): Extension<CurrentUser>,
    Query(query): Query<PageQuery>,
) -> Response {
    match state.feed.home_page(query.request()).await {
        Ok(page) => {
            let content = FeedContext {
                heading: "Latest posts".to_string(),
                posts: post_cards(&page),
                pager: pager(&page, "/"),
            };
            let view = LayoutContext::new("Latest posts", current.as_ref(), content);
            render_template_response(IndexTemplate { view }, StatusCode::OK)
        }
        Err(err) => render_app_error("infra::http::public::home", err, current.as_ref()),
    }
}

pub(super) async fn group_feed(
    State(state): State<HttpState>,
    Extension(current): Extension<CurrentUser>,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
) -> Response {
    match state.feed.group_page(&slug, query.request()).await {
        Ok(group_page) => {
            let base_path = format!("/group/{}", slug);
            let content = GroupContext {
                title: group_page.group.title.clone(),
                description: group_page.group.description.clone(),
                posts: post_cards(&group_page.posts),
                pager: pager(&group_page.posts, &base_path),
            };
            let view = LayoutContext::new(group_page.group.title, current.as_ref(), content);
            render_template_response(GroupTemplate { view }, StatusCode::OK)
        }
        Err(err) => render_app_error("infra::http::public::group_feed", err, current.as_ref()),
    }
}

pub(super) async fn profile(
    State(state): State<HttpState>,
    Extension(current): Extension<CurrentUser>,
    Path(username): Path<String>,
    Query(query): Query<PageQuery>,
) -> Response {
    match state
        .feed
        .profile_page(&username, current.as_ref(), query.request())
        .await
    {
        Ok(profile) => {
            let base_path = format!("/{}", profile.author.username);
            let is_self = current
                .as_ref()
                .is_some_and(|viewer| viewer.id == profile.author.id);
            let content = ProfileContext {
                username: profile.author.username.clone(),
                post_count: profile.posts.total_items,
                viewer_is_following: profile.viewer_is_following,
                show_follow_controls: current.as_ref().is_some() && !is_self,
                follow_href: format!("{base_path}/follow"),
                unfollow_href: format!("{base_path}/unfollow"),
                posts: post_cards(&profile.posts),
                pager: pager(&profile.posts, &base_path),
            };
            let view = LayoutContext::new(profile.author.username, current.as_ref(), content);
            render_template_response(ProfileTemplate { view }, StatusCode::OK)
        }
        Err(err) => render_app_error("infra::http::public::profile", err, current.as_ref()),
    }
}

pub(super) async fn post_detail(
    State(state): State<HttpState>,
    Extension(current): Extension<CurrentUser>,
    Path((username, post_id)): Path<(String, String)>,
) -> Response {
    let Some(post_id) = parse_post_id(&post_id) else {
        return render_not_found_response(current.as_ref());
    };

    match state.feed.post_detail(&username, post_id).await {
        Ok(detail) => {
            let can_edit = current
                .as_ref()
                .is_some_and(|viewer| viewer.id == detail.post.author_id);
            let base = format!("/{}/{}", detail.post.author_username, detail.post.id);
            let content = PostDetailContext {
                post: post_card(&detail.post),
                can_edit,
                edit_href: format!("{base}/edit"),
                comment_action: format!("{base}/comment"),
                show_comment_form: current.as_ref().is_some(),
                comments: detail.comments.iter().map(comment_view).collect(),
            };
            let title = format!("Post by {}", detail.post.author_username);
            let view = LayoutContext::new(title, current.as_ref(), content);
            render_template_response(PostTemplate { view }, StatusCode::OK)
        }
        Err(err) => render_app_error("infra::http::public::post_detail", err, current.as_ref()),
    }
}

pub(super) async fn serve_media(
    State(state): State<HttpState>,
    Path(path): Path<String>,
) -> Response {
    const SOURCE: &str = "infra::http::public::serve_media";

    match state.uploads.read(&path).await {
        Ok(bytes) => build_media_response(&path, bytes),
        Err(UploadStorageError::InvalidPath) => HttpError::new(
            SOURCE,
            StatusCode::NOT_FOUND,
            "Media not found",
            "The requested media file is not available",
        )
        .into_response(),
        Err(UploadStorageError::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => {
            HttpError::new(
                SOURCE,
                StatusCode::NOT_FOUND,
                "Media not found",
                "The requested media file is not available",
            )
            .into_response()
        }
        Err(err) => {
            error!(
                target = SOURCE,
                path = %path,
                error = %err,
                "failed to read stored media"
            );
            HttpError::new(
                SOURCE,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to read media file",
                err.to_string(),
            )
            .into_response()
        }
    }
}

fn build_media_response(path: &str, bytes: Bytes) -> Response {
    let mut response = Response::new(Body::from(bytes.clone()));
    *response.status_mut() = StatusCode::OK;

    let headers = response.headers_mut();
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    if let Ok(value) = HeaderValue::from_str(mime.as_ref()) {
        headers.insert(CONTENT_TYPE, value);
    }
    if let Ok(value) = HeaderValue::from_str(&bytes.len().to_string()) {
        headers.insert(CONTENT_LENGTH, value);
    }
    headers.insert(
        CACHE_CONTROL,
        HeaderValue::from_static("public, max-age=31536000, immutable"),
    );

    response
}

pub(super) async fn health(State(state): State<HttpState>) -> Response {
    db_health_response(state.health.health_check().await)
}

pub(super) async fn fallback(Extension(current): Extension<CurrentUser>) -> Response {
    render_not_found_response(current.as_ref())
}
