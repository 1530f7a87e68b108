//! HTTP layer: router assembly, shared state, and middleware.

pub mod auth;
mod comments;
mod follows;
mod middleware;
pub mod posts;
pub mod public;

use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::StatusCode,
    middleware as axum_middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};

use crate::application::{
    auth::AuthService, comments::CommentService, feed::FeedService, follows::FollowService,
    posts::PostService, repos::DbHealth,
};
use crate::infra::cache::{PageCache, page_cache_layer};
use crate::infra::uploads::UploadStorage;

pub use auth::CurrentUser;
pub use middleware::RequestContext;

#[derive(Clone)]
pub struct HttpState {
    pub feed: Arc<FeedService>,
    pub posts: Arc<PostService>,
    pub comments: Arc<CommentService>,
    pub follows: Arc<FollowService>,
    pub auth: Arc<AuthService>,
    pub uploads: Arc<UploadStorage>,
    pub health: Arc<dyn DbHealth>,
}

/// Assemble the public router. The page cache, when enabled, wraps only the
/// home feed route; everything else is rendered per-request.
pub fn build_router(state: HttpState, cache: Option<PageCache>, body_limit: usize) -> Router {
    let home = match cache {
        Some(cache) => get(public::home).layer(axum_middleware::from_fn_with_state(
            cache,
            page_cache_layer,
        )),
        None => get(public::home),
    };

    Router::new()
        .route("/", home)
        .route("/new", get(posts::new_post_form).post(posts::create_post))
        .route("/follow", get(follows::follow_index))
        .route("/group/{slug}", get(public::group_feed))
        .route("/auth/signup", get(auth::signup_form).post(auth::signup))
        .route("/auth/login", get(auth::login_form).post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/media/{*path}", get(public::serve_media))
        .route("/_health/db", get(public::health))
        .route("/{username}", get(public::profile))
        .route("/{username}/{post_id}", get(public::post_detail))
        .route(
            "/{username}/{post_id}/edit",
            get(posts::edit_post_form).post(posts::update_post),
        )
        .route("/{username}/{post_id}/comment", post(comments::add_comment))
        .route("/{username}/follow", get(follows::profile_follow))
        .route("/{username}/unfollow", get(follows::profile_unfollow))
        .fallback(public::fallback)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth::load_current_user,
        ))
        .layer(axum_middleware::from_fn(middleware::log_responses))
        .layer(axum_middleware::from_fn(middleware::set_request_context))
        .with_state(state)
}

pub(crate) fn db_health_response(result: Result<(), crate::application::repos::RepoError>) -> Response {
    match result {
        Ok(()) => (StatusCode::OK, "ok").into_response(),
        Err(err) => {
            tracing::error!(target = "canto::http::health", error = %err, "database health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "database unavailable").into_response()
        }
    }
}
