//! Follow graph handlers: the personalized feed, follow, and unfollow.

use axum::{
    Extension,
    extract::{Path, Query, State},
    http::{StatusCode, Uri},
    response::{IntoResponse, Redirect, Response},
};

use crate::presentation::views::{
    FeedContext, FollowTemplate, LayoutContext, pager, post_cards, render_app_error,
    render_template_response,
};

use super::{CurrentUser, HttpState, auth::require_user, public::PageQuery};

pub(super) async fn follow_index(
    State(state): State<HttpState>,
    Extension(current): Extension<CurrentUser>,
    uri: Uri,
    Query(query): Query<PageQuery>,
) -> Response {
    let user = match require_user(&current, &uri) {
        Ok(user) => user,
        Err(redirect) => return redirect,
    };

    match state.feed.follow_page(&user, query.request()).await {
        Ok(page) => {
            let content = FeedContext {
                heading: "Posts from authors you follow".to_string(),
                posts: post_cards(&page),
                pager: pager(&page, "/follow"),
            };
            let view = LayoutContext::new("Following", Some(&user), content);
            render_template_response(FollowTemplate { view }, StatusCode::OK)
        }
        Err(err) => render_app_error("infra::http::follows::follow_index", err, Some(&user)),
    }
}

pub(super) async fn profile_follow(
    State(state): State<HttpState>,
    Extension(current): Extension<CurrentUser>,
    Path(username): Path<String>,
    uri: Uri,
) -> Response {
    let user = match require_user(&current, &uri) {
        Ok(user) => user,
        Err(redirect) => return redirect,
    };

    match state.follows.follow(&user, &username).await {
        // Self-follows and duplicate follows are silent no-ops.
        Ok(_) => Redirect::to(&format!("/{username}")).into_response(),
        Err(err) => render_app_error("infra::http::follows::profile_follow", err, Some(&user)),
    }
}

pub(super) async fn profile_unfollow(
    State(state): State<HttpState>,
    Extension(current): Extension<CurrentUser>,
    Path(username): Path<String>,
    uri: Uri,
) -> Response {
    let user = match require_user(&current, &uri) {
        Ok(user) => user,
        Err(redirect) => return redirect,
    };

    match state.follows.unfollow(&user, &username).await {
        Ok(()) => Redirect::to(&format!("/{username}")).into_response(),
        Err(err) => render_app_error("infra::http::follows::profile_unfollow", err, Some(&user)),
    }
}
