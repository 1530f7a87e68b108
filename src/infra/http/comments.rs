//! Comment submission.

use axum::{
    Extension, Form,
    extract::{Path, State},
    http::Uri,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;

use crate::application::comments::CommentOutcome;
use crate::presentation::views::{render_app_error, render_not_found_response};

use super::{CurrentUser, HttpState, auth::require_user, public};

#[derive(Debug, Deserialize)]
pub(super) struct CommentForm {
    #[serde(default)]
    text: String,
}

pub(super) async fn add_comment(
    State(state): State<HttpState>,
    Extension(current): Extension<CurrentUser>,
    Path((username, post_id)): Path<(String, String)>,
    uri: Uri,
    Form(form): Form<CommentForm>,
) -> Response {
    let user = match require_user(&current, &uri) {
        Ok(user) => user,
        Err(redirect) => return redirect,
    };

    let Some(post_id) = public::parse_post_id(&post_id) else {
        return render_not_found_response(Some(&user));
    };

    match state
        .comments
        .add(&user, &username, post_id, &form.text)
        .await
    {
        // Both outcomes land back on the post view; an empty comment simply
        // creates nothing.
        Ok(CommentOutcome::Added(_)) | Ok(CommentOutcome::Empty) => {
            Redirect::to(&format!("/{username}/{post_id}")).into_response()
        }
        Err(err) => render_app_error("infra::http::comments::add_comment", err, Some(&user)),
    }
}
