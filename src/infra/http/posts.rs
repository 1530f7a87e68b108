//! Post authoring handlers: the form, creation, and author-only editing.

use axum::{
    Extension,
    extract::{Path, State},
    http::{StatusCode, Uri},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::Multipart;
use tracing::error;

use crate::application::error::HttpError;
use crate::application::posts::{CreateOutcome, EditLookup, EditOutcome, ImagePayload, PostInput};
use crate::domain::entities::{GroupRecord, UserRecord};
use crate::presentation::views::{
    LayoutContext, PostFormContext, PostFormErrorView, PostFormTemplate, group_choices,
    render_app_error, render_not_found_response, render_template_response,
};

use super::{CurrentUser, HttpState, auth::require_user, public};

const SOURCE_BASE: &str = "infra::http::posts";

/// The post form fields as they came off the multipart stream.
#[derive(Default)]
struct PostFormPayload {
    text: String,
    group_raw: Option<String>,
    image: Option<ImagePayload>,
}

enum PostPayloadError {
    PayloadTooLarge,
    InvalidFormData,
}

impl PostPayloadError {
    fn into_response(self) -> Response {
        match self {
            Self::PayloadTooLarge => HttpError::new(
                SOURCE_BASE,
                StatusCode::PAYLOAD_TOO_LARGE,
                "Uploaded file is too large",
                "multipart payload exceeded the configured body limit",
            )
            .into_response(),
            Self::InvalidFormData => HttpError::new(
                SOURCE_BASE,
                StatusCode::BAD_REQUEST,
                "Form could not be read",
                "multipart payload was malformed",
            )
            .into_response(),
        }
    }
}

async fn read_post_form(multipart: &mut Multipart) -> Result<PostFormPayload, PostPayloadError> {
    let mut payload = PostFormPayload::default();

    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => match field.name() {
                Some("text") => {
                    payload.text = field
                        .text()
                        .await
                        .map_err(|_| PostPayloadError::InvalidFormData)?;
                }
                Some("group") => {
                    let value = field
                        .text()
                        .await
                        .map_err(|_| PostPayloadError::InvalidFormData)?
                        .trim()
                        .to_string();
                    if !value.is_empty() {
                        payload.group_raw = Some(value);
                    }
                }
                Some("image") => {
                    let filename = field
                        .file_name()
                        .map(|value| value.to_string())
                        .filter(|value| !value.trim().is_empty());

                    // Browsers submit an empty file part when nothing was
                    // selected.
                    let Some(filename) = filename else {
                        continue;
                    };

                    let bytes = field
                        .bytes()
                        .await
                        .map_err(|err| match err.status() {
                            StatusCode::PAYLOAD_TOO_LARGE => PostPayloadError::PayloadTooLarge,
                            _ => PostPayloadError::InvalidFormData,
                        })?;

                    if !bytes.is_empty() {
                        payload.image = Some(ImagePayload { filename, bytes });
                    }
                }
                _ => continue,
            },
            Ok(None) => break,
            Err(err) => {
                let status = err.status();
                error!(
                    target = SOURCE_BASE,
                    status = status.as_u16(),
                    error = %err,
                    "failed to read multipart post form"
                );
                return Err(match status {
                    StatusCode::PAYLOAD_TOO_LARGE => PostPayloadError::PayloadTooLarge,
                    _ => PostPayloadError::InvalidFormData,
                });
            }
        }
    }

    Ok(payload)
}

struct FormScreen<'a> {
    heading: &'a str,
    action: String,
    submit_label: &'a str,
}

fn new_post_screen() -> FormScreen<'static> {
    FormScreen {
        heading: "New post",
        action: "/new".to_string(),
        submit_label: "Publish",
    }
}

fn edit_post_screen(username: &str, post_id: i64) -> FormScreen<'static> {
    FormScreen {
        heading: "Edit post",
        action: format!("/{username}/{post_id}/edit"),
        submit_label: "Save",
    }
}

fn render_post_form(
    user: &UserRecord,
    screen: FormScreen<'_>,
    groups: &[GroupRecord],
    text: String,
    selected_group: Option<i64>,
    errors: PostFormErrorView,
) -> Response {
    let content = PostFormContext {
        heading: screen.heading.to_string(),
        action: screen.action,
        submit_label: screen.submit_label.to_string(),
        text,
        groups: group_choices(groups, selected_group),
        errors,
    };
    let view = LayoutContext::new(screen.heading, Some(user), content);
    render_template_response(PostFormTemplate { view }, StatusCode::OK)
}

pub(super) async fn new_post_form(
    State(state): State<HttpState>,
    Extension(current): Extension<CurrentUser>,
    uri: Uri,
) -> Response {
    let user = match require_user(&current, &uri) {
        Ok(user) => user,
        Err(redirect) => return redirect,
    };

    let groups = match state.posts.group_choices().await {
        Ok(groups) => groups,
        Err(err) => return render_app_error(SOURCE_BASE, err, Some(&user)),
    };

    render_post_form(
        &user,
        new_post_screen(),
        &groups,
        String::new(),
        None,
        PostFormErrorView::default(),
    )
}

pub(super) async fn create_post(
    State(state): State<HttpState>,
    Extension(current): Extension<CurrentUser>,
    uri: Uri,
    mut multipart: Multipart,
) -> Response {
    let user = match require_user(&current, &uri) {
        Ok(user) => user,
        Err(redirect) => return redirect,
    };

    let payload = match read_post_form(&mut multipart).await {
        Ok(payload) => payload,
        Err(err) => return err.into_response(),
    };

    let groups = match state.posts.group_choices().await {
        Ok(groups) => groups,
        Err(err) => return render_app_error(SOURCE_BASE, err, Some(&user)),
    };

    // A group value that is not an id can only come from a tampered form;
    // surface it as a field error like any other bad choice.
    let group_id = match payload.group_raw.as_deref().map(str::parse::<i64>) {
        None => None,
        Some(Ok(id)) => Some(id),
        Some(Err(_)) => {
            return render_post_form(
                &user,
                new_post_screen(),
                &groups,
                payload.text,
                None,
                PostFormErrorView {
                    group: Some("Selected group does not exist"),
                    ..Default::default()
                },
            );
        }
    };

    let input = PostInput {
        text: payload.text.clone(),
        group_id,
        image: payload.image,
    };

    match state.posts.create(&user, input).await {
        Ok(CreateOutcome::Created(_)) => Redirect::to("/").into_response(),
        Ok(CreateOutcome::Invalid(errors)) => render_post_form(
            &user,
            new_post_screen(),
            &groups,
            payload.text,
            group_id,
            errors.into(),
        ),
        Err(err) => render_app_error(SOURCE_BASE, err, Some(&user)),
    }
}

pub(super) async fn edit_post_form(
    State(state): State<HttpState>,
    Extension(current): Extension<CurrentUser>,
    Path((username, post_id)): Path<(String, String)>,
    uri: Uri,
) -> Response {
    let user = match require_user(&current, &uri) {
        Ok(user) => user,
        Err(redirect) => return redirect,
    };

    let Some(post_id) = public::parse_post_id(&post_id) else {
        return render_not_found_response(Some(&user));
    };

    match state.posts.post_for_edit(&user, &username, post_id).await {
        Ok(EditLookup::Editable(post)) => {
            let groups = match state.posts.group_choices().await {
                Ok(groups) => groups,
                Err(err) => return render_app_error(SOURCE_BASE, err, Some(&user)),
            };
            let selected = post.group.as_ref().map(|group| group.id);
            render_post_form(
                &user,
                edit_post_screen(&username, post_id),
                &groups,
                post.text,
                selected,
                PostFormErrorView::default(),
            )
        }
        Ok(EditLookup::NotAuthor(post)) => {
            Redirect::to(&format!("/{}/{}", post.author_username, post.id)).into_response()
        }
        Err(err) => render_app_error(SOURCE_BASE, err, Some(&user)),
    }
}

pub(super) async fn update_post(
    State(state): State<HttpState>,
    Extension(current): Extension<CurrentUser>,
    Path((username, post_id)): Path<(String, String)>,
    uri: Uri,
    mut multipart: Multipart,
) -> Response {
    let user = match require_user(&current, &uri) {
        Ok(user) => user,
        Err(redirect) => return redirect,
    };

    let Some(post_id) = public::parse_post_id(&post_id) else {
        return render_not_found_response(Some(&user));
    };

    let payload = match read_post_form(&mut multipart).await {
        Ok(payload) => payload,
        Err(err) => return err.into_response(),
    };

    let groups = match state.posts.group_choices().await {
        Ok(groups) => groups,
        Err(err) => return render_app_error(SOURCE_BASE, err, Some(&user)),
    };

    let group_id = match payload.group_raw.as_deref().map(str::parse::<i64>) {
        None => None,
        Some(Ok(id)) => Some(id),
        Some(Err(_)) => {
            return render_post_form(
                &user,
                edit_post_screen(&username, post_id),
                &groups,
                payload.text,
                None,
                PostFormErrorView {
                    group: Some("Selected group does not exist"),
                    ..Default::default()
                },
            );
        }
    };

    let input = PostInput {
        text: payload.text.clone(),
        group_id,
        image: payload.image,
    };

    match state.posts.edit(&user, &username, post_id, input).await {
        Ok(EditOutcome::Updated(post)) => {
            Redirect::to(&format!("/{}/{}", post.author_username, post.id)).into_response()
        }
        Ok(EditOutcome::NotAuthor(post)) => {
            Redirect::to(&format!("/{}/{}", post.author_username, post.id)).into_response()
        }
        Ok(EditOutcome::Invalid { errors, .. }) => render_post_form(
            &user,
            edit_post_screen(&username, post_id),
            &groups,
            payload.text,
            group_id,
            errors.into(),
        ),
        Err(err) => render_app_error(SOURCE_BASE, err, Some(&user)),
    }
}
