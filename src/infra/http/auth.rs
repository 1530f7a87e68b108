//! Session cookie handling, the current-user middleware, and the signup /
//! login / logout handlers.

use axum::{
    Extension, Form,
    body::Body,
    extract::{Query, State},
    http::{Request, StatusCode, Uri},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use tracing::warn;
use uuid::Uuid;

use crate::application::auth::{LoginOutcome, SignupOutcome};
use crate::domain::entities::UserRecord;
use crate::presentation::views::{
    LayoutContext, LoginContext, LoginTemplate, SignupContext, SignupErrorView, SignupTemplate,
    render_app_error, render_template_response,
};

use super::HttpState;

pub const SESSION_COOKIE: &str = "canto_session";

/// The resolved session user, stashed in request extensions by
/// [`load_current_user`]. `None` means anonymous.
#[derive(Clone, Default)]
pub struct CurrentUser(pub Option<UserRecord>);

impl CurrentUser {
    pub fn as_ref(&self) -> Option<&UserRecord> {
        self.0.as_ref()
    }
}

/// Resolve the session cookie to a user on every request. Unknown, expired,
/// and malformed tokens all mean anonymous; a failing lookup is logged and
/// treated the same rather than breaking page loads.
pub async fn load_current_user(
    State(state): State<HttpState>,
    jar: CookieJar,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let token = jar
        .get(SESSION_COOKIE)
        .and_then(|cookie| Uuid::parse_str(cookie.value()).ok());

    let user = match token {
        Some(token) => match state.auth.resolve_session(token).await {
            Ok(user) => user,
            Err(err) => {
                warn!(
                    target = "canto::http::auth",
                    error = %err,
                    "session lookup failed; treating request as anonymous"
                );
                None
            }
        },
        None => None,
    };

    request.extensions_mut().insert(CurrentUser(user));
    next.run(request).await
}

/// Demand a logged-in user, or produce the login redirect for the handler
/// to return.
pub fn require_user(current: &CurrentUser, uri: &Uri) -> Result<UserRecord, Response> {
    match current.as_ref() {
        Some(user) => Ok(user.clone()),
        None => {
            let target = format!("/auth/login?next={}", uri.path());
            Err(Redirect::to(&target).into_response())
        }
    }
}

/// Only same-site absolute paths are allowed as post-login destinations.
fn sanitize_next(next: &str) -> &str {
    if next.starts_with('/') && !next.starts_with("//") {
        next
    } else {
        "/"
    }
}

fn session_cookie(token: Uuid) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token.to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct LoginQuery {
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct LoginForm {
    username: String,
    password: String,
    #[serde(default)]
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct SignupForm {
    username: String,
    password: String,
}

fn render_login(user: Option<&UserRecord>, content: LoginContext, status: StatusCode) -> Response {
    let view = LayoutContext::new("Log in", user, content);
    render_template_response(LoginTemplate { view }, status)
}

fn render_signup(
    user: Option<&UserRecord>,
    content: SignupContext,
    status: StatusCode,
) -> Response {
    let view = LayoutContext::new("Sign up", user, content);
    render_template_response(SignupTemplate { view }, status)
}

pub(super) async fn login_form(
    Extension(current): Extension<CurrentUser>,
    Query(query): Query<LoginQuery>,
) -> Response {
    if current.as_ref().is_some() {
        return Redirect::to("/").into_response();
    }

    let content = LoginContext {
        username: String::new(),
        next: query.next.unwrap_or_default(),
        error: None,
    };
    render_login(None, content, StatusCode::OK)
}

pub(super) async fn login(
    State(state): State<HttpState>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Response {
    let next = form.next.clone().unwrap_or_default();

    match state.auth.login(&form.username, &form.password).await {
        Ok(LoginOutcome::LoggedIn { token, .. }) => {
            let jar = jar.add(session_cookie(token));
            let target = sanitize_next(&next).to_string();
            (jar, Redirect::to(&target)).into_response()
        }
        Ok(LoginOutcome::InvalidCredentials) => {
            let content = LoginContext {
                username: form.username,
                next,
                error: Some("Unknown username or wrong password"),
            };
            render_login(None, content, StatusCode::OK)
        }
        Err(err) => render_app_error("infra::http::auth::login", err, None),
    }
}

pub(super) async fn signup_form(Extension(current): Extension<CurrentUser>) -> Response {
    if current.as_ref().is_some() {
        return Redirect::to("/").into_response();
    }

    let content = SignupContext {
        username: String::new(),
        errors: SignupErrorView::default(),
    };
    render_signup(None, content, StatusCode::OK)
}

pub(super) async fn signup(
    State(state): State<HttpState>,
    jar: CookieJar,
    Form(form): Form<SignupForm>,
) -> Response {
    match state.auth.signup(&form.username, &form.password).await {
        Ok(SignupOutcome::SignedUp { token, .. }) => {
            let jar = jar.add(session_cookie(token));
            (jar, Redirect::to("/")).into_response()
        }
        Ok(SignupOutcome::Invalid(errors)) => {
            let content = SignupContext {
                username: form.username,
                errors: SignupErrorView {
                    username: errors.username,
                    password: errors.password,
                },
            };
            render_signup(None, content, StatusCode::OK)
        }
        Err(err) => render_app_error("infra::http::auth::signup", err, None),
    }
}

pub(super) async fn logout(State(state): State<HttpState>, jar: CookieJar) -> Response {
    if let Some(token) = jar
        .get(SESSION_COOKIE)
        .and_then(|cookie| Uuid::parse_str(cookie.value()).ok())
        && let Err(err) = state.auth.logout(token).await
    {
        warn!(target = "canto::http::auth", error = %err, "failed to delete session on logout");
    }

    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    (jar, Redirect::to("/")).into_response()
}
