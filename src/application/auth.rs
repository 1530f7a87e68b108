//! Accounts and sessions: signup, login, logout, and session resolution.

use std::sync::Arc;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier as _, SaltString},
};
use rand::RngCore;
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::application::error::AppError;
use crate::application::repos::{RepoError, SessionsRepo, UsersRepo};
use crate::domain::entities::UserRecord;

/// How long a login session stays valid.
const SESSION_TTL: Duration = Duration::days(14);

const USERNAME_MAX_LEN: usize = 150;
const PASSWORD_MIN_LEN: usize = 8;

/// Field-level signup validation errors.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SignupErrors {
    pub username: Option<&'static str>,
    pub password: Option<&'static str>,
}

impl SignupErrors {
    pub fn is_empty(&self) -> bool {
        self.username.is_none() && self.password.is_none()
    }
}

pub enum SignupOutcome {
    SignedUp { user: UserRecord, token: Uuid },
    Invalid(SignupErrors),
}

pub enum LoginOutcome {
    LoggedIn { user: UserRecord, token: Uuid },
    /// Unknown username or wrong password; deliberately indistinct.
    InvalidCredentials,
}

#[derive(Debug, Error)]
pub enum PasswordHashError {
    #[error("failed to hash password: {0}")]
    Hash(String),
}

pub struct AuthService {
    users: Arc<dyn UsersRepo>,
    sessions: Arc<dyn SessionsRepo>,
}

impl AuthService {
    pub fn new(users: Arc<dyn UsersRepo>, sessions: Arc<dyn SessionsRepo>) -> Self {
        Self { users, sessions }
    }

    pub async fn signup(
        &self,
        username: &str,
        password: &str,
    ) -> Result<SignupOutcome, AppError> {
        let username = username.trim();
        let mut errors = SignupErrors::default();

        if username.is_empty() {
            errors.username = Some("Pick a username");
        } else if username.len() > USERNAME_MAX_LEN {
            errors.username = Some("Username is too long");
        } else if !username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        {
            errors.username = Some("Usernames may contain letters, digits, and _ . - only");
        }

        if password.len() < PASSWORD_MIN_LEN {
            errors.password = Some("Password must be at least 8 characters");
        }

        if !errors.is_empty() {
            return Ok(SignupOutcome::Invalid(errors));
        }

        let password_hash = hash_password(password)
            .map_err(|err| AppError::unexpected(err.to_string()))?;

        let user = match self.users.create_user(username, &password_hash).await {
            Ok(user) => user,
            Err(RepoError::Duplicate { .. }) => {
                return Ok(SignupOutcome::Invalid(SignupErrors {
                    username: Some("That username is already taken"),
                    password: None,
                }));
            }
            Err(err) => return Err(err.into()),
        };

        let token = self.open_session(&user).await?;
        Ok(SignupOutcome::SignedUp { user, token })
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<LoginOutcome, AppError> {
        let Some(record) = self.users.find_with_password(username.trim()).await? else {
            return Ok(LoginOutcome::InvalidCredentials);
        };

        if !verify_password(password, &record.password_hash) {
            return Ok(LoginOutcome::InvalidCredentials);
        }

        let token = self.open_session(&record.user).await?;
        Ok(LoginOutcome::LoggedIn {
            user: record.user,
            token,
        })
    }

    pub async fn logout(&self, token: Uuid) -> Result<(), AppError> {
        self.sessions.delete_session(token).await?;
        Ok(())
    }

    /// Resolve a session cookie to the logged-in user, if any.
    pub async fn resolve_session(&self, token: Uuid) -> Result<Option<UserRecord>, AppError> {
        Ok(self.sessions.find_user_by_token(token).await?)
    }

    async fn open_session(&self, user: &UserRecord) -> Result<Uuid, AppError> {
        let token = Uuid::new_v4();
        let expires_at = OffsetDateTime::now_utc() + SESSION_TTL;
        self.sessions
            .create_session(token, user.id, expires_at)
            .await?;
        Ok(token)
    }
}

/// Hash a password with Argon2id and a fresh OS-random salt, producing a PHC
/// string suitable for storage.
pub fn hash_password(password: &str) -> Result<String, PasswordHashError> {
    let mut salt_bytes = [0u8; 16];
    rand::rngs::OsRng.fill_bytes(&mut salt_bytes);

    let salt =
        SaltString::encode_b64(&salt_bytes).map_err(|err| PasswordHashError::Hash(err.to_string()))?;

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| PasswordHashError::Hash(err.to_string()))
}

/// Verify a password against a stored PHC string. Unparsable hashes count as
/// a mismatch.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}
