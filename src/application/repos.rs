//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::entities::{
    CommentRecord, GroupRecord, PostRecord, UserRecord, UserWithPassword,
};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("integrity error: {message}")]
    Integrity { message: String },
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }

    pub fn duplicate(constraint: impl Into<String>) -> Self {
        Self::Duplicate {
            constraint: constraint.into(),
        }
    }

    pub fn integrity(message: impl Into<String>) -> Self {
        Self::Integrity {
            message: message.into(),
        }
    }
}

/// Which slice of the post table a listing covers. Every feed is the same
/// reverse-chronological query under a different filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostFeedScope {
    /// All posts, newest first (home feed).
    Home,
    /// Posts filed into one group.
    Group(i64),
    /// Posts written by one author.
    Author(i64),
    /// Posts whose authors the given user follows.
    FollowedBy(i64),
}

#[derive(Debug, Clone)]
pub struct NewPostParams {
    pub author_id: i64,
    pub text: String,
    pub group_id: Option<i64>,
    pub image_path: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UpdatePostParams {
    pub id: i64,
    pub text: String,
    pub group_id: Option<i64>,
    /// `None` leaves the stored image untouched.
    pub image_path: Option<String>,
}

#[async_trait]
pub trait UsersRepo: Send + Sync {
    /// Insert a new user. Returns [`RepoError::Duplicate`] when the username
    /// is already taken.
    async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<UserRecord, RepoError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, RepoError>;

    async fn find_with_password(
        &self,
        username: &str,
    ) -> Result<Option<UserWithPassword>, RepoError>;
}

#[async_trait]
pub trait SessionsRepo: Send + Sync {
    async fn create_session(
        &self,
        token: Uuid,
        user_id: i64,
        expires_at: OffsetDateTime,
    ) -> Result<(), RepoError>;

    /// Resolve a session token to its user. Expired sessions resolve to
    /// `None` exactly like unknown tokens.
    async fn find_user_by_token(&self, token: Uuid) -> Result<Option<UserRecord>, RepoError>;

    async fn delete_session(&self, token: Uuid) -> Result<(), RepoError>;
}

#[async_trait]
pub trait GroupsRepo: Send + Sync {
    async fn find_by_slug(&self, slug: &str) -> Result<Option<GroupRecord>, RepoError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<GroupRecord>, RepoError>;

    /// All groups ordered by title, for the post form selector.
    async fn list_groups(&self) -> Result<Vec<GroupRecord>, RepoError>;
}

#[async_trait]
pub trait PostsRepo: Send + Sync {
    async fn count_posts(&self, scope: PostFeedScope) -> Result<u64, RepoError>;

    /// One page of a feed, newest first.
    async fn list_posts(
        &self,
        scope: PostFeedScope,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<PostRecord>, RepoError>;

    /// Look up a post by id, additionally requiring the author's username to
    /// match the one in the URL.
    async fn find_post(
        &self,
        author_username: &str,
        post_id: i64,
    ) -> Result<Option<PostRecord>, RepoError>;

    async fn create_post(&self, params: NewPostParams) -> Result<PostRecord, RepoError>;

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError>;
}

#[async_trait]
pub trait CommentsRepo: Send + Sync {
    /// Comments on a post, newest first.
    async fn list_for_post(&self, post_id: i64) -> Result<Vec<CommentRecord>, RepoError>;

    async fn create_comment(
        &self,
        post_id: i64,
        author_id: i64,
        text: &str,
    ) -> Result<CommentRecord, RepoError>;
}

#[async_trait]
pub trait FollowsRepo: Send + Sync {
    async fn is_following(&self, user_id: i64, author_id: i64) -> Result<bool, RepoError>;

    /// Insert the edge unless it already exists. Returns `true` when a new
    /// edge was created.
    async fn create_follow(&self, user_id: i64, author_id: i64) -> Result<bool, RepoError>;

    /// Delete the edge. Returns `true` when an edge existed.
    async fn delete_follow(&self, user_id: i64, author_id: i64) -> Result<bool, RepoError>;
}

/// Liveness probe over whatever backs the repositories.
#[async_trait]
pub trait DbHealth: Send + Sync {
    async fn health_check(&self) -> Result<(), RepoError>;
}
