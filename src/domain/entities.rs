//! Domain entities mirrored from persistent storage.

use serde::Serialize;
use time::OffsetDateTime;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserRecord {
    pub id: i64,
    pub username: String,
    pub joined_at: OffsetDateTime,
}

/// A user together with their stored password hash. Only the login path
/// should ever hold one of these.
#[derive(Debug, Clone)]
pub struct UserWithPassword {
    pub user: UserRecord,
    pub password_hash: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupRecord {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub description: String,
}

/// The slice of a group a post carries around for display and linking.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupRef {
    pub id: i64,
    pub slug: String,
    pub title: String,
}

/// A post joined with its author and optional group, the shape every feed
/// and detail view consumes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostRecord {
    pub id: i64,
    pub text: String,
    pub pub_date: OffsetDateTime,
    pub author_id: i64,
    pub author_username: String,
    pub group: Option<GroupRef>,
    pub image_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommentRecord {
    pub id: i64,
    pub post_id: i64,
    pub author_id: Option<i64>,
    pub author_username: Option<String>,
    pub text: String,
    pub created: OffsetDateTime,
}

