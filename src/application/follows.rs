//! The follow graph: directed edges from readers to authors.

use std::sync::Arc;

use crate::application::error::AppError;
use crate::application::repos::{FollowsRepo, UsersRepo};
use crate::domain::entities::UserRecord;

/// What happened on a follow attempt. All three outcomes redirect to the
/// author's profile; only `Followed` changed anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowOutcome {
    Followed,
    AlreadyFollowing,
    SelfFollow,
}

pub struct FollowService {
    users: Arc<dyn UsersRepo>,
    follows: Arc<dyn FollowsRepo>,
}

impl FollowService {
    pub fn new(users: Arc<dyn UsersRepo>, follows: Arc<dyn FollowsRepo>) -> Self {
        Self { users, follows }
    }

    /// Follow `username` as `follower`, with get-or-create semantics.
    /// Self-follows are skipped rather than rejected.
    pub async fn follow(
        &self,
        follower: &UserRecord,
        username: &str,
    ) -> Result<FollowOutcome, AppError> {
        let author = self
            .users
            .find_by_username(username)
            .await?
            .ok_or(AppError::NotFound)?;

        if author.id == follower.id {
            return Ok(FollowOutcome::SelfFollow);
        }

        let created = self.follows.create_follow(follower.id, author.id).await?;
        Ok(if created {
            FollowOutcome::Followed
        } else {
            FollowOutcome::AlreadyFollowing
        })
    }

    /// Remove the edge. `NotFound` when either the author or the edge does
    /// not exist.
    pub async fn unfollow(&self, follower: &UserRecord, username: &str) -> Result<(), AppError> {
        let author = self
            .users
            .find_by_username(username)
            .await?
            .ok_or(AppError::NotFound)?;

        let deleted = self.follows.delete_follow(follower.id, author.id).await?;
        if !deleted {
            return Err(AppError::NotFound);
        }

        Ok(())
    }

    pub async fn is_following(
        &self,
        follower: &UserRecord,
        author: &UserRecord,
    ) -> Result<bool, AppError> {
        Ok(self.follows.is_following(follower.id, author.id).await?)
    }
}
