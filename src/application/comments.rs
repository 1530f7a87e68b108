//! Commenting on posts.

use std::sync::Arc;

use crate::application::error::AppError;
use crate::application::repos::{CommentsRepo, PostsRepo};
use crate::domain::entities::{CommentRecord, UserRecord};

pub enum CommentOutcome {
    Added(CommentRecord),
    /// Empty text; nothing is created and the caller redirects back to the
    /// post view.
    Empty,
}

pub struct CommentService {
    posts: Arc<dyn PostsRepo>,
    comments: Arc<dyn CommentsRepo>,
}

impl CommentService {
    pub fn new(posts: Arc<dyn PostsRepo>, comments: Arc<dyn CommentsRepo>) -> Self {
        Self { posts, comments }
    }

    /// Attach a comment to the post addressed by author username and id.
    pub async fn add(
        &self,
        commenter: &UserRecord,
        username: &str,
        post_id: i64,
        text: &str,
    ) -> Result<CommentOutcome, AppError> {
        let post = self
            .posts
            .find_post(username, post_id)
            .await?
            .ok_or(AppError::NotFound)?;

        let text = text.trim();
        if text.is_empty() {
            return Ok(CommentOutcome::Empty);
        }

        let comment = self
            .comments
            .create_comment(post.id, commenter.id, text)
            .await?;

        Ok(CommentOutcome::Added(comment))
    }
}
