//! Post authoring and editing.

use std::sync::Arc;

use bytes::Bytes;

use crate::application::error::AppError;
use crate::application::repos::{GroupsRepo, NewPostParams, PostsRepo, UpdatePostParams};
use crate::domain::entities::{GroupRecord, PostRecord, UserRecord};
use crate::infra::uploads::UploadStorage;

/// Raw form input for creating or editing a post.
#[derive(Debug, Default, Clone)]
pub struct PostInput {
    pub text: String,
    pub group_id: Option<i64>,
    pub image: Option<ImagePayload>,
}

/// An uploaded file as it came off the multipart stream.
#[derive(Debug, Clone)]
pub struct ImagePayload {
    pub filename: String,
    pub bytes: Bytes,
}

/// Field-level validation errors, rendered next to the offending inputs.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PostFormErrors {
    pub text: Option<&'static str>,
    pub group: Option<&'static str>,
    pub image: Option<&'static str>,
}

impl PostFormErrors {
    pub fn is_empty(&self) -> bool {
        self.text.is_none() && self.group.is_none() && self.image.is_none()
    }
}

/// Outcome of a create attempt.
pub enum CreateOutcome {
    Created(PostRecord),
    /// Validation failed; the caller re-renders the form with the errors and
    /// the submitted input preserved.
    Invalid(PostFormErrors),
}

/// Outcome of an edit attempt.
pub enum EditOutcome {
    Updated(PostRecord),
    /// Someone other than the author tried to edit; the caller redirects to
    /// the post view without touching it.
    NotAuthor(PostRecord),
    Invalid {
        post: PostRecord,
        errors: PostFormErrors,
    },
}

/// Result of loading a post for its edit form.
pub enum EditLookup {
    Editable(PostRecord),
    NotAuthor(PostRecord),
}

pub struct PostService {
    posts: Arc<dyn PostsRepo>,
    groups: Arc<dyn GroupsRepo>,
    uploads: Arc<UploadStorage>,
}

impl PostService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        groups: Arc<dyn GroupsRepo>,
        uploads: Arc<UploadStorage>,
    ) -> Self {
        Self {
            posts,
            groups,
            uploads,
        }
    }

    /// Groups for the form's selector, ordered by title.
    pub async fn group_choices(&self) -> Result<Vec<GroupRecord>, AppError> {
        Ok(self.groups.list_groups().await?)
    }

    pub async fn create(
        &self,
        author: &UserRecord,
        input: PostInput,
    ) -> Result<CreateOutcome, AppError> {
        let errors = self.validate(&input).await?;
        if !errors.is_empty() {
            return Ok(CreateOutcome::Invalid(errors));
        }

        let image_path = match input.image {
            Some(image) => Some(self.store_image(&image).await?),
            None => None,
        };

        let post = self
            .posts
            .create_post(NewPostParams {
                author_id: author.id,
                text: input.text.trim().to_string(),
                group_id: input.group_id,
                image_path,
            })
            .await?;

        Ok(CreateOutcome::Created(post))
    }

    /// Edit a post addressed by author username and id. Only the author may
    /// modify it; anyone else is bounced back to the post view.
    pub async fn edit(
        &self,
        editor: &UserRecord,
        username: &str,
        post_id: i64,
        input: PostInput,
    ) -> Result<EditOutcome, AppError> {
        let post = self
            .posts
            .find_post(username, post_id)
            .await?
            .ok_or(AppError::NotFound)?;

        if post.author_id != editor.id {
            return Ok(EditOutcome::NotAuthor(post));
        }

        let errors = self.validate(&input).await?;
        if !errors.is_empty() {
            return Ok(EditOutcome::Invalid { post, errors });
        }

        let replaced_image = post.image_path.clone();
        let image_path = match input.image {
            Some(image) => Some(self.store_image(&image).await?),
            None => None,
        };
        let replacing = image_path.is_some();

        let updated = self
            .posts
            .update_post(UpdatePostParams {
                id: post.id,
                text: input.text.trim().to_string(),
                group_id: input.group_id,
                image_path,
            })
            .await?;

        if replacing && let Some(old) = replaced_image {
            // Old attachment is unreferenced once the row points elsewhere.
            if let Err(err) = self.uploads.delete(&old).await {
                tracing::warn!(
                    target = "canto::posts",
                    path = %old,
                    error = %err,
                    "failed to remove replaced post image"
                );
            }
        }

        Ok(EditOutcome::Updated(updated))
    }

    /// Load the post for the edit form, distinguishing the author from
    /// everyone else.
    pub async fn post_for_edit(
        &self,
        editor: &UserRecord,
        username: &str,
        post_id: i64,
    ) -> Result<EditLookup, AppError> {
        let post = self
            .posts
            .find_post(username, post_id)
            .await?
            .ok_or(AppError::NotFound)?;

        if post.author_id != editor.id {
            return Ok(EditLookup::NotAuthor(post));
        }

        Ok(EditLookup::Editable(post))
    }

    async fn validate(&self, input: &PostInput) -> Result<PostFormErrors, AppError> {
        let mut errors = PostFormErrors::default();

        if input.text.trim().is_empty() {
            errors.text = Some("Post text must not be empty");
        }

        if let Some(group_id) = input.group_id
            && self.groups.find_by_id(group_id).await?.is_none()
        {
            errors.group = Some("Selected group does not exist");
        }

        if let Some(image) = input.image.as_ref()
            && imagesize::blob_size(&image.bytes).is_err()
        {
            errors.image = Some("Upload a valid image file");
        }

        Ok(errors)
    }

    async fn store_image(&self, image: &ImagePayload) -> Result<String, AppError> {
        let stored = self
            .uploads
            .store(&image.filename, image.bytes.clone())
            .await
            .map_err(|err| AppError::unexpected(format!("failed to store image: {err}")))?;
        Ok(stored.stored_path)
    }
}
