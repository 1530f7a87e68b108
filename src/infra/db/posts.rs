use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;

use crate::application::repos::{
    NewPostParams, PostFeedScope, PostsRepo, RepoError, UpdatePostParams,
};
use crate::domain::entities::{GroupRef, PostRecord};

use super::{PostgresRepositories, map_sqlx_error};

const POST_SELECT: &str = "SELECT p.id, p.text, p.pub_date, p.author_id, \
     u.username AS author_username, \
     g.id AS group_id, g.slug AS group_slug, g.title AS group_title, \
     p.image_path \
     FROM posts p \
     INNER JOIN users u ON u.id = p.author_id \
     LEFT JOIN groups g ON g.id = p.group_id ";

#[derive(sqlx::FromRow)]
struct PostRow {
    id: i64,
    text: String,
    pub_date: OffsetDateTime,
    author_id: i64,
    author_username: String,
    group_id: Option<i64>,
    group_slug: Option<String>,
    group_title: Option<String>,
    image_path: Option<String>,
}

impl From<PostRow> for PostRecord {
    fn from(row: PostRow) -> Self {
        let group = match (row.group_id, row.group_slug, row.group_title) {
            (Some(id), Some(slug), Some(title)) => Some(GroupRef { id, slug, title }),
            _ => None,
        };

        Self {
            id: row.id,
            text: row.text,
            pub_date: row.pub_date,
            author_id: row.author_id,
            author_username: row.author_username,
            group,
            image_path: row.image_path,
        }
    }
}

fn apply_scope_condition(qb: &mut QueryBuilder<'_, Postgres>, scope: PostFeedScope) {
    match scope {
        PostFeedScope::Home => {}
        PostFeedScope::Group(group_id) => {
            qb.push(" AND p.group_id = ");
            qb.push_bind(group_id);
        }
        PostFeedScope::Author(author_id) => {
            qb.push(" AND p.author_id = ");
            qb.push_bind(author_id);
        }
        PostFeedScope::FollowedBy(user_id) => {
            qb.push(
                " AND EXISTS (SELECT 1 FROM follows f \
                 WHERE f.user_id = ",
            );
            qb.push_bind(user_id);
            qb.push(" AND f.author_id = p.author_id)");
        }
    }
}

impl PostgresRepositories {
    async fn post_by_id(&self, id: i64) -> Result<Option<PostRecord>, RepoError> {
        let mut qb = QueryBuilder::new(POST_SELECT);
        qb.push(" WHERE p.id = ");
        qb.push_bind(id);

        let row = qb
            .build_query_as::<PostRow>()
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(Into::into))
    }
}

#[async_trait]
impl PostsRepo for PostgresRepositories {
    async fn count_posts(&self, scope: PostFeedScope) -> Result<u64, RepoError> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM posts p WHERE 1=1 ");
        apply_scope_condition(&mut qb, scope);

        let count: i64 = qb
            .build_query_scalar()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        u64::try_from(count)
            .map_err(|_| RepoError::integrity(format!("negative post count {count}")))
    }

    async fn list_posts(
        &self,
        scope: PostFeedScope,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<PostRecord>, RepoError> {
        let mut qb = QueryBuilder::new(POST_SELECT);
        qb.push(" WHERE 1=1 ");
        apply_scope_condition(&mut qb, scope);
        qb.push(" ORDER BY p.pub_date DESC, p.id DESC LIMIT ");
        qb.push_bind(limit.clamp(1, 100));
        qb.push(" OFFSET ");
        qb.push_bind(offset.max(0));

        let rows = qb
            .build_query_as::<PostRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn find_post(
        &self,
        author_username: &str,
        post_id: i64,
    ) -> Result<Option<PostRecord>, RepoError> {
        let mut qb = QueryBuilder::new(POST_SELECT);
        qb.push(" WHERE p.id = ");
        qb.push_bind(post_id);
        qb.push(" AND u.username = ");
        qb.push_bind(author_username);

        let row = qb
            .build_query_as::<PostRow>()
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(Into::into))
    }

    async fn create_post(&self, params: NewPostParams) -> Result<PostRecord, RepoError> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO posts (text, author_id, group_id, image_path) \
             VALUES ($1, $2, $3, $4) \
             RETURNING id",
        )
        .bind(&params.text)
        .bind(params.author_id)
        .bind(params.group_id)
        .bind(&params.image_path)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        self.post_by_id(id)
            .await?
            .ok_or_else(|| RepoError::integrity(format!("post {id} vanished after insert")))
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError> {
        let updated = sqlx::query(
            "UPDATE posts \
             SET text = $1, group_id = $2, \
                 image_path = COALESCE($3, image_path) \
             WHERE id = $4",
        )
        .bind(&params.text)
        .bind(params.group_id)
        .bind(&params.image_path)
        .bind(params.id)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        if updated.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }

        self.post_by_id(params.id).await?.ok_or(RepoError::NotFound)
    }
}
