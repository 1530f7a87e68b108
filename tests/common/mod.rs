//! In-memory repositories and request helpers for router-level tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicI64, Ordering},
};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, Response, header},
};
use bytes::Bytes;
use time::OffsetDateTime;
use tower::ServiceExt;
use uuid::Uuid;

use canto::application::{
    auth::{AuthService, hash_password},
    comments::CommentService,
    feed::FeedService,
    follows::FollowService,
    posts::PostService,
    repos::{
        CommentsRepo, DbHealth, FollowsRepo, GroupsRepo, NewPostParams, PostFeedScope, PostsRepo,
        RepoError, SessionsRepo, UpdatePostParams, UsersRepo,
    },
};
use canto::domain::entities::{
    CommentRecord, GroupRecord, GroupRef, PostRecord, UserRecord, UserWithPassword,
};
use canto::infra::cache::PageCache;
use canto::infra::http::{HttpState, build_router};
use canto::infra::uploads::UploadStorage;

pub use canto::infra::http::auth::SESSION_COOKIE;

struct StoredUser {
    record: UserRecord,
    password_hash: String,
}

struct StoredPost {
    id: i64,
    text: String,
    pub_date: OffsetDateTime,
    author_id: i64,
    group_id: Option<i64>,
    image_path: Option<String>,
}

#[derive(Default)]
struct Tables {
    users: Vec<StoredUser>,
    groups: Vec<GroupRecord>,
    posts: Vec<StoredPost>,
    comments: Vec<CommentRecord>,
    follows: Vec<(i64, i64)>,
    sessions: HashMap<Uuid, (i64, OffsetDateTime)>,
}

/// All repository traits backed by plain vectors behind one lock.
#[derive(Default)]
pub struct MemoryRepos {
    tables: Mutex<Tables>,
    next_id: AtomicI64,
}

impl MemoryRepos {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            next_id: AtomicI64::new(1),
        }
    }

    fn allocate_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Tables> {
        self.tables.lock().expect("memory repo lock poisoned")
    }

    /// Insert a user with a real password hash so login flows work.
    pub fn seed_user(&self, username: &str, password: &str) -> UserRecord {
        let record = UserRecord {
            id: self.allocate_id(),
            username: username.to_string(),
            joined_at: OffsetDateTime::now_utc(),
        };
        self.lock().users.push(StoredUser {
            record: record.clone(),
            password_hash: hash_password(password).expect("hashing should succeed"),
        });
        record
    }

    pub fn seed_group(&self, title: &str, slug: &str, description: &str) -> GroupRecord {
        let record = GroupRecord {
            id: self.allocate_id(),
            title: title.to_string(),
            slug: slug.to_string(),
            description: description.to_string(),
        };
        self.lock().groups.push(record.clone());
        record
    }

    pub fn seed_post(&self, author: &UserRecord, text: &str, group_id: Option<i64>) -> i64 {
        let id = self.allocate_id();
        self.lock().posts.push(StoredPost {
            id,
            text: text.to_string(),
            pub_date: OffsetDateTime::now_utc(),
            author_id: author.id,
            group_id,
            image_path: None,
        });
        id
    }

    /// Open a session directly, bypassing the login form.
    pub fn open_session(&self, user: &UserRecord) -> Uuid {
        let token = Uuid::new_v4();
        self.lock().sessions.insert(
            token,
            (user.id, OffsetDateTime::now_utc() + time::Duration::days(1)),
        );
        token
    }

    pub fn post_count(&self) -> usize {
        self.lock().posts.len()
    }

    pub fn post_text(&self, post_id: i64) -> Option<String> {
        self.lock()
            .posts
            .iter()
            .find(|post| post.id == post_id)
            .map(|post| post.text.clone())
    }

    pub fn follow_exists(&self, user_id: i64, author_id: i64) -> bool {
        self.lock()
            .follows
            .iter()
            .any(|&(user, author)| user == user_id && author == author_id)
    }

    pub fn follow_count(&self) -> usize {
        self.lock().follows.len()
    }

    fn assemble_post(&self, tables: &Tables, post: &StoredPost) -> PostRecord {
        let author_username = tables
            .users
            .iter()
            .find(|user| user.record.id == post.author_id)
            .map(|user| user.record.username.clone())
            .unwrap_or_default();

        let group = post.group_id.and_then(|group_id| {
            tables
                .groups
                .iter()
                .find(|group| group.id == group_id)
                .map(|group| GroupRef {
                    id: group.id,
                    slug: group.slug.clone(),
                    title: group.title.clone(),
                })
        });

        PostRecord {
            id: post.id,
            text: post.text.clone(),
            pub_date: post.pub_date,
            author_id: post.author_id,
            author_username,
            group,
            image_path: post.image_path.clone(),
        }
    }

    fn scoped_posts(&self, tables: &Tables, scope: PostFeedScope) -> Vec<PostRecord> {
        let mut matching: Vec<&StoredPost> = tables
            .posts
            .iter()
            .filter(|post| match scope {
                PostFeedScope::Home => true,
                PostFeedScope::Group(group_id) => post.group_id == Some(group_id),
                PostFeedScope::Author(author_id) => post.author_id == author_id,
                PostFeedScope::FollowedBy(user_id) => tables
                    .follows
                    .iter()
                    .any(|&(user, author)| user == user_id && author == post.author_id),
            })
            .collect();

        matching.sort_by(|a, b| b.pub_date.cmp(&a.pub_date).then(b.id.cmp(&a.id)));
        matching
            .into_iter()
            .map(|post| self.assemble_post(tables, post))
            .collect()
    }
}

#[async_trait]
impl UsersRepo for MemoryRepos {
    async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<UserRecord, RepoError> {
        let id = self.allocate_id();
        let mut tables = self.lock();
        if tables
            .users
            .iter()
            .any(|user| user.record.username == username)
        {
            return Err(RepoError::duplicate("users_username_unique"));
        }

        let record = UserRecord {
            id,
            username: username.to_string(),
            joined_at: OffsetDateTime::now_utc(),
        };
        tables.users.push(StoredUser {
            record: record.clone(),
            password_hash: password_hash.to_string(),
        });
        Ok(record)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, RepoError> {
        Ok(self
            .lock()
            .users
            .iter()
            .find(|user| user.record.username == username)
            .map(|user| user.record.clone()))
    }

    async fn find_with_password(
        &self,
        username: &str,
    ) -> Result<Option<UserWithPassword>, RepoError> {
        Ok(self
            .lock()
            .users
            .iter()
            .find(|user| user.record.username == username)
            .map(|user| UserWithPassword {
                user: user.record.clone(),
                password_hash: user.password_hash.clone(),
            }))
    }
}

#[async_trait]
impl SessionsRepo for MemoryRepos {
    async fn create_session(
        &self,
        token: Uuid,
        user_id: i64,
        expires_at: OffsetDateTime,
    ) -> Result<(), RepoError> {
        self.lock().sessions.insert(token, (user_id, expires_at));
        Ok(())
    }

    async fn find_user_by_token(&self, token: Uuid) -> Result<Option<UserRecord>, RepoError> {
        let tables = self.lock();
        let Some(&(user_id, expires_at)) = tables.sessions.get(&token) else {
            return Ok(None);
        };
        if expires_at <= OffsetDateTime::now_utc() {
            return Ok(None);
        }
        Ok(tables
            .users
            .iter()
            .find(|user| user.record.id == user_id)
            .map(|user| user.record.clone()))
    }

    async fn delete_session(&self, token: Uuid) -> Result<(), RepoError> {
        self.lock().sessions.remove(&token);
        Ok(())
    }
}

#[async_trait]
impl GroupsRepo for MemoryRepos {
    async fn find_by_slug(&self, slug: &str) -> Result<Option<GroupRecord>, RepoError> {
        Ok(self
            .lock()
            .groups
            .iter()
            .find(|group| group.slug == slug)
            .cloned())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<GroupRecord>, RepoError> {
        Ok(self
            .lock()
            .groups
            .iter()
            .find(|group| group.id == id)
            .cloned())
    }

    async fn list_groups(&self) -> Result<Vec<GroupRecord>, RepoError> {
        let mut groups = self.lock().groups.clone();
        groups.sort_by(|a, b| a.title.cmp(&b.title).then(a.id.cmp(&b.id)));
        Ok(groups)
    }
}

#[async_trait]
impl PostsRepo for MemoryRepos {
    async fn count_posts(&self, scope: PostFeedScope) -> Result<u64, RepoError> {
        let tables = self.lock();
        Ok(self.scoped_posts(&tables, scope).len() as u64)
    }

    async fn list_posts(
        &self,
        scope: PostFeedScope,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<PostRecord>, RepoError> {
        let tables = self.lock();
        Ok(self
            .scoped_posts(&tables, scope)
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn find_post(
        &self,
        author_username: &str,
        post_id: i64,
    ) -> Result<Option<PostRecord>, RepoError> {
        let tables = self.lock();
        Ok(tables
            .posts
            .iter()
            .find(|post| post.id == post_id)
            .map(|post| self.assemble_post(&tables, post))
            .filter(|post| post.author_username == author_username))
    }

    async fn create_post(&self, params: NewPostParams) -> Result<PostRecord, RepoError> {
        let id = self.allocate_id();
        let mut tables = self.lock();
        tables.posts.push(StoredPost {
            id,
            text: params.text,
            pub_date: OffsetDateTime::now_utc(),
            author_id: params.author_id,
            group_id: params.group_id,
            image_path: params.image_path,
        });
        let post = tables.posts.last().expect("just pushed");
        Ok(self.assemble_post(&tables, post))
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError> {
        let mut tables = self.lock();
        let position = tables
            .posts
            .iter()
            .position(|post| post.id == params.id)
            .ok_or(RepoError::NotFound)?;

        {
            let post = &mut tables.posts[position];
            post.text = params.text;
            post.group_id = params.group_id;
            if let Some(image_path) = params.image_path {
                post.image_path = Some(image_path);
            }
        }

        let post = &tables.posts[position];
        Ok(self.assemble_post(&tables, post))
    }
}

#[async_trait]
impl CommentsRepo for MemoryRepos {
    async fn list_for_post(&self, post_id: i64) -> Result<Vec<CommentRecord>, RepoError> {
        let mut comments: Vec<CommentRecord> = self
            .lock()
            .comments
            .iter()
            .filter(|comment| comment.post_id == post_id)
            .cloned()
            .collect();
        comments.sort_by(|a, b| b.created.cmp(&a.created).then(b.id.cmp(&a.id)));
        Ok(comments)
    }

    async fn create_comment(
        &self,
        post_id: i64,
        author_id: i64,
        text: &str,
    ) -> Result<CommentRecord, RepoError> {
        let id = self.allocate_id();
        let mut tables = self.lock();
        let author_username = tables
            .users
            .iter()
            .find(|user| user.record.id == author_id)
            .map(|user| user.record.username.clone());

        let record = CommentRecord {
            id,
            post_id,
            author_id: Some(author_id),
            author_username,
            text: text.to_string(),
            created: OffsetDateTime::now_utc(),
        };
        tables.comments.push(record.clone());
        Ok(record)
    }
}

#[async_trait]
impl FollowsRepo for MemoryRepos {
    async fn is_following(&self, user_id: i64, author_id: i64) -> Result<bool, RepoError> {
        Ok(self.follow_exists(user_id, author_id))
    }

    async fn create_follow(&self, user_id: i64, author_id: i64) -> Result<bool, RepoError> {
        let mut tables = self.lock();
        if tables
            .follows
            .iter()
            .any(|&(user, author)| user == user_id && author == author_id)
        {
            return Ok(false);
        }
        tables.follows.push((user_id, author_id));
        Ok(true)
    }

    async fn delete_follow(&self, user_id: i64, author_id: i64) -> Result<bool, RepoError> {
        let mut tables = self.lock();
        let before = tables.follows.len();
        tables
            .follows
            .retain(|&(user, author)| !(user == user_id && author == author_id));
        Ok(tables.follows.len() < before)
    }
}

#[async_trait]
impl DbHealth for MemoryRepos {
    async fn health_check(&self) -> Result<(), RepoError> {
        Ok(())
    }
}

/// A router wired to in-memory repositories, plus handles the tests poke at.
pub struct TestApp {
    pub router: Router,
    pub repos: Arc<MemoryRepos>,
    pub cache: Option<PageCache>,
    _uploads_dir: tempfile::TempDir,
}

pub fn test_app() -> TestApp {
    build_test_app(None)
}

pub fn test_app_with_cache(ttl: Duration) -> TestApp {
    build_test_app(Some(PageCache::new(ttl)))
}

fn build_test_app(cache: Option<PageCache>) -> TestApp {
    let repos = Arc::new(MemoryRepos::new());
    let uploads_dir = tempfile::tempdir().expect("tempdir");
    let uploads =
        Arc::new(UploadStorage::new(uploads_dir.path().to_path_buf()).expect("storage init"));

    let posts_repo: Arc<dyn PostsRepo> = repos.clone();
    let groups_repo: Arc<dyn GroupsRepo> = repos.clone();
    let users_repo: Arc<dyn UsersRepo> = repos.clone();
    let comments_repo: Arc<dyn CommentsRepo> = repos.clone();
    let follows_repo: Arc<dyn FollowsRepo> = repos.clone();
    let sessions_repo: Arc<dyn SessionsRepo> = repos.clone();
    let health: Arc<dyn DbHealth> = repos.clone();

    let state = HttpState {
        feed: Arc::new(FeedService::new(
            posts_repo.clone(),
            groups_repo.clone(),
            users_repo.clone(),
            comments_repo.clone(),
            follows_repo.clone(),
        )),
        posts: Arc::new(PostService::new(
            posts_repo.clone(),
            groups_repo,
            uploads.clone(),
        )),
        comments: Arc::new(CommentService::new(posts_repo, comments_repo)),
        follows: Arc::new(FollowService::new(users_repo.clone(), follows_repo)),
        auth: Arc::new(AuthService::new(users_repo, sessions_repo)),
        uploads,
        health,
    };

    let router = build_router(state, cache.clone(), 10 * 1024 * 1024);

    TestApp {
        router,
        repos,
        cache,
        _uploads_dir: uploads_dir,
    }
}

impl TestApp {
    pub async fn get(&self, path: &str) -> Response<Body> {
        self.request(Request::get(path).body(Body::empty()).expect("request"))
            .await
    }

    pub async fn get_as(&self, path: &str, token: Uuid) -> Response<Body> {
        self.request(
            Request::get(path)
                .header(header::COOKIE, format!("{SESSION_COOKIE}={token}"))
                .body(Body::empty())
                .expect("request"),
        )
        .await
    }

    pub async fn post_form(&self, path: &str, body: &str, token: Option<Uuid>) -> Response<Body> {
        let mut builder = Request::post(path).header(
            header::CONTENT_TYPE,
            "application/x-www-form-urlencoded",
        );
        if let Some(token) = token {
            builder = builder.header(header::COOKIE, format!("{SESSION_COOKIE}={token}"));
        }
        self.request(builder.body(Body::from(body.to_string())).expect("request"))
            .await
    }

    pub async fn post_multipart(
        &self,
        path: &str,
        fields: &[(&str, MultipartValue<'_>)],
        token: Option<Uuid>,
    ) -> Response<Body> {
        let boundary = "canto-test-boundary";
        let body = multipart_body(boundary, fields);
        let mut builder = Request::post(path).header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        );
        if let Some(token) = token {
            builder = builder.header(header::COOKIE, format!("{SESSION_COOKIE}={token}"));
        }
        self.request(builder.body(Body::from(body)).expect("request"))
            .await
    }

    async fn request(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router should be infallible")
    }
}

pub enum MultipartValue<'a> {
    Text(&'a str),
    File {
        filename: &'a str,
        content_type: &'a str,
        bytes: &'a [u8],
    },
}

fn multipart_body(boundary: &str, fields: &[(&str, MultipartValue<'_>)]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        match value {
            MultipartValue::Text(text) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                );
                body.extend_from_slice(text.as_bytes());
            }
            MultipartValue::File {
                filename,
                content_type,
                bytes,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
                body.extend_from_slice(bytes);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    body
}

pub async fn body_bytes(response: Response<Body>) -> Bytes {
    axum::body::to_bytes(response.into_body(), 4 * 1024 * 1024)
        .await
        .expect("body should collect")
}

pub async fn body_string(response: Response<Body>) -> String {
    String::from_utf8(body_bytes(response).await.to_vec()).expect("body should be utf-8")
}

/// A tiny but well-formed 1x1 PNG, enough for image sniffing to accept.
pub const TINY_PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
    0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x62, 0x00,
    0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49,
    0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
];
