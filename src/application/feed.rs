//! Feed assembly: every listing is the same reverse-chronological post
//! query under a different scope, paginated the same way.

use std::sync::Arc;

use crate::application::error::AppError;
use crate::application::pagination::{PAGE_SIZE, Page, PageRequest, Paginator};
use crate::application::repos::{
    CommentsRepo, FollowsRepo, GroupsRepo, PostFeedScope, PostsRepo, UsersRepo,
};
use crate::domain::entities::{CommentRecord, GroupRecord, PostRecord, UserRecord};

pub struct FeedService {
    posts: Arc<dyn PostsRepo>,
    groups: Arc<dyn GroupsRepo>,
    users: Arc<dyn UsersRepo>,
    comments: Arc<dyn CommentsRepo>,
    follows: Arc<dyn FollowsRepo>,
}

/// A profile page: the author, one page of their posts, and whether the
/// current viewer follows them.
pub struct ProfilePage {
    pub author: UserRecord,
    pub posts: Page<PostRecord>,
    pub viewer_is_following: bool,
}

/// A group page: the group and one page of its posts.
pub struct GroupPage {
    pub group: GroupRecord,
    pub posts: Page<PostRecord>,
}

/// A post detail page: the post and all of its comments, newest first.
pub struct PostDetail {
    pub post: PostRecord,
    pub comments: Vec<CommentRecord>,
}

impl FeedService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        groups: Arc<dyn GroupsRepo>,
        users: Arc<dyn UsersRepo>,
        comments: Arc<dyn CommentsRepo>,
        follows: Arc<dyn FollowsRepo>,
    ) -> Self {
        Self {
            posts,
            groups,
            users,
            comments,
            follows,
        }
    }

    async fn page_for_scope(
        &self,
        scope: PostFeedScope,
        request: PageRequest,
    ) -> Result<Page<PostRecord>, AppError> {
        let total = self.posts.count_posts(scope).await?;
        let paginator = Paginator::new(total, PAGE_SIZE);
        let number = paginator.clamp(request);

        let items = self
            .posts
            .list_posts(
                scope,
                paginator.limit() as i64,
                paginator.offset(number) as i64,
            )
            .await?;

        Ok(Page::new(items, number, paginator.page_count(), total))
    }

    /// The home feed: all posts, newest first.
    pub async fn home_page(&self, request: PageRequest) -> Result<Page<PostRecord>, AppError> {
        self.page_for_scope(PostFeedScope::Home, request).await
    }

    /// A group's feed, resolved by slug. `NotFound` when the slug is unknown.
    pub async fn group_page(
        &self,
        slug: &str,
        request: PageRequest,
    ) -> Result<GroupPage, AppError> {
        let group = self
            .groups
            .find_by_slug(slug)
            .await?
            .ok_or(AppError::NotFound)?;

        let posts = self
            .page_for_scope(PostFeedScope::Group(group.id), request)
            .await?;

        Ok(GroupPage { group, posts })
    }

    /// An author's profile. The follow flag is always false for anonymous
    /// viewers and for authors viewing themselves.
    pub async fn profile_page(
        &self,
        username: &str,
        viewer: Option<&UserRecord>,
        request: PageRequest,
    ) -> Result<ProfilePage, AppError> {
        let author = self
            .users
            .find_by_username(username)
            .await?
            .ok_or(AppError::NotFound)?;

        let viewer_is_following = match viewer {
            Some(viewer) if viewer.id != author.id => {
                self.follows.is_following(viewer.id, author.id).await?
            }
            _ => false,
        };

        let posts = self
            .page_for_scope(PostFeedScope::Author(author.id), request)
            .await?;

        Ok(ProfilePage {
            author,
            posts,
            viewer_is_following,
        })
    }

    /// The personalized feed: posts by authors the viewer follows.
    pub async fn follow_page(
        &self,
        viewer: &UserRecord,
        request: PageRequest,
    ) -> Result<Page<PostRecord>, AppError> {
        self.page_for_scope(PostFeedScope::FollowedBy(viewer.id), request)
            .await
    }

    /// A single post addressed by author username and post id, with its
    /// comments.
    pub async fn post_detail(&self, username: &str, post_id: i64) -> Result<PostDetail, AppError> {
        let post = self
            .posts
            .find_post(username, post_id)
            .await?
            .ok_or(AppError::NotFound)?;

        let comments = self.comments.list_for_post(post.id).await?;

        Ok(PostDetail { post, comments })
    }
}
