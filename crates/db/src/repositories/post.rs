//! Post repository.
//!
//! Every listing comes in a `count_*` / `find_*` pair so callers can resolve a
//! page window before fetching rows. Listings are ordered newest first.

use std::sync::Arc;

use crate::entities::{Follow, Post, follow, post};
use inkwell_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Select, sea_query::Query,
};

/// Post repository for database operations.
#[derive(Clone)]
pub struct PostRepository {
    db: Arc<DatabaseConnection>,
}

impl PostRepository {
    /// Create a new post repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a post by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<post::Model>> {
        Post::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a post by ID, returning an error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<post::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::PostNotFound(id.to_string()))
    }

    /// Create a new post.
    pub async fn create(&self, model: post::ActiveModel) -> AppResult<post::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Update a post.
    pub async fn update(&self, model: post::ActiveModel) -> AppResult<post::Model> {
        model
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete a post and its comments.
    pub async fn delete(&self, id: &str) -> AppResult<()> {
        Post::delete_by_id(id)
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Storage keys of every image attached to an author's posts.
    pub async fn image_keys_by_author(&self, author_id: &str) -> AppResult<Vec<String>> {
        let keys: Vec<Option<String>> = Self::by_author(author_id)
            .select_only()
            .column(post::Column::Image)
            .filter(post::Column::Image.is_not_null())
            .into_tuple()
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(keys.into_iter().flatten().collect())
    }

    /// Count all posts.
    pub async fn count_all(&self) -> AppResult<u64> {
        self.count(Post::find()).await
    }

    /// One page of all posts.
    pub async fn find_page(&self, offset: u64, limit: u64) -> AppResult<Vec<post::Model>> {
        self.fetch(Post::find(), offset, limit).await
    }

    /// Count posts in a group.
    pub async fn count_by_group(&self, group_id: &str) -> AppResult<u64> {
        self.count(Self::in_group(group_id)).await
    }

    /// One page of posts in a group.
    pub async fn find_by_group(
        &self,
        group_id: &str,
        offset: u64,
        limit: u64,
    ) -> AppResult<Vec<post::Model>> {
        self.fetch(Self::in_group(group_id), offset, limit).await
    }

    /// Count posts by an author.
    pub async fn count_by_author(&self, author_id: &str) -> AppResult<u64> {
        self.count(Self::by_author(author_id)).await
    }

    /// One page of posts by an author.
    pub async fn find_by_author(
        &self,
        author_id: &str,
        offset: u64,
        limit: u64,
    ) -> AppResult<Vec<post::Model>> {
        self.fetch(Self::by_author(author_id), offset, limit).await
    }

    /// Count posts by authors the user follows.
    pub async fn count_feed(&self, user_id: &str) -> AppResult<u64> {
        self.count(Self::feed(user_id)).await
    }

    /// One page of posts by authors the user follows.
    pub async fn find_feed(
        &self,
        user_id: &str,
        offset: u64,
        limit: u64,
    ) -> AppResult<Vec<post::Model>> {
        self.fetch(Self::feed(user_id), offset, limit).await
    }

    fn in_group(group_id: &str) -> Select<Post> {
        Post::find().filter(post::Column::GroupId.eq(group_id))
    }

    fn by_author(author_id: &str) -> Select<Post> {
        Post::find().filter(post::Column::AuthorId.eq(author_id))
    }

    fn feed(user_id: &str) -> Select<Post> {
        let followed = Query::select()
            .column(follow::Column::AuthorId)
            .from(Follow)
            .and_where(follow::Column::UserId.eq(user_id))
            .to_owned();

        Post::find().filter(post::Column::AuthorId.in_subquery(followed))
    }

    async fn count(&self, query: Select<Post>) -> AppResult<u64> {
        query
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn fetch(
        &self,
        query: Select<Post>,
        offset: u64,
        limit: u64,
    ) -> AppResult<Vec<post::Model>> {
        query
            .order_by_desc(post::Column::CreatedAt)
            .order_by_desc(post::Column::Id)
            .offset(offset)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
