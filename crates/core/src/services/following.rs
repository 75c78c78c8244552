//! Following service.

use inkwell_common::{AppError, AppResult, IdGenerator};
use inkwell_db::{
    entities::{follow, user},
    repositories::FollowRepository,
};
use sea_orm::Set;
use tracing::{debug, info};

/// Following service for business logic.
#[derive(Clone)]
pub struct FollowingService {
    follow_repo: FollowRepository,
    id_gen: IdGenerator,
}

/// Result of a follow attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowOutcome {
    /// A new edge was created.
    Created,
    /// The edge already existed.
    AlreadyFollowing,
    /// Users cannot follow themselves; nothing was created.
    SelfFollow,
}

/// Result of an unfollow attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnfollowOutcome {
    /// The edge was deleted.
    Removed,
    /// There was no edge to delete.
    NotFollowing,
    /// Users cannot unfollow themselves.
    SelfFollow,
}

impl FollowingService {
    /// Create a new following service.
    #[must_use]
    pub fn new(follow_repo: FollowRepository) -> Self {
        Self {
            follow_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Start following `author`.
    pub async fn follow(
        &self,
        user: &user::Model,
        author: &user::Model,
    ) -> AppResult<FollowOutcome> {
        if user.id == author.id {
            return Ok(FollowOutcome::SelfFollow);
        }

        if self.follow_repo.is_following(&user.id, &author.id).await? {
            return Ok(FollowOutcome::AlreadyFollowing);
        }

        let model = follow::ActiveModel {
            id: Set(self.id_gen.generate()),
            user_id: Set(user.id.clone()),
            author_id: Set(author.id.clone()),
            created_at: Set(chrono::Utc::now().into()),
        };

        match self.follow_repo.create(model).await {
            Ok(_) => {
                info!(user_id = %user.id, author_id = %author.id, "Followed");
                Ok(FollowOutcome::Created)
            }
            Err(AppError::Conflict(_)) => {
                debug!(
                    user_id = %user.id,
                    author_id = %author.id,
                    "Concurrent follow already created the edge"
                );
                Ok(FollowOutcome::AlreadyFollowing)
            }
            Err(e) => Err(e),
        }
    }

    /// Stop following `author`.
    pub async fn unfollow(
        &self,
        user: &user::Model,
        author: &user::Model,
    ) -> AppResult<UnfollowOutcome> {
        if user.id == author.id {
            return Ok(UnfollowOutcome::SelfFollow);
        }

        if self.follow_repo.delete_by_pair(&user.id, &author.id).await? {
            info!(user_id = %user.id, author_id = %author.id, "Unfollowed");
            Ok(UnfollowOutcome::Removed)
        } else {
            Ok(UnfollowOutcome::NotFollowing)
        }
    }

    /// Whether `user_id` follows `author_id`.
    pub async fn is_following(&self, user_id: &str, author_id: &str) -> AppResult<bool> {
        self.follow_repo.is_following(user_id, author_id).await
    }

    /// Number of users following `user_id`.
    pub async fn count_followers(&self, user_id: &str) -> AppResult<u64> {
        self.follow_repo.count_followers(user_id).await
    }

    /// Number of users `user_id` follows.
    pub async fn count_following(&self, user_id: &str) -> AppResult<u64> {
        self.follow_repo.count_following(user_id).await
    }
}
