//! Comment service.

use std::collections::{HashMap, HashSet};

use inkwell_common::{AppResult, IdGenerator};
use inkwell_db::{
    entities::{comment, user},
    repositories::{CommentRepository, PostRepository, UserRepository},
};
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

/// Comment service for business logic.
#[derive(Clone)]
pub struct CommentService {
    comment_repo: CommentRepository,
    post_repo: PostRepository,
    user_repo: UserRepository,
    id_gen: IdGenerator,
}

/// Input for commenting on a post.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct CommentInput {
    #[validate(length(min = 1, message = "This field is required."))]
    pub text: String,
}

/// A comment with its author resolved.
#[derive(Debug, Clone, Serialize)]
pub struct CommentView {
    pub comment: comment::Model,
    pub author: user::Model,
}

impl CommentService {
    /// Create a new comment service.
    #[must_use]
    pub fn new(
        comment_repo: CommentRepository,
        post_repo: PostRepository,
        user_repo: UserRepository,
    ) -> Self {
        Self {
            comment_repo,
            post_repo,
            user_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Comments on a post, oldest first.
    pub async fn list_for_post(&self, post_id: &str) -> AppResult<Vec<CommentView>> {
        let comments = self.comment_repo.find_by_post(post_id).await?;

        let author_ids: Vec<String> = comments
            .iter()
            .map(|c| c.author_id.clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let authors: HashMap<String, user::Model> = self
            .user_repo
            .find_by_ids(&author_ids)
            .await?
            .into_iter()
            .map(|u| (u.id.clone(), u))
            .collect();

        Ok(comments
            .into_iter()
            .filter_map(|comment| {
                let author = authors.get(&comment.author_id).cloned()?;
                Some(CommentView { comment, author })
            })
            .collect())
    }

    /// Comment on a post. Unknown posts are `PostNotFound`.
    pub async fn create(
        &self,
        author: &user::Model,
        post_id: &str,
        input: CommentInput,
    ) -> AppResult<comment::Model> {
        let input = CommentInput {
            text: input.text.trim().to_string(),
        };
        input.validate()?;

        let post = self.post_repo.get_by_id(post_id).await?;

        let model = comment::ActiveModel {
            id: Set(self.id_gen.generate()),
            text: Set(input.text),
            post_id: Set(post.id),
            author_id: Set(author.id.clone()),
            created_at: Set(chrono::Utc::now().into()),
        };

        let comment = self.comment_repo.create(model).await?;
        info!(comment_id = %comment.id, post_id = %comment.post_id, "Comment created");

        Ok(comment)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use inkwell_common::AppError;
    use inkwell_db::entities::post;
    use sea_orm::{DatabaseBackend, DatabaseConnection, MockDatabase};
    use std::sync::Arc;

    fn create_test_user(id: &str) -> user::Model {
        user::Model {
            id: id.to_string(),
            username: id.to_string(),
            username_lower: id.to_string(),
            name: None,
            password: String::new(),
            token: None,
            is_admin: false,
            email: None,
            password_reset_token: None,
            password_reset_sent_at: None,
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    fn create_test_comment(id: &str, author_id: &str) -> comment::Model {
        comment::Model {
            id: id.to_string(),
            text: "nice post".to_string(),
            post_id: "p1".to_string(),
            author_id: author_id.to_string(),
            created_at: Utc::now().into(),
        }
    }

    fn service(
        comment_db: DatabaseConnection,
        post_db: DatabaseConnection,
        user_db: DatabaseConnection,
    ) -> CommentService {
        CommentService::new(
            CommentRepository::new(Arc::new(comment_db)),
            PostRepository::new(Arc::new(post_db)),
            UserRepository::new(Arc::new(user_db)),
        )
    }

    fn empty_db() -> DatabaseConnection {
        MockDatabase::new(DatabaseBackend::Postgres).into_connection()
    }

    #[tokio::test]
    async fn test_list_for_post_attaches_authors() {
        let comment_db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[
                create_test_comment("c1", "u1"),
                create_test_comment("c2", "u2"),
            ]])
            .into_connection();
        let user_db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[create_test_user("u1"), create_test_user("u2")]])
            .into_connection();

        let views = service(comment_db, empty_db(), user_db)
            .list_for_post("p1")
            .await
            .unwrap();

        assert_eq!(views.len(), 2);
        assert_eq!(views[0].comment.id, "c1");
        assert_eq!(views[0].author.id, "u1");
        assert_eq!(views[1].author.id, "u2");
    }

    #[tokio::test]
    async fn test_create_rejects_blank_text() {
        let input = CommentInput {
            text: "   ".to_string(),
        };
        let result = service(empty_db(), empty_db(), empty_db())
            .create(&create_test_user("u1"), "p1", input)
            .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_create_on_missing_post() {
        let post_db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<post::Model>::new()])
            .into_connection();

        let input = CommentInput {
            text: "hello".to_string(),
        };
        let result = service(empty_db(), post_db, empty_db())
            .create(&create_test_user("u1"), "missing", input)
            .await;

        assert!(matches!(result, Err(AppError::PostNotFound(_))));
    }

    #[tokio::test]
    async fn test_create_comment() {
        let post = post::Model {
            id: "p1".to_string(),
            text: "post".to_string(),
            author_id: "u2".to_string(),
            group_id: None,
            image: None,
            created_at: Utc::now().into(),
            updated_at: None,
        };
        let post_db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[post]])
            .into_connection();
        let comment_db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[create_test_comment("c1", "u1")]])
            .into_connection();

        let input = CommentInput {
            text: " nice post ".to_string(),
        };
        let comment = service(comment_db, post_db, empty_db())
            .create(&create_test_user("u1"), "p1", input)
            .await
            .unwrap();

        assert_eq!(comment.post_id, "p1");
        assert_eq!(comment.author_id, "u1");
    }
}
