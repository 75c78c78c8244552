//! Group service.

use std::sync::LazyLock;

use inkwell_common::{AppError, AppResult, IdGenerator};
use inkwell_db::{entities::group, repositories::GroupRepository};
use regex::Regex;
use sea_orm::Set;
use serde::Deserialize;
use tracing::info;
use validator::Validate;

static SLUG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-a-zA-Z0-9_]+$").expect("valid slug pattern"));

/// Group service for business logic.
#[derive(Clone)]
pub struct GroupService {
    group_repo: GroupRepository,
    id_gen: IdGenerator,
}

/// Input for creating a group.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct CreateGroupInput {
    #[validate(length(min = 1, max = 200))]
    pub title: String,

    #[validate(
        length(min = 1, max = 50),
        regex(
            path = *SLUG_RE,
            message = "Enter a valid slug consisting of letters, numbers, underscores or hyphens."
        )
    )]
    pub slug: String,

    #[serde(default)]
    pub description: String,
}

impl GroupService {
    /// Create a new group service.
    #[must_use]
    pub fn new(group_repo: GroupRepository) -> Self {
        Self {
            group_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// All groups, for the post form's group selector.
    pub async fn list(&self) -> AppResult<Vec<group::Model>> {
        self.group_repo.list().await
    }

    /// Create a new group.
    pub async fn create(&self, input: CreateGroupInput) -> AppResult<group::Model> {
        let input = CreateGroupInput {
            title: input.title.trim().to_string(),
            slug: input.slug.trim().to_string(),
            description: input.description.trim().to_string(),
        };
        input.validate()?;

        if self.group_repo.find_by_slug(&input.slug).await?.is_some() {
            return Err(AppError::Conflict(format!(
                "Group with slug '{}' already exists",
                input.slug
            )));
        }

        let model = group::ActiveModel {
            id: Set(self.id_gen.generate()),
            title: Set(input.title),
            slug: Set(input.slug),
            description: Set(input.description),
            created_at: Set(chrono::Utc::now().into()),
        };

        let group = self.group_repo.create(model).await?;
        info!(group_id = %group.id, slug = %group.slug, "Group created");

        Ok(group)
    }

    /// Delete a group. Its posts are kept without a group.
    pub async fn delete_by_slug(&self, slug: &str) -> AppResult<()> {
        let group = self.group_repo.get_by_slug(slug).await?;
        self.group_repo.delete(&group.id).await?;
        info!(group_id = %group.id, slug = %group.slug, "Group deleted");
        Ok(())
    }
}
