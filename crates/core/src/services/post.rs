//! Post service.
//!
//! Listings (index, group, profile, feed) resolve the requested page against a
//! row count first, then fetch exactly that window and hydrate each post with its
//! author and group.

use std::collections::{HashMap, HashSet};

use image::ImageFormat;
use inkwell_common::{
    AppError, AppResult, Config, IdGenerator, Page, PageWindow, Paginator, SharedStorage,
};
use inkwell_db::{
    entities::{group, post, user},
    repositories::{GroupRepository, PostRepository, UserRepository},
};
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use validator::Validate;

/// Post service for business logic.
#[derive(Clone)]
pub struct PostService {
    post_repo: PostRepository,
    user_repo: UserRepository,
    group_repo: GroupRepository,
    storage: SharedStorage,
    paginator: Paginator,
    max_upload_bytes: usize,
    id_gen: IdGenerator,
}

/// Input for creating or editing a post.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct PostInput {
    #[validate(length(min = 1, message = "This field is required."))]
    pub text: String,

    /// Optional group ID.
    pub group: Option<String>,
}

impl PostInput {
    fn normalized(self) -> Self {
        Self {
            text: self.text.trim().to_string(),
            group: self
                .group
                .map(|g| g.trim().to_string())
                .filter(|g| !g.is_empty()),
        }
    }
}

/// An image file as submitted with a post form.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    /// Client-supplied file name, for logging only.
    pub file_name: Option<String>,
    /// Raw file bytes.
    pub data: Vec<u8>,
}

/// A post with its author and group resolved.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    pub post: post::Model,
    pub author: user::Model,
    pub group: Option<group::Model>,
    pub image_url: Option<String>,
}

/// Result of an edit or delete attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOutcome<T> {
    /// The change was applied.
    Updated(T),
    /// The editor does not own the post; nothing changed.
    NotAuthor,
}

/// An upload that passed format and size checks.
struct CheckedImage {
    data: Vec<u8>,
    extension: &'static str,
    content_type: &'static str,
}

impl PostService {
    /// Create a new post service.
    #[must_use]
    pub fn new(
        post_repo: PostRepository,
        user_repo: UserRepository,
        group_repo: GroupRepository,
        storage: SharedStorage,
        config: &Config,
    ) -> Self {
        Self {
            post_repo,
            user_repo,
            group_repo,
            storage,
            paginator: Paginator::new(config.pagination.posts_per_page),
            max_upload_bytes: config.storage.max_upload_bytes,
            id_gen: IdGenerator::new(),
        }
    }

    /// All posts, newest first.
    pub async fn index(&self, page: Option<&str>) -> AppResult<Page<PostView>> {
        let window = self
            .paginator
            .resolve(page, self.post_repo.count_all().await?);
        let posts = self
            .post_repo
            .find_page(window.offset, window.limit)
            .await?;
        self.page_of(posts, window).await
    }

    /// A group and its posts. Unknown slugs are `GroupNotFound`.
    pub async fn group_posts(
        &self,
        slug: &str,
        page: Option<&str>,
    ) -> AppResult<(group::Model, Page<PostView>)> {
        let group = self.group_repo.get_by_slug(slug).await?;
        let window = self
            .paginator
            .resolve(page, self.post_repo.count_by_group(&group.id).await?);
        let posts = self
            .post_repo
            .find_by_group(&group.id, window.offset, window.limit)
            .await?;
        Ok((group, self.page_of(posts, window).await?))
    }

    /// Posts written by `author`.
    pub async fn profile_posts(
        &self,
        author: &user::Model,
        page: Option<&str>,
    ) -> AppResult<Page<PostView>> {
        let window = self
            .paginator
            .resolve(page, self.post_repo.count_by_author(&author.id).await?);
        let posts = self
            .post_repo
            .find_by_author(&author.id, window.offset, window.limit)
            .await?;
        self.page_of(posts, window).await
    }

    /// Posts by authors the viewer follows.
    pub async fn feed(&self, viewer_id: &str, page: Option<&str>) -> AppResult<Page<PostView>> {
        let window = self
            .paginator
            .resolve(page, self.post_repo.count_feed(viewer_id).await?);
        let posts = self
            .post_repo
            .find_feed(viewer_id, window.offset, window.limit)
            .await?;
        self.page_of(posts, window).await
    }

    /// A single post.
    pub async fn get(&self, id: &str) -> AppResult<PostView> {
        let post = self.post_repo.get_by_id(id).await?;
        self.hydrate(vec![post])
            .await?
            .pop()
            .ok_or_else(|| AppError::PostNotFound(id.to_string()))
    }

    /// Publish a new post.
    pub async fn create(
        &self,
        author: &user::Model,
        input: PostInput,
        image: Option<ImageUpload>,
    ) -> AppResult<post::Model> {
        let input = input.normalized();
        input.validate()?;
        let group_id = self.resolve_group(input.group.as_deref()).await?;
        let image = image
            .map(|upload| check_image(upload, self.max_upload_bytes))
            .transpose()?;

        let image_key = match image {
            Some(image) => Some(self.store_image(image).await?),
            None => None,
        };

        let model = post::ActiveModel {
            id: Set(self.id_gen.generate()),
            text: Set(input.text),
            author_id: Set(author.id.clone()),
            group_id: Set(group_id),
            image: Set(image_key.clone()),
            created_at: Set(chrono::Utc::now().into()),
            updated_at: Set(None),
        };

        let post = match self.post_repo.create(model).await {
            Ok(post) => post,
            Err(e) => {
                if let Some(key) = &image_key {
                    self.remove_image(key).await;
                }
                return Err(e);
            }
        };
        info!(
            post_id = %post.id,
            author_id = %author.id,
            excerpt = %post.excerpt(),
            "Post created"
        );

        Ok(post)
    }

    /// Edit a post. Only its author may do so.
    pub async fn update(
        &self,
        editor: &user::Model,
        id: &str,
        input: PostInput,
        image: Option<ImageUpload>,
    ) -> AppResult<EditOutcome<post::Model>> {
        let post = self.post_repo.get_by_id(id).await?;
        if post.author_id != editor.id {
            return Ok(EditOutcome::NotAuthor);
        }

        let input = input.normalized();
        input.validate()?;
        let group_id = self.resolve_group(input.group.as_deref()).await?;
        let image = image
            .map(|upload| check_image(upload, self.max_upload_bytes))
            .transpose()?;

        let previous_image = post.image.clone();
        let mut active: post::ActiveModel = post.into();
        active.text = Set(input.text);
        active.group_id = Set(group_id);
        active.updated_at = Set(Some(chrono::Utc::now().into()));

        let new_image = match image {
            Some(image) => Some(self.store_image(image).await?),
            None => None,
        };
        if let Some(key) = &new_image {
            active.image = Set(Some(key.clone()));
        }

        let post = match self.post_repo.update(active).await {
            Ok(post) => post,
            Err(e) => {
                if let Some(key) = &new_image {
                    self.remove_image(key).await;
                }
                return Err(e);
            }
        };

        // The old file goes only once the row points at its replacement.
        if let (Some(_), Some(old)) = (&new_image, previous_image) {
            self.remove_image(&old).await;
        }
        info!(post_id = %post.id, "Post updated");

        Ok(EditOutcome::Updated(post))
    }

    /// Delete a post. Only its author may do so.
    pub async fn delete(&self, editor: &user::Model, id: &str) -> AppResult<EditOutcome<()>> {
        let post = self.post_repo.get_by_id(id).await?;
        if post.author_id != editor.id {
            return Ok(EditOutcome::NotAuthor);
        }

        self.post_repo.delete(&post.id).await?;
        if let Some(key) = &post.image {
            self.remove_image(key).await;
        }
        info!(post_id = %post.id, "Post deleted");

        Ok(EditOutcome::Updated(()))
    }

    async fn resolve_group(&self, group_id: Option<&str>) -> AppResult<Option<String>> {
        let Some(group_id) = group_id else {
            return Ok(None);
        };

        match self.group_repo.find_by_id(group_id).await? {
            Some(group) => Ok(Some(group.id)),
            None => Err(AppError::Validation(
                "Select a valid choice. That choice is not one of the available choices."
                    .to_string(),
            )),
        }
    }

    /// Every upload gets a fresh key, so storing never clobbers a live file.
    async fn store_image(&self, image: CheckedImage) -> AppResult<String> {
        let key = format!("posts/{}.{}", self.id_gen.generate(), image.extension);
        let uploaded = self
            .storage
            .upload(&key, &image.data, image.content_type)
            .await?;
        debug!(
            key = %uploaded.key,
            size = uploaded.size,
            content_type = %uploaded.content_type,
            sha256 = %uploaded.sha256,
            "Stored post image"
        );
        Ok(uploaded.key)
    }

    async fn remove_image(&self, key: &str) {
        if let Err(e) = self.storage.delete(key).await {
            warn!(error = %e, key = %key, "Failed to remove post image");
        }
    }

    async fn page_of(
        &self,
        posts: Vec<post::Model>,
        window: PageWindow,
    ) -> AppResult<Page<PostView>> {
        Ok(Page::new(self.hydrate(posts).await?, window))
    }

    async fn hydrate(&self, posts: Vec<post::Model>) -> AppResult<Vec<PostView>> {
        let author_ids: Vec<String> = posts
            .iter()
            .map(|p| p.author_id.clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let group_ids: Vec<String> = posts
            .iter()
            .filter_map(|p| p.group_id.clone())
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
        let groups: HashMap<String, group::Model> = self
            .group_repo
            .find_by_ids(&group_ids)
            .await?
            .into_iter()
            .map(|g| (g.id.clone(), g))
            .collect();

        Ok(posts
            .into_iter()
            .filter_map(|post| {
                let Some(author) = authors.get(&post.author_id).cloned() else {
                    warn!(post_id = %post.id, "Post author vanished during listing");
                    return None;
                };
                let group = post.group_id.as_ref().and_then(|g| groups.get(g).cloned());
                let image_url = post.image.as_deref().map(|k| self.storage.public_url(k));
                Some(PostView {
                    post,
                    author,
                    group,
                    image_url,
                })
            })
            .collect())
    }
}

/// Accept only gif, png, jpeg and webp files that actually decode.
fn check_image(upload: ImageUpload, max_bytes: usize) -> AppResult<CheckedImage> {
    let invalid = || {
        AppError::Validation(
            "Upload a valid image. \
             The file you uploaded was either not an image or a corrupted image."
                .to_string(),
        )
    };

    if upload.data.len() > max_bytes {
        return Err(AppError::Validation(format!(
            "Image is too large ({} bytes, limit {max_bytes})",
            upload.data.len()
        )));
    }

    let format = image::guess_format(&upload.data).map_err(|_| invalid())?;
    let extension = match format {
        ImageFormat::Gif => "gif",
        ImageFormat::Png => "png",
        ImageFormat::Jpeg => "jpg",
        ImageFormat::WebP => "webp",
        _ => return Err(invalid()),
    };

    if let Err(e) = image::load_from_memory_with_format(&upload.data, format) {
        warn!(error = %e, file_name = ?upload.file_name, "Rejected undecodable image");
        return Err(invalid());
    }

    Ok(CheckedImage {
        data: upload.data,
        extension,
        content_type: format.to_mime_type(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use inkwell_common::{LocalStorage, StorageBackend};
    use sea_orm::{
        DatabaseBackend, DatabaseConnection, DbErr, MockDatabase, MockExecResult, Value,
    };
    use std::io::Cursor;
    use std::sync::Arc;

    fn test_config() -> Config {
        config::Config::builder()
            .add_source(config::File::from_str(
                r#"
                [server]
                url = "http://localhost:8000"

                [database]
                url = "sqlite::memory:"

                [pagination]
                posts_per_page = 10
                "#,
                config::FileFormat::Toml,
            ))
            .build()
            .and_then(config::Config::try_deserialize)
            .unwrap()
    }

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

    fn create_test_post(id: &str, author_id: &str) -> post::Model {
        post::Model {
            id: id.to_string(),
            text: "hello".to_string(),
            author_id: author_id.to_string(),
            group_id: None,
            image: None,
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    fn count_row(n: i64) -> std::collections::BTreeMap<&'static str, Value> {
        maplit::btreemap! { "num_items" => Value::BigInt(Some(n)) }
    }

    fn png_bytes() -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        image::RgbImage::new(2, 2)
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    fn empty_db() -> DatabaseConnection {
        MockDatabase::new(DatabaseBackend::Postgres).into_connection()
    }

    fn service(
        post_db: DatabaseConnection,
        user_db: DatabaseConnection,
        group_db: DatabaseConnection,
        media: &tempfile::TempDir,
    ) -> PostService {
        let storage: SharedStorage = Arc::new(LocalStorage::new(
            media.path().to_path_buf(),
            "/media".to_string(),
        ));
        PostService::new(
            PostRepository::new(Arc::new(post_db)),
            UserRepository::new(Arc::new(user_db)),
            GroupRepository::new(Arc::new(group_db)),
            storage,
            &test_config(),
        )
    }

    #[test]
    fn test_post_input_validation() {
        let blank = PostInput {
            text: "   ".to_string(),
            group: Some(String::new()),
        }
        .normalized();
        assert!(blank.validate().is_err());
        assert_eq!(blank.group, None);

        let ok = PostInput {
            text: " hi ".to_string(),
            group: None,
        }
        .normalized();
        assert!(ok.validate().is_ok());
        assert_eq!(ok.text, "hi");
    }

    #[test]
    fn test_check_image_accepts_png() {
        let checked = check_image(
            ImageUpload {
                file_name: Some("a.png".to_string()),
                data: png_bytes(),
            },
            1024 * 1024,
        )
        .unwrap();
        assert_eq!(checked.extension, "png");
        assert_eq!(checked.content_type, "image/png");
    }

    #[test]
    fn test_check_image_rejects_non_images_and_oversize() {
        let text = ImageUpload {
            file_name: None,
            data: b"definitely not an image".to_vec(),
        };
        assert!(matches!(
            check_image(text, 1024),
            Err(AppError::Validation(_))
        ));

        let big = ImageUpload {
            file_name: None,
            data: png_bytes(),
        };
        assert!(matches!(check_image(big, 8), Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_index_hydrates_authors() {
        let media = tempfile::tempdir().unwrap();
        let post_db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[count_row(2)]])
            .append_query_results([[create_test_post("p2", "u1"), create_test_post("p1", "u1")]])
            .into_connection();
        let user_db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[create_test_user("u1")]])
            .into_connection();

        let page = service(post_db, user_db, empty_db(), &media)
            .index(None)
            .await
            .unwrap();

        assert_eq!(page.number, 1);
        assert_eq!(page.num_pages, 1);
        assert_eq!(page.len(), 2);
        assert_eq!(page.items[0].author.id, "u1");
        assert!(page.items[0].group.is_none());
    }

    #[tokio::test]
    async fn test_index_out_of_range_page_is_last() {
        let media = tempfile::tempdir().unwrap();
        let post_db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[count_row(13)]])
            .append_query_results([[
                create_test_post("p3", "u1"),
                create_test_post("p2", "u1"),
                create_test_post("p1", "u1"),
            ]])
            .into_connection();
        let user_db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[create_test_user("u1")]])
            .into_connection();

        let page = service(post_db, user_db, empty_db(), &media)
            .index(Some("99"))
            .await
            .unwrap();

        assert_eq!(page.number, 2);
        assert_eq!(page.len(), 3);
        assert!(page.has_previous);
        assert!(!page.has_next);
    }

    #[tokio::test]
    async fn test_create_rejects_unknown_group() {
        let media = tempfile::tempdir().unwrap();
        let group_db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<group::Model>::new()])
            .into_connection();

        let input = PostInput {
            text: "hello".to_string(),
            group: Some("nope".to_string()),
        };
        let result = service(empty_db(), empty_db(), group_db, &media)
            .create(&create_test_user("u1"), input, None)
            .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_create_stores_image() {
        let media = tempfile::tempdir().unwrap();
        let mut created = create_test_post("p1", "u1");
        created.image = Some("posts/p1.png".to_string());
        let post_db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[created]])
            .into_connection();

        let input = PostInput {
            text: "with a picture".to_string(),
            group: None,
        };
        let upload = ImageUpload {
            file_name: Some("pic.png".to_string()),
            data: png_bytes(),
        };
        let post = service(post_db, empty_db(), empty_db(), &media)
            .create(&create_test_user("u1"), input, Some(upload))
            .await
            .unwrap();

        assert!(post.image.is_some());
        let stored: Vec<_> = std::fs::read_dir(media.path().join("posts"))
            .unwrap()
            .collect();
        assert_eq!(stored.len(), 1);
    }

    fn stored_files(media: &tempfile::TempDir) -> Vec<String> {
        match std::fs::read_dir(media.path().join("posts")) {
            Ok(entries) => entries
                .map(|entry| format!("posts/{}", entry.unwrap().file_name().to_string_lossy()))
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    fn upload() -> ImageUpload {
        ImageUpload {
            file_name: Some("pic.png".to_string()),
            data: png_bytes(),
        }
    }

    #[tokio::test]
    async fn test_create_removes_image_when_insert_fails() {
        let media = tempfile::tempdir().unwrap();
        let post_db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_errors([DbErr::Custom("insert failed".to_string())])
            .into_connection();

        let input = PostInput {
            text: "with a picture".to_string(),
            group: None,
        };
        let result = service(post_db, empty_db(), empty_db(), &media)
            .create(&create_test_user("u1"), input, Some(upload()))
            .await;

        assert!(matches!(result, Err(AppError::Database(_))));
        assert!(stored_files(&media).is_empty());
    }

    #[tokio::test]
    async fn test_failed_update_keeps_previous_image() {
        let media = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(media.path().to_path_buf(), "/media".to_string());
        storage
            .upload("posts/old.png", &png_bytes(), "image/png")
            .await
            .unwrap();

        let mut existing = create_test_post("p1", "author");
        existing.image = Some("posts/old.png".to_string());
        let post_db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[existing]])
            .append_query_errors([DbErr::Custom("update failed".to_string())])
            .into_connection();

        let input = PostInput {
            text: "edited".to_string(),
            group: None,
        };
        let result = service(post_db, empty_db(), empty_db(), &media)
            .update(&create_test_user("author"), "p1", input, Some(upload()))
            .await;

        assert!(matches!(result, Err(AppError::Database(_))));
        assert!(media.path().join("posts/old.png").exists());
        assert_eq!(stored_files(&media), vec!["posts/old.png".to_string()]);
    }

    #[tokio::test]
    async fn test_update_replaces_image_after_commit() {
        let media = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(media.path().to_path_buf(), "/media".to_string());
        storage
            .upload("posts/old.png", &png_bytes(), "image/png")
            .await
            .unwrap();

        let mut existing = create_test_post("p1", "author");
        existing.image = Some("posts/old.png".to_string());
        let mut edited = create_test_post("p1", "author");
        edited.image = Some("posts/new.png".to_string());
        let post_db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[existing]])
            .append_query_results([[edited]])
            .into_connection();

        let input = PostInput {
            text: "edited".to_string(),
            group: None,
        };
        let outcome = service(post_db, empty_db(), empty_db(), &media)
            .update(&create_test_user("author"), "p1", input, Some(upload()))
            .await
            .unwrap();

        assert!(matches!(outcome, EditOutcome::Updated(_)));
        assert!(!media.path().join("posts/old.png").exists());
        let remaining = stored_files(&media);
        assert_eq!(remaining.len(), 1);
        assert_ne!(remaining[0], "posts/old.png");
    }

    #[tokio::test]
    async fn test_update_by_non_author_is_rejected() {
        let media = tempfile::tempdir().unwrap();
        let post_db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[create_test_post("p1", "author")]])
            .into_connection();

        let input = PostInput {
            text: "hijacked".to_string(),
            group: None,
        };
        let outcome = service(post_db, empty_db(), empty_db(), &media)
            .update(&create_test_user("intruder"), "p1", input, None)
            .await
            .unwrap();

        assert_eq!(outcome, EditOutcome::NotAuthor);
    }

    #[tokio::test]
    async fn test_update_by_author() {
        let media = tempfile::tempdir().unwrap();
        let mut edited = create_test_post("p1", "author");
        edited.text = "edited".to_string();
        let post_db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[create_test_post("p1", "author")]])
            .append_query_results([[edited]])
            .into_connection();

        let input = PostInput {
            text: "edited".to_string(),
            group: None,
        };
        let outcome = service(post_db, empty_db(), empty_db(), &media)
            .update(&create_test_user("author"), "p1", input, None)
            .await
            .unwrap();

        match outcome {
            EditOutcome::Updated(post) => assert_eq!(post.text, "edited"),
            EditOutcome::NotAuthor => panic!("Expected the author to be allowed"),
        }
    }

    #[tokio::test]
    async fn test_delete_by_non_author_is_rejected() {
        let media = tempfile::tempdir().unwrap();
        let post_db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[create_test_post("p1", "author")]])
            .into_connection();

        let outcome = service(post_db, empty_db(), empty_db(), &media)
            .delete(&create_test_user("intruder"), "p1")
            .await
            .unwrap();

        assert_eq!(outcome, EditOutcome::NotAuthor);
    }

    #[tokio::test]
    async fn test_delete_by_author() {
        let media = tempfile::tempdir().unwrap();
        let post_db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[create_test_post("p1", "author")]])
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .into_connection();

        let outcome = service(post_db, empty_db(), empty_db(), &media)
            .delete(&create_test_user("author"), "p1")
            .await
            .unwrap();

        assert_eq!(outcome, EditOutcome::Updated(()));
    }

    #[tokio::test]
    async fn test_get_not_found() {
        let media = tempfile::tempdir().unwrap();
        let post_db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<post::Model>::new()])
            .into_connection();

        let result = service(post_db, empty_db(), empty_db(), &media)
            .get("missing")
            .await;

        assert!(matches!(result, Err(AppError::PostNotFound(_))));
    }
}
