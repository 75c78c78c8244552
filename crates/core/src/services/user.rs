//! User service.

use std::sync::LazyLock;
use std::time::Duration;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::Utc;
use inkwell_common::{AppError, AppResult, Config, IdGenerator, SharedStorage, config::AdminConfig};
use inkwell_db::{
    entities::user,
    repositories::{PostRepository, UserRepository},
};
use regex::Regex;
use sea_orm::Set;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use validator::Validate;

use super::email::EmailService;

/// Letters, digits and `@.+-_`.
static USERNAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\w.@+-]+$").expect("valid username pattern"));

/// Message shown for a reset link that is unknown, used or expired.
const INVALID_RESET_LINK: &str =
    "The password reset link was invalid, possibly because it has already been used.";

/// User service for business logic.
#[derive(Clone)]
pub struct UserService {
    user_repo: UserRepository,
    post_repo: PostRepository,
    storage: SharedStorage,
    mailer: EmailService,
    admin: AdminConfig,
    site_url: String,
    reset_timeout: Duration,
    id_gen: IdGenerator,
}

/// Input for signing up.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct SignupInput {
    #[validate(
        length(min = 1, max = 150),
        regex(
            path = *USERNAME_RE,
            message = "Enter a valid username. \
                       This value may contain only letters, numbers, and @/./+/-/_ characters."
        )
    )]
    pub username: String,

    #[validate(length(min = 8, max = 128))]
    pub password: String,

    #[validate(must_match(other = "password", message = "The two password fields didn't match."))]
    pub password_confirmation: String,

    #[validate(length(max = 150))]
    pub name: Option<String>,

    /// Where password reset links are sent.
    #[validate(email, length(max = 254))]
    pub email: Option<String>,
}

impl SignupInput {
    fn normalized(self) -> Self {
        Self {
            username: self.username.trim().to_string(),
            name: trimmed(self.name),
            email: trimmed(self.email),
            ..self
        }
    }
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Input for changing a password.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct PasswordChangeInput {
    #[validate(length(min = 1))]
    pub old_password: String,

    #[validate(length(min = 8, max = 128))]
    pub new_password1: String,

    #[validate(must_match(
        other = "new_password1",
        message = "The two password fields didn't match."
    ))]
    pub new_password2: String,
}

/// Input for requesting a password reset link.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct PasswordResetInput {
    #[validate(email, length(max = 254))]
    pub email: String,
}

/// Input for choosing a new password from a reset link.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct SetPasswordInput {
    #[validate(length(min = 8, max = 128))]
    pub new_password1: String,

    #[validate(must_match(
        other = "new_password1",
        message = "The two password fields didn't match."
    ))]
    pub new_password2: String,
}

impl UserService {
    /// Create a new user service.
    #[must_use]
    pub fn new(
        user_repo: UserRepository,
        post_repo: PostRepository,
        storage: SharedStorage,
        mailer: EmailService,
        config: &Config,
    ) -> Self {
        Self {
            user_repo,
            post_repo,
            storage,
            mailer,
            admin: config.admin.clone(),
            site_url: config.server.url.trim_end_matches('/').to_string(),
            reset_timeout: Duration::from_secs(config.email.password_reset_timeout_secs),
            id_gen: IdGenerator::new(),
        }
    }

    /// Register a new user.
    pub async fn signup(&self, input: SignupInput) -> AppResult<user::Model> {
        let input = input.normalized();
        input.validate()?;

        if self
            .user_repo
            .find_by_username(&input.username)
            .await?
            .is_some()
        {
            return Err(AppError::Validation(
                "A user with that username already exists.".to_string(),
            ));
        }

        let password_hash = hash_password(&input.password)?;
        let is_admin = self.admin.is_admin(&input.username);

        let model = user::ActiveModel {
            id: Set(self.id_gen.generate()),
            username: Set(input.username.clone()),
            username_lower: Set(input.username.to_lowercase()),
            name: Set(input.name),
            password: Set(password_hash),
            token: Set(Some(self.id_gen.generate_token())),
            is_admin: Set(is_admin),
            email: Set(input.email),
            password_reset_token: Set(None),
            password_reset_sent_at: Set(None),
            created_at: Set(Utc::now().into()),
            updated_at: Set(None),
        };

        let user = self.user_repo.create(model).await?;
        info!(user_id = %user.id, username = %user.username, is_admin, "User signed up");

        Ok(user)
    }

    /// Get a user by username.
    pub async fn get_by_username(&self, username: &str) -> AppResult<user::Model> {
        self.user_repo.get_by_username(username).await
    }

    /// Authenticate a user by session token.
    pub async fn authenticate_by_token(&self, token: &str) -> AppResult<user::Model> {
        self.user_repo
            .find_by_token(token)
            .await?
            .ok_or(AppError::Unauthorized)
    }

    /// Authenticate a user by username and password.
    pub async fn authenticate(&self, username: &str, password: &str) -> AppResult<user::Model> {
        let user = self
            .user_repo
            .find_by_username(username.trim())
            .await?
            .ok_or(AppError::Unauthorized)?;

        if !verify_password(password, &user.password)? {
            return Err(AppError::Unauthorized);
        }

        Ok(user)
    }

    /// The user's current session token, minting one if they have none.
    pub async fn session_token(&self, user: &user::Model) -> AppResult<String> {
        match &user.token {
            Some(token) => Ok(token.clone()),
            None => self.regenerate_token(&user.id).await,
        }
    }

    /// Invalidate the user's session by rotating their token.
    pub async fn logout(&self, user_id: &str) -> AppResult<()> {
        self.regenerate_token(user_id).await?;
        info!(user_id = %user_id, "User logged out");
        Ok(())
    }

    /// Regenerate a user's authentication token.
    pub async fn regenerate_token(&self, user_id: &str) -> AppResult<String> {
        let user = self.user_repo.get_by_id(user_id).await?;
        let new_token = self.id_gen.generate_token();

        let mut active: user::ActiveModel = user.into();
        active.token = Set(Some(new_token.clone()));
        active.updated_at = Set(Some(Utc::now().into()));

        self.user_repo.update(active).await?;

        Ok(new_token)
    }

    /// Change a user's password after checking the old one.
    pub async fn change_password(
        &self,
        user_id: &str,
        input: PasswordChangeInput,
    ) -> AppResult<user::Model> {
        input.validate()?;

        let user = self.user_repo.get_by_id(user_id).await?;
        if !verify_password(&input.old_password, &user.password)? {
            return Err(AppError::Validation(
                "Your old password was entered incorrectly. Please enter it again.".to_string(),
            ));
        }

        let mut active: user::ActiveModel = user.into();
        active.password = Set(hash_password(&input.new_password1)?);
        active.password_reset_token = Set(None);
        active.password_reset_sent_at = Set(None);
        active.updated_at = Set(Some(Utc::now().into()));

        let user = self.user_repo.update(active).await?;
        info!(user_id = %user.id, "Password changed");

        Ok(user)
    }

    /// Mail a reset link to every account registered under the address.
    ///
    /// An address with no account is not an error, so callers can answer the
    /// same way whether or not it matched.
    pub async fn request_password_reset(&self, input: PasswordResetInput) -> AppResult<()> {
        input.validate()?;

        let users = self.user_repo.find_by_email(&input.email).await?;
        if users.is_empty() {
            debug!("Password reset requested for an unknown address");
        }

        for user in users {
            let Some(address) = user.email.clone() else {
                continue;
            };
            let token = self.id_gen.generate_token();
            let (user_id, username) = (user.id.clone(), user.username.clone());

            let mut active: user::ActiveModel = user.into();
            active.password_reset_token = Set(Some(token_digest(&token)));
            active.password_reset_sent_at = Set(Some(Utc::now().into()));
            self.user_repo.update(active).await?;

            let link = format!("{}/auth/reset/{user_id}/{token}/", self.site_url);
            self.mailer
                .send_password_reset(&address, &username, &link)
                .await?;
            info!(user_id = %user_id, "Password reset link sent");
        }

        Ok(())
    }

    /// Whether a reset link still works.
    pub async fn reset_link_is_valid(&self, user_id: &str, token: &str) -> AppResult<bool> {
        Ok(self.reset_link_user(user_id, token).await?.is_some())
    }

    /// Set a new password through a reset link.
    ///
    /// The link is spent and every existing session is signed out.
    pub async fn reset_password(
        &self,
        user_id: &str,
        token: &str,
        input: SetPasswordInput,
    ) -> AppResult<user::Model> {
        let user = self
            .reset_link_user(user_id, token)
            .await?
            .ok_or_else(|| AppError::Validation(INVALID_RESET_LINK.to_string()))?;
        input.validate()?;

        let mut active: user::ActiveModel = user.into();
        active.password = Set(hash_password(&input.new_password1)?);
        active.password_reset_token = Set(None);
        active.password_reset_sent_at = Set(None);
        active.token = Set(Some(self.id_gen.generate_token()));
        active.updated_at = Set(Some(Utc::now().into()));

        let user = self.user_repo.update(active).await?;
        info!(user_id = %user.id, "Password reset");

        Ok(user)
    }

    async fn reset_link_user(&self, user_id: &str, token: &str) -> AppResult<Option<user::Model>> {
        let Some(user) = self.user_repo.find_by_id(user_id).await? else {
            return Ok(None);
        };

        let Some((digest, sent_at)) = user
            .password_reset_token
            .as_deref()
            .zip(user.password_reset_sent_at)
        else {
            return Ok(None);
        };

        let fresh = Utc::now()
            .signed_duration_since(sent_at)
            .to_std()
            .is_ok_and(|age| age <= self.reset_timeout);

        if fresh && digest == token_digest(token) {
            Ok(Some(user))
        } else {
            Ok(None)
        }
    }

    /// Delete a user and everything they authored, images included.
    pub async fn delete_by_username(&self, username: &str) -> AppResult<()> {
        let user = self.user_repo.get_by_username(username).await?;
        let image_keys = self.post_repo.image_keys_by_author(&user.id).await?;

        self.user_repo.delete(&user.id).await?;

        for key in &image_keys {
            if let Err(e) = self.storage.delete(key).await {
                warn!(error = %e, key = %key, "Failed to remove post image");
            }
        }
        info!(
            user_id = %user.id,
            username = %user.username,
            images = image_keys.len(),
            "User deleted"
        );
        Ok(())
    }
}

/// SHA-256 hex of a reset token, as stored on the user row.
fn token_digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Hash a password using Argon2.
fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {e}")))
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|e| AppError::Internal(format!("Invalid hash: {e}")))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use inkwell_common::{LocalStorage, StorageBackend, config::EmailConfig};
    use sea_orm::{DatabaseBackend, DatabaseConnection, MockDatabase, MockExecResult, Value};
    use std::path::Path;
    use std::sync::Arc;

    fn test_config(admins: &[&str]) -> Config {
        let toml = format!(
            r#"
            [server]
            url = "http://localhost:8000"

            [database]
            url = "sqlite::memory:"

            [admin]
            usernames = [{}]
            "#,
            admins
                .iter()
                .map(|a| format!("\"{a}\""))
                .collect::<Vec<_>>()
                .join(", ")
        );
        config::Config::builder()
            .add_source(config::File::from_str(&toml, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    fn create_test_user(id: &str, username: &str, password: &str) -> user::Model {
        user::Model {
            id: id.to_string(),
            username: username.to_string(),
            username_lower: username.to_lowercase(),
            name: None,
            password: hash_password(password).unwrap(),
            token: Some("test_token".to_string()),
            is_admin: false,
            email: None,
            password_reset_token: None,
            password_reset_sent_at: None,
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    fn build(
        user_db: DatabaseConnection,
        post_db: DatabaseConnection,
        dir: &Path,
        admins: &[&str],
    ) -> UserService {
        let storage: SharedStorage = Arc::new(LocalStorage::new(
            dir.join("media"),
            "/media".to_string(),
        ));
        let mailer = EmailService::from_config(&EmailConfig {
            file_path: dir.join("outbox"),
            ..EmailConfig::default()
        })
        .unwrap();
        UserService::new(
            UserRepository::new(Arc::new(user_db)),
            PostRepository::new(Arc::new(post_db)),
            storage,
            mailer,
            &test_config(admins),
        )
    }

    fn service(db: DatabaseConnection, admins: &[&str]) -> UserService {
        let unused = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        build(db, unused, Path::new("unused"), admins)
    }

    fn signup_input(username: &str, password: &str, confirmation: &str) -> SignupInput {
        SignupInput {
            username: username.to_string(),
            password: password.to_string(),
            password_confirmation: confirmation.to_string(),
            name: None,
            email: None,
        }
    }

    fn with_reset_token(mut user: user::Model, token: &str, age: chrono::Duration) -> user::Model {
        user.email = Some("leo@example.com".to_string());
        user.password_reset_token = Some(token_digest(token));
        user.password_reset_sent_at = Some((Utc::now() - age).into());
        user
    }

    fn sent_links(dir: &Path) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(dir.join("outbox")) else {
            return Vec::new();
        };
        entries
            .map(|entry| {
                let raw = std::fs::read_to_string(entry.unwrap().path())
                    .unwrap()
                    .replace("=\r\n", "");
                let start = raw.find("http://").unwrap();
                let end = start + raw[start..].find(char::is_whitespace).unwrap();
                raw[start..end].to_string()
            })
            .collect()
    }

    #[test]
    fn test_hash_password() {
        let hash = hash_password("test_password_123").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("test_password_123", &hash).unwrap());
        assert!(!verify_password("wrong_password", &hash).unwrap());
    }

    #[test]
    fn test_verify_password_invalid_hash() {
        assert!(verify_password("password", "not-a-hash").is_err());
    }

    #[test]
    fn test_signup_input_validation() {
        assert!(signup_input("bad name", "password123", "password123")
            .validate()
            .is_err());
        assert!(signup_input("a".repeat(151).as_str(), "password123", "password123")
            .validate()
            .is_err());
        assert!(signup_input("leo", "short", "short").validate().is_err());
        assert!(signup_input("leo", "password123", "password124")
            .validate()
            .is_err());
        assert!(signup_input("leo.t+1@x-y_z", "password123", "password123")
            .validate()
            .is_ok());

        let bad_email = SignupInput {
            email: Some("not-an-email".to_string()),
            ..signup_input("leo", "password123", "password123")
        };
        assert!(bad_email.validate().is_err());
    }

    #[test]
    fn test_signup_input_is_trimmed() {
        let input = SignupInput {
            name: Some("   ".to_string()),
            email: Some(" leo@example.com ".to_string()),
            ..signup_input("  leo  ", "password123", "password123")
        }
        .normalized();

        assert_eq!(input.username, "leo");
        assert_eq!(input.name, None);
        assert_eq!(input.email.as_deref(), Some("leo@example.com"));
    }

    #[test]
    fn test_password_change_input_validation() {
        let mismatched = PasswordChangeInput {
            old_password: "old".to_string(),
            new_password1: "password123".to_string(),
            new_password2: "password321".to_string(),
        };
        assert!(mismatched.validate().is_err());

        let ok = PasswordChangeInput {
            new_password2: "password123".to_string(),
            ..mismatched
        };
        assert!(ok.validate().is_ok());
    }

    #[tokio::test]
    async fn test_signup_rejects_taken_username() {
        let existing = create_test_user("user1", "Leo", "password123");
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[existing]])
            .into_connection();

        let result = service(db, &[])
            .signup(signup_input("leo", "password123", "password123"))
            .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_signup_grants_configured_admin() {
        let mut created = create_test_user("user1", "root", "password123");
        created.is_admin = true;

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<user::Model>::new()])
            .append_query_results([[created]])
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .into_connection();

        let user = service(db, &["root"])
            .signup(signup_input("root", "password123", "password123"))
            .await
            .unwrap();

        assert!(user.is_admin);
    }

    #[tokio::test]
    async fn test_authenticate_success() {
        let user = create_test_user("user1", "leo", "password123");
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[user]])
            .into_connection();

        let result = service(db, &[])
            .authenticate("leo", "password123")
            .await
            .unwrap();
        assert_eq!(result.id, "user1");
    }

    #[tokio::test]
    async fn test_authenticate_wrong_password() {
        let user = create_test_user("user1", "leo", "password123");
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[user]])
            .into_connection();

        let result = service(db, &[]).authenticate("leo", "nope-nope").await;
        assert!(matches!(result, Err(AppError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_authenticate_by_token_not_found() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<user::Model>::new()])
            .into_connection();

        let result = service(db, &[]).authenticate_by_token("invalid").await;
        assert!(matches!(result, Err(AppError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_change_password_rejects_wrong_old_password() {
        let user = create_test_user("user1", "leo", "password123");
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[user]])
            .into_connection();

        let input = PasswordChangeInput {
            old_password: "not-my-password".to_string(),
            new_password1: "newpassword1".to_string(),
            new_password2: "newpassword1".to_string(),
        };
        let result = service(db, &[]).change_password("user1", input).await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_delete_by_username_not_found() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<user::Model>::new()])
            .into_connection();

        let result = service(db, &[]).delete_by_username("ghost").await;
        assert!(matches!(result, Err(AppError::UserNotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_by_username_removes_post_images() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path().join("media"), "/media".to_string());
        for key in ["posts/a.png", "posts/b.gif"] {
            storage.upload(key, b"img", "image/png").await.unwrap();
        }
        storage
            .upload("posts/other.png", b"img", "image/png")
            .await
            .unwrap();

        let user_db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[create_test_user("user1", "leo", "password123")]])
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .into_connection();
        let post_db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[
                maplit::btreemap! {
                    "image" => Value::String(Some(Box::new("posts/a.png".to_string())))
                },
                maplit::btreemap! {
                    "image" => Value::String(Some(Box::new("posts/b.gif".to_string())))
                },
            ]])
            .into_connection();

        build(user_db, post_db, dir.path(), &[])
            .delete_by_username("leo")
            .await
            .unwrap();

        let media = dir.path().join("media");
        assert!(!media.join("posts/a.png").exists());
        assert!(!media.join("posts/b.gif").exists());
        assert!(media.join("posts/other.png").exists());
    }

    #[tokio::test]
    async fn test_password_reset_for_unknown_address_sends_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let user_db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<user::Model>::new()])
            .into_connection();
        let post_db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();

        build(user_db, post_db, dir.path(), &[])
            .request_password_reset(PasswordResetInput {
                email: "nobody@example.com".to_string(),
            })
            .await
            .unwrap();

        assert!(sent_links(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_password_reset_mails_link_and_stores_digest() {
        let dir = tempfile::tempdir().unwrap();
        let mut user = create_test_user("user1", "leo", "password123");
        user.email = Some("Leo@Example.com".to_string());

        let user_db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[user.clone()]])
                .append_query_results([[user]])
                .into_connection(),
        );
        let post_db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let storage: SharedStorage =
            Arc::new(LocalStorage::new(dir.path().join("media"), "/media".to_string()));
        let mailer = EmailService::from_config(&EmailConfig {
            file_path: dir.path().join("outbox"),
            ..EmailConfig::default()
        })
        .unwrap();
        let service = UserService::new(
            UserRepository::new(Arc::clone(&user_db)),
            PostRepository::new(Arc::new(post_db)),
            storage,
            mailer,
            &test_config(&[]),
        );

        service
            .request_password_reset(PasswordResetInput {
                email: "leo@example.com".to_string(),
            })
            .await
            .unwrap();
        drop(service);

        let links = sent_links(dir.path());
        assert_eq!(links.len(), 1);
        let prefix = "http://localhost:8000/auth/reset/user1/";
        assert!(links[0].starts_with(prefix), "{}", links[0]);
        let token = links[0][prefix.len()..].trim_end_matches('/');

        let conn = Arc::try_unwrap(user_db).ok().unwrap();
        let log = format!("{:?}", conn.into_transaction_log());
        assert!(log.contains(&token_digest(token)));
        assert!(!log.contains(token));
    }

    #[tokio::test]
    async fn test_reset_link_validity() {
        let user = create_test_user("user1", "leo", "password123");
        let fresh = with_reset_token(user.clone(), "tok", chrono::Duration::hours(1));
        let stale = with_reset_token(user, "tok", chrono::Duration::days(4));

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[fresh.clone()]])
            .append_query_results([[fresh]])
            .append_query_results([[stale]])
            .append_query_results([Vec::<user::Model>::new()])
            .into_connection();
        let service = service(db, &[]);

        assert!(service.reset_link_is_valid("user1", "tok").await.unwrap());
        assert!(!service.reset_link_is_valid("user1", "forged").await.unwrap());
        assert!(!service.reset_link_is_valid("user1", "tok").await.unwrap());
        assert!(!service.reset_link_is_valid("ghost", "tok").await.unwrap());
    }

    #[tokio::test]
    async fn test_reset_password_spends_link_and_rotates_session() {
        let user = with_reset_token(
            create_test_user("user1", "leo", "password123"),
            "tok",
            chrono::Duration::minutes(5),
        );
        let mut updated = create_test_user("user1", "leo", "brand-new-pass");
        updated.token = Some("rotated".to_string());

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[user]])
            .append_query_results([[updated]])
            .into_connection();

        let input = SetPasswordInput {
            new_password1: "brand-new-pass".to_string(),
            new_password2: "brand-new-pass".to_string(),
        };
        let user = service(db, &[])
            .reset_password("user1", "tok", input)
            .await
            .unwrap();

        assert!(user.password_reset_token.is_none());
        assert_ne!(user.token.as_deref(), Some("test_token"));
    }

    #[tokio::test]
    async fn test_reset_password_with_bad_link_is_rejected() {
        let user = with_reset_token(
            create_test_user("user1", "leo", "password123"),
            "tok",
            chrono::Duration::minutes(5),
        );
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[user]])
            .into_connection();

        let input = SetPasswordInput {
            new_password1: "brand-new-pass".to_string(),
            new_password2: "brand-new-pass".to_string(),
        };
        let result = service(db, &[])
            .reset_password("user1", "wrong", input)
            .await;

        assert!(matches!(result, Err(AppError::Validation(msg)) if msg == INVALID_RESET_LINK));
    }
}
