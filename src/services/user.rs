//! User service
//!
//! Business logic for accounts and sessions:
//! - Registration and credential checks
//! - Session issue (login) and token resolution
//! - Self-service profile updates
//! - Admin mutations (ban, role, delete, bulk) with self-protection
//!
//! Authorization state is never trusted from the token: every protected
//! request resolves the subject user from the store, so role changes and
//! bans take effect on the target's next request even though issued tokens
//! are not revoked early.

use anyhow::Result;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::db::repositories::{ActivityLogRepository, UserRepository};
use crate::models::{actions, ProfilePatch, User, UserRole};
use crate::services::password::{hash_password, verify_password};
use crate::services::token::TokenKeys;

/// Minimum accepted password length
const MIN_PASSWORD_LEN: usize = 6;

/// Error types for user service operations
#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    /// Unknown email or wrong password (indistinguishable on purpose)
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Correct credentials, banned account
    #[error("Account suspended. Contact support.")]
    AccountSuspended,

    /// Invalid input
    #[error("{0}")]
    ValidationError(String),

    /// Email already registered
    #[error("An account with this email already exists")]
    EmailTaken,

    /// Admin tried to ban/demote/delete their own account
    #[error("{0}")]
    SelfAction(&'static str),

    /// Target user does not exist
    #[error("User not found")]
    NotFound,

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Registration input
#[derive(Debug, Clone)]
pub struct RegisterInput {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl RegisterInput {
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            password: password.into(),
        }
    }
}

/// Login input
#[derive(Debug, Clone)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

impl LoginInput {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

/// Action keyword for bulk user operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkAction {
    Ban,
    Unban,
    Delete,
}

impl fmt::Display for BulkAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BulkAction::Ban => write!(f, "ban"),
            BulkAction::Unban => write!(f, "unban"),
            BulkAction::Delete => write!(f, "delete"),
        }
    }
}

impl FromStr for BulkAction {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ban" => Ok(BulkAction::Ban),
            "unban" => Ok(BulkAction::Unban),
            "delete" => Ok(BulkAction::Delete),
            _ => Err(anyhow::anyhow!("Invalid bulk action: {}", s)),
        }
    }
}

/// User service for accounts, sessions and admin mutations
pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    activity_repo: Arc<dyn ActivityLogRepository>,
    keys: Arc<TokenKeys>,
}

impl UserService {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        activity_repo: Arc<dyn ActivityLogRepository>,
        keys: Arc<TokenKeys>,
    ) -> Self {
        Self {
            user_repo,
            activity_repo,
            keys,
        }
    }

    /// Register a new account with the `user` role.
    pub async fn register(&self, input: RegisterInput) -> Result<User, UserServiceError> {
        let name = input.name.trim();
        let email = input.email.trim();

        if name.is_empty() || email.is_empty() || input.password.is_empty() {
            return Err(UserServiceError::ValidationError(
                "Name, email and password are required".to_string(),
            ));
        }
        if !email.contains('@') {
            return Err(UserServiceError::ValidationError(
                "Invalid email address".to_string(),
            ));
        }
        if input.password.len() < MIN_PASSWORD_LEN {
            return Err(UserServiceError::ValidationError(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }

        if self.user_repo.get_by_email(email).await?.is_some() {
            return Err(UserServiceError::EmailTaken);
        }

        let hash = hash_password(&input.password)?;
        let user = User::new(
            name.to_string(),
            email.to_string(),
            hash,
            UserRole::User,
        );

        Ok(self.user_repo.create(&user).await?)
    }

    /// Verify credentials and issue a session token.
    ///
    /// Returns the authenticated user and the signed token. The banned
    /// check runs before the password check, so a banned account learns it
    /// is suspended rather than seeing the generic credentials message.
    pub async fn login(
        &self,
        input: LoginInput,
        ip: &str,
    ) -> Result<(User, String), UserServiceError> {
        let user = self
            .user_repo
            .get_by_email(input.email.trim())
            .await?
            .ok_or(UserServiceError::InvalidCredentials)?;

        if user.is_banned {
            return Err(UserServiceError::AccountSuspended);
        }

        if !verify_password(&input.password, &user.password_hash)? {
            return Err(UserServiceError::InvalidCredentials);
        }

        self.user_repo.touch_last_login(user.id).await?;
        self.log(Some(user.id), actions::LOGIN, "User logged in", ip)
            .await;

        let token = self.keys.sign(&user)?;

        // Re-read so the response carries the fresh last_login stamp
        let user = self
            .user_repo
            .get_by_id(user.id)
            .await?
            .ok_or(UserServiceError::NotFound)?;

        Ok((user, token))
    }

    /// Resolve a token to its subject user.
    ///
    /// Returns `Ok(None)` for missing, malformed, expired or orphaned
    /// tokens; callers decide whether anonymous is acceptable.
    pub async fn resolve_token(&self, token: &str) -> Result<Option<User>, UserServiceError> {
        let claims = match self.keys.verify(token) {
            Ok(claims) => claims,
            Err(_) => return Ok(None),
        };

        Ok(self.user_repo.get_by_id(claims.sub).await?)
    }

    /// Apply a self-service profile update. Only the enumerated fields are
    /// writable; a password change is re-hashed.
    pub async fn update_profile(
        &self,
        user: &User,
        patch: ProfilePatch,
    ) -> Result<User, UserServiceError> {
        let mut updated = user.clone();

        if let Some(name) = patch.name {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(UserServiceError::ValidationError(
                    "Name cannot be empty".to_string(),
                ));
            }
            updated.name = name;
        }
        if let Some(preferences) = patch.preferences {
            updated.preferences = preferences;
        }
        if let Some(image) = patch.profile_image {
            updated.profile_image = if image.trim().is_empty() {
                None
            } else {
                Some(image.trim().to_string())
            };
        }
        if let Some(password) = patch.password {
            if password.len() < MIN_PASSWORD_LEN {
                return Err(UserServiceError::ValidationError(format!(
                    "Password must be at least {} characters",
                    MIN_PASSWORD_LEN
                )));
            }
            updated.password_hash = hash_password(&password)?;
        }

        Ok(self.user_repo.update(&updated).await?)
    }

    /// List every account, newest first.
    pub async fn list_users(&self) -> Result<Vec<User>, UserServiceError> {
        Ok(self.user_repo.list().await?)
    }

    /// Ban or unban a user on behalf of an admin.
    pub async fn set_banned(
        &self,
        actor: &User,
        target_id: i64,
        banned: bool,
        ip: &str,
    ) -> Result<User, UserServiceError> {
        if target_id == actor.id {
            return Err(UserServiceError::SelfAction("Cannot ban yourself"));
        }

        let updated = self
            .user_repo
            .set_banned(target_id, banned)
            .await?
            .ok_or(UserServiceError::NotFound)?;

        let verb = if banned { "Banned" } else { "Unbanned" };
        self.log(
            Some(actor.id),
            actions::ADMIN_ACTION,
            &format!("{} user {}", verb, updated.email),
            ip,
        )
        .await;

        Ok(updated)
    }

    /// Change a user's role on behalf of an admin.
    pub async fn set_role(
        &self,
        actor: &User,
        target_id: i64,
        role: UserRole,
        ip: &str,
    ) -> Result<User, UserServiceError> {
        if target_id == actor.id {
            return Err(UserServiceError::SelfAction("Cannot change your own role"));
        }

        let updated = self
            .user_repo
            .set_role(target_id, role)
            .await?
            .ok_or(UserServiceError::NotFound)?;

        self.log(
            Some(actor.id),
            actions::ADMIN_ACTION,
            &format!("Changed role of {} to {}", updated.email, role),
            ip,
        )
        .await;

        Ok(updated)
    }

    /// Delete a user on behalf of an admin.
    pub async fn delete_user(
        &self,
        actor: &User,
        target_id: i64,
        ip: &str,
    ) -> Result<(), UserServiceError> {
        if target_id == actor.id {
            return Err(UserServiceError::SelfAction("Cannot delete yourself"));
        }

        let target = self
            .user_repo
            .get_by_id(target_id)
            .await?
            .ok_or(UserServiceError::NotFound)?;

        if !self.user_repo.delete(target_id).await? {
            return Err(UserServiceError::NotFound);
        }

        self.log(
            Some(actor.id),
            actions::ADMIN_ACTION,
            &format!("Deleted user {}", target.email),
            ip,
        )
        .await;

        Ok(())
    }

    /// Apply a bulk action to a list of target ids.
    ///
    /// The caller's own id is always excluded; bulk delete additionally
    /// excludes every admin account. Returns the count actually affected.
    pub async fn bulk(
        &self,
        actor: &User,
        ids: &[i64],
        action: BulkAction,
        ip: &str,
    ) -> Result<u64, UserServiceError> {
        if ids.is_empty() {
            return Err(UserServiceError::ValidationError(
                "No users selected".to_string(),
            ));
        }

        let affected = match action {
            BulkAction::Ban => self.user_repo.bulk_set_banned(ids, true, actor.id).await?,
            BulkAction::Unban => self.user_repo.bulk_set_banned(ids, false, actor.id).await?,
            BulkAction::Delete => self.user_repo.bulk_delete(ids, actor.id).await?,
        };

        self.log(
            Some(actor.id),
            actions::ADMIN_ACTION,
            &format!("Bulk {} affecting {} user(s)", action, affected),
            ip,
        )
        .await;

        Ok(affected)
    }

    /// Append an audit entry; failures are logged, never propagated.
    async fn log(&self, user_id: Option<i64>, action: &str, details: &str, ip: &str) {
        if let Err(e) = self.activity_repo.append(user_id, action, details, ip).await {
            tracing::warn!("Failed to append activity log: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxActivityLogRepository, SqlxUserRepository};
    use crate::db::{create_test_pool, migrations};

    async fn setup() -> UserService {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        UserService::new(
            SqlxUserRepository::boxed(pool.clone()),
            SqlxActivityLogRepository::boxed(pool),
            Arc::new(TokenKeys::new("test-secret")),
        )
    }

    async fn register(service: &UserService, email: &str) -> User {
        service
            .register(RegisterInput::new("Test User", email, "hunter2!"))
            .await
            .unwrap()
    }

    async fn make_admin(service: &UserService, email: &str) -> User {
        let user = register(service, email).await;
        service
            .user_repo
            .set_role(user.id, UserRole::Admin)
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn test_register_validation() {
        let service = setup().await;

        let err = service
            .register(RegisterInput::new("", "a@example.com", "hunter2!"))
            .await
            .unwrap_err();
        assert!(matches!(err, UserServiceError::ValidationError(_)));

        let err = service
            .register(RegisterInput::new("A", "not-an-email", "hunter2!"))
            .await
            .unwrap_err();
        assert!(matches!(err, UserServiceError::ValidationError(_)));

        let err = service
            .register(RegisterInput::new("A", "a@example.com", "short"))
            .await
            .unwrap_err();
        assert!(matches!(err, UserServiceError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_register_duplicate_email() {
        let service = setup().await;
        register(&service, "dup@example.com").await;

        let err = service
            .register(RegisterInput::new("Other", "dup@example.com", "hunter2!"))
            .await
            .unwrap_err();
        assert!(matches!(err, UserServiceError::EmailTaken));
    }

    #[tokio::test]
    async fn test_login_issues_token_with_subject() {
        let service = setup().await;
        let user = register(&service, "alice@example.com").await;

        let (logged_in, token) = service
            .login(LoginInput::new("alice@example.com", "hunter2!"), "127.0.0.1")
            .await
            .unwrap();

        assert_eq!(logged_in.id, user.id);
        assert!(logged_in.last_login.is_some());

        let claims = service.keys.verify(&token).unwrap();
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.email, "alice@example.com");
    }

    #[tokio::test]
    async fn test_login_wrong_password_and_unknown_email_identical() {
        let service = setup().await;
        register(&service, "bob@example.com").await;

        let wrong = service
            .login(LoginInput::new("bob@example.com", "wrong-pass"), "127.0.0.1")
            .await
            .unwrap_err();
        let unknown = service
            .login(LoginInput::new("ghost@example.com", "hunter2!"), "127.0.0.1")
            .await
            .unwrap_err();

        assert_eq!(wrong.to_string(), unknown.to_string());
        assert!(matches!(wrong, UserServiceError::InvalidCredentials));
        assert!(matches!(unknown, UserServiceError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_banned_user_gets_no_token() {
        let service = setup().await;
        let user = register(&service, "banned@example.com").await;
        service.user_repo.set_banned(user.id, true).await.unwrap();

        let err = service
            .login(
                LoginInput::new("banned@example.com", "hunter2!"),
                "127.0.0.1",
            )
            .await
            .unwrap_err();
        assert!(matches!(err, UserServiceError::AccountSuspended));
    }

    #[tokio::test]
    async fn test_resolve_token_reads_fresh_role() {
        let service = setup().await;
        let user = register(&service, "carol@example.com").await;
        let (_, token) = service
            .login(LoginInput::new("carol@example.com", "hunter2!"), "127.0.0.1")
            .await
            .unwrap();

        let resolved = service.resolve_token(&token).await.unwrap().unwrap();
        assert_eq!(resolved.role, UserRole::User);

        // Promotion is visible through the original token
        service
            .user_repo
            .set_role(user.id, UserRole::Admin)
            .await
            .unwrap();
        let resolved = service.resolve_token(&token).await.unwrap().unwrap();
        assert_eq!(resolved.role, UserRole::Admin);
    }

    #[tokio::test]
    async fn test_resolve_token_fail_open() {
        let service = setup().await;
        assert!(service.resolve_token("garbage").await.unwrap().is_none());

        // Deleted subject resolves to anonymous, not an error
        let user = register(&service, "gone@example.com").await;
        let (_, token) = service
            .login(LoginInput::new("gone@example.com", "hunter2!"), "127.0.0.1")
            .await
            .unwrap();
        service.user_repo.delete(user.id).await.unwrap();
        assert!(service.resolve_token(&token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_self_protection() {
        let service = setup().await;
        let admin = make_admin(&service, "admin@example.com").await;

        let err = service
            .set_banned(&admin, admin.id, true, "127.0.0.1")
            .await
            .unwrap_err();
        assert!(matches!(err, UserServiceError::SelfAction(_)));

        let err = service
            .set_role(&admin, admin.id, UserRole::User, "127.0.0.1")
            .await
            .unwrap_err();
        assert!(matches!(err, UserServiceError::SelfAction(_)));

        let err = service
            .delete_user(&admin, admin.id, "127.0.0.1")
            .await
            .unwrap_err();
        assert!(matches!(err, UserServiceError::SelfAction(_)));
    }

    #[tokio::test]
    async fn test_ban_and_role_toggle_idempotence() {
        let service = setup().await;
        let admin = make_admin(&service, "admin@example.com").await;
        let target = register(&service, "target@example.com").await;

        let banned = service
            .set_banned(&admin, target.id, true, "127.0.0.1")
            .await
            .unwrap();
        assert!(banned.is_banned);
        let unbanned = service
            .set_banned(&admin, target.id, false, "127.0.0.1")
            .await
            .unwrap();
        assert_eq!(unbanned.is_banned, target.is_banned);

        let promoted = service
            .set_role(&admin, target.id, UserRole::Admin, "127.0.0.1")
            .await
            .unwrap();
        assert_eq!(promoted.role, UserRole::Admin);
        let demoted = service
            .set_role(&admin, target.id, UserRole::User, "127.0.0.1")
            .await
            .unwrap();
        assert_eq!(demoted.role, target.role);
    }

    #[tokio::test]
    async fn test_bulk_delete_reports_actual_count() {
        let service = setup().await;
        let admin = make_admin(&service, "admin@example.com").await;
        let other_admin = make_admin(&service, "admin2@example.com").await;
        let u1 = register(&service, "u1@example.com").await;
        let u2 = register(&service, "u2@example.com").await;

        let affected = service
            .bulk(
                &admin,
                &[admin.id, other_admin.id, u1.id, u2.id],
                BulkAction::Delete,
                "127.0.0.1",
            )
            .await
            .unwrap();
        assert_eq!(affected, 2);

        let err = service
            .bulk(&admin, &[], BulkAction::Ban, "127.0.0.1")
            .await
            .unwrap_err();
        assert!(matches!(err, UserServiceError::ValidationError(_)));
    }

    #[test]
    fn test_bulk_action_parse() {
        assert_eq!(BulkAction::from_str("ban").unwrap(), BulkAction::Ban);
        assert_eq!(BulkAction::from_str("unban").unwrap(), BulkAction::Unban);
        assert_eq!(BulkAction::from_str("delete").unwrap(), BulkAction::Delete);
        assert!(BulkAction::from_str("promote").is_err());
    }
}
