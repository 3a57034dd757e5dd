//! User model
//!
//! Defines the User entity, the two-value role enum, and the per-user
//! saved-city entries backing the favorites feature.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// User entity representing a registered account.
///
/// Users carry either the `user` or `admin` role. Admin-gated endpoints
/// re-read the role and ban flag from the store on every request rather
/// than trusting the session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier
    pub id: i64,
    /// Display name
    pub name: String,
    /// Email address (unique, stored case-sensitively)
    pub email: String,
    /// Password hash (argon2)
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// User role
    pub role: UserRole,
    /// Ban flag
    pub is_banned: bool,
    /// Last successful login
    pub last_login: Option<DateTime<Utc>>,
    /// Free-form preference map (e.g. temperature unit)
    pub preferences: serde_json::Value,
    /// Optional profile image reference
    pub profile_image: Option<String>,
    /// Saved cities, in insertion order
    pub saved_cities: Vec<SavedCity>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new User with the given parameters.
    ///
    /// The password must already be hashed; use
    /// `services::password::hash_password()`.
    pub fn new(name: String, email: String, password_hash: String, role: UserRole) -> Self {
        let now = Utc::now();
        Self {
            id: 0, // Set by the database
            name,
            email,
            password_hash,
            role,
            is_banned: false,
            last_login: None,
            preferences: default_preferences(),
            profile_image: None,
            saved_cities: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Check if the user is an administrator
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

/// Default preference map for new accounts
pub fn default_preferences() -> serde_json::Value {
    serde_json::json!({ "unit": "C" })
}

/// User role for authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// Plain account
    #[default]
    User,
    /// Administrator - back-office access
    Admin,
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserRole::User => write!(f, "user"),
            UserRole::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for UserRole {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(UserRole::User),
            "admin" => Ok(UserRole::Admin),
            _ => Err(anyhow::anyhow!("Invalid user role: {}", s)),
        }
    }
}

/// A saved-city entry on a user record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedCity {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

/// Self-service profile update (named fields only)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfilePatch {
    /// New display name
    pub name: Option<String>,
    /// Replacement preference map
    pub preferences: Option<serde_json::Value>,
    /// New profile image reference (empty string clears it)
    pub profile_image: Option<String>,
    /// New plaintext password (will be hashed)
    pub password: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_new_defaults() {
        let user = User::new(
            "Alice".to_string(),
            "alice@example.com".to_string(),
            "hashed".to_string(),
            UserRole::User,
        );

        assert_eq!(user.id, 0);
        assert_eq!(user.email, "alice@example.com");
        assert!(!user.is_banned);
        assert!(user.last_login.is_none());
        assert!(user.saved_cities.is_empty());
        assert_eq!(user.preferences["unit"], "C");
    }

    #[test]
    fn test_is_admin() {
        let mut user = User::new(
            "Bob".to_string(),
            "bob@example.com".to_string(),
            "hash".to_string(),
            UserRole::User,
        );
        assert!(!user.is_admin());
        user.role = UserRole::Admin;
        assert!(user.is_admin());
    }

    #[test]
    fn test_role_display_round_trip() {
        assert_eq!(UserRole::User.to_string(), "user");
        assert_eq!(UserRole::Admin.to_string(), "admin");
        assert_eq!(UserRole::from_str("user").unwrap(), UserRole::User);
        assert_eq!(UserRole::from_str("admin").unwrap(), UserRole::Admin);
        assert!(UserRole::from_str("superuser").is_err());
        // Role strings are a wire contract and stay lowercase
        assert!(UserRole::from_str("Admin").is_err());
    }

    #[test]
    fn test_password_hash_never_serialized() {
        let user = User::new(
            "Carol".to_string(),
            "carol@example.com".to_string(),
            "$argon2id$secret".to_string(),
            UserRole::User,
        );
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("argon2id"));
        assert!(!json.contains("password_hash"));
    }
}
