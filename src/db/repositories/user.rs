//! User repository
//!
//! Database operations for user accounts and their saved cities.
//!
//! This module provides:
//! - `UserRepository` trait defining the interface for user data access
//! - `SqlxUserRepository` implementing the trait over SQLite
//!
//! Count helpers exist for the statistics aggregator so dashboards never
//! pull full rows just to count them; the saved-city tabulation is the one
//! deliberate exception (it needs every name).

use crate::models::{SavedCity, User, UserRole};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Create a new user
    async fn create(&self, user: &User) -> Result<User>;

    /// Get user by ID (saved cities included)
    async fn get_by_id(&self, id: i64) -> Result<Option<User>>;

    /// Get user by email (saved cities included)
    async fn get_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Update a user's mutable fields (name, email, hash, role, ban flag,
    /// preferences, profile image)
    async fn update(&self, user: &User) -> Result<User>;

    /// Stamp the last-login timestamp
    async fn touch_last_login(&self, id: i64) -> Result<()>;

    /// Set the ban flag; returns the updated user, or None if absent
    async fn set_banned(&self, id: i64, banned: bool) -> Result<Option<User>>;

    /// Set the role; returns the updated user, or None if absent
    async fn set_role(&self, id: i64, role: UserRole) -> Result<Option<User>>;

    /// Delete a user; returns whether a row was removed
    async fn delete(&self, id: i64) -> Result<bool>;

    /// List all users, newest first
    async fn list(&self) -> Result<Vec<User>>;

    /// Bulk ban/unban, excluding the given caller id; returns rows affected
    async fn bulk_set_banned(&self, ids: &[i64], banned: bool, exclude_id: i64) -> Result<u64>;

    /// Bulk delete, excluding the given caller id and every admin account;
    /// returns rows affected
    async fn bulk_delete(&self, ids: &[i64], exclude_id: i64) -> Result<u64>;

    /// Count all users
    async fn count(&self) -> Result<i64>;

    /// Count users with the given role
    async fn count_by_role(&self, role: UserRole) -> Result<i64>;

    /// Count banned users
    async fn count_banned(&self) -> Result<i64>;

    /// Count users whose last login is at or after `since`
    async fn count_last_login_since(&self, since: DateTime<Utc>) -> Result<i64>;

    /// Count users created at or after `since`
    async fn count_created_since(&self, since: DateTime<Utc>) -> Result<i64>;

    /// Creation timestamps of users created at or after `since`
    async fn created_since(&self, since: DateTime<Utc>) -> Result<Vec<DateTime<Utc>>>;

    /// Saved cities for one user, in insertion order
    async fn saved_cities(&self, user_id: i64) -> Result<Vec<SavedCity>>;

    /// Add a saved city if not already present; returns whether it was added
    async fn add_saved_city(&self, user_id: i64, city: &SavedCity) -> Result<bool>;

    /// Remove a saved city by name; returns whether a row was removed
    async fn remove_saved_city(&self, user_id: i64, name: &str) -> Result<bool>;

    /// Every saved-city name across all users, in insertion order
    async fn all_saved_city_names(&self) -> Result<Vec<String>>;

    /// Total saved-city count across all users
    async fn count_saved_cities(&self) -> Result<i64>;
}

/// SQLx-based user repository implementation
pub struct SqlxUserRepository {
    pool: SqlitePool,
}

impl SqlxUserRepository {
    /// Create a new SQLx user repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: SqlitePool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }
}

const USER_COLUMNS: &str = "id, name, email, password_hash, role, is_banned, last_login, \
                            preferences, profile_image, created_at, updated_at";

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create(&self, user: &User) -> Result<User> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO users (name, email, password_hash, role, is_banned, preferences,
                               profile_image, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.to_string())
        .bind(user.is_banned)
        .bind(user.preferences.to_string())
        .bind(&user.profile_image)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .context("Failed to create user")?;

        let id = result.last_insert_rowid();

        self.get_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("User not found after insert"))
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        let row = sqlx::query(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to get user by ID")?;

        match row {
            Some(row) => {
                let mut user = row_to_user(&row)?;
                user.saved_cities = self.saved_cities(user.id).await?;
                Ok(Some(user))
            }
            None => Ok(None),
        }
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM users WHERE email = ?",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to get user by email")?;

        match row {
            Some(row) => {
                let mut user = row_to_user(&row)?;
                user.saved_cities = self.saved_cities(user.id).await?;
                Ok(Some(user))
            }
            None => Ok(None),
        }
    }

    async fn update(&self, user: &User) -> Result<User> {
        sqlx::query(
            r#"
            UPDATE users
            SET name = ?, email = ?, password_hash = ?, role = ?, is_banned = ?,
                preferences = ?, profile_image = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.to_string())
        .bind(user.is_banned)
        .bind(user.preferences.to_string())
        .bind(&user.profile_image)
        .bind(Utc::now())
        .bind(user.id)
        .execute(&self.pool)
        .await
        .context("Failed to update user")?;

        self.get_by_id(user.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("User not found after update"))
    }

    async fn touch_last_login(&self, id: i64) -> Result<()> {
        sqlx::query("UPDATE users SET last_login = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to update last login")?;
        Ok(())
    }

    async fn set_banned(&self, id: i64, banned: bool) -> Result<Option<User>> {
        let affected = sqlx::query("UPDATE users SET is_banned = ?, updated_at = ? WHERE id = ?")
            .bind(banned)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to set ban flag")?
            .rows_affected();

        if affected == 0 {
            return Ok(None);
        }
        self.get_by_id(id).await
    }

    async fn set_role(&self, id: i64, role: UserRole) -> Result<Option<User>> {
        let affected = sqlx::query("UPDATE users SET role = ?, updated_at = ? WHERE id = ?")
            .bind(role.to_string())
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to set role")?
            .rows_affected();

        if affected == 0 {
            return Ok(None);
        }
        self.get_by_id(id).await
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete user")?
            .rows_affected();
        Ok(affected > 0)
    }

    async fn list(&self) -> Result<Vec<User>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM users ORDER BY created_at DESC, id DESC",
            USER_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .context("Failed to list users")?;

        let mut users = Vec::with_capacity(rows.len());
        for row in &rows {
            users.push(row_to_user(row)?);
        }

        // One pass over saved_cities instead of a query per user
        let city_rows =
            sqlx::query("SELECT user_id, name, country FROM saved_cities ORDER BY position, id")
                .fetch_all(&self.pool)
                .await
                .context("Failed to load saved cities")?;

        let mut by_user: HashMap<i64, Vec<SavedCity>> = HashMap::new();
        for row in city_rows {
            by_user
                .entry(row.get("user_id"))
                .or_default()
                .push(SavedCity {
                    name: row.get("name"),
                    country: row.get("country"),
                });
        }
        for user in &mut users {
            if let Some(cities) = by_user.remove(&user.id) {
                user.saved_cities = cities;
            }
        }

        Ok(users)
    }

    async fn bulk_set_banned(&self, ids: &[i64], banned: bool, exclude_id: i64) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "UPDATE users SET is_banned = ?, updated_at = ? WHERE id IN ({}) AND id != ?",
            placeholders
        );

        let mut query = sqlx::query(&sql).bind(banned).bind(Utc::now());
        for id in ids {
            query = query.bind(id);
        }
        let affected = query
            .bind(exclude_id)
            .execute(&self.pool)
            .await
            .context("Failed to bulk update ban flags")?
            .rows_affected();

        Ok(affected)
    }

    async fn bulk_delete(&self, ids: &[i64], exclude_id: i64) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "DELETE FROM users WHERE id IN ({}) AND id != ? AND role != 'admin'",
            placeholders
        );

        let mut query = sqlx::query(&sql);
        for id in ids {
            query = query.bind(id);
        }
        let affected = query
            .bind(exclude_id)
            .execute(&self.pool)
            .await
            .context("Failed to bulk delete users")?
            .rows_affected();

        Ok(affected)
    }

    async fn count(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM users")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count users")?;
        Ok(row.get("count"))
    }

    async fn count_by_role(&self, role: UserRole) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM users WHERE role = ?")
            .bind(role.to_string())
            .fetch_one(&self.pool)
            .await
            .context("Failed to count users by role")?;
        Ok(row.get("count"))
    }

    async fn count_banned(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM users WHERE is_banned = 1")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count banned users")?;
        Ok(row.get("count"))
    }

    async fn count_last_login_since(&self, since: DateTime<Utc>) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM users WHERE last_login >= ?")
            .bind(since)
            .fetch_one(&self.pool)
            .await
            .context("Failed to count active users")?;
        Ok(row.get("count"))
    }

    async fn count_created_since(&self, since: DateTime<Utc>) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM users WHERE created_at >= ?")
            .bind(since)
            .fetch_one(&self.pool)
            .await
            .context("Failed to count new users")?;
        Ok(row.get("count"))
    }

    async fn created_since(&self, since: DateTime<Utc>) -> Result<Vec<DateTime<Utc>>> {
        let rows = sqlx::query("SELECT created_at FROM users WHERE created_at >= ?")
            .bind(since)
            .fetch_all(&self.pool)
            .await
            .context("Failed to load user creation timestamps")?;

        Ok(rows.iter().map(|r| r.get("created_at")).collect())
    }

    async fn saved_cities(&self, user_id: i64) -> Result<Vec<SavedCity>> {
        let rows = sqlx::query(
            "SELECT name, country FROM saved_cities WHERE user_id = ? ORDER BY position, id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to load saved cities")?;

        Ok(rows
            .into_iter()
            .map(|row| SavedCity {
                name: row.get("name"),
                country: row.get("country"),
            })
            .collect())
    }

    async fn add_saved_city(&self, user_id: i64, city: &SavedCity) -> Result<bool> {
        // position = current list length keeps insertion order
        let affected = sqlx::query(
            r#"
            INSERT OR IGNORE INTO saved_cities (user_id, name, country, position)
            VALUES (?, ?, ?, (SELECT COUNT(*) FROM saved_cities WHERE user_id = ?))
            "#,
        )
        .bind(user_id)
        .bind(&city.name)
        .bind(&city.country)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .context("Failed to add saved city")?
        .rows_affected();

        Ok(affected > 0)
    }

    async fn remove_saved_city(&self, user_id: i64, name: &str) -> Result<bool> {
        let affected = sqlx::query("DELETE FROM saved_cities WHERE user_id = ? AND name = ?")
            .bind(user_id)
            .bind(name)
            .execute(&self.pool)
            .await
            .context("Failed to remove saved city")?
            .rows_affected();

        Ok(affected > 0)
    }

    async fn all_saved_city_names(&self) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT name FROM saved_cities ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .context("Failed to load saved city names")?;

        Ok(rows.iter().map(|r| r.get("name")).collect())
    }

    async fn count_saved_cities(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM saved_cities")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count saved cities")?;
        Ok(row.get("count"))
    }
}

fn row_to_user(row: &sqlx::sqlite::SqliteRow) -> Result<User> {
    let role_str: String = row.get("role");
    let role = UserRole::from_str(&role_str)
        .with_context(|| format!("Invalid role in database: {}", role_str))?;

    let preferences_str: String = row.get("preferences");
    let preferences = serde_json::from_str(&preferences_str)
        .unwrap_or_else(|_| crate::models::default_preferences());

    Ok(User {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        role,
        is_banned: row.get("is_banned"),
        last_login: row.get("last_login"),
        preferences,
        profile_image: row.get("profile_image"),
        saved_cities: Vec::new(),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}
