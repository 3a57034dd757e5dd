//! Database repositories
//!
//! Repository pattern implementations for database access.
//! Each repository handles CRUD operations for a specific entity.

pub mod activity_log;
pub mod featured_city;
pub mod message;
pub mod notification;
pub mod settings;
pub mod user;

pub use activity_log::{ActivityLogRepository, SqlxActivityLogRepository};
pub use featured_city::{FeaturedCityRepository, SqlxFeaturedCityRepository};
pub use message::{MessageRepository, SqlxMessageRepository};
pub use notification::{NotificationRepository, SqlxNotificationRepository};
pub use settings::{Setting, SettingsRepository, SqlxSettingsRepository};
pub use user::{SqlxUserRepository, UserRepository};
