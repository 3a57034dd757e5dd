//! Data models
//!
//! This module contains all data structures used throughout the Skycast service.
//! Models represent:
//! - Database entities (User, ContactMessage, Notification, FeaturedCity, ActivityLog)
//! - Enumerated status/type fields with their wire representations
//! - Patch inputs for update endpoints (named fields only)

mod activity_log;
mod featured_city;
mod message;
mod notification;
mod user;

pub use activity_log::{actions, ActivityLog, ActivityLogEntry};
pub use featured_city::{FeaturedCity, FeaturedCityPatch, NewFeaturedCity};
pub use message::{ContactMessage, MessagePatch, MessageStatus, NewContactMessage};
pub use notification::{
    Audience, NewNotification, Notification, NotificationPatch, NotificationType,
};
pub use user::{default_preferences, ProfilePatch, SavedCity, User, UserRole};
