//! Services layer - Business logic
//!
//! This module contains all business logic services for the Skycast service.
//! Services are responsible for:
//! - Implementing business rules
//! - Coordinating between repositories
//! - Handling validation and error cases

pub mod password;
pub mod settings;
pub mod stats;
pub mod token;
pub mod user;
pub mod weather;

pub use password::{hash_password, verify_password};
pub use settings::{SettingsPatch, SettingsService, SettingsServiceError, SystemSettings};
pub use stats::{CityCount, DashboardStats, GrowthPoint, StatsService};
pub use token::{Claims, TokenKeys, TOKEN_TTL_DAYS};
pub use user::{
    BulkAction, LoginInput, RegisterInput, UserService, UserServiceError,
};
pub use weather::{CitySuggestion, WeatherQuery, WeatherService, WeatherServiceError};
