//! Database layer
//!
//! SQLite-backed persistence for the Skycast service. The service deploys
//! as a single binary with an embedded migration list, so the pool module
//! only knows about SQLite.
//!
//! # Usage
//!
//! ```ignore
//! use skycast::config::DatabaseConfig;
//! use skycast::db::{create_pool, migrations};
//!
//! let pool = create_pool(&DatabaseConfig::default()).await?;
//! migrations::run_migrations(&pool).await?;
//! ```

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{create_pool, create_test_pool};
