//! # Database Module
//!
//! Persistence for users, class sessions and attendance records. The
//! [`Store`] trait is implemented by a PostgreSQL backend (tokio-postgres with
//! deadpool pooling and refinery migrations) and an in-memory backend for
//! demo mode and tests.

pub mod connection;
pub mod memory;
pub mod migrations;
pub mod models;
pub mod postgres;
pub mod store;

pub use connection::{DatabaseConnection, PoolConfig};
pub use memory::MemoryStore;
pub use models::*;
pub use postgres::PgStore;
pub use store::{Store, StoreError, StoreResult};
