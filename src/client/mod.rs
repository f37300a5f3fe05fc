//! # Client Module
//!
//! Typed access to the Attendify API for front ends and tools.
//!
//! ## Layers
//! - `api`: the single HTTP chokepoint. Attaches the bearer token and
//!   normalizes failures into [`ApiError`].
//! - `endpoints`: one typed method per backend route.
//! - `session`: sign-in state machine, mirrored into durable storage.
//! - `resources`: `{data, loading, error}` wrappers that re-fetch on demand.
//! - `navigation`: role-filtered section table for menus and route guards.

pub mod api;
pub mod config;
pub mod endpoints;
pub mod error;
pub mod navigation;
pub mod resources;
pub mod session;
pub mod storage;

pub use api::{ApiClient, RequestOptions};
pub use config::ClientConfig;
pub use error::ApiError;
pub use navigation::{NavSection, can_access, visible_sections};
pub use resources::{
    Resource, ResourceState, attendance_resource, classes_resource, dashboard_resource,
};
pub use session::{SessionContext, SessionState};
pub use storage::{DurableStorage, FileStorage, MemoryStorage, StorageError};
