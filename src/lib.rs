//! # Attendify
//!
//! Student attendance system.
//!
//! - [`client`]: API client, session context, role navigation and resource
//!   fetchers used by front ends.
//! - [`server`]: the REST backend (auth, attendance, classes, dashboards,
//!   directory, analytics, reports) over Postgres or in-memory storage.
//! - [`types`]: the wire types both halves share.

pub mod auth;
pub mod client;
pub mod config;
pub mod database;
pub mod error;
pub mod routes;
pub mod server;
pub mod services;
pub mod types;
