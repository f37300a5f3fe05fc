//! # Services
//!
//! Domain logic used by the route handlers: face matching, QR tokens and
//! attendance statistics.

pub mod face;
pub mod qr;
pub mod stats;

pub use face::{FaceError, FaceService, MatchOutcome};
pub use qr::{QrError, QrService};
