//! # API Shared
//!
//! Shared utilities and definitions for HMS APIs.
//!
//! Contains:
//! - Shared services like `HealthService`
//! - Session cookie handling (token extraction and `Set-Cookie` values)
//! - Redirect notices carried on the query string
//!
//! Nothing here depends on a particular HTTP framework; `api-rest` wires these into axum.

pub mod auth;
pub mod health;
pub mod notice;

pub use health::{HealthRes, HealthService};
pub use notice::{Notice, NoticeLevel, NoticeParams};
