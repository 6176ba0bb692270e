//! Constants used throughout the HMS core crate.
//!
//! Defaults for configuration and the few fixed limits the dashboards rely on live here so
//! they stay consistent between the server, the CLI and the tests.

/// Default database URL when `DATABASE_URL` is not set.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://hms.db?mode=rwc";

/// Default maximum number of pooled database connections.
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;

/// Default REST listen address when `HMS_REST_ADDR` is not set.
pub const DEFAULT_REST_ADDR: &str = "0.0.0.0:3000";

/// Number of upcoming appointments shown on the patient dashboard.
pub const DASHBOARD_UPCOMING_LIMIT: i64 = 3;

/// Number of recent orders shown on the patient dashboard.
pub const DASHBOARD_RECENT_ORDERS_LIMIT: i64 = 3;

/// Minimum length for a new password.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Accepted calendar date format for form input.
pub const DATE_FORMAT: &str = "%Y-%m-%d";
