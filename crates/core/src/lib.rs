//! # HMS Core
//!
//! Core business logic for the hospital management portal.
//!
//! This crate owns every rule and every row:
//! - Identities, role profiles and the doctor approval gate
//! - The appointment scheduler and its slot constraint
//! - The prescription ledger, catalogs, billing, the shop and messaging
//! - Storage in SQLite via `sqlx`, with embedded migrations
//!
//! **No API concerns**: session cookies, HTTP routing and redirects belong in `api-rest` and
//! `api-shared`. Operations take the calling [`Actor`] explicitly instead of reading any
//! request-global state.

pub mod actor;
pub mod config;
pub mod constants;
pub mod db;
pub mod error;
pub mod money;
pub(crate) mod password;
pub mod repositories;
pub mod validation;

pub use actor::{Actor, Role, UserId};
pub use config::{core_config_from_env, CoreConfig, PasswordCost};
pub use db::Database;
pub use error::{HmsError, HmsResult};
pub use money::Money;
