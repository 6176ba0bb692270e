//! Storage-backed services.
//!
//! Each service wraps the shared [`Database`](crate::db::Database) handle and takes the calling
//! [`Actor`](crate::actor::Actor) explicitly on every operation that needs one.

pub mod appointments;
pub mod billing;
pub mod catalog;
pub mod commerce;
pub mod identity;
pub mod messaging;
pub mod prescriptions;
pub mod profiles;
pub mod sessions;
