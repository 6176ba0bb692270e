//! Identity and role store.
//!
//! Every account is one row in `users` carrying a single [`Role`] tag. Authorisation elsewhere
//! in the crate is a match on that tag plus, for doctors, the approval flag held by the profile
//! registry.
//!
//! ## Approval gate
//!
//! [`IdentityService::authenticate`] refuses doctors whose profile is not yet approved, even
//! when the password is correct. Because every other operation needs a session, and sessions are
//! only created after `authenticate` succeeds, unapproved doctors cannot reach the scheduler.

use crate::actor::{Actor, Role, UserId};
use crate::config::CoreConfig;
use crate::constants::MIN_PASSWORD_LEN;
use crate::db::Database;
use crate::error::{is_unique_violation, HmsError, HmsResult};
use crate::password::{hash_password, verify_password};
use crate::validation;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqliteConnection;
use std::sync::Arc;

/// A stored account, without its credential.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Identity {
    pub id: UserId,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl Identity {
    pub fn actor(&self) -> Actor {
        Actor::new(self.id, self.role)
    }

    /// "First Last", falling back to the username when no name is on file.
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name, self.last_name);
        let full = full.trim();
        if full.is_empty() {
            self.username.clone()
        } else {
            full.to_string()
        }
    }
}

/// Input for creating an identity.
#[derive(Clone, Debug)]
pub struct NewIdentity {
    pub username: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: Role,
}

#[derive(sqlx::FromRow)]
struct CredentialRow {
    #[sqlx(flatten)]
    identity: Identity,
    password_hash: String,
}

pub(crate) const IDENTITY_COLUMNS: &str =
    "id, username, first_name, last_name, email, role, created_at";

/// Inserts an identity on an existing connection or transaction.
///
/// The password must already be hashed; hashing is deliberately kept outside any open
/// transaction.
///
/// # Errors
///
/// Returns `HmsError::UsernameTaken` if the username is already in use.
pub(crate) async fn insert_identity(
    conn: &mut SqliteConnection,
    new: &NewIdentity,
    password_hash: &str,
) -> HmsResult<Identity> {
    let username = validation::username(&new.username)?;

    let sql = format!(
        "INSERT INTO users (username, password_hash, first_name, last_name, email, role, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?) RETURNING {IDENTITY_COLUMNS}"
    );
    sqlx::query_as::<_, Identity>(&sql)
        .bind(username.as_str())
        .bind(password_hash)
        .bind(new.first_name.trim())
        .bind(new.last_name.trim())
        .bind(new.email.trim())
        .bind(new.role)
        .bind(Utc::now())
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                HmsError::UsernameTaken(username.to_string())
            } else {
                HmsError::Database(e)
            }
        })
}

/// Validates and hashes a new password.
pub(crate) fn prepare_password(password: &str, cfg: &CoreConfig) -> HmsResult<String> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(HmsError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters."
        )));
    }
    hash_password(password, cfg.password_cost())
}

/// Service for account lookup, creation and authentication.
#[derive(Clone, Debug)]
pub struct IdentityService {
    db: Database,
    cfg: Arc<CoreConfig>,
}

impl IdentityService {
    pub fn new(db: Database, cfg: Arc<CoreConfig>) -> Self {
        Self { db, cfg }
    }

    /// Creates a bare identity with no role profile.
    ///
    /// Used for admin accounts; the other roles are created through
    /// [`ProfileService`](crate::repositories::profiles::ProfileService) so that identity and
    /// profile are written together.
    ///
    /// # Errors
    ///
    /// Returns `HmsError` if:
    /// - the username or password is invalid (`Validation`),
    /// - the username is taken (`UsernameTaken`),
    /// - hashing or storage fails.
    pub async fn create(&self, new: NewIdentity) -> HmsResult<Identity> {
        let hash = prepare_password(&new.password, &self.cfg)?;
        let mut conn = self.db.pool().acquire().await?;
        let identity = insert_identity(&mut conn, &new, &hash).await?;
        tracing::info!(user_id = identity.id, role = ?identity.role, "identity created");
        Ok(identity)
    }

    /// Fetches an identity by id.
    pub async fn find(&self, id: UserId) -> HmsResult<Identity> {
        let sql = format!("SELECT {IDENTITY_COLUMNS} FROM users WHERE id = ?");
        sqlx::query_as::<_, Identity>(&sql)
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?
            .ok_or_else(|| HmsError::NotFound("user".into()))
    }

    /// Lists identities holding `role`, ordered by username.
    pub async fn list_by_role(&self, role: Role) -> HmsResult<Vec<Identity>> {
        let sql =
            format!("SELECT {IDENTITY_COLUMNS} FROM users WHERE role = ? ORDER BY username");
        Ok(sqlx::query_as::<_, Identity>(&sql)
            .bind(role)
            .fetch_all(self.db.pool())
            .await?)
    }

    /// Verifies credentials and applies the doctor approval gate.
    ///
    /// # Returns
    ///
    /// The authenticated identity. The caller is responsible for opening a session.
    ///
    /// # Errors
    ///
    /// Returns `HmsError` if:
    /// - the username does not exist or the password is wrong (`InvalidCredentials`),
    /// - the identity is a doctor without a doctor profile (`ProfileMissing`),
    /// - the identity is a doctor whose profile is not approved (`PendingApproval`).
    pub async fn authenticate(&self, username: &str, password: &str) -> HmsResult<Identity> {
        let sql = format!(
            "SELECT {IDENTITY_COLUMNS}, password_hash FROM users WHERE username = ?"
        );
        let row = sqlx::query_as::<_, CredentialRow>(&sql)
            .bind(username.trim())
            .fetch_optional(self.db.pool())
            .await?
            .ok_or(HmsError::InvalidCredentials)?;

        if !verify_password(password, &row.password_hash)? {
            tracing::info!(username = %row.identity.username, "rejected login: bad password");
            return Err(HmsError::InvalidCredentials);
        }

        let identity = row.identity;
        if identity.role == Role::Doctor {
            let approved: Option<bool> =
                sqlx::query_scalar("SELECT is_approved FROM doctors WHERE user_id = ?")
                    .bind(identity.id)
                    .fetch_optional(self.db.pool())
                    .await?;
            match approved {
                None => {
                    tracing::warn!(user_id = identity.id, "doctor login without a profile");
                    return Err(HmsError::ProfileMissing);
                }
                Some(false) => {
                    tracing::info!(user_id = identity.id, "doctor login pending approval");
                    return Err(HmsError::PendingApproval);
                }
                Some(true) => {}
            }
        }

        Ok(identity)
    }

    /// Changes the actor's own password.
    ///
    /// # Errors
    ///
    /// Returns `HmsError` if:
    /// - `old_password` does not match (`InvalidCredentials`),
    /// - the new password is too short or differs from `confirm` (`Validation`).
    pub async fn change_password(
        &self,
        actor: &Actor,
        old_password: &str,
        new_password: &str,
        confirm: &str,
    ) -> HmsResult<()> {
        let stored: String = sqlx::query_scalar("SELECT password_hash FROM users WHERE id = ?")
            .bind(actor.user_id)
            .fetch_optional(self.db.pool())
            .await?
            .ok_or_else(|| HmsError::NotFound("user".into()))?;

        if !verify_password(old_password, &stored)? {
            return Err(HmsError::InvalidCredentials);
        }
        if new_password != confirm {
            return Err(HmsError::Validation(
                "The two password fields didn't match.".into(),
            ));
        }
        let hash = prepare_password(new_password, &self.cfg)?;

        sqlx::query("UPDATE users SET password_hash = ? WHERE id = ?")
            .bind(hash)
            .bind(actor.user_id)
            .execute(self.db.pool())
            .await?;
        tracing::info!(user_id = actor.user_id, "password changed");
        Ok(())
    }
}
