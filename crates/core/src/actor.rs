//! Roles and the explicit caller context passed into core operations.

use crate::{HmsError, HmsResult};
use serde::{Deserialize, Serialize};

/// Identifier of a user identity. Role profiles share their identity's id.
pub type UserId = i64;

/// The single role tag carried by every identity.
///
/// Stored and serialised in upper case (`ADMIN`, `DOCTOR`, ...).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(rename_all = "UPPERCASE")]
pub enum Role {
    Admin,
    Doctor,
    Patient,
    Pharmacist,
    LabWorker,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::Admin,
        Role::Doctor,
        Role::Patient,
        Role::Pharmacist,
        Role::LabWorker,
    ];

    /// Path segment used for this role's dashboard, e.g. `labworker`.
    pub fn slug(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Doctor => "doctor",
            Role::Patient => "patient",
            Role::Pharmacist => "pharmacist",
            Role::LabWorker => "labworker",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::Doctor => "Doctor",
            Role::Patient => "Patient",
            Role::Pharmacist => "Pharmacist",
            Role::LabWorker => "Lab Worker",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// The authenticated caller of a core operation.
///
/// Core services never look up "the current user" on their own; the request layer resolves the
/// session and hands the resulting `Actor` to every call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Actor {
    pub user_id: UserId,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: UserId, role: Role) -> Self {
        Self { user_id, role }
    }

    /// Fails with `NotAuthorized` unless the actor holds `role`.
    ///
    /// `action` completes the sentence "You are not authorised to ...".
    pub fn require(&self, role: Role, action: &str) -> HmsResult<()> {
        if self.role == role {
            Ok(())
        } else {
            Err(HmsError::NotAuthorized(action.to_string()))
        }
    }

    pub fn is(&self, role: Role) -> bool {
        self.role == role
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_matches_on_role_tag() {
        let doctor = Actor::new(7, Role::Doctor);
        assert!(doctor.require(Role::Doctor, "do this").is_ok());
        let err = doctor
            .require(Role::Admin, "manage staff")
            .expect_err("doctor is not an admin");
        assert!(matches!(err, HmsError::NotAuthorized(msg) if msg == "manage staff"));
    }

    #[test]
    fn slugs_are_unique() {
        let mut slugs: Vec<_> = Role::ALL.iter().map(|r| r.slug()).collect();
        slugs.sort();
        slugs.dedup();
        assert_eq!(slugs.len(), Role::ALL.len());
    }
}
