//! Profile registry.
//!
//! Every non-admin identity owns exactly one role profile keyed by the identity id. Profiles are
//! written in the same transaction as their identity so a half-registered account is never
//! observable.
//!
//! Doctor profiles carry the approval flag read by
//! [`IdentityService::authenticate`](crate::repositories::identity::IdentityService::authenticate).
//! Patient profiles self-heal: [`ProfileService::ensure_patient_profile`] creates a missing one
//! on first use.

use crate::actor::{Actor, Role, UserId};
use crate::config::CoreConfig;
use crate::db::Database;
use crate::error::{is_unique_violation, HmsError, HmsResult};
use crate::repositories::identity::{insert_identity, prepare_password, Identity, NewIdentity};
use crate::validation;
use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;

// ============================================================================
// Types
// ============================================================================

/// Account fields shared by every registration and admin-add flow.
#[derive(Clone, Debug, Default)]
pub struct AccountDetails {
    pub username: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

impl AccountDetails {
    fn into_identity(self, role: Role) -> NewIdentity {
        NewIdentity {
            username: self.username,
            password: self.password,
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            role,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct DoctorDetails {
    pub specialty: String,
    pub phone_number: String,
}

#[derive(Clone, Debug, Default)]
pub struct LabWorkerDetails {
    pub department: String,
    pub employee_id: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct PharmacistDetails {
    pub license_number: Option<String>,
    pub years_experience: Option<i64>,
}

/// Admin edit of a doctor's account and profile.
#[derive(Clone, Debug, Default)]
pub struct DoctorUpdate {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub specialty: String,
    pub phone_number: String,
}

/// A patient's edit of their own account and profile.
#[derive(Clone, Debug, Default)]
pub struct PatientUpdate {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: String,
    pub blood_group: String,
    pub date_of_birth: Option<NaiveDate>,
    pub address: String,
}

/// A doctor profile joined with its identity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Doctor {
    pub user_id: UserId,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub specialty: String,
    pub phone_number: String,
    pub is_approved: bool,
}

/// A patient profile joined with its identity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Patient {
    pub user_id: UserId,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub date_of_birth: Option<NaiveDate>,
    pub phone_number: String,
    pub address: String,
    pub blood_group: String,
}

const DOCTOR_SELECT: &str = "SELECT u.id AS user_id, u.username, u.first_name, u.last_name, \
     u.email, d.specialty, d.phone_number, d.is_approved \
     FROM doctors d JOIN users u ON u.id = d.user_id";

const PATIENT_SELECT: &str = "SELECT u.id AS user_id, u.username, u.first_name, u.last_name, \
     u.email, p.date_of_birth, p.phone_number, p.address, p.blood_group \
     FROM patients p JOIN users u ON u.id = p.user_id";

fn trimmed(value: Option<String>) -> Option<String> {
    validation::optional_text(value.as_deref())
}

// ============================================================================
// Service
// ============================================================================

#[derive(Clone, Debug)]
pub struct ProfileService {
    db: Database,
    cfg: Arc<CoreConfig>,
}

impl ProfileService {
    pub fn new(db: Database, cfg: Arc<CoreConfig>) -> Self {
        Self { db, cfg }
    }

    /// Self-registration of a patient: identity and empty profile in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `HmsError::UsernameTaken` if the username is in use, or `Validation` for a bad
    /// username or password.
    pub async fn register_patient(&self, account: AccountDetails) -> HmsResult<Identity> {
        let new = account.into_identity(Role::Patient);
        let hash = prepare_password(&new.password, &self.cfg)?;

        let mut tx = self.db.pool().begin().await?;
        let identity = insert_identity(&mut tx, &new, &hash).await?;
        sqlx::query("INSERT INTO patients (user_id) VALUES (?)")
            .bind(identity.id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::info!(user_id = identity.id, "patient registered");
        Ok(identity)
    }

    /// Self-registration of a doctor. The profile starts unapproved.
    ///
    /// # Errors
    ///
    /// Returns `HmsError::Validation` if the specialty is blank, plus the errors of
    /// [`register_patient`](Self::register_patient).
    pub async fn register_doctor(
        &self,
        account: AccountDetails,
        details: DoctorDetails,
    ) -> HmsResult<Identity> {
        let identity = self.insert_doctor(account, details).await?;
        tracing::info!(user_id = identity.id, "doctor registered, awaiting approval");
        Ok(identity)
    }

    /// Admin creation of a doctor account. Like self-registration, it starts unapproved.
    pub async fn add_doctor(
        &self,
        actor: &Actor,
        account: AccountDetails,
        details: DoctorDetails,
    ) -> HmsResult<Identity> {
        actor.require(Role::Admin, "add doctors")?;
        let identity = self.insert_doctor(account, details).await?;
        tracing::info!(user_id = identity.id, by = actor.user_id, "doctor added by admin");
        Ok(identity)
    }

    async fn insert_doctor(
        &self,
        account: AccountDetails,
        details: DoctorDetails,
    ) -> HmsResult<Identity> {
        let specialty = validation::required_text(&details.specialty, "Specialty")?;
        let new = account.into_identity(Role::Doctor);
        let hash = prepare_password(&new.password, &self.cfg)?;

        let mut tx = self.db.pool().begin().await?;
        let identity = insert_identity(&mut tx, &new, &hash).await?;
        sqlx::query(
            "INSERT INTO doctors (user_id, specialty, phone_number, is_approved) VALUES (?, ?, ?, 0)",
        )
        .bind(identity.id)
        .bind(specialty.as_str())
        .bind(details.phone_number.trim())
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(identity)
    }

    /// Admin creation of a lab worker account.
    ///
    /// # Errors
    ///
    /// Returns `HmsError::Validation` if the employee id is already in use.
    pub async fn add_lab_worker(
        &self,
        actor: &Actor,
        account: AccountDetails,
        details: LabWorkerDetails,
    ) -> HmsResult<Identity> {
        actor.require(Role::Admin, "add lab workers")?;
        let new = account.into_identity(Role::LabWorker);
        let hash = prepare_password(&new.password, &self.cfg)?;

        let mut tx = self.db.pool().begin().await?;
        let identity = insert_identity(&mut tx, &new, &hash).await?;
        sqlx::query("INSERT INTO lab_workers (user_id, department, employee_id) VALUES (?, ?, ?)")
            .bind(identity.id)
            .bind(details.department.trim())
            .bind(trimmed(details.employee_id))
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    HmsError::Validation("Employee ID is already in use.".into())
                } else {
                    HmsError::Database(e)
                }
            })?;
        tx.commit().await?;

        tracing::info!(user_id = identity.id, by = actor.user_id, "lab worker added");
        Ok(identity)
    }

    /// Admin creation of a pharmacist account.
    ///
    /// # Errors
    ///
    /// Returns `HmsError::Validation` if the licence number is already in use or the years of
    /// experience are negative.
    pub async fn add_pharmacist(
        &self,
        actor: &Actor,
        account: AccountDetails,
        details: PharmacistDetails,
    ) -> HmsResult<Identity> {
        actor.require(Role::Admin, "add pharmacists")?;
        if details.years_experience.is_some_and(|y| y < 0) {
            return Err(HmsError::Validation(
                "Years of experience must be a whole number.".into(),
            ));
        }
        let new = account.into_identity(Role::Pharmacist);
        let hash = prepare_password(&new.password, &self.cfg)?;

        let mut tx = self.db.pool().begin().await?;
        let identity = insert_identity(&mut tx, &new, &hash).await?;
        sqlx::query(
            "INSERT INTO pharmacists (user_id, license_number, years_experience) VALUES (?, ?, ?)",
        )
        .bind(identity.id)
        .bind(trimmed(details.license_number))
        .bind(details.years_experience)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                HmsError::Validation("License number is already in use.".into())
            } else {
                HmsError::Database(e)
            }
        })?;
        tx.commit().await?;

        tracing::info!(user_id = identity.id, by = actor.user_id, "pharmacist added");
        Ok(identity)
    }

    // ------------------------------------------------------------------------
    // Doctors
    // ------------------------------------------------------------------------

    pub async fn find_doctor(&self, user_id: UserId) -> HmsResult<Doctor> {
        let sql = format!("{DOCTOR_SELECT} WHERE d.user_id = ?");
        sqlx::query_as::<_, Doctor>(&sql)
            .bind(user_id)
            .fetch_optional(self.db.pool())
            .await?
            .ok_or_else(|| HmsError::NotFound("doctor".into()))
    }

    /// Doctors patients may book with, ordered by surname.
    pub async fn approved_doctors(&self) -> HmsResult<Vec<Doctor>> {
        self.doctors_where(Some(true)).await
    }

    pub async fn pending_doctors(&self, actor: &Actor) -> HmsResult<Vec<Doctor>> {
        actor.require(Role::Admin, "view pending doctors")?;
        self.doctors_where(Some(false)).await
    }

    pub async fn list_doctors(&self, actor: &Actor) -> HmsResult<Vec<Doctor>> {
        actor.require(Role::Admin, "view doctors")?;
        self.doctors_where(None).await
    }

    async fn doctors_where(&self, approved: Option<bool>) -> HmsResult<Vec<Doctor>> {
        let sql = match approved {
            Some(_) => format!(
                "{DOCTOR_SELECT} WHERE d.is_approved = ? ORDER BY u.last_name, u.first_name, u.username"
            ),
            None => format!("{DOCTOR_SELECT} ORDER BY u.last_name, u.first_name, u.username"),
        };
        let mut query = sqlx::query_as::<_, Doctor>(&sql);
        if let Some(flag) = approved {
            query = query.bind(flag);
        }
        Ok(query.fetch_all(self.db.pool()).await?)
    }

    /// Opens the approval gate for a doctor.
    ///
    /// # Errors
    ///
    /// Returns `HmsError::NotFound` if `doctor_id` has no doctor profile.
    pub async fn approve_doctor(&self, actor: &Actor, doctor_id: UserId) -> HmsResult<Doctor> {
        actor.require(Role::Admin, "approve doctors")?;
        let result = sqlx::query("UPDATE doctors SET is_approved = 1 WHERE user_id = ?")
            .bind(doctor_id)
            .execute(self.db.pool())
            .await?;
        if result.rows_affected() == 0 {
            return Err(HmsError::NotFound("doctor".into()));
        }
        tracing::info!(doctor_id, by = actor.user_id, "doctor approved");
        self.find_doctor(doctor_id).await
    }

    /// Rejects a doctor by deleting the identity; the profile goes with it.
    ///
    /// Irreversible. Returns the removed profile.
    pub async fn reject_doctor(&self, actor: &Actor, doctor_id: UserId) -> HmsResult<Doctor> {
        actor.require(Role::Admin, "reject doctors")?;
        let doctor = self.find_doctor(doctor_id).await?;
        sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(doctor_id)
            .execute(self.db.pool())
            .await?;
        tracing::info!(doctor_id, by = actor.user_id, "doctor rejected and removed");
        Ok(doctor)
    }

    pub async fn update_doctor(
        &self,
        actor: &Actor,
        doctor_id: UserId,
        update: DoctorUpdate,
    ) -> HmsResult<Doctor> {
        actor.require(Role::Admin, "edit doctors")?;
        let specialty = validation::required_text(&update.specialty, "Specialty")?;

        let mut tx = self.db.pool().begin().await?;
        let result = sqlx::query("UPDATE doctors SET specialty = ?, phone_number = ? WHERE user_id = ?")
            .bind(specialty.as_str())
            .bind(update.phone_number.trim())
            .bind(doctor_id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(HmsError::NotFound("doctor".into()));
        }
        sqlx::query("UPDATE users SET first_name = ?, last_name = ?, email = ? WHERE id = ?")
            .bind(update.first_name.trim())
            .bind(update.last_name.trim())
            .bind(update.email.trim())
            .bind(doctor_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::info!(doctor_id, by = actor.user_id, "doctor updated");
        self.find_doctor(doctor_id).await
    }

    /// Deletes a doctor identity, cascading to its profile, appointments and prescriptions.
    ///
    /// # Errors
    ///
    /// Returns `HmsError::NotFound` unless `doctor_id` is an identity with the Doctor role.
    pub async fn delete_doctor(&self, actor: &Actor, doctor_id: UserId) -> HmsResult<()> {
        actor.require(Role::Admin, "delete doctors")?;
        let result = sqlx::query("DELETE FROM users WHERE id = ? AND role = ?")
            .bind(doctor_id)
            .bind(Role::Doctor)
            .execute(self.db.pool())
            .await?;
        if result.rows_affected() == 0 {
            return Err(HmsError::NotFound("doctor".into()));
        }
        tracing::info!(doctor_id, by = actor.user_id, "doctor deleted");
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Patients
    // ------------------------------------------------------------------------

    /// Returns the actor's patient profile, creating an empty one if it is missing.
    pub async fn ensure_patient_profile(&self, actor: &Actor) -> HmsResult<Patient> {
        actor.require(Role::Patient, "view a patient profile")?;
        let created = sqlx::query("INSERT INTO patients (user_id) VALUES (?) ON CONFLICT DO NOTHING")
            .bind(actor.user_id)
            .execute(self.db.pool())
            .await?;
        if created.rows_affected() > 0 {
            tracing::warn!(user_id = actor.user_id, "created missing patient profile");
        }
        self.find_patient(actor.user_id).await
    }

    pub async fn find_patient(&self, user_id: UserId) -> HmsResult<Patient> {
        let sql = format!("{PATIENT_SELECT} WHERE p.user_id = ?");
        sqlx::query_as::<_, Patient>(&sql)
            .bind(user_id)
            .fetch_optional(self.db.pool())
            .await?
            .ok_or_else(|| HmsError::NotFound("patient".into()))
    }

    /// Updates the actor's own account and patient profile.
    pub async fn update_patient_profile(
        &self,
        actor: &Actor,
        update: PatientUpdate,
    ) -> HmsResult<Patient> {
        self.ensure_patient_profile(actor).await?;

        let mut tx = self.db.pool().begin().await?;
        sqlx::query("UPDATE users SET first_name = ?, last_name = ?, email = ? WHERE id = ?")
            .bind(update.first_name.trim())
            .bind(update.last_name.trim())
            .bind(update.email.trim())
            .bind(actor.user_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "UPDATE patients SET phone_number = ?, blood_group = ?, date_of_birth = ?, address = ? \
             WHERE user_id = ?",
        )
        .bind(update.phone_number.trim())
        .bind(update.blood_group.trim())
        .bind(update.date_of_birth)
        .bind(update.address.trim())
        .bind(actor.user_id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        self.find_patient(actor.user_id).await
    }

    pub async fn list_patients(&self, actor: &Actor) -> HmsResult<Vec<Patient>> {
        actor.require(Role::Admin, "view patients")?;
        let sql = format!("{PATIENT_SELECT} ORDER BY u.last_name, u.first_name");
        Ok(sqlx::query_as::<_, Patient>(&sql)
            .fetch_all(self.db.pool())
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::identity::IdentityService;
    use crate::repositories::test_support::{account, Fixture};

    #[tokio::test]
    async fn doctor_registration_waits_for_approval() {
        let fx = Fixture::new().await;
        let profiles = fx.profiles();
        let identities = fx.identities();
        let admin = fx.admin().await;

        let doc = profiles
            .register_doctor(
                account("drwho"),
                DoctorDetails {
                    specialty: "Cardiology".into(),
                    phone_number: "555".into(),
                },
            )
            .await
            .expect("registration should succeed");

        assert!(matches!(
            identities.authenticate("drwho", "password123").await,
            Err(HmsError::PendingApproval)
        ));
        let pending = profiles.pending_doctors(&admin).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert!(profiles.approved_doctors().await.unwrap().is_empty());

        let approved = profiles.approve_doctor(&admin, doc.id).await.unwrap();
        assert!(approved.is_approved);
        assert_eq!(
            identities.authenticate("drwho", "password123").await.unwrap().id,
            doc.id
        );
        assert_eq!(profiles.approved_doctors().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn blank_specialty_leaves_no_identity_behind() {
        let fx = Fixture::new().await;
        let err = fx
            .profiles()
            .register_doctor(account("drblank"), DoctorDetails::default())
            .await
            .expect_err("blank specialty should fail");
        assert!(matches!(err, HmsError::Validation(_)));
        assert!(matches!(
            fx.identities().authenticate("drblank", "password123").await,
            Err(HmsError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn reject_doctor_removes_identity() {
        let fx = Fixture::new().await;
        let admin = fx.admin().await;
        let profiles = fx.profiles();
        let doc = profiles
            .register_doctor(
                account("drno"),
                DoctorDetails {
                    specialty: "ENT".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        profiles.reject_doctor(&admin, doc.id).await.unwrap();
        assert!(matches!(
            fx.identities().find(doc.id).await,
            Err(HmsError::NotFound(_))
        ));
        assert!(matches!(
            profiles.reject_doctor(&admin, doc.id).await,
            Err(HmsError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn only_admins_manage_doctors() {
        let fx = Fixture::new().await;
        let (doctor, _) = fx.approved_doctor("drhouse").await;
        let patient = fx.patient("pat").await;
        let profiles = fx.profiles();

        assert!(matches!(
            profiles.approve_doctor(&patient, doctor.user_id).await,
            Err(HmsError::NotAuthorized(_))
        ));
        assert!(matches!(
            profiles.delete_doctor(&doctor, doctor.user_id).await,
            Err(HmsError::NotAuthorized(_))
        ));
    }

    #[tokio::test]
    async fn delete_doctor_requires_doctor_identity() {
        let fx = Fixture::new().await;
        let admin = fx.admin().await;
        let patient = fx.patient("pat").await;
        let (doctor, _) = fx.approved_doctor("drhouse").await;
        let profiles = fx.profiles();

        assert!(matches!(
            profiles.delete_doctor(&admin, patient.user_id).await,
            Err(HmsError::NotFound(_))
        ));
        profiles.delete_doctor(&admin, doctor.user_id).await.unwrap();
        assert!(profiles.list_doctors(&admin).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_doctor_changes_identity_and_profile() {
        let fx = Fixture::new().await;
        let admin = fx.admin().await;
        let (doctor, _) = fx.approved_doctor("drhouse").await;

        let updated = fx
            .profiles()
            .update_doctor(
                &admin,
                doctor.user_id,
                DoctorUpdate {
                    first_name: "Gregory".into(),
                    last_name: "House".into(),
                    email: "house@example.com".into(),
                    specialty: "Diagnostics".into(),
                    phone_number: "0101".into(),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.last_name, "House");
        assert_eq!(updated.specialty, "Diagnostics");
        assert!(updated.is_approved);
    }

    #[tokio::test]
    async fn staff_identifiers_are_unique() {
        let fx = Fixture::new().await;
        let admin = fx.admin().await;
        let profiles = fx.profiles();
        let details = LabWorkerDetails {
            department: "Haematology".into(),
            employee_id: Some("E-1".into()),
        };

        profiles
            .add_lab_worker(&admin, account("lab1"), details.clone())
            .await
            .unwrap();
        let err = profiles
            .add_lab_worker(&admin, account("lab2"), details)
            .await
            .expect_err("duplicate employee id should fail");
        assert!(matches!(err, HmsError::Validation(msg) if msg.contains("Employee ID")));
        // the rolled-back identity must not exist
        assert!(matches!(
            fx.identities().authenticate("lab2", "password123").await,
            Err(HmsError::InvalidCredentials)
        ));

        let pharmacist = profiles
            .add_pharmacist(
                &admin,
                account("pharm"),
                PharmacistDetails {
                    license_number: Some(" ".into()),
                    years_experience: Some(4),
                },
            )
            .await
            .unwrap();
        assert_eq!(pharmacist.role, Role::Pharmacist);
    }

    #[tokio::test]
    async fn patient_profile_self_heals_and_updates() {
        let fx = Fixture::new().await;
        let identities = IdentityService::new(fx.db.clone(), fx.cfg.clone());
        let orphan = identities
            .create(account("orphan").into_identity(Role::Patient))
            .await
            .unwrap();
        let actor = orphan.actor();
        let profiles = fx.profiles();

        let profile = profiles.ensure_patient_profile(&actor).await.unwrap();
        assert_eq!(profile.address, "");
        assert_eq!(profile.date_of_birth, None);

        let updated = profiles
            .update_patient_profile(
                &actor,
                PatientUpdate {
                    first_name: "Sherlock".into(),
                    last_name: "Holmes".into(),
                    address: " 221B Baker St ".into(),
                    date_of_birth: NaiveDate::from_ymd_opt(1854, 1, 6),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.address, "221B Baker St");
        assert_eq!(updated.date_of_birth, NaiveDate::from_ymd_opt(1854, 1, 6));

        let admin = fx.admin().await;
        let listed = profiles.list_patients(&admin).await.unwrap();
        assert_eq!(listed, vec![updated]);
    }
}
