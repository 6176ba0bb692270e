//! Prescription ledger.
//!
//! Append-only: prescriptions are written by the doctor who owns the originating appointment
//! and are never edited or removed through the service.

use crate::actor::{Actor, Role, UserId};
use crate::db::Database;
use crate::error::{HmsError, HmsResult};
use crate::repositories::appointments::{AppointmentId, AppointmentService};
use crate::validation;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Prescription {
    pub id: i64,
    pub patient_id: UserId,
    pub patient_username: String,
    pub doctor_id: UserId,
    pub doctor_username: String,
    pub appointment_id: Option<AppointmentId>,
    pub prescription_text: String,
    pub date_prescribed: DateTime<Utc>,
}

const PRESCRIPTION_SELECT: &str = "SELECT p.id, p.patient_id, pu.username AS patient_username, \
     p.doctor_id, du.username AS doctor_username, p.appointment_id, p.prescription_text, \
     p.date_prescribed \
     FROM prescriptions p \
     JOIN users pu ON pu.id = p.patient_id \
     JOIN users du ON du.id = p.doctor_id";

#[derive(Clone, Debug)]
pub struct PrescriptionService {
    db: Database,
    appointments: AppointmentService,
}

impl PrescriptionService {
    pub fn new(db: Database) -> Self {
        let appointments = AppointmentService::new(db.clone());
        Self { db, appointments }
    }

    /// Writes a prescription against an appointment the actor owns.
    ///
    /// Patient and doctor are copied from the appointment. The appointment's status is not
    /// checked.
    ///
    /// # Errors
    ///
    /// Returns `HmsError` if:
    /// - the appointment does not exist (`NotFound`),
    /// - the actor is not the appointment's doctor (`NotAuthorized`),
    /// - `text` is blank (`Validation`); nothing is written.
    pub async fn create(
        &self,
        actor: &Actor,
        appointment_id: AppointmentId,
        text: &str,
    ) -> HmsResult<Prescription> {
        let appointment = self
            .appointments
            .find_for_doctor(actor, appointment_id, "prescribe for this appointment")
            .await?;
        let text = validation::required_text(text, "Prescription text")?;

        let id: i64 = sqlx::query_scalar(
            "INSERT INTO prescriptions \
             (patient_id, doctor_id, appointment_id, prescription_text, date_prescribed) \
             VALUES (?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(appointment.patient_id)
        .bind(appointment.doctor_id)
        .bind(appointment.id)
        .bind(text.as_str())
        .bind(Utc::now())
        .fetch_one(self.db.pool())
        .await?;

        tracing::info!(
            prescription_id = id,
            appointment_id,
            doctor_id = actor.user_id,
            "prescription created"
        );
        self.find(id).await
    }

    async fn find(&self, id: i64) -> HmsResult<Prescription> {
        let sql = format!("{PRESCRIPTION_SELECT} WHERE p.id = ?");
        sqlx::query_as::<_, Prescription>(&sql)
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?
            .ok_or_else(|| HmsError::NotFound("prescription".into()))
    }

    /// The patient's prescriptions, newest first.
    pub async fn list_for_patient(&self, actor: &Actor) -> HmsResult<Vec<Prescription>> {
        actor.require(Role::Patient, "view patient prescriptions")?;
        self.list_where("p.patient_id", actor.user_id).await
    }

    /// Prescriptions written by the doctor, newest first.
    pub async fn list_for_doctor(&self, actor: &Actor) -> HmsResult<Vec<Prescription>> {
        actor.require(Role::Doctor, "view doctor prescriptions")?;
        self.list_where("p.doctor_id", actor.user_id).await
    }

    async fn list_where(&self, column: &'static str, owner: UserId) -> HmsResult<Vec<Prescription>> {
        let sql = format!("{PRESCRIPTION_SELECT} WHERE {column} = ? ORDER BY p.id DESC");
        Ok(sqlx::query_as::<_, Prescription>(&sql)
            .bind(owner)
            .fetch_all(self.db.pool())
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::appointments::BookingRequest;
    use crate::repositories::test_support::Fixture;
    use chrono::{NaiveDate, NaiveTime};

    async fn booked(fx: &Fixture) -> (Actor, Actor, AppointmentId) {
        let (doctor, _) = fx.approved_doctor("drd").await;
        let patient = fx.patient("p1").await;
        let appointment = AppointmentService::new(fx.db.clone())
            .book(
                &patient,
                BookingRequest {
                    doctor_id: doctor.user_id,
                    date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
                    time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
                    reason: "cough".into(),
                },
            )
            .await
            .unwrap();
        (doctor, patient, appointment.id)
    }

    #[tokio::test]
    async fn owning_doctor_prescribes() {
        let fx = Fixture::new().await;
        let (doctor, patient, appointment_id) = booked(&fx).await;
        let svc = PrescriptionService::new(fx.db.clone());

        let first = svc
            .create(&doctor, appointment_id, "Rest and fluids")
            .await
            .expect("create should succeed");
        assert_eq!(first.patient_id, patient.user_id);
        assert_eq!(first.appointment_id, Some(appointment_id));
        let second = svc
            .create(&doctor, appointment_id, "Paracetamol 500mg")
            .await
            .unwrap();

        let mine = svc.list_for_patient(&patient).await.unwrap();
        assert_eq!(
            mine.iter().map(|p| p.id).collect::<Vec<_>>(),
            vec![second.id, first.id]
        );
        assert_eq!(svc.list_for_doctor(&doctor).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn blank_text_persists_nothing() {
        let fx = Fixture::new().await;
        let (doctor, patient, appointment_id) = booked(&fx).await;
        let svc = PrescriptionService::new(fx.db.clone());

        assert!(matches!(
            svc.create(&doctor, appointment_id, "   ").await,
            Err(HmsError::Validation(_))
        ));
        assert!(svc.list_for_patient(&patient).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn other_doctor_cannot_prescribe() {
        let fx = Fixture::new().await;
        let (_, patient, appointment_id) = booked(&fx).await;
        let (intruder, _) = fx.approved_doctor("drx").await;
        let svc = PrescriptionService::new(fx.db.clone());

        assert!(matches!(
            svc.create(&intruder, appointment_id, "Something").await,
            Err(HmsError::NotAuthorized(_))
        ));
        assert!(matches!(
            svc.create(&intruder, 999, "Something").await,
            Err(HmsError::NotFound(_))
        ));
        assert!(svc.list_for_patient(&patient).await.unwrap().is_empty());
    }
}
