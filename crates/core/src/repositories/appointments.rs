//! Appointment scheduler.
//!
//! Owns booking, slot conflicts and the appointment status machine.
//!
//! ## Slots
//!
//! A slot is the `(doctor, date, time)` tuple. The schema holds a `UNIQUE` constraint on it
//! covering every status, so a cancelled appointment keeps its slot. [`AppointmentService::book`]
//! does not check before inserting: it inserts and translates the constraint violation into
//! [`HmsError::SlotTaken`], which keeps concurrent bookings of one slot correct without an
//! application lock.
//!
//! ## Status machine
//!
//! New appointments are `Pending`. Only the owning doctor moves them, to `Approved` via
//! [`approve`](AppointmentService::approve) or to `Cancelled` via
//! [`reject`](AppointmentService::reject). No state is terminal; approving a cancelled
//! appointment reopens it.

use crate::actor::{Actor, Role, UserId};
use crate::db::Database;
use crate::error::{is_unique_violation, HmsError, HmsResult};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub type AppointmentId = i64;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
pub enum AppointmentStatus {
    Pending,
    Approved,
    Cancelled,
}

impl AppointmentStatus {
    pub const ALL: [AppointmentStatus; 3] = [
        AppointmentStatus::Pending,
        AppointmentStatus::Approved,
        AppointmentStatus::Cancelled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "Pending",
            AppointmentStatus::Approved => "Approved",
            AppointmentStatus::Cancelled => "Cancelled",
        }
    }
}

impl std::fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppointmentStatus {
    type Err = HmsError;

    /// Case-insensitive, so `?status=pending` works as a filter.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| HmsError::Validation(format!("Unknown appointment status '{s}'.")))
    }
}

/// An appointment with both parties' usernames.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Appointment {
    pub id: AppointmentId,
    pub patient_id: UserId,
    pub patient_username: String,
    pub doctor_id: UserId,
    pub doctor_username: String,
    pub appointment_date: NaiveDate,
    pub appointment_time: NaiveTime,
    pub reason: String,
    pub status: AppointmentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A patient's booking request.
#[derive(Clone, Debug)]
pub struct BookingRequest {
    pub doctor_id: UserId,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub reason: String,
}

const APPOINTMENT_SELECT: &str = "SELECT a.id, a.patient_id, pu.username AS patient_username, \
     a.doctor_id, du.username AS doctor_username, a.appointment_date, a.appointment_time, \
     a.reason, a.status, a.created_at, a.updated_at \
     FROM appointments a \
     JOIN users pu ON pu.id = a.patient_id \
     JOIN users du ON du.id = a.doctor_id";

const SLOT_ORDER: &str = "ORDER BY a.appointment_date, a.appointment_time, a.id";

#[derive(Clone, Debug)]
pub struct AppointmentService {
    db: Database,
}

impl AppointmentService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Books a slot for the calling patient.
    ///
    /// # Arguments
    ///
    /// * `actor` - Must be a patient; the booking is always made for the actor's own profile.
    /// * `request` - Doctor, date, time and free-text reason.
    ///
    /// # Returns
    ///
    /// The new appointment, in `Pending` state.
    ///
    /// # Errors
    ///
    /// Returns `HmsError` if:
    /// - the actor is not a patient (`NotAuthorized`),
    /// - the doctor does not exist or is not approved (`NotFound`),
    /// - the slot already holds an appointment in any status (`SlotTaken`).
    pub async fn book(&self, actor: &Actor, request: BookingRequest) -> HmsResult<Appointment> {
        actor.require(Role::Patient, "book appointments")?;

        let approved: Option<bool> =
            sqlx::query_scalar("SELECT is_approved FROM doctors WHERE user_id = ?")
                .bind(request.doctor_id)
                .fetch_optional(self.db.pool())
                .await?;
        if approved != Some(true) {
            return Err(HmsError::NotFound("doctor".into()));
        }

        // patient profiles self-heal; the appointment row references one
        sqlx::query("INSERT INTO patients (user_id) VALUES (?) ON CONFLICT DO NOTHING")
            .bind(actor.user_id)
            .execute(self.db.pool())
            .await?;

        let now = Utc::now();
        let id: AppointmentId = sqlx::query_scalar(
            "INSERT INTO appointments \
             (patient_id, doctor_id, appointment_date, appointment_time, reason, status, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(actor.user_id)
        .bind(request.doctor_id)
        .bind(request.date)
        .bind(request.time)
        .bind(request.reason.trim())
        .bind(AppointmentStatus::Pending)
        .bind(now)
        .bind(now)
        .fetch_one(self.db.pool())
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                tracing::info!(
                    doctor_id = request.doctor_id,
                    date = %request.date,
                    time = %request.time,
                    "booking rejected: slot taken"
                );
                HmsError::SlotTaken
            } else {
                HmsError::Database(e)
            }
        })?;

        tracing::info!(
            appointment_id = id,
            patient_id = actor.user_id,
            doctor_id = request.doctor_id,
            "appointment booked"
        );
        self.find(id).await
    }

    /// Marks an appointment `Approved`. Only the owning doctor may do this.
    ///
    /// Re-approving is a no-op in effect. Approving a `Cancelled` appointment reopens it.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown id, `NotAuthorized` if the actor is not the appointment's
    /// doctor. In both cases nothing changes.
    pub async fn approve(&self, actor: &Actor, id: AppointmentId) -> HmsResult<Appointment> {
        let previous = self
            .transition(actor, id, AppointmentStatus::Approved, "approve this appointment")
            .await?;
        if previous == AppointmentStatus::Cancelled {
            tracing::warn!(appointment_id = id, "cancelled appointment re-approved");
        }
        self.find(id).await
    }

    /// Marks an appointment `Cancelled`. Only the owning doctor may do this.
    ///
    /// The row is kept, and so is its slot.
    pub async fn reject(&self, actor: &Actor, id: AppointmentId) -> HmsResult<Appointment> {
        self.transition(actor, id, AppointmentStatus::Cancelled, "reject this appointment")
            .await?;
        self.find(id).await
    }

    /// Applies a status change after the ownership check; returns the previous status.
    async fn transition(
        &self,
        actor: &Actor,
        id: AppointmentId,
        to: AppointmentStatus,
        action: &str,
    ) -> HmsResult<AppointmentStatus> {
        let row: Option<(UserId, AppointmentStatus)> =
            sqlx::query_as("SELECT doctor_id, status FROM appointments WHERE id = ?")
                .bind(id)
                .fetch_optional(self.db.pool())
                .await?;
        let (doctor_id, from) = row.ok_or_else(|| HmsError::NotFound("appointment".into()))?;

        if !actor.is(Role::Doctor) || actor.user_id != doctor_id {
            tracing::warn!(
                appointment_id = id,
                actor = actor.user_id,
                "refused status change by non-owner"
            );
            return Err(HmsError::NotAuthorized(action.to_string()));
        }

        sqlx::query("UPDATE appointments SET status = ?, updated_at = ? WHERE id = ?")
            .bind(to)
            .bind(Utc::now())
            .bind(id)
            .execute(self.db.pool())
            .await?;
        tracing::info!(appointment_id = id, %from, %to, "appointment status changed");
        Ok(from)
    }

    pub async fn find(&self, id: AppointmentId) -> HmsResult<Appointment> {
        let sql = format!("{APPOINTMENT_SELECT} WHERE a.id = ?");
        sqlx::query_as::<_, Appointment>(&sql)
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?
            .ok_or_else(|| HmsError::NotFound("appointment".into()))
    }

    /// Fetches an appointment the acting doctor owns.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown id; `NotAuthorized` (with `action` as the sentence tail) if the
    /// actor is not its doctor.
    pub async fn find_for_doctor(
        &self,
        actor: &Actor,
        id: AppointmentId,
        action: &str,
    ) -> HmsResult<Appointment> {
        let appointment = self.find(id).await?;
        if !actor.is(Role::Doctor) || appointment.doctor_id != actor.user_id {
            return Err(HmsError::NotAuthorized(action.to_string()));
        }
        Ok(appointment)
    }

    /// The patient's appointments, ordered by date and time.
    pub async fn list_for_patient(
        &self,
        actor: &Actor,
        status: Option<AppointmentStatus>,
    ) -> HmsResult<Vec<Appointment>> {
        actor.require(Role::Patient, "view patient appointments")?;
        self.list_where("a.patient_id", actor.user_id, status).await
    }

    /// The doctor's appointments, ordered by date and time.
    pub async fn list_for_doctor(
        &self,
        actor: &Actor,
        status: Option<AppointmentStatus>,
    ) -> HmsResult<Vec<Appointment>> {
        actor.require(Role::Doctor, "view doctor appointments")?;
        self.list_where("a.doctor_id", actor.user_id, status).await
    }

    async fn list_where(
        &self,
        owner_column: &'static str,
        owner: UserId,
        status: Option<AppointmentStatus>,
    ) -> HmsResult<Vec<Appointment>> {
        let sql = match status {
            Some(_) => format!("{APPOINTMENT_SELECT} WHERE {owner_column} = ? AND a.status = ? {SLOT_ORDER}"),
            None => format!("{APPOINTMENT_SELECT} WHERE {owner_column} = ? {SLOT_ORDER}"),
        };
        let mut query = sqlx::query_as::<_, Appointment>(&sql).bind(owner);
        if let Some(status) = status {
            query = query.bind(status);
        }
        Ok(query.fetch_all(self.db.pool()).await?)
    }

    /// The next `limit` approved appointments on or after `today`.
    pub async fn upcoming_for_patient(
        &self,
        actor: &Actor,
        today: NaiveDate,
        limit: i64,
    ) -> HmsResult<Vec<Appointment>> {
        actor.require(Role::Patient, "view patient appointments")?;
        let sql = format!(
            "{APPOINTMENT_SELECT} WHERE a.patient_id = ? AND a.status = ? \
             AND a.appointment_date >= ? {SLOT_ORDER} LIMIT ?"
        );
        Ok(sqlx::query_as::<_, Appointment>(&sql)
            .bind(actor.user_id)
            .bind(AppointmentStatus::Approved)
            .bind(today)
            .bind(limit)
            .fetch_all(self.db.pool())
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::test_support::Fixture;

    fn slot(doctor_id: UserId, date: &str, time: &str) -> BookingRequest {
        BookingRequest {
            doctor_id,
            date: crate::validation::parse_date(date).unwrap(),
            time: crate::validation::parse_time(time).unwrap(),
            reason: "check-up".into(),
        }
    }

    #[tokio::test]
    async fn booking_starts_pending_and_blocks_the_slot() {
        let fx = Fixture::new().await;
        let (doctor, _) = fx.approved_doctor("drd").await;
        let first = fx.patient("p1").await;
        let second = fx.patient("p2").await;
        let svc = AppointmentService::new(fx.db.clone());

        let booked = svc
            .book(&first, slot(doctor.user_id, "2025-01-01", "10:00"))
            .await
            .expect("first booking should succeed");
        assert_eq!(booked.status, AppointmentStatus::Pending);
        assert_eq!(booked.patient_username, "p1");
        assert_eq!(booked.doctor_username, "drd");

        let err = svc
            .book(&second, slot(doctor.user_id, "2025-01-01", "10:00"))
            .await
            .expect_err("same slot should be refused");
        assert!(matches!(err, HmsError::SlotTaken));

        // a different minute is a different slot
        svc.book(&second, slot(doctor.user_id, "2025-01-01", "10:30"))
            .await
            .expect("other slot should succeed");
    }

    #[tokio::test]
    async fn cancelled_slot_stays_taken() {
        let fx = Fixture::new().await;
        let (doctor, _) = fx.approved_doctor("drd").await;
        let patient = fx.patient("p1").await;
        let svc = AppointmentService::new(fx.db.clone());

        let booked = svc
            .book(&patient, slot(doctor.user_id, "2025-01-01", "10:00"))
            .await
            .unwrap();
        svc.reject(&doctor, booked.id).await.unwrap();

        assert!(matches!(
            svc.book(&patient, slot(doctor.user_id, "2025-01-01", "10:00"))
                .await,
            Err(HmsError::SlotTaken)
        ));
    }

    #[tokio::test]
    async fn concurrent_bookings_for_one_slot_admit_exactly_one() {
        let fx = Fixture::new().await;
        let (doctor, _) = fx.approved_doctor("drd").await;
        let a = fx.patient("pa").await;
        let b = fx.patient("pb").await;
        let svc = AppointmentService::new(fx.db.clone());

        let (ra, rb) = tokio::join!(
            svc.book(&a, slot(doctor.user_id, "2025-03-03", "09:00")),
            svc.book(&b, slot(doctor.user_id, "2025-03-03", "09:00")),
        );
        let results = [ra, rb];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(
            results
                .iter()
                .filter(|r| matches!(r, Err(HmsError::SlotTaken)))
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn unapproved_or_unknown_doctor_cannot_be_booked() {
        let fx = Fixture::new().await;
        let pending = fx.pending_doctor("drnew").await;
        let patient = fx.patient("p1").await;
        let svc = AppointmentService::new(fx.db.clone());

        assert!(matches!(
            svc.book(&patient, slot(pending.id, "2025-01-01", "10:00"))
                .await,
            Err(HmsError::NotFound(_))
        ));
        assert!(matches!(
            svc.book(&patient, slot(9999, "2025-01-01", "10:00")).await,
            Err(HmsError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn only_patients_book() {
        let fx = Fixture::new().await;
        let (doctor, _) = fx.approved_doctor("drd").await;
        let svc = AppointmentService::new(fx.db.clone());
        assert!(matches!(
            svc.book(&doctor, slot(doctor.user_id, "2025-01-01", "10:00"))
                .await,
            Err(HmsError::NotAuthorized(_))
        ));
    }

    #[tokio::test]
    async fn transitions_are_owner_only() {
        let fx = Fixture::new().await;
        let (owner, _) = fx.approved_doctor("drowner").await;
        let (other, _) = fx.approved_doctor("drother").await;
        let patient = fx.patient("p1").await;
        let svc = AppointmentService::new(fx.db.clone());

        let booked = svc
            .book(&patient, slot(owner.user_id, "2025-01-01", "10:00"))
            .await
            .unwrap();

        for actor in [&other, &patient] {
            assert!(matches!(
                svc.approve(actor, booked.id).await,
                Err(HmsError::NotAuthorized(_))
            ));
            assert!(matches!(
                svc.reject(actor, booked.id).await,
                Err(HmsError::NotAuthorized(_))
            ));
        }
        assert_eq!(
            svc.find(booked.id).await.unwrap().status,
            AppointmentStatus::Pending
        );
        assert!(matches!(
            svc.approve(&owner, 424242).await,
            Err(HmsError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn status_machine_has_no_terminal_state() {
        let fx = Fixture::new().await;
        let (doctor, _) = fx.approved_doctor("drd").await;
        let patient = fx.patient("p1").await;
        let svc = AppointmentService::new(fx.db.clone());
        let booked = svc
            .book(&patient, slot(doctor.user_id, "2025-01-01", "10:00"))
            .await
            .unwrap();

        let approved = svc.approve(&doctor, booked.id).await.unwrap();
        assert_eq!(approved.status, AppointmentStatus::Approved);
        let again = svc.approve(&doctor, booked.id).await.unwrap();
        assert_eq!(again.status, AppointmentStatus::Approved);

        let cancelled = svc.reject(&doctor, booked.id).await.unwrap();
        assert_eq!(cancelled.status, AppointmentStatus::Cancelled);

        let reopened = svc.approve(&doctor, booked.id).await.unwrap();
        assert_eq!(reopened.status, AppointmentStatus::Approved);
    }

    #[tokio::test]
    async fn listings_are_ordered_and_filterable() {
        let fx = Fixture::new().await;
        let (doctor, _) = fx.approved_doctor("drd").await;
        let patient = fx.patient("p1").await;
        let svc = AppointmentService::new(fx.db.clone());

        let late = svc
            .book(&patient, slot(doctor.user_id, "2025-02-01", "09:00"))
            .await
            .unwrap();
        let early = svc
            .book(&patient, slot(doctor.user_id, "2025-01-01", "15:00"))
            .await
            .unwrap();
        let earliest = svc
            .book(&patient, slot(doctor.user_id, "2025-01-01", "08:00"))
            .await
            .unwrap();
        svc.approve(&doctor, early.id).await.unwrap();

        let all: Vec<_> = svc
            .list_for_patient(&patient, None)
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(all, vec![earliest.id, early.id, late.id]);

        let pending = svc
            .list_for_doctor(&doctor, Some(AppointmentStatus::Pending))
            .await
            .unwrap();
        assert_eq!(pending.len(), 2);
        assert!(pending.iter().all(|a| a.status == AppointmentStatus::Pending));

        let upcoming = svc
            .upcoming_for_patient(&patient, NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(), 3)
            .await
            .unwrap();
        assert_eq!(upcoming.len(), 1);
        assert_eq!(upcoming[0].id, early.id);
        let none_left = svc
            .upcoming_for_patient(&patient, NaiveDate::from_ymd_opt(2025, 1, 2).unwrap(), 3)
            .await
            .unwrap();
        assert!(none_left.is_empty());
    }

    #[test]
    fn status_filter_parses_case_insensitively() {
        assert_eq!(
            "approved".parse::<AppointmentStatus>().unwrap(),
            AppointmentStatus::Approved
        );
        assert!("done".parse::<AppointmentStatus>().is_err());
    }
}
