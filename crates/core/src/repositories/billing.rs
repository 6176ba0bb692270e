//! Invoices and reporting.

use crate::actor::{Actor, Role, UserId};
use crate::db::Database;
use crate::error::{HmsError, HmsResult};
use crate::money::Money;
use crate::repositories::appointments::AppointmentStatus;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
pub enum InvoiceStatus {
    Pending,
    Paid,
    Cancelled,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Invoice {
    pub id: i64,
    pub patient_id: Option<UserId>,
    pub patient_username: Option<String>,
    pub issue_date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    #[sqlx(rename = "total_amount_cents")]
    pub total_amount: Money,
    pub status: InvoiceStatus,
    pub notes: String,
}

#[derive(Clone, Debug)]
pub struct NewInvoice {
    pub patient_id: UserId,
    pub due_date: Option<NaiveDate>,
    pub total_amount: Money,
    pub notes: String,
}

/// Appointment counts per status.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct AppointmentReport {
    pub pending: i64,
    pub approved: i64,
    pub cancelled: i64,
    pub total: i64,
}

const INVOICE_SELECT: &str = "SELECT i.id, i.patient_id, u.username AS patient_username, \
     i.issue_date, i.due_date, i.total_amount_cents, i.status, i.notes \
     FROM invoices i LEFT JOIN users u ON u.id = i.patient_id";

#[derive(Clone, Debug)]
pub struct BillingService {
    db: Database,
}

impl BillingService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Issues a `Pending` invoice dated `today`.
    ///
    /// # Errors
    ///
    /// Returns `HmsError::NotFound` if the patient has no patient profile.
    pub async fn create_invoice(
        &self,
        actor: &Actor,
        new: NewInvoice,
        today: NaiveDate,
    ) -> HmsResult<Invoice> {
        actor.require(Role::Admin, "create invoices")?;

        let exists: Option<i64> = sqlx::query_scalar("SELECT user_id FROM patients WHERE user_id = ?")
            .bind(new.patient_id)
            .fetch_optional(self.db.pool())
            .await?;
        if exists.is_none() {
            return Err(HmsError::NotFound("patient".into()));
        }

        let id: i64 = sqlx::query_scalar(
            "INSERT INTO invoices (patient_id, issue_date, due_date, total_amount_cents, status, notes) \
             VALUES (?, ?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(new.patient_id)
        .bind(today)
        .bind(new.due_date)
        .bind(new.total_amount)
        .bind(InvoiceStatus::Pending)
        .bind(new.notes.trim())
        .fetch_one(self.db.pool())
        .await?;

        tracing::info!(invoice_id = id, patient_id = new.patient_id, "invoice created");
        let sql = format!("{INVOICE_SELECT} WHERE i.id = ?");
        Ok(sqlx::query_as::<_, Invoice>(&sql)
            .bind(id)
            .fetch_one(self.db.pool())
            .await?)
    }

    /// All invoices, newest first.
    pub async fn list_invoices(&self, actor: &Actor) -> HmsResult<Vec<Invoice>> {
        actor.require(Role::Admin, "view invoices")?;
        let sql = format!("{INVOICE_SELECT} ORDER BY i.issue_date DESC, i.id DESC");
        Ok(sqlx::query_as::<_, Invoice>(&sql)
            .fetch_all(self.db.pool())
            .await?)
    }

    pub async fn appointment_report(&self, actor: &Actor) -> HmsResult<AppointmentReport> {
        actor.require(Role::Admin, "view reports")?;
        let rows: Vec<(AppointmentStatus, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM appointments GROUP BY status")
                .fetch_all(self.db.pool())
                .await?;

        let mut report = AppointmentReport::default();
        for (status, count) in rows {
            match status {
                AppointmentStatus::Pending => report.pending = count,
                AppointmentStatus::Approved => report.approved = count,
                AppointmentStatus::Cancelled => report.cancelled = count,
            }
            report.total += count;
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::appointments::{AppointmentService, BookingRequest};
    use crate::repositories::test_support::Fixture;
    use chrono::NaiveTime;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 5, 1).unwrap()
    }

    #[tokio::test]
    async fn invoice_requires_existing_patient() {
        let fx = Fixture::new().await;
        let admin = fx.admin().await;
        let patient = fx.patient("p1").await;
        let svc = BillingService::new(fx.db.clone());

        let invoice = svc
            .create_invoice(
                &admin,
                NewInvoice {
                    patient_id: patient.user_id,
                    due_date: NaiveDate::from_ymd_opt(2025, 6, 1),
                    total_amount: Money::from_cents(12000),
                    notes: "Consultation".into(),
                },
                today(),
            )
            .await
            .expect("invoice should be created");
        assert_eq!(invoice.status, InvoiceStatus::Pending);
        assert_eq!(invoice.issue_date, today());
        assert_eq!(invoice.patient_username.as_deref(), Some("p1"));
        assert_eq!(invoice.total_amount.to_string(), "120.00");

        assert!(matches!(
            svc.create_invoice(
                &admin,
                NewInvoice {
                    patient_id: admin.user_id,
                    due_date: None,
                    total_amount: Money::ZERO,
                    notes: String::new(),
                },
                today(),
            )
            .await,
            Err(HmsError::NotFound(_))
        ));
        assert_eq!(svc.list_invoices(&admin).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn report_counts_by_status() {
        let fx = Fixture::new().await;
        let admin = fx.admin().await;
        let (doctor, _) = fx.approved_doctor("drd").await;
        let patient = fx.patient("p1").await;
        let appointments = AppointmentService::new(fx.db.clone());

        for hour in [9, 10, 11] {
            let booked = appointments
                .book(
                    &patient,
                    BookingRequest {
                        doctor_id: doctor.user_id,
                        date: today(),
                        time: NaiveTime::from_hms_opt(hour, 0, 0).unwrap(),
                        reason: String::new(),
                    },
                )
                .await
                .unwrap();
            if hour == 10 {
                appointments.approve(&doctor, booked.id).await.unwrap();
            }
        }

        let report = BillingService::new(fx.db.clone())
            .appointment_report(&admin)
            .await
            .unwrap();
        assert_eq!(
            report,
            AppointmentReport {
                pending: 2,
                approved: 1,
                cancelled: 0,
                total: 3,
            }
        );
    }
}
