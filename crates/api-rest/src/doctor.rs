//! Doctor pages: dashboard, appointment decisions and prescriptions.

use crate::outcome::{redirect, refuse, refuse_to};
use crate::patient::{AppointmentsView, StatusFilter};
use crate::AppState;
use api_shared::{Notice, NoticeParams};
use axum::extract::{Extension, Path, Query, State};
use axum::response::{Json, Response};
use axum::Form;
use hms_core::repositories::appointments::{Appointment, AppointmentService, AppointmentStatus};
use hms_core::repositories::messaging::MessagingService;
use hms_core::repositories::prescriptions::{Prescription, PrescriptionService};
use hms_core::repositories::profiles::{Doctor, ProfileService};
use hms_core::validation::parse_id;
use hms_core::Actor;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct PrescriptionForm {
    pub prescription_text: String,
}

#[derive(Debug, Serialize)]
pub struct DoctorDashboard {
    pub notice: Option<Notice>,
    pub doctor: Doctor,
    pub pending_appointments: Vec<Appointment>,
    pub approved_appointments: Vec<Appointment>,
    pub pending_count: usize,
    pub received_messages: i64,
}

#[derive(Debug, Serialize)]
pub struct PrescriptionContext {
    pub notice: Option<Notice>,
    pub appointment: Appointment,
    pub prescriptions: Vec<Prescription>,
}

#[utoipa::path(
    get,
    path = "/dashboard/doctor",
    params(NoticeParams),
    responses((status = 200, description = "Pending and approved appointments, message count"))
)]
#[axum::debug_handler]
pub async fn dashboard(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Query(params): Query<NoticeParams>,
) -> Result<Json<DoctorDashboard>, Response> {
    let doctor = ProfileService::new(state.db.clone(), state.cfg.clone())
        .find_doctor(actor.user_id)
        .await
        .map_err(refuse_to("/login"))?;
    let appointments = AppointmentService::new(state.db.clone());
    let pending_appointments = appointments
        .list_for_doctor(&actor, Some(AppointmentStatus::Pending))
        .await
        .map_err(refuse_to("/login"))?;
    let approved_appointments = appointments
        .list_for_doctor(&actor, Some(AppointmentStatus::Approved))
        .await
        .map_err(refuse_to("/login"))?;
    let received_messages = MessagingService::new(state.db.clone())
        .received_message_count(&actor)
        .await
        .map_err(refuse_to("/login"))?;

    Ok(Json(DoctorDashboard {
        notice: params.into_notice(),
        doctor,
        pending_count: pending_appointments.len(),
        pending_appointments,
        approved_appointments,
        received_messages,
    }))
}

#[utoipa::path(
    get,
    path = "/doctor/appointments",
    params(StatusFilter, NoticeParams),
    responses((status = 200, description = "The doctor's appointments by date and time"))
)]
#[axum::debug_handler]
pub async fn appointments(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Query(filter): Query<StatusFilter>,
    Query(params): Query<NoticeParams>,
) -> Result<Json<AppointmentsView>, Response> {
    let status = filter.parse().map_err(refuse_to("/doctor/appointments"))?;
    let appointments = AppointmentService::new(state.db.clone())
        .list_for_doctor(&actor, status)
        .await
        .map_err(refuse_to("/dashboard/doctor"))?;
    Ok(Json(AppointmentsView {
        notice: params.into_notice(),
        status,
        appointments,
    }))
}

#[utoipa::path(
    post,
    path = "/approve-appointment/{id}",
    params(("id" = i64, Path, description = "Appointment id")),
    responses((status = 303, description = "Redirect to the doctor dashboard with the outcome"))
)]
/// Approve an appointment
///
/// Only the appointment's own doctor may approve it. Also routed for `GET`.
#[axum::debug_handler]
pub async fn approve(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Response {
    let id = match parse_id(&id, "Appointment") {
        Ok(id) => id,
        Err(e) => return refuse("/dashboard/doctor", e),
    };
    match AppointmentService::new(state.db.clone())
        .approve(&actor, id)
        .await
    {
        Ok(a) => redirect(
            "/dashboard/doctor",
            Notice::success(format!(
                "Appointment with {} on {} at {} approved.",
                a.patient_username,
                a.appointment_date,
                a.appointment_time.format("%H:%M")
            )),
        ),
        Err(e) => refuse("/dashboard/doctor", e),
    }
}

#[utoipa::path(
    post,
    path = "/reject-appointment/{id}",
    params(("id" = i64, Path, description = "Appointment id")),
    responses((status = 303, description = "Redirect to the doctor dashboard with the outcome"))
)]
/// Reject (cancel) an appointment
///
/// The appointment is kept with status `Cancelled`. Also routed for `GET`.
#[axum::debug_handler]
pub async fn reject(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Response {
    let id = match parse_id(&id, "Appointment") {
        Ok(id) => id,
        Err(e) => return refuse("/dashboard/doctor", e),
    };
    match AppointmentService::new(state.db.clone())
        .reject(&actor, id)
        .await
    {
        Ok(a) => redirect(
            "/dashboard/doctor",
            Notice::success(format!(
                "Appointment with {} on {} cancelled.",
                a.patient_username, a.appointment_date
            )),
        ),
        Err(e) => refuse("/dashboard/doctor", e),
    }
}

#[utoipa::path(
    get,
    path = "/create-prescription/{id}",
    params(("id" = i64, Path, description = "Appointment id"), NoticeParams),
    responses((status = 200, description = "Appointment context for a new prescription"))
)]
#[axum::debug_handler]
pub async fn prescription_context(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    Query(params): Query<NoticeParams>,
) -> Result<Json<PrescriptionContext>, Response> {
    let id = parse_id(&id, "Appointment").map_err(refuse_to("/dashboard/doctor"))?;
    let appointment = AppointmentService::new(state.db.clone())
        .find_for_doctor(&actor, id, "prescribe for this appointment")
        .await
        .map_err(refuse_to("/dashboard/doctor"))?;
    let prescriptions = PrescriptionService::new(state.db.clone())
        .list_for_doctor(&actor)
        .await
        .map_err(refuse_to("/dashboard/doctor"))?
        .into_iter()
        .filter(|p| p.appointment_id == Some(appointment.id))
        .collect();
    Ok(Json(PrescriptionContext {
        notice: params.into_notice(),
        appointment,
        prescriptions,
    }))
}

#[utoipa::path(
    post,
    path = "/create-prescription/{id}",
    params(("id" = i64, Path, description = "Appointment id")),
    request_body(content = PrescriptionForm, content_type = "application/x-www-form-urlencoded"),
    responses((status = 303, description = "Redirect with the outcome"))
)]
/// Write a prescription for an appointment the doctor owns
#[axum::debug_handler]
pub async fn create_prescription(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    Form(form): Form<PrescriptionForm>,
) -> Response {
    let id = match parse_id(&id, "Appointment") {
        Ok(id) => id,
        Err(e) => return refuse("/dashboard/doctor", e),
    };
    match PrescriptionService::new(state.db.clone())
        .create(&actor, id, &form.prescription_text)
        .await
    {
        Ok(p) => redirect(
            "/dashboard/doctor",
            Notice::success(format!("Prescription saved for {}.", p.patient_username)),
        ),
        Err(e) => refuse(&format!("/create-prescription/{id}"), e),
    }
}
