//! Patient pages: dashboard, profile, booking and the patient's own records.

use crate::outcome::{redirect, refuse, refuse_to};
use crate::AppState;
use api_shared::{Notice, NoticeParams};
use axum::extract::{Extension, Query, State};
use axum::response::{Json, Response};
use axum::Form;
use chrono::Utc;
use hms_core::constants::{DASHBOARD_RECENT_ORDERS_LIMIT, DASHBOARD_UPCOMING_LIMIT};
use hms_core::repositories::appointments::{
    Appointment, AppointmentService, AppointmentStatus, BookingRequest,
};
use hms_core::repositories::commerce::{CommerceService, Order};
use hms_core::repositories::prescriptions::{Prescription, PrescriptionService};
use hms_core::repositories::profiles::{Doctor, Patient, PatientUpdate, ProfileService};
use hms_core::{validation, Actor, HmsResult};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

// ============================================================================
// Forms and views
// ============================================================================

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct ProfileForm {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: String,
    pub blood_group: String,
    /// `YYYY-MM-DD`, or empty.
    pub date_of_birth: String,
    pub address: String,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct BookForm {
    pub doctor_id: String,
    /// `YYYY-MM-DD`
    pub appointment_date: String,
    /// `HH:MM`
    pub appointment_time: String,
    pub reason: String,
}

impl BookForm {
    fn into_request(self) -> HmsResult<BookingRequest> {
        Ok(BookingRequest {
            doctor_id: validation::parse_id(&self.doctor_id, "Doctor")?,
            date: validation::parse_date(&self.appointment_date)?,
            time: validation::parse_time(&self.appointment_time)?,
            reason: self.reason,
        })
    }
}

/// Optional `?status=` filter on appointment lists.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct StatusFilter {
    pub status: Option<String>,
}

impl StatusFilter {
    pub(crate) fn parse(&self) -> HmsResult<Option<AppointmentStatus>> {
        match self.status.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            None => Ok(None),
            Some(s) => s.parse().map(Some),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PatientDashboard {
    pub notice: Option<Notice>,
    pub profile: Patient,
    pub upcoming_appointments: Vec<Appointment>,
    pub recent_orders: Vec<Order>,
}

#[derive(Debug, Serialize)]
pub struct ProfileView {
    pub notice: Option<Notice>,
    pub profile: Patient,
}

#[derive(Debug, Serialize)]
pub struct BookingView {
    pub notice: Option<Notice>,
    pub doctors: Vec<Doctor>,
}

#[derive(Debug, Serialize)]
pub struct AppointmentsView {
    pub notice: Option<Notice>,
    pub status: Option<AppointmentStatus>,
    pub appointments: Vec<Appointment>,
}

#[derive(Debug, Serialize)]
pub struct PrescriptionsView {
    pub notice: Option<Notice>,
    pub prescriptions: Vec<Prescription>,
}

// ============================================================================
// Handlers
// ============================================================================

#[utoipa::path(
    get,
    path = "/dashboard/patient",
    params(NoticeParams),
    responses(
        (status = 200, description = "Patient dashboard: profile, upcoming approved appointments, recent orders"),
        (status = 303, description = "Not signed in as a patient")
    )
)]
/// Patient dashboard
///
/// Creates the patient profile on the fly if it is missing.
#[axum::debug_handler]
pub async fn dashboard(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Query(params): Query<NoticeParams>,
) -> Result<Json<PatientDashboard>, Response> {
    let profiles = ProfileService::new(state.db.clone(), state.cfg.clone());
    let profile = profiles
        .ensure_patient_profile(&actor)
        .await
        .map_err(refuse_to("/login"))?;
    let upcoming_appointments = AppointmentService::new(state.db.clone())
        .upcoming_for_patient(&actor, Utc::now().date_naive(), DASHBOARD_UPCOMING_LIMIT)
        .await
        .map_err(refuse_to("/login"))?;
    let recent_orders = CommerceService::new(state.db.clone())
        .list_orders(&actor, Some(DASHBOARD_RECENT_ORDERS_LIMIT))
        .await
        .map_err(refuse_to("/login"))?;

    Ok(Json(PatientDashboard {
        notice: params.into_notice(),
        profile,
        upcoming_appointments,
        recent_orders,
    }))
}

#[utoipa::path(
    get,
    path = "/profile",
    params(NoticeParams),
    responses((status = 200, description = "The patient's own profile"))
)]
#[axum::debug_handler]
pub async fn profile_view(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Query(params): Query<NoticeParams>,
) -> Result<Json<ProfileView>, Response> {
    let profile = ProfileService::new(state.db.clone(), state.cfg.clone())
        .ensure_patient_profile(&actor)
        .await
        .map_err(refuse_to("/dashboard/patient"))?;
    Ok(Json(ProfileView {
        notice: params.into_notice(),
        profile,
    }))
}

#[utoipa::path(
    post,
    path = "/profile",
    request_body(content = ProfileForm, content_type = "application/x-www-form-urlencoded"),
    responses((status = 303, description = "Redirect to /profile with the outcome"))
)]
#[axum::debug_handler]
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Form(form): Form<ProfileForm>,
) -> Response {
    let date_of_birth = match validation::parse_optional_date(Some(form.date_of_birth.as_str()))
    {
        Ok(date) => date,
        Err(e) => return refuse("/profile", e),
    };
    let update = PatientUpdate {
        first_name: form.first_name,
        last_name: form.last_name,
        email: form.email,
        phone_number: form.phone_number,
        blood_group: form.blood_group,
        date_of_birth,
        address: form.address,
    };
    match ProfileService::new(state.db.clone(), state.cfg.clone())
        .update_patient_profile(&actor, update)
        .await
    {
        Ok(_) => redirect("/profile", Notice::success("Your profile was updated.")),
        Err(e) => refuse("/profile", e),
    }
}

#[utoipa::path(
    get,
    path = "/book-appointment",
    params(NoticeParams),
    responses((status = 200, description = "Approved doctors available for booking"))
)]
#[axum::debug_handler]
pub async fn booking_view(
    State(state): State<AppState>,
    Query(params): Query<NoticeParams>,
) -> Result<Json<BookingView>, Response> {
    let doctors = ProfileService::new(state.db.clone(), state.cfg.clone())
        .approved_doctors()
        .await
        .map_err(refuse_to("/dashboard/patient"))?;
    Ok(Json(BookingView {
        notice: params.into_notice(),
        doctors,
    }))
}

#[utoipa::path(
    post,
    path = "/book-appointment",
    request_body(content = BookForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Booked (Pending); or back to /book-appointment with an error such as a taken slot")
    )
)]
/// Book an appointment
///
/// The slot `(doctor, date, time)` must be free in every status, cancelled included.
#[axum::debug_handler]
pub async fn book(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Form(form): Form<BookForm>,
) -> Response {
    let request = match form.into_request() {
        Ok(request) => request,
        Err(e) => return refuse("/book-appointment", e),
    };

    match AppointmentService::new(state.db.clone())
        .book(&actor, request)
        .await
    {
        Ok(_) => redirect(
            "/my-appointments",
            Notice::success("Appointment booked. Awaiting doctor approval."),
        ),
        Err(e) => refuse("/book-appointment", e),
    }
}

#[utoipa::path(
    get,
    path = "/my-appointments",
    params(StatusFilter, NoticeParams),
    responses((status = 200, description = "The patient's appointments by date and time"))
)]
#[axum::debug_handler]
pub async fn my_appointments(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Query(filter): Query<StatusFilter>,
    Query(params): Query<NoticeParams>,
) -> Result<Json<AppointmentsView>, Response> {
    let status = filter.parse().map_err(refuse_to("/my-appointments"))?;
    let appointments = AppointmentService::new(state.db.clone())
        .list_for_patient(&actor, status)
        .await
        .map_err(refuse_to("/dashboard/patient"))?;
    Ok(Json(AppointmentsView {
        notice: params.into_notice(),
        status,
        appointments,
    }))
}

#[utoipa::path(
    get,
    path = "/my-prescriptions",
    params(NoticeParams),
    responses((status = 200, description = "The patient's prescriptions, newest first"))
)]
#[axum::debug_handler]
pub async fn my_prescriptions(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Query(params): Query<NoticeParams>,
) -> Result<Json<PrescriptionsView>, Response> {
    let prescriptions = PrescriptionService::new(state.db.clone())
        .list_for_patient(&actor)
        .await
        .map_err(refuse_to("/dashboard/patient"))?;
    Ok(Json(PrescriptionsView {
        notice: params.into_notice(),
        prescriptions,
    }))
}
