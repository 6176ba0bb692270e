//! Admin pages: doctor approval, staff accounts, catalogs, billing, shop stock and reports.

use crate::outcome::{redirect, refuse, refuse_to};
use crate::AppState;
use api_shared::{Notice, NoticeParams};
use axum::extract::{Extension, Path, Query, State};
use axum::response::{Json, Response};
use axum::Form;
use chrono::Utc;
use hms_core::repositories::billing::{AppointmentReport, BillingService, Invoice, NewInvoice};
use hms_core::repositories::catalog::{CatalogService, LabTest, Medicine, NewLabTest, NewMedicine};
use hms_core::repositories::commerce::{CommerceService, NewProduct};
use hms_core::repositories::messaging::MessagingService;
use hms_core::repositories::profiles::{
    AccountDetails, Doctor, DoctorDetails, DoctorUpdate, LabWorkerDetails, Patient,
    PharmacistDetails, ProfileService,
};
use hms_core::{validation, Actor, HmsResult, Money};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// ============================================================================
// Forms
// ============================================================================

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct AddDoctorForm {
    pub username: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub specialty: String,
    pub phone_number: String,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct AddLabWorkerForm {
    pub username: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub department: String,
    pub employee_id: String,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct AddPharmacistForm {
    pub username: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub license_number: String,
    /// Whole number, or empty.
    pub years_experience: String,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct EditDoctorForm {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub specialty: String,
    pub phone_number: String,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct MedicineForm {
    pub name: String,
    pub description: String,
    pub manufacturer: String,
    /// Decimal amount, e.g. `4.99`.
    pub unit_price: String,
    pub stock_quantity: String,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct LabTestForm {
    pub name: String,
    pub description: String,
    /// Decimal amount, e.g. `25.00`.
    pub cost: String,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct InvoiceForm {
    pub patient_id: String,
    /// `YYYY-MM-DD`, or empty.
    pub due_date: String,
    pub total_amount: String,
    pub notes: String,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct CategoryForm {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct ProductForm {
    /// Category id, or empty.
    pub category_id: String,
    pub name: String,
    pub description: String,
    pub price: String,
    pub stock: String,
}

// ============================================================================
// Views
// ============================================================================

#[derive(Debug, Serialize)]
pub struct AdminDashboard {
    pub notice: Option<Notice>,
    pub total_conversations: i64,
    pub pending_doctor_count: usize,
}

#[derive(Debug, Serialize)]
pub struct DoctorsView {
    pub notice: Option<Notice>,
    pub doctors: Vec<Doctor>,
}

#[derive(Debug, Serialize)]
pub struct PatientsView {
    pub notice: Option<Notice>,
    pub patients: Vec<Patient>,
}

#[derive(Debug, Serialize)]
pub struct MedicinesView {
    pub notice: Option<Notice>,
    pub medicines: Vec<Medicine>,
}

#[derive(Debug, Serialize)]
pub struct LabTestsView {
    pub notice: Option<Notice>,
    pub lab_tests: Vec<LabTest>,
}

#[derive(Debug, Serialize)]
pub struct InvoicesView {
    pub notice: Option<Notice>,
    pub invoices: Vec<Invoice>,
}

#[derive(Debug, Serialize)]
pub struct ReportView {
    pub appointments: AppointmentReport,
}

/// Whole, non-negative count; blank means zero.
fn count(input: &str, field: &str) -> HmsResult<i64> {
    Ok(validation::parse_optional_count(Some(input), field)?.unwrap_or(0))
}

fn optional_id(input: &str, field: &str) -> HmsResult<Option<i64>> {
    validation::parse_optional_count(Some(input), field)
}

impl MedicineForm {
    fn into_new(self) -> HmsResult<NewMedicine> {
        Ok(NewMedicine {
            unit_price: Money::parse(&self.unit_price, "Unit price")?,
            stock_quantity: count(&self.stock_quantity, "Stock quantity")?,
            name: self.name,
            description: self.description,
            manufacturer: self.manufacturer,
        })
    }
}

impl ProductForm {
    fn into_new(self) -> HmsResult<NewProduct> {
        Ok(NewProduct {
            category_id: optional_id(&self.category_id, "Category")?,
            price: Money::parse(&self.price, "Price")?,
            stock: count(&self.stock, "Stock")?,
            name: self.name,
            description: self.description,
        })
    }
}

impl InvoiceForm {
    fn into_new(self) -> HmsResult<NewInvoice> {
        Ok(NewInvoice {
            patient_id: validation::parse_id(&self.patient_id, "Patient")?,
            due_date: validation::parse_optional_date(Some(self.due_date.as_str()))?,
            total_amount: Money::parse(&self.total_amount, "Total amount")?,
            notes: self.notes,
        })
    }
}

// ============================================================================
// Dashboard and doctor approval
// ============================================================================

#[utoipa::path(
    get,
    path = "/dashboard/admin",
    params(NoticeParams),
    responses((status = 200, description = "Conversation total and pending doctor count"))
)]
#[axum::debug_handler]
pub async fn dashboard(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Query(params): Query<NoticeParams>,
) -> Result<Json<AdminDashboard>, Response> {
    let total_conversations = MessagingService::new(state.db.clone())
        .total_conversations(&actor)
        .await
        .map_err(refuse_to("/login"))?;
    let pending = ProfileService::new(state.db.clone(), state.cfg.clone())
        .pending_doctors(&actor)
        .await
        .map_err(refuse_to("/login"))?;
    Ok(Json(AdminDashboard {
        notice: params.into_notice(),
        total_conversations,
        pending_doctor_count: pending.len(),
    }))
}

#[utoipa::path(
    get,
    path = "/admin/pending-doctors",
    params(NoticeParams),
    responses((status = 200, description = "Doctors awaiting approval"))
)]
#[axum::debug_handler]
pub async fn pending_doctors(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Query(params): Query<NoticeParams>,
) -> Result<Json<DoctorsView>, Response> {
    let doctors = ProfileService::new(state.db.clone(), state.cfg.clone())
        .pending_doctors(&actor)
        .await
        .map_err(refuse_to("/dashboard/admin"))?;
    Ok(Json(DoctorsView {
        notice: params.into_notice(),
        doctors,
    }))
}

#[utoipa::path(
    post,
    path = "/admin/approve-doctor/{id}",
    params(("id" = i64, Path, description = "Doctor user id")),
    responses((status = 303, description = "Redirect to pending doctors with the outcome"))
)]
/// Approve a doctor, allowing them to sign in. Also routed for `GET`.
#[axum::debug_handler]
pub async fn approve_doctor(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Response {
    let id = match validation::parse_id(&id, "Doctor") {
        Ok(id) => id,
        Err(e) => return refuse("/admin/pending-doctors", e),
    };
    match ProfileService::new(state.db.clone(), state.cfg.clone())
        .approve_doctor(&actor, id)
        .await
    {
        Ok(doctor) => redirect(
            "/admin/pending-doctors",
            Notice::success(format!("Doctor {} has been approved.", doctor.username)),
        ),
        Err(e) => refuse("/admin/pending-doctors", e),
    }
}

#[utoipa::path(
    post,
    path = "/admin/reject-doctor/{id}",
    params(("id" = i64, Path, description = "Doctor user id")),
    responses((status = 303, description = "Redirect to pending doctors with the outcome"))
)]
/// Reject a doctor, deleting the account. Irreversible. Also routed for `GET`.
#[axum::debug_handler]
pub async fn reject_doctor(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Response {
    let id = match validation::parse_id(&id, "Doctor") {
        Ok(id) => id,
        Err(e) => return refuse("/admin/pending-doctors", e),
    };
    match ProfileService::new(state.db.clone(), state.cfg.clone())
        .reject_doctor(&actor, id)
        .await
    {
        Ok(doctor) => redirect(
            "/admin/pending-doctors",
            Notice::success(format!(
                "Doctor {} has been rejected and removed.",
                doctor.username
            )),
        ),
        Err(e) => refuse("/admin/pending-doctors", e),
    }
}

// ============================================================================
// Staff accounts
// ============================================================================

#[utoipa::path(
    get,
    path = "/admin/doctors",
    params(NoticeParams),
    responses((status = 200, description = "All doctors, approved or not"))
)]
#[axum::debug_handler]
pub async fn doctors(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Query(params): Query<NoticeParams>,
) -> Result<Json<DoctorsView>, Response> {
    let doctors = ProfileService::new(state.db.clone(), state.cfg.clone())
        .list_doctors(&actor)
        .await
        .map_err(refuse_to("/dashboard/admin"))?;
    Ok(Json(DoctorsView {
        notice: params.into_notice(),
        doctors,
    }))
}

#[utoipa::path(
    post,
    path = "/admin/add-doctor",
    request_body(content = AddDoctorForm, content_type = "application/x-www-form-urlencoded"),
    responses((status = 303, description = "Redirect to the doctor list with the outcome"))
)]
/// Add a doctor account. New doctors still need approval.
#[axum::debug_handler]
pub async fn add_doctor(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Form(form): Form<AddDoctorForm>,
) -> Response {
    let account = AccountDetails {
        username: form.username,
        password: form.password,
        first_name: form.first_name,
        last_name: form.last_name,
        email: form.email,
    };
    let details = DoctorDetails {
        specialty: form.specialty,
        phone_number: form.phone_number,
    };
    match ProfileService::new(state.db.clone(), state.cfg.clone())
        .add_doctor(&actor, account, details)
        .await
    {
        Ok(identity) => redirect(
            "/admin/doctors",
            Notice::success(format!("Doctor {} added.", identity.username)),
        ),
        Err(e) => refuse("/admin/doctors", e),
    }
}

#[utoipa::path(
    post,
    path = "/admin/add-lab-worker",
    request_body(content = AddLabWorkerForm, content_type = "application/x-www-form-urlencoded"),
    responses((status = 303, description = "Redirect to the admin dashboard with the outcome"))
)]
#[axum::debug_handler]
pub async fn add_lab_worker(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Form(form): Form<AddLabWorkerForm>,
) -> Response {
    let account = AccountDetails {
        username: form.username,
        password: form.password,
        first_name: form.first_name,
        last_name: form.last_name,
        email: form.email,
    };
    let details = LabWorkerDetails {
        department: form.department,
        employee_id: Some(form.employee_id),
    };
    match ProfileService::new(state.db.clone(), state.cfg.clone())
        .add_lab_worker(&actor, account, details)
        .await
    {
        Ok(identity) => redirect(
            "/dashboard/admin",
            Notice::success(format!("Lab worker {} added.", identity.username)),
        ),
        Err(e) => refuse("/dashboard/admin", e),
    }
}

#[utoipa::path(
    post,
    path = "/admin/add-pharmacist",
    request_body(content = AddPharmacistForm, content_type = "application/x-www-form-urlencoded"),
    responses((status = 303, description = "Redirect to the admin dashboard with the outcome"))
)]
#[axum::debug_handler]
pub async fn add_pharmacist(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Form(form): Form<AddPharmacistForm>,
) -> Response {
    let years = validation::parse_optional_count(
        Some(form.years_experience.as_str()),
        "Years of experience",
    );
    let years_experience = match years {
        Ok(years) => years,
        Err(e) => return refuse("/dashboard/admin", e),
    };
    let account = AccountDetails {
        username: form.username,
        password: form.password,
        first_name: form.first_name,
        last_name: form.last_name,
        email: form.email,
    };
    let details = PharmacistDetails {
        license_number: Some(form.license_number),
        years_experience,
    };
    match ProfileService::new(state.db.clone(), state.cfg.clone())
        .add_pharmacist(&actor, account, details)
        .await
    {
        Ok(identity) => redirect(
            "/dashboard/admin",
            Notice::success(format!("Pharmacist {} added.", identity.username)),
        ),
        Err(e) => refuse("/dashboard/admin", e),
    }
}

#[utoipa::path(
    post,
    path = "/admin/doctors/{id}/edit",
    params(("id" = i64, Path, description = "Doctor user id")),
    request_body(content = EditDoctorForm, content_type = "application/x-www-form-urlencoded"),
    responses((status = 303, description = "Redirect to the doctor list with the outcome"))
)]
#[axum::debug_handler]
pub async fn edit_doctor(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    Form(form): Form<EditDoctorForm>,
) -> Response {
    let id = match validation::parse_id(&id, "Doctor") {
        Ok(id) => id,
        Err(e) => return refuse("/admin/doctors", e),
    };
    let update = DoctorUpdate {
        first_name: form.first_name,
        last_name: form.last_name,
        email: form.email,
        specialty: form.specialty,
        phone_number: form.phone_number,
    };
    match ProfileService::new(state.db.clone(), state.cfg.clone())
        .update_doctor(&actor, id, update)
        .await
    {
        Ok(doctor) => redirect(
            "/admin/doctors",
            Notice::success(format!("Doctor {} updated.", doctor.username)),
        ),
        Err(e) => refuse("/admin/doctors", e),
    }
}

#[utoipa::path(
    post,
    path = "/admin/doctors/{id}/delete",
    params(("id" = i64, Path, description = "Doctor user id")),
    responses((status = 303, description = "Redirect to the doctor list with the outcome"))
)]
/// Delete a doctor with their appointments and prescriptions
#[axum::debug_handler]
pub async fn delete_doctor(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Response {
    let id = match validation::parse_id(&id, "Doctor") {
        Ok(id) => id,
        Err(e) => return refuse("/admin/doctors", e),
    };
    match ProfileService::new(state.db.clone(), state.cfg.clone())
        .delete_doctor(&actor, id)
        .await
    {
        Ok(()) => redirect("/admin/doctors", Notice::success("Doctor deleted.")),
        Err(e) => refuse("/admin/doctors", e),
    }
}

#[utoipa::path(
    get,
    path = "/admin/patients",
    params(NoticeParams),
    responses((status = 200, description = "Patients by surname"))
)]
#[axum::debug_handler]
pub async fn patients(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Query(params): Query<NoticeParams>,
) -> Result<Json<PatientsView>, Response> {
    let patients = ProfileService::new(state.db.clone(), state.cfg.clone())
        .list_patients(&actor)
        .await
        .map_err(refuse_to("/dashboard/admin"))?;
    Ok(Json(PatientsView {
        notice: params.into_notice(),
        patients,
    }))
}

// ============================================================================
// Catalog and billing
// ============================================================================

#[utoipa::path(
    get,
    path = "/admin/medicines",
    params(NoticeParams),
    responses((status = 200, description = "Medicines by name"))
)]
#[axum::debug_handler]
pub async fn medicines(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Query(params): Query<NoticeParams>,
) -> Result<Json<MedicinesView>, Response> {
    let medicines = CatalogService::new(state.db.clone())
        .list_medicines(&actor)
        .await
        .map_err(refuse_to("/dashboard/admin"))?;
    Ok(Json(MedicinesView {
        notice: params.into_notice(),
        medicines,
    }))
}

#[utoipa::path(
    post,
    path = "/admin/medicines",
    request_body(content = MedicineForm, content_type = "application/x-www-form-urlencoded"),
    responses((status = 303, description = "Redirect to the medicine list with the outcome"))
)]
#[axum::debug_handler]
pub async fn add_medicine(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Form(form): Form<MedicineForm>,
) -> Response {
    let result = match form.into_new() {
        Ok(new) => {
            CatalogService::new(state.db.clone())
                .add_medicine(&actor, new)
                .await
        }
        Err(e) => Err(e),
    };
    match result {
        Ok(medicine) => redirect(
            "/admin/medicines",
            Notice::success(format!("Medicine {} added.", medicine.name)),
        ),
        Err(e) => refuse("/admin/medicines", e),
    }
}

#[utoipa::path(
    get,
    path = "/admin/lab-tests",
    params(NoticeParams),
    responses((status = 200, description = "Lab tests by name"))
)]
#[axum::debug_handler]
pub async fn lab_tests(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Query(params): Query<NoticeParams>,
) -> Result<Json<LabTestsView>, Response> {
    let lab_tests = CatalogService::new(state.db.clone())
        .list_lab_tests(&actor)
        .await
        .map_err(refuse_to("/dashboard/admin"))?;
    Ok(Json(LabTestsView {
        notice: params.into_notice(),
        lab_tests,
    }))
}

#[utoipa::path(
    post,
    path = "/admin/lab-tests",
    request_body(content = LabTestForm, content_type = "application/x-www-form-urlencoded"),
    responses((status = 303, description = "Redirect to the lab test list with the outcome"))
)]
#[axum::debug_handler]
pub async fn add_lab_test(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Form(form): Form<LabTestForm>,
) -> Response {
    let cost = match Money::parse(&form.cost, "Cost") {
        Ok(cost) => cost,
        Err(e) => return refuse("/admin/lab-tests", e),
    };
    let new = NewLabTest {
        name: form.name,
        description: form.description,
        cost,
    };
    match CatalogService::new(state.db.clone())
        .add_lab_test(&actor, new)
        .await
    {
        Ok(test) => redirect(
            "/admin/lab-tests",
            Notice::success(format!("Lab test {} added.", test.name)),
        ),
        Err(e) => refuse("/admin/lab-tests", e),
    }
}

#[utoipa::path(
    get,
    path = "/admin/invoices",
    params(NoticeParams),
    responses((status = 200, description = "Invoices, newest first"))
)]
#[axum::debug_handler]
pub async fn invoices(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Query(params): Query<NoticeParams>,
) -> Result<Json<InvoicesView>, Response> {
    let invoices = BillingService::new(state.db.clone())
        .list_invoices(&actor)
        .await
        .map_err(refuse_to("/dashboard/admin"))?;
    Ok(Json(InvoicesView {
        notice: params.into_notice(),
        invoices,
    }))
}

#[utoipa::path(
    post,
    path = "/admin/create-invoice",
    request_body(content = InvoiceForm, content_type = "application/x-www-form-urlencoded"),
    responses((status = 303, description = "Redirect to the invoice list with the outcome"))
)]
/// Issue a pending invoice to a patient, dated today
#[axum::debug_handler]
pub async fn create_invoice(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Form(form): Form<InvoiceForm>,
) -> Response {
    let result = match form.into_new() {
        Ok(new) => {
            BillingService::new(state.db.clone())
                .create_invoice(&actor, new, Utc::now().date_naive())
                .await
        }
        Err(e) => Err(e),
    };
    match result {
        Ok(invoice) => redirect(
            "/admin/invoices",
            Notice::success(format!(
                "Invoice #{} for {} created.",
                invoice.id, invoice.total_amount
            )),
        ),
        Err(e) => refuse("/admin/invoices", e),
    }
}

#[utoipa::path(
    get,
    path = "/admin/reports/appointments",
    responses((status = 200, description = "Appointment counts by status"))
)]
#[axum::debug_handler]
pub async fn appointment_report(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<ReportView>, Response> {
    let appointments = BillingService::new(state.db.clone())
        .appointment_report(&actor)
        .await
        .map_err(refuse_to("/dashboard/admin"))?;
    Ok(Json(ReportView { appointments }))
}

// ============================================================================
// Shop stock
// ============================================================================

#[utoipa::path(
    post,
    path = "/admin/categories",
    request_body(content = CategoryForm, content_type = "application/x-www-form-urlencoded"),
    responses((status = 303, description = "Redirect to the shop with the outcome"))
)]
#[axum::debug_handler]
pub async fn add_category(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Form(form): Form<CategoryForm>,
) -> Response {
    match CommerceService::new(state.db.clone())
        .add_category(&actor, &form.name, &form.description)
        .await
    {
        Ok(category) => redirect(
            "/shop",
            Notice::success(format!("Category {} added.", category.name)),
        ),
        Err(e) => refuse("/dashboard/admin", e),
    }
}

#[utoipa::path(
    post,
    path = "/admin/products",
    request_body(content = ProductForm, content_type = "application/x-www-form-urlencoded"),
    responses((status = 303, description = "Redirect to the shop with the outcome"))
)]
#[axum::debug_handler]
pub async fn add_product(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Form(form): Form<ProductForm>,
) -> Response {
    let result = match form.into_new() {
        Ok(new) => {
            CommerceService::new(state.db.clone())
                .add_product(&actor, new)
                .await
        }
        Err(e) => Err(e),
    };
    match result {
        Ok(product) => redirect(
            "/shop",
            Notice::success(format!("Product {} added.", product.name)),
        ),
        Err(e) => refuse("/dashboard/admin", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hms_core::HmsError;

    #[test]
    fn blank_counts_default_to_zero() {
        assert_eq!(count("", "Stock").unwrap(), 0);
        assert_eq!(count("12", "Stock").unwrap(), 12);
        assert!(matches!(count("x", "Stock"), Err(HmsError::Validation(_))));
        assert_eq!(optional_id(" ", "Category").unwrap(), None);
    }
}
