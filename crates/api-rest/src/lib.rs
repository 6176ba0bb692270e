//! # API REST
//!
//! HTTP surface of the HMS portal.
//!
//! Handles:
//! - HTTP endpoints with axum, grouped by the role that may call them
//! - Session cookies and role guards
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (form decoding, redirects with notices, CORS, request tracing)
//!
//! Business rules live in `hms-core`; handlers only translate between HTTP and core calls.

#![warn(rust_2018_idioms)]

pub mod admin;
pub mod chat;
pub mod doctor;
mod guards;
mod outcome;
pub mod patient;
pub mod session;
pub mod shop;
pub mod staff;

use api_shared::{HealthRes, HealthService, Notice, NoticeLevel};
use axum::middleware;
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use hms_core::{CoreConfig, Database};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Application state shared across handlers.
///
/// Services are cheap to build, so handlers construct the ones they need from these per request.
#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<CoreConfig>,
    pub db: Database,
}

impl AppState {
    pub fn new(cfg: Arc<CoreConfig>, db: Database) -> Self {
        Self { cfg, db }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        session::home,
        session::login_view,
        session::login,
        session::logout,
        session::register,
        session::register_doctor,
        session::change_password,
        patient::dashboard,
        patient::profile_view,
        patient::update_profile,
        patient::booking_view,
        patient::book,
        patient::my_appointments,
        patient::my_prescriptions,
        doctor::dashboard,
        doctor::appointments,
        doctor::approve,
        doctor::reject,
        doctor::prescription_context,
        doctor::create_prescription,
        admin::dashboard,
        admin::pending_doctors,
        admin::approve_doctor,
        admin::reject_doctor,
        admin::doctors,
        admin::add_doctor,
        admin::add_lab_worker,
        admin::add_pharmacist,
        admin::edit_doctor,
        admin::delete_doctor,
        admin::patients,
        admin::medicines,
        admin::add_medicine,
        admin::lab_tests,
        admin::add_lab_test,
        admin::invoices,
        admin::create_invoice,
        admin::appointment_report,
        admin::add_category,
        admin::add_product,
        staff::lab_worker_dashboard,
        staff::pharmacist_dashboard,
        shop::shop,
        shop::add_to_cart,
        shop::cart,
        shop::remove_from_cart,
        shop::checkout_summary,
        shop::checkout,
        shop::my_orders,
        shop::order_details,
        chat::start_view,
        chat::start,
        chat::list,
        chat::conversation,
        chat::post_message,
    ),
    components(schemas(
        HealthRes,
        Notice,
        NoticeLevel,
        session::LoginForm,
        session::RegisterForm,
        session::DoctorRegisterForm,
        session::ChangePasswordForm,
        patient::ProfileForm,
        patient::BookForm,
        doctor::PrescriptionForm,
        admin::AddDoctorForm,
        admin::AddLabWorkerForm,
        admin::AddPharmacistForm,
        admin::EditDoctorForm,
        admin::MedicineForm,
        admin::LabTestForm,
        admin::InvoiceForm,
        admin::CategoryForm,
        admin::ProductForm,
        chat::StartChatForm,
        chat::MessageForm,
    ))
)]
pub struct ApiDoc;

/// Builds the full portal router: every route group behind its guard, Swagger UI, CORS and
/// request tracing.
pub fn router(state: AppState) -> Router {
    let public = Router::new()
        .route("/health", get(health))
        .route("/", get(session::home))
        .route("/login", get(session::login_view).post(session::login))
        .route("/logout", post(session::logout))
        .route("/register", post(session::register))
        .route("/register/doctor", post(session::register_doctor))
        .route("/shop", get(shop::shop));

    let authenticated = Router::new()
        .route("/change-password", post(session::change_password))
        .route("/add-to-cart/:id", post(shop::add_to_cart))
        .route("/cart", get(shop::cart))
        .route("/remove-from-cart/:id", post(shop::remove_from_cart))
        .route("/checkout", get(shop::checkout_summary).post(shop::checkout))
        .route("/my-orders", get(shop::my_orders))
        .route("/order-details/:id", get(shop::order_details))
        .route("/chat/start", get(chat::start_view).post(chat::start))
        .route("/chat/list", get(chat::list))
        .route("/chat/:id", get(chat::conversation).post(chat::post_message))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            guards::require_authenticated,
        ));

    let patient = Router::new()
        .route("/dashboard/patient", get(patient::dashboard))
        .route(
            "/profile",
            get(patient::profile_view).post(patient::update_profile),
        )
        .route(
            "/book-appointment",
            get(patient::booking_view).post(patient::book),
        )
        .route("/my-appointments", get(patient::my_appointments))
        .route("/my-prescriptions", get(patient::my_prescriptions))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            guards::require_patient,
        ));

    let doctor = Router::new()
        .route("/dashboard/doctor", get(doctor::dashboard))
        .route("/doctor/appointments", get(doctor::appointments))
        .route(
            "/approve-appointment/:id",
            get(doctor::approve).post(doctor::approve),
        )
        .route(
            "/reject-appointment/:id",
            get(doctor::reject).post(doctor::reject),
        )
        .route(
            "/create-prescription/:id",
            get(doctor::prescription_context).post(doctor::create_prescription),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            guards::require_doctor,
        ));

    let admin = Router::new()
        .route("/dashboard/admin", get(admin::dashboard))
        .route("/admin/pending-doctors", get(admin::pending_doctors))
        .route(
            "/admin/approve-doctor/:id",
            get(admin::approve_doctor).post(admin::approve_doctor),
        )
        .route(
            "/admin/reject-doctor/:id",
            get(admin::reject_doctor).post(admin::reject_doctor),
        )
        .route("/admin/doctors", get(admin::doctors))
        .route("/admin/add-doctor", post(admin::add_doctor))
        .route("/admin/add-lab-worker", post(admin::add_lab_worker))
        .route("/admin/add-pharmacist", post(admin::add_pharmacist))
        .route("/admin/doctors/:id/edit", post(admin::edit_doctor))
        .route("/admin/doctors/:id/delete", post(admin::delete_doctor))
        .route("/admin/patients", get(admin::patients))
        .route(
            "/admin/medicines",
            get(admin::medicines).post(admin::add_medicine),
        )
        .route(
            "/admin/lab-tests",
            get(admin::lab_tests).post(admin::add_lab_test),
        )
        .route("/admin/invoices", get(admin::invoices))
        .route("/admin/create-invoice", post(admin::create_invoice))
        .route("/admin/reports/appointments", get(admin::appointment_report))
        .route("/admin/categories", post(admin::add_category))
        .route("/admin/products", post(admin::add_product))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            guards::require_admin,
        ));

    let lab_worker = Router::new()
        .route("/dashboard/labworker", get(staff::lab_worker_dashboard))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            guards::require_lab_worker,
        ));

    let pharmacist = Router::new()
        .route("/dashboard/pharmacist", get(staff::pharmacist_dashboard))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            guards::require_pharmacist,
        ));

    Router::new()
        .merge(public)
        .merge(authenticated)
        .merge(patient)
        .merge(doctor)
        .merge(admin)
        .merge(lab_worker)
        .merge(pharmacist)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint
///
/// Used for monitoring and load balancer health checks. Touches no storage.
pub async fn health() -> Json<HealthRes> {
    Json(HealthService::check_health())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, Response, StatusCode};
    use hms_core::repositories::identity::{IdentityService, NewIdentity};
    use hms_core::repositories::profiles::{AccountDetails, DoctorDetails, ProfileService};
    use hms_core::Role;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    const PASSWORD: &str = "password123";

    async fn state() -> AppState {
        let db = Database::connect_in_memory()
            .await
            .expect("in-memory database should open");
        AppState::new(Arc::new(CoreConfig::in_memory()), db)
    }

    async fn send(state: &AppState, request: Request<Body>) -> Response<Body> {
        router(state.clone())
            .oneshot(request)
            .await
            .expect("router is infallible")
    }

    fn get_with(uri: &str, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::empty()).unwrap()
    }

    fn post_form(uri: &str, body: &str, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn location(response: &Response<Body>) -> String {
        response
            .headers()
            .get(header::LOCATION)
            .expect("redirect should carry a location")
            .to_str()
            .unwrap()
            .to_string()
    }

    /// `name=value` pair from the session `Set-Cookie` header.
    fn session_cookie(response: &Response<Body>) -> String {
        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .expect("sign-in should set a cookie")
            .to_str()
            .unwrap();
        set_cookie.split(';').next().unwrap().to_string()
    }

    async fn register_patient(state: &AppState, username: &str) -> String {
        let body = format!(
            "username={username}&password={PASSWORD}&confirm_password={PASSWORD}\
             &first_name=Pat&last_name=Ient&email={username}%40example.com"
        );
        let response = send(state, post_form("/register", &body, None)).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert!(location(&response).starts_with("/dashboard/patient"));
        session_cookie(&response)
    }

    async fn approved_doctor(state: &AppState, username: &str) -> i64 {
        let admin = IdentityService::new(state.db.clone(), state.cfg.clone())
            .create(NewIdentity {
                username: format!("admin_{username}"),
                password: PASSWORD.into(),
                first_name: String::new(),
                last_name: String::new(),
                email: String::new(),
                role: Role::Admin,
            })
            .await
            .unwrap();
        let profiles = ProfileService::new(state.db.clone(), state.cfg.clone());
        let doctor = profiles
            .register_doctor(
                AccountDetails {
                    username: username.into(),
                    password: PASSWORD.into(),
                    ..AccountDetails::default()
                },
                DoctorDetails {
                    specialty: "Cardiology".into(),
                    phone_number: String::new(),
                },
            )
            .await
            .unwrap();
        profiles
            .approve_doctor(&admin.actor(), doctor.id)
            .await
            .unwrap();
        doctor.id
    }

    #[tokio::test]
    async fn health_answers_without_a_session() {
        let state = state().await;
        let response = send(&state, get_with("/health", None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["ok"], true);
    }

    #[tokio::test]
    async fn guarded_pages_send_anonymous_users_to_login() {
        let state = state().await;
        for uri in ["/dashboard/patient", "/cart", "/admin/doctors", "/chat/list"] {
            let response = send(&state, get_with(uri, None)).await;
            assert_eq!(response.status(), StatusCode::SEE_OTHER, "{uri}");
            assert_eq!(location(&response), "/login", "{uri}");
        }
    }

    #[tokio::test]
    async fn registered_patient_reaches_their_dashboard() {
        let state = state().await;
        let cookie = register_patient(&state, "alice").await;

        let response = send(&state, get_with("/dashboard/patient", Some(&cookie))).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["profile"]["username"], "alice");

        let home = send(&state, get_with("/", Some(&cookie))).await;
        assert_eq!(location(&home), "/dashboard/patient");
    }

    #[tokio::test]
    async fn wrong_role_is_sent_home_with_an_error() {
        let state = state().await;
        let cookie = register_patient(&state, "bob").await;

        let response = send(&state, get_with("/dashboard/admin", Some(&cookie))).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let target = location(&response);
        assert!(target.starts_with("/?level=error"), "{target}");
        assert!(target.contains("logged+in+as+Admin"), "{target}");
    }

    #[tokio::test]
    async fn second_booking_of_a_slot_is_refused() {
        let state = state().await;
        let doctor_id = approved_doctor(&state, "drwho").await;
        let first = register_patient(&state, "p1").await;
        let second = register_patient(&state, "p2").await;
        let body = format!(
            "doctor_id={doctor_id}&appointment_date=2030-01-01&appointment_time=10:00&reason=Checkup"
        );

        let response = send(&state, post_form("/book-appointment", &body, Some(&first))).await;
        assert!(location(&response).starts_with("/my-appointments?level=success"));

        let response = send(&state, post_form("/book-appointment", &body, Some(&second))).await;
        let target = location(&response);
        assert!(target.starts_with("/book-appointment?level=error"), "{target}");
        assert!(target.contains("already+taken"), "{target}");
    }

    #[tokio::test]
    async fn booking_without_a_doctor_redirects_with_an_error() {
        let state = state().await;
        let cookie = register_patient(&state, "erin").await;
        let body = "doctor_id=&appointment_date=2030-01-01&appointment_time=10:00&reason=x";

        let response = send(&state, post_form("/book-appointment", body, Some(&cookie))).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let target = location(&response);
        assert!(target.starts_with("/book-appointment?level=error"), "{target}");
        assert!(target.contains("select+a+doctor"), "{target}");
    }

    #[tokio::test]
    async fn malformed_ids_in_paths_redirect_with_an_error() {
        let state = state().await;
        let cookie = register_patient(&state, "frank").await;

        let response = send(&state, get_with("/order-details/abc", Some(&cookie))).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert!(location(&response).starts_with("/my-orders?level=error"));

        let response = send(&state, post_form("/add-to-cart/x1", "", Some(&cookie))).await;
        assert!(location(&response).starts_with("/shop?level=error"));
    }

    #[tokio::test]
    async fn unknown_notice_level_still_renders() {
        let state = state().await;
        let cookie = register_patient(&state, "gina").await;

        let response = send(
            &state,
            get_with("/dashboard/patient?level=warn&notice=hi", Some(&cookie)),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["notice"]["level"], "success");
        assert_eq!(json["notice"]["message"], "hi");
    }

    #[tokio::test]
    async fn pending_doctor_cannot_sign_in() {
        let state = state().await;
        let body = format!(
            "username=drnew&password={PASSWORD}&confirm_password={PASSWORD}\
             &first_name=New&last_name=Doc&email=&specialty=GP&phone_number="
        );
        let response = send(&state, post_form("/register/doctor", &body, None)).await;
        assert!(location(&response).starts_with("/login?level=success"));

        let login = format!("username=drnew&password={PASSWORD}");
        let response = send(&state, post_form("/login", &login, None)).await;
        let target = location(&response);
        assert!(target.starts_with("/login?level=error"), "{target}");
        assert!(target.contains("pending+admin+approval"), "{target}");
        assert!(response.headers().get(header::SET_COOKIE).is_none());
    }

    #[tokio::test]
    async fn checkout_of_an_empty_cart_is_refused() {
        let state = state().await;
        let cookie = register_patient(&state, "carol").await;

        let response = send(&state, post_form("/checkout", "", Some(&cookie))).await;
        let target = location(&response);
        assert!(target.starts_with("/cart?level=error"), "{target}");
        assert!(target.contains("cart+is+empty"), "{target}");
    }

    #[tokio::test]
    async fn logout_clears_the_session() {
        let state = state().await;
        let cookie = register_patient(&state, "dave").await;

        let response = send(&state, post_form("/logout", "", Some(&cookie))).await;
        assert_eq!(location(&response), "/login?level=success&notice=You+have+been+logged+out.");

        let response = send(&state, get_with("/dashboard/patient", Some(&cookie))).await;
        assert_eq!(location(&response), "/login");
    }
}
