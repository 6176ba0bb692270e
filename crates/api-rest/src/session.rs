//! Login, logout, registration and password changes.

use crate::guards::{current_actor, session_token};
use crate::outcome::{redirect, refuse};
use crate::AppState;
use api_shared::{auth, Notice, NoticeParams};
use axum::extract::{Extension, Query, RawQuery, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Redirect, Response};
use axum::Form;
use hms_core::repositories::identity::IdentityService;
use hms_core::repositories::profiles::{AccountDetails, DoctorDetails, ProfileService};
use hms_core::repositories::sessions::SessionService;
use hms_core::{Actor, HmsError, Role, UserId};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct RegisterForm {
    pub username: String,
    pub password: String,
    pub confirm_password: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct DoctorRegisterForm {
    pub username: String,
    pub password: String,
    pub confirm_password: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub specialty: String,
    pub phone_number: String,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct ChangePasswordForm {
    pub old_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginView {
    pub notice: Option<Notice>,
}

fn dashboard_path(role: Role) -> String {
    format!("/dashboard/{}", role.slug())
}

fn matching_passwords(password: &str, confirm: &str) -> Result<(), HmsError> {
    if password == confirm {
        Ok(())
    } else {
        Err(HmsError::Validation(
            "The two password fields didn't match.".into(),
        ))
    }
}

/// Opens a session and redirects to the user's dashboard with the session cookie set.
async fn sign_in(state: &AppState, user_id: UserId, role: Role, notice: Notice) -> Response {
    match SessionService::new(state.db.clone()).open(user_id).await {
        Ok(token) => {
            let mut response = redirect(&dashboard_path(role), notice);
            match auth::session_cookie(&token).parse() {
                Ok(cookie) => {
                    response.headers_mut().insert(header::SET_COOKIE, cookie);
                    response
                }
                Err(e) => {
                    tracing::error!("invalid session cookie value: {:?}", e);
                    StatusCode::INTERNAL_SERVER_ERROR.into_response()
                }
            }
        }
        Err(e) => refuse("/login", e),
    }
}

#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 303, description = "Redirect to the caller's dashboard, or to /login")
    )
)]
/// Home: sends signed-in users to their dashboard
///
/// Any notice on the query string is carried along to the target.
#[axum::debug_handler]
pub async fn home(
    State(state): State<AppState>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> Response {
    let target = match current_actor(&state, &headers).await {
        Ok(Some(actor)) => dashboard_path(actor.role),
        Ok(None) => "/login".to_string(),
        Err(e) => return refuse("/login", e),
    };
    match query {
        Some(q) if !q.is_empty() => Redirect::to(&format!("{target}?{q}")).into_response(),
        _ => Redirect::to(&target).into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/login",
    params(NoticeParams),
    responses((status = 200, description = "Login view"))
)]
#[axum::debug_handler]
pub async fn login_view(Query(params): Query<NoticeParams>) -> Json<LoginView> {
    Json(LoginView {
        notice: params.into_notice(),
    })
}

#[utoipa::path(
    post,
    path = "/login",
    request_body(content = LoginForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Redirect to the dashboard with a session cookie, or back to /login with an error notice")
    )
)]
/// Authenticate and open a session
///
/// Doctors whose profile is not yet approved are refused even with valid credentials.
#[axum::debug_handler]
pub async fn login(State(state): State<AppState>, Form(form): Form<LoginForm>) -> Response {
    let identities = IdentityService::new(state.db.clone(), state.cfg.clone());
    match identities.authenticate(&form.username, &form.password).await {
        Ok(identity) => {
            tracing::info!(user_id = identity.id, role = ?identity.role, "signed in");
            sign_in(
                &state,
                identity.id,
                identity.role,
                Notice::success(format!("Welcome back, {}.", identity.display_name())),
            )
            .await
        }
        Err(e) => refuse("/login", e),
    }
}

#[utoipa::path(
    post,
    path = "/logout",
    responses((status = 303, description = "Session closed; redirect to /login"))
)]
#[axum::debug_handler]
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(token) = session_token(&headers) {
        if let Err(e) = SessionService::new(state.db.clone()).close(&token).await {
            tracing::error!("failed to close session: {:?}", e);
        }
    }
    let mut response = redirect("/login", Notice::success("You have been logged out."));
    if let Ok(cookie) = auth::clear_session_cookie().parse() {
        response.headers_mut().insert(header::SET_COOKIE, cookie);
    }
    response
}

#[utoipa::path(
    post,
    path = "/register",
    request_body(content = RegisterForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Patient registered and signed in, or redirect to /login with an error notice")
    )
)]
/// Patient self-registration
///
/// Creates the identity and an empty patient profile, then signs the new patient in.
#[axum::debug_handler]
pub async fn register(State(state): State<AppState>, Form(form): Form<RegisterForm>) -> Response {
    if let Err(e) = matching_passwords(&form.password, &form.confirm_password) {
        return refuse("/login", e);
    }
    let account = AccountDetails {
        username: form.username,
        password: form.password,
        first_name: form.first_name,
        last_name: form.last_name,
        email: form.email,
    };
    let profiles = ProfileService::new(state.db.clone(), state.cfg.clone());
    match profiles.register_patient(account).await {
        Ok(identity) => {
            sign_in(
                &state,
                identity.id,
                Role::Patient,
                Notice::success("Registration successful."),
            )
            .await
        }
        Err(e) => refuse("/login", e),
    }
}

#[utoipa::path(
    post,
    path = "/register/doctor",
    request_body(content = DoctorRegisterForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Doctor registered, pending approval; redirect to /login")
    )
)]
/// Doctor self-registration
///
/// The new doctor cannot sign in until an admin approves the profile.
#[axum::debug_handler]
pub async fn register_doctor(
    State(state): State<AppState>,
    Form(form): Form<DoctorRegisterForm>,
) -> Response {
    if let Err(e) = matching_passwords(&form.password, &form.confirm_password) {
        return refuse("/login", e);
    }
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
    let profiles = ProfileService::new(state.db.clone(), state.cfg.clone());
    match profiles.register_doctor(account, details).await {
        Ok(_) => redirect(
            "/login",
            Notice::success("Registration successful. Your account is pending admin approval."),
        ),
        Err(e) => refuse("/login", e),
    }
}

#[utoipa::path(
    post,
    path = "/change-password",
    request_body(content = ChangePasswordForm, content_type = "application/x-www-form-urlencoded"),
    responses((status = 303, description = "Redirect home with the outcome"))
)]
#[axum::debug_handler]
pub async fn change_password(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Form(form): Form<ChangePasswordForm>,
) -> Response {
    let identities = IdentityService::new(state.db.clone(), state.cfg.clone());
    match identities
        .change_password(
            &actor,
            &form.old_password,
            &form.new_password,
            &form.confirm_password,
        )
        .await
    {
        Ok(()) => redirect(
            "/",
            Notice::success("Your password was successfully updated!"),
        ),
        Err(e) => refuse("/", e),
    }
}
