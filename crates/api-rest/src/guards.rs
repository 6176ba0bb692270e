//! Access guards.
//!
//! One middleware per role group. Each resolves the session cookie to an [`Actor`] and either
//! inserts it into the request extensions for the handler, or short-circuits with a redirect:
//! - no valid session: to `/login`,
//! - wrong role: home, with an error notice.

use crate::outcome::redirect;
use crate::AppState;
use api_shared::{auth, Notice};
use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use hms_core::repositories::sessions::SessionService;
use hms_core::{Actor, HmsResult, Role};

/// Reads the session token from the `Cookie` headers, if any.
pub(crate) fn session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(auth::session_token)
        .map(str::to_string)
}

/// Resolves the request's session to an actor. No cookie or an unknown token gives `None`.
pub(crate) async fn current_actor(state: &AppState, headers: &HeaderMap) -> HmsResult<Option<Actor>> {
    match session_token(headers) {
        Some(token) => SessionService::new(state.db.clone()).resolve(&token).await,
        None => Ok(None),
    }
}

async fn guard(state: &AppState, role: Option<Role>, mut request: Request, next: Next) -> Response {
    let actor = match current_actor(state, request.headers()).await {
        Ok(Some(actor)) => actor,
        Ok(None) => return Redirect::to("/login").into_response(),
        Err(e) => {
            tracing::error!("session lookup failed: {:?}", e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    if let Some(role) = role {
        if !actor.is(role) {
            tracing::info!(
                user_id = actor.user_id,
                required = %role,
                path = %request.uri().path(),
                "refused by role guard"
            );
            return redirect(
                "/",
                Notice::error(format!("You must be logged in as {} to view this page.", role)),
            );
        }
    }

    request.extensions_mut().insert(actor);
    next.run(request).await
}

pub async fn require_authenticated(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    guard(&state, None, request, next).await
}

pub async fn require_admin(State(state): State<AppState>, request: Request, next: Next) -> Response {
    guard(&state, Some(Role::Admin), request, next).await
}

pub async fn require_doctor(State(state): State<AppState>, request: Request, next: Next) -> Response {
    guard(&state, Some(Role::Doctor), request, next).await
}

pub async fn require_patient(State(state): State<AppState>, request: Request, next: Next) -> Response {
    guard(&state, Some(Role::Patient), request, next).await
}

pub async fn require_lab_worker(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    guard(&state, Some(Role::LabWorker), request, next).await
}

pub async fn require_pharmacist(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    guard(&state, Some(Role::Pharmacist), request, next).await
}
