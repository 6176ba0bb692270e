//! Turning core results into HTTP responses.
//!
//! Every mutating endpoint answers `303 See Other`. Success and failure differ only in the
//! notice attached to the target and in where the target points.

use api_shared::Notice;
use axum::response::{IntoResponse, Redirect, Response};
use hms_core::HmsError;

/// Redirects to `to` carrying `notice`.
pub(crate) fn redirect(to: &str, notice: Notice) -> Response {
    Redirect::to(&notice.attach_to(to)).into_response()
}

/// Redirects back to `back` with the error's user-facing message.
///
/// Internal errors are logged with their detail; the user sees a generic message.
pub(crate) fn refuse(back: &str, err: HmsError) -> Response {
    if err.is_internal() {
        tracing::error!("request failed: {:?}", err);
    } else {
        tracing::debug!("request refused: {}", err);
    }
    redirect(back, Notice::error(err.user_message()))
}

/// Shorthand for handlers returning `Result<_, Response>`.
pub(crate) fn refuse_to(back: &'static str) -> impl Fn(HmsError) -> Response {
    move |err| refuse(back, err)
}
