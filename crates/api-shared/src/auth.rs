//! Session cookie handling.
//!
//! The session token is an opaque string issued by the core session store. It travels in a
//! single `HttpOnly` cookie named [`SESSION_COOKIE`].

/// Name of the cookie carrying the session token.
pub const SESSION_COOKIE: &str = "hms_session";

/// Extracts the session token from a `Cookie` request header value.
///
/// Returns `None` when the cookie is absent or empty.
pub fn session_token(cookie_header: &str) -> Option<&str> {
    cookie_header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim_matches('"'))
        .filter(|value| !value.is_empty())
}

/// `Set-Cookie` value that stores `token` for the whole site.
pub fn session_cookie(token: &str) -> String {
    format!("{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax")
}

/// `Set-Cookie` value that removes the session cookie.
pub fn clear_session_cookie() -> String {
    format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}
