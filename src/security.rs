use axum::http::{header, HeaderMap};
use subtle::ConstantTimeEq;

/// Header carrying the admin key, as an alternative to `Authorization: Bearer`.
pub const ADMIN_KEY_HEADER: &str = "x-admin-key";

/// Constant-time string comparison to prevent timing attacks
pub fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Whether `headers` present the configured admin key.
///
/// With no key configured every request is refused.
pub fn is_admin(headers: &HeaderMap, admin_key: Option<&str>) -> bool {
    let Some(expected) = admin_key else {
        return false;
    };

    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    let presented = bearer.or_else(|| {
        headers
            .get(ADMIN_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
    });

    presented.is_some_and(|key| constant_time_compare(key.trim(), expected))
}
