//! Security response headers.
//!
//! Static header injection applied to every response, independent of the
//! defense checks. HSTS is only meaningful over HTTPS, so it is sent
//! only when the listener terminates TLS.

use axum::{
    body::Body,
    extract::State,
    http::{HeaderValue, Request},
    middleware::Next,
    response::Response,
};

use crate::http::server::AppState;

pub async fn security_headers_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;
    let config = &state.config.security;
    if !config.enable_headers {
        return response;
    }

    let headers = response.headers_mut();
    headers.insert("x-content-type-options", HeaderValue::from_static("nosniff"));
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    if let Ok(value) = HeaderValue::from_str(&config.content_security_policy) {
        headers.insert("content-security-policy", value);
    }
    if let Ok(value) = HeaderValue::from_str(&config.referrer_policy) {
        headers.insert("referrer-policy", value);
    }
    if state.tls_enabled && config.hsts_max_age_secs > 0 {
        let hsts = format!("max-age={}; includeSubDomains", config.hsts_max_age_secs);
        if let Ok(value) = HeaderValue::from_str(&hsts) {
            headers.insert("strict-transport-security", value);
        }
    }

    response
}
