//! CORS and the handful of routes that aren't a JSON channel: the share
//! landing page and the generic not-found fallback (§4.6, §6).

use crate::state::AppState;
use axum::extract::{Request, State};
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// Echoes `Origin` with credentials when the configured allowlist permits
/// it, per §6: a wildcard entry echoes whatever Origin was sent (never a
/// literal `*`, since that cannot be combined with credentials); an exact
/// match echoes that origin; anything else gets no CORS headers at all.
/// Also answers every `OPTIONS` preflight with 204 directly, so it never
/// reaches route matching.
pub async fn cors_middleware(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let origin = req
        .headers()
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());

    let allowed = &state.config.cors.allowed_origins;
    let wildcard = allowed.iter().any(|o| o == "*");
    let allowed_origin = if wildcard {
        Some(origin.clone().unwrap_or_else(|| "*".to_string()))
    } else {
        match &origin {
            Some(o) if allowed.iter().any(|a| a == o) => Some(o.clone()),
            _ => None,
        }
    };

    if req.method() == Method::OPTIONS {
        let requested_headers = req
            .headers()
            .get(header::ACCESS_CONTROL_REQUEST_HEADERS)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
            .unwrap_or_else(|| "content-type".to_string());

        let mut resp = StatusCode::NO_CONTENT.into_response();
        let headers = resp.headers_mut();
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static("GET,POST,OPTIONS"),
        );
        if let Ok(v) = HeaderValue::from_str(&requested_headers) {
            headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, v);
        }
        apply_origin_headers(headers, allowed_origin.as_deref());
        return resp;
    }

    let mut resp = next.run(req).await;
    if resp.status() == StatusCode::METHOD_NOT_ALLOWED {
        resp = (
            StatusCode::METHOD_NOT_ALLOWED,
            Json(json!({ "error": "method not allowed" })),
        )
            .into_response();
    }
    apply_origin_headers(resp.headers_mut(), allowed_origin.as_deref());
    resp
}

fn apply_origin_headers(headers: &mut axum::http::HeaderMap, origin: Option<&str>) {
    let Some(origin) = origin else { return };
    if let Ok(v) = HeaderValue::from_str(origin) {
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, v);
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
            HeaderValue::from_static("true"),
        );
    }
}

/// `GET /session/<token>`. The extension intercepts navigation to this
/// path; the server's only job is to hand back a page that contains a
/// hint, never to inspect the token.
pub async fn session_landing_page(
    axum::extract::Path(token): axum::extract::Path<String>,
) -> Html<String> {
    let hint: String = token.chars().take(8).collect();
    Html(format!(
        "<!doctype html>\n<html><head><title>handoff</title></head>\n\
         <body><p>Session link received (token starts with <code>{hint}</code>).</p>\n\
         <p>Open this link in the browser extension to continue.</p></body></html>\n"
    ))
}

/// Catch-all for unmatched paths.
pub async fn not_found() -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "not found" }))).into_response()
}
