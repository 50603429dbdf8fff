use super::{key_for, ShareMeta, ShareRecord, NAMESPACE};
use crate::error::{AppError, AppResult, LoggedJson};
use crate::ids;
use crate::state::AppState;
use crate::token_coordinator::TokenStatus;
use crate::validate::{check_payload_size, clamp_ttl};
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateShareRequest {
    pub recipient: String,
    pub cipher: String,
    #[serde(default)]
    pub cmp: Option<String>,
    #[serde(default)]
    pub alg: Option<String>,
    #[serde(default)]
    pub meta: Option<ShareMeta>,
    #[serde(default)]
    pub ttl_sec: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateShareResponse {
    pub token: String,
    pub share_url: String,
    pub expires_at: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareView {
    pub token: String,
    pub cipher: String,
    pub alg: String,
    pub cmp: Option<String>,
    pub meta: ShareMeta,
}

fn default_alg() -> String {
    "ecdh-hkdf-aesgcm".to_string()
}

/// Falls back to the request's `Origin` header, or `X-Forwarded-Proto` +
/// `Host`, when `BASE_URL` isn't configured (§6: "if unset, derive from
/// request origin").
fn derive_base_url(headers: &HeaderMap) -> Option<String> {
    if let Some(origin) = headers.get(header::ORIGIN).and_then(|v| v.to_str().ok()) {
        return Some(origin.trim_end_matches('/').to_string());
    }
    let host = headers.get(header::HOST).and_then(|v| v.to_str().ok())?;
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("https");
    Some(format!("{scheme}://{host}"))
}

/// `POST /v1/shares`
pub async fn create_share(
    State(state): State<AppState>,
    headers: HeaderMap,
    LoggedJson(input): LoggedJson<CreateShareRequest>,
) -> AppResult<(StatusCode, Json<CreateShareResponse>)> {
    crate::identity::validate_username(&input.recipient)?;
    check_payload_size(&input.cipher, state.config.shares.max_payload_bytes)?;

    if state.directory.get(&input.recipient).await?.is_none() {
        return Err(AppError::NotFound("recipient not found".to_string()));
    }

    let ttl_secs = clamp_ttl(
        input.ttl_sec,
        state.config.shares.default_ttl_secs,
        state.config.shares.max_ttl_secs,
    );
    let ttl = Duration::from_secs(ttl_secs);

    let token = ids::share_token();
    let expires_at = chrono::Utc::now() + chrono::Duration::seconds(ttl_secs as i64);
    let expires_at = expires_at.to_rfc3339();

    let record = ShareRecord {
        cipher: input.cipher,
        alg: input.alg.unwrap_or_else(default_alg),
        cmp: input.cmp,
        meta: input.meta.unwrap_or_default(),
    };

    state
        .kv
        .put(NAMESPACE, key_for(&token), &record, Some(ttl))
        .await?;

    state
        .tokens
        .init(token.clone(), input.recipient.clone(), ttl)
        .await?;

    let base = state
        .config
        .shares
        .base_url
        .clone()
        .filter(|b| !b.is_empty())
        .or_else(|| derive_base_url(&headers))
        .unwrap_or_default();
    let share_url = format!("{base}/session/{token}");

    Ok((
        StatusCode::CREATED,
        Json(CreateShareResponse {
            token,
            share_url,
            expires_at,
        }),
    ))
}

/// `GET /v1/shares/:token`
pub async fn get_share(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> AppResult<Json<ShareView>> {
    match state.tokens.status(token.clone()).await? {
        TokenStatus::Unknown => return Err(AppError::NotFound("unknown token".to_string())),
        TokenStatus::Consumed => return Err(AppError::Gone("token already consumed".to_string())),
        TokenStatus::Live { .. } => {}
    }

    let record: ShareRecord = state
        .kv
        .get(NAMESPACE, key_for(&token))
        .await?
        .ok_or_else(|| AppError::NotFound("share payload expired".to_string()))?;

    Ok(Json(ShareView {
        token,
        cipher: record.cipher,
        alg: record.alg,
        cmp: record.cmp,
        meta: record.meta,
    }))
}

/// `POST /v1/shares/:token/consume`
pub async fn consume_share(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> AppResult<StatusCode> {
    let consumed = state.tokens.consume(token.clone()).await?;
    if !consumed {
        return match state.tokens.status(token.clone()).await? {
            TokenStatus::Unknown => Err(AppError::NotFound("unknown token".to_string())),
            _ => Err(AppError::Gone("token already consumed".to_string())),
        };
    }

    state.kv.delete(NAMESPACE, key_for(&token)).await?;
    Ok(StatusCode::NO_CONTENT)
}
