use super::{validate_username, RegisterOutcome};
use crate::error::{AppError, AppResult, LoggedJson};
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub public_key: serde_json::Value,
    #[serde(default)]
    pub auth_secret: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub username: String,
    pub public_key: serde_json::Value,
}

/// `GET /v1/users/:username`
pub async fn get_user(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> AppResult<Json<UserView>> {
    validate_username(&username)?;
    let record = state
        .directory
        .get(&username)
        .await?
        .ok_or_else(|| AppError::NotFound("user not found".to_string()))?;
    Ok(Json(UserView {
        username: record.username,
        public_key: record.public_key,
    }))
}

/// `POST /v1/users/:username`
pub async fn register_or_rotate(
    State(state): State<AppState>,
    Path(username): Path<String>,
    LoggedJson(input): LoggedJson<RegisterRequest>,
) -> AppResult<Json<serde_json::Value>> {
    validate_username(&username)?;

    let RegisterOutcome {
        created,
        issued_secret,
    } = state
        .directory
        .register_or_rotate(&username, input.public_key, input.auth_secret)
        .await?;

    tracing::info!(username = %username, created, "user directory write");

    let mut body = json!({ "ok": true, "username": username });
    if let Some(secret) = issued_secret {
        body["authSecret"] = json!(secret);
    }
    Ok(Json(body))
}
