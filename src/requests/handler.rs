use super::{key_for, prefix_for, AccessRequest, NAMESPACE, REQUEST_TTL_SECS};
use crate::error::{AppError, AppResult, LoggedJson};
use crate::identity::{is_admin, now_iso8601};
use crate::ids;
use crate::state::AppState;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRequestInput {
    pub username: String,
    pub auth_secret: String,
    pub origin: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub target_admin: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateRequestResponse {
    pub id: String,
}

/// `POST /v1/requests`
pub async fn create_request(
    State(state): State<AppState>,
    LoggedJson(input): LoggedJson<CreateRequestInput>,
) -> AppResult<(StatusCode, Json<CreateRequestResponse>)> {
    if !state
        .directory
        .verify_bearer(&input.username, &input.auth_secret)
        .await?
    {
        return Err(AppError::Auth("bad credentials".to_string()));
    }

    let target_admin = match &input.target_admin {
        Some(t) if !t.is_empty() => t.clone(),
        _ => return Err(AppError::Validation("targetAdmin is required".to_string())),
    };

    let admin_users = &state.config.admin.admin_users;
    let wildcard = admin_users.is_empty() || admin_users.iter().any(|u| u == "*");
    if !wildcard && !admin_users.iter().any(|u| u == &target_admin) {
        return Err(AppError::Auth("Admin not allowed".to_string()));
    }

    let id = ids::request_id();
    let record = AccessRequest {
        id: id.clone(),
        requester: input.username,
        origin: input.origin,
        url: input.url,
        created_at: now_iso8601(),
        target_admin: Some(target_admin.clone()),
    };

    state
        .kv
        .put(
            NAMESPACE,
            key_for(&target_admin, &id),
            &record,
            Some(Duration::from_secs(REQUEST_TTL_SECS)),
        )
        .await?;

    Ok((StatusCode::CREATED, Json(CreateRequestResponse { id })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollRequestsQuery {
    pub username: String,
    pub auth_secret: String,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct PollRequestsResponse {
    pub items: Vec<AccessRequest>,
}

/// `GET /v1/requests/poll?username=<admin>&authSecret=<s>&limit=<n>`
pub async fn poll_requests(
    State(state): State<AppState>,
    Query(query): Query<PollRequestsQuery>,
) -> AppResult<Json<PollRequestsResponse>> {
    if !state
        .directory
        .verify_bearer(&query.username, &query.auth_secret)
        .await?
    {
        return Err(AppError::Auth("bad credentials".to_string()));
    }
    if !is_admin(&state.config.admin.admin_users, &query.username) {
        return Err(AppError::Auth("admin required".to_string()));
    }

    let limit = query.limit.unwrap_or(50).clamp(1, 100);
    let rows = state
        .kv
        .list_by_prefix::<AccessRequest>(NAMESPACE, prefix_for(&query.username), limit)
        .await?;

    let items = rows.into_iter().map(|(_, record)| record).collect();

    Ok(Json(PollRequestsResponse { items }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AckRequestsInput {
    pub username: String,
    pub auth_secret: String,
    pub ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct AckResponse {
    pub ok: bool,
    pub deleted: usize,
}

/// `POST /v1/requests/ack`
pub async fn ack_requests(
    State(state): State<AppState>,
    LoggedJson(input): LoggedJson<AckRequestsInput>,
) -> AppResult<Json<AckResponse>> {
    if !state
        .directory
        .verify_bearer(&input.username, &input.auth_secret)
        .await?
    {
        return Err(AppError::Auth("bad credentials".to_string()));
    }
    if !is_admin(&state.config.admin.admin_users, &input.username) {
        return Err(AppError::Auth("admin required".to_string()));
    }

    let mut deleted = 0usize;
    for id in &input.ids {
        let key = key_for(&input.username, id);
        if state
            .kv
            .get::<AccessRequest>(NAMESPACE, key.clone())
            .await?
            .is_some()
        {
            deleted += 1;
        }
        state.kv.delete(NAMESPACE, key).await?;
    }

    Ok(Json(AckResponse { ok: true, deleted }))
}
