use super::{sender_index_key, sender_index_prefix, session_key, SessionRecord, NAMESPACE};
use crate::error::{AppError, AppResult, LoggedJson};
use crate::identity::{is_admin, now_iso8601};
use crate::ids;
use crate::inbox::{key_for as inbox_key_for, InboxItem, InboxMeta};
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::time::Duration;

fn ttl_left_secs(expires_at: &str) -> i64 {
    let Ok(parsed) = chrono::DateTime::parse_from_rfc3339(expires_at) else {
        return 0;
    };
    (parsed.with_timezone(&chrono::Utc) - chrono::Utc::now()).num_seconds()
}

async fn authenticate_admin_owner(
    state: &AppState,
    username: &str,
    auth_secret: &str,
    session: &SessionRecord,
) -> AppResult<()> {
    if !state.directory.verify_bearer(username, auth_secret).await? {
        return Err(AppError::Auth("bad credentials".to_string()));
    }
    if !is_admin(&state.config.admin.admin_users, username) {
        return Err(AppError::Auth("admin required".to_string()));
    }
    if session.sender != username {
        return Err(AppError::Auth("not session owner".to_string()));
    }
    Ok(())
}

async fn load_session(state: &AppState, id: &str) -> AppResult<SessionRecord> {
    state
        .kv
        .get::<SessionRecord>(NAMESPACE, session_key(id))
        .await?
        .ok_or_else(|| AppError::NotFound("unknown session".to_string()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListSessionsQuery {
    pub sender: String,
    pub auth_secret: String,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct ListSessionsResponse {
    pub sessions: Vec<SessionRecord>,
}

/// `GET /v1/sessions?sender=<u>&authSecret=<s>&limit=<n>`
pub async fn list_sessions(
    State(state): State<AppState>,
    Query(query): Query<ListSessionsQuery>,
) -> AppResult<Json<ListSessionsResponse>> {
    if !state
        .directory
        .verify_bearer(&query.sender, &query.auth_secret)
        .await?
    {
        return Err(AppError::Auth("bad credentials".to_string()));
    }
    if !is_admin(&state.config.admin.admin_users, &query.sender) {
        return Err(AppError::Auth("admin required".to_string()));
    }

    let limit = query.limit.unwrap_or(50).clamp(1, 100);
    let index_rows = state
        .kv
        .list_by_prefix::<String>(NAMESPACE, sender_index_prefix(&query.sender), limit)
        .await?;

    let prefix_len = sender_index_prefix(&query.sender).len();
    let mut sessions = Vec::with_capacity(index_rows.len());
    for (key, _) in index_rows {
        let id = &key[prefix_len..];
        if let Some(record) = state
            .kv
            .get::<SessionRecord>(NAMESPACE, session_key(id))
            .await?
        {
            sessions.push(record);
        }
    }

    Ok(Json(ListSessionsResponse { sessions }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerAuthRequest {
    pub username: String,
    pub auth_secret: String,
}

#[derive(Debug, Serialize)]
pub struct OkResponse {
    pub ok: bool,
}

/// `POST /v1/sessions/:id/revoke`
pub async fn revoke_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
    LoggedJson(input): LoggedJson<OwnerAuthRequest>,
) -> AppResult<Json<OkResponse>> {
    let mut session = load_session(&state, &id).await?;
    authenticate_admin_owner(&state, &input.username, &input.auth_secret, &session).await?;

    let ttl_left = (ttl_left_secs(&session.expires_at)).max(60) as u64;
    let ttl = Duration::from_secs(ttl_left);

    let new_id = ids::inbox_id();
    let revoke_item = InboxItem {
        cipher: String::new(),
        alg: None,
        cmp: None,
        meta: InboxMeta {
            kind: "revoke".to_string(),
            target_origin: session.target_origin.clone(),
            target_path: None,
            comment: None,
            sender: Some(input.username.clone()),
            session_duration_sec: None,
            session_id: Some(session.id.clone()),
        },
        created_at: now_iso8601(),
        expires_at: (chrono::Utc::now() + chrono::Duration::seconds(ttl_left as i64)).to_rfc3339(),
    };
    state
        .kv
        .put(
            crate::inbox::NAMESPACE,
            inbox_key_for(&session.recipient, &new_id),
            &revoke_item,
            Some(ttl),
        )
        .await?;

    session.revoked_at = Some(now_iso8601());
    state
        .kv
        .put(NAMESPACE, session_key(&id), &session, Some(ttl))
        .await?;
    state
        .kv
        .put(
            NAMESPACE,
            sender_index_key(&session.sender, &id),
            &"1",
            Some(ttl),
        )
        .await?;

    Ok(Json(OkResponse { ok: true }))
}

/// `POST /v1/sessions/:id/restore`
pub async fn restore_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
    LoggedJson(input): LoggedJson<OwnerAuthRequest>,
) -> AppResult<Json<OkResponse>> {
    let mut session = load_session(&state, &id).await?;
    authenticate_admin_owner(&state, &input.username, &input.auth_secret, &session).await?;

    let ttl_left_raw = ttl_left_secs(&session.expires_at);
    if ttl_left_raw <= 60 {
        return Err(AppError::Gone("session expired".to_string()));
    }
    if session.cipher.is_empty() {
        return Err(AppError::Conflict("no original payload to restore".to_string()));
    }

    let ttl_left = ttl_left_raw as u64;
    let ttl = Duration::from_secs(ttl_left);

    let new_id = ids::inbox_id();
    let restore_item = InboxItem {
        cipher: session.cipher.clone(),
        alg: session.alg.clone(),
        cmp: session.cmp.clone(),
        meta: InboxMeta {
            kind: "share".to_string(),
            target_origin: session.target_origin.clone(),
            target_path: session.target_path.clone(),
            comment: None,
            sender: Some(session.sender.clone()),
            session_duration_sec: Some(ttl_left),
            session_id: Some(session.id.clone()),
        },
        created_at: now_iso8601(),
        expires_at: (chrono::Utc::now() + chrono::Duration::seconds(ttl_left as i64)).to_rfc3339(),
    };
    state
        .kv
        .put(
            crate::inbox::NAMESPACE,
            inbox_key_for(&session.recipient, &new_id),
            &restore_item,
            Some(ttl),
        )
        .await?;

    session.restored_at = Some(now_iso8601());
    state
        .kv
        .put(NAMESPACE, session_key(&id), &session, Some(ttl))
        .await?;
    state
        .kv
        .put(
            NAMESPACE,
            sender_index_key(&session.sender, &id),
            &"1",
            Some(ttl),
        )
        .await?;

    Ok(Json(OkResponse { ok: true }))
}

/// `POST /v1/sessions/:id/accepted`. No auth — advances only a timestamp.
pub async fn accept_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<OkResponse>> {
    let mut session = load_session(&state, &id).await?;
    if session.accepted_at.is_some() {
        return Ok(Json(OkResponse { ok: true }));
    }

    let ttl_left = (ttl_left_secs(&session.expires_at)).max(60) as u64;
    session.accepted_at = Some(now_iso8601());
    state
        .kv
        .put(
            NAMESPACE,
            session_key(&id),
            &session,
            Some(Duration::from_secs(ttl_left)),
        )
        .await?;

    Ok(Json(OkResponse { ok: true }))
}

/// `POST /v1/sessions/:id/delete`
pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
    LoggedJson(input): LoggedJson<OwnerAuthRequest>,
) -> AppResult<Json<OkResponse>> {
    let session = load_session(&state, &id).await?;
    authenticate_admin_owner(&state, &input.username, &input.auth_secret, &session).await?;

    state.kv.delete(NAMESPACE, session_key(&id)).await?;
    state
        .kv
        .delete(NAMESPACE, sender_index_key(&session.sender, &id))
        .await?;

    Ok(Json(OkResponse { ok: true }))
}
