use super::{key_for, prefix_for, InboxItem, InboxMeta, NAMESPACE};
use crate::error::{AppError, AppResult, LoggedJson};
use crate::ids;
use crate::identity::now_iso8601;
use crate::sessions::{sender_index_key, session_key, SessionRecord};
use crate::shares::ShareMeta;
use crate::state::AppState;
use crate::validate::{check_payload_size, clamp_ttl};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInboxRequest {
    pub recipient: String,
    pub cipher: String,
    #[serde(default)]
    pub alg: Option<String>,
    #[serde(default)]
    pub cmp: Option<String>,
    #[serde(default)]
    pub meta: Option<ShareMeta>,
    #[serde(default)]
    pub ttl_sec: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInboxResponse {
    pub id: String,
    pub session_id: String,
}

/// `POST /v1/inbox`
pub async fn create_inbox_item(
    State(state): State<AppState>,
    LoggedJson(input): LoggedJson<CreateInboxRequest>,
) -> AppResult<(StatusCode, Json<CreateInboxResponse>)> {
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

    let id = ids::inbox_id();
    let session_id = ids::inbox_id();
    let now = now_iso8601();
    let expires_at = (chrono::Utc::now() + chrono::Duration::seconds(ttl_secs as i64)).to_rfc3339();

    let client_meta = input.meta.unwrap_or_default();
    let meta = InboxMeta {
        kind: "share".to_string(),
        target_origin: client_meta.target_origin.clone(),
        target_path: Some(client_meta.target_path.clone()),
        comment: client_meta.comment.clone(),
        sender: client_meta.sender.clone(),
        session_duration_sec: Some(ttl_secs),
        session_id: Some(session_id.clone()),
    };

    let item = InboxItem {
        cipher: input.cipher.clone(),
        alg: input.alg.clone(),
        cmp: input.cmp.clone(),
        meta,
        created_at: now.clone(),
        expires_at: expires_at.clone(),
    };

    state
        .kv
        .put(NAMESPACE, key_for(&input.recipient, &id), &item, Some(ttl))
        .await?;

    if let Some(sender) = client_meta.sender.filter(|s| !s.is_empty()) {
        let session = SessionRecord {
            id: session_id.clone(),
            sender: sender.clone(),
            recipient: input.recipient.clone(),
            target_origin: client_meta.target_origin,
            target_path: Some(client_meta.target_path),
            created_at: now,
            duration_sec: ttl_secs,
            expires_at: expires_at.clone(),
            accepted_at: None,
            revoked_at: None,
            restored_at: None,
            cipher: input.cipher,
            alg: input.alg,
            cmp: input.cmp,
        };
        state
            .kv
            .put(NAMESPACE, session_key(&session_id), &session, Some(ttl))
            .await?;
        state
            .kv
            .put(NAMESPACE, sender_index_key(&sender, &session_id), &"1", Some(ttl))
            .await?;
    }

    Ok((
        StatusCode::CREATED,
        Json(CreateInboxResponse { id, session_id }),
    ))
}

#[derive(Debug, Deserialize)]
pub struct PollQuery {
    pub recipient: String,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InboxItemView {
    pub id: String,
    pub cipher: String,
    pub alg: Option<String>,
    pub cmp: Option<String>,
    pub meta: InboxMeta,
    pub expires_at: String,
}

#[derive(Debug, Serialize)]
pub struct PollResponse {
    pub items: Vec<InboxItemView>,
}

/// `GET /v1/inbox/poll?recipient=<u>&limit=<n>`
pub async fn poll_inbox(
    State(state): State<AppState>,
    Query(query): Query<PollQuery>,
) -> AppResult<Json<PollResponse>> {
    crate::identity::validate_username(&query.recipient)?;
    let limit = query.limit.unwrap_or(10).clamp(1, 25);

    let rows = state
        .kv
        .list_by_prefix::<InboxItem>(NAMESPACE, prefix_for(&query.recipient), limit)
        .await?;

    let prefix_len = prefix_for(&query.recipient).len();
    let items = rows
        .into_iter()
        .map(|(key, item)| InboxItemView {
            id: key[prefix_len..].to_string(),
            cipher: item.cipher,
            alg: item.alg,
            cmp: item.cmp,
            meta: item.meta,
            expires_at: item.expires_at,
        })
        .collect();

    Ok(Json(PollResponse { items }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AckRequest {
    pub recipient: String,
    pub ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct AckResponse {
    pub ok: bool,
    pub deleted: usize,
}

/// `POST /v1/inbox/ack`
pub async fn ack_inbox(
    State(state): State<AppState>,
    LoggedJson(input): LoggedJson<AckRequest>,
) -> AppResult<Json<AckResponse>> {
    crate::identity::validate_username(&input.recipient)?;

    let mut deleted = 0usize;
    for id in &input.ids {
        let key = key_for(&input.recipient, id);
        if state.kv.get::<InboxItem>(NAMESPACE, key.clone()).await?.is_some() {
            deleted += 1;
        }
        state.kv.delete(NAMESPACE, key).await?;
    }

    Ok(Json(AckResponse { ok: true, deleted }))
}
