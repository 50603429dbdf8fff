//! The recipient inbox channel (§4.3): push delivery, polling, ack.
//!
//! Realizes IKV by aliasing SKV under an `inbox:` key prefix (§9 "fallback
//! store aliasing") — the prefix cannot collide with a share token since
//! tokens are 48 hex characters with no colon.

pub mod handler;

use serde::{Deserialize, Serialize};

pub const NAMESPACE: &str = "skv";

pub fn key_for(recipient: &str, id: &str) -> String {
    format!("inbox:{recipient}:{id}")
}

pub fn prefix_for(recipient: &str) -> String {
    format!("inbox:{recipient}:")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboxMeta {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_origin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_duration_sec: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboxItem {
    pub cipher: String,
    pub alg: Option<String>,
    pub cmp: Option<String>,
    pub meta: InboxMeta,
    pub created_at: String,
    pub expires_at: String,
}
