//! The session lifecycle registry (§4.4): the sender-visible durable twin
//! of a delivered inbox share, plus the sender index that enumerates a
//! sender's sessions without scanning all session records.

pub mod handler;

use serde::{Deserialize, Serialize};

pub const NAMESPACE: &str = "skv";

pub fn session_key(id: &str) -> String {
    format!("session:{id}")
}

pub fn sender_index_key(sender: &str, id: &str) -> String {
    format!("sessionBySender:{sender}:{id}")
}

pub fn sender_index_prefix(sender: &str) -> String {
    format!("sessionBySender:{sender}:")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub id: String,
    pub sender: String,
    pub recipient: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_origin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_path: Option<String>,
    pub created_at: String,
    pub duration_sec: u64,
    pub expires_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accepted_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revoked_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restored_at: Option<String>,
    pub cipher: String,
    pub alg: Option<String>,
    pub cmp: Option<String>,
}
