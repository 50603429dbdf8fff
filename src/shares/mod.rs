//! The single-use share channel (§4.2): `/session/<token>` link flow, at
//! most one `consume` per token under concurrent access.

pub mod handler;

use serde::{Deserialize, Serialize};

fn default_target_path() -> String {
    "/".to_string()
}

fn default_alg() -> String {
    "ecdh-hkdf-aesgcm".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_origin: Option<String>,
    #[serde(default = "default_target_path")]
    pub target_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
}

impl Default for ShareMeta {
    fn default() -> Self {
        Self {
            target_origin: None,
            target_path: default_target_path(),
            comment: None,
            sender: None,
        }
    }
}

/// The SKV payload stored under the token itself (§3). Never carries
/// `createdAt` or anything beyond what the client supplied — the server
/// never needs to reason about the cipher's age, only the coordinator's.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareRecord {
    pub cipher: String,
    #[serde(default = "default_alg")]
    pub alg: String,
    #[serde(default)]
    pub cmp: Option<String>,
    #[serde(default)]
    pub meta: ShareMeta,
}

pub fn key_for(token: &str) -> String {
    token.to_string()
}

pub const NAMESPACE: &str = "skv";
