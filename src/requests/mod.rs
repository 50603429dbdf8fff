//! The access-request channel (§4.5): a recipient-initiated pull request
//! for credentials, routed to admins via the allowlist.

pub mod handler;

use serde::{Deserialize, Serialize};

pub const NAMESPACE: &str = "skv";

/// Fixed 15 minute TTL, per §3 — not configurable.
pub const REQUEST_TTL_SECS: u64 = 15 * 60;

/// Keyed by target admin so a poll can prefix-scan straight to one admin's
/// requests instead of fetching globally and filtering afterward.
pub fn key_for(target_admin: &str, id: &str) -> String {
    format!("request:{target_admin}:{id}")
}

pub fn prefix_for(target_admin: &str) -> String {
    format!("request:{target_admin}:")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessRequest {
    pub id: String,
    pub requester: String,
    pub origin: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_admin: Option<String>,
}
