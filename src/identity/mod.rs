//! The user directory (UKV): `username -> {publicKey, authHash, updatedAt}`
//! (§4.1). First-claim semantics — whoever registers a username first owns
//! it — and authenticated rotation via a bearer secret whose SHA-256 is the
//! only thing ever persisted.

pub mod handler;

use crate::error::{AppError, AppResult};
use crate::kv::Kv;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use moka::sync::Cache;
use once_cell::sync::Lazy;
use rand::RngCore;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Duration;
use subtle::ConstantTimeEq;

const NAMESPACE: &str = "ukv";

static USERNAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.\-]{0,63}$").unwrap());

pub fn validate_username(username: &str) -> AppResult<()> {
    if USERNAME_RE.is_match(username) {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "invalid username: {username}"
        )))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub username: String,
    pub public_key: serde_json::Value,
    pub auth_hash: String,
    pub updated_at: String,
}

/// SHA-256 hex digest of a plaintext bearer secret.
pub fn hash_secret(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// A fresh bearer secret: >= 24 random bytes, URL-safe base64 without
/// padding, per §4.1.
pub fn generate_bearer_secret() -> String {
    let mut bytes = [0u8; 24];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

fn secret_matches(secret: &str, auth_hash: &str) -> bool {
    let computed = hash_secret(secret);
    // Constant-time compare of the hex digests to avoid leaking match
    // progress through timing.
    computed.as_bytes().ct_eq(auth_hash.as_bytes()).into()
}

fn key_for(username: &str) -> String {
    format!("user:{username}")
}

/// Read-through cache over the user directory, mirroring the teacher's
/// `BearerTokenCache`/`ProjectKeyCache` shape (moka cache fronting SQL).
#[derive(Clone)]
pub struct Directory {
    kv: Kv,
    cache: Cache<String, UserRecord>,
}

impl Directory {
    pub fn new(kv: Kv) -> Self {
        let cache = Cache::builder()
            .max_capacity(10_000)
            .time_to_live(Duration::from_secs(30))
            .build();
        Self { kv, cache }
    }

    pub async fn get(&self, username: &str) -> AppResult<Option<UserRecord>> {
        if let Some(record) = self.cache.get(username) {
            return Ok(Some(record));
        }
        let record = self.kv.get::<UserRecord>(NAMESPACE, key_for(username)).await?;
        if let Some(ref r) = record {
            self.cache.insert(username.to_string(), r.clone());
        }
        Ok(record)
    }

    async fn put(&self, record: UserRecord) -> AppResult<()> {
        self.kv
            .put(NAMESPACE, key_for(&record.username), &record, None)
            .await?;
        self.cache.insert(record.username.clone(), record);
        Ok(())
    }

    /// `true` iff `username` exists and `secret` authenticates as its owner.
    pub async fn verify_bearer(&self, username: &str, secret: &str) -> AppResult<bool> {
        validate_username(username)?;
        if secret.is_empty() {
            return Ok(false);
        }
        let Some(record) = self.get(username).await? else {
            return Ok(false);
        };
        Ok(secret_matches(secret, &record.auth_hash))
    }

    /// First registration mints and returns a one-time bearer secret.
    /// Subsequent calls require the existing secret and rotate `publicKey`.
    pub async fn register_or_rotate(
        &self,
        username: &str,
        public_key: serde_json::Value,
        auth_secret: Option<String>,
    ) -> AppResult<RegisterOutcome> {
        validate_username(username)?;

        match self.get(username).await? {
            None => {
                let secret = generate_bearer_secret();
                let record = UserRecord {
                    username: username.to_string(),
                    public_key,
                    auth_hash: hash_secret(&secret),
                    updated_at: now_iso8601(),
                };
                self.put(record).await?;
                Ok(RegisterOutcome {
                    created: true,
                    issued_secret: Some(secret),
                })
            }
            Some(existing) => {
                let supplied = auth_secret.unwrap_or_default();
                if supplied.is_empty() || !secret_matches(&supplied, &existing.auth_hash) {
                    return Err(AppError::Auth("authSecret mismatch".to_string()));
                }
                let record = UserRecord {
                    username: username.to_string(),
                    public_key,
                    auth_hash: existing.auth_hash,
                    updated_at: now_iso8601(),
                };
                self.put(record).await?;
                Ok(RegisterOutcome {
                    created: false,
                    issued_secret: None,
                })
            }
        }
    }
}

pub struct RegisterOutcome {
    pub created: bool,
    /// Only `Some` on first registration — the one-time disclosure.
    pub issued_secret: Option<String>,
}

pub fn now_iso8601() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Admin predicate (§4.1): an empty allowlist, or one containing `*`, means
/// every authenticated user is an admin.
pub fn is_admin(admin_users: &[String], username: &str) -> bool {
    admin_users.is_empty()
        || admin_users.iter().any(|u| u == "*")
        || admin_users.iter().any(|u| u == username)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_regex_boundaries() {
        assert!(validate_username(&"a".repeat(1)).is_ok());
        assert!(validate_username(&"a".repeat(64)).is_ok());
        assert!(validate_username(&"a".repeat(65)).is_err());
        assert!(validate_username("_leadingunderscore").is_err());
        assert!(validate_username("bob.smith-2").is_ok());
        assert!(validate_username("").is_err());
        assert!(validate_username("has space").is_err());
    }

    #[test]
    fn secret_hash_roundtrip() {
        let secret = generate_bearer_secret();
        let hash = hash_secret(&secret);
        assert!(secret_matches(&secret, &hash));
        assert!(!secret_matches("wrong", &hash));
    }

    #[test]
    fn admin_predicate_wildcard_and_empty() {
        assert!(is_admin(&[], "anyone"));
        assert!(is_admin(&["*".to_string()], "anyone"));
        assert!(is_admin(&["alice".to_string()], "alice"));
        assert!(!is_admin(&["alice".to_string()], "bob"));
    }
}
