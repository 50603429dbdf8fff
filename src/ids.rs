//! Random identifier generation (§6 "Identifier formats"): hex of a fixed
//! byte length, one call site per identifier kind so the byte count is
//! self-documenting at the call site.

use rand::RngCore;

fn random_hex(num_bytes: usize) -> String {
    let mut bytes = vec![0u8; num_bytes];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Share token: 24 bytes -> 48 hex chars (>= 192 bits entropy).
pub fn share_token() -> String {
    random_hex(24)
}

/// Inbox item id / session id: 20 bytes -> 40 hex chars.
pub fn inbox_id() -> String {
    random_hex(20)
}

/// Access request id: 16 bytes -> 32 hex chars.
pub fn request_id() -> String {
    random_hex(16)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lengths_match_spec() {
        assert_eq!(share_token().len(), 48);
        assert_eq!(inbox_id().len(), 40);
        assert_eq!(request_id().len(), 32);
    }

    #[test]
    fn hex_only() {
        assert!(share_token().chars().all(|c| c.is_ascii_hexdigit()));
    }
}
