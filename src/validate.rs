//! Shared validation helpers used by the shares and inbox channels: TTL
//! clamping and the payload-size guard (§4.2, §5).

use crate::error::{AppError, AppResult};

/// `ttl = min(max(ttlSec or DEFAULT_TTL, 60s), MAX_TTL)`.
pub fn clamp_ttl(requested: Option<u64>, default_ttl_secs: u64, max_ttl_secs: u64) -> u64 {
    let requested = requested.unwrap_or(default_ttl_secs);
    requested.clamp(60, max_ttl_secs)
}

/// Reject if `len(cipher) * 0.75 > MAX_PAYLOAD_BYTES`. The `0.75` factor
/// assumes base64 expansion; the server never decodes the cipher to check
/// its real size, so this bound is preserved exactly as specified even
/// though it is only accurate for base64-encoded input (see SPEC_FULL.md
/// §10.8, open question 1).
pub fn check_payload_size(cipher: &str, max_payload_bytes: usize) -> AppResult<()> {
    if cipher.is_empty() {
        return Err(AppError::Validation("cipher must not be empty".to_string()));
    }
    if (cipher.len() as f64) * 0.75 > max_payload_bytes as f64 {
        return Err(AppError::Validation(
            "cipher exceeds maximum payload size".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ttl_clamp_floor_and_ceiling() {
        assert_eq!(clamp_ttl(Some(30), 600, 3600), 60);
        assert_eq!(clamp_ttl(Some(3601), 600, 3600), 3600);
        assert_eq!(clamp_ttl(None, 600, 3600), 600);
        assert_eq!(clamp_ttl(Some(120), 600, 3600), 120);
    }

    #[test]
    fn payload_size_boundary() {
        let max = 8_388_608usize;
        let ok_len = (max as f64 / 0.75).floor() as usize;
        let ok_cipher = "a".repeat(ok_len);
        assert!(check_payload_size(&ok_cipher, max).is_ok());

        let too_big = "a".repeat(ok_len + 1);
        assert!(check_payload_size(&too_big, max).is_err());
    }

    #[test]
    fn empty_cipher_rejected() {
        assert!(check_payload_size("", 1024).is_err());
    }
}
