use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Compute the LINE webhook signature for a raw request body: the
/// base64-encoded HMAC-SHA256 of the body keyed with the channel secret.
pub fn sign_body(channel_secret: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(channel_secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(body);
    BASE64.encode(mac.finalize().into_bytes())
}

/// Verify an `X-Line-Signature` header value against the raw request body.
///
/// The comparison runs over the decoded MAC bytes via the hmac crate's
/// constant-time `verify_slice`, so a malformed header simply fails.
pub fn verify_signature(channel_secret: &str, body: &[u8], signature: &str) -> bool {
    let Ok(expected) = BASE64.decode(signature) else {
        return false;
    };

    let mut mac = HmacSha256::new_from_slice(channel_secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_verify_round_trip() {
        let secret = "test-channel-secret";
        let body = br#"{"events":[]}"#;
        let signature = sign_body(secret, body);
        assert!(verify_signature(secret, body, &signature));
    }

    #[test]
    fn test_rejects_wrong_secret() {
        let body = br#"{"events":[]}"#;
        let signature = sign_body("secret-a", body);
        assert!(!verify_signature("secret-b", body, &signature));
    }

    #[test]
    fn test_rejects_tampered_body() {
        let secret = "test-channel-secret";
        let signature = sign_body(secret, br#"{"events":[]}"#);
        assert!(!verify_signature(secret, br#"{"events":[{}]}"#, &signature));
    }

    #[test]
    fn test_rejects_garbage_header() {
        assert!(!verify_signature("secret", b"body", "not base64 at all!!"));
        assert!(!verify_signature("secret", b"body", ""));
    }
}
