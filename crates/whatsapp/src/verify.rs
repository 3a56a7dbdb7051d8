//! Webhook authenticity checks.

use {
    hmac::{Hmac, Mac},
    sha2::Sha256,
};

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the payload signature on delivery POSTs.
pub const SIGNATURE_HEADER: &str = "X-Hub-Signature-256";

const SIGNATURE_PREFIX: &str = "sha256=";

/// Validate the `X-Hub-Signature-256` header against the raw body.
///
/// The header value is `sha256=<hex>` where the digest is HMAC-SHA256 of
/// the body keyed by the shared app secret.
pub fn signature_matches(body: &[u8], header: &str, app_secret: &str) -> bool {
    let Some(expected) = header.strip_prefix(SIGNATURE_PREFIX) else {
        return false;
    };
    constant_time_eq(&signature_for(body, app_secret), expected)
}

/// Hex HMAC-SHA256 of `body` keyed by `app_secret` (without the prefix).
pub fn signature_for(body: &[u8], app_secret: &str) -> String {
    let Ok(mut mac) = HmacSha256::new_from_slice(app_secret.as_bytes()) else {
        // HMAC accepts keys of any length; unreachable in practice.
        return String::new();
    };
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Subscription handshake (GET): echo the challenge iff the mode is
/// `subscribe` and the token matches the configured secret.
pub fn subscription_challenge(
    mode: Option<&str>,
    token: Option<&str>,
    challenge: Option<&str>,
    verify_token: &str,
) -> Option<String> {
    if mode? == "subscribe" && token? == verify_token {
        Some(challenge?.to_string())
    } else {
        None
    }
}

/// Constant-time comparison to keep signature checks timing-safe.
fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes().zip(b.bytes()).fold(0, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_signature_accepted() {
        let body = b"{\"entry\":[]}";
        let header = format!("sha256={}", signature_for(body, "secret"));
        assert!(signature_matches(body, &header, "secret"));
    }

    #[test]
    fn wrong_secret_rejected() {
        let body = b"{\"entry\":[]}";
        let header = format!("sha256={}", signature_for(body, "secret"));
        assert!(!signature_matches(body, &header, "other"));
    }

    #[test]
    fn tampered_body_rejected() {
        let header = format!("sha256={}", signature_for(b"original", "secret"));
        assert!(!signature_matches(b"tampered", &header, "secret"));
    }

    #[test]
    fn missing_prefix_rejected() {
        let body = b"x";
        let bare = signature_for(body, "secret");
        assert!(!signature_matches(body, &bare, "secret"));
    }

    #[test]
    fn challenge_echoed_on_match() {
        let result =
            subscription_challenge(Some("subscribe"), Some("tok"), Some("chal-123"), "tok");
        assert_eq!(result.as_deref(), Some("chal-123"));
    }

    #[test]
    fn challenge_refused_on_token_mismatch() {
        assert!(subscription_challenge(Some("subscribe"), Some("bad"), Some("c"), "tok").is_none());
        assert!(subscription_challenge(Some("unsubscribe"), Some("tok"), Some("c"), "tok").is_none());
        assert!(subscription_challenge(None, Some("tok"), Some("c"), "tok").is_none());
        assert!(subscription_challenge(Some("subscribe"), Some("tok"), None, "tok").is_none());
    }

    #[test]
    fn constant_time_eq_basics() {
        assert!(constant_time_eq("abc", "abc"));
        assert!(!constant_time_eq("abc", "abd"));
        assert!(!constant_time_eq("abc", "abcd"));
    }
}
