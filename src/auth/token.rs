//! Opaque session token generation and fingerprinting.
//!
//! Tokens carry no claims: the raw value goes to the client, only its
//! SHA-256 fingerprint is stored server-side, and every authorization
//! decision is made against the stored session row.

use base64::{Engine as _, engine::general_purpose};
use rand::{Rng as _, rng};
use sha2::{Digest, Sha256};

/// 256 bits of entropy per token.
const TOKEN_BYTES: usize = 32;

/// Generate a new opaque session token.
pub fn generate_token() -> String {
    let mut token_bytes = [0u8; TOKEN_BYTES];
    rng().fill(&mut token_bytes);

    // Encode as base64url without padding
    general_purpose::URL_SAFE_NO_PAD.encode(token_bytes)
}

/// Fingerprint a raw token for storage and lookup.
///
/// Deterministic, so a presented token can be matched by equality without
/// the database ever seeing the raw value.
pub fn fingerprint(raw_token: &str) -> String {
    let digest = Sha256::digest(raw_token.as_bytes());
    general_purpose::URL_SAFE_NO_PAD.encode(digest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generate_token_shape() {
        let token = generate_token();

        // 32 bytes base64url without padding is 43 chars
        assert_eq!(token.len(), 43);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        assert!(!token.contains('='));
    }

    #[test]
    fn test_generate_token_uniqueness() {
        let tokens: HashSet<String> = (0..10_000).map(|_| generate_token()).collect();
        assert_eq!(tokens.len(), 10_000);
    }

    #[test]
    fn test_fingerprint_deterministic() {
        let token = generate_token();
        assert_eq!(fingerprint(&token), fingerprint(&token));
    }

    #[test]
    fn test_fingerprint_distinguishes_tokens() {
        let a = fingerprint("token-a");
        let b = fingerprint("token-b");
        assert_ne!(a, b);

        // SHA-256 digest is 32 bytes, so 43 chars base64url
        assert_eq!(a.len(), 43);
    }

    #[test]
    fn test_fingerprint_is_not_the_token() {
        let token = generate_token();
        assert_ne!(fingerprint(&token), token);
    }
}
