//! PKCE (Proof Key for Code Exchange) and state-token generation
//!
//! Implements RFC 7636 (S256 method) for providers that require PKCE,
//! plus the CSRF state tokens used by every flow. State tokens carry
//! 256 bits of entropy, well above the 128-bit floor the redirect
//! round-trip requires.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Generate a cryptographically secure code verifier.
///
/// Returns a URL-safe base64 string of 32 random bytes (43 characters).
/// Per RFC 7636, verifiers must be 43-128 characters long.
pub fn generate_code_verifier() -> String {
    random_urlsafe(32)
}

/// Generate the S256 code challenge for a verifier.
///
/// Per RFC 7636 the challenge is BASE64URL(SHA256(ASCII(code_verifier)))
/// without padding.
pub fn generate_code_challenge(verifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

/// Generate a random state token for CSRF protection.
///
/// Returns a URL-safe base64 string of 32 random bytes (43 characters).
pub fn generate_state() -> String {
    random_urlsafe(32)
}

fn random_urlsafe(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rand::thread_rng().fill_bytes(&mut buf);
    URL_SAFE_NO_PAD.encode(buf)
}

/// PKCE verifier/challenge pair for one authorization round-trip.
///
/// The verifier is kept server-side (in the state store) until the code
/// exchange; the challenge travels in the authorization URL.
#[derive(Debug, Clone)]
pub struct PkceChallenge {
    /// Random string (43-128 chars, base64url encoded)
    pub verifier: String,

    /// SHA256 hash of the verifier (base64url encoded)
    pub challenge: String,
}

impl PkceChallenge {
    /// Generate a new PKCE pair.
    #[must_use]
    pub fn generate() -> Self {
        let verifier = generate_code_verifier();
        let challenge = generate_code_challenge(&verifier);
        Self { verifier, challenge }
    }

    /// Challenge method sent in the authorization request (always S256).
    #[must_use]
    pub fn method(&self) -> &'static str {
        "S256"
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for auth::pkce.
    use super::*;

    /// Validates `PkceChallenge::generate` verifier length against the
    /// RFC 7636 43..=128 character window.
    #[test]
    fn test_verifier_length() {
        let pkce = PkceChallenge::generate();
        assert!(
            pkce.verifier.len() >= 43,
            "verifier too short: {} chars",
            pkce.verifier.len()
        );
        assert!(
            pkce.verifier.len() <= 128,
            "verifier too long: {} chars",
            pkce.verifier.len()
        );
    }

    /// Validates that the challenge is deterministic: the stored verifier
    /// must regenerate the challenge sent in the authorization request.
    #[test]
    fn test_challenge_round_trip() {
        let pkce = PkceChallenge::generate();
        assert_eq!(pkce.challenge, generate_code_challenge(&pkce.verifier));
    }

    /// Validates that successive generations produce unique values.
    #[test]
    fn test_unique_values() {
        let a = PkceChallenge::generate();
        let b = PkceChallenge::generate();
        assert_ne!(a.verifier, b.verifier);
        assert_ne!(a.challenge, b.challenge);
        assert_ne!(generate_state(), generate_state());
    }

    /// Validates base64url encoding: no padding, no `+`, no `/`.
    #[test]
    fn test_base64url_encoding() {
        let pkce = PkceChallenge::generate();
        let state = generate_state();
        for value in [&pkce.verifier, &pkce.challenge, &state] {
            assert!(!value.contains('='));
            assert!(!value.contains('+'));
            assert!(!value.contains('/'));
        }
    }

    /// Validates the state token entropy floor (32 bytes -> 43 chars).
    #[test]
    fn test_state_length() {
        assert!(generate_state().len() >= 43);
    }

    /// Validates the challenge method label.
    #[test]
    fn test_challenge_method() {
        assert_eq!(PkceChallenge::generate().method(), "S256");
    }

    /// Known-answer test for the S256 transform, from RFC 7636 appendix B.
    #[test]
    fn test_rfc7636_vector() {
        let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
        assert_eq!(
            generate_code_challenge(verifier),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }
}
