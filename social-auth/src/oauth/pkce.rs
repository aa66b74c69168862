//! PKCE (Proof Key for Code Exchange) support for OAuth 2.0.
//!
//! Implements RFC 7636 with the S256 challenge method only.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::error::{configuration_error, ConfigurationErrorKind, Error};

/// Random bytes drawn for a verifier (512 bits, encodes to 86 characters).
const VERIFIER_ENTROPY_BYTES: usize = 64;
const VERIFIER_MIN_LEN: usize = 43;
const VERIFIER_MAX_LEN: usize = 128;

/// The only challenge method this client sends.
pub const CODE_CHALLENGE_METHOD: &str = "S256";

/// PKCE code verifier (random string).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkceVerifier(String);

impl PkceVerifier {
    /// Generate a new random PKCE verifier.
    pub fn generate() -> Self {
        let mut random_bytes = [0u8; VERIFIER_ENTROPY_BYTES];
        rand::thread_rng().fill_bytes(&mut random_bytes);
        let mut verifier = URL_SAFE_NO_PAD.encode(random_bytes);
        verifier.truncate(VERIFIER_MAX_LEN);
        Self(verifier)
    }

    /// Parse a verifier loaded from storage, enforcing RFC 7636 length and charset.
    pub fn parse(verifier: &str) -> Result<Self, Error> {
        let verifier = verifier.trim();
        let valid_len = (VERIFIER_MIN_LEN..=VERIFIER_MAX_LEN).contains(&verifier.len());
        let valid_chars = verifier
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '~'));

        if !valid_len || !valid_chars {
            return Err(configuration_error(
                ConfigurationErrorKind::InvalidValue,
                "code_verifier must be 43-128 unreserved URL characters",
            ));
        }
        Ok(Self(verifier.to_string()))
    }

    /// Get the verifier string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Generate the corresponding code challenge.
    pub fn challenge(&self) -> PkceChallenge {
        PkceChallenge::from_verifier(self)
    }
}

/// PKCE code challenge (SHA256 hash of verifier).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkceChallenge(String);

impl PkceChallenge {
    /// Create a code challenge from a verifier.
    ///
    /// Uses SHA256 hashing and unpadded base64url encoding as per RFC 7636.
    pub fn from_verifier(verifier: &PkceVerifier) -> Self {
        let hash = Sha256::digest(verifier.as_str().as_bytes());
        Self(URL_SAFE_NO_PAD.encode(hash))
    }

    /// Get the challenge string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A verifier together with the challenge derived from it.
///
/// The challenge is never constructed independently of its verifier.
#[derive(Debug, Clone)]
pub struct PkcePair {
    verifier: PkceVerifier,
    challenge: PkceChallenge,
}

impl PkcePair {
    /// Generate a fresh verifier/challenge pair.
    pub fn generate() -> Self {
        Self::from_verifier(PkceVerifier::generate())
    }

    pub fn from_verifier(verifier: PkceVerifier) -> Self {
        let challenge = verifier.challenge();
        Self {
            verifier,
            challenge,
        }
    }

    pub fn verifier(&self) -> &PkceVerifier {
        &self.verifier
    }

    pub fn challenge(&self) -> &PkceChallenge {
        &self.challenge
    }
}
