//! Anonymous sealed-box encryption against the secret store's public key.
//!
//! Only the recipient's public key is needed; output is compatible with
//! libsodium's `crypto_box_seal`.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use crypto_box::PublicKey;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

use crate::error::{secret_publish_error, Error, ErrorKind, SecretPublishErrorKind};

/// The store's currently advertised public key.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StorePublicKey {
    pub key_id: String,
    /// Base64-encoded 32-byte X25519 public key.
    pub key: String,
}

/// A sealed value bound to the key it was sealed against.
///
/// Not `Clone`: one sealed value is sent in exactly one upsert.
#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct SealedSecret {
    encrypted_value: String,
    key_id: String,
}

impl SealedSecret {
    pub fn encrypted_value(&self) -> &str {
        &self.encrypted_value
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }
}

/// Seal `plaintext` against `public_key`.
pub fn seal(public_key: &StorePublicKey, plaintext: &[u8]) -> Result<SealedSecret, Error> {
    let key_bytes = BASE64.decode(public_key.key.trim()).map_err(|e| Error {
        source: Some(Box::new(e)),
        error_kind: ErrorKind::SecretPublish(SecretPublishErrorKind::InvalidPublicKey),
    })?;

    let key_bytes: [u8; 32] = key_bytes.as_slice().try_into().map_err(|_| {
        secret_publish_error(
            SecretPublishErrorKind::InvalidPublicKey,
            &format!(
                "public key {} decodes to {} bytes, expected 32",
                public_key.key_id,
                key_bytes.len()
            ),
        )
    })?;

    let sealed = PublicKey::from(key_bytes)
        .seal(&mut OsRng, plaintext)
        .map_err(|_| {
            secret_publish_error(SecretPublishErrorKind::SealFailed, "sealed-box encryption failed")
        })?;

    Ok(SealedSecret {
        encrypted_value: BASE64.encode(sealed),
        key_id: public_key.key_id.clone(),
    })
}
