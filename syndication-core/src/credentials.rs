//! Site credentials and their at-rest encryption.
//!
//! Credentials are sealed as a single blob: the JSON form of
//! [`SiteCredentials`] encrypted with XChaCha20-Poly1305 under a key derived
//! from a configured secret (SHA-256). Blob layout, base64 encoded:
//! `nonce (24 bytes) || ciphertext || tag`.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{XChaCha20Poly1305, XNonce};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

const NONCE_SIZE: usize = 24;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("credential encryption failed")]
    EncryptionFailed,
    #[error("credential decryption failed: blob is corrupted or the secret is wrong")]
    DecryptionFailed,
    #[error("credential blob is not valid base64: {0}")]
    Encoding(#[from] base64::DecodeError),
    #[error("credential blob is too short")]
    TooShort,
    #[error("credential payload is not valid JSON: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Authentication material for one site: a bearer token, or a username and
/// password. Both checks are independent; consumers prefer the token.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteCredentials {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    password: Option<String>,
}

impl std::fmt::Debug for SiteCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SiteCredentials")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl SiteCredentials {
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            ..Self::default()
        }
    }

    pub fn with_username_password(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            password: Some(password.into()),
            ..Self::default()
        }
    }

    pub fn has_token(&self) -> bool {
        self.token.as_deref().is_some_and(|t| !t.is_empty())
    }

    pub fn has_username_password(&self) -> bool {
        self.username.as_deref().is_some_and(|u| !u.is_empty())
            && self.password.as_deref().is_some_and(|p| !p.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        !self.has_token() && !self.has_username_password()
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref().filter(|t| !t.is_empty())
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }
}

/// Seals and opens credential blobs.
pub struct CredentialCipher {
    cipher: XChaCha20Poly1305,
}

impl std::fmt::Debug for CredentialCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialCipher").field("key", &"[REDACTED]").finish()
    }
}

impl CredentialCipher {
    pub fn from_secret(secret: &str) -> Self {
        let key = Sha256::digest(secret.as_bytes());
        Self {
            cipher: XChaCha20Poly1305::new(&key),
        }
    }

    pub fn seal(&self, credentials: &SiteCredentials) -> Result<String, CredentialError> {
        let plaintext = serde_json::to_vec(credentials)?;

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = XNonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_ref())
            .map_err(|_| CredentialError::EncryptionFailed)?;

        let mut blob = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        blob.extend_from_slice(&nonce_bytes);
        blob.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(blob))
    }

    pub fn open(&self, blob: &str) -> Result<SiteCredentials, CredentialError> {
        let bytes = STANDARD.decode(blob.trim())?;
        if bytes.len() <= NONCE_SIZE {
            return Err(CredentialError::TooShort);
        }
        let (nonce_bytes, ciphertext) = bytes.split_at(NONCE_SIZE);
        let plaintext = self
            .cipher
            .decrypt(XNonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| CredentialError::DecryptionFailed)?;
        Ok(serde_json::from_slice(&plaintext)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sealed_credentials_open_with_the_same_secret() {
        let cipher = CredentialCipher::from_secret("s3cret");
        let creds = SiteCredentials::with_username_password("editor", "hunter2");

        let blob = cipher.seal(&creds).unwrap();

        assert!(!blob.contains("hunter2"));
        assert_eq!(cipher.open(&blob).unwrap(), creds);
    }

    #[test]
    fn sealing_twice_uses_fresh_nonces() {
        let cipher = CredentialCipher::from_secret("s3cret");
        let creds = SiteCredentials::with_token("abc");
        assert_ne!(cipher.seal(&creds).unwrap(), cipher.seal(&creds).unwrap());
    }

    #[test]
    fn wrong_secret_fails_to_open() {
        let blob = CredentialCipher::from_secret("right").seal(&SiteCredentials::with_token("abc")).unwrap();

        let err = CredentialCipher::from_secret("wrong").open(&blob).unwrap_err();

        assert!(matches!(err, CredentialError::DecryptionFailed));
    }

    #[test]
    fn malformed_blobs_are_rejected() {
        let cipher = CredentialCipher::from_secret("s3cret");
        assert!(matches!(cipher.open("%%%"), Err(CredentialError::Encoding(_))));
        assert!(matches!(cipher.open("c2hvcnQ="), Err(CredentialError::TooShort)));
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let creds = SiteCredentials::with_username_password("editor", "hunter2");
        let rendered = format!("{creds:?}");
        assert!(rendered.contains("editor"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn capability_checks() {
        assert!(SiteCredentials::with_token("t").has_token());
        assert!(!SiteCredentials::with_token("t").has_username_password());
        assert!(SiteCredentials::with_username_password("u", "p").has_username_password());
        assert!(SiteCredentials::default().is_empty());
    }
}
