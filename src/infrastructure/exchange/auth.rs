//! RSA-PSS request signing for the Kalshi API.
//!
//! The signed message is `timestamp_ms + METHOD + path`, where `path` is the
//! URL path without its query string. Signatures are base64 encoded.

use crate::domain::error::DomainError;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::pss::BlindedSigningKey;
use rsa::sha2::Sha256;
use rsa::signature::{RandomizedSigner, SignatureEncoding};
use rsa::RsaPrivateKey;

/// Headers for one authenticated request.
#[derive(Debug, Clone)]
pub struct SignedHeaders {
    pub access_key: String,
    pub signature: String,
    pub timestamp: String,
}

impl SignedHeaders {
    pub fn as_tuples(&self) -> [(&'static str, &str); 3] {
        [
            ("KALSHI-ACCESS-KEY", &self.access_key),
            ("KALSHI-ACCESS-SIGNATURE", &self.signature),
            ("KALSHI-ACCESS-TIMESTAMP", &self.timestamp),
        ]
    }
}

pub struct KalshiSigner {
    api_key: String,
    signing_key: BlindedSigningKey<Sha256>,
}

impl std::fmt::Debug for KalshiSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KalshiSigner")
            .field("api_key", &self.api_key)
            .field("private_key", &"[REDACTED]")
            .finish()
    }
}

impl KalshiSigner {
    /// Accepts PKCS#8 (`BEGIN PRIVATE KEY`) or PKCS#1
    /// (`BEGIN RSA PRIVATE KEY`) PEM. Literal `\n` sequences from
    /// environment variables are unescaped first.
    pub fn new(api_key: impl Into<String>, private_key_pem: &str) -> Result<Self, DomainError> {
        let pem = private_key_pem.replace("\\n", "\n");
        let private_key = RsaPrivateKey::from_pkcs8_pem(&pem)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(&pem))
            .map_err(|e| DomainError::Config(format!("failed to parse Kalshi private key: {e}")))?;

        Ok(Self {
            api_key: api_key.into(),
            signing_key: BlindedSigningKey::<Sha256>::new(private_key),
        })
    }

    pub fn from_file(api_key: impl Into<String>, path: &str) -> Result<Self, DomainError> {
        let pem = std::fs::read_to_string(path)
            .map_err(|e| DomainError::Config(format!("failed to read Kalshi key {path}: {e}")))?;
        Self::new(api_key, &pem)
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn sign(&self, method: &str, path: &str) -> SignedHeaders {
        self.sign_with_timestamp(method, path, chrono::Utc::now().timestamp_millis())
    }

    pub fn sign_with_timestamp(&self, method: &str, path: &str, timestamp_ms: i64) -> SignedHeaders {
        let path = path.split('?').next().unwrap_or(path);
        let timestamp = timestamp_ms.to_string();
        let message = format!("{timestamp}{}{path}", method.to_uppercase());
        let signature = self
            .signing_key
            .sign_with_rng(&mut rand::thread_rng(), message.as_bytes());

        SignedHeaders {
            access_key: self.api_key.clone(),
            signature: BASE64.encode(signature.to_bytes()),
            timestamp,
        }
    }
}
