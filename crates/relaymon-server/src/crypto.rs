use std::path::Path;

use anyhow::Context;
use rsa::pkcs8::DecodePrivateKey;
use rsa::{Oaep, RsaPrivateKey};
use sha2::Sha256;

/// Holds the receiver's RSA private key and unwraps encrypted payloads.
pub struct Decryptor {
    key: RsaPrivateKey,
}

impl Decryptor {
    pub fn new(key: RsaPrivateKey) -> Self {
        Self { key }
    }

    /// Loads a PEM-encoded (PKCS#8) RSA private key.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let pem = std::fs::read_to_string(path)
            .with_context(|| format!("read private key {}", path.display()))?;
        let key = RsaPrivateKey::from_pkcs8_pem(&pem)
            .with_context(|| format!("parse private key {}", path.display()))?;
        Ok(Self { key })
    }

    /// Decrypts an RSA-OAEP (SHA-256) payload back to the compressed batch.
    pub fn decrypt(&self, payload: &[u8]) -> Result<Vec<u8>, rsa::Error> {
        self.key.decrypt(Oaep::new::<Sha256>(), payload)
    }
}
