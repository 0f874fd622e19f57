use std::path::Path;

use anyhow::Context;
use rsa::pkcs8::DecodePublicKey;
use rsa::{Oaep, RsaPublicKey};
use sha2::Sha256;

/// Loads a PEM-encoded RSA public key.
pub fn load_public_key(path: &Path) -> anyhow::Result<RsaPublicKey> {
    let pem = std::fs::read_to_string(path)
        .with_context(|| format!("read public key {}", path.display()))?;
    RsaPublicKey::from_public_key_pem(&pem)
        .with_context(|| format!("parse public key {}", path.display()))
}

/// Encrypts the post-compression payload with RSA-OAEP over SHA-256.
pub fn encrypt(key: &RsaPublicKey, payload: &[u8]) -> Result<Vec<u8>, rsa::Error> {
    key.encrypt(&mut rand::thread_rng(), Oaep::new::<Sha256>(), payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsa::RsaPrivateKey;

    #[test]
    fn encrypts_for_the_matching_private_key() {
        let mut rng = rand::thread_rng();
        let private = RsaPrivateKey::new(&mut rng, 2048).unwrap();
        let public = RsaPublicKey::from(&private);

        let ciphertext = encrypt(&public, b"compressed batch").unwrap();
        assert_ne!(ciphertext, b"compressed batch");

        let plaintext = private.decrypt(Oaep::new::<Sha256>(), &ciphertext).unwrap();
        assert_eq!(plaintext, b"compressed batch");
    }
}
