use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Keyed-hash signer shared by both ends of the transport.
///
/// The agent computes the tag over the post-compression request payload and
/// sends it in the `HashSHA256` header; the server recomputes it over the
/// payload as received, and signs its own response bodies the same way.
/// Tags are lowercase hex.
///
/// # Examples
///
/// ```
/// use relaymon_common::sign::Signer;
///
/// let signer = Signer::new("secret").unwrap();
/// let tag = signer.compute(b"payload");
/// assert!(signer.verify(&tag, b"payload"));
/// assert!(!signer.verify(&tag, b"tampered"));
/// ```
#[derive(Clone)]
pub struct Signer {
    key: Vec<u8>,
}

impl Signer {
    /// Builds a signer from the shared secret. An empty secret disables
    /// signing entirely, hence `None`.
    pub fn new(key: &str) -> Option<Self> {
        if key.is_empty() {
            None
        } else {
            Some(Self {
                key: key.as_bytes().to_vec(),
            })
        }
    }

    fn mac(&self) -> HmacSha256 {
        HmacSha256::new_from_slice(&self.key).expect("HMAC accepts any key size")
    }

    /// Hex-encoded HMAC-SHA256 tag of `payload`.
    pub fn compute(&self, payload: &[u8]) -> String {
        let mut mac = self.mac();
        mac.update(payload);
        hex::encode(mac.finalize().into_bytes())
    }

    /// Constant-time check of a hex tag against `payload`. A tag that does
    /// not decode as hex never verifies.
    pub fn verify(&self, tag_hex: &str, payload: &[u8]) -> bool {
        let Ok(tag) = hex::decode(tag_hex) else {
            return false;
        };
        let mut mac = self.mac();
        mac.update(payload);
        mac.verify_slice(&tag).is_ok()
    }
}
