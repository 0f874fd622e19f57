//! The receiver half of the transport integrity pipeline.
//!
//! Layered so a request passes: trusted-subnet filter → decryption →
//! signature verification → gzip decompression → handlers. The signature is
//! checked over the body exactly as it arrives at its layer — the
//! post-compression payload the sender signed.

pub mod crypt;
pub mod gzip;
pub mod sign;
pub mod subnet;
