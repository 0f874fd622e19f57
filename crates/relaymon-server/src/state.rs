use std::sync::Arc;

use ipnet::IpNet;
use sea_orm::DatabaseConnection;

use relaymon_common::sign::Signer;

use crate::crypto::Decryptor;
use crate::service::MetricsService;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<MetricsService>,
    /// Present when a shared secret is configured; drives both request
    /// verification and response signing.
    pub signer: Option<Signer>,
    /// Present when a private key is configured; unwraps encrypted payloads.
    pub decryptor: Option<Arc<Decryptor>>,
    /// Present when a trusted CIDR is configured; gates every request on its
    /// declared source address.
    pub trusted_subnet: Option<IpNet>,
    /// Present when the relational backend is in use; answers `/ping`.
    pub db: Option<DatabaseConnection>,
}
