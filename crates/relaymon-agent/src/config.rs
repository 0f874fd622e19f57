use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct AgentConfig {
    /// Receiver base address. `http://host:port` selects the HTTP transport;
    /// `grpc://host:port` together with `use_grpc` selects the binary one.
    #[serde(default = "default_server_address")]
    pub server_address: String,
    /// Sampling interval for both sampler loops (seconds).
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Reporting interval (seconds).
    #[serde(default = "default_report_interval_secs")]
    pub report_interval_secs: u64,
    /// Number of dispatch workers; also sizes the work queue.
    #[serde(default = "default_rate_limit")]
    pub rate_limit: usize,
    /// Shared secret for request signing. Absent or empty disables signing.
    #[serde(default)]
    pub key: Option<String>,
    /// Path to the receiver's RSA public key (PEM). When set, batches are
    /// encrypted instead of signed.
    #[serde(default)]
    pub crypto_key: Option<String>,
    /// Use the binary RPC transport instead of HTTP.
    #[serde(default)]
    pub use_grpc: bool,
}

fn default_server_address() -> String {
    "http://localhost:8080".to_string()
}

fn default_poll_interval_secs() -> u64 {
    2
}

fn default_report_interval_secs() -> u64 {
    10
}

fn default_rate_limit() -> usize {
    1
}

impl AgentConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_to_an_empty_config() {
        let config: AgentConfig = toml::from_str("").unwrap();
        assert_eq!(config.server_address, "http://localhost:8080");
        assert_eq!(config.poll_interval_secs, 2);
        assert_eq!(config.report_interval_secs, 10);
        assert_eq!(config.rate_limit, 1);
        assert!(config.key.is_none());
        assert!(!config.use_grpc);
    }
}
