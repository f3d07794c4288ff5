//! Gateway configuration.
//!
//! Loaded from a JSON file at startup and validated before any component
//! is built. Key material is rejected if it still carries placeholder
//! values or has the wrong length for the cipher.

use serde::Deserialize;
use std::fmt;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use mediasync_auth::{AuthConfig, KEY_LENGTH};
use mediasync_common::{Error, Result};
use mediasync_storage::BackendConfig;

/// Values that indicate a key was never actually configured.
const PLACEHOLDERS: &[&str] = &["CHANGE_ME", "CHANGEME", "YOUR_VALUE_HERE", "PLACEHOLDER"];

/// Complete gateway configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Address the HTTP server binds to.
    pub listen_addr: SocketAddr,
    /// Authentication provider selection.
    pub auth: AuthConfig,
    /// Storage backend selection.
    pub storage: BackendConfig,
    /// Credential envelope keys and lifetime.
    pub envelope: EnvelopeConfig,
    /// Connection pool tuning.
    pub pool: PoolConfig,
}

/// Envelope manager settings.
#[derive(Clone, Deserialize)]
pub struct EnvelopeConfig {
    /// Key the envelope signature is computed with.
    pub signing_key: String,
    /// Key the embedded password is sealed with; must be exactly 32 bytes.
    pub encryption_key: String,
    /// Issuer claim embedded in and required of every envelope.
    pub issuer: String,
    /// Envelope validity in seconds.
    pub lifetime_secs: u64,
}

/// Connection pool settings.
#[derive(Debug, Clone, Deserialize)]
pub struct PoolConfig {
    /// Idle time in seconds after which a pooled connection is stale.
    pub ttl_secs: u64,
    /// Seconds between reclamation sweeps.
    pub sweep_interval_secs: u64,
}

impl GatewayConfig {
    /// Load and validate a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read(path.as_ref())?;
        let config: Self = serde_json::from_slice(&data)
            .map_err(|e| Error::Config(format!("failed to parse config file: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for values that cannot work.
    pub fn validate(&self) -> Result<()> {
        if self.envelope.signing_key.is_empty() || contains_placeholder(&self.envelope.signing_key)
        {
            return Err(Error::Config(
                "envelope signing_key must be set (no placeholders)".to_string(),
            ));
        }
        if contains_placeholder(&self.envelope.encryption_key) {
            return Err(Error::Config(
                "envelope encryption_key must be set (no placeholders)".to_string(),
            ));
        }
        if self.envelope.encryption_key.len() != KEY_LENGTH {
            return Err(Error::Config(format!(
                "envelope encryption_key must be exactly {} bytes, got {}",
                KEY_LENGTH,
                self.envelope.encryption_key.len()
            )));
        }
        if self.envelope.lifetime_secs == 0 {
            return Err(Error::Config("envelope lifetime_secs must be non-zero".to_string()));
        }
        if self.pool.ttl_secs == 0 {
            return Err(Error::Config("pool ttl_secs must be non-zero".to_string()));
        }
        if self.pool.sweep_interval_secs == 0 {
            return Err(Error::Config(
                "pool sweep_interval_secs must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Envelope lifetime as a duration.
    pub fn envelope_lifetime(&self) -> Duration {
        Duration::from_secs(self.envelope.lifetime_secs)
    }

    /// Pool freshness TTL as a duration.
    pub fn pool_ttl(&self) -> Duration {
        Duration::from_secs(self.pool.ttl_secs)
    }

    /// Sweep interval as a duration.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.pool.sweep_interval_secs)
    }
}

fn contains_placeholder(value: &str) -> bool {
    PLACEHOLDERS.iter().any(|p| value.contains(p))
}

impl fmt::Debug for EnvelopeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvelopeConfig")
            .field("signing_key", &"[REDACTED]")
            .field("encryption_key", &"[REDACTED]")
            .field("issuer", &self.issuer)
            .field("lifetime_secs", &self.lifetime_secs)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn config_json(encryption_key: &str, signing_key: &str) -> String {
        serde_json::json!({
            "listen_addr": "127.0.0.1:8443",
            "auth": {"kind": "local", "users_file": "/etc/mediasync/users.json"},
            "storage": {"kind": "memory"},
            "envelope": {
                "signing_key": signing_key,
                "encryption_key": encryption_key,
                "issuer": "mediasync",
                "lifetime_secs": 86400
            },
            "pool": {"ttl_secs": 300, "sweep_interval_secs": 60}
        })
        .to_string()
    }

    const GOOD_KEY: &str = "0123456789abcdef0123456789abcdef";

    #[test]
    fn test_load_valid_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(config_json(GOOD_KEY, "signing-secret").as_bytes())
            .unwrap();

        let config = GatewayConfig::load(file.path()).unwrap();

        assert_eq!(config.listen_addr.port(), 8443);
        assert_eq!(config.pool_ttl(), Duration::from_secs(300));
        assert_eq!(config.envelope_lifetime(), Duration::from_secs(86400));
    }

    #[test]
    fn test_short_encryption_key_rejected() {
        let config: GatewayConfig =
            serde_json::from_str(&config_json("too-short", "signing-secret")).unwrap();
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_placeholder_keys_rejected() {
        let config: GatewayConfig =
            serde_json::from_str(&config_json(GOOD_KEY, "CHANGE_ME")).unwrap();
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let placeholder_key = "CHANGE_ME_CHANGE_ME_CHANGE_ME_12";
        let config: GatewayConfig =
            serde_json::from_str(&config_json(placeholder_key, "signing-secret")).unwrap();
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_zero_durations_rejected() {
        let mut value: serde_json::Value =
            serde_json::from_str(&config_json(GOOD_KEY, "signing-secret")).unwrap();
        value["pool"]["ttl_secs"] = 0.into();

        let config: GatewayConfig = serde_json::from_value(value).unwrap();
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_debug_redacts_keys() {
        let config: GatewayConfig =
            serde_json::from_str(&config_json(GOOD_KEY, "signing-secret")).unwrap();

        let debug = format!("{:?}", config.envelope);
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("signing-secret"));
        assert!(!debug.contains(GOOD_KEY));
    }
}
