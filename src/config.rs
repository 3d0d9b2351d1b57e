//! Responder Configuration
//!
//! Loaded from a TOML file, then overridden from the command line.
//! The base identity can also be taken from an existing Yggdrasil
//! configuration, see [`load_identity_file`].

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv6Addr};
use std::path::Path;

use crate::types::DEFAULT_TTL;

/// Main configuration for the responder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MixinConfig {
    // === Network ===

    /// Address to bind (`::` listens on both IPv6 and IPv4)
    pub listen_address: IpAddr,

    /// UDP port to listen on
    pub port: u16,

    /// Join the mDNS multicast group on the listening socket
    pub multicast: bool,

    // === Names ===

    /// Suffix of hostname queries, e.g. `alice-ygg.local.`
    pub hostname_suffix: String,

    /// Suffix of key queries, e.g. `<base32 key>-yggk.local.`
    pub key_suffix: String,

    /// TTL of synthesized records (seconds)
    pub ttl: u32,

    // === Identity ===

    /// Hex encoded ed25519 private key (64-byte Yggdrasil form or 32-byte seed)
    pub private_key: Option<String>,

    // === Monitoring ===

    /// Interval between status log lines (seconds, 0 disables)
    pub status_interval_secs: u64,
}

impl Default for MixinConfig {
    fn default() -> Self {
        Self {
            listen_address: IpAddr::V6(Ipv6Addr::UNSPECIFIED),
            port: 5353,
            multicast: false,

            hostname_suffix: "-ygg.local.".to_string(),
            key_suffix: "-yggk.local.".to_string(),
            ttl: DEFAULT_TTL,

            private_key: None,

            status_interval_secs: 300,
        }
    }
}

impl MixinConfig {
    /// Load configuration from TOML file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Render configuration as TOML
    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    // Builder-style methods for CLI overrides

    pub fn with_port(mut self, port: Option<u16>) -> Self {
        if let Some(port) = port {
            self.port = port;
        }
        self
    }

    pub fn with_listen_address(mut self, addr: Option<IpAddr>) -> Self {
        if let Some(addr) = addr {
            self.listen_address = addr;
        }
        self
    }

    pub fn with_hostname_suffix(mut self, suffix: Option<String>) -> Self {
        if let Some(suffix) = suffix {
            self.hostname_suffix = suffix;
        }
        self
    }

    pub fn with_key_suffix(mut self, suffix: Option<String>) -> Self {
        if let Some(suffix) = suffix {
            self.key_suffix = suffix;
        }
        self
    }

    pub fn with_multicast(mut self, multicast: bool) -> Self {
        self.multicast |= multicast;
        self
    }

    pub fn with_private_key(mut self, key: Option<String>) -> Self {
        if key.is_some() {
            self.private_key = key;
        }
        self
    }

    /// Validate configuration values
    pub fn validate(&self) -> anyhow::Result<()> {
        for (field, suffix) in [
            ("hostname_suffix", &self.hostname_suffix),
            ("key_suffix", &self.key_suffix),
        ] {
            if !suffix.ends_with('.') {
                anyhow::bail!("{} ({:?}) must end with a dot, e.g. \"-ygg.local.\"", field, suffix);
            }
            if suffix.len() < 2 {
                anyhow::bail!("{} ({:?}) must contain more than the root dot", field, suffix);
            }
        }

        if self.hostname_suffix.eq_ignore_ascii_case(&self.key_suffix) {
            anyhow::bail!(
                "hostname_suffix and key_suffix must differ (both {:?})",
                self.hostname_suffix
            );
        }

        if self.ttl == 0 {
            anyhow::bail!("ttl must be greater than zero");
        }

        Ok(())
    }
}

/// The part of a Yggdrasil configuration this responder reads
#[derive(Debug, Deserialize)]
struct YggdrasilConfig {
    #[serde(rename = "PrivateKey")]
    private_key: String,
}

/// Read the hex `PrivateKey` from a Yggdrasil configuration, as written by
/// `yggdrasil -genconf` (HJSON, so plain JSON works too).
pub fn load_identity_file(path: &Path) -> anyhow::Result<String> {
    let content = std::fs::read_to_string(path)?;
    let config: YggdrasilConfig = deser_hjson::from_str(&content)
        .map_err(|e| anyhow::anyhow!("{}: not a Yggdrasil config: {}", path.display(), e))?;
    Ok(config.private_key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = MixinConfig::default();
        assert_eq!(config.port, 5353);
        assert_eq!(config.hostname_suffix, "-ygg.local.");
        assert_eq!(config.key_suffix, "-yggk.local.");
        assert_eq!(config.ttl, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = MixinConfig::default();
        config.hostname_suffix = "-ygg.local".to_string();
        assert!(config.validate().is_err());

        let mut config = MixinConfig::default();
        config.key_suffix = ".".to_string();
        assert!(config.validate().is_err());

        let mut config = MixinConfig::default();
        config.key_suffix = "-YGG.local.".to_string();
        assert!(config.validate().is_err());

        let mut config = MixinConfig::default();
        config.ttl = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_builder_methods() {
        let config = MixinConfig::default()
            .with_port(Some(5354))
            .with_hostname_suffix(Some("-h.example.".to_string()))
            .with_key_suffix(None)
            .with_multicast(true)
            .with_listen_address(Some("127.0.0.1".parse().unwrap()));

        assert_eq!(config.port, 5354);
        assert_eq!(config.hostname_suffix, "-h.example.");
        assert_eq!(config.key_suffix, "-yggk.local.");
        assert!(config.multicast);
        assert_eq!(config.listen_address.to_string(), "127.0.0.1");
    }

    #[test]
    fn test_load_partial_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "port = 53\nkey_suffix = \"-k.ygg.\"\nprivate_key = \"abcd\"").unwrap();

        let config = MixinConfig::load(file.path()).unwrap();
        assert_eq!(config.port, 53);
        assert_eq!(config.key_suffix, "-k.ygg.");
        assert_eq!(config.hostname_suffix, "-ygg.local.");
        assert_eq!(config.private_key.as_deref(), Some("abcd"));
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = MixinConfig::default().with_private_key(Some("00".repeat(64)));
        let text = config.to_toml_string().unwrap();
        let parsed: MixinConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_load_yggdrasil_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"Peers": [], "PrivateKey": "{}", "IfName": "auto"}}"#,
            "ab".repeat(64)
        )
        .unwrap();

        assert_eq!(load_identity_file(file.path()).unwrap(), "ab".repeat(64));

        let mut bad = tempfile::NamedTempFile::new().unwrap();
        write!(bad, "{{\"Peers\": []}}").unwrap();
        assert!(load_identity_file(bad.path()).is_err());
    }

    #[test]
    fn test_load_generated_hjson_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "{{\n  # Generated by yggdrasil\n\n  # List of outbound peers\n  Peers: []\n\n  # Your private key. DO NOT share this with anyone!\n  PrivateKey: {}\n\n  IfName: auto\n  NodeInfoPrivacy: false\n}}\n",
            "ab".repeat(64)
        )
        .unwrap();

        assert_eq!(load_identity_file(file.path()).unwrap(), "ab".repeat(64));
    }
}
