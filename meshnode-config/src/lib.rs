use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("malformed private key: {0}")]
    BadPrivateKey(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub version: String,
    pub listen_addr: String,
    /// Hex-encoded 32-byte seed. If present, the node runs the validator loop.
    pub private_key: Option<String>,
    pub bootstrap_nodes: Vec<String>,
    pub block_time_secs: u64,
}

impl NodeConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let builder = config::Config::builder()
            .add_source(config::File::from(path))
            .add_source(config::Environment::with_prefix("MESHNODE").separator("__"));
        let cfg = builder.build()?;
        let cfg: Self = cfg.try_deserialize()?;
        if let Some(seed) = &cfg.private_key {
            meshnode_crypto::PrivateKey::from_hex(seed)
                .map_err(|e| ConfigError::BadPrivateKey(e.to_string()))?;
        }
        Ok(cfg)
    }

    pub fn example() -> Self {
        Self {
            version: "0.1.0".into(),
            listen_addr: "127.0.0.1:7000".into(),
            private_key: None,
            bootstrap_nodes: vec![],
            block_time_secs: 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn example_round_trips_through_toml() {
        let cfg = NodeConfig::example();
        let s = toml::to_string_pretty(&cfg).unwrap();
        let parsed: NodeConfig = toml::from_str(&s).unwrap();
        assert_eq!(parsed.listen_addr, cfg.listen_addr);
        assert_eq!(parsed.block_time_secs, 5);
    }

    #[test]
    fn load_rejects_malformed_private_key() {
        let dir = std::env::temp_dir().join(format!("meshnode-cfg-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("bad.toml");
        std::fs::write(
            &path,
            "version = \"0.1.0\"\nlisten_addr = \"127.0.0.1:7000\"\nprivate_key = \"not-hex\"\nbootstrap_nodes = []\nblock_time_secs = 5\n",
        )
        .unwrap();
        let err = NodeConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("malformed private key"));
        std::fs::remove_file(&path).unwrap();
    }
}
