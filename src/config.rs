use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::address::Address;

const DEFAULT_RELAYER_ENDPOINT: &str = "https://relayer.sepolia.zama.ai";
const DEFAULT_CONTRACT_ADDRESS: &str = "0x892324719831df4cc0d3c4eac5b4abe1f17cadea";
const DEFAULT_MODULE_LOAD_TIMEOUT_SECS: u64 = 15;
const DEFAULT_MODULE_INIT_TIMEOUT_SECS: u64 = 15;
const DEFAULT_INSTANCE_TIMEOUT_SECS: u64 = 20;
const DEFAULT_ENCRYPT_TIMEOUT_SECS: u64 = 30;

/// Top-level client configuration surfaced to embedding applications.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ClientConfig {
    /// Character manager contract the encryption engine binds to.
    pub contract_address: Address,
    pub engine: EngineConfig,
    pub cache: CacheConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            contract_address: DEFAULT_CONTRACT_ADDRESS
                .parse()
                .expect("default contract address is well formed"),
            engine: EngineConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

/// Relayer endpoint and stage timeouts for the encryption engine.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    /// Base URL of the FHE relayer service.
    pub relayer_endpoint: String,
    /// Timeout (in seconds) for loading the engine module.
    pub module_load_timeout: u64,
    /// Timeout (in seconds) for module-level setup; covers key-material fetches.
    pub module_init_timeout: u64,
    /// Timeout (in seconds) for constructing the contract-bound instance.
    pub instance_timeout: u64,
    /// Timeout (in seconds) for each per-value encryption request.
    pub encrypt_timeout: u64,
}

impl EngineConfig {
    pub fn module_load_timeout(&self) -> Duration {
        Duration::from_secs(self.module_load_timeout)
    }

    pub fn module_init_timeout(&self) -> Duration {
        Duration::from_secs(self.module_init_timeout)
    }

    pub fn instance_timeout(&self) -> Duration {
        Duration::from_secs(self.instance_timeout)
    }

    pub fn encrypt_timeout(&self) -> Duration {
        Duration::from_secs(self.encrypt_timeout)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            relayer_endpoint: DEFAULT_RELAYER_ENDPOINT.to_string(),
            module_load_timeout: DEFAULT_MODULE_LOAD_TIMEOUT_SECS,
            module_init_timeout: DEFAULT_MODULE_INIT_TIMEOUT_SECS,
            instance_timeout: DEFAULT_INSTANCE_TIMEOUT_SECS,
            encrypt_timeout: DEFAULT_ENCRYPT_TIMEOUT_SECS,
        }
    }
}

/// Location of the durable plaintext parts cache.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CacheConfig {
    /// Directory where cached part selections are stored.
    pub data_dir: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/pixelchar"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_round_trip_through_serde() {
        let config = ClientConfig::default();
        let encoded = serde_json::to_string(&config).expect("serialize");
        let decoded: ClientConfig = serde_json::from_str(&encoded).expect("deserialize");
        assert_eq!(decoded, config);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let decoded: ClientConfig = serde_json::from_str("{}").expect("deserialize empty");
        assert_eq!(decoded, ClientConfig::default());
        assert_eq!(
            decoded.engine.encrypt_timeout(),
            Duration::from_secs(DEFAULT_ENCRYPT_TIMEOUT_SECS)
        );
    }
}
