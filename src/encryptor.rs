//! Batch encryption of a character's six part indices.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::debug;

use crate::address::Address;
use crate::config::ClientConfig;
use crate::encoding::{Bytes32, EncodingError};
use crate::engine::{
    EncryptionEngine, EngineError, EngineHandle, RelayerConnector, StageTimeouts,
};
use crate::types::{CharacterParts, EncryptedCharacterParts};

/// Turns plaintext part selections into contract-ready encrypted handles.
///
/// The six fields are encrypted concurrently, each as an unsigned 32-bit
/// integer bound to the handle's contract and the submitting user. The batch
/// is atomic: a single failing field fails the whole call and no partial
/// output escapes. Retry policy belongs to the caller.
pub struct PartEncryptor {
    handle: Arc<EngineHandle>,
    encrypt_timeout: Duration,
}

impl PartEncryptor {
    pub fn new(handle: Arc<EngineHandle>, encrypt_timeout: Duration) -> Self {
        Self {
            handle,
            encrypt_timeout,
        }
    }

    /// Build the production stack: a relayer connector behind a fresh
    /// single-flight engine handle bound to the configured contract.
    pub fn from_config(config: &ClientConfig) -> anyhow::Result<Self> {
        let connector = RelayerConnector::from_config(&config.engine)?;
        let handle = EngineHandle::new(
            Arc::new(connector),
            config.contract_address,
            StageTimeouts::from(&config.engine),
        );
        Ok(Self::new(Arc::new(handle), config.engine.encrypt_timeout()))
    }

    pub async fn encrypt_parts(
        &self,
        parts: &CharacterParts,
        user: Address,
    ) -> Result<EncryptedCharacterParts, EncryptError> {
        let engine = self.handle.acquire().await?;
        let [head, eyes, mouth, body, hat, accessory] = parts.as_array();
        let (head, eyes, mouth, body, hat, accessory) = futures::try_join!(
            self.encrypt_value(&engine, user, head),
            self.encrypt_value(&engine, user, eyes),
            self.encrypt_value(&engine, user, mouth),
            self.encrypt_value(&engine, user, body),
            self.encrypt_value(&engine, user, hat),
            self.encrypt_value(&engine, user, accessory),
        )?;
        let encrypted = EncryptedCharacterParts {
            head,
            eyes,
            mouth,
            body,
            hat,
            accessory,
        };
        for handle in encrypted.as_array() {
            Bytes32::parse_strict(&handle.to_hex())?;
        }
        debug!(%user, "encrypted all six character parts");
        Ok(encrypted)
    }

    async fn encrypt_value(
        &self,
        engine: &Arc<dyn EncryptionEngine>,
        user: Address,
        value: u32,
    ) -> Result<Bytes32, EncryptError> {
        let bytes = match timeout(self.encrypt_timeout, engine.encrypt_u32(user, value)).await {
            Ok(Ok(bytes)) => bytes,
            Ok(Err(err)) => return Err(EncryptError::Engine(err)),
            Err(_) => {
                return Err(EncryptError::Engine(EngineError::RequestTimeout {
                    timeout: self.encrypt_timeout,
                }))
            }
        };
        if bytes.is_empty() {
            return Err(EncryptError::Engine(EngineError::EmptyHandles));
        }
        Ok(Bytes32::from_bytes(&bytes))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EncryptError {
    #[error("encryption engine error: {0}")]
    Engine(#[from] EngineError),
    #[error("encrypted handle failed width validation: {0}")]
    Encoding(#[from] EncodingError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineConnector, StageTimeouts};
    use async_trait::async_trait;
    use std::collections::HashSet;

    fn user() -> Address {
        Address::from_bytes([0x11; 20])
    }

    fn contract() -> Address {
        Address::from_bytes([0x22; 20])
    }

    /// Deterministic engine; optionally fails one configured value.
    struct ScriptedEngine {
        fail_value: Option<u32>,
    }

    #[async_trait]
    impl EncryptionEngine for ScriptedEngine {
        async fn encrypt_u32(&self, user: Address, value: u32) -> Result<Vec<u8>, EngineError> {
            if self.fail_value == Some(value) {
                return Err(EngineError::RequestFailed {
                    reason: format!("scripted failure for value {value}"),
                });
            }
            let mut handle = user.as_bytes().to_vec();
            handle.extend_from_slice(&value.to_be_bytes());
            handle.push(0x5a);
            Ok(handle)
        }
    }

    struct InstantConnector {
        engine: Arc<dyn EncryptionEngine>,
    }

    #[async_trait]
    impl EngineConnector for InstantConnector {
        async fn load_module(&self) -> anyhow::Result<()> {
            Ok(())
        }

        async fn init_module(&self) -> anyhow::Result<()> {
            Ok(())
        }

        async fn create_instance(
            &self,
            _contract: Address,
        ) -> anyhow::Result<Arc<dyn EncryptionEngine>> {
            Ok(Arc::clone(&self.engine))
        }
    }

    fn encryptor(fail_value: Option<u32>) -> PartEncryptor {
        let connector = Arc::new(InstantConnector {
            engine: Arc::new(ScriptedEngine { fail_value }),
        });
        let handle = EngineHandle::new(
            connector,
            contract(),
            StageTimeouts {
                module_load: Duration::from_secs(1),
                module_init: Duration::from_secs(1),
                instance: Duration::from_secs(1),
            },
        );
        PartEncryptor::new(Arc::new(handle), Duration::from_secs(1))
    }

    #[tokio::test]
    async fn encrypts_all_six_fields_into_distinct_valid_handles() {
        let parts = CharacterParts::from_array([3, 1, 0, 5, 2, 7]);
        let encrypted = encryptor(None)
            .encrypt_parts(&parts, user())
            .await
            .expect("encrypt");

        let rendered: HashSet<String> = encrypted
            .as_array()
            .iter()
            .map(|handle| handle.to_hex())
            .collect();
        assert_eq!(rendered.len(), 6);
        for hex in &rendered {
            assert_eq!(hex.len(), 66);
            Bytes32::parse_strict(hex).expect("canonical handle");
        }
    }

    #[tokio::test]
    async fn one_failing_field_fails_the_whole_batch() {
        let parts = CharacterParts::from_array([3, 1, 0, 5, 2, 0]);
        let result = encryptor(Some(5)).encrypt_parts(&parts, user()).await;
        assert!(matches!(
            result,
            Err(EncryptError::Engine(EngineError::RequestFailed { .. }))
        ));
    }

    #[tokio::test]
    async fn empty_handle_lists_are_rejected() {
        struct EmptyEngine;

        #[async_trait]
        impl EncryptionEngine for EmptyEngine {
            async fn encrypt_u32(
                &self,
                _user: Address,
                _value: u32,
            ) -> Result<Vec<u8>, EngineError> {
                Ok(Vec::new())
            }
        }

        let connector = Arc::new(InstantConnector {
            engine: Arc::new(EmptyEngine),
        });
        let handle = EngineHandle::new(
            connector,
            contract(),
            StageTimeouts {
                module_load: Duration::from_secs(1),
                module_init: Duration::from_secs(1),
                instance: Duration::from_secs(1),
            },
        );
        let encryptor = PartEncryptor::new(Arc::new(handle), Duration::from_secs(1));

        let result = encryptor
            .encrypt_parts(&CharacterParts::default(), user())
            .await;
        assert!(matches!(
            result,
            Err(EncryptError::Engine(EngineError::EmptyHandles))
        ));
    }
}
