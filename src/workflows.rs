//! Create, update, and load orchestration over the contract boundary.

use std::sync::Arc;

use tracing::info;

use crate::address::Address;
use crate::cache::PartsCache;
use crate::contract::{CharacterContract, ContractError};
use crate::encoding::Bytes32;
use crate::encryptor::{EncryptError, PartEncryptor};
use crate::types::{CharacterId, CharacterParts, CharacterView};

/// High-level facade tying together encryption, contract calls, and the
/// plaintext cache.
///
/// Cache writes are gated on a confirmed receipt: a submission that reverts
/// must not leave the cache claiming parts the chain never accepted. A
/// receipt-confirmed write that then fails to persist only degrades later
/// renders to the zero fallback.
pub struct CharacterWorkflows {
    contract: Arc<dyn CharacterContract>,
    encryptor: PartEncryptor,
    cache: PartsCache,
}

impl CharacterWorkflows {
    pub fn new(
        contract: Arc<dyn CharacterContract>,
        encryptor: PartEncryptor,
        cache: PartsCache,
    ) -> Self {
        Self {
            contract,
            encryptor,
            cache,
        }
    }

    /// Assemble the production stack from configuration, leaving only the
    /// contract transport to the caller.
    pub fn from_config(
        config: &crate::config::ClientConfig,
        contract: Arc<dyn CharacterContract>,
    ) -> anyhow::Result<Self> {
        Ok(Self::new(
            contract,
            PartEncryptor::from_config(config)?,
            PartsCache::open(config.cache.data_dir.clone()),
        ))
    }

    /// Encrypt `parts`, submit the creation, await its receipt, and cache the
    /// plaintext under the chain-assigned id.
    pub async fn create_character(
        &self,
        name: &str,
        parts: CharacterParts,
        is_public: bool,
        user: Address,
    ) -> Result<CharacterId, WorkflowError> {
        let encrypted = self.encryptor.encrypt_parts(&parts, user).await?;
        let submission = self
            .contract
            .create_character(name, &encrypted, is_public)
            .await?;
        let receipt = self.contract.wait_for_receipt(&submission).await?;
        if !receipt.confirmed {
            return Err(WorkflowError::TransactionFailed {
                tx_hash: receipt.tx_hash,
            });
        }
        let id = receipt
            .character_id
            .ok_or(WorkflowError::MissingCharacterId)?;
        self.cache.put(id, &parts);
        info!(id, name, "character created");
        Ok(id)
    }

    /// Encrypt `parts` and overwrite an existing character, updating the
    /// cache once the receipt confirms.
    pub async fn update_character(
        &self,
        id: CharacterId,
        parts: CharacterParts,
        user: Address,
    ) -> Result<(), WorkflowError> {
        let encrypted = self.encryptor.encrypt_parts(&parts, user).await?;
        let submission = self.contract.update_character(id, &encrypted).await?;
        let receipt = self.contract.wait_for_receipt(&submission).await?;
        if !receipt.confirmed {
            return Err(WorkflowError::TransactionFailed {
                tx_hash: receipt.tx_hash,
            });
        }
        self.cache.put(id, &parts);
        info!(id, "character updated");
        Ok(())
    }

    /// Read one character and join it with the local plaintext cache.
    /// Deleted and absent slots both yield `None`.
    pub async fn load_character(
        &self,
        id: CharacterId,
    ) -> Result<Option<CharacterView>, WorkflowError> {
        let Some(record) = self.contract.get_character(id).await? else {
            return Ok(None);
        };
        if record.is_deleted() {
            return Ok(None);
        }
        let cached = self.cache.get(id);
        Ok(Some(CharacterView::assemble(record, cached)))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Encrypt(#[from] EncryptError),
    #[error(transparent)]
    Contract(#[from] ContractError),
    #[error("transaction {tx_hash} failed on-chain")]
    TransactionFailed { tx_hash: Bytes32 },
    #[error("creation receipt did not report a character id")]
    MissingCharacterId,
}
