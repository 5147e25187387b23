//! Boundary with the on-chain character manager.
//!
//! The contract ABI is consumed, not re-specified: create takes a name, six
//! encrypted handles, and a visibility flag; update takes an id plus six
//! handles; reads return the handles alongside public metadata. Handles
//! returned by reads are never decoded client-side.

use std::collections::BTreeMap;

use anyhow::Error as AnyError;
use async_trait::async_trait;
use parking_lot::Mutex;
use thiserror::Error;

use crate::address::Address;
use crate::encoding::Bytes32;
use crate::types::{CharacterId, CharacterRecord, EncryptedCharacterParts};

/// Handle for a submitted transaction awaiting its receipt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TxSubmission {
    pub tx_hash: Bytes32,
}

/// Outcome of a mined transaction. `character_id` is populated for creations
/// once the chain has assigned the new id.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TxReceipt {
    pub tx_hash: Bytes32,
    pub confirmed: bool,
    pub character_id: Option<CharacterId>,
}

#[derive(Debug, Error)]
pub enum ContractError {
    /// Networking or RPC failures between the client and the chain.
    #[error("contract transport error: {0}")]
    Transport(#[from] AnyError),
    /// The contract rejected the call before mining.
    #[error("contract call rejected: {reason}")]
    Rejected { reason: String },
    /// No receipt is known for the submission.
    #[error("unknown transaction {tx_hash}")]
    UnknownTransaction { tx_hash: Bytes32 },
}

impl ContractError {
    pub fn transport(error: impl Into<AnyError>) -> Self {
        Self::Transport(error.into())
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected {
            reason: reason.into(),
        }
    }
}

/// Abstraction over the character manager calls consumed by this crate.
#[async_trait]
pub trait CharacterContract: Send + Sync {
    async fn create_character(
        &self,
        name: &str,
        parts: &EncryptedCharacterParts,
        is_public: bool,
    ) -> Result<TxSubmission, ContractError>;

    async fn update_character(
        &self,
        id: CharacterId,
        parts: &EncryptedCharacterParts,
    ) -> Result<TxSubmission, ContractError>;

    /// Read one character. Absent and deleted slots both report as `None`.
    async fn get_character(
        &self,
        id: CharacterId,
    ) -> Result<Option<CharacterRecord>, ContractError>;

    async fn wait_for_receipt(
        &self,
        submission: &TxSubmission,
    ) -> Result<TxReceipt, ContractError>;
}

/// In-memory contract double used in tests and local harnesses.
///
/// Transactions confirm immediately unless a failure is scripted with
/// [`StubCharacterContract::fail_next_receipt`]; a failed receipt leaves the
/// simulated chain state untouched, like a reverted transaction.
pub struct StubCharacterContract {
    owner: Address,
    state: Mutex<StubState>,
}

#[derive(Default)]
struct StubState {
    next_id: CharacterId,
    next_tx: u64,
    clock: u64,
    fail_next_receipt: bool,
    characters: BTreeMap<CharacterId, CharacterRecord>,
    receipts: BTreeMap<[u8; 32], TxReceipt>,
}

impl StubCharacterContract {
    pub fn new(owner: Address) -> Self {
        Self {
            owner,
            state: Mutex::new(StubState::default()),
        }
    }

    /// Script the next submission to mine as a failed transaction.
    pub fn fail_next_receipt(&self) {
        self.state.lock().fail_next_receipt = true;
    }

    /// Direct view of the simulated on-chain record.
    pub fn character(&self, id: CharacterId) -> Option<CharacterRecord> {
        self.state.lock().characters.get(&id).cloned()
    }

    /// Simulate an on-chain deletion: the slot keeps its handles but reports
    /// the zero owner.
    pub fn mark_deleted(&self, id: CharacterId) {
        let mut state = self.state.lock();
        if let Some(record) = state.characters.get_mut(&id) {
            record.owner = Address::ZERO;
        }
    }

    fn next_submission(state: &mut StubState) -> TxSubmission {
        state.next_tx += 1;
        let mut seed = [0u8; 32];
        seed[24..].copy_from_slice(&state.next_tx.to_be_bytes());
        TxSubmission {
            tx_hash: Bytes32::from_bytes(&seed),
        }
    }

    fn stage_receipt(state: &mut StubState, submission: TxSubmission, id: Option<CharacterId>) {
        let confirmed = !std::mem::take(&mut state.fail_next_receipt);
        state.receipts.insert(
            *submission.tx_hash.as_bytes(),
            TxReceipt {
                tx_hash: submission.tx_hash,
                confirmed,
                character_id: confirmed.then_some(id).flatten(),
            },
        );
    }

    fn receipt_will_confirm(state: &StubState) -> bool {
        !state.fail_next_receipt
    }
}

#[async_trait]
impl CharacterContract for StubCharacterContract {
    async fn create_character(
        &self,
        name: &str,
        parts: &EncryptedCharacterParts,
        is_public: bool,
    ) -> Result<TxSubmission, ContractError> {
        if name.trim().is_empty() {
            return Err(ContractError::rejected("character name must not be empty"));
        }
        let mut state = self.state.lock();
        let submission = Self::next_submission(&mut state);
        state.clock += 1;
        let now = state.clock;
        let id = state.next_id;
        if Self::receipt_will_confirm(&state) {
            state.next_id += 1;
            state.characters.insert(
                id,
                CharacterRecord {
                    id,
                    parts: *parts,
                    name: name.to_string(),
                    owner: self.owner,
                    created_at: now,
                    updated_at: now,
                    is_public,
                },
            );
        }
        Self::stage_receipt(&mut state, submission, Some(id));
        Ok(submission)
    }

    async fn update_character(
        &self,
        id: CharacterId,
        parts: &EncryptedCharacterParts,
    ) -> Result<TxSubmission, ContractError> {
        let mut state = self.state.lock();
        if !state.characters.contains_key(&id) {
            return Err(ContractError::rejected(format!("unknown character {id}")));
        }
        let submission = Self::next_submission(&mut state);
        state.clock += 1;
        let now = state.clock;
        if Self::receipt_will_confirm(&state) {
            if let Some(record) = state.characters.get_mut(&id) {
                record.parts = *parts;
                record.updated_at = now;
            }
        }
        Self::stage_receipt(&mut state, submission, None);
        Ok(submission)
    }

    async fn get_character(
        &self,
        id: CharacterId,
    ) -> Result<Option<CharacterRecord>, ContractError> {
        Ok(self.state.lock().characters.get(&id).cloned())
    }

    async fn wait_for_receipt(
        &self,
        submission: &TxSubmission,
    ) -> Result<TxReceipt, ContractError> {
        self.state
            .lock()
            .receipts
            .get(submission.tx_hash.as_bytes())
            .copied()
            .ok_or(ContractError::UnknownTransaction {
                tx_hash: submission.tx_hash,
            })
    }
}
