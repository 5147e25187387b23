//! Client-side adapter between the pixel character UI and the chain.
//!
//! The chain only ever stores encrypted part handles, so this crate covers
//! the whole plaintext/ciphertext seam: a single-flight handle to the FHE
//! engine ([`engine::EngineHandle`]), batch encryption of the six part
//! indices ([`encryptor::PartEncryptor`]), fixed-width normalization of the
//! resulting handles ([`encoding::Bytes32`]), and a durable local cache of
//! the submitted plaintext ([`cache::PartsCache`]) that later reads join
//! against on-chain public metadata.

pub mod address;
pub mod cache;
pub mod config;
pub mod contract;
pub mod encoding;
pub mod encryptor;
pub mod engine;
pub mod types;
pub mod workflows;


pub use address::Address;
pub use cache::PartsCache;
pub use config::ClientConfig;
pub use contract::{CharacterContract, ContractError, TxReceipt, TxSubmission};
pub use encoding::{Bytes32, EncodingError};
pub use encryptor::{EncryptError, PartEncryptor};
pub use engine::{EncryptionEngine, EngineError, EngineHandle, RelayerConnector};
pub use types::{
    CharacterId, CharacterParts, CharacterRecord, CharacterView, EncryptedCharacterParts,
};
pub use workflows::{CharacterWorkflows, WorkflowError};
