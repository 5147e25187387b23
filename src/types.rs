use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::encoding::Bytes32;

/// Chain-assigned character identifier, stable for the character's lifetime.
pub type CharacterId = u64;

/// Plaintext part selection for one character. Each field indexes into the
/// fixed part catalog; the UI constrains the ranges upstream.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterParts {
    pub head: u32,
    pub eyes: u32,
    pub mouth: u32,
    pub body: u32,
    pub hat: u32,
    pub accessory: u32,
}

impl CharacterParts {
    pub fn as_array(&self) -> [u32; 6] {
        [
            self.head,
            self.eyes,
            self.mouth,
            self.body,
            self.hat,
            self.accessory,
        ]
    }

    pub fn from_array(values: [u32; 6]) -> Self {
        let [head, eyes, mouth, body, hat, accessory] = values;
        Self {
            head,
            eyes,
            mouth,
            body,
            hat,
            accessory,
        }
    }
}

/// The only representation of parts that ever leaves the client: six opaque
/// 32-byte handles bound to a (contract, user) pair. Never reversible here.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedCharacterParts {
    pub head: Bytes32,
    pub eyes: Bytes32,
    pub mouth: Bytes32,
    pub body: Bytes32,
    pub hat: Bytes32,
    pub accessory: Bytes32,
}

impl EncryptedCharacterParts {
    pub fn as_array(&self) -> [Bytes32; 6] {
        [
            self.head,
            self.eyes,
            self.mouth,
            self.body,
            self.hat,
            self.accessory,
        ]
    }
}

/// On-chain character state as returned by `getCharacter`: opaque handles
/// plus the public metadata the contract keeps in the clear.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterRecord {
    pub id: CharacterId,
    pub parts: EncryptedCharacterParts,
    pub name: String,
    pub owner: Address,
    pub created_at: u64,
    pub updated_at: u64,
    pub is_public: bool,
}

impl CharacterRecord {
    /// The contract reports deleted or never-created slots with a zero owner.
    pub fn is_deleted(&self) -> bool {
        self.owner.is_zero()
    }
}

/// Renderable character: public metadata joined with the locally cached
/// plaintext parts. `parts_recovered` is false when no cache entry existed
/// and the zero-valued fallback is shown instead.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CharacterView {
    pub id: CharacterId,
    pub parts: CharacterParts,
    pub parts_recovered: bool,
    pub name: String,
    pub owner: Address,
    pub created_at: u64,
    pub updated_at: u64,
    pub is_public: bool,
}

impl CharacterView {
    /// Join an on-chain record with an optional cache hit. Absence of cached
    /// plaintext is a normal state (new device, cleared storage) and falls
    /// back to all-zero parts.
    pub fn assemble(record: CharacterRecord, cached: Option<CharacterParts>) -> Self {
        let parts_recovered = cached.is_some();
        Self {
            id: record.id,
            parts: cached.unwrap_or_default(),
            parts_recovered,
            name: record.name,
            owner: record.owner,
            created_at: record.created_at,
            updated_at: record.updated_at,
            is_public: record.is_public,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(owner: Address) -> CharacterRecord {
        CharacterRecord {
            id: 7,
            parts: EncryptedCharacterParts {
                head: Bytes32::ZERO,
                eyes: Bytes32::ZERO,
                mouth: Bytes32::ZERO,
                body: Bytes32::ZERO,
                hat: Bytes32::ZERO,
                accessory: Bytes32::ZERO,
            },
            name: "pixel".to_string(),
            owner,
            created_at: 10,
            updated_at: 20,
            is_public: true,
        }
    }

    #[test]
    fn view_defaults_to_zero_parts_without_cache() {
        let owner = Address::from_bytes([1u8; 20]);
        let view = CharacterView::assemble(record(owner), None);
        assert!(!view.parts_recovered);
        assert_eq!(view.parts, CharacterParts::default());
        assert_eq!(view.name, "pixel");
    }

    #[test]
    fn view_prefers_cached_plaintext() {
        let owner = Address::from_bytes([1u8; 20]);
        let cached = CharacterParts::from_array([3, 1, 0, 5, 2, 0]);
        let view = CharacterView::assemble(record(owner), Some(cached));
        assert!(view.parts_recovered);
        assert_eq!(view.parts, cached);
    }

    #[test]
    fn zero_owner_marks_deletion() {
        assert!(record(Address::ZERO).is_deleted());
        assert!(!record(Address::from_bytes([9u8; 20])).is_deleted());
    }
}
