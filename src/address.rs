use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// 20-byte account or contract address in canonical lowercase hex form.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Address([u8; 20]);

impl Address {
    /// All-zero address; returned by the chain for deleted or absent records.
    pub const ZERO: Address = Address([0u8; 20]);

    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }

    /// Parse a user- or environment-supplied address, repairing the common
    /// `Ox` typo and a missing `0x` prefix before validating.
    pub fn normalize(input: &str) -> Result<Self, AddressError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(AddressError::Empty);
        }
        let body = if let Some(rest) = trimmed.strip_prefix("0x").or_else(|| {
            trimmed
                .strip_prefix("Ox")
                .or_else(|| trimmed.strip_prefix("OX"))
                .or_else(|| trimmed.strip_prefix("0X"))
        }) {
            rest
        } else {
            trimmed
        };
        if body.len() != 40 {
            return Err(AddressError::Length { chars: body.len() });
        }
        let mut bytes = [0u8; 20];
        hex::decode_to_slice(body.to_ascii_lowercase(), &mut bytes)
            .map_err(|_| AddressError::NonHex)?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::normalize(s)
    }
}

impl Serialize for Address {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Address::normalize(&value).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AddressError {
    #[error("address is empty")]
    Empty,
    #[error("address must contain 40 hex digits, got {chars}")]
    Length { chars: usize },
    #[error("address contains non-hex characters")]
    NonHex,
}
