//! Fixed-width normalization of encryption-engine handles.
//!
//! The character contract stores every encrypted part as a `bytes32` value.
//! Engines hand back raw bytes or hex strings of varying width, so every
//! handle funnels through [`Bytes32`] before it is allowed near a contract
//! call: longer inputs keep their FIRST 32 bytes (the tail is padding the
//! engine appends, the head is the authoritative handle), shorter inputs are
//! zero-extended.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Rendered width of a [`Bytes32`]: `0x` plus 64 hex digits.
pub const BYTES32_HEX_LEN: usize = 66;

/// Exact 32-byte value with a canonical `0x`-prefixed lowercase hex form.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Bytes32([u8; 32]);

impl Bytes32 {
    pub const ZERO: Bytes32 = Bytes32([0u8; 32]);

    /// Normalize a raw byte sequence: keep the first 32 bytes, zero-pad on
    /// the right when shorter.
    pub fn from_bytes(input: &[u8]) -> Self {
        let mut out = [0u8; 32];
        let len = input.len().min(32);
        out[..len].copy_from_slice(&input[..len]);
        Self(out)
    }

    /// Normalize a text value through its UTF-8 bytes.
    pub fn from_text(input: &str) -> Self {
        Self::from_bytes(input.as_bytes())
    }

    /// Normalize a string handle. Well-formed `0x` hex is parsed directly
    /// (idempotent fast path); over-long hex keeps its first 64 digits;
    /// short hex is left-zero-padded; anything without a `0x` prefix is
    /// treated as text.
    pub fn normalize(input: &str) -> Result<Self, EncodingError> {
        let Some(body) = input.strip_prefix("0x") else {
            return Ok(Self::from_text(input));
        };
        if !body.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(EncodingError::NonHex {
                input: input.to_string(),
            });
        }
        let padded;
        let digits = if body.len() > 64 {
            &body[..64]
        } else if body.len() < 64 {
            padded = format!("{body:0>64}");
            &padded
        } else {
            body
        };
        let mut out = [0u8; 32];
        hex::decode_to_slice(digits.to_ascii_lowercase(), &mut out)
            .map_err(|_| EncodingError::NonHex {
                input: input.to_string(),
            })?;
        Ok(Self(out))
    }

    /// Parse a string that must already be a canonical 66-character hex
    /// rendering. Rejects anything else instead of coercing it.
    pub fn parse_strict(input: &str) -> Result<Self, EncodingError> {
        let body = input
            .strip_prefix("0x")
            .ok_or(EncodingError::MissingPrefix)?;
        if input.len() != BYTES32_HEX_LEN {
            return Err(EncodingError::Width {
                chars: input.len(),
            });
        }
        let mut out = [0u8; 32];
        hex::decode_to_slice(body.to_ascii_lowercase(), &mut out)
            .map_err(|_| EncodingError::NonHex {
                input: input.to_string(),
            })?;
        Ok(Self(out))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Canonical `0x`-prefixed lowercase rendering, always 66 characters.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Display for Bytes32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for Bytes32 {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Bytes32 {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Bytes32::parse_strict(&value).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EncodingError {
    #[error("expected {expected} characters (0x + 64 hex digits), got {chars}", expected = BYTES32_HEX_LEN)]
    Width { chars: usize },
    #[error("value is not valid hex: {input:?}")]
    NonHex { input: String },
    #[error("value is missing the 0x prefix")]
    MissingPrefix,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_canonical(rendered: &str) {
        assert_eq!(rendered.len(), BYTES32_HEX_LEN);
        assert!(rendered.starts_with("0x"));
        assert!(rendered[2..]
            .chars()
            .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn every_byte_length_renders_to_exact_width() {
        for len in 0..200usize {
            let input: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
            assert_canonical(&Bytes32::from_bytes(&input).to_hex());
        }
    }

    #[test]
    fn truncation_keeps_the_first_32_bytes() {
        let input: Vec<u8> = (1..=40u8).collect();
        let encoded = Bytes32::from_bytes(&input);
        assert_eq!(encoded.as_bytes(), &<[u8; 32]>::try_from(&input[..32]).unwrap());
        assert_eq!(encoded.to_hex(), format!("0x{}", hex::encode(&input[..32])));
    }

    #[test]
    fn short_input_is_right_padded() {
        let encoded = Bytes32::from_bytes(&[0xde, 0xad]);
        assert_eq!(&encoded.as_bytes()[..2], &[0xde, 0xad]);
        assert!(encoded.as_bytes()[2..].iter().all(|b| *b == 0));
    }

    #[test]
    fn normalize_is_idempotent_on_canonical_strings() {
        let canonical = Bytes32::from_bytes(&[7u8; 32]).to_hex();
        let once = Bytes32::normalize(&canonical).expect("first pass");
        let twice = Bytes32::normalize(&once.to_hex()).expect("second pass");
        assert_eq!(once, twice);
        assert_eq!(once.to_hex(), canonical);
    }

    #[test]
    fn normalize_accepts_uppercase_hex() {
        let upper = format!("0x{}", "AB".repeat(32));
        let encoded = Bytes32::normalize(&upper).expect("uppercase");
        assert_eq!(encoded.to_hex(), format!("0x{}", "ab".repeat(32)));
    }

    #[test]
    fn over_long_hex_keeps_leading_digits() {
        let long = format!("0x{}{}", "11".repeat(32), "ff".repeat(4));
        let encoded = Bytes32::normalize(&long).expect("overlong");
        assert_eq!(encoded.as_bytes(), &[0x11u8; 32]);
    }

    #[test]
    fn short_hex_is_left_zero_padded() {
        let encoded = Bytes32::normalize("0x2a").expect("short hex");
        assert_eq!(encoded.as_bytes()[31], 0x2a);
        assert!(encoded.as_bytes()[..31].iter().all(|b| *b == 0));
    }

    #[test]
    fn non_prefixed_input_falls_back_to_text() {
        let encoded = Bytes32::normalize("hello").expect("text");
        assert_eq!(&encoded.as_bytes()[..5], b"hello");
        assert_canonical(&encoded.to_hex());
    }

    #[test]
    fn strict_parse_rejects_malformed_values() {
        assert!(matches!(
            Bytes32::parse_strict("0x1234"),
            Err(EncodingError::Width { chars: 6 })
        ));
        assert!(matches!(
            Bytes32::parse_strict(&format!("0x{}", "zz".repeat(32))),
            Err(EncodingError::NonHex { .. })
        ));
        let no_prefix = "11".repeat(33);
        assert_eq!(
            Bytes32::parse_strict(&no_prefix),
            Err(EncodingError::MissingPrefix)
        );
    }
}
