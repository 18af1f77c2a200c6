//! Identifier types for BridgeLedger entities.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::ConversionError;

/// Length in bytes of a source-chain transaction identifier.
pub const SOURCE_TX_ID_LEN: usize = 32;

/// Identifier of a transaction on the source chain.
///
/// Stored as raw bytes and compared byte-for-byte. The hex text form is
/// only an encoding of those bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SourceTxId([u8; SOURCE_TX_ID_LEN]);

impl SourceTxId {
    /// Create from raw bytes.
    pub fn from_bytes(bytes: [u8; SOURCE_TX_ID_LEN]) -> Self {
        Self(bytes)
    }

    /// Create from a byte slice, which must be exactly 32 bytes long.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ConversionError> {
        let bytes: [u8; SOURCE_TX_ID_LEN] = bytes.try_into().map_err(|_| {
            ConversionError::invalid_field(
                format!(
                    "source tx id must be {} bytes, got {}",
                    SOURCE_TX_ID_LEN,
                    bytes.len()
                ),
                "source_tx_id",
            )
        })?;
        Ok(Self(bytes))
    }

    /// Parse from exactly 64 upper-case hex characters.
    ///
    /// The text must already be in canonical form: no `0x` prefix, no
    /// lower-case digits, no surrounding whitespace. Variants are rejected
    /// rather than folded onto the same id.
    pub fn parse(s: &str) -> Result<Self, ConversionError> {
        if s.len() != SOURCE_TX_ID_LEN * 2 {
            return Err(ConversionError::invalid_field(
                format!(
                    "source tx id must be {} hex characters, got {}",
                    SOURCE_TX_ID_LEN * 2,
                    s.len()
                ),
                "source_tx_id",
            ));
        }
        if let Some(c) = s
            .chars()
            .find(|c| !matches!(c, '0'..='9' | 'A'..='F'))
        {
            return Err(ConversionError::invalid_field(
                format!("source tx id must be upper-case hex, found {:?}", c),
                "source_tx_id",
            ));
        }

        let bytes = hex::decode(s).map_err(|e| {
            ConversionError::invalid_field(format!("source tx id is not hex: {}", e), "source_tx_id")
        })?;
        Self::from_slice(&bytes)
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; SOURCE_TX_ID_LEN] {
        &self.0
    }

    /// Get the upper-case hex encoding.
    pub fn to_hex(&self) -> String {
        hex::encode_upper(self.0)
    }

    /// Abbreviated form for log lines, `1A2B3C4D...34567890`.
    pub fn short(&self) -> String {
        let hex = self.to_hex();
        format!("{}...{}", &hex[..8], &hex[hex.len() - 8..])
    }
}

impl fmt::Display for SourceTxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for SourceTxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SourceTxId({})", self.short())
    }
}

impl std::str::FromStr for SourceTxId {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for SourceTxId {
    type Error = ConversionError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<SourceTxId> for String {
    fn from(id: SourceTxId) -> Self {
        id.to_hex()
    }
}

/// Account that submitted a conversion.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountId(String);

impl AccountId {
    /// Create a new account ID.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Validate the account ID format.
    pub fn is_valid(&self) -> bool {
        !self.0.is_empty()
            && self.0.len() <= 128
            && self.0.chars().all(|c| c.is_ascii_graphic())
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AccountId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for AccountId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Unique identifier for an accepted conversion record.
/// Uses UUID v7 so records sort by creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordId(Uuid);

impl RecordId {
    /// Create a new record ID.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HASH: &str = "1A2B3C4D5E6F7890ABCDEF1234567890ABCDEF1234567890ABCDEF1234567890";

    #[test]
    fn test_source_tx_id_parse() {
        let id = SourceTxId::parse(HASH).unwrap();
        assert_eq!(id.to_hex(), HASH);
        assert_eq!(id.as_bytes()[0], 0x1A);
        assert_eq!(id.short(), "1A2B3C4D...34567890");
    }

    #[test]
    fn test_source_tx_id_rejects_non_canonical_text() {
        for variant in [
            HASH.to_lowercase(),
            format!("0x{}", HASH),
            format!("0X{}", &HASH[2..]),
            format!(" {}", &HASH[1..]),
        ] {
            let err = SourceTxId::parse(&variant).unwrap_err();
            assert_eq!(err.error_code(), "INVALID_REQUEST");
        }

        let mixed = format!("{}b{}", &HASH[..10], &HASH[11..]);
        assert_eq!(mixed.len(), 64);
        assert!(SourceTxId::parse(&mixed).is_err());
    }

    #[test]
    fn test_source_tx_id_wrong_length() {
        let err = SourceTxId::parse(&HASH[..63]).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_REQUEST");

        let err = SourceTxId::from_slice(&[0u8; 31]).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_REQUEST");
    }

    #[test]
    fn test_source_tx_id_not_hex() {
        let bad = "BATCH3456789012CDEF0123456789ABCDEF0123456789ABCDEF0123456789CDE";
        assert_eq!(bad.len(), 64);
        assert!(SourceTxId::parse(bad).is_err());
    }

    #[test]
    fn test_source_tx_id_byte_equality() {
        let mut bytes = [0u8; SOURCE_TX_ID_LEN];
        let a = SourceTxId::from_bytes(bytes);
        bytes[31] = 1;
        let b = SourceTxId::from_bytes(bytes);
        assert_ne!(a, b);
    }

    #[test]
    fn test_source_tx_id_serde_hex() {
        let id = SourceTxId::parse(HASH).unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", HASH));

        let back: SourceTxId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
        assert!(serde_json::from_str::<SourceTxId>(&json.to_lowercase()).is_err());
        assert!(serde_json::from_str::<SourceTxId>("\"abc\"").is_err());
    }

    #[test]
    fn test_account_id_validation() {
        assert!(AccountId::new("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266").is_valid());
        assert!(!AccountId::new("").is_valid());
        assert!(!AccountId::new("has space").is_valid());
    }

    #[test]
    fn test_record_id_unique() {
        assert_ne!(RecordId::new(), RecordId::new());
    }
}
