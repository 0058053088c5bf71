use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// A 32-byte account identifier.
///
/// Accounts are the parties of the ledger: program receivers, donors, and
/// anyone calling `complete`/`cancel`. The all-zero identifier is reserved
/// as the "null" account and is never a valid receiver.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountId {
    bytes: [u8; 32],
}

impl AccountId {
    /// The reserved zero account.
    pub const ZERO: Self = Self { bytes: [0; 32] };

    /// Create from raw bytes.
    pub const fn from_raw(bytes: [u8; 32]) -> Self {
        Self { bytes }
    }

    /// Derive an account deterministically from a human-readable label.
    ///
    /// Used by scripts and tests to name parties (`"alice"`, `"shelter"`)
    /// without handling raw keys. The same label always yields the same id.
    pub fn from_label(label: &str) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"charity-account-v1:");
        hasher.update(label.as_bytes());
        Self {
            bytes: *hasher.finalize().as_bytes(),
        }
    }

    /// Returns `true` for the reserved zero account.
    pub fn is_zero(&self) -> bool {
        self.bytes == [0; 32]
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }

    /// Full hex-encoded string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }

    /// Short identifier (first 8 hex characters).
    pub fn short_id(&self) -> String {
        format!("acct:{}", hex::encode(&self.bytes[..4]))
    }

    /// Parse from a hex string (64 hex characters, optional `0x` prefix).
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        if bytes.len() != 32 {
            return Err(TypeError::InvalidLength {
                expected: 32,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self { bytes: arr })
    }

    /// Parse a script-friendly account reference.
    ///
    /// `"zero"` is the zero account and a `0x` prefix marks a raw hex id,
    /// which must then be exactly 64 hex characters. Anything else is a
    /// label, so a bare 64-character hex string names a label, not that id.
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(TypeError::EmptyLabel);
        }
        if trimmed.eq_ignore_ascii_case("zero") {
            return Ok(Self::ZERO);
        }
        match trimmed.strip_prefix("0x") {
            Some(hex_part) => Self::from_hex(hex_part),
            None => Ok(Self::from_label(trimmed)),
        }
    }
}

impl FromStr for AccountId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Debug for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountId({})", self.short_id())
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.short_id())
    }
}
