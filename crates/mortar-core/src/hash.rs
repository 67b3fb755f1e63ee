//! Package identity hashing.
//!
//! A `PackageId` is a fixed-width blake3 value representing everything that
//! affects the binary produced for one graph node. `IdHasher` builds one
//! from length-prefixed, domain-tagged fields so the combination is
//! unambiguous and stable across runs and platforms.

use std::fmt;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{MortarError, MortarResult};

/// Deterministic binary identity of one resolved graph node
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PackageId([u8; 32]);

impl PackageId {
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Render as lowercase hex
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from a hex string
    pub fn from_hex(hex_str: &str) -> MortarResult<Self> {
        let bytes = hex::decode(hex_str).map_err(|e| MortarError::LockSnapshot {
            message: format!("invalid package id '{hex_str}': {e}"),
        })?;
        let bytes: [u8; 32] = bytes.try_into().map_err(|_| MortarError::LockSnapshot {
            message: format!("package id '{hex_str}' is not 32 bytes"),
        })?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PackageId({})", self.to_hex())
    }
}

impl Serialize for PackageId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for PackageId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hex_str = String::deserialize(deserializer)?;
        PackageId::from_hex(&hex_str).map_err(D::Error::custom)
    }
}

/// Incremental builder for a [`PackageId`]
///
/// Every input is framed: fields carry a domain tag, texts carry a length
/// prefix. Two different input sequences can never collide by concatenation.
pub struct IdHasher {
    inner: blake3::Hasher,
}

impl IdHasher {
    pub fn new() -> Self {
        Self {
            inner: blake3::Hasher::new(),
        }
    }

    /// Open a tagged field ("settings", "requires", ...)
    pub fn field(&mut self, tag: &str) -> &mut Self {
        self.inner.update(&[0xff]);
        self.text(tag)
    }

    /// Add one length-prefixed text
    pub fn text(&mut self, s: &str) -> &mut Self {
        self.inner.update(&(s.len() as u64).to_le_bytes());
        self.inner.update(s.as_bytes());
        self
    }

    /// Add one key=value entry
    pub fn pair(&mut self, key: &str, value: &str) -> &mut Self {
        self.text(key).text(value)
    }

    /// Add raw bytes (already fixed-width, e.g. a dependency's id)
    pub fn raw(&mut self, bytes: &[u8; 32]) -> &mut Self {
        self.inner.update(bytes);
        self
    }

    pub fn finalize(&self) -> PackageId {
        PackageId(*self.inner.finalize().as_bytes())
    }
}

impl Default for IdHasher {
    fn default() -> Self {
        Self::new()
    }
}
