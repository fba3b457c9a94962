//! Stable peer identity and conversation identifiers.

use crate::CryptoError;
use rand_core::{CryptoRng, RngCore};

/// A peer's stable identity: a 32-byte Curve25519-style public key.
///
/// Canonical serialization is 64 lowercase hex characters.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address([u8; 32]);

impl Address {
    /// Wrap raw public-key bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Parse from 64 lowercase hex characters.
    pub fn from_hex(s: &str) -> crate::Result<Self> {
        if s.len() != 64 || !s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
            return Err(CryptoError::MalformedAddress(s.to_string()));
        }
        let decoded =
            hex::decode(s).map_err(|_| CryptoError::MalformedAddress(s.to_string()))?;
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&decoded);
        Ok(Self(bytes))
    }

    /// Raw 32-byte public key.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Canonical lowercase-hex rendering.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl std::fmt::Debug for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Address({})", self.to_hex())
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// A conversation identifier: 16 random bytes generated by the initiator.
///
/// Canonical serialization is 32 lowercase hex characters. Collision
/// resistance between any given pair of peers is assumed (2^-64).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConversationId([u8; 16]);

impl ConversationId {
    /// Generate a fresh random conversation id.
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let mut bytes = [0u8; 16];
        rng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Wrap raw bytes.
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Parse from 32 lowercase hex characters.
    pub fn from_hex(s: &str) -> crate::Result<Self> {
        if s.len() != 32 || !s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
            return Err(CryptoError::MalformedAddress(s.to_string()));
        }
        let decoded =
            hex::decode(s).map_err(|_| CryptoError::MalformedAddress(s.to_string()))?;
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&decoded);
        Ok(Self(bytes))
    }

    /// Raw 16-byte identifier.
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Canonical lowercase-hex rendering.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl std::fmt::Debug for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ConversationId({})", self.to_hex())
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}
