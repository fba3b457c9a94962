//! Long-term Curve25519 identity key-pair.
//!
//! This is the stable key that `Address` identifies; it is generated once
//! per installation and used as the `local_static` key in every Noise-IK
//! handshake. Encrypting it at rest under a passphrase is the CLI's concern
//! ([`ssyk_cli`]'s keyfile module) -- this type only knows about the raw key
//! material.

use crate::{Address, CryptoError};
use rand_core::{CryptoRng, RngCore};
use zeroize::Zeroize;

/// A Curve25519 static key-pair used as our long-term identity.
pub struct Identity {
    private: [u8; 32],
    public: [u8; 32],
}

impl Identity {
    /// Generate a fresh random identity.
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let secret = x25519_dalek::StaticSecret::random_from_rng(rng);
        let public = x25519_dalek::PublicKey::from(&secret);
        Self {
            private: secret.to_bytes(),
            public: public.to_bytes(),
        }
    }

    /// Reconstruct from raw private-key bytes (the public key is re-derived).
    pub fn from_private_bytes(private: [u8; 32]) -> Self {
        let secret = x25519_dalek::StaticSecret::from(private);
        let public = x25519_dalek::PublicKey::from(&secret);
        Self {
            private: secret.to_bytes(),
            public: public.to_bytes(),
        }
    }

    /// Our stable address (public key).
    pub fn address(&self) -> Address {
        Address::from_bytes(self.public)
    }

    /// Raw private-key bytes.
    ///
    /// Handle with care: this is the long-term identity secret.
    pub fn private_bytes(&self) -> &[u8; 32] {
        &self.private
    }

    /// Raw public-key bytes.
    pub fn public_bytes(&self) -> &[u8; 32] {
        &self.public
    }

    /// Parse a peer's public key from its hex address.
    pub fn parse_peer_key(hex_address: &str) -> crate::Result<[u8; 32]> {
        Ok(*Address::from_hex(hex_address)
            .map_err(|_| CryptoError::MalformedAddress(hex_address.to_string()))?
            .as_bytes())
    }
}

impl Drop for Identity {
    fn drop(&mut self) {
        self.private.zeroize();
    }
}

impl Clone for Identity {
    fn clone(&self) -> Self {
        Self {
            private: self.private,
            public: self.public,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_core::OsRng;

    #[test]
    fn generate_produces_matching_address() {
        let id = Identity::generate(&mut OsRng);
        assert_eq!(id.address().as_bytes(), id.public_bytes());
    }

    #[test]
    fn from_private_bytes_is_deterministic() {
        let id1 = Identity::from_private_bytes([0x42; 32]);
        let id2 = Identity::from_private_bytes([0x42; 32]);
        assert_eq!(id1.public_bytes(), id2.public_bytes());
    }

    #[test]
    fn two_generated_identities_differ() {
        let a = Identity::generate(&mut OsRng);
        let b = Identity::generate(&mut OsRng);
        assert_ne!(a.public_bytes(), b.public_bytes());
    }
}
