//! The symmetric duplex transcript primitive.
//!
//! `DuplexTranscript` is the trait the cryptographic core consumes; per the
//! scope notes in the spec, a Strobe-style duplex AEAD transcript is an
//! external, pluggable collaborator. [`DuplexState`] is the concrete,
//! swappable implementation shipped here: a BLAKE3-keyed running state
//! (the "duplex") that absorbs associated data and ratchet steps, and
//! derives an XChaCha20-Poly1305 key/nonce pair for each `seal`/`open`,
//! folding the resulting ciphertext back into the state so every operation
//! changes what the next one can produce.
//!
//! Grounded on the chain-key ratchet in `wraith-crypto::packet_ratchet`
//! (BLAKE3-keyed chain advance, old value zeroized) and the AEAD key/nonce
//! types in `wraith-crypto::aead::cipher`.

use crate::CryptoError;
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    XChaCha20Poly1305, XNonce,
};
use zeroize::Zeroize;

/// Length in bytes of a serialized [`DuplexState`].
const STATE_LEN: usize = 32;

/// Operations a symmetric duplex transcript must support.
///
/// Implementations must be deterministic: the same starting state fed the
/// same sequence of `ad`/`ratchet`/`seal_aead`/`open_aead` calls with the
/// same inputs always produces the same outputs and the same resulting
/// state.
pub trait DuplexTranscript: Clone {
    /// Absorb associated data into the running state. `metadata` distinguishes
    /// protocol-level framing (e.g. role labels) from application AD.
    fn ad(&mut self, metadata: bool, data: &[u8]);

    /// Advance the state by `n` bytes worth of ratcheting, destroying the
    /// ability to recompute any key derived before this call.
    fn ratchet(&mut self, n: usize);

    /// Seal `plaintext` under `ad`, advancing the transcript.
    fn seal_aead(&mut self, plaintext: &[u8], ad: &[u8]) -> Vec<u8>;

    /// Open `ciphertext` under `ad`. On success, the transcript advances
    /// exactly as `seal_aead` would have. On failure, the transcript is left
    /// untouched -- callers must not persist it (see the error-handling
    /// design: `DecryptFailed` is fatal per conversation).
    fn open_aead(&mut self, ciphertext: &[u8], ad: &[u8]) -> Option<Vec<u8>>;

    /// Serialize the running state for storage.
    fn serialize(&self) -> Vec<u8>;

    /// Recover a transcript from a previously serialized state.
    fn recover(bytes: &[u8]) -> crate::Result<Self>
    where
        Self: Sized;
}

/// Concrete BLAKE3-keyed duplex transcript.
#[derive(Clone)]
pub struct DuplexState {
    state: [u8; STATE_LEN],
}

impl DuplexState {
    /// Seed a fresh transcript from 32 bytes of key material (e.g. a Noise
    /// handshake transcript hash, or a per-peer root key).
    pub fn new(key: [u8; STATE_LEN]) -> Self {
        Self { state: key }
    }

    fn mix(&mut self, label: &[u8], data: &[u8]) {
        let mut hasher = blake3::Hasher::new_keyed(&self.state);
        hasher.update(label);
        hasher.update(&(data.len() as u64).to_le_bytes());
        hasher.update(data);
        let mut next = [0u8; STATE_LEN];
        next.copy_from_slice(hasher.finalize().as_bytes());
        self.state.zeroize();
        self.state = next;
    }

    /// Derive a one-shot AEAD key/nonce pair from the current state without
    /// advancing it. Callers must follow up with a `mix` to bind the
    /// operation's output back into the state.
    fn derive_key_nonce(&self) -> ([u8; 32], [u8; 24]) {
        let mut xof = blake3::Hasher::new_keyed(&self.state)
            .update(b"ssyk-duplex-keynonce")
            .finalize_xof();
        let mut buf = [0u8; 56];
        xof.fill(&mut buf);
        let mut key = [0u8; 32];
        let mut nonce = [0u8; 24];
        key.copy_from_slice(&buf[..32]);
        nonce.copy_from_slice(&buf[32..]);
        (key, nonce)
    }
}

impl DuplexTranscript for DuplexState {
    fn ad(&mut self, metadata: bool, data: &[u8]) {
        let label: &[u8] = if metadata { b"ssyk-ad-meta" } else { b"ssyk-ad" };
        self.mix(label, data);
    }

    fn ratchet(&mut self, n: usize) {
        self.mix(b"ssyk-ratchet", &(n as u64).to_le_bytes());
    }

    fn seal_aead(&mut self, plaintext: &[u8], ad: &[u8]) -> Vec<u8> {
        self.ad(false, ad);
        let (mut key, nonce) = self.derive_key_nonce();
        let cipher = XChaCha20Poly1305::new((&key).into());
        let ciphertext = cipher
            .encrypt(XNonce::from_slice(&nonce), plaintext)
            .expect("XChaCha20-Poly1305 encryption of a bounded plaintext cannot fail");
        key.zeroize();
        self.mix(b"ssyk-seal", &ciphertext);
        ciphertext
    }

    fn open_aead(&mut self, ciphertext: &[u8], ad: &[u8]) -> Option<Vec<u8>> {
        let mut trial = self.clone();
        trial.ad(false, ad);
        let (mut key, nonce) = trial.derive_key_nonce();
        let cipher = XChaCha20Poly1305::new((&key).into());
        let result = cipher.decrypt(XNonce::from_slice(&nonce), ciphertext);
        key.zeroize();

        match result {
            Ok(plaintext) => {
                trial.mix(b"ssyk-seal", ciphertext);
                *self = trial;
                Some(plaintext)
            }
            Err(_) => None,
        }
    }

    fn serialize(&self) -> Vec<u8> {
        self.state.to_vec()
    }

    fn recover(bytes: &[u8]) -> crate::Result<Self> {
        if bytes.len() != STATE_LEN {
            return Err(CryptoError::CorruptState(format!(
                "expected {STATE_LEN} byte transcript, found {}",
                bytes.len()
            )));
        }
        let mut state = [0u8; STATE_LEN];
        state.copy_from_slice(bytes);
        Ok(Self { state })
    }
}

impl Drop for DuplexState {
    fn drop(&mut self) {
        self.state.zeroize();
    }
}
