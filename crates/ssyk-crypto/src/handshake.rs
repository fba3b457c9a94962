//! Noise-IK handshake: establishes a contact's two root transcripts.
//!
//! Drives the pattern `-> e, es, s, ss ; <- e, ee, se` with an empty
//! prologue. Each revealed public key and each DH output is mixed into a
//! running [`DuplexState`] exactly as `ad`/`seal_aead`/`open_aead` already
//! do for message transcripts, so the handshake transcript and the
//! per-message transcript share one mixing primitive end to end. The final
//! transcript is then forked into the two directional roots the same way
//! [`crate::ratchet`] forks a root into a conversation pair.
//!
//! `snow` drives the Noise handshakes elsewhere in this stack, but its
//! `HandshakeState` has no public way to snapshot progress mid-handshake,
//! which is exactly what the initiator's `hs_blob` needs to survive the gap
//! between sending `msg1` and receiving `msg2`. This engine is built
//! directly on the `x25519-dalek` DH and `DuplexState` transcript already
//! used for everything else in this crate instead, in the same
//! domain-separated-label style as `wraith-crypto`'s hand-rolled KDF chains.

use crate::transcript::DuplexState;
use crate::{CryptoError, DuplexTranscript, Identity};
use rand_core::{CryptoRng, RngCore};
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroize;

const PROTOCOL_SEED: &str = "ssyk-noise-ik-v1";

fn seed() -> [u8; 32] {
    *blake3::hash(PROTOCOL_SEED.as_bytes()).as_bytes()
}

/// Fork a finished handshake transcript into one directional root, by
/// absorbing a direction tag and ratcheting -- the same two-step fork
/// [`crate::ratchet::RatchetEngine`] uses to split a root into a conversation.
fn fork(ts: &DuplexState, tag: &[u8]) -> DuplexState {
    let mut forked = ts.clone();
    forked.ad(true, tag);
    forked.ratchet(32);
    forked
}

/// Split a finished handshake transcript into `(root_i2r, root_r2i)`:
/// the transcript for messages flowing initiator-to-responder, and the
/// transcript for messages flowing responder-to-initiator.
fn split(ts: &DuplexState) -> (DuplexState, DuplexState) {
    (fork(ts, b"split-i2r"), fork(ts, b"split-r2i"))
}

/// The initiator's in-progress handshake state, persisted between sending
/// `msg1` and receiving `msg2`.
pub struct HandshakeBlob {
    ephemeral_private: [u8; 32],
    transcript: DuplexState,
}

impl HandshakeBlob {
    /// Serialize to the 64-byte form a `Store` persists.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(64);
        out.extend_from_slice(&self.ephemeral_private);
        out.extend_from_slice(&self.transcript.serialize());
        out
    }

    /// Recover a previously serialized in-progress handshake.
    pub fn recover(bytes: &[u8]) -> crate::Result<Self> {
        if bytes.len() != 64 {
            return Err(CryptoError::CorruptState(format!(
                "expected 64 byte handshake blob, found {}",
                bytes.len()
            )));
        }
        let mut ephemeral_private = [0u8; 32];
        ephemeral_private.copy_from_slice(&bytes[..32]);
        let transcript = DuplexState::recover(&bytes[32..])?;
        Ok(Self {
            ephemeral_private,
            transcript,
        })
    }
}

impl Drop for HandshakeBlob {
    fn drop(&mut self) {
        self.ephemeral_private.zeroize();
    }
}

/// Stateless driver of the two-message Noise-IK exchange.
pub struct HandshakeEngine;

impl HandshakeEngine {
    /// Initiator step 1: emit `msg1` and the blob to persist until `msg2`
    /// arrives.
    pub fn initiate<R: RngCore + CryptoRng>(
        rng: &mut R,
        local: &Identity,
        peer_pubkey: &[u8; 32],
    ) -> (Vec<u8>, HandshakeBlob) {
        let ephemeral = StaticSecret::random_from_rng(rng);
        let ephemeral_public = PublicKey::from(&ephemeral);
        let peer_public = PublicKey::from(*peer_pubkey);

        let mut ts = DuplexState::new(seed());
        ts.ad(true, ephemeral_public.as_bytes());

        let es = ephemeral.diffie_hellman(&peer_public);
        ts.ad(true, es.as_bytes());

        let s_ct = ts.seal_aead(local.public_bytes(), b"");

        let local_secret = StaticSecret::from(*local.private_bytes());
        let ss = local_secret.diffie_hellman(&peer_public);
        ts.ad(true, ss.as_bytes());

        let payload_ct = ts.seal_aead(b"", b"");

        let mut msg1 = Vec::with_capacity(32 + s_ct.len() + payload_ct.len());
        msg1.extend_from_slice(ephemeral_public.as_bytes());
        msg1.extend_from_slice(&s_ct);
        msg1.extend_from_slice(&payload_ct);

        let blob = HandshakeBlob {
            ephemeral_private: ephemeral.to_bytes(),
            transcript: ts,
        };
        (msg1, blob)
    }

    /// Responder step: consume `msg1`, authenticate the claimed peer static
    /// key against `peer_pubkey`, and emit `msg2` plus the two roots.
    pub fn respond<R: RngCore + CryptoRng>(
        rng: &mut R,
        local: &Identity,
        peer_pubkey: &[u8; 32],
        msg1: &[u8],
    ) -> crate::Result<(Vec<u8>, DuplexState, DuplexState)> {
        if msg1.len() != 96 {
            return Err(CryptoError::HandshakeFailed(format!(
                "msg1 has unexpected length {}",
                msg1.len()
            )));
        }
        let init_ephemeral_public = PublicKey::from(<[u8; 32]>::try_from(&msg1[0..32]).unwrap());
        let s_ct = &msg1[32..80];
        let payload_ct = &msg1[80..96];

        let mut ts = DuplexState::new(seed());
        ts.ad(true, init_ephemeral_public.as_bytes());

        let local_secret = StaticSecret::from(*local.private_bytes());
        let es = local_secret.diffie_hellman(&init_ephemeral_public);
        ts.ad(true, es.as_bytes());

        let revealed_static = ts
            .open_aead(s_ct, b"")
            .ok_or_else(|| CryptoError::HandshakeFailed("static key reveal did not authenticate".into()))?;
        if revealed_static != peer_pubkey {
            return Err(CryptoError::HandshakeFailed(
                "revealed static key does not match expected peer".into(),
            ));
        }

        let ss = local_secret.diffie_hellman(&PublicKey::from(*peer_pubkey));
        ts.ad(true, ss.as_bytes());

        ts.open_aead(payload_ct, b"")
            .ok_or_else(|| CryptoError::HandshakeFailed("message 1 payload did not authenticate".into()))?;

        let resp_ephemeral = StaticSecret::random_from_rng(rng);
        let resp_ephemeral_public = PublicKey::from(&resp_ephemeral);
        ts.ad(true, resp_ephemeral_public.as_bytes());

        let ee = resp_ephemeral.diffie_hellman(&init_ephemeral_public);
        ts.ad(true, ee.as_bytes());

        let se = resp_ephemeral.diffie_hellman(&PublicKey::from(*peer_pubkey));
        ts.ad(true, se.as_bytes());

        let payload2_ct = ts.seal_aead(b"", b"");

        let mut msg2 = Vec::with_capacity(32 + payload2_ct.len());
        msg2.extend_from_slice(resp_ephemeral_public.as_bytes());
        msg2.extend_from_slice(&payload2_ct);

        let (root_i2r, root_r2i) = split(&ts);
        // Responder sends on the responder-to-initiator transcript and
        // receives on the initiator-to-responder one.
        Ok((msg2, root_r2i, root_i2r))
    }

    /// Initiator step 2: recover the blob, consume `msg2`, and yield the
    /// two roots in initiator orientation.
    pub fn finalize(
        local: &Identity,
        peer_pubkey: &[u8; 32],
        blob: HandshakeBlob,
        msg2: &[u8],
    ) -> crate::Result<(DuplexState, DuplexState)> {
        if msg2.len() != 48 {
            return Err(CryptoError::HandshakeFailed(format!(
                "msg2 has unexpected length {}",
                msg2.len()
            )));
        }
        let resp_ephemeral_public = PublicKey::from(<[u8; 32]>::try_from(&msg2[0..32]).unwrap());
        let payload2_ct = &msg2[32..48];

        let mut ts = blob.transcript.clone();
        let init_ephemeral = StaticSecret::from(blob.ephemeral_private);

        ts.ad(true, resp_ephemeral_public.as_bytes());

        let ee = init_ephemeral.diffie_hellman(&resp_ephemeral_public);
        ts.ad(true, ee.as_bytes());

        let local_secret = StaticSecret::from(*local.private_bytes());
        let _ = peer_pubkey; // peer identity was already bound into `ts` in `initiate`
        let se = local_secret.diffie_hellman(&resp_ephemeral_public);
        ts.ad(true, se.as_bytes());

        ts.open_aead(payload2_ct, b"")
            .ok_or_else(|| CryptoError::HandshakeFailed("message 2 payload did not authenticate".into()))?;

        let (root_i2r, root_r2i) = split(&ts);
        // Initiator sends on the initiator-to-responder transcript and
        // receives on the responder-to-initiator one.
        Ok((root_i2r, root_r2i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_core::OsRng;

    #[test]
    fn handshake_yields_matching_swapped_roots() {
        let alice = Identity::generate(&mut OsRng);
        let bob = Identity::generate(&mut OsRng);

        let (msg1, blob) = HandshakeEngine::initiate(&mut OsRng, &alice, bob.public_bytes());
        let (msg2, bob_send, bob_recv) =
            HandshakeEngine::respond(&mut OsRng, &bob, alice.public_bytes(), &msg1).unwrap();
        let (alice_send, alice_recv) =
            HandshakeEngine::finalize(&alice, bob.public_bytes(), blob, &msg2).unwrap();

        let mut alice_send = alice_send;
        let mut bob_recv = bob_recv;
        let ct = alice_send.seal_aead(b"hello bob", b"ad");
        assert_eq!(bob_recv.open_aead(&ct, b"ad").unwrap(), b"hello bob");

        let mut bob_send = bob_send;
        let mut alice_recv = alice_recv;
        let ct = bob_send.seal_aead(b"hello alice", b"ad");
        assert_eq!(alice_recv.open_aead(&ct, b"ad").unwrap(), b"hello alice");
    }

    #[test]
    fn respond_rejects_wrong_peer_pubkey() {
        let alice = Identity::generate(&mut OsRng);
        let bob = Identity::generate(&mut OsRng);
        let mallory = Identity::generate(&mut OsRng);

        let (msg1, _blob) = HandshakeEngine::initiate(&mut OsRng, &alice, bob.public_bytes());
        let result = HandshakeEngine::respond(&mut OsRng, &bob, mallory.public_bytes(), &msg1);
        assert!(result.is_err());
    }

    #[test]
    fn finalize_rejects_tampered_msg2() {
        let alice = Identity::generate(&mut OsRng);
        let bob = Identity::generate(&mut OsRng);

        let (msg1, blob) = HandshakeEngine::initiate(&mut OsRng, &alice, bob.public_bytes());
        let (mut msg2, _, _) =
            HandshakeEngine::respond(&mut OsRng, &bob, alice.public_bytes(), &msg1).unwrap();
        *msg2.last_mut().unwrap() ^= 0xff;

        assert!(HandshakeEngine::finalize(&alice, bob.public_bytes(), blob, &msg2).is_err());
    }

    #[test]
    fn blob_serialize_recover_roundtrip() {
        let alice = Identity::generate(&mut OsRng);
        let bob = Identity::generate(&mut OsRng);

        let (msg1, blob) = HandshakeEngine::initiate(&mut OsRng, &alice, bob.public_bytes());
        let bytes = blob.serialize();
        let recovered = HandshakeBlob::recover(&bytes).unwrap();

        let (msg2, _, bob_init_recv) =
            HandshakeEngine::respond(&mut OsRng, &bob, alice.public_bytes(), &msg1).unwrap();
        let (alice_send, _) =
            HandshakeEngine::finalize(&alice, bob.public_bytes(), recovered, &msg2).unwrap();

        let mut alice_send = alice_send;
        let mut bob_init_recv = bob_init_recv;
        let ct = alice_send.seal_aead(b"after recovery", b"ad");
        assert_eq!(bob_init_recv.open_aead(&ct, b"ad").unwrap(), b"after recovery");
    }
}
