//! Passphrase-encrypted identity key-pair at rest.
//!
//! # Format
//!
//! - 8 bytes: magic header `SSYK0001`
//! - 16 bytes: Argon2 salt
//! - 24 bytes: XChaCha20-Poly1305 nonce
//! - N bytes: encrypted private key (32 bytes + 16 byte auth tag)
//!
//! Argon2id is used for memory-hard key derivation; XChaCha20-Poly1305
//! provides authenticated encryption. Salt and nonce are freshly generated
//! on every encryption.

use anyhow::{bail, Context, Result};
use argon2::{Algorithm, Argon2, Params, Version};
use chacha20poly1305::aead::Aead;
use chacha20poly1305::{KeyInit, XChaCha20Poly1305};
use rand_core::{OsRng, RngCore};
use ssyk_crypto::Identity;
use zeroize::Zeroize;

const MAGIC: &[u8; 8] = b"SSYK0001";
const SALT_SIZE: usize = 16;
const NONCE_SIZE: usize = 24;
const TAG_SIZE: usize = 16;

const ARGON2_MEMORY_COST: u32 = 65536;
const ARGON2_TIME_COST: u32 = 3;
const ARGON2_PARALLELISM: u32 = 4;

fn derive_key(passphrase: &str, salt: &[u8]) -> Result<[u8; 32]> {
    let params = Params::new(
        ARGON2_MEMORY_COST,
        ARGON2_TIME_COST,
        ARGON2_PARALLELISM,
        Some(32),
    )
    .map_err(|e| anyhow::anyhow!("argon2 params: {e}"))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
    let mut key = [0u8; 32];
    argon2
        .hash_password_into(passphrase.as_bytes(), salt, &mut key)
        .map_err(|e| anyhow::anyhow!("argon2 derivation failed: {e}"))?;
    Ok(key)
}

/// Encrypt `identity`'s private key under `passphrase`.
pub fn encrypt(identity: &Identity, passphrase: &str) -> Result<Vec<u8>> {
    let mut salt = [0u8; SALT_SIZE];
    let mut nonce = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut salt);
    OsRng.fill_bytes(&mut nonce);

    let mut derived = derive_key(passphrase, &salt)?;
    let cipher = XChaCha20Poly1305::new((&derived).into());
    let ciphertext = cipher
        .encrypt((&nonce).into(), identity.private_bytes().as_ref())
        .map_err(|_| anyhow::anyhow!("encryption failed"))?;
    derived.zeroize();

    let mut out = Vec::with_capacity(MAGIC.len() + SALT_SIZE + NONCE_SIZE + ciphertext.len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&salt);
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Decrypt a key file written by [`encrypt`] back into an [`Identity`].
pub fn decrypt(encrypted: &[u8], passphrase: &str) -> Result<Identity> {
    let min_size = MAGIC.len() + SALT_SIZE + NONCE_SIZE + 32 + TAG_SIZE;
    if encrypted.len() < min_size {
        bail!("identity file is too short to be valid");
    }
    if &encrypted[..8] != MAGIC {
        bail!("identity file has an unrecognized header");
    }

    let salt = &encrypted[8..8 + SALT_SIZE];
    let nonce = &encrypted[8 + SALT_SIZE..8 + SALT_SIZE + NONCE_SIZE];
    let ciphertext = &encrypted[8 + SALT_SIZE + NONCE_SIZE..];

    let mut derived = derive_key(passphrase, salt)?;
    let cipher = XChaCha20Poly1305::new((&derived).into());
    let plaintext = cipher
        .decrypt(nonce.into(), ciphertext)
        .map_err(|_| anyhow::anyhow!("wrong passphrase or corrupted identity file"))?;
    derived.zeroize();

    if plaintext.len() != 32 {
        bail!("decrypted key has the wrong length");
    }
    let mut private = [0u8; 32];
    private.copy_from_slice(&plaintext);
    Ok(Identity::from_private_bytes(private))
}

/// Write an encrypted identity file at `path`, generating a fresh identity.
/// Fails if a file already exists there.
pub fn generate_and_save(path: &std::path::Path, passphrase: &str) -> Result<Identity> {
    if path.exists() {
        bail!("an identity already exists at {}", path.display());
    }
    let identity = Identity::generate(&mut OsRng);
    let encrypted = encrypt(&identity, passphrase)?;
    write_private(path, &encrypted)?;
    Ok(identity)
}

/// Load and decrypt the identity file at `path`.
pub fn load(path: &std::path::Path, passphrase: &str) -> Result<Identity> {
    let bytes =
        std::fs::read(path).with_context(|| format!("reading identity at {}", path.display()))?;
    decrypt(&bytes, passphrase)
}

#[cfg(unix)]
fn write_private(path: &std::path::Path, bytes: &[u8]) -> Result<()> {
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;
    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o600)
        .open(path)
        .with_context(|| format!("creating {}", path.display()))?;
    file.write_all(bytes)?;
    Ok(())
}

#[cfg(not(unix))]
fn write_private(path: &std::path::Path, bytes: &[u8]) -> Result<()> {
    std::fs::write(path, bytes).with_context(|| format!("creating {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encrypt_then_decrypt_roundtrips() {
        let identity = Identity::generate(&mut OsRng);
        let encrypted = encrypt(&identity, "correct horse battery staple").unwrap();
        let recovered = decrypt(&encrypted, "correct horse battery staple").unwrap();
        assert_eq!(identity.public_bytes(), recovered.public_bytes());
        assert_eq!(identity.private_bytes(), recovered.private_bytes());
    }

    #[test]
    fn wrong_passphrase_fails() {
        let identity = Identity::generate(&mut OsRng);
        let encrypted = encrypt(&identity, "correct horse battery staple").unwrap();
        assert!(decrypt(&encrypted, "wrong passphrase").is_err());
    }

    #[test]
    fn truncated_file_is_rejected() {
        assert!(decrypt(&[0u8; 4], "whatever").is_err());
    }

    #[test]
    fn generate_and_save_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("identity");
        generate_and_save(&path, "passphrase1").unwrap();
        assert!(generate_and_save(&path, "passphrase2").is_err());
    }

    #[test]
    fn generate_save_and_load_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("identity");
        let identity = generate_and_save(&path, "hunter2hunter2").unwrap();
        let loaded = load(&path, "hunter2hunter2").unwrap();
        assert_eq!(identity.public_bytes(), loaded.public_bytes());
    }
}
