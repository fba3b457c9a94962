//! The `~/.sasayaki` layout: config file, keypair, and the sqlite store.
//!
//! Mirrors the original client's `sasayakiFolder`/`initSasayakiFolder` --
//! everything lives under one directory, created on first run with
//! user-only permissions.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// The root `~/.sasayaki` directory, or `$SASAYAKI_HOME` if set (used by the
/// integration tests to avoid touching a real home directory).
pub fn home_dir() -> Result<PathBuf> {
    if let Ok(override_dir) = std::env::var("SASAYAKI_HOME") {
        return Ok(PathBuf::from(override_dir));
    }
    dirs::home_dir()
        .map(|home| home.join(".sasayaki"))
        .context("could not determine the user's home directory")
}

/// Create `~/.sasayaki` and `~/.sasayaki/keys` if they don't already exist.
pub fn ensure_layout() -> Result<PathBuf> {
    let home = home_dir()?;
    let keys = home.join("keys");
    create_private_dir(&home)?;
    create_private_dir(&keys)?;
    Ok(home)
}

#[cfg(unix)]
fn create_private_dir(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    if path.exists() {
        return Ok(());
    }
    fs::create_dir_all(path).with_context(|| format!("creating {}", path.display()))?;
    fs::set_permissions(path, fs::Permissions::from_mode(0o700))
        .with_context(|| format!("setting permissions on {}", path.display()))?;
    Ok(())
}

#[cfg(not(unix))]
fn create_private_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path).with_context(|| format!("creating {}", path.display()))?;
    }
    Ok(())
}

/// `~/.sasayaki/config.toml`.
pub fn config_path() -> Result<PathBuf> {
    Ok(home_dir()?.join("config.toml"))
}

/// `~/.sasayaki/keys/identity` -- the Argon2id/XChaCha20-Poly1305-encrypted
/// identity key-pair.
pub fn identity_path() -> Result<PathBuf> {
    Ok(home_dir()?.join("keys").join("identity"))
}

/// `~/.sasayaki/sasayaki.db` -- the sqlite-backed contact/conversation/message store.
pub fn store_path() -> Result<PathBuf> {
    Ok(home_dir()?.join("sasayaki.db"))
}
