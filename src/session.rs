//! Bearer-token storage for the dashboard session.
//!
//! The token lives in the OS keyring when available. Otherwise it is sealed
//! with ChaCha20-Poly1305 into `<app root>/secrets`, next to its random key.
//! Every authenticated request reads the token fresh; a 401 from user stats
//! clears it.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::app_dirs;

const KEYRING_SERVICE: &str = "astrowatch";
const KEYRING_KEY: &str = "astrowatch_session_token";
const TOKEN_FILE: &str = "session_token.bin";
const KEY_FILE: &str = "session_token.key";
/// Set to `1`/`true` to skip the OS keyring entirely.
pub const DISABLE_KEYRING_ENV: &str = "ASTROWATCH_DISABLE_KEYRING";

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Token store unavailable: {0}")]
    Unavailable(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Crypto error: {0}")]
    Crypto(String),
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("App dir error: {0}")]
    AppDir(#[from] app_dirs::AppDirError),
}

#[derive(Debug)]
enum Backend {
    Persistent { fallback_dir: PathBuf },
    Memory(Mutex<Option<String>>),
}

/// Session token store shared by the API client and the refresh loop.
#[derive(Debug)]
pub struct SessionStore {
    backend: Backend,
}

impl SessionStore {
    /// Keyring-backed store with an encrypted file fallback in the app dir.
    pub fn persistent() -> Result<Self, SessionError> {
        Ok(Self::persistent_in(app_dirs::secrets_dir()?))
    }

    /// Keyring-backed store whose fallback files live in `dir`.
    pub fn persistent_in(dir: impl Into<PathBuf>) -> Self {
        Self {
            backend: Backend::Persistent {
                fallback_dir: dir.into(),
            },
        }
    }

    /// Process-local store, used by tests and `--token` one-off runs.
    pub fn in_memory(token: Option<&str>) -> Self {
        Self {
            backend: Backend::Memory(Mutex::new(token.map(str::to_string))),
        }
    }

    /// Current token, if any. Blank tokens count as absent.
    pub fn token(&self) -> Result<Option<String>, SessionError> {
        let token = match &self.backend {
            Backend::Memory(slot) => lock(slot).clone(),
            Backend::Persistent { fallback_dir } => match keyring_get()? {
                Some(token) => Some(token),
                None => fallback_get(fallback_dir)?,
            },
        };
        Ok(token.filter(|token| !token.trim().is_empty()))
    }

    /// Store `token`, preferring the keyring. Blank input is ignored.
    pub fn set(&self, token: &str) -> Result<(), SessionError> {
        let token = token.trim();
        if token.is_empty() {
            return Ok(());
        }
        match &self.backend {
            Backend::Memory(slot) => {
                *lock(slot) = Some(token.to_string());
                Ok(())
            }
            Backend::Persistent { fallback_dir } => {
                if keyring_set(token).is_ok() {
                    fallback_delete(fallback_dir);
                    return Ok(());
                }
                fallback_set(fallback_dir, token)
            }
        }
    }

    /// Forget the token everywhere. Used for logout and forced logout.
    pub fn clear(&self) -> Result<(), SessionError> {
        match &self.backend {
            Backend::Memory(slot) => *lock(slot) = None,
            Backend::Persistent { fallback_dir } => {
                keyring_delete();
                fallback_delete(fallback_dir);
            }
        }
        tracing::info!("Session token cleared");
        Ok(())
    }
}

fn lock(slot: &Mutex<Option<String>>) -> std::sync::MutexGuard<'_, Option<String>> {
    slot.lock().unwrap_or_else(|err| err.into_inner())
}

fn keyring_disabled() -> bool {
    std::env::var(DISABLE_KEYRING_ENV)
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

fn keyring_entry() -> Result<keyring::Entry, SessionError> {
    keyring::Entry::new(KEYRING_SERVICE, KEYRING_KEY)
        .map_err(|err| SessionError::Unavailable(err.to_string()))
}

fn keyring_get() -> Result<Option<String>, SessionError> {
    if keyring_disabled() {
        return Ok(None);
    }
    match keyring_entry()?.get_password() {
        Ok(token) => Ok(Some(token)),
        Err(keyring::Error::NoEntry) => Ok(None),
        Err(err) => {
            tracing::debug!("Keyring read failed, using fallback: {err}");
            Ok(None)
        }
    }
}

fn keyring_set(token: &str) -> Result<(), SessionError> {
    if keyring_disabled() {
        return Err(SessionError::Unavailable("keyring disabled".into()));
    }
    keyring_entry()?
        .set_password(token)
        .map_err(|err| SessionError::Unavailable(err.to_string()))
}

fn keyring_delete() {
    if keyring_disabled() {
        return;
    }
    if let Ok(entry) = keyring_entry() {
        let _ = entry.delete_credential();
    }
}

fn fallback_get(dir: &Path) -> Result<Option<String>, SessionError> {
    let token_path = dir.join(TOKEN_FILE);
    if !token_path.exists() {
        return Ok(None);
    }
    let sealed = std::fs::read(token_path)?;
    if sealed.len() < 12 {
        return Err(SessionError::Decode("token file too short".into()));
    }
    let (nonce, ciphertext) = sealed.split_at(12);
    let key = std::fs::read(dir.join(KEY_FILE))?;
    let plaintext = cipher(&key)?
        .decrypt(chacha20poly1305::Nonce::from_slice(nonce), ciphertext)
        .map_err(|err| SessionError::Crypto(err.to_string()))?;
    String::from_utf8(plaintext)
        .map(Some)
        .map_err(|err| SessionError::Decode(err.to_string()))
}

fn fallback_set(dir: &Path, token: &str) -> Result<(), SessionError> {
    std::fs::create_dir_all(dir)?;
    let key_path = dir.join(KEY_FILE);
    let key = if key_path.exists() {
        std::fs::read(&key_path)?
    } else {
        let key = random_bytes(32)?;
        write_private_file(&key_path, &key)?;
        key
    };
    let nonce = random_bytes(12)?;
    let ciphertext = cipher(&key)?
        .encrypt(chacha20poly1305::Nonce::from_slice(&nonce), token.as_bytes())
        .map_err(|err| SessionError::Crypto(err.to_string()))?;
    let mut sealed = nonce;
    sealed.extend_from_slice(&ciphertext);
    write_private_file(&dir.join(TOKEN_FILE), &sealed)
}

fn fallback_delete(dir: &Path) {
    let _ = std::fs::remove_file(dir.join(TOKEN_FILE));
    let _ = std::fs::remove_file(dir.join(KEY_FILE));
}

use chacha20poly1305::aead::{Aead, KeyInit};

fn cipher(key: &[u8]) -> Result<chacha20poly1305::ChaCha20Poly1305, SessionError> {
    if key.len() != 32 {
        return Err(SessionError::Decode("token key invalid".into()));
    }
    chacha20poly1305::ChaCha20Poly1305::new_from_slice(key)
        .map_err(|err| SessionError::Crypto(err.to_string()))
}

fn random_bytes(len: usize) -> Result<Vec<u8>, SessionError> {
    use rand::TryRngCore;
    let mut out = vec![0u8; len];
    rand::rngs::OsRng
        .try_fill_bytes(&mut out)
        .map_err(|err| SessionError::Unavailable(err.to_string()))?;
    Ok(out)
}

fn write_private_file(path: &Path, bytes: &[u8]) -> Result<(), SessionError> {
    std::fs::write(path, bytes)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600));
    }
    Ok(())
}
