//! Provider credential resolution: an ordered list of environment variables,
//! falling back to an encrypted on-disk key store. Keys are never logged or
//! returned in full; any externally visible representation is masked.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use fks_types::FksError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Resolve a provider API key from the first set environment variable among
/// `env_vars`, falling back to `store` if none are set.
#[must_use]
pub fn resolve_key(env_vars: &[&str], store: Option<&KeyStore>, provider: &str) -> Option<String> {
    for name in env_vars {
        if let Ok(v) = std::env::var(name)
            && !v.is_empty()
        {
            return Some(v);
        }
    }
    store.and_then(|s| s.get(provider))
}

/// Mask a secret for any externally visible representation: `prefix***suffix`.
#[must_use]
pub fn mask_key(key: &str) -> String {
    let len = key.len();
    if len <= 6 {
        return "***".to_string();
    }
    let prefix = &key[..3];
    let suffix = &key[len - 3..];
    format!("{prefix}***{suffix}")
}

#[derive(Debug, Serialize, Deserialize, Default, Clone)]
struct StoredKey {
    api_key_enc: Option<Vec<u8>>,
    secret_enc: Option<Vec<u8>>,
    enc: bool,
    nonce: Option<[u8; 12]>,
}

/// An on-disk, optionally-encrypted store of provider API keys.
///
/// Writes are serialized under an exclusive file lock; readers tolerate a
/// concurrent writer because the file is always rewritten atomically (no
/// torn reads of a partially-written file).
pub struct KeyStore {
    path: PathBuf,
    secret: Option<[u8; 32]>,
    cache: Mutex<HashMap<String, StoredKey>>,
}

impl KeyStore {
    /// Open (without requiring existence yet) a key store at `path`,
    /// deriving an encryption key from `process_secret` via SHA-256 when one
    /// is provided. Without a process secret, keys are stored in plaintext
    /// (`enc: false`).
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, process_secret: Option<&str>) -> Self {
        let secret = process_secret.map(|s| {
            let mut hasher = Sha256::new();
            hasher.update(s.as_bytes());
            let digest = hasher.finalize();
            let mut key = [0u8; 32];
            key.copy_from_slice(&digest);
            key
        });
        Self {
            path: path.into(),
            secret,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Load the on-disk file into memory, if present.
    ///
    /// # Errors
    /// Returns `FksError::Persistence` if the file exists but cannot be
    /// parsed.
    pub fn load(&self) -> Result<(), FksError> {
        if !self.path.exists() {
            return Ok(());
        }
        let bytes = std::fs::read(&self.path)
            .map_err(|e| FksError::Persistence(format!("key store read: {e}")))?;
        let parsed: HashMap<String, StoredKey> = serde_json::from_slice(&bytes)
            .map_err(|e| FksError::Persistence(format!("key store parse: {e}")))?;
        *self.cache.lock().expect("key store mutex poisoned") = parsed;
        Ok(())
    }

    /// Decrypt and return the plaintext API key for `provider`, if stored.
    #[must_use]
    pub fn get(&self, provider: &str) -> Option<String> {
        let cache = self.cache.lock().expect("key store mutex poisoned");
        let entry = cache.get(provider)?;
        let enc = entry.api_key_enc.as_ref()?;
        if entry.enc {
            let nonce = entry.nonce?;
            self.decrypt(enc, &nonce)
        } else {
            String::from_utf8(enc.clone()).ok()
        }
    }

    /// Persist `api_key` (and optional `secret`) for `provider` under an
    /// exclusive file lock, encrypting when a process secret is configured.
    ///
    /// # Errors
    /// Returns `FksError::Persistence` on any I/O or lock failure.
    pub fn set(
        &self,
        provider: &str,
        api_key: &str,
        secret: Option<&str>,
    ) -> Result<(), FksError> {
        let (api_key_enc, nonce) = self.encrypt_or_plain(api_key.as_bytes());
        let secret_enc = secret.map(|s| self.encrypt_or_plain(s.as_bytes()).0);

        {
            let mut cache = self.cache.lock().expect("key store mutex poisoned");
            cache.insert(
                provider.to_string(),
                StoredKey {
                    api_key_enc: Some(api_key_enc),
                    secret_enc,
                    enc: self.secret.is_some(),
                    nonce,
                },
            );
        }
        self.flush()
    }

    fn encrypt_or_plain(&self, plaintext: &[u8]) -> (Vec<u8>, Option<[u8; 12]>) {
        let Some(secret) = self.secret else {
            return (plaintext.to_vec(), None);
        };
        let key = Key::<Aes256Gcm>::from_slice(&secret);
        let cipher = Aes256Gcm::new(key);
        let mut nonce_bytes = [0u8; 12];
        rand::Rng::fill(&mut rand::rng(), &mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);
        let ciphertext = cipher
            .encrypt(nonce, plaintext)
            .expect("AES-GCM encryption is infallible for in-memory buffers");
        (ciphertext, Some(nonce_bytes))
    }

    fn decrypt(&self, ciphertext: &[u8], nonce_bytes: &[u8; 12]) -> Option<String> {
        let secret = self.secret?;
        let key = Key::<Aes256Gcm>::from_slice(&secret);
        let cipher = Aes256Gcm::new(key);
        let nonce = Nonce::from_slice(nonce_bytes);
        let plaintext = cipher.decrypt(nonce, ciphertext).ok()?;
        String::from_utf8(plaintext).ok()
    }

    fn flush(&self) -> Result<(), FksError> {
        use fs2::FileExt;
        use std::io::Write;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| FksError::Persistence(format!("key store mkdir: {e}")))?;
        }
        let file = std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.path)
            .map_err(|e| FksError::Persistence(format!("key store open: {e}")))?;
        file.lock_exclusive()
            .map_err(|e| FksError::Persistence(format!("key store lock: {e}")))?;
        let snapshot = self.cache.lock().expect("key store mutex poisoned").clone();
        let json = serde_json::to_vec_pretty(&snapshot)
            .map_err(|e| FksError::Persistence(format!("key store serialize: {e}")))?;
        (&file)
            .write_all(&json)
            .map_err(|e| FksError::Persistence(format!("key store write: {e}")))?;
        FileExt::unlock(&file).ok();
        Ok(())
    }
}

/// Path convention for the default key store location.
#[must_use]
pub fn default_key_store_path() -> PathBuf {
    Path::new("data").join("keys").join("providers.json")
}
