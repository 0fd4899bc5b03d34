use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use zeroize::Zeroize;

use crate::error::{error_codes, CryptoError, CryptoResult};
use crate::utils;

use super::entry::KeyEntry;

/// Persistence behind a [`super::KeyManager`]
///
/// One record per `key_id`, addressable by identifier; the only
/// cross-entry operation is enumeration for cleanup and listing. A
/// repository belongs to exactly one party and is never shared.
pub trait KeyRepository: Send {
    /// Store a new entry; returns `false` without overwriting when the
    /// `key_id` already exists
    fn insert(&mut self, entry: &KeyEntry) -> CryptoResult<bool>;

    /// Fetch an entry by identifier
    fn load(&mut self, key_id: &str) -> CryptoResult<Option<KeyEntry>>;

    /// Persist mutated lifecycle fields of an existing entry
    fn update(&mut self, entry: &KeyEntry) -> CryptoResult<()>;

    /// Securely destroy an entry; returns `false` when absent
    ///
    /// Implementations with a durable representation must overwrite it
    /// before removal; plain deletion is insufficient.
    fn remove(&mut self, key_id: &str) -> CryptoResult<bool>;

    /// All stored identifiers, in no particular order
    fn key_ids(&mut self) -> CryptoResult<Vec<String>>;
}

/// Volatile map-backed repository
#[derive(Default)]
pub struct MemoryKeyRepository {
    entries: HashMap<String, KeyEntry>,
}

impl MemoryKeyRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyRepository for MemoryKeyRepository {
    fn insert(&mut self, entry: &KeyEntry) -> CryptoResult<bool> {
        if self.entries.contains_key(&entry.key_id) {
            return Ok(false);
        }
        self.entries.insert(entry.key_id.clone(), entry.clone());
        Ok(true)
    }

    fn load(&mut self, key_id: &str) -> CryptoResult<Option<KeyEntry>> {
        Ok(self.entries.get(key_id).cloned())
    }

    fn update(&mut self, entry: &KeyEntry) -> CryptoResult<()> {
        if !self.entries.contains_key(&entry.key_id) {
            return Err(CryptoError::key_management_error(
                "update",
                &format!("key {} not found", entry.key_id),
                error_codes::KEY_NOT_FOUND,
            ));
        }
        self.entries.insert(entry.key_id.clone(), entry.clone());
        Ok(())
    }

    fn remove(&mut self, key_id: &str) -> CryptoResult<bool> {
        match self.entries.remove(key_id) {
            Some(mut entry) => {
                entry.key_bytes.zeroize();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn key_ids(&mut self) -> CryptoResult<Vec<String>> {
        Ok(self.entries.keys().cloned().collect())
    }
}

/// File-backed repository: one JSON document per key
///
/// The directory is private to one party. Lifecycle state and usage
/// counts are durable across restarts. Removal overwrites the file
/// with random bytes before unlinking it.
pub struct FileKeyRepository {
    dir: PathBuf,
}

impl FileKeyRepository {
    /// Open (creating if needed) a store directory
    pub fn new<P: AsRef<Path>>(dir: P) -> CryptoResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn entry_path(&self, key_id: &str) -> CryptoResult<PathBuf> {
        validate_key_id(key_id)?;
        Ok(self.dir.join(format!("{}.json", key_id)))
    }

    fn write_entry(&self, path: &Path, entry: &KeyEntry) -> CryptoResult<()> {
        let serialized = serde_json::to_string_pretty(entry)?;
        fs::write(path, serialized)?;
        Ok(())
    }
}

/// Key identifiers become file names, so only a conservative character
/// set is accepted
fn validate_key_id(key_id: &str) -> CryptoResult<()> {
    let acceptable = !key_id.is_empty()
        && key_id.len() <= 128
        && key_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if acceptable {
        Ok(())
    } else {
        Err(CryptoError::key_management_error(
            "validate_key_id",
            &format!("key id {:?} is not storable", key_id),
            error_codes::KEY_INVALID_ID,
        ))
    }
}

impl KeyRepository for FileKeyRepository {
    fn insert(&mut self, entry: &KeyEntry) -> CryptoResult<bool> {
        let path = self.entry_path(&entry.key_id)?;
        if path.exists() {
            return Ok(false);
        }
        self.write_entry(&path, entry)?;
        Ok(true)
    }

    fn load(&mut self, key_id: &str) -> CryptoResult<Option<KeyEntry>> {
        let path = self.entry_path(key_id)?;
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&path)?;
        let entry: KeyEntry = serde_json::from_str(&contents)?;
        Ok(Some(entry))
    }

    fn update(&mut self, entry: &KeyEntry) -> CryptoResult<()> {
        let path = self.entry_path(&entry.key_id)?;
        if !path.exists() {
            return Err(CryptoError::key_management_error(
                "update",
                &format!("key {} not found", entry.key_id),
                error_codes::KEY_NOT_FOUND,
            ));
        }
        self.write_entry(&path, entry)
    }

    fn remove(&mut self, key_id: &str) -> CryptoResult<bool> {
        let path = self.entry_path(key_id)?;
        if !path.exists() {
            return Ok(false);
        }

        // Overwrite before unlinking so the key material does not
        // survive in the filesystem
        let length = fs::metadata(&path)?.len().max(1024) as usize;
        fs::write(&path, utils::random_bytes(length))?;
        fs::remove_file(&path)?;
        Ok(true)
    }

    fn key_ids(&mut self) -> CryptoResult<Vec<String>> {
        let mut ids = Vec::new();
        for dir_entry in fs::read_dir(&self.dir)? {
            let path = dir_entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    ids.push(stem.to_string());
                }
            }
        }
        Ok(ids)
    }
}
