// SPDX-License-Identifier: Apache-2.0
//! Configuration layer (§4.10, ambient): a small `ConfigStore` port plus a
//! generic loader, mirroring the config-service/config-store split used
//! elsewhere in this workspace's tooling rather than inventing a bespoke
//! scheme for this crate alone.
//!
//! This is a server/engine component, not a desktop application: the
//! file-backed store takes an explicit base path from the caller instead
//! of discovering a platform config directory.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::kv::parse_flat_kv;

/// Storage port for raw config blobs, keyed by logical name.
pub trait ConfigStore {
    /// Loads a raw config blob. Returns [`ConfigError::NotFound`] when
    /// `key` has never been saved.
    ///
    /// # Errors
    /// Returns [`ConfigError::NotFound`] or [`ConfigError::Io`].
    fn load_raw(&self, key: &str) -> Result<Vec<u8>, ConfigError>;

    /// Persists a raw config blob under `key`, overwriting any prior value.
    ///
    /// # Errors
    /// Returns [`ConfigError::Io`] on failure to write.
    fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), ConfigError>;
}

/// Error type for config operations, distinguishing "not found" from I/O
/// failure from deserialization failure (§7's error taxonomy, applied to
/// the ambient config layer).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// `key` has never been saved to this store.
    #[error("config key not found")]
    NotFound,
    /// I/O error while reading or writing the backing store.
    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),
    /// The flat key=value source did not contain a required key, or a
    /// value could not be parsed into the target field's type.
    #[error("config deserialization error: {0}")]
    Parse(String),
}

/// A `RunConfig` governs one scheduler run: worker parallelism and the
/// determinism mode/placement-fallback policy the caller wants enforced.
/// Loaded from the same flat `key=value` grammar the fixture reader (§6)
/// uses, via [`parse_flat_kv`], so both share one tokenizer instead of
/// each parsing its own dialect.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RunConfig {
    /// Upper bound on worker threads the parallel scheduler may spawn per
    /// phase. `None` defers to `std::thread::available_parallelism`.
    pub max_workers: Option<usize>,
    /// Whether unresolved shard placement should fall back silently
    /// (`false`) or be elevated to a split-time error (`true`); see §9's
    /// open question on placement fallback in `Strict` mode.
    pub strict_placement: bool,
    /// Bounded capacity reserved for the shard executor's outbound
    /// message bus and accepted-task log.
    pub message_bus_capacity: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_workers: None,
            strict_placement: false,
            message_bus_capacity: 4096,
        }
    }
}

impl RunConfig {
    /// Parses a `RunConfig` from the flat `key=value` text source. Known
    /// keys are `max_workers`, `strict_placement`, `message_bus_capacity`;
    /// unknown keys are ignored (same tolerance as the fixture format) and
    /// missing keys fall back to [`RunConfig::default`] field by field.
    ///
    /// # Errors
    /// Returns [`ConfigError::Parse`] if a known key's value fails to
    /// parse into its field's type.
    pub fn from_flat_kv(text: &str) -> Result<Self, ConfigError> {
        let map = parse_flat_kv(text);
        let mut config = Self::default();
        if let Some(raw) = map.get("max_workers") {
            config.max_workers = Some(
                raw.parse()
                    .map_err(|_| ConfigError::Parse(format!("max_workers: {raw}")))?,
            );
        }
        if let Some(raw) = map.get("strict_placement") {
            config.strict_placement = raw
                .parse()
                .map_err(|_| ConfigError::Parse(format!("strict_placement: {raw}")))?;
        }
        if let Some(raw) = map.get("message_bus_capacity") {
            config.message_bus_capacity = raw
                .parse()
                .map_err(|_| ConfigError::Parse(format!("message_bus_capacity: {raw}")))?;
        }
        Ok(config)
    }

    /// Renders this config back into the flat `key=value` grammar, inverse
    /// of [`RunConfig::from_flat_kv`] for round-tripping through a
    /// [`ConfigStore`].
    #[must_use]
    pub fn to_flat_kv(&self) -> String {
        let mut out = String::new();
        if let Some(max_workers) = self.max_workers {
            out.push_str(&format!("max_workers={max_workers}\n"));
        }
        out.push_str(&format!("strict_placement={}\n", self.strict_placement));
        out.push_str(&format!(
            "message_bus_capacity={}\n",
            self.message_bus_capacity
        ));
        out
    }
}

/// Thin service that serializes [`RunConfig`] values and delegates storage
/// to a [`ConfigStore`]; the split lets callers swap the backing store
/// (file-based here, in-memory in tests) without touching parse logic.
pub struct ConfigService<S> {
    store: S,
}

impl<S> ConfigService<S> {
    /// Constructs a service backed by `store`.
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    /// Consumes the service, returning the inner store.
    pub fn into_inner(self) -> S {
        self.store
    }
}

impl<S: ConfigStore> ConfigService<S> {
    /// Loads and parses a [`RunConfig`] for `key`. Returns `Ok(None)` if
    /// the key has never been saved.
    ///
    /// # Errors
    /// Returns [`ConfigError::Io`] or [`ConfigError::Parse`].
    pub fn load(&self, key: &str) -> Result<Option<RunConfig>, ConfigError> {
        match self.store.load_raw(key) {
            Ok(bytes) => {
                let text = String::from_utf8_lossy(&bytes);
                RunConfig::from_flat_kv(&text).map(Some)
            }
            Err(ConfigError::NotFound) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Serializes and persists `config` under `key`.
    ///
    /// # Errors
    /// Returns [`ConfigError::Io`] on write failure.
    pub fn save(&self, key: &str, config: &RunConfig) -> Result<(), ConfigError> {
        self.store.save_raw(key, config.to_flat_kv().as_bytes())
    }
}

/// File-backed [`ConfigStore`] rooted at an explicit base directory
/// supplied by the caller.
pub struct FileConfigStore {
    base: PathBuf,
}

impl FileConfigStore {
    /// Constructs a store rooted at `base`, creating the directory if it
    /// does not yet exist.
    ///
    /// # Errors
    /// Returns [`ConfigError::Io`] if the base directory cannot be created.
    pub fn new(base: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let base = base.into();
        fs::create_dir_all(&base)?;
        Ok(Self { base })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.base.join(format!("{key}.conf"))
    }
}

impl ConfigStore for FileConfigStore {
    fn load_raw(&self, key: &str) -> Result<Vec<u8>, ConfigError> {
        match fs::read(self.path_for(key)) {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(ConfigError::NotFound),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), ConfigError> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, data)?;
        Ok(())
    }
}

/// In-memory [`ConfigStore`] for tests and embedders that do not want a
/// filesystem dependency.
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    entries: std::sync::Mutex<rustc_hash::FxHashMap<String, Vec<u8>>>,
}

impl MemoryConfigStore {
    /// Constructs an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConfigStore for MemoryConfigStore {
    fn load_raw(&self, key: &str) -> Result<Vec<u8>, ConfigError> {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(key)
            .cloned()
            .ok_or(ConfigError::NotFound)
    }

    fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), ConfigError> {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(key.to_string(), data.to_vec());
        Ok(())
    }
}
