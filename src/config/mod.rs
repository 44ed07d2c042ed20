//! Configuration for the dock daemon
//!
//! - **settings**: typed preferences persisted in the key-value store
//! - **paths**: where the store and the IPC socket live, with CLI overrides

pub mod settings;

pub use settings::{is_usable, Settings};

use anyhow::{Context, Result};
use std::path::PathBuf;

use crate::constants::config::{APP_DIR, SOCKET_FILENAME};
use crate::persistence::JsonFileStore;

/// Resolved file locations for one daemon instance
#[derive(Debug, Clone)]
pub struct Paths {
    pub store: PathBuf,
    pub socket: PathBuf,
}

impl Paths {
    /// Defaults, replaced by whichever overrides are given
    pub fn resolve(store: Option<PathBuf>, socket: Option<PathBuf>) -> Result<Self> {
        let store = store.unwrap_or_else(JsonFileStore::default_path);
        let socket = match socket {
            Some(path) => path,
            None => default_socket_path()?,
        };
        Ok(Self { store, socket })
    }
}

/// Default socket path (XDG_RUNTIME_DIR with fallback to cache)
pub fn default_socket_path() -> Result<PathBuf> {
    if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        return Ok(PathBuf::from(runtime_dir).join(APP_DIR).join(SOCKET_FILENAME));
    }

    let cache = dirs::cache_dir()
        .context("Failed to determine cache directory (no XDG_RUNTIME_DIR or HOME)")?;
    Ok(cache.join(APP_DIR).join(SOCKET_FILENAME))
}
