//! Persistence for the threads document: one JSON file under the threads
//! home, rewritten whole on every mutation, with the previous contents kept
//! in a `.bak` sibling.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::config::{self, ThreadsConfig};
use crate::model::Document;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("could not determine a home directory; set {}", config::HOME_ENV)]
    NoHome,
    #[error("store IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path} is not a valid threads document: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize document: {0}")]
    Serialize(#[source] serde_json::Error),
}

#[derive(Debug, Clone)]
pub struct Store {
    home: PathBuf,
    data_path: PathBuf,
    config: Option<ThreadsConfig>,
}

impl Store {
    /// Store rooted at an explicit home directory.
    pub fn at(home: impl Into<PathBuf>) -> Self {
        let home = home.into();
        let config = config::load_config(&home);
        let data_path = home.join(config::data_file_name(config.as_ref()));
        Self {
            home,
            data_path,
            config,
        }
    }

    /// Store at `THREADS_HOME`, else `~/.threads`.
    pub fn discover() -> Result<Self, StoreError> {
        let home = config::resolve_threads_home().ok_or(StoreError::NoHome)?;
        Ok(Self::at(home))
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    pub fn data_path(&self) -> &Path {
        &self.data_path
    }

    pub fn backup_path(&self) -> PathBuf {
        let mut name = self
            .data_path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        name.push(".bak");
        self.data_path.with_file_name(name)
    }

    pub fn config(&self) -> Option<&ThreadsConfig> {
        self.config.as_ref()
    }

    /// A missing data file reads as an empty document. A present but
    /// unreadable one is an error; it must never be silently replaced.
    pub fn load(&self) -> Result<Document, StoreError> {
        match fs::read_to_string(&self.data_path) {
            Ok(raw) => serde_json::from_str(&raw).map_err(|source| StoreError::Parse {
                path: self.data_path.clone(),
                source,
            }),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(Document::default()),
            Err(source) => Err(StoreError::Io {
                path: self.data_path.clone(),
                source,
            }),
        }
    }

    pub fn save(&self, doc: &Document) -> Result<(), StoreError> {
        fs::create_dir_all(&self.home).map_err(|source| StoreError::Io {
            path: self.home.clone(),
            source,
        })?;
        if self.data_path.exists() {
            let backup = self.backup_path();
            fs::copy(&self.data_path, &backup).map_err(|source| StoreError::Io {
                path: backup,
                source,
            })?;
        }
        let raw = serde_json::to_string_pretty(doc).map_err(StoreError::Serialize)?;
        fs::write(&self.data_path, raw).map_err(|source| StoreError::Io {
            path: self.data_path.clone(),
            source,
        })?;
        debug!(
            path = %self.data_path.display(),
            threads = doc.threads.len(),
            containers = doc.containers.len(),
            groups = doc.groups.len(),
            "saved document"
        );
        Ok(())
    }

    /// One read-modify-write cycle. The document is written back only when
    /// the closure succeeds.
    pub fn mutate<T, E>(&self, f: impl FnOnce(&mut Document) -> Result<T, E>) -> Result<T, E>
    where
        E: From<StoreError>,
    {
        let mut doc = self.load()?;
        let out = f(&mut doc)?;
        self.save(&doc)?;
        Ok(out)
    }
}
