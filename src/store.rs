// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Typed record persistence.
//!
//! Managers persist their desired state as typed records inside the
//! configuration root. A [`RecordStore`] reads and saves those records. The
//! only implementation shipped is [`TomlStore`], which serializes records as
//! TOML through a [`Filesystem`].
//!
//! A missing record file is reported as [`StoreError::NoSuchFile`], which
//! callers generally treat as "nothing persisted yet" rather than a failure.

use crate::{
    fs::{Filesystem, FsError},
    path::{create_parent_dirs, PathError},
};

use serde::{de::DeserializeOwned, Serialize};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::{debug, instrument};

/// Read and save typed records.
pub trait RecordStore {
    /// Read record at path.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::NoSuchFile`] if no record exists at path.
    /// - Return other [`StoreError`] variants if record cannot be read or
    ///   parsed.
    fn read<T>(&self, path: &Path) -> Result<T>
    where
        T: DeserializeOwned;

    /// Save record at path, replacing whatever was there.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError`] if record cannot be serialized or written.
    fn save<T>(&self, value: &T, path: &Path) -> Result<()>
    where
        T: Serialize;

    /// Save pre-rendered record contents at path.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError`] if contents cannot be written.
    fn save_raw(&self, contents: &str, path: &Path) -> Result<()>;

    /// Read record at path, treating a missing record as default state.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError`] for anything other than a missing record.
    fn read_or_default<T>(&self, path: &Path) -> Result<T>
    where
        T: DeserializeOwned + Default,
    {
        match self.read(path) {
            Err(StoreError::NoSuchFile { .. }) => Ok(T::default()),
            result => result,
        }
    }
}

/// Record store that keeps records as TOML files.
#[derive(Debug, Clone)]
pub struct TomlStore {
    fs: Arc<dyn Filesystem>,
}

impl TomlStore {
    /// Construct new TOML record store.
    pub fn new(fs: Arc<dyn Filesystem>) -> Self {
        Self { fs }
    }
}

impl RecordStore for TomlStore {
    #[instrument(skip(self), level = "debug")]
    fn read<T>(&self, path: &Path) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let data = self.fs.read_to_string(path).map_err(|err| match err {
            err if err.is_not_found() => StoreError::NoSuchFile {
                path: path.to_path_buf(),
            },
            err => StoreError::Read {
                source: err,
                path: path.to_path_buf(),
            },
        })?;

        toml::de::from_str(&data).map_err(|err| StoreError::Deserialize {
            source: err,
            path: path.to_path_buf(),
        })
    }

    #[instrument(skip(self, value), level = "debug")]
    fn save<T>(&self, value: &T, path: &Path) -> Result<()>
    where
        T: Serialize,
    {
        let data = toml::ser::to_string_pretty(value).map_err(|err| StoreError::Serialize {
            source: err,
            path: path.to_path_buf(),
        })?;

        self.save_raw(&data, path)
    }

    #[instrument(skip(self, contents), level = "debug")]
    fn save_raw(&self, contents: &str, path: &Path) -> Result<()> {
        create_parent_dirs(self.fs.as_ref(), path)?;
        debug!("write record to {:?}", path.display());
        self.fs
            .write(path, contents.as_bytes())
            .map_err(|err| StoreError::Write {
                source: err,
                path: path.to_path_buf(),
            })
    }
}

/// Record persistence error types.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No record exists at path.
    #[error("no such file {:?}", path.display())]
    NoSuchFile { path: PathBuf },

    /// Record file cannot be read.
    #[error("failed to read record from {:?}", path.display())]
    Read {
        #[source]
        source: FsError,
        path: PathBuf,
    },

    /// Record file cannot be written.
    #[error("failed to write record to {:?}", path.display())]
    Write {
        #[source]
        source: FsError,
        path: PathBuf,
    },

    /// Record contents cannot be parsed.
    #[error("failed to parse record at {:?}", path.display())]
    Deserialize {
        #[source]
        source: toml::de::Error,
        path: PathBuf,
    },

    /// Record cannot be rendered.
    #[error("failed to render record for {:?}", path.display())]
    Serialize {
        #[source]
        source: toml::ser::Error,
        path: PathBuf,
    },

    /// Directories for record file cannot be created.
    #[error(transparent)]
    Path(#[from] PathError),
}

/// Friendly result alias :3
pub type Result<T, E = StoreError> = std::result::Result<T, E>;
