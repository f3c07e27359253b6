// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path resolution utilities.
//!
//! Determine relevent path information for files that need to be linked,
//! persisted, or otherwise managed in some way.
//!
//! # Home-Relative Paths
//!
//! Persisted symlink records are stored __home-relative__, i.e., the leading
//! home directory of a path is swapped out for a `~` placeholder. This keeps
//! records portable across machines whose home directories differ. Expansion
//! and unexpansion are plain textual substitutions of the _first_ occurrence
//! of the placeholder or home directory. No path normalization is performed
//! here, because stored records rely on that exact behavior.

use crate::fs::{FileKind, Filesystem, FsError};

use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Placeholder that stands in for the user's home directory.
pub const HOME_PLACEHOLDER: &str = "~";

/// Determine absolute path to user's home directory.
///
/// Does not check if the path returned actually exists.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
pub fn home_dir() -> Result<PathBuf, NoWayHome> {
    dirs::home_dir().ok_or(NoWayHome)
}

/// Determine default absolute path to the configuration root.
///
/// Uses XDG Base Directory path `$XDG_CONFIG_HOME/dotlink` as the default
/// location for persisted records. Does not check if the path returned
/// actually exists.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
///
/// # See Also
///
/// - [XDG Base Directory](https://wiki.archlinux.org/title/XDG_Base_Directory)
pub fn default_config_root() -> Result<PathBuf, NoWayHome> {
    dirs::config_dir()
        .map(|path| path.join("dotlink"))
        .ok_or(NoWayHome)
}

/// Replace first occurrence of `~` with absolute path to home directory.
///
/// Paths without a tilde pass through untouched. The replacement is textual
/// rather than per component, so a stray tilde such as the one in
/// `/tmp/~x` gets replaced too. Record files written with this rule must
/// keep expanding to the same paths, so callers holding raw user input
/// should only call this when the path starts with a `~` component.
pub fn expand_home(path: &str, home: &str) -> String {
    path.replacen(HOME_PLACEHOLDER, home, 1)
}

/// Replace first occurrence of home directory with `~`.
///
/// An empty home directory leaves the path untouched.
pub fn unexpand_home(path: &str, home: &str) -> String {
    if home.is_empty() {
        return path.to_owned();
    }

    path.replacen(home, HOME_PLACEHOLDER, 1)
}

/// Lexically clean a path.
///
/// Drops `.` components and resolves `..` against preceding components
/// without touching the filesystem. A `..` at the root stays at the root.
pub fn clean(path: impl AsRef<Path>) -> PathBuf {
    let mut cleaned = PathBuf::new();
    for component in path.as_ref().components() {
        match component {
            Component::CurDir => continue,
            Component::ParentDir => {
                let popped = match cleaned.components().next_back() {
                    Some(Component::Normal(_)) => cleaned.pop(),
                    Some(Component::RootDir | Component::Prefix(_)) => true,
                    _ => false,
                };

                if !popped {
                    cleaned.push(component);
                }
            }
            _ => cleaned.push(component),
        }
    }

    if cleaned.as_os_str().is_empty() {
        cleaned.push(".");
    }

    cleaned
}

/// Make path absolute relative to a working directory.
///
/// Absolute paths are only cleaned. Relative paths are joined onto the
/// working directory first. Does not check for existence.
pub fn absolutize(working_dir: impl AsRef<Path>, path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    if path.is_absolute() {
        clean(path)
    } else {
        clean(working_dir.as_ref().join(path))
    }
}

/// Make path absolute relative to a working directory, requiring existence.
///
/// Existence is checked without following symlinks, so a dangling symlink
/// still counts as existing.
///
/// # Errors
///
/// - Return [`PathError::NoSuchPath`] if nothing exists at the resolved path.
/// - Return [`PathError::Probe`] if the filesystem could not be queried.
pub fn as_absolute(
    fs: &dyn Filesystem,
    working_dir: impl AsRef<Path>,
    path: impl AsRef<Path>,
) -> Result<PathBuf> {
    let absolute = absolutize(working_dir, path.as_ref());
    match fs.stat(&absolute) {
        Ok(_) => Ok(absolute),
        Err(err) if err.is_not_found() => Err(PathError::NoSuchPath { path: absolute }),
        Err(err) => Err(PathError::Probe {
            source: err,
            path: absolute,
        }),
    }
}

/// Create all missing parent directories of a file.
///
/// Succeeds if the directories are already there.
///
/// # Errors
///
/// - Return [`PathError::CreateParents`] if directory creation fails.
pub fn create_parent_dirs(fs: &dyn Filesystem, file: impl AsRef<Path>) -> Result<()> {
    let Some(parent) = file.as_ref().parent() else {
        return Ok(());
    };

    if parent.as_os_str().is_empty() {
        return Ok(());
    }

    if let Ok(FileKind::Dir) = fs.stat(parent) {
        return Ok(());
    }

    debug!("create required directories {:?}", parent.display());
    fs.mkdir_all(parent).map_err(|err| PathError::CreateParents {
        source: err,
        path: parent.to_path_buf(),
    })
}

/// No way to determine user's home directory.
///
/// # See Also
///
/// - [`dirs::home_dir`](https://docs.rs/dirs/latest/dirs/fn.home_dir.html)
#[derive(Clone, Debug, thiserror::Error)]
#[error("cannot determine absolute path to user's home directory")]
pub struct NoWayHome;

/// Path resolution error types.
#[derive(Debug, thiserror::Error)]
pub enum PathError {
    /// Nothing exists at resolved path.
    #[error("no such file or directory {:?}", path.display())]
    NoSuchPath { path: PathBuf },

    /// Filesystem could not be queried about resolved path.
    #[error("failed to inspect {:?}", path.display())]
    Probe {
        #[source]
        source: FsError,
        path: PathBuf,
    },

    /// Parent directories could not be created.
    #[error("failed to create directories {:?}", path.display())]
    CreateParents {
        #[source]
        source: FsError,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = PathError> = std::result::Result<T, E>;
