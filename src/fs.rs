// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Filesystem abstraction.
//!
//! All filesystem access made by the link engine goes through the
//! [`Filesystem`] trait. This lets the engine run against the real disk via
//! [`RealFs`], or against a purely in-memory tree via [`MemoryFs`] so that
//! convergence logic can be tested without touching the user's machine.
//!
//! Every operation reports failure through [`FsError`], which classifies
//! "not found" conditions separately from other I/O failures. Callers rely on
//! that distinction to tell an absent link apart from a broken disk.

use std::{
    collections::BTreeMap,
    fmt::Debug,
    fs,
    io::{Error as IoError, ErrorKind},
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard, PoisonError},
};
use tracing::instrument;

/// Kind of entry found at a path.
///
/// Symlinks are reported as [`FileKind::Symlink`] no matter what they point
/// to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    File,
    Dir,
    Symlink,
}

/// Injectable filesystem operations.
pub trait Filesystem: Debug + Send + Sync {
    /// Create empty file, truncating it if it already exists.
    fn create(&self, path: &Path) -> Result<()>;

    /// Query kind of entry at path without following symlinks.
    fn stat(&self, path: &Path) -> Result<FileKind>;

    /// Create symlink at `link` that points to `target`.
    fn symlink(&self, target: &Path, link: &Path) -> Result<()>;

    /// Read the path a symlink points to.
    fn read_link(&self, link: &Path) -> Result<PathBuf>;

    /// Remove a file, symlink, or empty directory.
    ///
    /// Symlinks are removed themselves, never what they point to.
    fn remove(&self, path: &Path) -> Result<()>;

    /// Create directory and all of its missing parents.
    fn mkdir_all(&self, path: &Path) -> Result<()>;

    /// List entries of a directory in sorted order.
    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>>;

    /// Read entire file into a string.
    fn read_to_string(&self, path: &Path) -> Result<String>;

    /// Write entire contents to file, creating it if needed.
    fn write(&self, path: &Path, contents: &[u8]) -> Result<()>;
}

/// Filesystem operations on the real disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealFs;

impl RealFs {
    /// Construct new real filesystem handle.
    pub fn new() -> Self {
        Self
    }
}

impl Filesystem for RealFs {
    #[instrument(skip(self), level = "trace")]
    fn create(&self, path: &Path) -> Result<()> {
        fs::File::create(path).map_err(|err| FsError::from_io(err, path))?;
        Ok(())
    }

    #[instrument(skip(self), level = "trace")]
    fn stat(&self, path: &Path) -> Result<FileKind> {
        let file_type = fs::symlink_metadata(path)
            .map_err(|err| FsError::from_io(err, path))?
            .file_type();

        if file_type.is_symlink() {
            Ok(FileKind::Symlink)
        } else if file_type.is_dir() {
            Ok(FileKind::Dir)
        } else {
            Ok(FileKind::File)
        }
    }

    #[instrument(skip(self), level = "trace")]
    fn symlink(&self, target: &Path, link: &Path) -> Result<()> {
        #[cfg(unix)]
        {
            std::os::unix::fs::symlink(target, link).map_err(|err| FsError::from_io(err, link))
        }

        #[cfg(windows)]
        {
            let resolved = if target.is_absolute() {
                target.to_path_buf()
            } else {
                link.parent().unwrap_or_else(|| Path::new(".")).join(target)
            };

            if resolved.is_dir() {
                std::os::windows::fs::symlink_dir(target, link)
            } else {
                std::os::windows::fs::symlink_file(target, link)
            }
            .map_err(|err| FsError::from_io(err, link))
        }
    }

    #[instrument(skip(self), level = "trace")]
    fn read_link(&self, link: &Path) -> Result<PathBuf> {
        fs::read_link(link).map_err(|err| match err.kind() {
            ErrorKind::InvalidInput => FsError::NotASymlink {
                path: link.to_path_buf(),
            },
            _ => FsError::from_io(err, link),
        })
    }

    #[instrument(skip(self), level = "trace")]
    fn remove(&self, path: &Path) -> Result<()> {
        let result = match self.stat(path)? {
            FileKind::Dir => fs::remove_dir(path),
            #[cfg(windows)]
            FileKind::Symlink => fs::remove_dir(path).or_else(|_| fs::remove_file(path)),
            _ => fs::remove_file(path),
        };

        result.map_err(|err| FsError::from_io(err, path))
    }

    #[instrument(skip(self), level = "trace")]
    fn mkdir_all(&self, path: &Path) -> Result<()> {
        mkdirp::mkdirp(path).map_err(|err| FsError::from_io(err, path))?;
        Ok(())
    }

    #[instrument(skip(self), level = "trace")]
    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let mut entries = fs::read_dir(path)
            .map_err(|err| FsError::from_io(err, path))?
            .map(|entry| {
                entry
                    .map(|entry| entry.path())
                    .map_err(|err| FsError::from_io(err, path))
            })
            .collect::<Result<Vec<_>>>()?;
        entries.sort();

        Ok(entries)
    }

    #[instrument(skip(self), level = "trace")]
    fn read_to_string(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path).map_err(|err| FsError::from_io(err, path))
    }

    #[instrument(skip(self, contents), level = "trace")]
    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        fs::write(path, contents).map_err(|err| FsError::from_io(err, path))
    }
}

/// Entry of in-memory filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Node {
    File(Vec<u8>),
    Dir,
    Symlink(PathBuf),
}

impl Node {
    fn kind(&self) -> FileKind {
        match self {
            Self::File(_) => FileKind::File,
            Self::Dir => FileKind::Dir,
            Self::Symlink(_) => FileKind::Symlink,
        }
    }
}

/// Symlink hops allowed before giving up on resolution.
const MAX_SYMLINK_HOPS: usize = 40;

/// Purely in-memory filesystem.
///
/// Starts out with nothing but the root directory. Paths are expected to be
/// absolute and clean. Parent directories are never created implicitly, so
/// callers must create them just like they would on a real disk.
#[derive(Debug)]
pub struct MemoryFs {
    nodes: Mutex<BTreeMap<PathBuf, Node>>,
}

impl Default for MemoryFs {
    fn default() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(PathBuf::from("/"), Node::Dir);

        Self {
            nodes: Mutex::new(nodes),
        }
    }
}

impl MemoryFs {
    /// Construct new in-memory filesystem containing only the root directory.
    pub fn new() -> Self {
        Self::default()
    }

    fn nodes(&self) -> MutexGuard<'_, BTreeMap<PathBuf, Node>> {
        self.nodes.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Follow symlinks at path until a non-symlink entry is hit.
fn resolve(nodes: &BTreeMap<PathBuf, Node>, path: &Path) -> Result<(PathBuf, Node)> {
    let mut current = path.to_path_buf();
    for _ in 0..MAX_SYMLINK_HOPS {
        match nodes.get(&current) {
            Some(Node::Symlink(target)) => {
                current = if target.is_absolute() {
                    crate::path::clean(target)
                } else {
                    let parent = current.parent().unwrap_or_else(|| Path::new("/"));
                    crate::path::clean(parent.join(target))
                };
            }
            Some(node) => return Ok((current, node.clone())),
            None => return Err(FsError::NotFound { path: current }),
        }
    }

    Err(FsError::Io {
        source: IoError::other("too many levels of symbolic links"),
        path: path.to_path_buf(),
    })
}

/// Require that parent of path is an existing directory.
fn require_parent_dir(nodes: &BTreeMap<PathBuf, Node>, path: &Path) -> Result<()> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };

    match resolve(nodes, parent)? {
        (_, Node::Dir) => Ok(()),
        _ => Err(FsError::NotADirectory {
            path: parent.to_path_buf(),
        }),
    }
}

impl Filesystem for MemoryFs {
    fn create(&self, path: &Path) -> Result<()> {
        self.write(path, &[])
    }

    fn stat(&self, path: &Path) -> Result<FileKind> {
        self.nodes()
            .get(path)
            .map(Node::kind)
            .ok_or_else(|| FsError::NotFound {
                path: path.to_path_buf(),
            })
    }

    fn symlink(&self, target: &Path, link: &Path) -> Result<()> {
        let mut nodes = self.nodes();
        if nodes.contains_key(link) {
            return Err(FsError::AlreadyExists {
                path: link.to_path_buf(),
            });
        }

        require_parent_dir(&nodes, link)?;
        nodes.insert(link.to_path_buf(), Node::Symlink(target.to_path_buf()));

        Ok(())
    }

    fn read_link(&self, link: &Path) -> Result<PathBuf> {
        match self.nodes().get(link) {
            Some(Node::Symlink(target)) => Ok(target.clone()),
            Some(_) => Err(FsError::NotASymlink {
                path: link.to_path_buf(),
            }),
            None => Err(FsError::NotFound {
                path: link.to_path_buf(),
            }),
        }
    }

    fn remove(&self, path: &Path) -> Result<()> {
        let mut nodes = self.nodes();
        match nodes.get(path) {
            None => {
                return Err(FsError::NotFound {
                    path: path.to_path_buf(),
                })
            }
            Some(Node::Dir) if nodes.keys().any(|key| key.parent() == Some(path)) => {
                return Err(FsError::DirectoryNotEmpty {
                    path: path.to_path_buf(),
                })
            }
            Some(_) => {}
        }

        nodes.remove(path);
        Ok(())
    }

    fn mkdir_all(&self, path: &Path) -> Result<()> {
        let mut nodes = self.nodes();
        let mut current = PathBuf::new();
        for component in path.components() {
            current.push(component);
            match resolve(&nodes, &current) {
                Ok((_, Node::Dir)) => continue,
                Ok(_) => {
                    return Err(FsError::NotADirectory {
                        path: current.clone(),
                    })
                }
                Err(err) if err.is_not_found() && nodes.get(&current).is_none() => {
                    nodes.insert(current.clone(), Node::Dir);
                }
                Err(err) => return Err(err),
            }
        }

        Ok(())
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let nodes = self.nodes();
        let (resolved, node) = resolve(&nodes, path)?;
        if node != Node::Dir {
            return Err(FsError::NotADirectory {
                path: path.to_path_buf(),
            });
        }

        Ok(nodes
            .keys()
            .filter(|key| key.parent() == Some(resolved.as_path()))
            .filter_map(|key| key.file_name().map(|name| path.join(name)))
            .collect())
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        let nodes = self.nodes();
        match resolve(&nodes, path)? {
            (_, Node::File(contents)) => String::from_utf8(contents).map_err(|err| FsError::Io {
                source: IoError::new(ErrorKind::InvalidData, err),
                path: path.to_path_buf(),
            }),
            _ => Err(FsError::Io {
                source: IoError::other("is a directory"),
                path: path.to_path_buf(),
            }),
        }
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        let mut nodes = self.nodes();
        let destination = match resolve(&nodes, path) {
            Ok((resolved, Node::File(_))) => resolved,
            Ok(_) => {
                return Err(FsError::Io {
                    source: IoError::other("is a directory"),
                    path: path.to_path_buf(),
                })
            }
            // INVARIANT: Dangling symlinks get their target created.
            Err(FsError::NotFound { path: missing }) => missing,
            Err(err) => return Err(err),
        };

        require_parent_dir(&nodes, &destination)?;
        nodes.insert(destination, Node::File(contents.to_vec()));

        Ok(())
    }
}

/// Filesystem error types.
#[derive(Debug, thiserror::Error)]
pub enum FsError {
    /// Nothing exists at path.
    #[error("no such file or directory {:?}", path.display())]
    NotFound { path: PathBuf },

    /// Entry at path exists, but is not a symlink.
    #[error("{:?} is not a symlink", path.display())]
    NotASymlink { path: PathBuf },

    /// Entry at path already exists.
    #[error("{:?} already exists", path.display())]
    AlreadyExists { path: PathBuf },

    /// Entry at path is expected to be a directory, but is not.
    #[error("{:?} is not a directory", path.display())]
    NotADirectory { path: PathBuf },

    /// Directory at path still has entries.
    #[error("directory {:?} is not empty", path.display())]
    DirectoryNotEmpty { path: PathBuf },

    /// Any other I/O failure.
    #[error("I/O failure at {:?}", path.display())]
    Io {
        #[source]
        source: IoError,
        path: PathBuf,
    },
}

impl FsError {
    /// Classify standard I/O error.
    pub fn from_io(err: IoError, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match err.kind() {
            ErrorKind::NotFound => Self::NotFound { path },
            ErrorKind::AlreadyExists => Self::AlreadyExists { path },
            _ => Self::Io { source: err, path },
        }
    }

    /// Check if error means that nothing exists at the path.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Friendly result alias :3
pub type Result<T, E = FsError> = std::result::Result<T, E>;
