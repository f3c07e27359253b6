// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Symlink derivation and convergence.
//!
//! A [`Symlink`] pairs a __target__, the real file kept in the dotfiles root,
//! with a __link__, the location where a symbolic link pointing at the target
//! should exist. The [`LinkManager`] completes partially specified pairs,
//! flips them between their home-relative and absolute forms, and converges
//! the filesystem so that a link really does point at its target.
//!
//! # Derivation
//!
//! Given only one half of a pair, the other half is derived by mirroring the
//! dotfiles root onto the home directory:
//!
//! | Given                        | Derived                        |
//! |------------------------------|--------------------------------|
//! | target `~/.dotfiles/vimrc`   | link `~/vimrc`                 |
//! | link `~/.config/nvim`        | target `~/.dotfiles/.config/nvim` |
//!
//! Derivation never fails loudly. If the given half is not absolute, or does
//! not live under the root it is mirrored from, the derived half is left
//! empty and the caller decides what to do about it.
//!
//! # Convergence
//!
//! Ensuring a symlink looks at whatever currently occupies the link:
//!
//! - Symlink to target: nothing to do.
//! - Symlink to anything else: replaced with a fresh symlink to target.
//! - Regular file or directory: refused, never overwritten.
//! - Nothing: parent directories are created, then the symlink.

use crate::{
    context::Context,
    fs::{FileKind, Filesystem, FsError},
    path::{create_parent_dirs, expand_home, unexpand_home, PathError},
};

use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::{debug, info, instrument};

/// Symlink description, i.e., what it links from and what it links to.
#[derive(Default, Debug, PartialEq, Eq, Clone, Hash, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Symlink {
    /// Path to the real file.
    pub target: String,

    /// Path where symlink to target should exist.
    pub link: String,
}

impl Symlink {
    /// Construct new symlink description.
    pub fn new(target: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            link: link.into(),
        }
    }

    /// Check that neither target nor link is missing.
    pub fn is_complete(&self) -> bool {
        !self.target.is_empty() && !self.link.is_empty()
    }
}

impl Display for Symlink {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        write!(fmt, "{} -> {}", self.link, self.target)
    }
}

/// Layer of indirection for symlink handling.
#[cfg_attr(test, mockall::automock)]
pub trait LinkManagement {
    /// Derive complete symlink from partial input.
    ///
    /// Underivable halves are left as empty strings.
    fn derive(&self, target: &str, link: &str) -> Symlink;

    /// Swap leading `~` for home directory in both halves.
    fn expand(&self, symlink: &Symlink) -> Symlink;

    /// Swap home directory for `~` in both halves.
    fn unexpand(&self, symlink: &Symlink) -> Symlink;

    /// Converge filesystem so that link points at target.
    ///
    /// # Errors
    ///
    /// - Return [`LinkError`] if convergence is refused or fails.
    fn ensure(&self, symlink: &Symlink) -> Result<()>;

    /// Remove symlink at link, leaving its target alone.
    ///
    /// Returns description of what was removed.
    ///
    /// # Errors
    ///
    /// - Return [`LinkError`] if nothing is at link, the entry at link is
    ///   not a symlink, or removal fails.
    fn remove(&self, link: &str) -> Result<Symlink>;
}

/// Symlink handling over an injected filesystem.
#[derive(Debug, Clone)]
pub struct LinkManager {
    fs: Arc<dyn Filesystem>,
    context: Context,
}

impl LinkManager {
    /// Construct new link manager.
    pub fn new(fs: Arc<dyn Filesystem>, context: Context) -> Self {
        Self { fs, context }
    }
}

impl LinkManagement for LinkManager {
    fn derive(&self, target: &str, link: &str) -> Symlink {
        match (target.is_empty(), link.is_empty()) {
            (false, true) => {
                let link = mirror(target, self.context.dotfiles_root(), self.context.user_home());
                Symlink::new(target, link.unwrap_or_default())
            }
            (true, false) => {
                let target = mirror(link, self.context.user_home(), self.context.dotfiles_root());
                Symlink::new(target.unwrap_or_default(), link)
            }
            _ => Symlink::new(target, link),
        }
    }

    fn expand(&self, symlink: &Symlink) -> Symlink {
        let home = self.context.home_str();
        Symlink::new(
            expand_home(&symlink.target, &home),
            expand_home(&symlink.link, &home),
        )
    }

    fn unexpand(&self, symlink: &Symlink) -> Symlink {
        let home = self.context.home_str();
        Symlink::new(
            unexpand_home(&symlink.target, &home),
            unexpand_home(&symlink.link, &home),
        )
    }

    #[instrument(skip(self, symlink), fields(symlink = %symlink), level = "debug")]
    fn ensure(&self, symlink: &Symlink) -> Result<()> {
        if !symlink.is_complete() {
            return Err(LinkError::Incomplete {
                symlink: symlink.clone(),
            });
        }

        let target = Path::new(&symlink.target);
        let link = Path::new(&symlink.link);
        match self.fs.stat(link) {
            Ok(FileKind::Symlink) => {
                let current = self.fs.read_link(link).map_err(|err| LinkError::ReadLink {
                    source: err,
                    link: link.to_path_buf(),
                })?;

                if current.as_path() == target {
                    debug!("symlink already exists");
                    return Ok(());
                }

                info!("replace stale symlink pointing to {:?}", current.display());
                self.fs.remove(link).map_err(|err| LinkError::RemoveLink {
                    source: err,
                    link: link.to_path_buf(),
                })?;
            }
            Ok(_) => {
                return Err(LinkError::AlreadyExists {
                    link: link.to_path_buf(),
                })
            }
            Err(err) if err.is_not_found() => {
                create_parent_dirs(self.fs.as_ref(), link)?;
            }
            Err(err) => {
                return Err(LinkError::Probe {
                    source: err,
                    link: link.to_path_buf(),
                })
            }
        }

        debug!("create symlink");
        self.fs
            .symlink(target, link)
            .map_err(|err| LinkError::CreateLink {
                source: err,
                symlink: symlink.clone(),
            })
    }

    #[instrument(skip(self), level = "debug")]
    fn remove(&self, link: &str) -> Result<Symlink> {
        let path = Path::new(link);
        match self.fs.stat(path) {
            Ok(FileKind::Symlink) => {}
            Ok(_) => {
                return Err(LinkError::NotASymlink {
                    link: path.to_path_buf(),
                })
            }
            Err(err) if err.is_not_found() => {
                return Err(LinkError::NoSuchLink {
                    link: path.to_path_buf(),
                })
            }
            Err(err) => {
                return Err(LinkError::Probe {
                    source: err,
                    link: path.to_path_buf(),
                })
            }
        }

        let target = self.fs.read_link(path).map_err(|err| LinkError::ReadLink {
            source: err,
            link: path.to_path_buf(),
        })?;
        self.fs.remove(path).map_err(|err| LinkError::RemoveLink {
            source: err,
            link: path.to_path_buf(),
        })?;

        Ok(Symlink::new(target.to_string_lossy(), link))
    }
}

/// Re-root path from one directory onto another.
///
/// Returns [`None`] if path is not absolute, or is not under `from`.
fn mirror(path: &str, from: &Path, onto: &Path) -> Option<String> {
    let path = Path::new(path);
    if !path.is_absolute() {
        return None;
    }

    let relative = path.strip_prefix(from).ok()?;
    let mirrored: PathBuf = if relative.as_os_str().is_empty() {
        onto.to_path_buf()
    } else {
        onto.join(relative)
    };

    Some(mirrored.to_string_lossy().into_owned())
}

/// Symlink handling error types.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// Target or link of symlink is missing.
    #[error("symlink {symlink:?} is missing its target or link")]
    Incomplete { symlink: Symlink },

    /// Non-symlink entry already occupies link.
    #[error("{:?} already exists, refuse to overwrite", link.display())]
    AlreadyExists { link: PathBuf },

    /// Entry at link is not a symlink.
    #[error("{:?} is not a symlink, refuse to remove", link.display())]
    NotASymlink { link: PathBuf },

    /// Nothing exists at link.
    #[error("no symlink at {:?}", link.display())]
    NoSuchLink { link: PathBuf },

    /// Link cannot be inspected.
    #[error("failed to inspect {:?}", link.display())]
    Probe {
        #[source]
        source: FsError,
        link: PathBuf,
    },

    /// Symlink at link cannot be read.
    #[error("failed to read symlink {:?}", link.display())]
    ReadLink {
        #[source]
        source: FsError,
        link: PathBuf,
    },

    /// Symlink at link cannot be removed.
    #[error("failed to remove symlink {:?}", link.display())]
    RemoveLink {
        #[source]
        source: FsError,
        link: PathBuf,
    },

    /// Symlink cannot be created.
    #[error("failed to create symlink {symlink}")]
    CreateLink {
        #[source]
        source: FsError,
        symlink: Symlink,
    },

    /// Parent directories of link cannot be created.
    #[error(transparent)]
    Path(#[from] PathError),
}

/// Friendly result alias :3
pub type Result<T, E = LinkError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemoryFs;
    use pretty_assertions::assert_eq;

    struct Fixture {
        fs: Arc<MemoryFs>,
        manager: LinkManager,
    }

    fn fixture() -> Fixture {
        let fs = Arc::new(MemoryFs::new());
        fs.mkdir_all(Path::new("/home/.dotfiles")).unwrap();
        let context = Context::new("/home", "/home/.dotfiles", "/home/.config/dotlink", "/home");
        let manager = LinkManager::new(fs.clone(), context);

        Fixture { fs, manager }
    }

    #[test]
    fn derive_keeps_complete_pair() {
        let Fixture { manager, .. } = fixture();
        let result = manager.derive("/target", "/link");
        assert_eq!(result, Symlink::new("/target", "/link"));
    }

    #[test]
    fn derive_target_from_link() {
        let Fixture { manager, .. } = fixture();
        let result = manager.derive("", "/home/link");
        assert_eq!(result, Symlink::new("/home/.dotfiles/link", "/home/link"));
    }

    #[test]
    fn derive_link_from_target() {
        let Fixture { manager, .. } = fixture();
        let result = manager.derive("/home/.dotfiles/config/nvim", "");
        assert_eq!(result, Symlink::new("/home/.dotfiles/config/nvim", "/home/config/nvim"));
    }

    #[test]
    fn derive_leaves_link_empty_outside_dotfiles() {
        let Fixture { manager, .. } = fixture();
        let result = manager.derive("/link", "");
        assert_eq!(result, Symlink::new("/link", ""));

        let result = manager.derive("/home/.dotfilesx/vimrc", "");
        assert_eq!(result.link, "");
    }

    #[test]
    fn derive_leaves_target_empty_for_relative_link() {
        let Fixture { manager, .. } = fixture();
        let result = manager.derive("", ".");
        assert_eq!(result, Symlink::new("", "."));
    }

    #[test]
    fn expand_swaps_tilde_for_home() {
        let Fixture { manager, .. } = fixture();
        let result = manager.expand(&Symlink::new("~/target", "~/link"));
        assert_eq!(result, Symlink::new("/home/target", "/home/link"));

        let result = manager.expand(&Symlink::new("/etc/hosts", "~/a~b"));
        assert_eq!(result, Symlink::new("/etc/hosts", "/home/a~b"));
    }

    #[test]
    fn unexpand_swaps_home_for_tilde() {
        let Fixture { manager, .. } = fixture();
        let result = manager.unexpand(&Symlink::new("/home/target", "/home/link"));
        assert_eq!(result, Symlink::new("~/target", "~/link"));
    }

    #[test]
    fn expand_and_unexpand_round_trip() {
        let Fixture { manager, .. } = fixture();
        let absolute = Symlink::new("/home/.dotfiles/vimrc", "/home/.vimrc");
        assert_eq!(manager.expand(&manager.unexpand(&absolute)), absolute);

        let relative = Symlink::new("~/.dotfiles/vimrc", "~/.vimrc");
        assert_eq!(manager.unexpand(&manager.expand(&relative)), relative);
    }

    #[test]
    fn ensure_creates_missing_symlink_and_parents() -> anyhow::Result<()> {
        let Fixture { fs, manager } = fixture();
        fs.create(Path::new("/home/.dotfiles/init.lua"))?;

        let symlink = Symlink::new("/home/.dotfiles/init.lua", "/home/.config/nvim/init.lua");
        manager.ensure(&symlink)?;

        assert_eq!(
            fs.read_link(Path::new("/home/.config/nvim/init.lua"))?,
            PathBuf::from("/home/.dotfiles/init.lua")
        );

        Ok(())
    }

    #[test]
    fn ensure_is_idempotent() -> anyhow::Result<()> {
        let Fixture { fs, manager } = fixture();
        fs.create(Path::new("/home/.dotfiles/target"))?;
        let symlink = Symlink::new("/home/.dotfiles/target", "/home/target");

        manager.ensure(&symlink)?;
        manager.ensure(&symlink)?;

        assert_eq!(
            fs.read_link(Path::new("/home/target"))?,
            PathBuf::from("/home/.dotfiles/target")
        );

        Ok(())
    }

    #[test]
    fn ensure_replaces_stale_symlink() -> anyhow::Result<()> {
        let Fixture { fs, manager } = fixture();
        fs.symlink(Path::new("/somewhere/else"), Path::new("/home/target"))?;

        manager.ensure(&Symlink::new("/home/.dotfiles/target", "/home/target"))?;

        assert_eq!(
            fs.read_link(Path::new("/home/target"))?,
            PathBuf::from("/home/.dotfiles/target")
        );

        Ok(())
    }

    #[test]
    fn ensure_refuses_to_overwrite_regular_file() -> anyhow::Result<()> {
        let Fixture { fs, manager } = fixture();
        fs.write(Path::new("/home/target"), b"keep me")?;
        fs.create(Path::new("/home/.dotfiles/target"))?;

        let result = manager.ensure(&Symlink::new("/home/.dotfiles/target", "/home/target"));
        assert!(matches!(result, Err(LinkError::AlreadyExists { .. })));
        assert_eq!(fs.stat(Path::new("/home/target"))?, FileKind::File);
        assert_eq!(fs.read_to_string(Path::new("/home/target"))?, "keep me");

        Ok(())
    }

    #[test]
    fn ensure_refuses_to_overwrite_directory() -> anyhow::Result<()> {
        let Fixture { fs, manager } = fixture();
        fs.mkdir_all(Path::new("/home/.config"))?;

        let result = manager.ensure(&Symlink::new("/home/.dotfiles/.config", "/home/.config"));
        assert!(matches!(result, Err(LinkError::AlreadyExists { .. })));
        assert_eq!(fs.stat(Path::new("/home/.config"))?, FileKind::Dir);

        Ok(())
    }

    #[test]
    fn ensure_succeeds_when_target_is_missing() -> anyhow::Result<()> {
        let Fixture { fs, manager } = fixture();
        manager.ensure(&Symlink::new("/target", "/link"))?;
        assert_eq!(fs.read_link(Path::new("/link"))?, PathBuf::from("/target"));

        Ok(())
    }

    #[test]
    fn ensure_rejects_incomplete_symlink() {
        let Fixture { manager, .. } = fixture();
        let result = manager.ensure(&Symlink::new("/home/.dotfiles/target", ""));
        assert!(matches!(result, Err(LinkError::Incomplete { .. })));
    }

    #[test]
    fn remove_deletes_symlink_only() -> anyhow::Result<()> {
        let Fixture { fs, manager } = fixture();
        fs.create(Path::new("/home/.dotfiles/file"))?;
        let symlink = manager.derive("", "/home/file");
        manager.ensure(&symlink)?;

        let result = manager.remove(&symlink.link)?;
        assert_eq!(result, Symlink::new("/home/.dotfiles/file", "/home/file"));
        assert!(fs.stat(Path::new("/home/file")).unwrap_err().is_not_found());
        assert_eq!(fs.stat(Path::new("/home/.dotfiles/file"))?, FileKind::File);

        Ok(())
    }

    #[test]
    fn remove_refuses_regular_file() -> anyhow::Result<()> {
        let Fixture { fs, manager } = fixture();
        fs.create(Path::new("/home/file"))?;

        let result = manager.remove("/home/file");
        assert!(matches!(result, Err(LinkError::NotASymlink { .. })));
        assert_eq!(fs.stat(Path::new("/home/file"))?, FileKind::File);

        Ok(())
    }

    #[test]
    fn remove_fails_when_nothing_is_there() {
        let Fixture { manager, .. } = fixture();
        let result = manager.remove("/home/nothing");
        assert!(matches!(result, Err(LinkError::NoSuchLink { .. })));
    }
}
