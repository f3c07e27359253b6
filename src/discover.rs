// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Bounded-depth symlink discovery.
//!
//! Survey a directory tree for symlinks that already exist on disk, so they
//! can be captured into the persisted symlink set. The survey is read-only.
//!
//! Depth counts directory levels below the search root. Entries directly
//! inside the root sit at depth 1, so a maximum depth of 2 reports symlinks
//! like `~/.vimrc` and `~/.config/nvim`, but never `~/.config/nvim/lua`.
//! Symlinked directories are reported as symlinks and never descended into.

use crate::{
    fs::{FileKind, Filesystem, FsError},
    path::clean,
};

use std::{
    collections::VecDeque,
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::{debug, instrument, warn};

/// Symlink found on disk.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct FoundLink {
    /// Absolute path to where the symlink points.
    pub target: PathBuf,

    /// Absolute path of the symlink itself.
    pub link: PathBuf,
}

/// Walk directory trees looking for symlinks.
#[derive(Debug, Clone)]
pub struct SymlinkWalker {
    fs: Arc<dyn Filesystem>,
}

impl SymlinkWalker {
    /// Construct new symlink walker.
    pub fn new(fs: Arc<dyn Filesystem>) -> Self {
        Self { fs }
    }

    /// Find every symlink under root up to a maximum depth.
    ///
    /// Subdirectories that cannot be read are skipped with a warning. Relative
    /// symlink targets are resolved against the directory holding the link.
    ///
    /// # Errors
    ///
    /// - Return [`FsError`] if root itself cannot be read.
    #[instrument(skip(self), level = "debug")]
    pub fn walk(&self, root: &Path, max_depth: usize) -> Result<Vec<FoundLink>, FsError> {
        let mut found = Vec::new();
        if max_depth == 0 {
            return Ok(found);
        }

        let mut dirs_and_depths = VecDeque::new();
        dirs_and_depths.push_front((root.to_path_buf(), 1));

        // Use DFS to traverse directory tree.
        while let Some((dir, depth)) = dirs_and_depths.pop_front() {
            let entries = match self.fs.read_dir(&dir) {
                Ok(entries) => entries,
                Err(err) if dir.as_path() == root => return Err(err),
                Err(err) => {
                    warn!("skip unreadable directory {:?}: {err}", dir.display());
                    continue;
                }
            };

            for entry in entries {
                match self.fs.stat(&entry) {
                    // INVARIANT: Hit a symlink? Record where it points!
                    Ok(FileKind::Symlink) => match self.fs.read_link(&entry) {
                        Ok(target) => {
                            debug!("found symlink {:?}", entry.display());
                            let target = resolve_target(&entry, &target);
                            found.push(FoundLink {
                                target,
                                link: entry,
                            });
                        }
                        Err(err) => warn!("skip unreadable symlink {:?}: {err}", entry.display()),
                    },
                    // INVARIANT: Hit a directory? Traverse it while depth allows!
                    Ok(FileKind::Dir) if depth < max_depth => {
                        dirs_and_depths.push_front((entry, depth + 1));
                    }
                    Ok(_) => continue,
                    Err(err) => warn!("skip entry {:?}: {err}", entry.display()),
                }
            }
        }

        Ok(found)
    }
}

fn resolve_target(link: &Path, target: &Path) -> PathBuf {
    if target.is_absolute() {
        return target.to_path_buf();
    }

    match link.parent() {
        Some(parent) => clean(parent.join(target)),
        None => clean(target),
    }
}
