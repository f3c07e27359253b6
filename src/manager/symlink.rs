// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Symlink set management.
//!
//! Keep the persisted [`SymlinkSet`] in step with what the [`LinkManager`]
//! actually does to the filesystem. Records are persisted in home-relative
//! form so the same record file works on any machine.
//!
//! Adding and removing are atomic with respect to the record file. A symlink
//! that cannot be created is never recorded, and a record is never dropped
//! while its symlink is still on disk.

use crate::{
    config::{DumpSettings, SymlinkSet},
    context::Context,
    discover::SymlinkWalker,
    fs::Filesystem,
    link::{LinkError, LinkManagement, LinkManager, Symlink},
    manager::{Manager, ManagerError},
    path::{as_absolute, PathError},
    report::{error_chain, Reporter},
    store::{RecordStore, StoreError, TomlStore},
};

use std::{path::PathBuf, sync::Arc};
use tracing::{debug, instrument, warn};

/// Name of symlink manager, and stem of its record file.
pub const SYMLINK_MANAGER: &str = "symlink";

/// Maintain persisted symlink set.
pub struct SymlinkManager<L = LinkManager, S = TomlStore>
where
    L: LinkManagement,
    S: RecordStore,
{
    fs: Arc<dyn Filesystem>,
    links: L,
    store: S,
    walker: SymlinkWalker,
    context: Context,
    config_file: PathBuf,
    dump_settings: DumpSettings,
    reporter: Arc<dyn Reporter>,
}

impl SymlinkManager {
    /// Construct symlink manager with default link handling and TOML
    /// persistence over filesystem.
    pub fn with_fs(
        fs: Arc<dyn Filesystem>,
        context: Context,
        reporter: Arc<dyn Reporter>,
    ) -> Self {
        let links = LinkManager::new(fs.clone(), context.clone());
        let store = TomlStore::new(fs.clone());
        Self::new(fs, links, store, context, reporter)
    }
}

impl<L, S> SymlinkManager<L, S>
where
    L: LinkManagement,
    S: RecordStore,
{
    /// Construct new symlink manager.
    ///
    /// Records are persisted in `<config_root>/symlink.toml`.
    pub fn new(
        fs: Arc<dyn Filesystem>,
        links: L,
        store: S,
        context: Context,
        reporter: Arc<dyn Reporter>,
    ) -> Self {
        Self {
            walker: SymlinkWalker::new(fs.clone()),
            config_file: context.config_file(SYMLINK_MANAGER),
            dump_settings: DumpSettings::default(),
            fs,
            links,
            store,
            context,
            reporter,
        }
    }

    /// Use dump settings for [`Manager::dump`].
    pub fn with_dump_settings(mut self, settings: DumpSettings) -> Self {
        self.dump_settings = settings;
        self
    }

    /// Create symlink and record it.
    ///
    /// The target must exist. An empty link is derived from the target, and
    /// an empty target is derived from the link. Adding a symlink that is
    /// already recorded converges it again, but leaves the record file alone.
    ///
    /// Returns the home-relative record.
    ///
    /// # Errors
    ///
    /// - Return [`SymlinkError::TargetNotFound`] if target does not exist.
    /// - Return [`SymlinkError::Underivable`] if the missing half cannot be
    ///   derived.
    /// - Return [`SymlinkError::Ensure`] if symlink cannot be created. Nothing
    ///   is recorded in this case.
    /// - Return [`SymlinkError::Store`] if record file cannot be read or saved.
    #[instrument(skip(self), level = "debug")]
    pub fn add(&self, target: &str, link: &str) -> Result<Symlink> {
        let symlink = self.resolve(target, link)?;
        debug!("resolved to {symlink}");

        self.links
            .ensure(&symlink)
            .map_err(|err| SymlinkError::Ensure {
                source: err,
                symlink: symlink.clone(),
            })?;

        let record = self.links.unexpand(&symlink);
        let mut set: SymlinkSet = self.store.read_or_default(&self.config_file)?;
        if set.contains(&record) {
            self.reporter.note(&format!("{record} is already tracked"));
            return Ok(record);
        }

        set.insert(record.clone());
        self.store.save(&set, &self.config_file)?;
        self.reporter.success(&format!("added {record}"));

        Ok(record)
    }

    /// Remove symlink and its record.
    ///
    /// The record is looked up before anything is touched on disk. If the
    /// symlink cannot be removed, the record stays.
    ///
    /// # Errors
    ///
    /// - Return [`SymlinkError::LinkNotFound`] if nothing exists at link.
    /// - Return [`SymlinkError::NotTracked`] if link is not recorded.
    /// - Return [`SymlinkError::Remove`] if symlink cannot be removed.
    /// - Return [`SymlinkError::Store`] if record file cannot be read or saved.
    #[instrument(skip(self), level = "debug")]
    pub fn remove(&self, link: &str) -> Result<()> {
        let absolute = as_absolute(
            self.fs.as_ref(),
            self.context.working_dir(),
            self.context.absolute(link),
        )
        .map_err(|err| match err {
            PathError::NoSuchPath { path } => SymlinkError::LinkNotFound { path },
            err => SymlinkError::Path(err),
        })?;

        let set: SymlinkSet = self.store.read_or_default(&self.config_file)?;
        let lookup = self
            .links
            .unexpand(&Symlink::new("", absolute.to_string_lossy()))
            .link;
        let record = set
            .find_by_link(&lookup)
            .cloned()
            .ok_or(SymlinkError::NotTracked { link: lookup })?;

        let expanded = self.links.expand(&record);
        let removed = self
            .links
            .remove(&expanded.link)
            .map_err(|err| SymlinkError::Remove {
                source: err,
                link: absolute.clone(),
            })?;
        if removed.target != expanded.target {
            warn!(
                "symlink {:?} pointed to {:?}, but was recorded as pointing to {:?}",
                expanded.link, removed.target, expanded.target
            );
        }

        let mut set: SymlinkSet = match self.store.read(&self.config_file) {
            Ok(set) => set,
            Err(StoreError::NoSuchFile { .. }) => {
                self.reporter
                    .note(&format!("removed {expanded}, but no record file remains"));
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        };

        if !set.remove(&record) {
            self.reporter
                .note(&format!("removed {expanded}, but its record was already gone"));
            return Ok(());
        }

        self.store.save(&set, &self.config_file)?;
        self.reporter.success(&format!("removed {record}"));

        Ok(())
    }

    /// Survey directories for existing symlinks.
    ///
    /// Each root is searched up to `max_depth` levels deep. Roots that cannot
    /// be read are skipped with a warning. Found symlinks are returned in
    /// home-relative form without duplicates. Nothing is persisted.
    #[instrument(skip(self, roots), level = "debug")]
    pub fn dump(
        &self,
        roots: impl IntoIterator<Item = impl AsRef<str>>,
        max_depth: usize,
    ) -> SymlinkSet {
        let mut set = SymlinkSet::new();
        for root in roots {
            let root = self.context.absolute(root);
            let found = match self.walker.walk(&root, max_depth) {
                Ok(found) => found,
                Err(err) => {
                    self.reporter
                        .note(&format!("skip {:?}: {err}", root.display()));
                    continue;
                }
            };

            for entry in found {
                let symlink = self
                    .links
                    .derive(&entry.target.to_string_lossy(), &entry.link.to_string_lossy());

                // INVARIANT: Only complete symlinks are worth recording.
                if !symlink.is_complete() {
                    continue;
                }

                set.insert(self.links.unexpand(&symlink));
            }
        }

        set
    }

    fn resolve(&self, target: &str, link: &str) -> Result<Symlink> {
        if target.is_empty() && link.is_empty() {
            return Err(SymlinkError::Underivable {
                symlink: Symlink::default(),
            });
        }

        if target.is_empty() {
            let link = self.context.absolute(link);
            let symlink = self.links.derive("", &link.to_string_lossy());
            if !symlink.is_complete() {
                return Err(SymlinkError::Underivable { symlink });
            }

            self.existing_target(&symlink.target)?;
            return Ok(symlink);
        }

        let target = self.existing_target(target)?;
        let link = if link.is_empty() {
            String::new()
        } else {
            self.context.absolute(link).to_string_lossy().into_owned()
        };

        let symlink = self.links.derive(&target.to_string_lossy(), &link);
        if !symlink.is_complete() {
            return Err(SymlinkError::Underivable { symlink });
        }

        Ok(symlink)
    }

    fn existing_target(&self, target: &str) -> Result<PathBuf> {
        as_absolute(
            self.fs.as_ref(),
            self.context.working_dir(),
            self.context.absolute(target),
        )
        .map_err(|err| match err {
            PathError::NoSuchPath { path } => SymlinkError::TargetNotFound { path },
            err => SymlinkError::Path(err),
        })
    }
}

impl<L, S> Manager for SymlinkManager<L, S>
where
    L: LinkManagement,
    S: RecordStore,
{
    fn name(&self) -> &str {
        SYMLINK_MANAGER
    }

    /// Render tracked records merged with newly discovered symlinks.
    ///
    /// Tracked records are kept even when the survey does not find them.
    fn dump(&self) -> Result<String, ManagerError> {
        let mut set: SymlinkSet = self
            .store
            .read_or_default(&self.config_file)
            .map_err(SymlinkError::Store)?;

        let found = Self::dump(self, &self.dump_settings.directories, self.dump_settings.depth);
        for symlink in found {
            // INVARIANT: Discovery only appends, existing records stay put.
            if set.insert(symlink.clone()) {
                debug!("discovered {symlink}");
            }
        }

        let output = toml::ser::to_string_pretty(&set).map_err(SymlinkError::Serialize)?;

        Ok(output)
    }

    #[instrument(skip(self), level = "debug")]
    fn ensure(&self) -> Result<(), ManagerError> {
        let set: SymlinkSet = self
            .store
            .read_or_default(&self.config_file)
            .map_err(SymlinkError::Store)?;

        let mut failures = Vec::new();
        for record in set.iter() {
            let symlink = self.links.expand(record);
            match self.links.ensure(&symlink) {
                Ok(()) => debug!("ensured {symlink}"),
                Err(err) => {
                    let failure = SymlinkError::Ensure {
                        source: err,
                        symlink,
                    };
                    self.reporter.failure(&error_chain(&failure));
                    failures.push(ManagerError::from(failure));
                }
            }
        }

        ManagerError::batch(failures)
    }

    fn update(&self) -> Result<(), ManagerError> {
        Ok(())
    }
}

/// Symlink management error types.
#[derive(Debug, thiserror::Error)]
pub enum SymlinkError {
    /// Missing half of symlink cannot be derived.
    #[error("cannot derive complete symlink from {symlink:?}")]
    Underivable { symlink: Symlink },

    /// Target does not exist.
    #[error("target {:?} does not exist", path.display())]
    TargetNotFound { path: PathBuf },

    /// Nothing exists at link.
    #[error("link {:?} does not exist", path.display())]
    LinkNotFound { path: PathBuf },

    /// Link is not part of record file.
    #[error("{link:?} not found in configuration")]
    NotTracked { link: String },

    /// Symlink could not be converged.
    #[error("failed to ensure symlink {symlink}")]
    Ensure {
        #[source]
        source: LinkError,
        symlink: Symlink,
    },

    /// Symlink could not be removed.
    #[error("failed to remove symlink {:?}", link.display())]
    Remove {
        #[source]
        source: LinkError,
        link: PathBuf,
    },

    /// Symlink set cannot be rendered.
    #[error("failed to render symlink set")]
    Serialize(#[source] toml::ser::Error),

    /// Path cannot be resolved.
    #[error(transparent)]
    Path(#[from] PathError),

    /// Record file cannot be read or saved.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Friendly result alias :3
pub type Result<T, E = SymlinkError> = std::result::Result<T, E>;
