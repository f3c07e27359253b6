// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Manager orchestration.
//!
//! A __manager__ owns one kind of desired state, and knows how to capture it
//! from the current machine (dump), how to converge the machine towards it
//! (ensure), and how to refresh whatever it manages (update). The
//! [`RootManager`] holds the fixed set of managers selected at startup and
//! runs these operations across all of them.
//!
//! Batch operations are best effort. A failing manager never stops the
//! remaining managers from running. Every failure is collected and reported
//! at the end through [`ManagerError::Batch`].

pub mod symlink;

use crate::{
    context::Context,
    report::{error_chain, Reporter},
    store::{RecordStore, StoreError, TomlStore},
};

use std::{path::PathBuf, sync::Arc};
use tracing::{debug, instrument};

#[doc(inline)]
pub use symlink::{SymlinkError, SymlinkManager};

/// Shared capability interface of all managers.
pub trait Manager {
    /// Name of manager, also names its record file.
    fn name(&self) -> &str;

    /// Capture current state as record file contents.
    ///
    /// # Errors
    ///
    /// - Return [`ManagerError`] if state cannot be captured or rendered.
    fn dump(&self) -> Result<String>;

    /// Converge machine towards recorded state.
    ///
    /// # Errors
    ///
    /// - Return [`ManagerError`] if anything could not be converged.
    fn ensure(&self) -> Result<()>;

    /// Refresh whatever is being managed.
    ///
    /// # Errors
    ///
    /// - Return [`ManagerError`] if refresh fails.
    fn update(&self) -> Result<()>;
}

/// Runs batch operations across all managers.
pub struct RootManager<S = TomlStore>
where
    S: RecordStore,
{
    managers: Vec<Box<dyn Manager>>,
    context: Context,
    store: S,
    reporter: Arc<dyn Reporter>,
}

impl<S> RootManager<S>
where
    S: RecordStore,
{
    /// Construct new root manager without any managers.
    pub fn new(context: Context, store: S, reporter: Arc<dyn Reporter>) -> Self {
        Self {
            managers: Vec::new(),
            context,
            store,
            reporter,
        }
    }

    /// Register manager.
    pub fn with_manager(mut self, manager: impl Manager + 'static) -> Self {
        self.managers.push(Box::new(manager));
        self
    }

    /// Names of all registered managers in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.managers.iter().map(|manager| manager.name())
    }

    /// Path to record file of named manager.
    pub fn config_file(&self, name: &str) -> PathBuf {
        self.context.config_file(name)
    }

    /// Dump every manager, saving each output to its record file.
    ///
    /// # Errors
    ///
    /// - Return [`ManagerError::Batch`] holding every dump or save failure.
    #[instrument(skip(self), level = "debug")]
    pub fn dump(&self) -> Result<()> {
        let mut failures = Vec::new();
        for manager in &self.managers {
            let name = manager.name();
            debug!("run dump for {name}");

            let output = match manager.dump() {
                Ok(output) => output,
                Err(err) => {
                    self.fail(&mut failures, ManagerError::failed(name, Action::Dump, err));
                    continue;
                }
            };

            let path = self.config_file(name);
            if let Err(err) = self.store.save_raw(&output, &path) {
                let failure = ManagerError::Save {
                    source: err,
                    name: name.into(),
                };
                self.fail(&mut failures, failure);
                continue;
            }

            self.reporter
                .success(&format!("dump of {name} saved to {:?}", path.display()));
        }

        ManagerError::batch(failures)
    }

    /// Ensure every manager.
    ///
    /// # Errors
    ///
    /// - Return [`ManagerError::Batch`] holding every ensure failure.
    #[instrument(skip(self), level = "debug")]
    pub fn ensure(&self) -> Result<()> {
        let mut failures = Vec::new();
        for manager in &self.managers {
            debug!("run ensure for {}", manager.name());
            if let Err(err) = manager.ensure() {
                self.fail(&mut failures, ManagerError::failed(manager.name(), Action::Ensure, err));
            }
        }

        ManagerError::batch(failures)
    }

    /// Update every manager.
    ///
    /// # Errors
    ///
    /// - Return [`ManagerError::Batch`] holding every update failure.
    #[instrument(skip(self), level = "debug")]
    pub fn update(&self) -> Result<()> {
        let mut failures = Vec::new();
        for manager in &self.managers {
            debug!("run update for {}", manager.name());
            if let Err(err) = manager.update() {
                self.fail(&mut failures, ManagerError::failed(manager.name(), Action::Update, err));
            }
        }

        ManagerError::batch(failures)
    }

    fn fail(&self, failures: &mut Vec<ManagerError>, failure: ManagerError) {
        self.reporter.failure(&error_chain(&failure));
        failures.push(failure);
    }
}

/// Operation a manager was asked to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Dump,
    Ensure,
    Update,
}

impl std::fmt::Display for Action {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dump => fmt.write_str("dump"),
            Self::Ensure => fmt.write_str("ensure"),
            Self::Update => fmt.write_str("update"),
        }
    }
}

/// Manager error types.
#[derive(Debug, thiserror::Error)]
pub enum ManagerError {
    /// Symlink manager failed.
    #[error(transparent)]
    Symlink(#[from] SymlinkError),

    /// Named manager failed to perform action.
    #[error("{action} failed for manager {name:?}")]
    Failed {
        #[source]
        source: Box<ManagerError>,
        name: String,
        action: Action,
    },

    /// Dump output of named manager could not be saved.
    #[error("failed to save dump of manager {name:?}")]
    Save {
        #[source]
        source: StoreError,
        name: String,
    },

    /// Several independent operations failed.
    #[error("{} operation(s) failed:\n{}", failures.len(), render_failures(failures))]
    Batch { failures: Vec<ManagerError> },
}

impl ManagerError {
    fn failed(name: &str, action: Action, source: ManagerError) -> Self {
        Self::Failed {
            source: Box::new(source),
            name: name.into(),
            action,
        }
    }

    /// Turn collected failures into a result.
    ///
    /// No failures means success.
    pub fn batch(failures: Vec<ManagerError>) -> Result<()> {
        if failures.is_empty() {
            Ok(())
        } else {
            Err(Self::Batch { failures })
        }
    }
}

fn render_failures(failures: &[ManagerError]) -> String {
    failures
        .iter()
        .map(|failure| format!("  - {}", error_chain(failure)))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Friendly result alias :3
pub type Result<T, E = ManagerError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        fs::{Filesystem, MemoryFs},
        report::{QuietReporter, RecordingReporter},
    };
    use pretty_assertions::assert_eq;
    use std::{
        path::Path,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
    };

    #[derive(Default)]
    struct FakeManager {
        name: &'static str,
        fail: bool,
        calls: Arc<AtomicUsize>,
    }

    impl FakeManager {
        fn outcome(&self) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ManagerError::Symlink(SymlinkError::NotTracked {
                    link: format!("~/{}", self.name),
                }));
            }

            Ok(())
        }
    }

    impl Manager for FakeManager {
        fn name(&self) -> &str {
            self.name
        }

        fn dump(&self) -> Result<String> {
            self.outcome()?;
            Ok(format!("name = {:?}\n", self.name))
        }

        fn ensure(&self) -> Result<()> {
            self.outcome()
        }

        fn update(&self) -> Result<()> {
            self.outcome()
        }
    }

    fn root(fs: Arc<MemoryFs>) -> RootManager {
        let context = Context::new("/home", "/home/.dotfiles", "/home/.config/dotlink", "/home");
        RootManager::new(context, TomlStore::new(fs), Arc::new(QuietReporter))
    }

    #[test]
    fn config_file_is_named_after_manager() {
        let root = root(Arc::new(MemoryFs::new()));
        assert_eq!(
            root.config_file("symlink"),
            PathBuf::from("/home/.config/dotlink/symlink.toml")
        );
    }

    #[test]
    fn ensure_runs_every_manager_despite_failures() {
        let calls = Arc::new(AtomicUsize::new(0));
        let root = root(Arc::new(MemoryFs::new()))
            .with_manager(FakeManager {
                name: "first",
                fail: true,
                calls: calls.clone(),
            })
            .with_manager(FakeManager {
                name: "second",
                fail: false,
                calls: calls.clone(),
            })
            .with_manager(FakeManager {
                name: "third",
                fail: true,
                calls: calls.clone(),
            });

        let result = root.ensure();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        match result {
            Err(ManagerError::Batch { failures }) => {
                assert_eq!(failures.len(), 2);
                let message = ManagerError::Batch { failures }.to_string();
                assert!(message.contains("ensure failed for manager \"first\""));
                assert!(message.contains("ensure failed for manager \"third\""));
                assert!(message.contains("~/third"));
            }
            other => panic!("expected batch failure, got {other:?}"),
        }
    }

    #[test]
    fn update_succeeds_when_nothing_fails() {
        let root = root(Arc::new(MemoryFs::new())).with_manager(FakeManager {
            name: "only",
            ..Default::default()
        });

        assert!(root.update().is_ok());
        assert_eq!(root.names().collect::<Vec<_>>(), vec!["only"]);
    }

    #[test]
    fn dump_saves_output_of_each_manager() -> anyhow::Result<()> {
        let fs = Arc::new(MemoryFs::new());
        let root = root(fs.clone())
            .with_manager(FakeManager {
                name: "good",
                ..Default::default()
            })
            .with_manager(FakeManager {
                name: "bad",
                fail: true,
                ..Default::default()
            });

        let result = root.dump();
        assert!(matches!(result, Err(ManagerError::Batch { ref failures }) if failures.len() == 1));

        let saved = fs.read_to_string(Path::new("/home/.config/dotlink/good.toml"))?;
        assert_eq!(saved, "name = \"good\"\n");
        assert!(fs
            .read_to_string(Path::new("/home/.config/dotlink/bad.toml"))
            .is_err());

        Ok(())
    }

    #[test]
    fn every_failure_is_reported() -> anyhow::Result<()> {
        let fs = Arc::new(MemoryFs::new());
        let reporter = Arc::new(RecordingReporter::default());
        let context = Context::new("/home", "/home/.dotfiles", "/home/.config/dotlink", "/home");
        let root = RootManager::new(context, TomlStore::new(fs.clone()), reporter.clone())
            .with_manager(FakeManager {
                name: "first",
                fail: true,
                ..Default::default()
            })
            .with_manager(FakeManager {
                name: "second",
                ..Default::default()
            })
            .with_manager(FakeManager {
                name: "third",
                fail: true,
                ..Default::default()
            });

        assert!(root.ensure().is_err());
        assert!(root.update().is_err());
        let failures = reporter.failures();
        assert_eq!(failures.len(), 4);
        assert!(failures[0].starts_with("ensure failed for manager \"first\""));
        assert!(failures[0].contains("~/first"));
        assert!(failures[1].starts_with("ensure failed for manager \"third\""));
        assert!(failures[3].starts_with("update failed for manager \"third\""));

        // INVARIANT: A save failure is reported just like a dump failure.
        fs.mkdir_all(Path::new("/home"))?;
        fs.write(Path::new("/home/.config"), b"not a directory")?;
        assert!(root.dump().is_err());
        let failures = reporter.failures();
        assert_eq!(failures.len(), 7);
        assert!(failures[4].starts_with("dump failed for manager \"first\""));
        assert!(failures[5].contains("\"second\""));

        Ok(())
    }
}
