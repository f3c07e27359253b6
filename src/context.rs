// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Process-scoped configuration context.
//!
//! The context bundles every location the link engine needs to know about.
//! It is assembled once at startup and handed to each component by value, so
//! nothing ever consults global state in the middle of an operation.

use crate::path::{absolutize, expand_home, HOME_PLACEHOLDER};

use std::path::{Path, PathBuf};

/// Read-only locations shared by all operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Context {
    user_home: PathBuf,
    dotfiles_root: PathBuf,
    config_root: PathBuf,
    working_dir: PathBuf,
}

impl Context {
    /// Construct new context.
    ///
    /// All paths are expected to be absolute.
    pub fn new(
        user_home: impl Into<PathBuf>,
        dotfiles_root: impl Into<PathBuf>,
        config_root: impl Into<PathBuf>,
        working_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            user_home: user_home.into(),
            dotfiles_root: dotfiles_root.into(),
            config_root: config_root.into(),
            working_dir: working_dir.into(),
        }
    }

    /// Absolute path to user's home directory.
    pub fn user_home(&self) -> &Path {
        &self.user_home
    }

    /// Absolute path to canonical dotfile storage.
    pub fn dotfiles_root(&self) -> &Path {
        &self.dotfiles_root
    }

    /// Path to record file of named manager.
    pub fn config_file(&self, name: &str) -> PathBuf {
        self.config_root.join(format!("{name}.toml"))
    }

    /// Directory that relative user input is resolved against.
    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Home directory as text for home-relative substitution.
    pub fn home_str(&self) -> String {
        self.user_home.to_string_lossy().into_owned()
    }

    /// Turn user supplied path into an absolute path.
    ///
    /// A bare `~` or a leading `~/` is swapped for the home directory, so
    /// `~name` stays a relative path. Anything still
    /// relative afterwards is resolved against the working directory. Does
    /// not check for existence.
    pub fn absolute(&self, input: impl AsRef<str>) -> PathBuf {
        let input = input.as_ref();
        if Path::new(input).starts_with(HOME_PLACEHOLDER) {
            absolutize(&self.working_dir, expand_home(input, &self.home_str()))
        } else {
            absolutize(&self.working_dir, input)
        }
    }
}
