// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Symlink reconciliation engine for dotfiles.
//!
//! Dotfiles live in one canonical directory, the __dotfiles root__, and are
//! made visible to the programs that read them through symbolic links placed
//! under the user's home directory. Dotlink keeps a persisted record of every
//! such symlink, and keeps that record in step with what is actually on disk.
//!
//! # Records
//!
//! Each record pairs a target with a link:
//!
//! ```toml
//! [[Symlinks]]
//! Target = "~/.dotfiles/vimrc"
//! Link = "~/.vimrc"
//! ```
//!
//! Records are stored with the home directory replaced by `~`, so the same
//! record file works on any machine regardless of where home happens to be.
//!
//! # Layout
//!
//! - [`link`] derives, transforms, and converges individual symlinks.
//! - [`manager`] keeps the persisted symlink set in step with the filesystem,
//!   and runs batch operations across managers.
//! - [`discover`] surveys directory trees for existing symlinks.
//! - [`fs`] is the filesystem abstraction everything else goes through.

pub mod config;
pub mod context;
pub mod discover;
pub mod fs;
pub mod link;
pub mod manager;
pub mod path;
pub mod report;
pub mod store;
