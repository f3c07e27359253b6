// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout for configuration files that dotlink uses to simplify
//! the process of serialization and deserialization. File I/O is left to the
//! caller to figure out, see [`store`](crate::store).

use crate::link::Symlink;

use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    path::PathBuf,
    str::FromStr,
};

/// Tool settings layout.
///
/// Lives at `<config_root>/config.toml`. Every field is optional, missing
/// fields fall back to their defaults.
///
/// # General Layout
///
/// ```toml
/// dotfiles = "~/.dotfiles"
///
/// [dump]
/// directories = ["~"]
/// depth = 2
/// ```
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Canonical location of dotfiles.
    pub dotfiles: PathBuf,

    /// Where to look for existing symlinks when dumping.
    pub dump: DumpSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            dotfiles: PathBuf::from("~/.dotfiles"),
            dump: DumpSettings::default(),
        }
    }
}

impl Settings {
    /// Perform shell expansion on every path-like field.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::ShellExpansion`] if a variable cannot be
    ///   looked up.
    pub fn expanded(mut self) -> Result<Self> {
        self.dotfiles = PathBuf::from(shell_expand(&self.dotfiles.to_string_lossy())?);
        self.dump.directories = self
            .dump
            .directories
            .iter()
            .map(|directory| shell_expand(directory))
            .collect::<Result<Vec<_>>>()?;

        Ok(self)
    }
}

impl FromStr for Settings {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let settings: Settings = toml::de::from_str(data).map_err(ConfigError::Deserialize)?;

        // INVARIANT: Perform shell expansion on path fields.
        settings.expanded()
    }
}

/// Symlink discovery settings.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DumpSettings {
    /// Directories to search for symlinks.
    pub directories: Vec<String>,

    /// Number of directory levels to descend below each search directory.
    pub depth: usize,
}

impl Default for DumpSettings {
    fn default() -> Self {
        Self {
            directories: vec!["~".into()],
            depth: 2,
        }
    }
}

/// Persisted symlink set layout.
///
/// The desired state of all managed symlinks. Records are kept in the order
/// they were added, in home-relative form.
///
/// # Invariant
///
/// - No two records share the same target and link.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct SymlinkSet {
    #[serde(rename = "Symlinks", default)]
    symlinks: Vec<Symlink>,
}

impl SymlinkSet {
    /// Construct new empty symlink set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if exact record is already in set.
    pub fn contains(&self, symlink: &Symlink) -> bool {
        self.symlinks.iter().any(|existing| existing == symlink)
    }

    /// Append record unless it is already present.
    ///
    /// Returns `true` if record was appended.
    pub fn insert(&mut self, symlink: Symlink) -> bool {
        if self.contains(&symlink) {
            return false;
        }

        self.symlinks.push(symlink);
        true
    }

    /// Remove record from set.
    ///
    /// Returns `true` if anything was removed.
    pub fn remove(&mut self, symlink: &Symlink) -> bool {
        let before = self.symlinks.len();
        self.symlinks.retain(|existing| existing != symlink);
        before != self.symlinks.len()
    }

    /// Find record by its link.
    ///
    /// Scans the whole set, so the last match wins.
    pub fn find_by_link(&self, link: impl AsRef<str>) -> Option<&Symlink> {
        self.symlinks
            .iter()
            .filter(|symlink| symlink.link == link.as_ref())
            .last()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Symlink> {
        self.symlinks.iter()
    }

    pub fn len(&self) -> usize {
        self.symlinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symlinks.is_empty()
    }
}

impl FromIterator<Symlink> for SymlinkSet {
    fn from_iter<I: IntoIterator<Item = Symlink>>(iter: I) -> Self {
        let mut set = Self::new();
        for symlink in iter {
            set.insert(symlink);
        }

        set
    }
}

impl IntoIterator for SymlinkSet {
    type Item = Symlink;
    type IntoIter = std::vec::IntoIter<Symlink>;

    fn into_iter(self) -> Self::IntoIter {
        self.symlinks.into_iter()
    }
}

impl FromStr for SymlinkSet {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        toml::de::from_str(data).map_err(ConfigError::Deserialize)
    }
}

impl Display for SymlinkSet {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

fn shell_expand(input: &str) -> Result<String> {
    Ok(shellexpand::full(input)
        .map_err(ConfigError::ShellExpansion)?
        .into_owned())
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize configuration.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Failed to perform shell expansion on configuration.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;

    #[sealed_test(env = [("DOTS", "/home/blah/dots")])]
    fn deserialize_settings() -> anyhow::Result<()> {
        let result: Settings = indoc! {r#"
            dotfiles = "$DOTS"

            [dump]
            directories = ["$DOTS/config", "/etc"]
            depth = 4
        "#}
        .parse()?;

        let expect = Settings {
            dotfiles: PathBuf::from("/home/blah/dots"),
            dump: DumpSettings {
                directories: vec!["/home/blah/dots/config".into(), "/etc".into()],
                depth: 4,
            },
        };
        assert_eq!(result, expect);

        Ok(())
    }

    #[sealed_test(env = [("HOME", "/home/blah")])]
    fn deserialize_settings_falls_back_to_defaults() -> anyhow::Result<()> {
        let result: Settings = "".parse()?;
        let expect = Settings {
            dotfiles: PathBuf::from("/home/blah/.dotfiles"),
            dump: DumpSettings {
                directories: vec!["/home/blah".into()],
                depth: 2,
            },
        };
        assert_eq!(result, expect);

        Ok(())
    }

    #[test]
    fn deserialize_symlink_set() -> anyhow::Result<()> {
        let result: SymlinkSet = indoc! {r#"
            [[Symlinks]]
            Target = "~/.dotfiles/vimrc"
            Link = "~/.vimrc"

            [[Symlinks]]
            Target = "~/.dotfiles/config/nvim"
            Link = "~/.config/nvim"
        "#}
        .parse()?;

        let expect: SymlinkSet = [
            Symlink::new("~/.dotfiles/vimrc", "~/.vimrc"),
            Symlink::new("~/.dotfiles/config/nvim", "~/.config/nvim"),
        ]
        .into_iter()
        .collect();
        assert_eq!(result, expect);

        Ok(())
    }

    #[test]
    fn serialize_symlink_set_survives_parsing() -> anyhow::Result<()> {
        let expect: SymlinkSet = [Symlink::new("~/.dotfiles/vimrc", "~/.vimrc")]
            .into_iter()
            .collect();
        let data = expect.to_string();
        assert!(data.contains("[[Symlinks]]"));
        assert!(data.contains(r#"Target = "~/.dotfiles/vimrc""#));
        assert!(data.contains(r#"Link = "~/.vimrc""#));

        let result: SymlinkSet = data.parse()?;
        assert_eq!(result, expect);

        Ok(())
    }

    #[test]
    fn symlink_set_insert_deduplicates() {
        let mut set = SymlinkSet::new();
        assert!(set.insert(Symlink::new("~/.dotfiles/vimrc", "~/.vimrc")));
        assert!(!set.insert(Symlink::new("~/.dotfiles/vimrc", "~/.vimrc")));
        assert!(set.insert(Symlink::new("~/.dotfiles/vimrc", "~/.vim/vimrc")));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn symlink_set_find_by_link_prefers_last_match() -> anyhow::Result<()> {
        let set: SymlinkSet = indoc! {r#"
            [[Symlinks]]
            Target = "~/old/vimrc"
            Link = "~/.vimrc"

            [[Symlinks]]
            Target = "~/.dotfiles/vimrc"
            Link = "~/.vimrc"
        "#}
        .parse()?;

        let result = set.find_by_link("~/.vimrc").cloned();
        assert_eq!(result, Some(Symlink::new("~/.dotfiles/vimrc", "~/.vimrc")));
        assert_eq!(set.find_by_link("~/.bashrc"), None);

        Ok(())
    }

    #[test]
    fn symlink_set_remove() {
        let mut set: SymlinkSet = [
            Symlink::new("~/.dotfiles/vimrc", "~/.vimrc"),
            Symlink::new("~/.dotfiles/bashrc", "~/.bashrc"),
        ]
        .into_iter()
        .collect();

        assert!(set.remove(&Symlink::new("~/.dotfiles/vimrc", "~/.vimrc")));
        assert!(!set.remove(&Symlink::new("~/.dotfiles/vimrc", "~/.vimrc")));
        assert_eq!(
            set.iter().cloned().collect::<Vec<_>>(),
            vec![Symlink::new("~/.dotfiles/bashrc", "~/.bashrc")]
        );
    }
}
