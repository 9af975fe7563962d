// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path resolution utilities.
//!
//! Determine where bkmkorg expects to find its configuration file, and
//! provide small helpers for naming files that must not clobber each other.

use ignore::WalkBuilder;
use std::path::{Path, PathBuf};

/// Determine default absolute path to configuration file.
///
/// Uses XDG Base Directory path `$XDG_CONFIG_HOME/bkmkorg/config.toml` as
/// the default. Does not check if the path returned actually exists.
///
/// # Errors
///
/// - Return [`NoWayHome`] if configuration directory cannot be determined.
///
/// # See Also
///
/// - [XDG Base Directory](https://wiki.archlinux.org/title/XDG_Base_Directory)
pub fn default_config_path() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|path| path.join("bkmkorg").join("config.toml"))
        .ok_or(NoWayHome)
}

/// Find first free path of the form `{dir}/{stem}_{n}.{ext}`.
///
/// Counting starts at zero, and stops at the first candidate that does not
/// exist on disk.
pub fn first_free_path(dir: impl AsRef<Path>, stem: &str, ext: &str) -> PathBuf {
    let mut count = 0usize;
    loop {
        let candidate = dir.as_ref().join(format!("{stem}_{count}.{ext}"));
        if !candidate.exists() {
            return candidate;
        }
        count += 1;
    }
}

/// Walk directory tree, collecting files with extension `ext`.
///
/// Paths listed in `excludes` are skipped, along with everything below them.
/// Entries of each directory are visited in file name order. Symbolic links
/// to directories are never descended into, so link cycles are harmless. A
/// `root` that is a plain file is returned as is when its extension matches.
///
/// # Errors
///
/// - Return [`ignore::Error`] if any directory cannot be listed.
pub fn find_files(
    root: impl AsRef<Path>,
    ext: &str,
    excludes: &[PathBuf],
) -> std::result::Result<Vec<PathBuf>, ignore::Error> {
    let excludes = excludes.to_vec();
    let walker = WalkBuilder::new(root.as_ref())
        .standard_filters(false)
        .follow_links(false)
        .sort_by_file_name(|lhs, rhs| lhs.cmp(rhs))
        .filter_entry(move |entry| {
            !excludes
                .iter()
                .any(|exclude| entry.path().starts_with(exclude))
        })
        .build();

    let mut found = Vec::new();
    for entry in walker {
        let entry = entry?;
        let path = entry.path();
        if path.is_file() && path.extension().is_some_and(|candidate| candidate == ext) {
            found.push(entry.into_path());
        }
    }

    Ok(found)
}

/// No way to determine user's configuration directory.
///
/// # See Also
///
/// - [`dirs::config_dir`](https://docs.rs/dirs/latest/dirs/fn.config_dir.html)
#[derive(Clone, Debug, thiserror::Error)]
#[error("cannot determine absolute path to user's configuration directory")]
pub struct NoWayHome;

/// Friendly result alias :3
pub type Result<T, E = NoWayHome> = std::result::Result<T, E>;
