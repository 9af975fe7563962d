// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Library integration.
//!
//! Rendered threads are named `{user}_thread_{n}.org` and keep their media
//! under `{user}_files/` next to them. A library is a directory tree of such
//! files, bucketed into `group_{letter}` directories by the first letter of
//! the user name. Integration moves freshly rendered threads into that
//! tree. A thread whose file name already exists somewhere in the library
//! is appended to the existing file instead.

use crate::path::find_files;

use indexmap::IndexMap;
use regex::Regex;
use std::{
    fs::{copy, create_dir_all, read_dir, read_to_string, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
    sync::LazyLock,
};
use tracing::{debug, info, instrument};

static THREAD_STEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+?)_thread_\d+$").unwrap());

/// Outcome of [`integrate`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IntegrateReport {
    /// Files appended to an existing library file.
    pub integrated: usize,

    /// Files added to the library as new files.
    pub new: usize,
}

/// Merge org files from `sources` into the first of `libraries`.
///
/// Sources may be files or directories. All `libraries` are searched for
/// existing files of the same name, skipping anything under `excludes`.
/// New files land in `group_{letter}` below the first library, or directly
/// in it with `groupless` set.
///
/// # Errors
///
/// - Return [`LibraryError::NoLibrary`] if `libraries` is empty.
/// - Return [`LibraryError`] if any file cannot be read or written.
#[instrument(skip_all, level = "debug")]
pub fn integrate(
    sources: &[PathBuf],
    libraries: &[PathBuf],
    excludes: &[PathBuf],
    groupless: bool,
) -> Result<IntegrateReport> {
    let Some(target_lib) = libraries.first() else {
        return Err(LibraryError::NoLibrary);
    };

    let mut existing = IndexMap::new();
    for library in libraries {
        for file in walk(library, excludes)? {
            if let Some(name) = file.file_name() {
                existing
                    .entry(name.to_string_lossy().into_owned())
                    .or_insert(file);
            }
        }
    }
    debug!("{} org files already in library", existing.len());

    let mut new_files = Vec::new();
    for source in sources {
        new_files.extend(walk(source, excludes)?);
    }
    info!("integrating {} org files", new_files.len());

    let mut report = IntegrateReport::default();
    for file in new_files {
        let name = file
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        let target = match existing.get(&name) {
            Some(target) => {
                debug!("append {} to {}", file.display(), target.display());
                let content = read_file(&file)?;
                append_file(target, &format!("\n{content}"))?;
                report.integrated += 1;
                target.clone()
            }
            None => {
                let dir = if groupless {
                    target_lib.clone()
                } else {
                    target_lib.join(group_name(&name))
                };
                create_dir(&dir)?;
                let target = dir.join(&name);
                debug!("copy {} to {}", file.display(), target.display());
                copy_file(&file, &target)?;
                existing.insert(name, target.clone());
                report.new += 1;
                target
            }
        };

        copy_media(&file, &target)?;
    }

    info!("{} files appended, {} files added", report.integrated, report.new);

    Ok(report)
}

/// Name of the user a thread file belongs to.
///
/// This is the part of the file stem before `_thread_{n}`, or the whole
/// stem for files not named like rendered threads.
pub fn thread_user(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();

    match THREAD_STEM.captures(&stem).and_then(|caps| caps.get(1)) {
        Some(user) => user.as_str().to_string(),
        None => stem,
    }
}

/// Group directory for a file name, `group_{letter}` or `group_symbols`.
pub fn group_name(name: &str) -> String {
    match name.chars().next().map(|letter| letter.to_ascii_lowercase()) {
        Some(letter @ 'a'..='z') => format!("group_{letter}"),
        _ => "group_symbols".into(),
    }
}

fn media_dir(org_file: &Path) -> PathBuf {
    let dir = org_file.parent().unwrap_or_else(|| Path::new(""));
    dir.join(format!("{}_files", thread_user(org_file)))
}

fn copy_media(source: &Path, target: &Path) -> Result<()> {
    let from = media_dir(source);
    if !from.is_dir() {
        return Ok(());
    }

    let to = media_dir(target);
    if from == to {
        return Ok(());
    }
    create_dir(&to)?;

    let entries = read_dir(&from).map_err(|err| LibraryError::Read {
        source: err,
        path: from.clone(),
    })?;
    for entry in entries {
        let entry = entry.map_err(|err| LibraryError::Read {
            source: err,
            path: from.clone(),
        })?;
        let path = entry.path();
        let dest = to.join(entry.file_name());
        if path.is_file() && !dest.exists() {
            copy_file(&path, &dest)?;
        }
    }

    Ok(())
}

fn walk(root: &Path, excludes: &[PathBuf]) -> Result<Vec<PathBuf>> {
    find_files(root, "org", excludes).map_err(|err| LibraryError::Walk {
        source: err,
        path: root.to_path_buf(),
    })
}

fn read_file(path: &Path) -> Result<String> {
    read_to_string(path).map_err(|err| LibraryError::Read {
        source: err,
        path: path.to_path_buf(),
    })
}

fn append_file(path: &Path, content: &str) -> Result<()> {
    OpenOptions::new()
        .append(true)
        .open(path)
        .and_then(|mut file| file.write_all(content.as_bytes()))
        .map_err(|err| LibraryError::Write {
            source: err,
            path: path.to_path_buf(),
        })
}

fn copy_file(from: &Path, to: &Path) -> Result<()> {
    copy(from, to).map(drop).map_err(|err| LibraryError::Write {
        source: err,
        path: to.to_path_buf(),
    })
}

fn create_dir(path: &Path) -> Result<()> {
    create_dir_all(path).map_err(|err| LibraryError::Write {
        source: err,
        path: path.to_path_buf(),
    })
}

/// Library integration error types.
#[derive(Debug, thiserror::Error)]
pub enum LibraryError {
    /// No library directory configured.
    #[error("no library directory configured")]
    NoLibrary,

    /// File or directory cannot be read.
    #[error("failed to read {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Directory cannot be walked.
    #[error("failed to walk {:?}", path.display())]
    Walk {
        #[source]
        source: ignore::Error,
        path: PathBuf,
    },

    /// File or directory cannot be written.
    #[error("failed to write {:?}", path.display())]
    Write {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = LibraryError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use simple_test_case::test_case;
    use std::fs::write;

    #[test_case("alice_thread_0.org", "group_a"; "lowercase letter")]
    #[test_case("Bob_thread_3.org", "group_b"; "uppercase letter")]
    #[test_case("_under_thread_1.org", "group_symbols"; "underscore")]
    #[test_case("42_thread_0.org", "group_symbols"; "digit")]
    #[test]
    fn group_of_file(name: &str, expect: &str) {
        assert_eq!(group_name(name), expect);
    }

    #[test_case("orgs/alice_thread_12.org", "alice"; "rendered thread")]
    #[test_case("orgs/snake_case_user_thread_0.org", "snake_case_user"; "underscored user")]
    #[test_case("orgs/notes.org", "notes"; "plain file")]
    #[test]
    fn user_of_thread(path: &str, expect: &str) {
        assert_eq!(thread_user(Path::new(path)), expect);
    }

    #[test]
    fn new_and_existing_files() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let source = dir.path().join("orgs");
        let library = dir.path().join("library");
        create_dir_all(source.join("alice_files"))?;
        create_dir_all(library.join("group_a/alice_files"))?;

        write(source.join("alice_thread_0.org"), "* new alice\n")?;
        write(source.join("alice_files/pic.jpg"), "jpg")?;
        write(source.join("1337_thread_0.org"), "* leet\n")?;
        write(library.join("group_a/alice_thread_0.org"), "* old alice\n")?;
        write(library.join("group_a/alice_files/old.jpg"), "old")?;

        let report = integrate(&[source], &[library.clone()], &[], false)?;
        assert_eq!(report, IntegrateReport { integrated: 1, new: 1 });
        assert_eq!(
            read_to_string(library.join("group_a/alice_thread_0.org"))?,
            "* old alice\n\n* new alice\n"
        );
        assert!(library.join("group_a/alice_files/pic.jpg").exists());
        assert!(library.join("group_a/alice_files/old.jpg").exists());
        assert_eq!(
            read_to_string(library.join("group_symbols/1337_thread_0.org"))?,
            "* leet\n"
        );

        Ok(())
    }

    #[test]
    fn groupless_and_excluded() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let source = dir.path().join("orgs");
        let library = dir.path().join("library");
        let archive = library.join("archive");
        create_dir_all(source.join("bob_files"))?;
        create_dir_all(&archive)?;

        write(source.join("bob_thread_0.org"), "* bob\n")?;
        write(source.join("bob_files/clip.mp4"), "mp4")?;
        write(archive.join("bob_thread_0.org"), "* archived bob\n")?;

        let report = integrate(&[source], &[library.clone()], &[archive.clone()], true)?;
        assert_eq!(report, IntegrateReport { integrated: 0, new: 1 });
        assert_eq!(read_to_string(library.join("bob_thread_0.org"))?, "* bob\n");
        assert!(library.join("bob_files/clip.mp4").exists());
        assert_eq!(read_to_string(archive.join("bob_thread_0.org"))?, "* archived bob\n");

        Ok(())
    }

    #[test]
    fn no_library_is_an_error() {
        let result = integrate(&[], &[], &[], false);
        assert!(matches!(result, Err(LibraryError::NoLibrary)));
    }
}
