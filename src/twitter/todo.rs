// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Todo files and tweet id extraction.
//!
//! A __todo file__ lists tweets to archive, one per line, each followed by
//! the tags the archived thread should carry:
//!
//! ```text
//! https://twitter.com/alice/status/1234 : rust,parsing
//! ```
//!
//! The same tweet may be listed more than once, in which case its tags are
//! unioned.

use crate::{
    path::find_files,
    tags::{norm_tag, SEP},
};

use indexmap::{IndexMap, IndexSet};
use regex::Regex;
use std::{
    collections::BTreeSet,
    fs::read_to_string,
    path::{Path, PathBuf},
    sync::LazyLock,
};
use tracing::{debug, instrument, warn};

static STATUS_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"/status/(\d+)").unwrap());
static PERMALINK_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\[[^\[\]]*/status/(\d+)\]").unwrap());

/// Tweets to archive with their tags.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TodoFile {
    entries: IndexMap<String, BTreeSet<String>>,
}

impl TodoFile {
    /// Construct new empty todo file.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read todo file at target path.
    ///
    /// # Errors
    ///
    /// - Return [`TodoError::Read`] if file cannot be read.
    #[instrument(skip(path), level = "debug")]
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::from(read_file(path.as_ref())?.as_str()))
    }

    /// Tweet ids in order of first appearance.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Tags listed for a tweet.
    pub fn tags_for(&self, id: &str) -> Option<&BTreeSet<String>> {
        self.entries.get(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<&str> for TodoFile {
    /// Parse todo file content, skipping lines without a tweet id.
    fn from(content: &str) -> Self {
        let mut todo = Self::new();
        for line in content.lines().filter(|line| !line.trim().is_empty()) {
            let mut fields = line.split(SEP).map(str::trim);
            let url = fields.next().unwrap_or_default();
            let Some(id) = STATUS_ID.captures(url).and_then(|caps| caps.get(1)) else {
                warn!("no tweet id in todo line: {line}");
                continue;
            };

            let tags = fields
                .flat_map(|field| field.split(','))
                .map(norm_tag)
                .filter(|tag| !tag.is_empty());
            todo.entries
                .entry(id.as_str().to_string())
                .or_default()
                .extend(tags);
        }

        todo
    }
}

/// Extract tweet ids from a file.
///
/// Only org links whose target ends in `/status/ID`, as in
/// `[[https://twitter.com/alice/status/ID][/alice/ID]]`, count, unless
/// `simple` is set, in which case any `/status/ID` does.
///
/// # Errors
///
/// - Return [`TodoError::Read`] if file cannot be read.
pub fn extract_tweet_ids(path: impl AsRef<Path>, simple: bool) -> Result<IndexSet<String>> {
    let content = read_file(path.as_ref())?;
    let pattern = if simple { &*STATUS_ID } else { &*PERMALINK_ID };

    Ok(pattern
        .captures_iter(&content)
        .filter_map(|caps| caps.get(1))
        .map(|id| id.as_str().to_string())
        .collect())
}

/// Collect ids of tweets already archived in a library.
///
/// Plain files are read as one id per line. Directories are searched for org
/// files, whose permalinks provide the ids.
///
/// # Errors
///
/// - Return [`TodoError::Read`] if any file cannot be read.
/// - Return [`TodoError::Walk`] if any directory cannot be listed.
#[instrument(skip(paths), level = "debug")]
pub fn library_tweet_ids(paths: &[PathBuf]) -> Result<IndexSet<String>> {
    let mut ids = IndexSet::new();
    for path in paths {
        if path.is_dir() {
            let files = find_files(path, "org", &[]).map_err(|err| TodoError::Walk {
                source: err,
                path: path.clone(),
            })?;
            for file in files {
                ids.extend(extract_tweet_ids(&file, false)?);
            }
        } else {
            ids.extend(
                read_file(path)?
                    .lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty())
                    .map(str::to_string),
            );
        }
    }
    debug!("found {} archived tweet ids", ids.len());

    Ok(ids)
}

fn read_file(path: &Path) -> Result<String> {
    read_to_string(path).map_err(|err| TodoError::Read {
        source: err,
        path: path.to_path_buf(),
    })
}

/// Todo error types.
#[derive(Debug, thiserror::Error)]
pub enum TodoError {
    /// File cannot be read.
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
}

/// Friendly result alias :3
pub type Result<T, E = TodoError> = std::result::Result<T, E>;
