// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Bookmark collections.
//!
//! A __bookmark__ is a URL paired with a set of tags and an optional display
//! name. Bookmarks are identified by their URL alone, so two bookmarks with
//! the same URL but different tags are considered duplicates of each other.
//!
//! # Plain Text Layout
//!
//! The `.bookmarks` format keeps one bookmark per line:
//!
//! ```text
//! https://example.org/post : rust : parsing
//! ```
//!
//! Fields are separated by `" : "`. The first field is the URL, every other
//! field holds one or more tags. Tag fields may also pack several tags
//! separated by commas, so `url : rust,parsing` reads the same as the line
//! above. Output always uses one tag per field, sorted.
//!
//! # See Also
//!
//! 1. [`netscape`] for browser exported HTML bookmarks.
//! 2. [`trie`] for query parameter review.

pub mod netscape;
pub mod trie;

use crate::tags::{norm_tag, SubstitutionFile, SEP};

use indexmap::IndexMap;
use std::{
    cmp::Ordering,
    collections::BTreeSet,
    fmt::{Display, Formatter, Result as FmtResult},
    fs::{read_to_string, write},
    hash::{Hash, Hasher},
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::{debug, instrument, warn};

/// Name given to bookmarks that do not carry one.
pub const DEFAULT_NAME: &str = "No Name";

/// A single bookmark.
///
/// Equality, ordering, and hashing only consider the URL.
#[derive(Debug, Clone)]
pub struct Bookmark {
    pub url: String,
    pub tags: BTreeSet<String>,
    pub name: String,
}

impl Bookmark {
    /// Construct new bookmark, normalizing its tags.
    pub fn new<'a>(
        url: impl Into<String>,
        tags: impl IntoIterator<Item = &'a str>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            tags: normalize_tags(tags),
            name: name.into(),
        }
    }

    /// Union tags of another bookmark with the same URL into this one.
    ///
    /// # Errors
    ///
    /// - Return [`BookmarkError::UrlMismatch`] if URLs differ.
    pub fn merge(&mut self, other: &Bookmark) -> Result<()> {
        if self.url != other.url {
            return Err(BookmarkError::UrlMismatch {
                left: self.url.clone(),
                right: other.url.clone(),
            });
        }

        self.tags.extend(other.tags.iter().cloned());
        Ok(())
    }

    /// Run tag substitutions on every tag.
    pub fn clean(&mut self, subs: &SubstitutionFile) {
        self.tags = self.tags.iter().flat_map(|tag| subs.sub(tag)).collect();
    }
}

fn normalize_tags<'a>(tags: impl IntoIterator<Item = &'a str>) -> BTreeSet<String> {
    tags.into_iter()
        .map(norm_tag)
        .filter(|tag| !tag.is_empty())
        .collect()
}

impl PartialEq for Bookmark {
    fn eq(&self, other: &Self) -> bool {
        self.url == other.url
    }
}

impl Eq for Bookmark {}

impl PartialOrd for Bookmark {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Bookmark {
    fn cmp(&self, other: &Self) -> Ordering {
        self.url.cmp(&other.url)
    }
}

impl Hash for Bookmark {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.url.hash(state);
    }
}

impl FromStr for Bookmark {
    type Err = BookmarkError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut fields = line.trim().split(SEP).map(str::trim);
        let url = match fields.next() {
            Some(url) if !url.is_empty() => url,
            _ => return Err(BookmarkError::EmptyLine),
        };

        let tags = normalize_tags(fields.flat_map(|field| field.split(',')));
        if tags.is_empty() {
            warn!("no tags for: {url}");
        }

        Ok(Self {
            url: url.to_string(),
            tags,
            name: DEFAULT_NAME.into(),
        })
    }
}

impl Display for Bookmark {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(self.url.as_str())?;
        for tag in &self.tags {
            write!(fmt, "{SEP}{tag}")?;
        }

        Ok(())
    }
}

/// Ordered collection of bookmarks.
///
/// Keeps insertion order of reads. Output through [`Display`] is sorted by
/// URL.
#[derive(Debug, Default, Clone)]
pub struct BookmarkCollection {
    entries: Vec<Bookmark>,
}

impl BookmarkCollection {
    /// Construct new empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read `.bookmarks` file.
    ///
    /// # Errors
    ///
    /// - Return [`BookmarkError::Read`] if file cannot be read.
    #[instrument(skip(path), level = "debug")]
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        debug!("read bookmarks: {:?}", path.as_ref().display());
        let content = read_to_string(path.as_ref()).map_err(|err| BookmarkError::Read {
            source: err,
            path: path.as_ref().to_path_buf(),
        })?;

        content.parse()
    }

    /// Write collection as `.bookmarks` file.
    ///
    /// # Errors
    ///
    /// - Return [`BookmarkError::Write`] if file cannot be written.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        write(path.as_ref(), self.to_string()).map_err(|err| BookmarkError::Write {
            source: err,
            path: path.as_ref().to_path_buf(),
        })
    }

    /// Add a bookmark.
    pub fn push(&mut self, bookmark: Bookmark) {
        self.entries.push(bookmark);
    }

    /// Check if a bookmark with the same URL is present.
    pub fn contains(&self, bookmark: &Bookmark) -> bool {
        self.entries.contains(bookmark)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Bookmark> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Bookmarks of `other` whose URL is not in this collection.
    pub fn difference(&self, other: &BookmarkCollection) -> BookmarkCollection {
        other
            .iter()
            .filter(|bookmark| !self.contains(bookmark))
            .cloned()
            .collect()
    }

    /// Collapse entries sharing a URL, unioning their tags.
    ///
    /// The first entry seen for a URL keeps its position and name.
    pub fn merge_duplicates(&mut self) {
        let mut deduplicated: IndexMap<String, Bookmark> = IndexMap::new();
        for bookmark in self.entries.drain(..) {
            match deduplicated.get_mut(&bookmark.url) {
                Some(existing) => existing.tags.extend(bookmark.tags),
                None => {
                    deduplicated.insert(bookmark.url.clone(), bookmark);
                }
            }
        }

        self.entries = deduplicated.into_values().collect();
    }

    /// Run tag substitutions on every bookmark.
    pub fn clean(&mut self, subs: &SubstitutionFile) {
        for bookmark in self.entries.iter_mut() {
            bookmark.clean(subs);
        }
    }
}

impl FromStr for BookmarkCollection {
    type Err = BookmarkError;

    fn from_str(content: &str) -> Result<Self, Self::Err> {
        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(str::parse::<Bookmark>)
            .collect()
    }
}

impl Display for BookmarkCollection {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        let mut sorted = self.entries.iter().collect::<Vec<_>>();
        sorted.sort();
        let lines = sorted.iter().map(ToString::to_string).collect::<Vec<_>>();
        fmt.write_str(lines.join("\n").as_str())
    }
}

impl FromIterator<Bookmark> for BookmarkCollection {
    fn from_iter<I: IntoIterator<Item = Bookmark>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl Extend<Bookmark> for BookmarkCollection {
    fn extend<I: IntoIterator<Item = Bookmark>>(&mut self, iter: I) {
        self.entries.extend(iter);
    }
}

impl IntoIterator for BookmarkCollection {
    type Item = Bookmark;
    type IntoIter = std::vec::IntoIter<Bookmark>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Bookmark error types.
#[derive(Debug, thiserror::Error)]
pub enum BookmarkError {
    /// Bookmark file cannot be read.
    #[error("failed to read bookmarks at {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Bookmark file cannot be written.
    #[error("failed to write bookmarks to {:?}", path.display())]
    Write {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Line does not hold a URL.
    #[error("bad line passed to bookmark parser")]
    EmptyLine,

    /// Merging bookmarks of different URLs.
    #[error("cannot merge bookmark {left:?} with {right:?}")]
    UrlMismatch { left: String, right: String },

    /// Bookmark URL cannot be parsed.
    #[error("invalid bookmark url {url:?}")]
    InvalidUrl {
        #[source]
        source: url::ParseError,
        url: String,
    },
}

/// Friendly result alias :3
pub type Result<T, E = BookmarkError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeSet;

    fn pairs(collection: &BookmarkCollection) -> BTreeSet<(String, BTreeSet<String>)> {
        collection
            .iter()
            .map(|bookmark| (bookmark.url.clone(), bookmark.tags.clone()))
            .collect()
    }

    #[test]
    fn parse_bookmark_line() -> anyhow::Result<()> {
        let result: Bookmark = "https://example.org : rust : machine learning".parse()?;
        assert_eq!(result.url, "https://example.org");
        assert_eq!(
            result.tags,
            BTreeSet::from(["machine_learning".to_string(), "rust".to_string()])
        );

        let result: Bookmark = "https://example.org : rust,parsing , graphs".parse()?;
        assert_eq!(
            result.tags,
            BTreeSet::from(["graphs".into(), "parsing".into(), "rust".into()])
        );

        let result: Bookmark = "https://example.org".parse()?;
        assert!(result.tags.is_empty());

        assert!(matches!("   ".parse::<Bookmark>(), Err(BookmarkError::EmptyLine)));

        Ok(())
    }

    #[test]
    fn collection_round_trip() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("test.bookmarks");
        let collection: BookmarkCollection = indoc! {r#"
            https://b.org : zeta : alpha
            https://a.org : rust,graphs

            https://c.org
        "#}
        .parse()?;

        collection.write(&path)?;
        let expect = indoc! {r#"
            https://a.org : graphs : rust
            https://b.org : alpha : zeta
            https://c.org"#};
        assert_eq!(read_to_string(&path)?, expect);

        let reread = BookmarkCollection::read(&path)?;
        assert_eq!(pairs(&reread), pairs(&collection));

        Ok(())
    }

    #[test]
    fn merge_duplicates_unions_tags() -> anyhow::Result<()> {
        let mut collection: BookmarkCollection = indoc! {r#"
            https://a.org : rust
            https://b.org : other
            https://a.org : graphs
        "#}
        .parse()?;

        collection.merge_duplicates();
        assert_eq!(collection.len(), 2);

        let first = collection.iter().next().unwrap();
        assert_eq!(first.url, "https://a.org");
        assert_eq!(first.tags, BTreeSet::from(["graphs".into(), "rust".into()]));

        Ok(())
    }

    #[test]
    fn merge_rejects_different_urls() {
        let mut left = Bookmark::new("https://a.org", ["x"], DEFAULT_NAME);
        let right = Bookmark::new("https://b.org", ["y"], DEFAULT_NAME);
        assert!(matches!(left.merge(&right), Err(BookmarkError::UrlMismatch { .. })));

        let right = Bookmark::new("https://a.org", ["y"], DEFAULT_NAME);
        assert!(left.merge(&right).is_ok());
        assert_eq!(left.tags, BTreeSet::from(["x".into(), "y".into()]));
    }

    #[test]
    fn difference_keeps_only_new_urls() -> anyhow::Result<()> {
        let old: BookmarkCollection = "https://a.org : x\nhttps://b.org : y".parse()?;
        let new: BookmarkCollection = "https://b.org : z\nhttps://c.org : w".parse()?;
        let result = old.difference(&new);
        let urls = result.iter().map(|b| b.url.as_str()).collect::<Vec<_>>();
        assert_eq!(urls, vec!["https://c.org"]);

        Ok(())
    }

    #[test]
    fn clean_applies_substitutions() -> anyhow::Result<()> {
        let subs = SubstitutionFile::from("ml : 1 : machine_learning");
        let mut collection: BookmarkCollection = "https://a.org : ml : rust".parse()?;
        collection.clean(&subs);
        assert_eq!(collection.to_string(), "https://a.org : machine_learning : rust");

        Ok(())
    }
}
