// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! URL trie for bookmark curation.
//!
//! Bookmarks are inserted by the components of their URL: scheme, host, and
//! then each non-empty path segment. Bookmarks that end up at the same node
//! share a [`Leaf`], and inside a leaf bookmarks with the exact same full
//! URL are merged.
//!
//! While inserting, the trie keeps track of every query parameter it has
//! seen. This makes it easy to review which parameters are noise, e.g.,
//! tracking ids, and then strip them from every bookmark with
//! [`Trie::filter_queries`]. The trie is an aid for manual curation, not a
//! deduplication policy.

use crate::bookmark::{Bookmark, BookmarkCollection, BookmarkError, Result};

use indexmap::IndexMap;
use std::collections::BTreeSet;
use tracing::debug;
use url::{form_urlencoded, Url};

#[derive(Debug, Default)]
struct TrieNode {
    children: IndexMap<String, TrieNode>,
    leaf: Option<usize>,
}

/// Example usage of a query parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryUsage {
    /// First URL seen using the parameter.
    pub original: String,

    /// That URL with the parameter removed.
    pub filtered: String,

    /// Number of bookmarks using the parameter.
    pub count: usize,
}

/// Trie of bookmarks keyed by URL components.
#[derive(Debug, Default)]
pub struct Trie {
    root: TrieNode,
    leaves: Vec<Leaf>,
    query_keys: IndexMap<String, QueryUsage>,
}

impl Trie {
    /// Construct new empty trie.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a bookmark into the trie.
    ///
    /// # Errors
    ///
    /// - Return [`BookmarkError::InvalidUrl`] if bookmark URL cannot be parsed.
    pub fn insert(&mut self, bookmark: &Bookmark) -> Result<()> {
        let url = Url::parse(&bookmark.url).map_err(|err| BookmarkError::InvalidUrl {
            source: err,
            url: bookmark.url.clone(),
        })?;

        let mut current = &mut self.root;
        for segment in trie_path(&url) {
            current = current.children.entry(segment).or_default();
        }

        let leaf_index = match current.leaf {
            Some(index) => index,
            None => {
                self.leaves.push(Leaf::default());
                let index = self.leaves.len() - 1;
                current.leaf = Some(index);
                index
            }
        };

        let leaf = &mut self.leaves[leaf_index];
        let component = leaf.insert(bookmark);

        let mut seen = BTreeSet::new();
        for param in &component.query {
            if !seen.insert(param.key.as_str()) {
                continue;
            }

            let usage = self
                .query_keys
                .entry(param.key.clone())
                .or_insert_with(|| QueryUsage {
                    original: bookmark.url.clone(),
                    filtered: component.reconstruct(Some(param.key.as_str())),
                    count: 0,
                });
            usage.count += 1;
        }

        Ok(())
    }

    /// Remove query parameters from every bookmark in the trie.
    pub fn filter_queries(&mut self, keys: &BTreeSet<String>) {
        for leaf in self.leaves.iter_mut() {
            leaf.filter_queries(keys);
        }
    }

    /// Reconstruct bookmarks from the trie, with any filtering applied.
    ///
    /// URLs that lost no query parameter are returned exactly as inserted.
    /// Bookmarks whose URLs became identical through filtering are merged.
    pub fn bookmarks(&self) -> BookmarkCollection {
        let mut bookmarks: BookmarkCollection =
            self.leaves.iter().flat_map(Leaf::bookmarks).collect();
        bookmarks.merge_duplicates();
        bookmarks
    }

    /// Usage of each query parameter seen, in first-seen order.
    pub fn query_keys(&self) -> &IndexMap<String, QueryUsage> {
        &self.query_keys
    }

    /// Render query parameter usage as org entries.
    ///
    /// Each entry links to an original URL and to that URL minus the
    /// parameter, making it easy to check whether the parameter matters.
    pub fn org_format_queries(&self) -> String {
        self.query_keys
            .iter()
            .map(|(key, usage)| {
                format!(
                    "** ({}) {}\n  [[{}][original]]\n  [[{}][filtered]]",
                    usage.count, key, usage.original, usage.filtered
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Number of leaves in the trie.
    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }
}

impl FromIterator<Bookmark> for Trie {
    /// Build trie, skipping bookmarks whose URL cannot be parsed.
    fn from_iter<I: IntoIterator<Item = Bookmark>>(iter: I) -> Self {
        let mut trie = Trie::new();
        for bookmark in iter {
            if let Err(err) = trie.insert(&bookmark) {
                debug!("skip bookmark: {err}");
            }
        }
        trie
    }
}

fn trie_path(url: &Url) -> Vec<String> {
    let mut netloc = url.host_str().unwrap_or_default().to_string();
    if let Some(port) = url.port() {
        netloc.push_str(format!(":{port}").as_str());
    }

    let mut path = vec![url.scheme().to_string(), netloc];
    path.extend(url.path().split('/').map(str::to_string));
    path.retain(|segment| !segment.is_empty());

    path
}

/// Group of bookmarks sharing the same URL path.
#[derive(Debug, Default)]
pub struct Leaf {
    components: Vec<LeafComponent>,
}

impl Leaf {
    fn insert(&mut self, bookmark: &Bookmark) -> &LeafComponent {
        let position = self
            .components
            .iter()
            .position(|component| component.full_path == bookmark.url);

        match position {
            Some(index) => {
                debug!("merging tags of {}", bookmark.url);
                let existing = &mut self.components[index];
                existing.tags.extend(bookmark.tags.iter().cloned());
                &self.components[index]
            }
            None => {
                self.components.push(LeafComponent {
                    name: bookmark.name.clone(),
                    tags: bookmark.tags.clone(),
                    full_path: bookmark.url.clone(),
                    query: QueryParam::parse_all(&bookmark.url),
                    removed: BTreeSet::new(),
                });
                &self.components[self.components.len() - 1]
            }
        }
    }

    fn filter_queries(&mut self, keys: &BTreeSet<String>) {
        for component in self.components.iter_mut() {
            let present = component
                .query
                .iter()
                .filter(|param| keys.contains(&param.key))
                .map(|param| param.key.clone())
                .collect::<Vec<_>>();
            component.removed.extend(present);
        }
    }

    fn bookmarks(&self) -> Vec<Bookmark> {
        self.components
            .iter()
            .map(|component| Bookmark {
                url: component.reconstruct(None),
                tags: component.tags.clone(),
                name: component.name.clone(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

/// Single bookmark inside a leaf.
///
/// Equal to another component if and only if they share the same full URL.
#[derive(Debug, Clone)]
pub struct LeafComponent {
    name: String,
    tags: BTreeSet<String>,
    full_path: String,
    query: Vec<QueryParam>,
    removed: BTreeSet<String>,
}

impl LeafComponent {
    /// Rebuild URL without filtered query parameters, optionally dropping one
    /// more.
    ///
    /// Only the query is rebuilt. Everything else, including the text of kept
    /// parameters, stays exactly as written in the original URL.
    fn reconstruct(&self, without: Option<&str>) -> String {
        let kept = self
            .query
            .iter()
            .filter(|param| !self.removed.contains(&param.key))
            .filter(|param| Some(param.key.as_str()) != without)
            .map(|param| param.raw.as_str())
            .collect::<Vec<_>>();
        if kept.len() == self.query.len() {
            return self.full_path.clone();
        }

        let (base, _, fragment) = split_query(&self.full_path);
        let mut url = base.to_string();
        if !kept.is_empty() {
            url.push('?');
            url.push_str(&kept.join("&"));
        }
        if let Some(fragment) = fragment {
            url.push('#');
            url.push_str(fragment);
        }

        url
    }
}

/// Query parameter as written in a URL.
#[derive(Debug, Clone, PartialEq, Eq)]
struct QueryParam {
    key: String,
    raw: String,
}

impl QueryParam {
    fn parse_all(url: &str) -> Vec<Self> {
        let (_, query, _) = split_query(url);
        query
            .unwrap_or_default()
            .split('&')
            .filter(|raw| !raw.is_empty())
            .map(|raw| {
                let key = form_urlencoded::parse(raw.as_bytes())
                    .next()
                    .map(|(key, _)| key.into_owned())
                    .unwrap_or_default();
                Self {
                    key,
                    raw: raw.to_string(),
                }
            })
            .collect()
    }
}

/// Split URL text into the part before its query, the query, and the fragment.
fn split_query(url: &str) -> (&str, Option<&str>, Option<&str>) {
    let (rest, fragment) = match url.split_once('#') {
        Some((rest, fragment)) => (rest, Some(fragment)),
        None => (url, None),
    };

    match rest.split_once('?') {
        Some((base, query)) => (base, Some(query), fragment),
        None => (rest, None, fragment),
    }
}

impl PartialEq for LeafComponent {
    fn eq(&self, other: &Self) -> bool {
        self.full_path == other.full_path
    }
}

impl Eq for LeafComponent {}
