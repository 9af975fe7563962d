// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Tag file formats.
//!
//! All tag files share one line-based layout: fields separated by `" : "`,
//! where the first field is always a tag. What follows the tag depends on
//! the flavor of file:
//!
//! - __Tag file__ (`.tags`): `tag : count`
//! - __Substitution file__ (`.sub`): `tag : count : replacement...`
//! - __Index file__ (`.index`): `tag : count : file...`
//!
//! Tags are normalized on the way in: surrounding whitespace is trimmed, and
//! runs of inner spaces collapse to a single underscore.

use regex::Regex;
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt::{Display, Formatter, Result as FmtResult},
    fs::read_to_string,
    path::{Path, PathBuf},
    sync::LazyLock,
};
use tracing::warn;

/// Field separator shared by every tag file flavor.
pub const SEP: &str = " : ";

static TAG_NORM: LazyLock<Regex> = LazyLock::new(|| Regex::new(" +").unwrap());

/// Normalize a tag.
pub fn norm_tag(tag: &str) -> String {
    TAG_NORM.replace_all(tag.trim(), "_").into_owned()
}

fn read_lines(path: &Path) -> Result<String> {
    read_to_string(path).map_err(|err| TagError::Read {
        source: err,
        path: path.to_path_buf(),
    })
}

fn split_fields(line: &str) -> Vec<&str> {
    line.split(SEP).map(str::trim).collect()
}

/// Counts of tag usage.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TagFile {
    counts: BTreeMap<String, usize>,
}

impl TagFile {
    /// Construct new empty tag file.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read tag file at target path.
    ///
    /// Lines that cannot be understood are logged and skipped.
    ///
    /// # Errors
    ///
    /// - Return [`TagError::Read`] if file cannot be read.
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let content = read_lines(path.as_ref())?;
        Ok(Self::parse_logged(&content, path.as_ref()))
    }

    fn parse_logged(content: &str, origin: &Path) -> Self {
        let mut tags = Self::new();
        for (num, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }

            if let Err(err) = tags.insert_line(line) {
                warn!("failure reading tags {} (l:{num}): {err}", origin.display());
            }
        }

        tags
    }

    fn insert_line(&mut self, line: &str) -> Result<()> {
        match split_fields(line).as_slice() {
            [tag] => {
                self.increment(tag, 1);
            }
            [tag, count, ..] => {
                let amount = parse_count(count)?;
                self.increment(tag, amount);
            }
            [] => {}
        }

        Ok(())
    }

    /// Increment count of a tag by some amount, returning normalized tag.
    pub fn increment(&mut self, tag: &str, amount: usize) -> String {
        let key = norm_tag(tag);
        if !key.is_empty() {
            *self.counts.entry(key.clone()).or_default() += amount;
        }
        key
    }

    /// Count one use of each tag.
    pub fn extend<'a>(&mut self, tags: impl IntoIterator<Item = &'a str>) {
        for tag in tags {
            self.increment(tag, 1);
        }
    }

    /// Add all counts of another tag file into this one.
    pub fn merge(&mut self, other: &TagFile) {
        for (tag, count) in &other.counts {
            *self.counts.entry(tag.clone()).or_default() += count;
        }
    }

    /// Check if tag is present.
    pub fn contains(&self, tag: &str) -> bool {
        self.counts.contains_key(&norm_tag(tag))
    }

    /// Current count of a tag.
    pub fn count(&self, tag: &str) -> usize {
        self.counts.get(&norm_tag(tag)).copied().unwrap_or(0)
    }

    /// Iterate over all known tags in sorted order.
    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.counts.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

impl Display for TagFile {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        let lines = self
            .counts
            .iter()
            .filter(|(_, count)| **count > 0)
            .map(|(tag, count)| format!("{tag}{SEP}{count}"))
            .collect::<Vec<_>>();
        fmt.write_str(lines.join("\n").as_str())
    }
}

impl From<&str> for TagFile {
    fn from(content: &str) -> Self {
        Self::parse_logged(content, Path::new("<memory>"))
    }
}

/// Tag counts with replacement tags.
///
/// Used to clean up tag sets, e.g., mapping `"ai"` to `"artificial_intelligence"`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SubstitutionFile {
    tags: TagFile,
    substitutions: BTreeMap<String, BTreeSet<String>>,
}

impl SubstitutionFile {
    /// Construct new empty substitution file.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read substitution file at target path.
    ///
    /// # Errors
    ///
    /// - Return [`TagError::Read`] if file cannot be read.
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let content = read_lines(path.as_ref())?;
        Ok(Self::parse_logged(&content, path.as_ref()))
    }

    fn parse_logged(content: &str, origin: &Path) -> Self {
        let mut subs = Self::new();
        for (num, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }

            if let Err(err) = subs.insert_line(line) {
                warn!("failure reading substitutions {} (l:{num}): {err}", origin.display());
            }
        }

        subs
    }

    fn insert_line(&mut self, line: &str) -> Result<()> {
        match split_fields(line).as_slice() {
            [tag] => {
                self.tags.increment(tag, 1);
            }
            [tag, count, replacements @ ..] => {
                let key = self.tags.increment(tag, parse_count(count)?);
                self.insert_substitutions(&key, replacements.iter().copied());
            }
            [] => {}
        }

        Ok(())
    }

    /// Register replacement tags for a tag.
    pub fn insert_substitutions<'a>(
        &mut self,
        tag: &str,
        replacements: impl IntoIterator<Item = &'a str>,
    ) {
        let key = norm_tag(tag);
        let replacements = replacements
            .into_iter()
            .map(norm_tag)
            .filter(|sub| !sub.is_empty())
            .collect::<Vec<_>>();
        if replacements.is_empty() {
            return;
        }

        self.substitutions.entry(key).or_default().extend(replacements);
    }

    /// Apply substitution to a tag.
    ///
    /// Returns the set containing the normalized tag itself if there is no
    /// substitution for it.
    pub fn sub(&self, tag: &str) -> BTreeSet<String> {
        let normed = norm_tag(tag);
        match self.substitutions.get(&normed) {
            Some(subs) => subs.clone(),
            None => BTreeSet::from([normed]),
        }
    }

    /// Check if tag has a substitution.
    pub fn has_sub(&self, tag: &str) -> bool {
        self.substitutions.contains_key(&norm_tag(tag))
    }

    /// Access underlying counts.
    pub fn tags(&self) -> &TagFile {
        &self.tags
    }
}

impl Display for SubstitutionFile {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        let mut lines = Vec::new();
        for (tag, count) in &self.tags.counts {
            let mut fields = vec![tag.clone(), count.to_string()];
            if let Some(subs) = self.substitutions.get(tag) {
                fields.extend(subs.iter().cloned());
            }
            lines.push(fields.join(SEP));
        }

        fmt.write_str(lines.join("\n").as_str())
    }
}

impl From<&str> for SubstitutionFile {
    fn from(content: &str) -> Self {
        Self::parse_logged(content, Path::new("<memory>"))
    }
}

/// How [`IndexFile::files_for`] combines per-tag file sets.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum SetOp {
    /// Files tagged with every tag.
    #[default]
    Intersect,

    /// Files tagged with any tag.
    Union,

    /// Files tagged with an odd number of the tags.
    SymmetricDifference,

    /// Files of the first tag not tagged with any later tag.
    Difference,
}

/// Mapping of tags to the files using them.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IndexFile {
    tags: TagFile,
    mapping: BTreeMap<String, BTreeSet<PathBuf>>,
}

impl IndexFile {
    /// Construct new empty index file.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read index file at target path.
    ///
    /// # Errors
    ///
    /// - Return [`TagError::Read`] if file cannot be read.
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let content = read_lines(path.as_ref())?;
        let mut index = Self::new();
        for (num, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }

            if let Err(err) = index.insert_line(line) {
                warn!("failure reading index {} (l:{num}): {err}", path.as_ref().display());
            }
        }

        Ok(index)
    }

    fn insert_line(&mut self, line: &str) -> Result<()> {
        match split_fields(line).as_slice() {
            [tag, maybe_count, files @ ..] => {
                let mut paths = files.iter().map(PathBuf::from).collect::<BTreeSet<_>>();
                let count = match maybe_count.parse::<usize>() {
                    Ok(count) => count,
                    Err(_) => {
                        paths.insert(PathBuf::from(maybe_count));
                        paths.len()
                    }
                };
                let key = self.tags.increment(tag, count);
                self.mapping.entry(key).or_default().extend(paths);
                Ok(())
            }
            _ => Err(TagError::MalformedLine(line.to_string())),
        }
    }

    /// Record that a file uses a tag.
    pub fn insert(&mut self, tag: &str, file: impl Into<PathBuf>) {
        let key = self.tags.increment(tag, 1);
        self.mapping.entry(key).or_default().insert(file.into());
    }

    /// Files using a tag.
    pub fn files(&self, tag: &str) -> Option<&BTreeSet<PathBuf>> {
        self.mapping.get(&norm_tag(tag))
    }

    /// Combine the file sets of several tags.
    ///
    /// Tags unknown to the index are ignored. Returns `None` if no tag is
    /// known at all.
    pub fn files_for<'a>(
        &self,
        tags: impl IntoIterator<Item = &'a str>,
        op: SetOp,
    ) -> Option<BTreeSet<PathBuf>> {
        let mut result: Option<BTreeSet<PathBuf>> = None;
        for tag in tags {
            let Some(files) = self.files(tag) else {
                continue;
            };

            result = Some(match result {
                None => files.clone(),
                Some(current) => match op {
                    SetOp::Intersect => current.intersection(files).cloned().collect(),
                    SetOp::Union => current.union(files).cloned().collect(),
                    SetOp::SymmetricDifference => {
                        current.symmetric_difference(files).cloned().collect()
                    }
                    SetOp::Difference => current.difference(files).cloned().collect(),
                },
            });
        }

        result
    }

    /// Access underlying counts.
    pub fn tags(&self) -> &TagFile {
        &self.tags
    }
}

impl Display for IndexFile {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        let lines = self
            .mapping
            .iter()
            .map(|(tag, files)| {
                let mut fields = vec![tag.clone(), self.tags.count(tag).to_string()];
                fields.extend(files.iter().map(|file| file.display().to_string()));
                fields.join(SEP)
            })
            .collect::<Vec<_>>();
        fmt.write_str(lines.join("\n").as_str())
    }
}

fn parse_count(field: &str) -> Result<usize> {
    field
        .parse::<usize>()
        .map_err(|_| TagError::BadCount(field.to_string()))
}

/// Tag file error types.
#[derive(Debug, thiserror::Error)]
pub enum TagError {
    /// Tag file cannot be read.
    #[error("failed to read tag file at {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Count field is not a number.
    #[error("tag count {0:?} is not a number")]
    BadCount(String),

    /// Line does not have enough fields.
    #[error("malformed line {0:?}")]
    MalformedLine(String),
}

/// Friendly result alias :3
pub type Result<T, E = TagError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use simple_test_case::test_case;

    #[test_case("rust", "rust"; "plain")]
    #[test_case("  machine   learning ", "machine_learning"; "inner spaces")]
    #[test_case("a b c", "a_b_c"; "several words")]
    #[test]
    fn normalize_tags(input: &str, expect: &str) {
        assert_eq!(norm_tag(input), expect);
    }

    #[test]
    fn tag_file_counts_and_display() {
        let tags = TagFile::from(indoc! {r#"
            rust : 3
            machine learning : 2
            rust : 1
            broken : not_a_number
            empty : 0
        "#});

        assert_eq!(tags.count("rust"), 4);
        assert_eq!(tags.count("machine learning"), 2);
        assert!(tags.contains("machine_learning"));
        assert!(!tags.contains("broken"));

        let expect = indoc! {r#"
            machine_learning : 2
            rust : 4"#};
        assert_eq!(tags.to_string(), expect);
    }

    #[test]
    fn tag_file_merge_adds_counts() {
        let mut left = TagFile::from("a : 1\nb : 2");
        let right = TagFile::from("b : 3\nc : 1");
        left.merge(&right);
        assert_eq!(left.to_string(), "a : 1\nb : 5\nc : 1");
    }

    #[test]
    fn substitution_file_applies_replacements() {
        let subs = SubstitutionFile::from(indoc! {r#"
            ai : 4 : artificial intelligence
            ml : 2 : machine_learning : statistics
            rust : 10
        "#});

        assert_eq!(subs.sub("ai"), BTreeSet::from(["artificial_intelligence".to_string()]));
        assert_eq!(
            subs.sub("ml"),
            BTreeSet::from(["machine_learning".to_string(), "statistics".to_string()])
        );
        assert_eq!(subs.sub(" rust "), BTreeSet::from(["rust".to_string()]));
        assert!(subs.has_sub("ml"));
        assert!(!subs.has_sub("rust"));

        let expect = indoc! {r#"
            ai : 4 : artificial_intelligence
            ml : 2 : machine_learning : statistics
            rust : 10"#};
        assert_eq!(subs.to_string(), expect);
    }

    #[test]
    fn index_file_set_operations() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("library.index");
        std::fs::write(
            &path,
            indoc! {r#"
                rust : 2 : a.org : b.org
                graphs : 2 : b.org : c.org
                misc : d.org
            "#},
        )?;
        let index = IndexFile::read(&path)?;

        let files = |op| {
            index
                .files_for(["rust", "graphs"], op)
                .map(|set| set.into_iter().map(|p| p.display().to_string()).collect::<Vec<_>>())
        };
        assert_eq!(files(SetOp::Intersect), Some(vec!["b.org".into()]));
        assert_eq!(
            files(SetOp::Union),
            Some(vec!["a.org".into(), "b.org".into(), "c.org".into()])
        );
        assert_eq!(
            files(SetOp::SymmetricDifference),
            Some(vec!["a.org".into(), "c.org".into()])
        );
        assert_eq!(files(SetOp::Difference), Some(vec!["a.org".into()]));
        assert_eq!(index.files_for(["nothing"], SetOp::Union), None);

        // Non-numeric count field is treated as a file.
        assert_eq!(index.tags().count("misc"), 1);

        let expect = indoc! {r#"
            graphs : 2 : b.org : c.org
            misc : 1 : d.org
            rust : 2 : a.org : b.org"#};
        assert_eq!(index.to_string(), expect);

        Ok(())
    }
}
