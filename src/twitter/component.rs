// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Component files.
//!
//! Each connected component of the tweet graph is written to its own
//! `component_{uuid}.json` file holding `{"tweets": [...], "users": [...]}`.
//! Archives can hold far more tweets than is comfortable to keep in memory
//! per component, so entries are buffered and appended to the open array on
//! disk in chunks.
//!
//! # Writer States
//!
//! A [`ComponentWriter`] moves through the states of [`WriterState`] in one
//! direction only. Tweets must all be added before the first user. Adding a
//! tweet after a user is an error, and adding anything after
//! [`ComponentWriter::finish`] is a bug in the caller.
//!
//! # See Also
//!
//! 1. [`TwitterGraph::components`]
//! 2. [`ComponentFile`](crate::twitter::record::ComponentFile) for reading
//!    the files back.

use crate::twitter::{
    graph::{Component, GraphError, TwitterGraph},
    record::{self, RecordError, Tweet, User},
};

use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use serde_json::{ser::PrettyFormatter, Value};
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    fs::{create_dir_all, write, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

const HEADER: &str = "{\n    \"tweets\": [\n";
const SWITCH: &str = "\n    ],\n    \"users\": [\n";
const CLOSE: &str = "\n    ]\n}\n";
const SEPARATOR: &str = ",\n";

/// Name of the summary file written next to the components.
pub const SUMMARY_FILE: &str = "components.summary";

/// Progress of a [`ComponentWriter`] through its file.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum WriterState {
    /// Nothing written yet.
    #[default]
    Pre,

    /// Tweets array is open.
    WritingTweets,

    /// Tweets array closed, no users flushed yet.
    Mid,

    /// Users array has content on disk.
    WritingUsers,

    /// File is complete.
    Finished,
}

impl Display for WriterState {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        let name = match self {
            Self::Pre => "pre",
            Self::WritingTweets => "writing tweets",
            Self::Mid => "mid",
            Self::WritingUsers => "writing users",
            Self::Finished => "finished",
        };
        fmt.write_str(name)
    }
}

#[derive(Debug)]
enum Entry {
    Tweet(String, Value),
    User(String, Value),
}

/// Buffered writer of one component file.
#[derive(Debug)]
pub struct ComponentWriter {
    path: PathBuf,
    state: WriterState,
    buffer: Vec<Value>,
    write_count: usize,
    array_started: bool,
    tweet_ids: IndexSet<String>,
    user_ids: IndexSet<String>,
    flushes: usize,
}

impl ComponentWriter {
    /// Construct new writer flushing every `write_count` entries.
    ///
    /// Nothing touches the disk until the first entry is added.
    pub fn new(path: impl Into<PathBuf>, write_count: usize) -> Self {
        Self {
            path: path.into(),
            state: WriterState::default(),
            buffer: Vec::new(),
            write_count: write_count.max(1),
            array_started: false,
            tweet_ids: IndexSet::new(),
            user_ids: IndexSet::new(),
            flushes: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> WriterState {
        self.state
    }

    /// Ids of tweets added so far.
    pub fn tweet_ids(&self) -> &IndexSet<String> {
        &self.tweet_ids
    }

    /// Ids of users added so far.
    pub fn user_ids(&self) -> &IndexSet<String> {
        &self.user_ids
    }

    /// Number of chunks appended to disk so far.
    pub fn flush_count(&self) -> usize {
        self.flushes
    }

    /// Add a tweet. Tweets already added are ignored.
    ///
    /// # Errors
    ///
    /// - Return [`ComponentError::UnexpectedEntry`] if users were already
    ///   added.
    /// - Return [`ComponentError::Write`] if a flush fails.
    ///
    /// # Panics
    ///
    /// - Panic if writer is finished.
    pub fn add_tweet(&mut self, tweet: &Tweet) -> Result<()> {
        if self.tweet_ids.contains(&tweet.id_str) {
            debug!("tweet {} already in {}", tweet.id_str, self.path.display());
            return Ok(());
        }

        let value = serde_json::to_value(tweet)?;
        self.add(Entry::Tweet(tweet.id_str.clone(), value))
    }

    /// Add a user. Users already added are ignored.
    ///
    /// # Errors
    ///
    /// - Return [`ComponentError::Write`] if a flush fails.
    ///
    /// # Panics
    ///
    /// - Panic if writer is finished.
    pub fn add_user(&mut self, user: &User) -> Result<()> {
        if self.user_ids.contains(&user.id_str) {
            return Ok(());
        }

        let value = serde_json::to_value(user)?;
        self.add(Entry::User(user.id_str.clone(), value))
    }

    fn add(&mut self, entry: Entry) -> Result<()> {
        match (self.state, entry) {
            (WriterState::Finished, _) => {
                panic!("cannot add entries to finished component {}", self.path.display())
            }
            (WriterState::Pre, Entry::Tweet(id, value)) => {
                self.write_raw(HEADER, true)?;
                self.state = WriterState::WritingTweets;
                self.tweet_ids.insert(id);
                self.push(value)?;
            }
            (WriterState::WritingTweets, Entry::Tweet(id, value)) => {
                self.tweet_ids.insert(id);
                self.push(value)?;
            }
            (WriterState::Pre | WriterState::WritingTweets, Entry::User(id, value)) => {
                if self.state == WriterState::Pre {
                    self.write_raw(HEADER, true)?;
                }
                self.flush()?;
                self.write_raw(SWITCH, false)?;
                self.array_started = false;
                self.state = WriterState::Mid;
                self.user_ids.insert(id);
                self.push(value)?;
            }
            (WriterState::Mid | WriterState::WritingUsers, Entry::User(id, value)) => {
                self.user_ids.insert(id);
                self.push(value)?;
            }
            (state @ (WriterState::Mid | WriterState::WritingUsers), Entry::Tweet(id, _)) => {
                return Err(ComponentError::UnexpectedEntry {
                    id,
                    state,
                    path: self.path.clone(),
                });
            }
        }

        Ok(())
    }

    fn push(&mut self, value: Value) -> Result<()> {
        self.buffer.push(value);
        if self.buffer.len() >= self.write_count {
            self.flush()?;
        }

        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        let chunk = render_chunk(&self.buffer)?;
        if self.array_started {
            self.write_raw(SEPARATOR, false)?;
        }
        self.write_raw(chunk.as_str(), false)?;

        debug!("flushed {} entries to {}", self.buffer.len(), self.path.display());
        self.buffer.clear();
        self.array_started = true;
        self.flushes += 1;
        if self.state == WriterState::Mid {
            self.state = WriterState::WritingUsers;
        }

        Ok(())
    }

    /// Flush remaining entries and close the file.
    ///
    /// The file is valid JSON afterwards, even if nothing was ever added.
    /// Finishing twice does nothing.
    ///
    /// # Errors
    ///
    /// - Return [`ComponentError::Write`] if file cannot be written.
    pub fn finish(&mut self) -> Result<()> {
        match self.state {
            WriterState::Finished => return Ok(()),
            WriterState::Pre => {
                self.write_raw(HEADER, true)?;
                self.write_raw(SWITCH, false)?;
            }
            WriterState::WritingTweets => {
                self.flush()?;
                self.write_raw(SWITCH, false)?;
            }
            WriterState::Mid | WriterState::WritingUsers => self.flush()?,
        }

        self.write_raw(CLOSE, false)?;
        self.state = WriterState::Finished;

        Ok(())
    }

    /// One line description of the component.
    pub fn summary(&self) -> String {
        let stem = self
            .path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        let join = |ids: &IndexSet<String>| ids.iter().cloned().collect::<Vec<_>>().join(", ");

        format!(
            "Component: {} Counts: [{} {}] TweetIds: [{}] UserIds: [{}]",
            stem,
            self.tweet_ids.len(),
            self.user_ids.len(),
            join(&self.tweet_ids),
            join(&self.user_ids),
        )
    }

    fn write_raw(&self, text: &str, truncate: bool) -> Result<()> {
        let mut options = OpenOptions::new();
        if truncate {
            options.write(true).create(true).truncate(true);
        } else {
            options.append(true).create(true);
        }

        options
            .open(&self.path)
            .and_then(|mut file| file.write_all(text.as_bytes()))
            .map_err(|err| ComponentError::Write {
                source: err,
                path: self.path.clone(),
            })
    }
}

fn render_chunk(entries: &[Value]) -> Result<String> {
    let mut out = Vec::new();
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(b"    "));
    entries.serialize(&mut serializer)?;

    let text = String::from_utf8_lossy(&out);
    let text = text.strip_prefix("[\n").unwrap_or(&text);
    let text = text.strip_suffix("\n]").unwrap_or(text);

    Ok(text.to_string())
}

/// Writers for every component of a graph.
///
/// Tweets and users are routed to each component that claims them. Ids no
/// component claims are collected as missing.
#[derive(Debug)]
pub struct ComponentFiles {
    dir: PathBuf,
    writers: Vec<ComponentWriter>,
    tweet_mapping: IndexMap<String, Vec<usize>>,
    user_mapping: IndexMap<String, IndexSet<usize>>,
    missing: IndexSet<String>,
}

impl ComponentFiles {
    /// Construct writers for each component in target directory.
    ///
    /// # Errors
    ///
    /// - Return [`ComponentError::CreateDir`] if directory cannot be created.
    pub fn new(dir: impl Into<PathBuf>, components: &[Component], write_count: usize) -> Result<Self> {
        let dir = dir.into();
        create_dir_all(&dir).map_err(|err| ComponentError::CreateDir {
            source: err,
            path: dir.clone(),
        })?;

        let mut writers = Vec::with_capacity(components.len());
        let mut tweet_mapping: IndexMap<String, Vec<usize>> = IndexMap::new();
        for (index, component) in components.iter().enumerate() {
            let path = dir.join(format!("component_{}.json", Uuid::new_v4()));
            writers.push(ComponentWriter::new(path, write_count));
            for id in component {
                tweet_mapping.entry(id.clone()).or_default().push(index);
            }
        }

        Ok(Self {
            dir,
            writers,
            tweet_mapping,
            user_mapping: IndexMap::new(),
            missing: IndexSet::new(),
        })
    }

    pub fn writers(&self) -> &[ComponentWriter] {
        &self.writers
    }

    /// Route tweets to their components.
    ///
    /// # Errors
    ///
    /// - Return [`ComponentError`] if any writer fails.
    pub fn add_tweets<'a>(&mut self, tweets: impl IntoIterator<Item = &'a Tweet>) -> Result<()> {
        for tweet in tweets {
            let Some(indices) = self.tweet_mapping.get(&tweet.id_str) else {
                self.missing.insert(tweet.id_str.clone());
                continue;
            };

            for index in indices {
                self.writers[*index].add_tweet(tweet)?;
                if let Some(user) = tweet.user_id() {
                    self.user_mapping
                        .entry(user.to_string())
                        .or_default()
                        .insert(*index);
                }
            }
        }

        Ok(())
    }

    /// Route users to the components holding their tweets.
    ///
    /// # Errors
    ///
    /// - Return [`ComponentError`] if any writer fails.
    pub fn add_users(&mut self, users: &IndexMap<String, User>) -> Result<()> {
        for (id, user) in users {
            let Some(indices) = self.user_mapping.get(id) else {
                self.missing.insert(id.clone());
                continue;
            };

            for index in indices {
                self.writers[*index].add_user(user)?;
            }
        }

        Ok(())
    }

    /// Finish every writer and write the summary file.
    ///
    /// Returns every id that no component claimed.
    ///
    /// # Errors
    ///
    /// - Return [`ComponentError::Write`] if any file cannot be written.
    pub fn finish(mut self) -> Result<IndexSet<String>> {
        for writer in self.writers.iter_mut() {
            writer.finish()?;
        }

        let summary_path = self.dir.join(SUMMARY_FILE);
        let summary = self
            .writers
            .iter()
            .map(ComponentWriter::summary)
            .collect::<Vec<_>>()
            .join("\n");
        write(&summary_path, summary).map_err(|err| ComponentError::Write {
            source: err,
            path: summary_path.clone(),
        })?;

        Ok(self.missing)
    }
}

/// Outcome of [`write_components`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ComponentReport {
    /// Number of component files written.
    pub components: usize,

    /// Ids that no component claimed.
    pub missing: IndexSet<String>,
}

/// Partition downloaded tweets into component files.
///
/// Reads every batch in `tweet_dir` and `user_dir`, and writes one file per
/// component to `component_dir`. Tweets that belong to no reply chain become
/// components of their own.
///
/// # Errors
///
/// - Return [`ComponentError`] if any batch cannot be read or any component
///   cannot be written.
#[instrument(skip_all, level = "debug")]
pub fn write_components(
    tweet_dir: &Path,
    user_dir: &Path,
    component_dir: &Path,
    write_count: usize,
) -> Result<ComponentReport> {
    let tweet_files = record::json_files(tweet_dir, "")?;
    info!("building graph from {} tweet files", tweet_files.len());
    let graph = TwitterGraph::from_files(&tweet_files)?;

    let (mut components, rest) = graph.components();
    components.extend(graph.standalone_components(&rest));
    info!("writing {} components", components.len());

    let mut files = ComponentFiles::new(component_dir, &components, write_count)?;
    for file in &tweet_files {
        files.add_tweets(&record::read_tweets(file)?)?;
    }
    for file in record::json_files(user_dir, "")? {
        files.add_users(&record::read_users(file)?)?;
    }

    let missing = files.finish()?;
    if !missing.is_empty() {
        warn!("{} ids belong to no component", missing.len());
    }

    Ok(ComponentReport {
        components: components.len(),
        missing,
    })
}

/// Component error types.
#[derive(Debug, thiserror::Error)]
pub enum ComponentError {
    /// Component directory cannot be created.
    #[error("failed to create component directory {:?}", path.display())]
    CreateDir {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Component file cannot be written.
    #[error("failed to write component file {:?}", path.display())]
    Write {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Tweet added after users in a component file.
    #[error("unexpected tweet {id} while {state} in {:?}", path.display())]
    UnexpectedEntry {
        id: String,
        state: WriterState,
        path: PathBuf,
    },

    /// Entry cannot be serialized.
    #[error(transparent)]
    Serialize(#[from] serde_json::Error),

    /// Batch files cannot be read.
    #[error(transparent)]
    Record(#[from] RecordError),

    /// Graph cannot be built.
    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Friendly result alias :3
pub type Result<T, E = ComponentError> = std::result::Result<T, E>;
