// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Thread reconstruction.
//!
//! A component holds a conversation. Its __main thread__ is the first of
//! the longest reply chains found by walking the component depth first from
//! its roots. Every other chain, and every reply no root reached, becomes a
//! side conversation. Side conversations never repeat a tweet that already
//! appears in the main thread or in an earlier side conversation.
//!
//! The result is a [`ThreadObj`], stored as `thread_{uuid}.json` next to the
//! other threads, for the org renderer to pick up.

use crate::twitter::{
    graph::TwitterGraph,
    record::{self, ComponentFile, RecordError},
};

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::{
    fs::{create_dir_all, read_to_string, write},
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument, warn};

/// Thread description of one component.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ThreadObj {
    /// Tweet ids of the main thread, oldest first.
    pub main_thread: Vec<String>,

    /// Side conversations.
    pub rest: Vec<Vec<String>>,

    /// Tweets quoted anywhere in the component.
    pub quotes: Vec<String>,

    /// Component file the thread was built from.
    pub component: PathBuf,

    /// Screen name of the main author.
    pub base_user: String,
}

impl ThreadObj {
    /// Build thread of a component read from `path`.
    pub fn build(component: &ComponentFile, path: &Path) -> Self {
        let graph = TwitterGraph::from_tweets(&component.tweets, path);
        let (chains, remaining) = graph.reply_chains(&graph.roots());
        if chains.len() > 1 {
            warn!("{} has {} reply chains", path.display(), chains.len());
        }

        let quotes = graph.get_quotes::<&str>(&[]);

        // INVARIANT: The first chain of maximal length wins.
        let mut main_index: Option<usize> = None;
        for (index, chain) in chains.iter().enumerate() {
            match main_index {
                Some(best) if chains[best].len() >= chain.len() => {}
                _ => main_index = Some(index),
            }
        }

        let main_thread = match main_index {
            Some(index) => chains[index].clone(),
            None => component
                .tweets
                .iter()
                .map(|tweet| tweet.id_str.clone())
                .filter(|id| !quotes.contains(id))
                .collect(),
        };

        let mut seen: IndexSet<String> = main_thread.iter().cloned().collect();
        let candidates = chains
            .iter()
            .enumerate()
            .filter(|(index, _)| Some(*index) != main_index)
            .map(|(_, chain)| chain.clone())
            .chain(remaining.into_iter().map(|id| vec![id]));

        let mut rest = Vec::new();
        for candidate in candidates {
            let conversation = candidate
                .into_iter()
                .filter(|id| seen.insert(id.clone()))
                .collect::<Vec<_>>();
            if !conversation.is_empty() {
                rest.push(conversation);
            }
        }

        let base_user = majority_user(component, &main_thread).unwrap_or_else(|| {
            path.file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_default()
        });

        Self {
            main_thread,
            rest,
            quotes: quotes.into_iter().collect(),
            component: path.to_path_buf(),
            base_user,
        }
    }

    /// Read thread file at target path.
    ///
    /// # Errors
    ///
    /// - Return [`ThreadError::Read`] if file cannot be read.
    /// - Return [`ThreadError::Parse`] if file is not a valid thread.
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let content = read_to_string(path.as_ref()).map_err(|err| ThreadError::Read {
            source: err,
            path: path.as_ref().to_path_buf(),
        })?;

        serde_json::from_str(&content).map_err(|err| ThreadError::Parse {
            source: err,
            path: path.as_ref().to_path_buf(),
        })
    }

    /// Write thread file to target path.
    ///
    /// # Errors
    ///
    /// - Return [`ThreadError::Write`] if file cannot be written.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = serde_json::to_string_pretty(self).map_err(|err| ThreadError::Parse {
            source: err,
            path: path.as_ref().to_path_buf(),
        })?;

        write(path.as_ref(), content).map_err(|err| ThreadError::Write {
            source: err,
            path: path.as_ref().to_path_buf(),
        })
    }
}

fn majority_user(component: &ComponentFile, main_thread: &[String]) -> Option<String> {
    let tweets = component.tweet_map();
    let users = component.user_map();

    let mut counts: IndexMap<&str, usize> = IndexMap::new();
    for tweet in main_thread.iter().filter_map(|id| tweets.get(id)) {
        if let Some(name) = tweet.author_name(&users) {
            *counts.entry(name).or_default() += 1;
        }
    }

    let mut best: Option<(&str, usize)> = None;
    for (name, count) in counts {
        match best {
            Some((_, best_count)) if best_count >= count => {}
            _ => best = Some((name, count)),
        }
    }

    best.map(|(name, _)| name.to_string())
}

/// Path of the thread file for a component file.
pub fn thread_path(thread_dir: &Path, component: &Path) -> PathBuf {
    let name = component
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match name.strip_prefix("component_") {
        Some(suffix) => format!("thread_{suffix}"),
        None => format!("thread_{name}"),
    };

    thread_dir.join(name)
}

/// Build a thread for every component file.
///
/// Returns number of threads written.
///
/// # Errors
///
/// - Return [`ThreadError`] if any component cannot be read, or any thread
///   cannot be written.
#[instrument(skip_all, level = "debug")]
pub fn write_threads(component_dir: &Path, thread_dir: &Path) -> Result<usize> {
    create_dir_all(thread_dir).map_err(|err| ThreadError::Write {
        source: err,
        path: thread_dir.to_path_buf(),
    })?;

    let components = record::json_files(component_dir, "component_")?;
    info!("building threads for {} components", components.len());
    for path in &components {
        let component = ComponentFile::read(path)?;
        let thread = ThreadObj::build(&component, path);
        let target = thread_path(thread_dir, path);
        debug!("write {} ({} main tweets)", target.display(), thread.main_thread.len());
        thread.write(&target)?;
    }

    Ok(components.len())
}

/// Thread error types.
#[derive(Debug, thiserror::Error)]
pub enum ThreadError {
    /// Thread file cannot be read.
    #[error("failed to read thread at {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Thread file cannot be written.
    #[error("failed to write thread to {:?}", path.display())]
    Write {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Thread file holds invalid JSON.
    #[error("invalid thread JSON at {:?}", path.display())]
    Parse {
        #[source]
        source: serde_json::Error,
        path: PathBuf,
    },

    /// Component file cannot be read.
    #[error(transparent)]
    Record(#[from] RecordError),
}

/// Friendly result alias :3
pub type Result<T, E = ThreadError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::twitter::record::{Tweet, User};
    use pretty_assertions::assert_eq;

    fn tweet(id: &str, reply_to: Option<&str>, quote: Option<&str>, user: &str) -> Tweet {
        Tweet {
            id_str: id.into(),
            in_reply_to_status_id_str: reply_to.map(Into::into),
            quoted_status_id_str: quote.map(Into::into),
            user: Some(User {
                id_str: user.into(),
                ..User::default()
            }),
            ..Tweet::default()
        }
    }

    fn user(id: &str, name: &str) -> User {
        User {
            id_str: id.into(),
            screen_name: Some(name.into()),
            ..User::default()
        }
    }

    fn ids(items: &[&str]) -> Vec<String> {
        items.iter().map(|id| id.to_string()).collect()
    }

    #[test]
    fn main_thread_with_quote() {
        let component = ComponentFile {
            tweets: vec![
                tweet("a", None, None, "1"),
                tweet("b", Some("a"), None, "1"),
                tweet("c", Some("b"), Some("d"), "1"),
                tweet("d", None, None, "2"),
            ],
            users: vec![user("1", "alice"), user("2", "bob")],
        };

        let thread = ThreadObj::build(&component, Path::new("/tmp/component_x.json"));
        assert_eq!(thread.main_thread, ids(&["a", "b", "c"]));
        assert_eq!(thread.quotes, ids(&["d"]));
        assert!(thread.rest.is_empty());
        assert_eq!(thread.base_user, "alice");
        assert_eq!(thread.component, PathBuf::from("/tmp/component_x.json"));
    }

    #[test]
    fn side_conversations_skip_seen_tweets() {
        // a -> b -> c is longest, a -> e second, x -> y unreachable from a.
        let component = ComponentFile {
            tweets: vec![
                tweet("a", None, None, "1"),
                tweet("b", Some("a"), None, "1"),
                tweet("c", Some("b"), None, "1"),
                tweet("e", Some("a"), None, "2"),
                tweet("y", Some("x"), None, "2"),
            ],
            users: vec![user("1", "alice"), user("2", "bob")],
        };

        let thread = ThreadObj::build(&component, Path::new("component_y.json"));
        assert_eq!(thread.main_thread, ids(&["a", "b", "c"]));
        assert_eq!(thread.rest, vec![ids(&["e"]), ids(&["x", "y"])]);
    }

    #[test]
    fn first_longest_chain_wins() {
        let component = ComponentFile {
            tweets: vec![
                tweet("a", None, None, "1"),
                tweet("b", Some("a"), None, "2"),
                tweet("c", Some("a"), None, "3"),
            ],
            users: vec![user("1", "alice"), user("2", "bob"), user("3", "carol")],
        };

        let thread = ThreadObj::build(&component, Path::new("component_z.json"));
        assert_eq!(thread.main_thread, ids(&["a", "b"]));
        assert_eq!(thread.rest, vec![ids(&["c"])]);
        // One tweet each, first counted name wins.
        assert_eq!(thread.base_user, "alice");
    }

    #[test]
    fn standalone_component_without_names() {
        let component = ComponentFile {
            tweets: vec![tweet("lonely", None, Some("q"), "9"), tweet("q", None, None, "8")],
            users: Vec::new(),
        };

        let thread = ThreadObj::build(&component, Path::new("dir/component_abc.json"));
        assert_eq!(thread.main_thread, ids(&["lonely"]));
        assert_eq!(thread.quotes, ids(&["q"]));
        assert_eq!(thread.base_user, "component_abc");
    }

    #[test]
    fn thread_files_round_trip() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let component_dir = dir.path().join("components");
        let thread_dir = dir.path().join("threads");
        create_dir_all(&component_dir)?;

        let component = ComponentFile {
            tweets: vec![tweet("a", None, None, "1"), tweet("b", Some("a"), None, "1")],
            users: vec![user("1", "alice")],
        };
        let path = component_dir.join("component_1234.json");
        write(&path, serde_json::to_string(&component)?)?;

        assert_eq!(write_threads(&component_dir, &thread_dir)?, 1);
        let thread = ThreadObj::read(thread_dir.join("thread_1234.json"))?;
        assert_eq!(thread.main_thread, ids(&["a", "b"]));
        assert_eq!(thread.component, path);

        Ok(())
    }
}
