// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Tweet graph.
//!
//! Every tweet is a node keyed by its id. A reply adds an edge from the
//! replied tweet to the reply, and a quote adds an edge from the quoting
//! tweet to the quoted one. Tweets that were referenced but never
//! downloaded still get a node, just without a source file.
//!
//! All node and edge storage keeps insertion order, so every traversal
//! below is deterministic for a given order of input files.
//!
//! # See Also
//!
//! 1. [`component`](crate::twitter::component) for partitioning on disk.
//! 2. [`thread`](crate::twitter::thread) for main thread detection.

use crate::twitter::record::{self, QuoteRef, ReplyRef, Tweet, TweetKind};

use indexmap::{IndexMap, IndexSet};
use std::{
    collections::VecDeque,
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument};

/// Connected set of tweet ids.
pub type Component = IndexSet<String>;

/// Kind of relationship between two tweets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    Reply,
    Quote,
}

/// Attributes of a tweet node.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NodeData {
    /// Id of the author, if known.
    pub user: Option<String>,

    /// Batch file the tweet was read from, if it was downloaded.
    pub source_file: Option<PathBuf>,
}

/// Directed graph of tweets.
#[derive(Debug, Default, Clone)]
pub struct TwitterGraph {
    nodes: IndexMap<String, NodeData>,
    successors: IndexMap<String, IndexMap<String, EdgeKind>>,
    predecessors: IndexMap<String, IndexMap<String, EdgeKind>>,
}

impl TwitterGraph {
    /// Construct new empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build graph from every tweet in a set of batch files.
    ///
    /// # Errors
    ///
    /// - Return [`GraphError::Record`] if any batch file cannot be read.
    #[instrument(skip(files), level = "debug")]
    pub fn from_files(files: impl IntoIterator<Item = impl AsRef<Path>>) -> Result<Self> {
        let mut graph = Self::new();
        for file in files {
            let tweets = record::read_tweets(file.as_ref())?;
            debug!("add {} tweets from {}", tweets.len(), file.as_ref().display());
            for tweet in &tweets {
                graph.add_tweet(tweet, file.as_ref());
            }
        }
        info!(
            "graph has {} tweets and {} edges",
            graph.node_count(),
            graph.edge_count()
        );

        Ok(graph)
    }

    /// Build graph from tweets that all came from one file.
    pub fn from_tweets<'a>(tweets: impl IntoIterator<Item = &'a Tweet>, source: &Path) -> Self {
        let mut graph = Self::new();
        for tweet in tweets {
            graph.add_tweet(tweet, source);
        }

        graph
    }

    /// Add a tweet and the tweets it references.
    ///
    /// Does nothing for a tweet without an id. Adding the same tweet twice
    /// leaves the graph unchanged.
    pub fn add_tweet(&mut self, tweet: &Tweet, source: &Path) {
        if tweet.id_str.is_empty() {
            return;
        }

        let id = tweet.id_str.as_str();
        self.add_node(
            id,
            NodeData {
                user: tweet.user_id().map(str::to_string),
                source_file: Some(source.to_path_buf()),
            },
        );

        match tweet.kind() {
            TweetKind::Root => {}
            TweetKind::Reply(reply) => self.add_reply(id, reply),
            TweetKind::Quote(quote) => self.add_quote(id, quote),
            TweetKind::ReplyQuote(reply, quote) => {
                self.add_reply(id, reply);
                self.add_quote(id, quote);
            }
        }
    }

    fn add_reply(&mut self, id: &str, reply: ReplyRef<'_>) {
        self.add_node(
            reply.parent,
            NodeData {
                user: reply.user.map(str::to_string),
                source_file: None,
            },
        );
        self.add_edge(reply.parent, id, EdgeKind::Reply);
    }

    fn add_quote(&mut self, id: &str, quote: QuoteRef<'_>) {
        self.add_node(
            quote.quoted,
            NodeData {
                user: quote.user.map(str::to_string),
                source_file: None,
            },
        );
        self.add_edge(id, quote.quoted, EdgeKind::Quote);
    }

    /// Insert node, or update attributes of an existing one.
    ///
    /// Attributes that are `None` in `data` never erase known values.
    pub fn add_node(&mut self, id: &str, data: NodeData) {
        let node = self.nodes.entry(id.to_string()).or_default();
        if data.user.is_some() {
            node.user = data.user;
        }
        if data.source_file.is_some() {
            node.source_file = data.source_file;
        }
    }

    /// Insert edge, or retype an existing one.
    pub fn add_edge(&mut self, from: &str, to: &str, kind: EdgeKind) {
        self.nodes.entry(from.to_string()).or_default();
        self.nodes.entry(to.to_string()).or_default();
        self.successors
            .entry(from.to_string())
            .or_default()
            .insert(to.to_string(), kind);
        self.predecessors
            .entry(to.to_string())
            .or_default()
            .insert(from.to_string(), kind);
    }

    pub fn node(&self, id: &str) -> Option<&NodeData> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn edge(&self, from: &str, to: &str) -> Option<EdgeKind> {
        self.successors
            .get(from)
            .and_then(|targets| targets.get(to))
            .copied()
    }

    /// Iterate over node ids in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.successors.values().map(IndexMap::len).sum()
    }

    /// Targets of edges of a given kind leaving `id`.
    pub fn successors(&self, id: &str, kind: EdgeKind) -> impl Iterator<Item = &str> {
        neighbours(self.successors.get(id), kind)
    }

    /// Sources of edges of a given kind entering `id`.
    pub fn predecessors(&self, id: &str, kind: EdgeKind) -> impl Iterator<Item = &str> {
        neighbours(self.predecessors.get(id), kind)
    }

    fn touches_reply(&self, id: &str) -> bool {
        self.successors(id, EdgeKind::Reply).next().is_some()
            || self.predecessors(id, EdgeKind::Reply).next().is_some()
    }

    /// Partition the reply graph into connected components.
    ///
    /// Replies are treated as undirected. Each component is then extended
    /// with every tweet reachable through quotes that no reply component
    /// owns, so a quote-only tweet may show up in more than one component. The second value holds every
    /// node that ended up in no component.
    pub fn components(&self) -> (Vec<Component>, IndexSet<String>) {
        let mut visited: IndexSet<&str> = IndexSet::new();
        let mut components = Vec::new();

        for start in self.nodes() {
            if visited.contains(start) || !self.touches_reply(start) {
                continue;
            }

            let mut component = Component::new();
            let mut queue = VecDeque::from([start]);
            visited.insert(start);
            while let Some(current) = queue.pop_front() {
                component.insert(current.to_string());
                let neighbours = self
                    .successors(current, EdgeKind::Reply)
                    .chain(self.predecessors(current, EdgeKind::Reply));
                for next in neighbours {
                    if visited.insert(next) {
                        queue.push_back(next);
                    }
                }
            }

            components.push(component);
        }

        // INVARIANT: Reply nodes belong to the component that discovered them.
        let owned: IndexSet<String> = components.iter().flatten().cloned().collect();
        for component in &mut components {
            let quotes = self.get_quotes(&component.iter().collect::<Vec<_>>());
            component.extend(quotes.into_iter().filter(|id| !owned.contains(id)));
        }

        let rest = self
            .nodes()
            .filter(|id| !components.iter().any(|component| component.contains(*id)))
            .map(str::to_string)
            .collect();

        debug!("found {} reply components", components.len());
        (components, rest)
    }

    /// Turn leftover tweets into single tweet components.
    ///
    /// Tweets quoted by another leftover tweet are folded into the quoting
    /// tweet's component instead of standing alone.
    pub fn standalone_components(&self, rest: &IndexSet<String>) -> Vec<Component> {
        rest.iter()
            .filter(|id| {
                !self
                    .get_quoters(id)
                    .iter()
                    .any(|quoter| rest.contains(quoter.as_str()))
            })
            .map(|id| {
                let mut component = Component::from([id.clone()]);
                component.extend(self.get_quotes(&[id.as_str()]));
                component
            })
            .collect()
    }

    /// Collect tweets reachable through quote edges.
    ///
    /// With no starting ids, every quoted tweet of the graph is returned.
    pub fn get_quotes<S: AsRef<str>>(&self, ids: &[S]) -> IndexSet<String> {
        if ids.is_empty() {
            return self
                .successors
                .values()
                .flat_map(|targets| targets.iter())
                .filter(|(_, kind)| **kind == EdgeKind::Quote)
                .map(|(target, _)| target.clone())
                .collect();
        }

        let mut found = IndexSet::new();
        let mut visited: IndexSet<&str> = ids.iter().map(AsRef::as_ref).collect();
        let mut queue: VecDeque<&str> = ids.iter().map(AsRef::as_ref).collect();
        while let Some(current) = queue.pop_front() {
            for quoted in self.successors(current, EdgeKind::Quote) {
                found.insert(quoted.to_string());
                if visited.insert(quoted) {
                    queue.push_back(quoted);
                }
            }
        }

        found
    }

    /// Tweets that quote `id`.
    pub fn get_quoters(&self, id: &str) -> Vec<String> {
        self.predecessors(id, EdgeKind::Quote)
            .map(str::to_string)
            .collect()
    }

    /// Tweets that start a reply chain.
    pub fn roots(&self) -> Vec<String> {
        self.nodes()
            .filter(|id| self.touches_reply(id))
            .filter(|id| self.predecessors(id, EdgeKind::Reply).next().is_none())
            .map(str::to_string)
            .collect()
    }

    /// Enumerate reply chains by depth-first search from each root.
    ///
    /// A chain is emitted every time the search backtracks from a tweet that
    /// discovered nothing new, so every chain is a root-to-leaf path through
    /// reply edges. Tweets are discovered once across all roots. The second
    /// value holds every reply tweet no root reached.
    pub fn reply_chains<S: AsRef<str>>(&self, roots: &[S]) -> (Vec<Vec<String>>, Vec<String>) {
        let mut discovered: IndexSet<&str> = IndexSet::new();
        let mut chains = Vec::new();

        for root in roots {
            let root: &str = root.as_ref();
            let Some(root) = self.nodes.get_key_value(root).map(|(key, _)| key.as_str()) else {
                continue;
            };
            if !discovered.insert(root) {
                continue;
            }

            // INVARIANT: Stack holds the path from root to current tweet.
            let mut stack: Vec<Frame<'_>> = vec![Frame::new(root)];
            while let Some(frame) = stack.last_mut() {
                let next = self
                    .successors(frame.id, EdgeKind::Reply)
                    .skip(frame.next_child)
                    .enumerate()
                    .find(|(_, child)| !discovered.contains(child));

                match next {
                    Some((offset, child)) => {
                        frame.next_child += offset + 1;
                        frame.found_new = true;
                        discovered.insert(child);
                        stack.push(Frame::new(child));
                    }
                    None => {
                        if !frame.found_new {
                            chains.push(stack.iter().map(|frame| frame.id.to_string()).collect());
                        }
                        stack.pop();
                    }
                }
            }
        }

        let remaining = self
            .nodes()
            .filter(|id| self.touches_reply(id) && !discovered.contains(id))
            .map(str::to_string)
            .collect();

        (chains, remaining)
    }
}

struct Frame<'a> {
    id: &'a str,
    next_child: usize,
    found_new: bool,
}

impl<'a> Frame<'a> {
    fn new(id: &'a str) -> Self {
        Self {
            id,
            next_child: 0,
            found_new: false,
        }
    }
}

fn neighbours(
    edges: Option<&IndexMap<String, EdgeKind>>,
    kind: EdgeKind,
) -> impl Iterator<Item = &str> {
    edges
        .into_iter()
        .flat_map(|edges| edges.iter())
        .filter(move |(_, edge)| **edge == kind)
        .map(|(id, _)| id.as_str())
}

/// Graph error types.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// Tweets cannot be loaded into the graph.
    #[error(transparent)]
    Record(#[from] record::RecordError),
}

/// Friendly result alias :3
pub type Result<T, E = GraphError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn tweet(id: &str, reply_to: Option<&str>, quote: Option<&str>) -> Tweet {
        Tweet {
            id_str: id.into(),
            in_reply_to_status_id_str: reply_to.map(Into::into),
            quoted_status_id_str: quote.map(Into::into),
            ..Tweet::default()
        }
    }

    fn graph(tweets: &[Tweet]) -> TwitterGraph {
        TwitterGraph::from_tweets(tweets, Path::new("batch.json"))
    }

    fn ids(items: &[&str]) -> Vec<String> {
        items.iter().map(|id| id.to_string()).collect()
    }

    #[test]
    fn add_tweet_is_idempotent() {
        let tweets = [
            tweet("a", None, None),
            tweet("b", Some("a"), Some("q")),
            tweet("c", Some("b"), None),
        ];
        let mut graph = graph(&tweets);
        let nodes = graph.nodes().map(str::to_string).collect::<Vec<_>>();
        let edges = graph.edge_count();

        for tweet in &tweets {
            graph.add_tweet(tweet, Path::new("batch.json"));
        }

        assert_eq!(graph.nodes().map(str::to_string).collect::<Vec<_>>(), nodes);
        assert_eq!(graph.edge_count(), edges);
        assert_eq!(graph.edge("a", "b"), Some(EdgeKind::Reply));
        assert_eq!(graph.edge("b", "q"), Some(EdgeKind::Quote));
    }

    #[test]
    fn referenced_tweets_get_nodes_without_source() {
        let mut reply = tweet("b", Some("a"), None);
        reply.in_reply_to_user_id_str = Some("10".into());
        let graph = graph(&[reply, tweet("c", None, None)]);

        let parent = graph.node("a").unwrap();
        assert_eq!(parent.user.as_deref(), Some("10"));
        assert_eq!(parent.source_file, None);
        assert_eq!(
            graph.node("b").unwrap().source_file.as_deref(),
            Some(Path::new("batch.json"))
        );

        let mut graph = graph;
        graph.add_tweet(&Tweet::default(), Path::new("other.json"));
        assert_eq!(graph.node_count(), 3);
    }

    #[test]
    fn reply_chain_with_quote() {
        // a -> b -> c, c quotes d
        let graph = graph(&[
            tweet("a", None, None),
            tweet("b", Some("a"), None),
            tweet("c", Some("b"), Some("d")),
        ]);

        let (components, rest) = graph.components();
        assert_eq!(components.len(), 1);
        assert_eq!(
            components[0].iter().cloned().collect::<Vec<_>>(),
            ids(&["a", "b", "c", "d"])
        );
        assert!(rest.is_empty());

        let roots = graph.roots();
        assert_eq!(roots, ids(&["a"]));
        let (chains, remaining) = graph.reply_chains(&roots);
        assert_eq!(chains, vec![ids(&["a", "b", "c"])]);
        assert!(remaining.is_empty());
    }

    #[test]
    fn components_partition_reply_nodes() {
        let graph = graph(&[
            tweet("a", None, None),
            tweet("b", Some("a"), None),
            tweet("x", None, None),
            tweet("y", Some("x"), Some("w")),
            tweet("lonely", None, Some("q")),
            tweet("z", Some("y"), None),
            tweet("w", None, None),
        ]);

        let (components, rest) = graph.components();
        assert_eq!(components.len(), 2);

        for id in graph.nodes().filter(|id| graph.touches_reply(id)) {
            let owners = components
                .iter()
                .filter(|component| component.contains(id))
                .count();
            assert_eq!(owners, 1, "{id} must be in exactly one component");
            assert!(!rest.contains(id));
        }

        assert_eq!(
            components[1].iter().cloned().collect::<Vec<_>>(),
            ids(&["x", "y", "z", "w"])
        );
        assert_eq!(
            rest.iter().cloned().collect::<Vec<_>>(),
            ids(&["lonely", "q"])
        );

        let standalone = graph.standalone_components(&rest);
        assert_eq!(standalone.len(), 1);
        assert_eq!(
            standalone[0].iter().cloned().collect::<Vec<_>>(),
            ids(&["lonely", "q"])
        );
    }

    #[test]
    fn quoted_reply_node_keeps_its_own_component() {
        // a -> b, x -> y, y quotes a
        let graph = graph(&[
            tweet("a", None, None),
            tweet("b", Some("a"), None),
            tweet("x", None, None),
            tweet("y", Some("x"), Some("a")),
        ]);

        let (components, rest) = graph.components();
        assert_eq!(
            components
                .iter()
                .map(|component| component.iter().cloned().collect::<Vec<_>>())
                .collect::<Vec<_>>(),
            vec![ids(&["a", "b"]), ids(&["x", "y"])]
        );
        assert!(rest.is_empty());
        assert_eq!(graph.edge("y", "a"), Some(EdgeKind::Quote));
    }

    #[test]
    fn quoted_tweet_can_join_several_components() {
        let graph = graph(&[
            tweet("a", None, None),
            tweet("b", Some("a"), Some("shared")),
            tweet("x", None, None),
            tweet("y", Some("x"), Some("shared")),
        ]);

        let (components, rest) = graph.components();
        assert_eq!(components.len(), 2);
        assert!(components.iter().all(|component| component.contains("shared")));
        assert!(rest.is_empty());
    }

    #[test]
    fn chains_are_reply_paths() {
        let graph = graph(&[
            tweet("a", None, None),
            tweet("b", Some("a"), None),
            tweet("c", Some("b"), None),
            tweet("d", Some("b"), None),
            tweet("e", Some("a"), None),
            tweet("f", Some("e"), None),
        ]);

        let (chains, _) = graph.reply_chains(&graph.roots());
        assert_eq!(
            chains,
            vec![ids(&["a", "b", "c"]), ids(&["a", "b", "d"]), ids(&["a", "e", "f"])]
        );

        for chain in &chains {
            for pair in chain.windows(2) {
                assert_eq!(graph.edge(&pair[0], &pair[1]), Some(EdgeKind::Reply));
            }
        }
    }

    #[test]
    fn unreached_reply_nodes_are_remaining() {
        let graph = graph(&[
            tweet("a", None, None),
            tweet("b", Some("a"), None),
            tweet("y", Some("x"), None),
        ]);

        let (chains, remaining) = graph.reply_chains(&["a"]);
        assert_eq!(chains, vec![ids(&["a", "b"])]);
        assert_eq!(remaining, ids(&["y", "x"]));
    }

    #[test]
    fn get_quotes_follows_quote_chains() {
        let graph = graph(&[
            tweet("a", None, Some("b")),
            tweet("b", None, Some("c")),
            tweet("c", None, Some("a")),
            tweet("r", Some("a"), Some("z")),
        ]);

        let result = graph.get_quotes(&["a"]);
        assert_eq!(result.into_iter().collect::<Vec<_>>(), ids(&["b", "c", "a"]));

        let result = graph.get_quotes::<&str>(&[]);
        assert_eq!(result.into_iter().collect::<Vec<_>>(), ids(&["b", "c", "a", "z"]));

        assert_eq!(graph.get_quoters("a"), ids(&["c"]));
    }
}
