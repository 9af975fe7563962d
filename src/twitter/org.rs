// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Org-mode rendering of threads.
//!
//! Every thread becomes one org file with a level 2 heading for the thread
//! itself, followed by its main thread, side conversations, and the links
//! and media referenced anywhere within it:
//!
//! ```org
//! ** Thread: 2018-10-10 20:19:24                                    :rust:
//! *** Main Thread
//! **** @alice
//! :PROPERTIES:
//! :PERMALINK: [[https://twitter.com/alice/status/1][/alice/1]]
//! ...
//! :END:
//! *** Conversations: 1
//! *** Links: 2
//! *** Media: 1
//! ```
//!
//! Media URLs are retargeted to local files under `{user}_files/`, so the
//! org file keeps working once the media has been downloaded next to it.

use crate::{
    path::first_free_path,
    twitter::{
        record::{self, ComponentFile, RecordError, Tweet, User},
        thread::{ThreadError, ThreadObj},
        todo::TodoFile,
    },
};

use indexmap::{IndexMap, IndexSet};
use std::{
    collections::BTreeSet,
    fmt::{Display, Formatter, Result as FmtResult},
    fs::{create_dir_all, write},
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument};

/// Column at which heading tags start.
pub const TAG_COLUMN: usize = 80;

/// Name used for authors that cannot be resolved.
pub const UNKNOWN: &str = "Unknown";

/// Format a heading line, padding tags out to [`TAG_COLUMN`].
pub fn heading_line(level: usize, title: &str, tags: &[String]) -> String {
    let head = format!("{} {}", "*".repeat(level.max(1)), title);
    if tags.is_empty() {
        return head;
    }

    let tags = format!(":{}:", tags.join(":"));
    let width = head.chars().count();
    if width < TAG_COLUMN {
        format!("{head}{}{tags}", " ".repeat(TAG_COLUMN - width))
    } else {
        format!("{head} {tags}")
    }
}

/// Link to a tweet in permalink form.
pub fn permalink(name: &str, id: &str) -> String {
    format!("[[https://twitter.com/{name}/status/{id}][/{name}/{id}]]")
}

/// Link to a local file, relative to the org file.
pub fn file_link(path: &str, name: &str) -> String {
    format!("[[file:./{path}][{name}]]")
}

/// Plain org link.
pub fn link(url: &str) -> String {
    format!("[[{url}]]")
}

/// Escape text so no line starts a heading.
pub fn escape_text(text: &str) -> String {
    let text = text.replace("\n*", "\n-*");
    if text.starts_with('*') {
        format!("-{text}")
    } else {
        text
    }
}

/// Line based builder of org documents.
#[derive(Debug, Default, Clone)]
pub struct OrgBuilder {
    lines: Vec<String>,
}

impl OrgBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn heading(&mut self, level: usize, title: &str, tags: &[String]) -> &mut Self {
        self.lines.push(heading_line(level, title, tags));
        self
    }

    /// Add `:NAME:` drawer holding the given lines.
    pub fn drawer<S: Into<String>>(
        &mut self,
        name: &str,
        lines: impl IntoIterator<Item = S>,
    ) -> &mut Self {
        self.lines.push(format!(":{name}:"));
        self.lines.extend(lines.into_iter().map(Into::into));
        self.lines.push(":END:".into());
        self
    }

    /// Add `PROPERTIES` drawer of `:KEY: value` lines.
    pub fn properties(&mut self, properties: &[(&str, String)]) -> &mut Self {
        self.drawer(
            "PROPERTIES",
            properties
                .iter()
                .map(|(key, value)| format!(":{key}: {value}")),
        )
    }

    pub fn line(&mut self, text: impl Into<String>) -> &mut Self {
        self.lines.push(text.into());
        self
    }

    /// Add one line per URL.
    pub fn links<'a>(&mut self, urls: impl IntoIterator<Item = &'a str>) -> &mut Self {
        self.lines.extend(urls.into_iter().map(link));
        self
    }
}

impl Display for OrgBuilder {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(self.lines.join("\n").as_str())
    }
}

/// Remote media file and where it lives next to the org file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MediaFile {
    /// Remote URL.
    pub url: String,

    /// File name.
    pub name: String,

    /// Path relative to the org file.
    pub local: String,
}

impl MediaFile {
    fn new(url: &str, base_user: &str) -> Self {
        let name = url
            .split(['?', '#'])
            .next()
            .and_then(|path| path.rsplit('/').next())
            .unwrap_or_default()
            .to_string();
        let local = format!("{base_user}_files/{name}");

        Self {
            url: url.to_string(),
            name,
            local,
        }
    }

    /// Org link to the local copy.
    pub fn link(&self) -> String {
        file_link(&self.local, &self.name)
    }
}

/// Rendered org document of one thread.
#[derive(Debug, Clone)]
pub struct OrgThread {
    base_user: String,
    text: String,
    media: Vec<MediaFile>,
    links: Vec<String>,
}

impl OrgThread {
    /// Render a thread from its component's tweets and users.
    ///
    /// Tags come from the todo file entries of the main thread, plus the
    /// hashtags used in it. Tweets missing from `tweets` are rendered as
    /// placeholders.
    pub fn build(
        thread: &ThreadObj,
        tweets: &IndexMap<String, Tweet>,
        users: &IndexMap<String, User>,
        todo: Option<&TodoFile>,
    ) -> Self {
        let mut renderer = Renderer {
            tweets,
            users,
            base_user: thread.base_user.as_str(),
            media: IndexSet::new(),
            links: IndexSet::new(),
        };
        let mut out = OrgBuilder::new();

        let main = thread
            .main_thread
            .iter()
            .filter_map(|id| tweets.get(id))
            .collect::<Vec<_>>();
        let date = main
            .iter()
            .filter_map(|tweet| tweet.created())
            .min()
            .map(|date| date.to_string())
            .unwrap_or_else(|| UNKNOWN.into());

        let mut tags = BTreeSet::new();
        for id in &thread.main_thread {
            if let Some(todo_tags) = todo.and_then(|todo| todo.tags_for(id)) {
                tags.extend(todo_tags.iter().cloned());
            }
        }
        tags.extend(main.iter().flat_map(|tweet| tweet.hashtags()));
        let tags = tags.into_iter().collect::<Vec<_>>();

        out.heading(2, format!("Thread: {date}").as_str(), &tags);
        out.heading(3, "Main Thread", &[]);
        for id in &thread.main_thread {
            renderer.tweet(&mut out, 4, id, false);
        }

        let conversations = thread
            .rest
            .iter()
            .filter(|conversation| !conversation.is_empty())
            .collect::<Vec<_>>();
        out.heading(3, format!("Conversations: {}", conversations.len()).as_str(), &[]);
        for conversation in conversations {
            let name = renderer.author(&conversation[0]);
            out.heading(4, format!("@{name}").as_str(), &[]);
            for id in conversation {
                renderer.tweet(&mut out, 5, id, false);
            }
        }

        out.heading(3, format!("Links: {}", renderer.links.len()).as_str(), &[]);
        out.links(renderer.links.iter().map(String::as_str));

        out.heading(3, format!("Media: {}", renderer.media.len()).as_str(), &[]);
        for media in &renderer.media {
            out.line(media.link());
        }

        Self {
            base_user: thread.base_user.clone(),
            text: out.to_string(),
            media: renderer.media.into_iter().collect(),
            links: renderer.links.into_iter().collect(),
        }
    }

    pub fn base_user(&self) -> &str {
        &self.base_user
    }

    /// Org document text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Media referenced anywhere in the thread.
    pub fn media(&self) -> &[MediaFile] {
        &self.media
    }

    /// Links referenced anywhere in the thread.
    pub fn links(&self) -> &[String] {
        &self.links
    }
}

struct Renderer<'a> {
    tweets: &'a IndexMap<String, Tweet>,
    users: &'a IndexMap<String, User>,
    base_user: &'a str,
    media: IndexSet<MediaFile>,
    links: IndexSet<String>,
}

impl Renderer<'_> {
    fn author(&self, id: &str) -> String {
        self.tweets
            .get(id)
            .and_then(|tweet| tweet.author_name(self.users))
            .unwrap_or(UNKNOWN)
            .to_string()
    }

    fn tweet(&mut self, out: &mut OrgBuilder, level: usize, id: &str, is_quote: bool) {
        let placeholder = Tweet {
            id_str: "null".into(),
            ..Tweet::default()
        };
        let tweet = match self.tweets.get(id) {
            Some(tweet) => tweet,
            None => {
                debug!("render placeholder for missing tweet {id}");
                &placeholder
            }
        };
        self.render(out, level, tweet, is_quote);
    }

    fn render(&mut self, out: &mut OrgBuilder, level: usize, tweet: &Tweet, is_quote: bool) {
        let name = tweet.author_name(self.users).unwrap_or(UNKNOWN);
        let title = if is_quote {
            format!("Quote: @{name}")
        } else {
            format!("@{name}")
        };
        out.heading(level, title.as_str(), &tweet.hashtags());

        let quoted = tweet.quoted_id().and_then(|id| {
            self.tweets
                .get(id)
                .or_else(|| tweet.quoted_status.as_deref())
        });

        let mut properties = vec![("PERMALINK", permalink(name, &tweet.id_str))];
        let reply_name = tweet
            .in_reply_to_screen_name
            .as_deref()
            .filter(|name| !name.is_empty());
        if let (Some(reply_name), Some(reply_id)) = (reply_name, tweet.reply_to()) {
            properties.push(("REPLY_TO", permalink(reply_name, reply_id)));
        }
        if let Some(quoted_id) = tweet.quoted_id() {
            let quoted_name = quoted
                .and_then(|quoted| quoted.author_name(self.users))
                .unwrap_or(UNKNOWN);
            properties.push(("QUOTE", permalink(quoted_name, quoted_id)));
        }
        properties.push((
            "FAVOURITE_COUNT",
            tweet.favorite_count.unwrap_or_default().to_string(),
        ));
        properties.push((
            "RETWEET_COUNT",
            tweet.retweet_count.unwrap_or_default().to_string(),
        ));
        if let Some(date) = tweet.created() {
            properties.push(("DATE", date.to_string()));
        }
        if is_quote {
            properties.push(("IS_QUOTE", "t".into()));
        }
        out.properties(&properties);

        let text = tweet.text();
        if !text.is_empty() {
            out.line(escape_text(text));
        }

        let media = tweet
            .media()
            .flat_map(|media| media.urls())
            .map(|url| MediaFile::new(&url, self.base_user))
            .collect::<IndexSet<_>>();
        if !media.is_empty() {
            out.drawer("MEDIA", media.iter().map(MediaFile::link));
            self.media.extend(media);
        }

        let links = tweet.links();
        if !links.is_empty() {
            out.drawer("LINKS", links.iter().map(|url| link(url)));
            self.links.extend(links);
        }

        // INVARIANT: Quotes nest one level only.
        if let (Some(quoted), false) = (quoted, is_quote) {
            self.render(out, level + 1, quoted, true);
        }
    }
}

/// Outcome of [`write_orgs`].
#[derive(Debug, Default, Clone)]
pub struct OrgReport {
    /// Org files written.
    pub written: Vec<PathBuf>,

    /// Media to fetch, with the absolute path each one should be saved to.
    pub media: Vec<(String, PathBuf)>,
}

/// Render every thread file as an org file.
///
/// Files are named `{base_user}_thread_{n}.org` with the smallest free `n`.
///
/// # Errors
///
/// - Return [`OrgError`] if any thread or component cannot be read, or any
///   org file cannot be written.
#[instrument(skip_all, level = "debug")]
pub fn write_orgs(thread_dir: &Path, org_dir: &Path, todo: Option<&TodoFile>) -> Result<OrgReport> {
    create_dir_all(org_dir).map_err(|err| OrgError::Write {
        source: err,
        path: org_dir.to_path_buf(),
    })?;

    let mut report = OrgReport::default();
    let threads = record::json_files(thread_dir, "thread_")?;
    info!("rendering {} threads", threads.len());
    for path in threads {
        let thread = ThreadObj::read(&path)?;
        let component = ComponentFile::read(&thread.component)?;
        let org = OrgThread::build(&thread, &component.tweet_map(), &component.user_map(), todo);

        let target = first_free_path(org_dir, format!("{}_thread", org.base_user()).as_str(), "org");
        write(&target, org.text()).map_err(|err| OrgError::Write {
            source: err,
            path: target.clone(),
        })?;
        debug!("wrote {}", target.display());

        report.media.extend(
            org.media()
                .iter()
                .map(|media| (media.url.clone(), org_dir.join(&media.local))),
        );
        report.written.push(target);
    }

    Ok(report)
}

/// Org rendering error types.
#[derive(Debug, thiserror::Error)]
pub enum OrgError {
    /// Org file cannot be written.
    #[error("failed to write org file {:?}", path.display())]
    Write {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Thread file cannot be read.
    #[error(transparent)]
    Thread(#[from] ThreadError),

    /// Component file cannot be read.
    #[error(transparent)]
    Record(#[from] RecordError),
}

/// Friendly result alias :3
pub type Result<T, E = OrgError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use std::fs::read_to_string;

    fn component() -> anyhow::Result<ComponentFile> {
        Ok(serde_json::from_str(indoc! {r#"
            {
                "tweets": [
                    {
                        "id_str": "1",
                        "user": {"id_str": "10"},
                        "created_at": "Wed Oct 10 20:19:24 +0000 2018",
                        "full_text": "first\n* not a heading",
                        "favorite_count": 3,
                        "retweet_count": 1,
                        "entities": {
                            "hashtags": [{"text": "rust"}],
                            "urls": [{"url": "https://t.co/x", "expanded_url": "https://example.org/post"}],
                            "media": [{"type": "photo", "media_url_https": "https://pbs.twimg.com/media/pic.jpg"}]
                        },
                        "extended_entities": {
                            "media": [{"type": "photo", "media_url_https": "https://pbs.twimg.com/media/pic.jpg"}]
                        }
                    },
                    {
                        "id_str": "2",
                        "user": {"id_str": "10"},
                        "created_at": "Wed Oct 10 20:25:00 +0000 2018",
                        "full_text": "second",
                        "in_reply_to_status_id_str": "1",
                        "in_reply_to_screen_name": "alice",
                        "quoted_status_id_str": "9"
                    },
                    {
                        "id_str": "3",
                        "user": {"id_str": "20"},
                        "full_text": "side note",
                        "in_reply_to_status_id_str": "1"
                    },
                    {
                        "id_str": "9",
                        "user": {"id_str": "20"},
                        "full_text": "quoted"
                    }
                ],
                "users": [
                    {"id_str": "10", "screen_name": "alice"},
                    {"id_str": "20", "screen_name": "bob"}
                ]
            }
        "#})?)
    }

    #[test]
    fn heading_tags_start_at_column() {
        let result = heading_line(2, "Thread: Unknown", &["a".into(), "b".into()]);
        assert_eq!(result.find(":a:b:"), Some(TAG_COLUMN));
        assert!(result.starts_with("** Thread: Unknown "));

        let long = "x".repeat(100);
        let result = heading_line(1, &long, &["a".into()]);
        assert!(result.ends_with(&format!("{long} :a:")));

        assert_eq!(heading_line(3, "Main Thread", &[]), "*** Main Thread");
    }

    #[test]
    fn escape_leading_stars() {
        assert_eq!(escape_text("* top\nok\n** deep"), "-* top\nok\n-** deep");
        assert_eq!(escape_text("a * b"), "a * b");
    }

    #[test]
    fn builder_drawers() {
        let mut out = OrgBuilder::new();
        out.heading(1, "Title", &[])
            .properties(&[("KEY", "value".into())])
            .drawer("MEDIA", [file_link("alice_files/a.jpg", "a.jpg")])
            .line("text");

        let expect = indoc! {r#"
            * Title
            :PROPERTIES:
            :KEY: value
            :END:
            :MEDIA:
            [[file:./alice_files/a.jpg][a.jpg]]
            :END:
            text"#};
        assert_eq!(out.to_string(), expect);
    }

    #[test]
    fn render_thread() -> anyhow::Result<()> {
        let component = component()?;
        let thread = ThreadObj {
            main_thread: vec!["1".into(), "2".into()],
            rest: vec![vec!["3".into()], Vec::new()],
            quotes: vec!["9".into()],
            component: PathBuf::from("component_x.json"),
            base_user: "alice".into(),
        };
        let todo = TodoFile::from("https://twitter.com/alice/status/1 : archive");

        let org = OrgThread::build(
            &thread,
            &component.tweet_map(),
            &component.user_map(),
            Some(&todo),
        );
        let text = org.text();
        let lines = text.lines().collect::<Vec<_>>();

        assert!(lines[0].starts_with("** Thread: 2018-10-10 20:19:24 "));
        assert!(lines[0].ends_with(":archive:rust:"));
        assert_eq!(lines[1], "*** Main Thread");
        assert!(lines[2].starts_with("**** @alice "));
        assert!(text.contains(":PERMALINK: [[https://twitter.com/alice/status/1][/alice/1]]"));
        assert!(text.contains(":FAVOURITE_COUNT: 3"));
        assert!(text.contains(":DATE: 2018-10-10 20:19:24"));
        assert!(text.contains("first\n-* not a heading"));
        assert!(text.contains(":REPLY_TO: [[https://twitter.com/alice/status/1][/alice/1]]"));
        assert!(text.contains(":QUOTE: [[https://twitter.com/bob/status/9][/bob/9]]"));
        assert!(text.contains("***** Quote: @bob\n:PROPERTIES:"));
        assert!(text.contains(":IS_QUOTE: t"));
        assert!(text.contains("*** Conversations: 1\n**** @bob\n***** @bob"));
        assert!(text.contains("*** Links: 1\n[[https://example.org/post]]"));
        assert!(text.contains("*** Media: 1\n[[file:./alice_files/pic.jpg][pic.jpg]]"));

        assert_eq!(
            org.media(),
            &[MediaFile {
                url: "https://pbs.twimg.com/media/pic.jpg".into(),
                name: "pic.jpg".into(),
                local: "alice_files/pic.jpg".into(),
            }]
        );

        Ok(())
    }

    #[test]
    fn missing_tweet_renders_placeholder() {
        let thread = ThreadObj {
            main_thread: vec!["404".into()],
            base_user: "ghost".into(),
            ..ThreadObj::default()
        };

        let org = OrgThread::build(&thread, &IndexMap::new(), &IndexMap::new(), None);
        let text = org.text();
        assert!(text.starts_with("** Thread: Unknown\n*** Main Thread\n**** @Unknown"));
        assert!(text.contains(":PERMALINK: [[https://twitter.com/Unknown/status/null][/Unknown/null]]"));
        assert!(!text.contains(":DATE:"));
    }

    #[test]
    fn write_orgs_picks_free_names() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let thread_dir = dir.path().join("threads");
        let org_dir = dir.path().join("orgs");
        create_dir_all(&thread_dir)?;

        let component_path = dir.path().join("component_x.json");
        write(&component_path, serde_json::to_string(&component()?)?)?;
        for name in ["thread_a.json", "thread_b.json"] {
            let thread = ThreadObj {
                main_thread: vec!["1".into()],
                component: component_path.clone(),
                base_user: "alice".into(),
                ..ThreadObj::default()
            };
            thread.write(thread_dir.join(name))?;
        }

        let report = write_orgs(&thread_dir, &org_dir, None)?;
        assert_eq!(
            report.written,
            vec![org_dir.join("alice_thread_0.org"), org_dir.join("alice_thread_1.org")]
        );
        assert_eq!(
            report.media[0],
            (
                "https://pbs.twimg.com/media/pic.jpg".to_string(),
                org_dir.join("alice_files/pic.jpg")
            )
        );
        assert!(read_to_string(&report.written[0])?.contains("@alice"));

        Ok(())
    }
}
