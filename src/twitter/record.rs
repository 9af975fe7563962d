// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Tweet and user records.
//!
//! Records are validated once, when they are read from disk, and are passed
//! around as typed values from then on. Only the fields the pipeline looks
//! at are named. Everything else the API returned is kept in an `extra` map
//! so that writing a record back out loses nothing but explicit nulls.
//!
//! # File Layouts
//!
//! - __Tweet batch__: JSON array of tweets.
//! - __User batch__: JSON object mapping user id to user.
//! - __Component__: JSON object `{"tweets": [...], "users": [...]}`.

use chrono::NaiveDateTime;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::{
    fs::read_to_string,
    path::{Path, PathBuf},
};
use tracing::{instrument, warn};

/// Layout of `created_at` timestamps.
pub const DATE_FORMAT: &str = "%a %b %d %H:%M:%S +0000 %Y";

/// A single tweet.
#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize)]
pub struct Tweet {
    #[serde(default)]
    pub id_str: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_reply_to_status_id_str: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_reply_to_user_id_str: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_reply_to_screen_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quoted_status_id_str: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quoted_status: Option<Box<Tweet>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entities: Option<Entities>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extended_entities: Option<Entities>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_text: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favorite_count: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retweet_count: Option<u64>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Tweet {
    /// Determine what kind of tweet this is from its reply and quote fields.
    pub fn kind(&self) -> TweetKind<'_> {
        let reply = non_empty(&self.in_reply_to_status_id_str).map(|parent| ReplyRef {
            parent,
            user: non_empty(&self.in_reply_to_user_id_str),
        });

        let quote = self.quoted_id().map(|quoted| QuoteRef {
            quoted,
            user: self.quoted_status.as_ref().and_then(|quoted| quoted.user_id()),
        });

        match (reply, quote) {
            (None, None) => TweetKind::Root,
            (Some(reply), None) => TweetKind::Reply(reply),
            (None, Some(quote)) => TweetKind::Quote(quote),
            (Some(reply), Some(quote)) => TweetKind::ReplyQuote(reply, quote),
        }
    }

    /// Id of the tweet this one replies to.
    pub fn reply_to(&self) -> Option<&str> {
        non_empty(&self.in_reply_to_status_id_str)
    }

    /// Id of the tweet this one quotes.
    pub fn quoted_id(&self) -> Option<&str> {
        non_empty(&self.quoted_status_id_str).or_else(|| {
            self.quoted_status
                .as_ref()
                .map(|quoted| quoted.id_str.as_str())
                .filter(|id| !id.is_empty())
        })
    }

    /// Id of the author.
    pub fn user_id(&self) -> Option<&str> {
        self.user
            .as_ref()
            .map(|user| user.id_str.as_str())
            .filter(|id| !id.is_empty())
    }

    /// Screen name of the author, if the record is not trimmed.
    pub fn screen_name(&self) -> Option<&str> {
        self.user.as_ref().and_then(|user| non_empty(&user.screen_name))
    }

    /// Screen name of the author, looked up in `users` for trimmed records.
    pub fn author_name<'a>(&'a self, users: &'a IndexMap<String, User>) -> Option<&'a str> {
        self.screen_name().or_else(|| {
            self.user_id()
                .and_then(|id| users.get(id))
                .and_then(|user| non_empty(&user.screen_name))
        })
    }

    /// Tweet text, falling back to the truncated `text` field.
    pub fn text(&self) -> &str {
        self.full_text
            .as_deref()
            .or_else(|| self.extra.get("text").and_then(Value::as_str))
            .unwrap_or_default()
    }

    /// Parse `created_at` timestamp.
    pub fn created(&self) -> Option<NaiveDateTime> {
        self.created_at
            .as_deref()
            .and_then(|date| NaiveDateTime::parse_from_str(date, DATE_FORMAT).ok())
    }

    /// Hashtags of the tweet, in order of appearance.
    pub fn hashtags(&self) -> Vec<String> {
        self.entities
            .iter()
            .flat_map(|entities| entities.hashtags.iter())
            .map(|hashtag| hashtag.text.clone())
            .filter(|text| !text.is_empty())
            .collect()
    }

    /// Expanded URLs linked from the tweet.
    pub fn links(&self) -> Vec<String> {
        self.entities
            .iter()
            .flat_map(|entities| entities.urls.iter())
            .filter_map(|link| link.expanded_url.clone().or_else(|| link.url.clone()))
            .collect()
    }

    /// Every media entry of the tweet, standard entities first.
    pub fn media(&self) -> impl Iterator<Item = &Media> {
        self.entities
            .iter()
            .chain(self.extended_entities.iter())
            .flat_map(|entities| entities.media.iter())
    }
}

fn non_empty(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|value| !value.is_empty())
}

/// Shape of a tweet with respect to the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TweetKind<'a> {
    /// Neither a reply nor a quote.
    Root,

    /// Reply to another tweet.
    Reply(ReplyRef<'a>),

    /// Quote of another tweet.
    Quote(QuoteRef<'a>),

    /// Reply that also quotes.
    ReplyQuote(ReplyRef<'a>, QuoteRef<'a>),
}

/// Reference to a replied tweet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyRef<'a> {
    pub parent: &'a str,
    pub user: Option<&'a str>,
}

/// Reference to a quoted tweet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuoteRef<'a> {
    pub quoted: &'a str,
    pub user: Option<&'a str>,
}

/// A Twitter user.
#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize)]
pub struct User {
    #[serde(default)]
    pub id_str: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screen_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub followers_count: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Entities attached to a tweet.
#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize)]
pub struct Entities {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hashtags: Vec<Hashtag>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub urls: Vec<UrlEntity>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub media: Vec<Media>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize)]
pub struct Hashtag {
    #[serde(default)]
    pub text: String,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize)]
pub struct UrlEntity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expanded_url: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Photo, video, or animated GIF attached to a tweet.
#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize)]
pub struct Media {
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_url_https: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_info: Option<VideoInfo>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Media {
    /// URLs to fetch for this media entry.
    ///
    /// Always the still image, plus the highest bitrate mp4 variant for
    /// videos, with its query string removed.
    pub fn urls(&self) -> Vec<String> {
        let mut urls = Vec::new();
        if let Some(url) = self.media_url_https.as_ref().or(self.media_url.as_ref()) {
            urls.push(url.clone());
        }

        let best = self
            .video_info
            .iter()
            .flat_map(|info| info.variants.iter())
            .filter(|variant| variant.content_type.as_deref() == Some("video/mp4"))
            .max_by_key(|variant| variant.bitrate.unwrap_or_default());
        if let Some(variant) = best {
            let url = match variant.url.split_once('?') {
                Some((base, _)) => base,
                None => variant.url.as_str(),
            };
            urls.push(url.to_string());
        }

        urls
    }
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize)]
pub struct VideoInfo {
    #[serde(default)]
    pub variants: Vec<VideoVariant>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize)]
pub struct VideoVariant {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bitrate: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,

    #[serde(default)]
    pub url: String,
}

/// Tweets and users of one component.
#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize)]
pub struct ComponentFile {
    #[serde(default)]
    pub tweets: Vec<Tweet>,

    #[serde(default)]
    pub users: Vec<User>,
}

impl ComponentFile {
    /// Read component file at target path.
    ///
    /// # Errors
    ///
    /// - Return [`RecordError::Read`] if file cannot be read.
    /// - Return [`RecordError::Parse`] if file is not a valid component.
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let content = read_file(path.as_ref())?;
        let mut component: Self = serde_json::from_str(&content).map_err(|err| RecordError::Parse {
            source: err,
            path: path.as_ref().to_path_buf(),
        })?;
        component.tweets.retain(|tweet| has_id(tweet, path.as_ref()));

        Ok(component)
    }

    /// Map tweet ids to tweets.
    pub fn tweet_map(&self) -> IndexMap<String, Tweet> {
        self.tweets
            .iter()
            .map(|tweet| (tweet.id_str.clone(), tweet.clone()))
            .collect()
    }

    /// Map user ids to users.
    pub fn user_map(&self) -> IndexMap<String, User> {
        self.users
            .iter()
            .map(|user| (user.id_str.clone(), user.clone()))
            .collect()
    }
}

/// Read batch of tweets, skipping any record without an id.
///
/// # Errors
///
/// - Return [`RecordError::Read`] if file cannot be read.
/// - Return [`RecordError::Parse`] if file is not a JSON array of tweets.
#[instrument(skip(path), level = "debug")]
pub fn read_tweets(path: impl AsRef<Path>) -> Result<Vec<Tweet>> {
    let content = read_file(path.as_ref())?;
    let tweets: Vec<Tweet> = serde_json::from_str(&content).map_err(|err| RecordError::Parse {
        source: err,
        path: path.as_ref().to_path_buf(),
    })?;

    Ok(tweets
        .into_iter()
        .filter(|tweet| has_id(tweet, path.as_ref()))
        .collect())
}

/// Read batch of users keyed by user id.
///
/// # Errors
///
/// - Return [`RecordError::Read`] if file cannot be read.
/// - Return [`RecordError::Parse`] if file is not a JSON object of users.
#[instrument(skip(path), level = "debug")]
pub fn read_users(path: impl AsRef<Path>) -> Result<IndexMap<String, User>> {
    let content = read_file(path.as_ref())?;
    serde_json::from_str(&content).map_err(|err| RecordError::Parse {
        source: err,
        path: path.as_ref().to_path_buf(),
    })
}

/// List JSON files in a directory whose name starts with `prefix`, sorted.
///
/// # Errors
///
/// - Return [`RecordError::Glob`] if directory path cannot form a pattern.
pub fn json_files(dir: impl AsRef<Path>, prefix: &str) -> Result<Vec<PathBuf>> {
    let pattern = format!(
        "{}/{}*.json",
        glob::Pattern::escape(dir.as_ref().to_string_lossy().as_ref()),
        glob::Pattern::escape(prefix),
    );

    let mut files = glob::glob(pattern.as_str())?
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(err) => {
                warn!("skip unreadable entry: {err}");
                None
            }
        })
        .collect::<Vec<_>>();
    files.sort();

    Ok(files)
}

fn has_id(tweet: &Tweet, origin: &Path) -> bool {
    if tweet.id_str.is_empty() {
        warn!("skip tweet without id in {}", origin.display());
        return false;
    }

    true
}

fn read_file(path: &Path) -> Result<String> {
    read_to_string(path).map_err(|err| RecordError::Read {
        source: err,
        path: path.to_path_buf(),
    })
}

/// Record error types.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    /// Record file cannot be read.
    #[error("failed to read records at {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Record file holds invalid JSON.
    #[error("failed to parse records at {:?}", path.display())]
    Parse {
        #[source]
        source: serde_json::Error,
        path: PathBuf,
    },

    /// Directory cannot be globbed.
    #[error(transparent)]
    Glob(#[from] glob::PatternError),
}

/// Friendly result alias :3
pub type Result<T, E = RecordError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use std::fs::write;

    #[test]
    fn kind_follows_reply_and_quote_fields() -> anyhow::Result<()> {
        let tweets: Vec<Tweet> = serde_json::from_str(indoc! {r#"
            [
                {"id_str": "1"},
                {"id_str": "2", "in_reply_to_status_id_str": "1", "in_reply_to_user_id_str": "10"},
                {"id_str": "3", "quoted_status_id_str": "9", "quoted_status": {"id_str": "9", "user": {"id_str": "90"}}},
                {"id_str": "4", "in_reply_to_status_id_str": "2", "quoted_status_id_str": "3"},
                {"id_str": "5", "in_reply_to_status_id_str": null, "quoted_status_id_str": ""}
            ]
        "#})?;

        assert_eq!(tweets[0].kind(), TweetKind::Root);
        assert_eq!(
            tweets[1].kind(),
            TweetKind::Reply(ReplyRef { parent: "1", user: Some("10") })
        );
        assert_eq!(
            tweets[2].kind(),
            TweetKind::Quote(QuoteRef { quoted: "9", user: Some("90") })
        );
        assert_eq!(
            tweets[3].kind(),
            TweetKind::ReplyQuote(
                ReplyRef { parent: "2", user: None },
                QuoteRef { quoted: "3", user: None }
            )
        );
        assert_eq!(tweets[4].kind(), TweetKind::Root);

        Ok(())
    }

    #[test]
    fn unknown_fields_survive_round_trip() -> anyhow::Result<()> {
        let raw = r#"{"id_str":"1","lang":"en","entities":{"hashtags":[{"text":"rust","indices":[0,5]}],"symbols":[]}}"#;
        let tweet: Tweet = serde_json::from_str(raw)?;
        assert_eq!(tweet.hashtags(), vec!["rust".to_string()]);

        let result: Value = serde_json::to_value(&tweet)?;
        let expect: Value = serde_json::from_str(raw)?;
        assert_eq!(result, expect);

        Ok(())
    }

    #[test]
    fn created_at_parses() {
        let tweet = Tweet {
            created_at: Some("Wed Oct 10 20:19:24 +0000 2018".into()),
            ..Tweet::default()
        };
        assert_eq!(
            tweet.created().map(|date| date.to_string()),
            Some("2018-10-10 20:19:24".to_string())
        );

        let tweet = Tweet {
            created_at: Some("yesterday".into()),
            ..Tweet::default()
        };
        assert_eq!(tweet.created(), None);
    }

    #[test]
    fn video_media_picks_best_mp4() -> anyhow::Result<()> {
        let media: Media = serde_json::from_str(indoc! {r#"
            {
                "type": "video",
                "media_url_https": "https://pbs.twimg.com/thumb.jpg",
                "video_info": {"variants": [
                    {"bitrate": 256000, "content_type": "video/mp4", "url": "https://video.twimg.com/low.mp4?tag=1"},
                    {"content_type": "application/x-mpegURL", "url": "https://video.twimg.com/pl.m3u8"},
                    {"bitrate": 832000, "content_type": "video/mp4", "url": "https://video.twimg.com/high.mp4?tag=1"}
                ]}
            }
        "#})?;

        assert_eq!(
            media.urls(),
            vec![
                "https://pbs.twimg.com/thumb.jpg".to_string(),
                "https://video.twimg.com/high.mp4".to_string(),
            ]
        );

        Ok(())
    }

    #[test]
    fn read_tweets_skips_records_without_id() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("batch.json");
        write(&path, r#"[{"id_str": "1"}, {"full_text": "no id"}, {"id_str": "2"}]"#)?;

        let result = read_tweets(&path)?
            .into_iter()
            .map(|tweet| tweet.id_str)
            .collect::<Vec<_>>();
        assert_eq!(result, vec!["1", "2"]);

        write(&path, "not json")?;
        assert!(matches!(read_tweets(&path), Err(RecordError::Parse { .. })));

        Ok(())
    }

    #[test]
    fn json_files_filters_by_prefix() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        for name in ["component_b.json", "component_a.json", "thread_a.json", "notes.txt"] {
            write(dir.path().join(name), "{}")?;
        }

        let result = json_files(dir.path(), "component_")?;
        assert_eq!(
            result,
            vec![dir.path().join("component_a.json"), dir.path().join("component_b.json")]
        );
        assert_eq!(json_files(dir.path(), "")?.len(), 3);

        Ok(())
    }
}
