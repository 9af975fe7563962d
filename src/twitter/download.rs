// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Tweet, user, and media download.
//!
//! Tweets are looked up in batches. Every tweet that comes back may point
//! at the tweet it replies to and the tweet it quotes, and those ids are
//! queued in turn, so a single todo entry pulls in the whole conversation
//! above it. Ids the API does not return are logged to the missing file
//! and never asked for again.
//!
//! The API sits behind the [`StatusLookup`] trait. [`TwitterApi`] talks to
//! the real v1.1 REST API.
//!
//! # See Also
//!
//! 1. [Twitter API v1.1 statuses/lookup](https://developer.twitter.com/en/docs/twitter-api/v1/tweets/post-and-engage/api-reference/get-statuses-lookup)

use crate::{
    config::{Config, ConfigError, TwitterSettings},
    twitter::record::{self, RecordError, Tweet, User},
};

use futures::stream::{self, StreamExt};
use indexmap::{IndexMap, IndexSet};
use indicatif::{ProgressBar, ProgressStyle};
use std::{
    collections::VecDeque,
    fs::{create_dir_all, read_to_string, write, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Source of tweets and users.
#[allow(async_fn_in_trait)]
pub trait StatusLookup {
    /// Look up tweets by id. Ids that do not resolve are left out.
    async fn lookup_statuses(&self, ids: &[String]) -> Result<Vec<Tweet>>;

    /// Look up users by id. Ids that do not resolve are left out.
    async fn lookup_users(&self, ids: &[String]) -> Result<Vec<User>>;
}

/// Client of the Twitter v1.1 REST API.
#[derive(Debug, Clone)]
pub struct TwitterApi {
    client: reqwest::Client,
    api_url: String,
    bearer_token: String,
}

impl TwitterApi {
    /// Construct new API client.
    ///
    /// # Errors
    ///
    /// - Return [`DownloadError::MissingToken`] if no bearer token is set.
    /// - Return [`DownloadError::Http`] if client cannot be built.
    pub fn new(settings: &TwitterSettings) -> Result<Self> {
        if settings.bearer_token.is_empty() {
            return Err(DownloadError::MissingToken);
        }

        Ok(Self {
            client: http_client()?,
            api_url: settings.api_url.trim_end_matches('/').to_string(),
            bearer_token: settings.bearer_token.clone(),
        })
    }
}

impl StatusLookup for TwitterApi {
    async fn lookup_statuses(&self, ids: &[String]) -> Result<Vec<Tweet>> {
        let response = self
            .client
            .get(format!("{}/statuses/lookup.json", self.api_url))
            .bearer_auth(&self.bearer_token)
            .query(&[
                ("id", ids.join(",").as_str()),
                ("tweet_mode", "extended"),
                ("trim_user", "true"),
            ])
            .send()
            .await?
            .error_for_status()?;

        Ok(response.json().await?)
    }

    async fn lookup_users(&self, ids: &[String]) -> Result<Vec<User>> {
        let response = self
            .client
            .get(format!("{}/users/lookup.json", self.api_url))
            .bearer_auth(&self.bearer_token)
            .query(&[("user_id", ids.join(","))])
            .send()
            .await?
            .error_for_status()?;

        Ok(response.json().await?)
    }
}

/// Build HTTP client shared by API lookups and media downloads.
///
/// # Errors
///
/// - Return [`DownloadError::Http`] if client cannot be built.
pub fn http_client() -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .user_agent(concat!("bkmkorg/", env!("CARGO_PKG_VERSION")))
        .build()?)
}

/// Most ids a single lookup request may carry.
pub const MAX_LOOKUP_BATCH: usize = 100;

/// Log of user ids the API would not return, kept inside the user directory.
pub const MISSING_USERS_FILE: &str = "missing_users.txt";

/// Where and how fast to download.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadSettings {
    pub tweet_dir: PathBuf,
    pub user_dir: PathBuf,
    pub missing_file: PathBuf,
    pub batch_size: usize,
    pub sleep: Duration,
}

impl DownloadSettings {
    fn missing_users_file(&self) -> PathBuf {
        self.user_dir.join(MISSING_USERS_FILE)
    }
}

impl TryFrom<&Config> for DownloadSettings {
    type Error = ConfigError;

    fn try_from(config: &Config) -> Result<Self, Self::Error> {
        Ok(Self {
            tweet_dir: config.paths.tweet_dir.clone(),
            user_dir: config.paths.user_dir.clone(),
            missing_file: config.paths.missing_file.clone(),
            batch_size: config.twitter.batch_size,
            sleep: config.twitter.sleep_duration()?,
        })
    }
}

/// Outcome of [`Downloader::download_tweets`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DownloadReport {
    /// Ids downloaded in this run.
    pub downloaded: IndexSet<String>,

    /// Ids the API did not return in this run.
    pub missing: IndexSet<String>,
}

/// Batch downloader over a [`StatusLookup`].
#[derive(Debug)]
pub struct Downloader<L: StatusLookup> {
    lookup: L,
    settings: DownloadSettings,
}

impl<L: StatusLookup> Downloader<L> {
    /// Construct new downloader.
    ///
    /// Batch size is clamped to `1..=`[`MAX_LOOKUP_BATCH`].
    pub fn new(lookup: L, mut settings: DownloadSettings) -> Self {
        settings.batch_size = settings.batch_size.clamp(1, MAX_LOOKUP_BATCH);
        Self { lookup, settings }
    }

    /// Download tweets in `queue`, following replies and quotes.
    ///
    /// Ids already downloaded, already known to be missing, or listed in
    /// `library_ids` are skipped.
    ///
    /// # Errors
    ///
    /// - Return [`DownloadError`] if a lookup fails or any file cannot be
    ///   read or written.
    #[instrument(skip_all, level = "debug")]
    pub async fn download_tweets(
        &self,
        queue: impl IntoIterator<Item = String>,
        library_ids: &IndexSet<String>,
    ) -> Result<DownloadReport> {
        create_dir(&self.settings.tweet_dir)?;
        let mut known = downloaded_tweet_ids(&self.settings.tweet_dir)?;
        let mut missing = read_missing(&self.settings.missing_file)?;
        debug!("{} tweets on disk, {} known missing", known.len(), missing.len());

        let mut queue = queue.into_iter().collect::<VecDeque<_>>();
        let mut report = DownloadReport::default();
        let bar = progress_bar(queue.len())?;

        loop {
            let mut batch = Vec::new();
            while batch.len() < self.settings.batch_size {
                let Some(id) = queue.pop_front() else {
                    break;
                };
                if known.contains(&id)
                    || missing.contains(&id)
                    || library_ids.contains(&id)
                    || batch.contains(&id)
                {
                    bar.inc(1);
                    continue;
                }
                batch.push(id);
            }

            if batch.is_empty() {
                break;
            }

            bar.set_message(format!("looking up {} tweets", batch.len()));
            let tweets = self.lookup.lookup_statuses(&batch).await?;
            if !tweets.is_empty() {
                let path = self.settings.tweet_dir.join(format!("{}.json", Uuid::new_v4()));
                save_json(&path, &tweets)?;
                debug!("saved {} tweets to {}", tweets.len(), path.display());
            }

            let returned = tweets
                .iter()
                .map(|tweet| tweet.id_str.as_str())
                .collect::<IndexSet<_>>();
            for tweet in &tweets {
                known.insert(tweet.id_str.clone());
                report.downloaded.insert(tweet.id_str.clone());
                for next in [tweet.reply_to(), tweet.quoted_id()].into_iter().flatten() {
                    if !known.contains(next) {
                        queue.push_back(next.to_string());
                        bar.inc_length(1);
                    }
                }
            }

            let batch_missing = batch
                .iter()
                .filter(|id| !returned.contains(id.as_str()))
                .cloned()
                .collect::<Vec<_>>();
            if !batch_missing.is_empty() {
                append_missing(&self.settings.missing_file, &batch_missing)?;
                missing.extend(batch_missing.iter().cloned());
                report.missing.extend(batch_missing);
            }

            bar.inc(batch.len() as u64);
            if !queue.is_empty() && !self.settings.sleep.is_zero() {
                tokio::time::sleep(self.settings.sleep).await;
            }
        }

        bar.finish_and_clear();
        info!(
            "downloaded {} tweets, {} missing",
            report.downloaded.len(),
            report.missing.len()
        );

        Ok(report)
    }

    /// Download users not yet in the user directory.
    ///
    /// Ids the API does not return are logged to [`MISSING_USERS_FILE`] and
    /// never asked for again. Returns number of users downloaded.
    ///
    /// # Errors
    ///
    /// - Return [`DownloadError`] if a lookup fails or any file cannot be
    ///   read or written.
    #[instrument(skip_all, level = "debug")]
    pub async fn download_users(&self, ids: impl IntoIterator<Item = String>) -> Result<usize> {
        create_dir(&self.settings.user_dir)?;
        let missing_file = self.settings.missing_users_file();
        let mut known = read_missing(&missing_file)?;
        for file in record::json_files(&self.settings.user_dir, "")? {
            known.extend(record::read_users(file)?.into_keys());
        }

        let pending = ids
            .into_iter()
            .filter(|id| !id.is_empty() && !known.contains(id))
            .collect::<IndexSet<_>>()
            .into_iter()
            .collect::<Vec<_>>();
        let bar = progress_bar(pending.len())?;

        let mut count = 0;
        for (index, batch) in pending.chunks(self.settings.batch_size).enumerate() {
            if index > 0 && !self.settings.sleep.is_zero() {
                tokio::time::sleep(self.settings.sleep).await;
            }

            let users = self
                .lookup
                .lookup_users(batch)
                .await?
                .into_iter()
                .map(|user| (user.id_str.clone(), user))
                .collect::<IndexMap<_, _>>();
            if !users.is_empty() {
                let path = self.settings.user_dir.join(format!("{}.json", Uuid::new_v4()));
                save_json(&path, &users)?;
            }

            let batch_missing = batch
                .iter()
                .filter(|id| !users.contains_key(id.as_str()))
                .cloned()
                .collect::<Vec<_>>();
            if !batch_missing.is_empty() {
                debug!("{} users not returned", batch_missing.len());
                append_missing(&missing_file, &batch_missing)?;
            }

            count += users.len();
            bar.inc(batch.len() as u64);
        }

        bar.finish_and_clear();
        info!("downloaded {count} users");

        Ok(count)
    }
}

/// Collect ids of authors and replied users of downloaded tweets.
///
/// # Errors
///
/// - Return [`DownloadError::Record`] if any batch cannot be read.
pub fn referenced_user_ids(tweet_dir: &Path) -> Result<IndexSet<String>> {
    let mut ids = IndexSet::new();
    for file in record::json_files(tweet_dir, "")? {
        for tweet in record::read_tweets(file)? {
            ids.extend(tweet.user_id().map(str::to_string));
            ids.extend(tweet.in_reply_to_user_id_str.filter(|id| !id.is_empty()));
        }
    }

    Ok(ids)
}

/// Download media files one after another, skipping files already on disk.
///
/// Failed downloads are logged and skipped. Returns number of files saved.
///
/// # Errors
///
/// - Return [`DownloadError::Write`] if a file cannot be saved.
#[instrument(skip_all, level = "debug")]
pub async fn download_media(client: &reqwest::Client, jobs: &[(String, PathBuf)]) -> Result<usize> {
    let pending = jobs
        .iter()
        .filter(|(_, target)| !target.exists())
        .collect::<Vec<_>>();
    info!("downloading {} media files", pending.len());

    let saved = stream::iter(pending)
        .then(|(url, target)| save_media(client, url, target))
        .collect::<Vec<_>>()
        .await;

    let mut count = 0;
    for result in saved {
        if result? {
            count += 1;
        }
    }

    Ok(count)
}

async fn save_media(client: &reqwest::Client, url: &str, target: &Path) -> Result<bool> {
    let bytes = match fetch_bytes(client, url).await {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!("failed to download {url}: {err}");
            return Ok(false);
        }
    };

    if let Some(parent) = target.parent() {
        create_dir(parent)?;
    }
    write(target, bytes).map_err(|err| DownloadError::Write {
        source: err,
        path: target.to_path_buf(),
    })?;
    debug!("saved {}", target.display());

    Ok(true)
}

async fn fetch_bytes(client: &reqwest::Client, url: &str) -> Result<Vec<u8>> {
    let response = client.get(url).send().await?.error_for_status()?;
    Ok(response.bytes().await?.to_vec())
}

fn downloaded_tweet_ids(tweet_dir: &Path) -> Result<IndexSet<String>> {
    let mut ids = IndexSet::new();
    for file in record::json_files(tweet_dir, "")? {
        ids.extend(record::read_tweets(file)?.into_iter().map(|tweet| tweet.id_str));
    }

    Ok(ids)
}

fn read_missing(path: &Path) -> Result<IndexSet<String>> {
    if !path.exists() {
        return Ok(IndexSet::new());
    }

    let content = read_to_string(path).map_err(|err| DownloadError::Read {
        source: err,
        path: path.to_path_buf(),
    })?;

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

fn append_missing(path: &Path, ids: &[String]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        create_dir(parent)?;
    }

    let content = ids.iter().map(|id| format!("{id}\n")).collect::<String>();
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .and_then(|mut file| file.write_all(content.as_bytes()))
        .map_err(|err| DownloadError::Write {
            source: err,
            path: path.to_path_buf(),
        })
}

fn save_json(path: &Path, value: &impl serde::Serialize) -> Result<()> {
    let content = serde_json::to_string_pretty(value)?;
    write(path, content).map_err(|err| DownloadError::Write {
        source: err,
        path: path.to_path_buf(),
    })
}

fn create_dir(path: &Path) -> Result<()> {
    create_dir_all(path).map_err(|err| DownloadError::Write {
        source: err,
        path: path.to_path_buf(),
    })
}

fn progress_bar(len: usize) -> Result<ProgressBar> {
    let style = ProgressStyle::with_template(
        "{elapsed_precise:.green}  {msg:<30}  [{wide_bar:.yellow/blue}] {pos}/{len}",
    )?
    .progress_chars("-Cco.");
    let bar = ProgressBar::new(len as u64);
    bar.set_style(style);

    Ok(bar)
}

/// Download error types.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    /// No bearer token configured.
    #[error("no bearer token set in [twitter] configuration")]
    MissingToken,

    /// HTTP request failed.
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// File cannot be read.
    #[error("failed to read {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// File cannot be written.
    #[error("failed to write {:?}", path.display())]
    Write {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Downloaded records cannot be serialized.
    #[error(transparent)]
    Serialize(#[from] serde_json::Error),

    /// Existing batches cannot be read.
    #[error(transparent)]
    Record(#[from] RecordError),

    /// Progress bar template is invalid.
    #[error(transparent)]
    ProgressTemplate(#[from] indicatif::style::TemplateError),
}

/// Friendly result alias :3
pub type Result<T, E = DownloadError> = std::result::Result<T, E>;
