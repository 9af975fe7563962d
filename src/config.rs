// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout of the configuration file that bkmkorg reads to find
//! API credentials and the directories of the Twitter archive pipeline. File
//! I/O is left to the caller, apart from the [`Config::load`] convenience.
//!
//! # General Layout
//!
//! ```toml
//! [twitter]
//! bearer_token = "..."
//! batch_size = 100
//! sleep_batch = 2.0
//!
//! [paths]
//! tweet_dir = "$HOME/twitter/tweets"
//! user_dir = "$HOME/twitter/users"
//! component_dir = "$HOME/twitter/components"
//! thread_dir = "$HOME/twitter/threads"
//! org_dir = "$HOME/twitter/orgs"
//! missing_file = "$HOME/twitter/missing.txt"
//! library = ["$HOME/library/twitter"]
//!
//! [components]
//! write_count = 20
//! ```

use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    fs::read_to_string,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

/// Top-level configuration.
#[derive(Default, Debug, PartialEq, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Twitter API access settings.
    #[serde(default)]
    pub twitter: TwitterSettings,

    /// Directories used by the archive pipeline.
    #[serde(default)]
    pub paths: PathSettings,

    /// Component file writing settings.
    #[serde(default)]
    pub components: ComponentSettings,
}

impl Config {
    /// Read and parse configuration file at target path.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::Read`] if file cannot be read.
    /// - Return [`ConfigError::Deserialize`] if file is not valid.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = read_to_string(path.as_ref()).map_err(|err| ConfigError::Read {
            source: err,
            path: path.as_ref().to_path_buf(),
        })?;

        content.parse()
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut config: Config = toml::de::from_str(data).map_err(ConfigError::Deserialize)?;

        // INVARIANT: Perform shell expansion on every path field.
        let paths = &mut config.paths;
        for path in [
            &mut paths.tweet_dir,
            &mut paths.user_dir,
            &mut paths.component_dir,
            &mut paths.thread_dir,
            &mut paths.org_dir,
            &mut paths.missing_file,
        ] {
            *path = expand_path(path)?;
        }
        for path in paths.library.iter_mut() {
            *path = expand_path(path)?;
        }
        config.twitter.sleep_duration()?;

        Ok(config)
    }
}

impl Display for Config {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

/// Twitter API access settings.
#[derive(Debug, PartialEq, Clone, Deserialize, Serialize)]
pub struct TwitterSettings {
    /// App bearer token for the v1.1 REST API.
    #[serde(default)]
    pub bearer_token: String,

    /// Base URL of the REST API.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Number of ids per lookup request.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Seconds to sleep between lookup requests.
    #[serde(default = "default_sleep_batch")]
    pub sleep_batch: f64,
}

impl TwitterSettings {
    /// Sleep between lookup batches as a [`Duration`].
    ///
    /// Negative values clamp to zero.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::InvalidSleep`] if value is not a finite number
    ///   of seconds that fits a [`Duration`].
    pub fn sleep_duration(&self) -> Result<Duration> {
        if self.sleep_batch < 0.0 {
            return Ok(Duration::ZERO);
        }

        Duration::try_from_secs_f64(self.sleep_batch).map_err(|err| ConfigError::InvalidSleep {
            source: err,
            value: self.sleep_batch,
        })
    }
}

impl Default for TwitterSettings {
    fn default() -> Self {
        Self {
            bearer_token: String::new(),
            api_url: default_api_url(),
            batch_size: default_batch_size(),
            sleep_batch: default_sleep_batch(),
        }
    }
}

/// Directory layout of the archive pipeline.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct PathSettings {
    /// Downloaded tweet batches.
    #[serde(default)]
    pub tweet_dir: PathBuf,

    /// Downloaded user batches.
    #[serde(default)]
    pub user_dir: PathBuf,

    /// Component files.
    #[serde(default)]
    pub component_dir: PathBuf,

    /// Thread description files.
    #[serde(default)]
    pub thread_dir: PathBuf,

    /// Rendered org files.
    #[serde(default)]
    pub org_dir: PathBuf,

    /// Log of ids the API would not return.
    #[serde(default)]
    pub missing_file: PathBuf,

    /// Existing org libraries. The first entry receives new files.
    #[serde(default)]
    pub library: Vec<PathBuf>,
}

/// Component file writing settings.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct ComponentSettings {
    /// Number of buffered entries before a flush to disk.
    #[serde(default = "default_write_count")]
    pub write_count: usize,
}

impl Default for ComponentSettings {
    fn default() -> Self {
        Self {
            write_count: default_write_count(),
        }
    }
}

fn default_api_url() -> String {
    "https://api.twitter.com/1.1".into()
}

fn default_batch_size() -> usize {
    100
}

fn default_sleep_batch() -> f64 {
    2.0
}

fn default_write_count() -> usize {
    20
}

fn expand_path(path: &Path) -> Result<PathBuf> {
    Ok(PathBuf::from(
        shellexpand::full(path.to_string_lossy().as_ref())
            .map_err(ConfigError::ShellExpansion)?
            .into_owned(),
    ))
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read configuration file at {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize configuration.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Sleep between lookup batches is not a usable duration.
    #[error("invalid sleep_batch value {value}")]
    InvalidSleep {
        #[source]
        source: std::time::TryFromFloatSecsError,
        value: f64,
    },

    /// Failed to perform shell expansion on configuration.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;
