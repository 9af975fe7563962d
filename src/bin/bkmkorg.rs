// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use bkmkorg::{
    bookmark::{netscape, trie::Trie, BookmarkCollection},
    config::Config,
    path::{default_config_path, find_files},
    tags::{IndexFile, SetOp, SubstitutionFile, TagFile},
    twitter::{
        component::write_components,
        download::{
            download_media, http_client, referenced_user_ids, DownloadSettings, Downloader,
            TwitterApi,
        },
        library::integrate,
        org::write_orgs,
        thread::write_threads,
        todo::{library_tweet_ids, TodoFile},
    },
};

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::{
    collections::BTreeSet,
    fs::write,
    path::PathBuf,
    process::exit,
};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "bkmkorg [options] <command>",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    /// Path to configuration file.
    #[arg(short, long, global = true, value_name = "path")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    async fn run(self) -> Result<()> {
        match self.command {
            Command::MergeBookmarks(opts) => run_merge_bookmarks(opts),
            Command::HtmlToBookmarks(opts) => run_html_to_bookmarks(opts),
            Command::BookmarksToHtml(opts) => run_bookmarks_to_html(opts),
            Command::BookmarkQueries(opts) => run_bookmark_queries(opts),
            Command::CountTags(opts) => run_count_tags(opts),
            Command::CleanTags(opts) => run_clean_tags(opts),
            Command::TagFiles(opts) => run_tag_files(opts),
            Command::Twitter(opts) => {
                let config = load_config(self.config)?;
                opts.command.run(config).await
            }
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Merge bookmark files, unioning tags of duplicate URLs.
    #[command(override_usage = "bkmkorg merge-bookmarks [options] --output <path> <input>...")]
    MergeBookmarks(MergeBookmarksOptions),

    /// Convert browser exported HTML bookmarks to a bookmarks file.
    #[command(override_usage = "bkmkorg html-to-bookmarks [options] --output <path> <input>...")]
    HtmlToBookmarks(HtmlToBookmarksOptions),

    /// Convert a bookmarks file to browser importable HTML.
    #[command(override_usage = "bkmkorg bookmarks-to-html [options] --output <path> <input>")]
    BookmarksToHtml(BookmarksToHtmlOptions),

    /// Report query parameters of bookmarks, optionally stripping some.
    #[command(override_usage = "bkmkorg bookmark-queries [options] --report <path> <input>")]
    BookmarkQueries(BookmarkQueriesOptions),

    /// Count tags used by bookmark files.
    #[command(override_usage = "bkmkorg count-tags [options] --output <path> <input>...")]
    CountTags(CountTagsOptions),

    /// Apply tag substitutions to a tag count file.
    #[command(override_usage = "bkmkorg clean-tags [options] --subs <path> <input>")]
    CleanTags(CleanTagsOptions),

    /// List files of a tag index that match a set of tags.
    #[command(override_usage = "bkmkorg tag-files [options] <index> <tag>...")]
    TagFiles(TagFilesOptions),

    /// Archive Twitter conversations as org files.
    #[command(override_usage = "bkmkorg twitter <twitter-command>")]
    Twitter(TwitterOptions),
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct MergeBookmarksOptions {
    /// Bookmark files, or directories holding them.
    #[arg(required = true, value_name = "input")]
    pub inputs: Vec<PathBuf>,

    /// Path to write merged bookmarks to.
    #[arg(short, long, value_name = "path")]
    pub output: PathBuf,

    /// Substitution file to clean tags with.
    #[arg(short, long, value_name = "path")]
    pub subs: Option<PathBuf>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct HtmlToBookmarksOptions {
    /// HTML bookmark files, or directories holding them.
    #[arg(required = true, value_name = "input")]
    pub inputs: Vec<PathBuf>,

    /// Path to write bookmarks to.
    #[arg(short, long, value_name = "path")]
    pub output: PathBuf,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct BookmarksToHtmlOptions {
    /// Bookmark file to convert.
    #[arg(required = true, value_name = "input")]
    pub input: PathBuf,

    /// Path to write HTML to.
    #[arg(short, long, value_name = "path")]
    pub output: PathBuf,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct BookmarkQueriesOptions {
    /// Bookmark file to inspect.
    #[arg(required = true, value_name = "input")]
    pub input: PathBuf,

    /// Path to write org report of query parameters to.
    #[arg(short, long, value_name = "path")]
    pub report: PathBuf,

    /// Query parameters to strip.
    #[arg(short, long, value_name = "key")]
    pub filter: Vec<String>,

    /// Path to write filtered bookmarks to.
    #[arg(short, long, value_name = "path")]
    pub output: Option<PathBuf>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct CountTagsOptions {
    /// Bookmark files, or directories holding them.
    #[arg(required = true, value_name = "input")]
    pub inputs: Vec<PathBuf>,

    /// Path to write tag counts to.
    #[arg(short, long, value_name = "path")]
    pub output: PathBuf,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct CleanTagsOptions {
    /// Tag count file to clean.
    #[arg(required = true, value_name = "input")]
    pub input: PathBuf,

    /// Substitution file to apply.
    #[arg(short, long, value_name = "path")]
    pub subs: PathBuf,

    /// Path to write cleaned counts to, defaults to input.
    #[arg(short, long, value_name = "path")]
    pub output: Option<PathBuf>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct TagFilesOptions {
    /// Tag index file.
    #[arg(required = true, value_name = "index")]
    pub index: PathBuf,

    /// Tags to look up.
    #[arg(required = true, value_name = "tag")]
    pub tags: Vec<String>,

    /// How to combine the files of each tag.
    #[arg(short, long, value_enum, default_value_t = SetOpArg::Intersect)]
    pub op: SetOpArg,
}

#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
enum SetOpArg {
    Intersect,
    Union,
    SymmetricDifference,
    Difference,
}

impl From<SetOpArg> for SetOp {
    fn from(op: SetOpArg) -> Self {
        match op {
            SetOpArg::Intersect => SetOp::Intersect,
            SetOpArg::Union => SetOp::Union,
            SetOpArg::SymmetricDifference => SetOp::SymmetricDifference,
            SetOpArg::Difference => SetOp::Difference,
        }
    }
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct TwitterOptions {
    #[command(subcommand)]
    pub command: TwitterCommand,
}

#[derive(Debug, Clone, Subcommand)]
enum TwitterCommand {
    /// Download tweets listed in a todo file, with their users.
    #[command(override_usage = "bkmkorg twitter download [options] <todo>")]
    Download(DownloadOptions),

    /// Partition downloaded tweets into component files.
    #[command(override_usage = "bkmkorg twitter components [options]")]
    Components,

    /// Find the main thread of every component.
    #[command(override_usage = "bkmkorg twitter threads [options]")]
    Threads,

    /// Render every thread as an org file.
    #[command(override_usage = "bkmkorg twitter org [options]")]
    Org(OrgOptions),

    /// Merge rendered org files into the library.
    #[command(override_usage = "bkmkorg twitter integrate [options] [<source>]...")]
    Integrate(IntegrateOptions),
}

impl TwitterCommand {
    async fn run(self, config: Config) -> Result<()> {
        match self {
            TwitterCommand::Download(opts) => run_download(opts, config).await,
            TwitterCommand::Components => run_components(config),
            TwitterCommand::Threads => run_threads(config),
            TwitterCommand::Org(opts) => run_org(opts, config).await,
            TwitterCommand::Integrate(opts) => run_integrate(opts, config),
        }
    }
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct DownloadOptions {
    /// Todo file listing tweets to download.
    #[arg(required = true, value_name = "todo")]
    pub todo: PathBuf,

    /// Extra id lists or org directories of already archived tweets.
    #[arg(short, long, value_name = "path")]
    pub library: Vec<PathBuf>,

    /// Skip downloading users.
    #[arg(long)]
    pub no_users: bool,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct OrgOptions {
    /// Todo file to take thread tags from.
    #[arg(short, long, value_name = "path")]
    pub todo: Option<PathBuf>,

    /// Download media referenced by the rendered threads.
    #[arg(short, long)]
    pub media: bool,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct IntegrateOptions {
    /// Org files or directories to integrate, defaults to the org directory.
    #[arg(value_name = "source")]
    pub sources: Vec<PathBuf>,

    /// Library paths to leave alone.
    #[arg(short, long, value_name = "path")]
    pub exclude: Vec<PathBuf>,

    /// Add new files to the library root instead of group directories.
    #[arg(short, long)]
    pub groupless: bool,
}

#[tokio::main]
async fn main() {
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .with_timer(false)
        .without_time();
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = run().await {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

async fn run() -> Result<()> {
    Cli::parse().run().await
}

fn load_config(path: Option<PathBuf>) -> Result<Config> {
    let path = match path {
        Some(path) => path,
        None => default_config_path()?,
    };
    info!("load configuration {:?}", path.display());

    Ok(Config::load(path)?)
}

fn collect_inputs(inputs: &[PathBuf], ext: &str) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        let found = find_files(input, ext, &[])?;
        if found.is_empty() {
            warn!("no .{ext} files found at {:?}", input.display());
        }
        files.extend(found);
    }

    Ok(files)
}

fn read_bookmarks(inputs: &[PathBuf]) -> Result<BookmarkCollection> {
    let mut bookmarks = BookmarkCollection::new();
    for file in collect_inputs(inputs, "bookmarks")? {
        bookmarks.extend(BookmarkCollection::read(file)?);
    }

    Ok(bookmarks)
}

fn run_merge_bookmarks(opts: MergeBookmarksOptions) -> Result<()> {
    let mut bookmarks = read_bookmarks(&opts.inputs)?;
    let total = bookmarks.len();
    bookmarks.merge_duplicates();
    info!("merged {total} bookmarks into {}", bookmarks.len());

    if let Some(subs) = opts.subs {
        bookmarks.clean(&SubstitutionFile::read(subs)?);
    }
    bookmarks.write(&opts.output)?;

    Ok(())
}

fn run_html_to_bookmarks(opts: HtmlToBookmarksOptions) -> Result<()> {
    let mut bookmarks = BookmarkCollection::new();
    for file in collect_inputs(&opts.inputs, "html")? {
        bookmarks.extend(netscape::read_html(file)?);
    }
    bookmarks.merge_duplicates();
    bookmarks.write(&opts.output)?;

    Ok(())
}

fn run_bookmarks_to_html(opts: BookmarksToHtmlOptions) -> Result<()> {
    let bookmarks = BookmarkCollection::read(&opts.input)?;
    netscape::write_html(&bookmarks, &opts.output)?;

    Ok(())
}

fn run_bookmark_queries(opts: BookmarkQueriesOptions) -> Result<()> {
    let bookmarks = BookmarkCollection::read(&opts.input)?;
    let mut trie = bookmarks.into_iter().collect::<Trie>();
    info!("found {} query parameters", trie.query_keys().len());
    write(&opts.report, trie.org_format_queries())?;

    if let Some(output) = opts.output {
        let keys = opts.filter.into_iter().collect::<BTreeSet<_>>();
        trie.filter_queries(&keys);
        trie.bookmarks().write(output)?;
    }

    Ok(())
}

fn run_count_tags(opts: CountTagsOptions) -> Result<()> {
    let bookmarks = read_bookmarks(&opts.inputs)?;
    let mut tags = TagFile::new();
    for bookmark in bookmarks.iter() {
        tags.extend(bookmark.tags.iter().map(String::as_str));
    }
    info!("counted {} tags over {} bookmarks", tags.len(), bookmarks.len());
    write(&opts.output, tags.to_string())?;

    Ok(())
}

fn run_clean_tags(opts: CleanTagsOptions) -> Result<()> {
    let tags = TagFile::read(&opts.input)?;
    let subs = SubstitutionFile::read(&opts.subs)?;

    let mut cleaned = TagFile::new();
    for tag in tags.tags() {
        for sub in subs.sub(tag) {
            cleaned.increment(&sub, tags.count(tag));
        }
    }
    info!("cleaned {} tags into {}", tags.len(), cleaned.len());

    let output = opts.output.unwrap_or(opts.input);
    write(&output, cleaned.to_string())?;

    Ok(())
}

fn run_tag_files(opts: TagFilesOptions) -> Result<()> {
    let index = IndexFile::read(&opts.index)?;
    let files = index
        .files_for(opts.tags.iter().map(String::as_str), opts.op.into())
        .ok_or_else(|| anyhow!("no tag of {:?} is in the index", opts.tags))?;

    for file in files {
        println!("{}", file.display());
    }

    Ok(())
}

async fn run_download(opts: DownloadOptions, config: Config) -> Result<()> {
    let todo = TodoFile::read(&opts.todo)?;
    info!("{} tweets listed in todo file", todo.len());

    let mut library = config.paths.library.clone();
    library.extend(opts.library);
    let library_ids = library_tweet_ids(&library)?;

    let settings = DownloadSettings::try_from(&config)?;
    let downloader = Downloader::new(TwitterApi::new(&config.twitter)?, settings.clone());
    let report = downloader
        .download_tweets(todo.ids().map(str::to_string), &library_ids)
        .await?;
    info!(
        "downloaded {} tweets, {} not available",
        report.downloaded.len(),
        report.missing.len()
    );

    if !opts.no_users {
        let users = referenced_user_ids(&settings.tweet_dir)?;
        downloader.download_users(users).await?;
    }

    Ok(())
}

fn run_components(config: Config) -> Result<()> {
    let paths = &config.paths;
    let report = write_components(
        &paths.tweet_dir,
        &paths.user_dir,
        &paths.component_dir,
        config.components.write_count,
    )?;
    info!("wrote {} components", report.components);

    Ok(())
}

fn run_threads(config: Config) -> Result<()> {
    let count = write_threads(&config.paths.component_dir, &config.paths.thread_dir)?;
    info!("wrote {count} threads");

    Ok(())
}

async fn run_org(opts: OrgOptions, config: Config) -> Result<()> {
    let todo = opts.todo.as_deref().map(TodoFile::read).transpose()?;
    let report = write_orgs(&config.paths.thread_dir, &config.paths.org_dir, todo.as_ref())?;
    info!("wrote {} org files", report.written.len());

    if opts.media {
        let count = download_media(&http_client()?, &report.media).await?;
        info!("downloaded {count} of {} media files", report.media.len());
    }

    Ok(())
}

fn run_integrate(opts: IntegrateOptions, config: Config) -> Result<()> {
    let sources = if opts.sources.is_empty() {
        vec![config.paths.org_dir.clone()]
    } else {
        opts.sources
    };
    let report = integrate(&sources, &config.paths.library, &opts.exclude, opts.groupless)?;
    info!("{} files appended, {} files added", report.integrated, report.new);

    Ok(())
}
