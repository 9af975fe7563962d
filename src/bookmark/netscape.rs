// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Netscape bookmark HTML.
//!
//! Browsers export bookmarks as a loose HTML document where every bookmark
//! is an anchor inside a definition list:
//!
//! ```html
//! <DT><A HREF="https://example.org" TAGS="rust,parsing">Example</A>
//! ```
//!
//! Reading is forgiving: every anchor with an `href` becomes a bookmark, no
//! matter how the surrounding folders are nested.

use crate::bookmark::{Bookmark, BookmarkCollection, BookmarkError, Result, DEFAULT_NAME};

use scraper::{Html, Selector};
use std::{
    fs::{read, write},
    path::Path,
};
use tracing::{info, instrument};

/// Parse Netscape bookmark HTML into a collection.
pub fn parse(html: &str) -> BookmarkCollection {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("a[href]") else {
        return BookmarkCollection::new();
    };

    document
        .select(&selector)
        .filter_map(|anchor| {
            let href = anchor.value().attr("href")?.trim();
            if href.is_empty() {
                return None;
            }

            let tags = anchor.value().attr("tags").unwrap_or_default();
            let text = anchor.text().collect::<String>();
            let name = match text.trim() {
                "" => DEFAULT_NAME,
                name => name,
            };

            Some(Bookmark::new(href, tags.split(','), name))
        })
        .collect()
}

/// Read Netscape bookmark HTML file.
///
/// Invalid UTF-8 sequences are replaced rather than rejected.
///
/// # Errors
///
/// - Return [`BookmarkError::Read`] if file cannot be read.
#[instrument(skip(path), level = "debug")]
pub fn read_html(path: impl AsRef<Path>) -> Result<BookmarkCollection> {
    info!("open html bookmarks: {:?}", path.as_ref().display());
    let raw = read(path.as_ref()).map_err(|err| BookmarkError::Read {
        source: err,
        path: path.as_ref().to_path_buf(),
    })?;

    let bookmarks = parse(String::from_utf8_lossy(&raw).as_ref());
    info!("found {} links", bookmarks.len());

    Ok(bookmarks)
}

/// Render collection as Netscape bookmark HTML, sorted by URL.
pub fn render(bookmarks: &BookmarkCollection) -> String {
    let mut sorted = bookmarks.iter().collect::<Vec<_>>();
    sorted.sort();

    let mut out = String::from(concat!(
        "<!DOCTYPE NETSCAPE-Bookmark-file-1>\n",
        "<META HTTP-EQUIV=\"Content-Type\" CONTENT=\"text/html; charset=UTF-8\">\n",
        "<TITLE>Bookmarks</TITLE>\n",
        "<H1>Bookmarks</H1>\n",
        "<DL><p>\n",
    ));
    for bookmark in sorted {
        let tags = bookmark.tags.iter().cloned().collect::<Vec<_>>().join(",");
        out.push_str(
            format!(
                "    <DT><A HREF=\"{}\" TAGS=\"{}\">{}</A>\n",
                escape(&bookmark.url),
                escape(&tags),
                escape(&bookmark.name),
            )
            .as_str(),
        );
    }
    out.push_str("</DL><p>\n");

    out
}

/// Write collection as Netscape bookmark HTML file.
///
/// # Errors
///
/// - Return [`BookmarkError::Write`] if file cannot be written.
pub fn write_html(bookmarks: &BookmarkCollection, path: impl AsRef<Path>) -> Result<()> {
    write(path.as_ref(), render(bookmarks)).map_err(|err| BookmarkError::Write {
        source: err,
        path: path.as_ref().to_path_buf(),
    })
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
