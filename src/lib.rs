// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Bookmark, tag, and Twitter archive organizer.
//!
//! Most of bkmkorg is a set of readers and writers for small line based
//! text formats: [`bookmark`] collections, [`tags`] count files, and their
//! substitution and index variants. Every format is read into a typed value,
//! transformed, and written back out through [`Display`](std::fmt::Display).
//!
//! The [`twitter`] module is the odd one out. It archives whole Twitter
//! conversations as Org-mode files, which requires rebuilding reply threads
//! from a pile of individually downloaded tweets.
//!
//! # See Also
//!
//! 1. [`config`] for the configuration file layout.
//! 2. [`path`] for default locations and file naming helpers.

pub mod bookmark;
pub mod config;
pub mod path;
pub mod tags;
pub mod twitter;
