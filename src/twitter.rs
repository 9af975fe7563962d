// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Twitter conversation archiving.
//!
//! Archiving a conversation is split into explicit stages, each of which
//! reads the output of the one before it from disk:
//!
//! 1. [`download`]: fetch tweets listed in a todo file, following reply and
//!    quote references outward, into batches of raw tweet JSON.
//! 2. [`component`]: build a [`TwitterGraph`](graph::TwitterGraph) over
//!    every downloaded tweet, partition it into connected components, and
//!    stream each component's tweets and users into its own JSON file.
//! 3. [`thread`]: find the main reply chain of each component, and record
//!    side conversations and quotes next to it.
//! 4. [`org`]: render each thread as an Org-mode file.
//! 5. [`library`]: merge rendered files into an existing org library.
//!
//! # See Also
//!
//! 1. [`record`] for the JSON records every stage shares.
//! 2. [`todo`] for the todo files that seed a download.

pub mod component;
pub mod download;
pub mod graph;
pub mod library;
pub mod org;
pub mod record;
pub mod thread;
pub mod todo;
