// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use crate::ArchiveFixture;

use anyhow::Result;
use bkmkorg::{
    bookmark::{netscape, BookmarkCollection},
    twitter::{
        component::{write_components, SUMMARY_FILE},
        library::{integrate, IntegrateReport},
        org::write_orgs,
        record::{json_files, ComponentFile},
        thread::{write_threads, ThreadObj},
        todo::{library_tweet_ids, TodoFile},
    },
};
use indoc::indoc;
use pretty_assertions::assert_eq;
use std::{collections::BTreeSet, fs::read_to_string};

const CONVERSATION: &str = indoc! {r#"
    [
        {
            "id_str": "100",
            "user": { "id_str": "1" },
            "created_at": "Wed Jan 01 10:00:00 +0000 2020",
            "full_text": "* first post",
            "entities": { "hashtags": [{ "text": "rust" }] },
            "lang": "en"
        },
        {
            "id_str": "101",
            "user": { "id_str": "1" },
            "in_reply_to_status_id_str": "100",
            "in_reply_to_user_id_str": "1",
            "in_reply_to_screen_name": "alice",
            "created_at": "Wed Jan 01 10:05:00 +0000 2020",
            "full_text": "second post"
        }
    ]
"#};

const QUOTES: &str = indoc! {r#"
    [
        {
            "id_str": "102",
            "user": { "id_str": "1" },
            "in_reply_to_status_id_str": "101",
            "in_reply_to_screen_name": "alice",
            "quoted_status_id_str": "200",
            "full_text": "third post, quoting bob",
            "extended_entities": {
                "media": [
                    { "type": "photo", "media_url_https": "https://pbs.twimg.com/media/pic.jpg" }
                ]
            }
        },
        { "id_str": "200", "user": { "id_str": "2" }, "full_text": "bob says hi" },
        { "id_str": "300", "user": { "id_str": "3" }, "full_text": "carol alone" },
        { "full_text": "record without an id" }
    ]
"#};

const USERS: &str = indoc! {r#"
    {
        "1": { "id_str": "1", "screen_name": "alice" },
        "2": { "id_str": "2", "screen_name": "bob" },
        "3": { "id_str": "3", "screen_name": "carol" }
    }
"#};

fn seeded_archive() -> Result<ArchiveFixture> {
    let fixture = ArchiveFixture::new()?;
    fixture.write_tweets("batch_0.json", CONVERSATION)?;
    fixture.write_tweets("batch_1.json", QUOTES)?;
    fixture.write_users("users_0.json", USERS)?;
    Ok(fixture)
}

#[test]
fn components_partition_downloaded_tweets() -> Result<()> {
    let fixture = seeded_archive()?;
    let paths = fixture.paths();

    let report = write_components(&paths.tweet_dir, &paths.user_dir, &paths.component_dir, 2)?;
    assert_eq!(report.components, 2);
    assert!(paths.component_dir.join(SUMMARY_FILE).exists());

    let mut found = Vec::new();
    for path in json_files(&paths.component_dir, "component_")? {
        let component = ComponentFile::read(path)?;
        let tweets = component
            .tweets
            .into_iter()
            .map(|tweet| tweet.id_str)
            .collect::<BTreeSet<_>>();
        let users = component
            .users
            .into_iter()
            .map(|user| user.id_str)
            .collect::<BTreeSet<_>>();
        found.push((
            tweets.into_iter().collect::<Vec<_>>(),
            users.into_iter().collect::<Vec<_>>(),
        ));
    }
    found.sort();

    let expect: Vec<(Vec<String>, Vec<String>)> = vec![
        (
            vec!["100".into(), "101".into(), "102".into(), "200".into()],
            vec!["1".into(), "2".into()],
        ),
        (vec!["300".into()], vec!["3".into()]),
    ];
    assert_eq!(found, expect);

    Ok(())
}

#[test]
fn pipeline_renders_and_integrates_threads() -> Result<()> {
    let fixture = seeded_archive()?;
    let paths = fixture.paths();
    let todo = TodoFile::from("https://twitter.com/alice/status/100 : archive\n");

    write_components(&paths.tweet_dir, &paths.user_dir, &paths.component_dir, 20)?;
    assert_eq!(write_threads(&paths.component_dir, &paths.thread_dir)?, 2);

    let mut bases = Vec::new();
    for path in json_files(&paths.thread_dir, "thread_")? {
        let thread = ThreadObj::read(path)?;
        if thread.base_user == "alice" {
            assert_eq!(thread.main_thread, vec!["100", "101", "102"]);
            assert_eq!(thread.quotes, vec!["200"]);
            assert!(thread.rest.is_empty());
        }
        bases.push(thread.base_user);
    }
    bases.sort();
    assert_eq!(bases, vec!["alice", "carol"]);

    let report = write_orgs(&paths.thread_dir, &paths.org_dir, Some(&todo))?;
    let mut written = report.written.clone();
    written.sort();
    assert_eq!(
        written,
        vec![
            paths.org_dir.join("alice_thread_0.org"),
            paths.org_dir.join("carol_thread_0.org"),
        ]
    );
    assert_eq!(
        report.media,
        vec![(
            "https://pbs.twimg.com/media/pic.jpg".to_string(),
            paths.org_dir.join("alice_files/pic.jpg"),
        )]
    );

    let alice = read_to_string(paths.org_dir.join("alice_thread_0.org"))?;
    let heading = alice.lines().next().unwrap_or_default();
    assert!(heading.starts_with("** Thread: 2020-01-01 10:00:00 "));
    assert!(heading.ends_with(":archive:rust:"));
    assert!(alice.contains(":PERMALINK: [[https://twitter.com/alice/status/102][/alice/102]]"));
    assert!(alice.contains(":QUOTE: [[https://twitter.com/bob/status/200][/bob/200]]"));
    assert!(alice.contains("***** Quote: @bob"));
    assert!(alice.contains("\n-* first post\n"));
    assert!(alice.contains("[[file:./alice_files/pic.jpg][pic.jpg]]"));

    // Pretend the media has been downloaded next to the org file.
    fixture.write_file("orgs/alice_files/pic.jpg", "jpg")?;

    let report = integrate(&[paths.org_dir.clone()], &paths.library, &[], false)?;
    assert_eq!(report, IntegrateReport { integrated: 0, new: 2 });
    assert!(fixture.library().join("group_a/alice_thread_0.org").exists());
    assert!(fixture.library().join("group_a/alice_files/pic.jpg").exists());
    assert!(fixture.library().join("group_c/carol_thread_0.org").exists());

    // Archived tweets are known to the next download.
    let archived = library_tweet_ids(&paths.library)?;
    for id in ["100", "101", "102", "200", "300"] {
        assert!(archived.contains(id), "{id} missing from library ids");
    }

    Ok(())
}

#[test]
fn integrate_appends_to_existing_threads() -> Result<()> {
    let fixture = ArchiveFixture::new()?;
    let existing = fixture.write_file("library/group_a/alice_thread_0.org", "* old\n")?;
    let source = fixture.write_file("incoming/alice_thread_0.org", "* new\n")?;

    let report = integrate(&[source], &fixture.paths().library, &[], false)?;
    assert_eq!(report, IntegrateReport { integrated: 1, new: 0 });
    assert_eq!(read_to_string(existing)?, "* old\n\n* new\n");

    Ok(())
}

#[test]
fn bookmarks_survive_html_round_trip() -> Result<()> {
    let fixture = ArchiveFixture::new()?;
    let first = fixture.write_file(
        "first.bookmarks",
        indoc! {r#"
            https://example.org/a : rust : parsing
            https://example.org/b : misc
        "#},
    )?;
    let second = fixture.write_file(
        "second.bookmarks",
        indoc! {r#"
            https://example.org/a : compilers
            https://example.org/c : machine learning,graphs
        "#},
    )?;

    let mut bookmarks = BookmarkCollection::read(&first)?;
    bookmarks.extend(BookmarkCollection::read(&second)?);
    bookmarks.merge_duplicates();

    let html = fixture.root().join("bookmarks.html");
    netscape::write_html(&bookmarks, &html)?;
    let restored = netscape::read_html(&html)?;

    let flatten = |collection: &BookmarkCollection| {
        collection
            .iter()
            .map(|bookmark| (bookmark.url.clone(), bookmark.tags.clone()))
            .collect::<BTreeSet<_>>()
    };
    assert_eq!(flatten(&restored), flatten(&bookmarks));

    let a = restored
        .iter()
        .find(|bookmark| bookmark.url == "https://example.org/a")
        .map(|bookmark| bookmark.tags.iter().cloned().collect::<Vec<_>>());
    assert_eq!(
        a,
        Some(vec![
            "compilers".to_string(),
            "parsing".to_string(),
            "rust".to_string(),
        ])
    );

    Ok(())
}
