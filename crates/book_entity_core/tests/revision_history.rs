use book_entity_core::access::policy::{
    PERMISSION_ADD, PERMISSION_ADMINISTER, PERMISSION_DELETE, PERMISSION_EDIT,
    PERMISSION_VIEW_PUBLISHED, PERMISSION_VIEW_UNPUBLISHED,
};
use book_entity_core::db::{open_db, open_db_in_memory};
use book_entity_core::{
    BookDraft, BookEntityType, BookRepository, BookService, BookServiceError, BookTranslation,
    BundleRepository, FixedClock, RevertCommand, RevisionAction, RevisionLink, SaveOptions,
    SqliteBookRepository, SqliteBundleRepository, StaticAccount,
};
use rusqlite::Connection;
use std::sync::Arc;

type Service<'conn> =
    BookService<SqliteBookRepository<'conn>, SqliteBundleRepository<'conn>, StaticAccount>;

fn open() -> (Connection, Arc<FixedClock>) {
    let conn = open_db_in_memory().unwrap();
    SqliteBundleRepository::try_new(&conn)
        .unwrap()
        .create_bundle(&BookEntityType::new("novel", "Novel"))
        .unwrap();
    (conn, Arc::new(FixedClock::new(1_000)))
}

fn service(conn: &Connection, clock: Arc<FixedClock>, account: StaticAccount) -> Service<'_> {
    BookService::new(
        SqliteBookRepository::try_new(conn, clock).unwrap(),
        SqliteBundleRepository::try_new(conn).unwrap(),
        account,
    )
}

fn editor() -> StaticAccount {
    StaticAccount::with_permissions(
        1,
        [
            PERMISSION_ADD,
            PERMISSION_EDIT,
            PERMISSION_DELETE,
            PERMISSION_VIEW_PUBLISHED,
            PERMISSION_VIEW_UNPUBLISHED,
            PERMISSION_ADMINISTER,
        ],
    )
}

fn dune_draft() -> BookDraft {
    BookDraft::new("Dune", 123, "Herbert", 9.99).in_language("en")
}

fn default_revision_count(conn: &Connection, entity_id: i64) -> i64 {
    conn.query_row(
        "SELECT COUNT(*)
         FROM book_entity_revision r
         INNER JOIN book_entity b ON b.vid = r.vid
         WHERE b.id = ?1;",
        [entity_id],
        |row| row.get(0),
    )
    .unwrap()
}

#[test]
fn dune_scenario_builds_per_language_timelines() {
    let (conn, clock) = open();
    let books = service(&conn, clock.clone(), editor());

    let mut dune = books.create("novel", dune_draft()).unwrap();
    let r1 = dune.revision_id().unwrap();
    let id = dune.id.unwrap();

    clock.advance(60);
    dune.translation_mut("en").unwrap().name = "Dune (50th Anniversary)".to_string();
    let r2 = books
        .update(&mut dune, SaveOptions::new_revision("Anniversary edition"))
        .unwrap();
    assert!(r2 > r1);

    let r1_snapshot = books.load_revision(r1).unwrap();
    let r2_snapshot = books.load_revision(r2).unwrap();
    assert!(r1_snapshot.translation("en").unwrap().is_revision_translation_affected());
    assert!(r2_snapshot.translation("en").unwrap().is_revision_translation_affected());

    let timeline = books.history(id, "en").unwrap();
    assert!(!timeline.has_translations);
    assert_eq!(timeline.label, "Dune (50th Anniversary)");
    assert_eq!(timeline.rows.len(), 2);

    let current = timeline.current().unwrap();
    assert_eq!(current.revision_id, r2);
    assert!(current.is_current);
    assert!(current.actions.is_empty());
    assert_eq!(current.link, RevisionLink::Canonical { entity_id: id });
    assert_eq!(current.log_message.as_deref(), Some("Anniversary edition"));
    assert_eq!(current.created, 1_060);

    let older = &timeline.rows[1];
    assert_eq!(older.revision_id, r1);
    assert!(!older.is_current);
    assert_eq!(
        older.link,
        RevisionLink::Revision {
            entity_id: id,
            revision_id: r1
        }
    );
    assert_eq!(
        older.actions,
        vec![
            RevisionAction::Revert {
                command: RevertCommand::WholeRevision { revision_id: r1 }
            },
            RevisionAction::Delete { revision_id: r1 },
        ]
    );
    assert_eq!(older.log_message, None);

    // French is added to R2 only.
    dune.add_translation(BookTranslation::new(
        "fr",
        "Dune (édition anniversaire)",
        456,
        "Herbert",
        11.0,
    ))
    .unwrap();
    let still_r2 = books.update(&mut dune, SaveOptions::in_place()).unwrap();
    assert_eq!(still_r2, r2);

    let french = books.history(id, "fr").unwrap();
    assert!(french.has_translations);
    assert_eq!(french.label, "Dune (édition anniversaire)");
    assert_eq!(french.rows.len(), 1);
    assert_eq!(french.rows[0].revision_id, r2);
    assert!(french.rows[0].is_current);

    let english = books.history(id, "en").unwrap();
    assert_eq!(english.rows.len(), 2);
    assert_eq!(
        english.rows[1].actions[0],
        RevisionAction::Revert {
            command: RevertCommand::Translation {
                revision_id: r1,
                langcode: "en".to_string()
            }
        }
    );
}

#[test]
fn timeline_lists_revisions_newest_first_and_skips_unaffected() {
    let (conn, clock) = open();
    let books = service(&conn, clock, editor());

    let mut book = books.create("novel", dune_draft()).unwrap();
    let id = book.id.unwrap();
    let mut expected = vec![book.revision_id().unwrap()];
    for price in [10.0, 11.0, 12.0] {
        book.translation_mut("en").unwrap().price = price;
        expected.push(books.update(&mut book, SaveOptions::default()).unwrap());
    }
    // Unchanged re-save: stored, but not shown.
    books.update(&mut book, SaveOptions::default()).unwrap();

    let repo_ids = books.repository().revision_ids(id).unwrap();
    assert_eq!(repo_ids.len(), 5);
    assert!(repo_ids.windows(2).all(|pair| pair[0] < pair[1]));

    let timeline = books.history(id, "en").unwrap();
    let shown: Vec<i64> = timeline.rows.iter().map(|row| row.revision_id).collect();
    expected.reverse();
    assert_eq!(shown, expected);
    assert_eq!(timeline.rows.iter().filter(|row| row.is_current).count(), 1);
}

#[test]
fn single_revision_timeline_has_one_current_row() {
    let (conn, clock) = open();
    let books = service(&conn, clock, editor());

    let book = books.create("novel", dune_draft()).unwrap();
    let timeline = books.history(book.id.unwrap(), "en").unwrap();

    assert_eq!(timeline.rows.len(), 1);
    assert!(timeline.rows[0].is_current);
    assert!(timeline.rows[0].actions.is_empty());
}

#[test]
fn unknown_language_yields_empty_timeline() {
    let (conn, clock) = open();
    let books = service(&conn, clock, editor());

    let book = books.create("novel", dune_draft()).unwrap();
    let timeline = books.history(book.id.unwrap(), "ja").unwrap();

    assert!(timeline.rows.is_empty());
    assert_eq!(timeline.langcode, "ja");
    assert_eq!(timeline.label, "Dune");
}

#[test]
fn timeline_actions_follow_account_permissions() {
    let (conn, clock) = open();
    let books = service(&conn, clock.clone(), editor());
    let mut book = books.create("novel", dune_draft()).unwrap();
    book.translation_mut("en").unwrap().price = 1.0;
    books.update(&mut book, SaveOptions::default()).unwrap();
    let id = book.id.unwrap();

    let viewer = service(
        &conn,
        clock,
        StaticAccount::with_permissions(2, [PERMISSION_VIEW_PUBLISHED]),
    );
    let timeline = viewer.history(id, "en").unwrap();
    assert_eq!(timeline.rows.len(), 2);
    assert!(timeline.rows.iter().all(|row| row.actions.is_empty()));
}

#[test]
fn log_messages_are_escaped_and_blank_messages_omitted() {
    let (conn, clock) = open();
    let books = service(&conn, clock, editor());

    let mut book = books.create("novel", dune_draft()).unwrap();
    book.translation_mut("en").unwrap().price = 1.0;
    books
        .update(
            &mut book,
            SaveOptions::new_revision("<script>alert('x')</script> & more"),
        )
        .unwrap();
    book.translation_mut("en").unwrap().price = 2.0;
    books
        .update(&mut book, SaveOptions::new_revision("   "))
        .unwrap();

    let timeline = books.history(book.id.unwrap(), "en").unwrap();
    assert_eq!(timeline.rows[0].log_message, None);
    assert_eq!(
        timeline.rows[1].log_message.as_deref(),
        Some("&lt;script&gt;alert(&#39;x&#39;)&lt;/script&gt; &amp; more")
    );
}

#[test]
fn timeline_serializes_with_tagged_links_and_actions() {
    let (conn, clock) = open();
    let books = service(&conn, clock, editor());

    let mut book = books.create("novel", dune_draft()).unwrap();
    book.translation_mut("en").unwrap().isbn = 999;
    books.update(&mut book, SaveOptions::default()).unwrap();

    let timeline = books.history(book.id.unwrap(), "en").unwrap();
    let json = serde_json::to_value(&timeline).unwrap();

    assert_eq!(json["langcode"], "en");
    assert_eq!(json["has_translations"], false);
    assert_eq!(json["rows"][0]["is_current"], true);
    assert_eq!(json["rows"][0]["link"]["kind"], "canonical");
    assert_eq!(json["rows"][1]["link"]["kind"], "revision");
    assert_eq!(json["rows"][1]["actions"][0]["kind"], "revert");
    assert_eq!(
        json["rows"][1]["actions"][0]["command"]["kind"],
        "whole_revision"
    );
    assert_eq!(json["rows"][1]["actions"][1]["kind"], "delete");
}

#[test]
fn whole_revision_revert_restores_languages_and_keeps_history() {
    let (conn, clock) = open();
    let books = service(&conn, clock.clone(), editor());

    let mut book = books.create("novel", dune_draft()).unwrap();
    let r1 = book.revision_id().unwrap();
    let id = book.id.unwrap();

    clock.advance(100);
    book.translation_mut("en").unwrap().price = 19.99;
    book.add_translation(BookTranslation::new("fr", "Dune", 456, "Herbert", 21.0))
        .unwrap();
    let r2 = books.update(&mut book, SaveOptions::default()).unwrap();

    clock.advance(100);
    let reverted = books
        .revert(&RevertCommand::WholeRevision { revision_id: r1 })
        .unwrap();
    let r3 = reverted.revision_id().unwrap();

    assert!(r3 > r2);
    assert!(reverted.is_default_revision());
    assert_eq!(
        reverted.revision.log_message,
        "Copy of the revision from 1000."
    );
    assert_eq!(reverted.revision.author_id, Some(1));

    let current = books.load(id).unwrap();
    assert_eq!(current.revision_id(), Some(r3));
    assert_eq!(current.translation_languages(), vec!["en"]);
    assert_eq!(current.translation("en").unwrap().price, 9.99);
    assert_eq!(
        books.repository().revision_ids(id).unwrap(),
        vec![r1, r2, r3]
    );
    assert_eq!(default_revision_count(&conn, id), 1);
}

#[test]
fn translation_revert_only_touches_one_language() {
    let (conn, clock) = open();
    let books = service(&conn, clock, editor());

    let mut book = books.create("novel", dune_draft()).unwrap();
    book.add_translation(BookTranslation::new("fr", "Dune", 456, "Herbert", 11.0))
        .unwrap();
    let r2 = books.update(&mut book, SaveOptions::default()).unwrap();

    book.translation_mut("fr").unwrap().name = "Dune, tome 1".to_string();
    book.translation_mut("en").unwrap().price = 14.0;
    books.update(&mut book, SaveOptions::default()).unwrap();

    let command = RevertCommand::for_entity(book.has_translations(), r2, "fr");
    let reverted = books.revert(&command).unwrap();

    assert_eq!(reverted.translation("fr").unwrap().name, "Dune");
    assert_eq!(reverted.translation("en").unwrap().price, 14.0);
    let stored = books.load(book.id.unwrap()).unwrap();
    assert!(stored.translation("fr").unwrap().is_revision_translation_affected());
    assert!(!stored.translation("en").unwrap().is_revision_translation_affected());
}

#[test]
fn revert_rejects_missing_language_and_default_revision() {
    let (conn, clock) = open();
    let books = service(&conn, clock, editor());

    let mut book = books.create("novel", dune_draft()).unwrap();
    let r1 = book.revision_id().unwrap();
    book.translation_mut("en").unwrap().price = 1.0;
    let r2 = books.update(&mut book, SaveOptions::default()).unwrap();

    let err = books
        .revert(&RevertCommand::Translation {
            revision_id: r1,
            langcode: "de".to_string(),
        })
        .unwrap_err();
    assert!(matches!(err, BookServiceError::NoSuchTranslation { langcode } if langcode == "de"));

    let err = books
        .revert(&RevertCommand::WholeRevision { revision_id: r2 })
        .unwrap_err();
    assert!(matches!(err, BookServiceError::InvalidOperation(_)));

    let err = books
        .revert(&RevertCommand::WholeRevision { revision_id: 9_999 })
        .unwrap_err();
    assert!(matches!(err, BookServiceError::RevisionNotFound(9_999)));
}

#[test]
fn delete_revision_guards_default_and_reports_remaining() {
    let (conn, clock) = open();
    let books = service(&conn, clock, editor());

    let mut book = books.create("novel", dune_draft()).unwrap();
    let r1 = book.revision_id().unwrap();
    let id = book.id.unwrap();

    let err = books.delete_revision(r1).unwrap_err();
    assert!(matches!(err, BookServiceError::InvalidOperation(_)));

    book.translation_mut("en").unwrap().price = 1.0;
    let r2 = books.update(&mut book, SaveOptions::default()).unwrap();
    book.translation_mut("en").unwrap().price = 2.0;
    let r3 = books.update(&mut book, SaveOptions::default()).unwrap();

    let outcome = books.delete_revision(r2).unwrap();
    assert_eq!(outcome.entity_id, id);
    assert_eq!(outcome.deleted_revision_id, r2);
    assert_eq!(outcome.remaining_revisions, 2);
    assert!(outcome.shows_history());

    let outcome = books.delete_revision(r1).unwrap();
    assert_eq!(outcome.remaining_revisions, 1);
    assert!(!outcome.shows_history());

    assert_eq!(books.repository().revision_ids(id).unwrap(), vec![r3]);
    assert_eq!(default_revision_count(&conn, id), 1);
}

#[test]
fn delete_revision_keeps_last_copy_of_a_language() {
    let (conn, clock) = open();
    let books = service(&conn, clock, editor());

    let mut book = books.create("novel", dune_draft()).unwrap();
    book.add_translation(BookTranslation::new("de", "Der Wüstenplanet", 1, "Herbert", 12.0))
        .unwrap();
    let with_german = books.update(&mut book, SaveOptions::default()).unwrap();

    book.remove_translation("de").unwrap();
    books.update(&mut book, SaveOptions::default()).unwrap();

    let err = books.delete_revision(with_german).unwrap_err();
    assert!(matches!(err, BookServiceError::InvalidOperation(message) if message.contains("`de`")));
}

#[test]
fn delete_revision_rechecks_language_copies_on_a_second_connection() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("books.sqlite3");
    let first = open_db(&path).unwrap();
    let second = open_db(&path).unwrap();
    SqliteBundleRepository::try_new(&first)
        .unwrap()
        .create_bundle(&BookEntityType::new("novel", "Novel"))
        .unwrap();
    let clock = Arc::new(FixedClock::new(1_000));
    let writer_one = service(&first, clock.clone(), editor());
    let writer_two = service(&second, clock, editor());

    let mut book = writer_one.create("novel", dune_draft()).unwrap();
    let id = book.id.unwrap();
    book.add_translation(BookTranslation::new("de", "Der Wüstenplanet", 1, "Herbert", 12.0))
        .unwrap();
    let german_a = writer_one
        .update(&mut book, SaveOptions::default())
        .unwrap();
    book.translation_mut("en").unwrap().price = 5.0;
    let german_b = writer_one
        .update(&mut book, SaveOptions::default())
        .unwrap();
    book.remove_translation("de").unwrap();
    writer_one
        .update(&mut book, SaveOptions::default())
        .unwrap();

    let seen_by_one = writer_one
        .repository()
        .revision_ids_with_language(id, "de")
        .unwrap();
    assert_eq!(seen_by_one, vec![german_a, german_b]);

    writer_two.delete_revision(german_b).unwrap();

    let err = writer_one.delete_revision(german_a).unwrap_err();
    assert!(matches!(err, BookServiceError::InvalidOperation(message) if message.contains("`de`")));
    assert_eq!(
        writer_one
            .repository()
            .revision_ids_with_language(id, "de")
            .unwrap(),
        vec![german_a]
    );
}

#[test]
fn exactly_one_default_revision_after_every_operation() {
    let (conn, clock) = open();
    let books = service(&conn, clock, editor());

    let mut book = books.create("novel", dune_draft()).unwrap();
    let id = book.id.unwrap();
    let r1 = book.revision_id().unwrap();
    assert_eq!(default_revision_count(&conn, id), 1);

    book.translation_mut("en").unwrap().price = 3.0;
    let r2 = books.update(&mut book, SaveOptions::default()).unwrap();
    assert_eq!(default_revision_count(&conn, id), 1);

    books.update(&mut book, SaveOptions::in_place()).unwrap();
    assert_eq!(default_revision_count(&conn, id), 1);

    books
        .revert(&RevertCommand::WholeRevision { revision_id: r1 })
        .unwrap();
    assert_eq!(default_revision_count(&conn, id), 1);

    books.delete_revision(r2).unwrap();
    assert_eq!(default_revision_count(&conn, id), 1);

    let defaults = books
        .repository()
        .revision_ids(id)
        .unwrap()
        .into_iter()
        .filter(|vid| books.load_revision(*vid).unwrap().is_default_revision())
        .count();
    assert_eq!(defaults, 1);
}
