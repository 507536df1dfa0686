//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `book_entity_core` linkage.
//! - With `--demo`, run a short revision scenario against the configured
//!   database and print its timeline.

use book_entity_core::access::policy::{
    PERMISSION_ADD, PERMISSION_ADMINISTER, PERMISSION_EDIT, PERMISSION_VIEW_PUBLISHED,
};
use book_entity_core::{
    BookDraft, BookEntityType, BookService, BookTranslation, BundleRepository, CoreConfig,
    SaveOptions, SqliteBookRepository, SqliteBundleRepository, StaticAccount, SystemClock,
};
use std::error::Error;
use std::process::ExitCode;
use std::sync::Arc;

const DEMO_BUNDLE: &str = "novel";
const DEMO_ACCOUNT_ID: i64 = 1;

fn main() -> ExitCode {
    println!("book_entity_core ping={}", book_entity_core::ping());
    println!(
        "book_entity_core version={}",
        book_entity_core::core_version()
    );

    if std::env::args().skip(1).any(|arg| arg == "--demo") {
        if let Err(err) = run_demo(&CoreConfig::from_env()) {
            log::error!("event=cli_demo module=cli status=error");
            eprintln!("demo failed: {err}");
            return ExitCode::FAILURE;
        }
    }
    ExitCode::SUCCESS
}

fn run_demo(config: &CoreConfig) -> Result<(), Box<dyn Error>> {
    config.init_logging()?;
    let conn = config.open_connection()?;

    let bundles = SqliteBundleRepository::try_new(&conn)?;
    if bundles.get_bundle(DEMO_BUNDLE)?.is_none() {
        bundles.create_bundle(&BookEntityType::new(DEMO_BUNDLE, "Novel"))?;
    }
    let repo = SqliteBookRepository::try_new(&conn, Arc::new(SystemClock))?;
    let account = StaticAccount::with_permissions(
        DEMO_ACCOUNT_ID,
        [
            PERMISSION_ADD,
            PERMISSION_EDIT,
            PERMISSION_VIEW_PUBLISHED,
            PERMISSION_ADMINISTER,
        ],
    );
    let service = BookService::new(repo, bundles, account)
        .with_default_langcode(&config.default_langcode)?;

    let mut book = service.create(
        DEMO_BUNDLE,
        BookDraft::new("Dune", 9_780_441_013_593, "Frank Herbert", 9.99),
    )?;
    book.translation_mut(&config.default_langcode)
        .ok_or("default translation missing")?
        .price = 10.99;
    service.update(&mut book, SaveOptions::new_revision("Price update"))?;
    book.add_translation(BookTranslation::new(
        "fr",
        "Dune",
        9_782_266_320_481,
        "Frank Herbert",
        11.50,
    ))?;
    service.update(&mut book, SaveOptions::new_revision("French translation"))?;

    let id = book.id.ok_or("saved book without id")?;
    for langcode in [config.default_langcode.as_str(), "fr"] {
        let timeline = service.history(id, langcode)?;
        println!(
            "timeline entity={} langcode={}",
            timeline.entity_id, langcode
        );
        for row in &timeline.rows {
            println!(
                "  revision={} current={} actions={} log={}",
                row.revision_id,
                row.is_current,
                row.actions.len(),
                row.log_message.as_deref().unwrap_or("-")
            );
        }
    }
    Ok(())
}
