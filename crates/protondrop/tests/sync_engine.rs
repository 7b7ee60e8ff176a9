//! End-to-end tests for the incremental sync pass, driven through an
//! in-memory mail session.

mod common;

use chrono::DateTime;

use common::{attachment, message, received, FakeSession, Harness};
use protondrop::{ProtondropError, StorageError, SyncEngine, SyncOptions};

fn engine(folder: &str) -> SyncEngine {
    SyncEngine::new(folder, SyncOptions::default())
}

#[tokio::test]
async fn test_first_run_downloads_new_attachment() {
    let harness = Harness::new();
    let when = received(2024, 3, 5);
    let mut session = FakeSession::new(vec![(
        message(1, "Acme Corp", when),
        vec![attachment("invoice.pdf", b"%PDF-1.4")],
    )]);

    let report = engine("Invoices")
        .run(&mut session, &harness.checkpoints, &harness.writer)
        .await
        .unwrap();

    assert_eq!(report.messages_seen, 1);
    assert_eq!(report.attachments_written, 1);
    assert!(report.errors.is_empty());
    assert_eq!(report.advanced_to, Some(when));

    assert_eq!(harness.drop_files(), vec!["20240305-Acme-Corp-invoice.pdf"]);
    assert_eq!(
        harness.read_drop_file("20240305-Acme-Corp-invoice.pdf"),
        b"%PDF-1.4"
    );
    assert_eq!(harness.checkpoint_value(), when);
    assert!(session.closed);
}

#[tokio::test]
async fn test_every_new_message_processed_once() {
    let harness = Harness::new();
    let mut session = FakeSession::new(vec![
        (
            message(1, "Acme Corp", received(2024, 3, 5)),
            vec![attachment("a.pdf", b"a")],
        ),
        (
            message(2, "Beta Ltd", received(2024, 3, 6)),
            vec![attachment("b.zip", b"b")],
        ),
        (
            message(3, "Gamma Inc", received(2024, 3, 7)),
            vec![attachment("c.pdf", b"c")],
        ),
    ]);

    let report = engine("Invoices")
        .run(&mut session, &harness.checkpoints, &harness.writer)
        .await
        .unwrap();

    assert_eq!(report.messages_seen, 3);
    assert_eq!(report.attachments_written, 3);
    assert_eq!(harness.drop_files().len(), 3);
    assert_eq!(harness.checkpoint_value(), received(2024, 3, 7));
}

#[tokio::test]
async fn test_rerun_with_no_new_messages_is_a_no_op() {
    let harness = Harness::new();
    let mut session = FakeSession::new(vec![(
        message(1, "Acme Corp", received(2024, 3, 5)),
        vec![attachment("invoice.pdf", b"%PDF-1.4")],
    )]);

    engine("Invoices")
        .run(&mut session, &harness.checkpoints, &harness.writer)
        .await
        .unwrap();
    let files_after_first = harness.drop_files();
    let checkpoint_after_first = harness.checkpoint_value();

    let report = engine("Invoices")
        .run(&mut session, &harness.checkpoints, &harness.writer)
        .await
        .unwrap();

    assert_eq!(report.messages_seen, 0);
    assert_eq!(report.attachments_written, 0);
    assert!(report.advanced_to.is_none());
    assert_eq!(harness.drop_files(), files_after_first);
    assert_eq!(harness.checkpoint_value(), checkpoint_after_first);
}

#[tokio::test]
async fn test_only_messages_after_checkpoint_are_listed() {
    let harness = Harness::new();
    harness.checkpoints.save(received(2024, 3, 6)).unwrap();

    let mut session = FakeSession::new(vec![
        (
            message(1, "Old Sender", received(2024, 3, 5)),
            vec![attachment("old.pdf", b"old")],
        ),
        (
            message(2, "New Sender", received(2024, 3, 7)),
            vec![attachment("new.pdf", b"new")],
        ),
    ]);

    let report = engine("Invoices")
        .run(&mut session, &harness.checkpoints, &harness.writer)
        .await
        .unwrap();

    assert_eq!(report.messages_seen, 1);
    assert_eq!(harness.drop_files(), vec!["20240307-New-Sender-new.pdf"]);
    assert_eq!(harness.checkpoint_value(), received(2024, 3, 7));
}

#[tokio::test]
async fn test_transport_failure_aborts_without_checkpoint_advance() {
    let harness = Harness::new();
    let mut session = FakeSession::new(vec![
        (
            message(1, "Acme Corp", received(2024, 3, 5)),
            vec![attachment("first.pdf", b"first")],
        ),
        (
            message(2, "Acme Corp", received(2024, 3, 6)),
            vec![attachment("second.pdf", b"second")],
        ),
    ]);
    session.fail_fetch_for = Some(2);

    let err = engine("Invoices")
        .run(&mut session, &harness.checkpoints, &harness.writer)
        .await
        .unwrap_err();

    assert!(err.is_transient());
    // First attachment landed, but the checkpoint must not move.
    assert_eq!(harness.drop_files(), vec!["20240305-Acme-Corp-first.pdf"]);
    assert!(!harness.checkpoint_file_exists());
    assert_eq!(harness.checkpoint_value(), DateTime::UNIX_EPOCH);
    // The session is released even on the error path.
    assert!(session.closed);

    // Recovery: the next run reprocesses both messages. The already-written
    // attachment comes back under a disambiguated name.
    session.fail_fetch_for = None;
    session.closed = false;
    let report = engine("Invoices")
        .run(&mut session, &harness.checkpoints, &harness.writer)
        .await
        .unwrap();

    assert_eq!(report.messages_seen, 2);
    assert_eq!(
        harness.drop_files(),
        vec![
            "20240305-Acme-Corp-first-1.pdf",
            "20240305-Acme-Corp-first.pdf",
            "20240306-Acme-Corp-second.pdf",
        ]
    );
    assert_eq!(harness.checkpoint_value(), received(2024, 3, 6));
}

#[tokio::test]
async fn test_colliding_names_never_overwrite() {
    let harness = Harness::new();
    let mut session = FakeSession::new(vec![(
        message(1, "Acme Corp", received(2024, 3, 5)),
        vec![
            attachment("report.pdf", b"one"),
            attachment("report.pdf", b"two"),
        ],
    )]);

    let report = engine("Invoices")
        .run(&mut session, &harness.checkpoints, &harness.writer)
        .await
        .unwrap();

    assert_eq!(report.attachments_written, 2);
    assert_eq!(
        harness.drop_files(),
        vec![
            "20240305-Acme-Corp-report-1.pdf",
            "20240305-Acme-Corp-report.pdf",
        ]
    );
    assert_eq!(
        harness.read_drop_file("20240305-Acme-Corp-report.pdf"),
        b"one"
    );
    assert_eq!(
        harness.read_drop_file("20240305-Acme-Corp-report-1.pdf"),
        b"two"
    );
}

#[tokio::test]
async fn test_disallowed_extensions_are_skipped_silently() {
    let harness = Harness::new();
    let mut session = FakeSession::new(vec![(
        message(1, "Acme Corp", received(2024, 3, 5)),
        vec![
            attachment("invoice.pdf", b"pdf"),
            attachment("photo.jpg", b"jpg"),
            attachment("archive.zip", b"zip"),
        ],
    )]);

    let report = engine("Invoices")
        .run(&mut session, &harness.checkpoints, &harness.writer)
        .await
        .unwrap();

    assert_eq!(report.attachments_written, 2);
    assert!(report.errors.is_empty());
    assert_eq!(
        harness.drop_files(),
        vec![
            "20240305-Acme-Corp-archive.zip",
            "20240305-Acme-Corp-invoice.pdf",
        ]
    );
}

#[tokio::test]
async fn test_continue_mode_records_error_and_underadvances() {
    let harness = Harness::new();
    let mut session = FakeSession::new(vec![
        (
            message(1, "Acme Corp", received(2024, 3, 5)),
            vec![attachment("good.pdf", b"good")],
        ),
        (
            // A path separator in the name makes the write fail with a
            // disk-level error, standing in for an IO failure.
            message(2, "Acme Corp", received(2024, 3, 6)),
            vec![attachment("bad/doc.pdf", b"bad")],
        ),
        (
            message(3, "Acme Corp", received(2024, 3, 7)),
            vec![attachment("late.pdf", b"late")],
        ),
    ]);

    let report = engine("Invoices")
        .run(&mut session, &harness.checkpoints, &harness.writer)
        .await
        .unwrap();

    assert_eq!(report.messages_seen, 3);
    assert_eq!(report.attachments_written, 2);
    assert_eq!(report.errors.len(), 1);

    // Later messages are still written, but the checkpoint stops at the
    // last message processed cleanly before the failure.
    assert_eq!(
        harness.drop_files(),
        vec![
            "20240305-Acme-Corp-good.pdf",
            "20240307-Acme-Corp-late.pdf",
        ]
    );
    assert_eq!(harness.checkpoint_value(), received(2024, 3, 5));
    assert_eq!(report.advanced_to, Some(received(2024, 3, 5)));
}

#[tokio::test]
async fn test_stop_on_first_error_aborts_run() {
    let harness = Harness::new();
    let mut session = FakeSession::new(vec![
        (
            message(1, "Acme Corp", received(2024, 3, 5)),
            vec![attachment("good.pdf", b"good")],
        ),
        (
            message(2, "Acme Corp", received(2024, 3, 6)),
            vec![attachment("bad/doc.pdf", b"bad")],
        ),
        (
            message(3, "Acme Corp", received(2024, 3, 7)),
            vec![attachment("late.pdf", b"late")],
        ),
    ]);

    let err = SyncEngine::new(
        "Invoices",
        SyncOptions {
            stop_on_first_error: true,
        },
    )
    .run(&mut session, &harness.checkpoints, &harness.writer)
    .await
    .unwrap_err();

    assert!(matches!(
        err,
        ProtondropError::Storage(StorageError::WriteFile { .. })
    ));
    assert!(!err.is_transient());
    // The run stopped at the failure: no later files, no checkpoint.
    assert_eq!(harness.drop_files(), vec!["20240305-Acme-Corp-good.pdf"]);
    assert!(!harness.checkpoint_file_exists());
    assert!(session.closed);
}

#[tokio::test]
async fn test_message_without_matching_attachments_still_advances() {
    let harness = Harness::new();
    let mut session = FakeSession::new(vec![(
        message(1, "Acme Corp", received(2024, 3, 5)),
        vec![attachment("photo.jpg", b"jpg")],
    )]);

    let report = engine("Invoices")
        .run(&mut session, &harness.checkpoints, &harness.writer)
        .await
        .unwrap();

    assert_eq!(report.messages_seen, 1);
    assert_eq!(report.attachments_written, 0);
    assert!(harness.drop_files().is_empty());
    // The message itself was processed cleanly, so it is not re-listed.
    assert_eq!(harness.checkpoint_value(), received(2024, 3, 5));
}
