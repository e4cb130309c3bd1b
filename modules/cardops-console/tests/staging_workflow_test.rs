//! End-to-end staging workflow against the scripted backend:
//! create form → upload → validate → poll → error report → submit.
//!
//! Time is paused, so the 3 s poll interval runs instantly.

use std::sync::Arc;
use std::time::Duration;

use cardops_client::{BatchAction, DraftCreated, ErrorReportRef, UploadedFile};
use cardops_console::action::ActionDialog;
use cardops_console::batches;
use cardops_console::bulk_file;
use cardops_console::staging::{
    download_error_report, EntryMode, PollHandle, PollOutcome, SubmitControl, UploadForm,
    UploadStatus, DEFAULT_POLL_INTERVAL,
};
use cardops_console::testing::{self, Failure, ScriptedApi};
use cardops_console::{Navigation, Route, SessionStore};

fn signed_in(permissions: &[&str]) -> SessionStore {
    let session = SessionStore::new();
    let acme = testing::corporate(1, "ACME");
    session.set_user(Some(testing::user(permissions, vec![acme.clone()])));
    session.select_corporate(Some(acme));
    session.finish_loading();
    session
}

fn bulk_form(session: &SessionStore) -> UploadForm {
    let mut form = UploadForm::for_session(&session.snapshot()).unwrap();
    form.select_product(&[testing::product(3, "GIFT", "ACTIVE")], "GIFT")
        .unwrap();
    form.mode = EntryMode::Bulk;
    form
}

async fn drain(handle: &mut PollHandle) {
    while handle.changed().await {
        if handle.board().is_terminal() {
            break;
        }
    }
}

// ---------------------------------------------------------------------------
// Happy path
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn bulk_upload_through_submission() {
    let api = Arc::new(
        ScriptedApi::new()
            .with_upload(Ok(UploadedFile {
                file_name: "uploads/bulk_application.csv".to_string(),
            }))
            .with_validate(Ok(DraftCreated {
                draft_id: 501,
                status: Some("VALIDATING".to_string()),
            }))
            .with_statuses(vec![
                Ok(testing::status("VALIDATING", 100, 0, 0)),
                Ok(testing::status("VALIDATED", 100, 95, 5)),
            ])
            .with_error_report(Ok(ErrorReportRef {
                file_path: Some("reports/501/errors.csv".to_string()),
            }))
            .with_file("errors.csv", b"row,reason\n7,invalid mobile\n")
            .with_submit(Ok(())),
    );
    let session = signed_in(&["applications.create"]);

    // Upload and validate.
    let mut form = bulk_form(&session);
    let sample = bulk_file::sample_csv().unwrap();
    form.upload(api.as_ref(), &session, bulk_file::SAMPLE_FILE_NAME, sample)
        .await
        .unwrap();
    assert!(form.can_validate());

    let outcome = form.submit(api.as_ref(), &session).await.unwrap();
    let Navigation::To(Route::StagingStatus(id)) = outcome.navigation else {
        panic!("expected staging status route, got {:?}", outcome.navigation);
    };
    assert_eq!(id, 501);
    let request = api.last_staging_request().unwrap();
    assert_eq!(request.file_path.as_deref(), Some("uploads/bulk_application.csv"));
    assert!(request.is_bulk);

    // Poll until validated.
    let mut handle = PollHandle::spawn(api.clone(), id, DEFAULT_POLL_INTERVAL);
    drain(&mut handle).await;
    let board = handle.board();
    assert!(matches!(handle.finish().await.unwrap(), PollOutcome::Terminal(_)));
    assert!(board.show_error_report());
    assert!(board.can_submit(false));

    // Polling has stopped.
    let polls = api.count("draft_status");
    assert_eq!(polls, 2);
    tokio::time::sleep(DEFAULT_POLL_INTERVAL * 5).await;
    assert_eq!(api.count("draft_status"), polls);

    // Error report.
    let dir = std::env::temp_dir().join(format!("cardops-workflow-{}", std::process::id()));
    let outcome = download_error_report(api.as_ref(), &session, id, &dir).await;
    assert_eq!(outcome.notices[0].title, "Download started");
    assert!(dir.join("errors.csv").exists());
    std::fs::remove_dir_all(&dir).ok();

    // Submit.
    let mut submit = SubmitControl::new();
    let outcome = submit.submit(api.as_ref(), &session, &board).await.unwrap();
    assert_eq!(outcome.navigation, Navigation::To(Route::Applications));
}

// ---------------------------------------------------------------------------
// Gates
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn empty_batch_keeps_submit_disabled() {
    let api = Arc::new(
        ScriptedApi::new().with_statuses(vec![Ok(testing::status("VALIDATED", 0, 0, 0))]),
    );
    let mut handle = PollHandle::spawn(api, 9, DEFAULT_POLL_INTERVAL);
    drain(&mut handle).await;

    let board = handle.board();
    assert!(board.is_terminal());
    assert!(!board.can_submit(false));
    assert!(!board.show_error_report());
    assert!(!SubmitControl::new().is_enabled(&board));
}

#[tokio::test]
async fn validate_stays_disabled_unless_upload_succeeded() {
    let api = ScriptedApi::new().with_upload(Err(Failure::Server(500)));
    let session = signed_in(&["applications.create"]);
    let mut form = bulk_form(&session);

    assert!(!form.can_validate());

    let outcome = form
        .upload(&api, &session, "cards.csv", b"kitNumber\n".to_vec())
        .await
        .unwrap();
    assert_eq!(outcome.notices[0].title, "Upload Failed");
    assert!(matches!(form.upload_status(), UploadStatus::Failed(_)));
    assert!(!form.can_validate());
    assert!(form.submit(&api, &session).await.is_err());
    assert_eq!(api.count("validate_draft"), 0);
}

#[tokio::test]
async fn unauthorized_validation_resets_session() {
    let api = ScriptedApi::new().with_validate(Err(Failure::Unauthorized));
    let session = signed_in(&["applications.create"]);

    let mut form = UploadForm::for_session(&session.snapshot()).unwrap();
    form.product_code = "GIFT".to_string();
    form.mode = EntryMode::Single;
    form.entry = bulk_file::sample_entry();

    let outcome = form.submit(&api, &session).await.unwrap();
    assert_eq!(outcome.navigation, Navigation::To(Route::Login));

    let snapshot = session.snapshot();
    assert!(snapshot.user.is_none());
    assert!(snapshot.selected_corporate.is_none());
}

// ---------------------------------------------------------------------------
// Polling robustness
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn polling_survives_outages_and_stops_on_navigation() {
    let api = Arc::new(ScriptedApi::new().with_statuses(vec![
        Err(Failure::Network),
        Ok(testing::status("VALIDATING", 50, 0, 0)),
        Err(Failure::Server(502)),
        Ok(testing::status("VALIDATING", 50, 10, 0)),
    ]));
    let handle = PollHandle::spawn(api.clone(), 11, DEFAULT_POLL_INTERVAL);

    tokio::time::sleep(DEFAULT_POLL_INTERVAL * 4 + Duration::from_millis(10)).await;
    assert_eq!(api.count("draft_status"), 5);
    let board = handle.board();
    assert!(board.is_busy());
    assert_eq!(board.latest().unwrap().valid_count, 10);

    // Leaving the view.
    drop(handle);
    tokio::time::sleep(DEFAULT_POLL_INTERVAL * 10).await;
    assert_eq!(api.count("draft_status"), 5);
}

#[tokio::test(start_paused = true)]
async fn session_expiry_while_polling_ends_the_watch() {
    let api = Arc::new(ScriptedApi::new().with_statuses(vec![
        Ok(testing::status("VALIDATING", 5, 0, 0)),
        Err(Failure::Unauthorized),
    ]));
    let session = signed_in(&[]);
    let handle = PollHandle::spawn(api.clone(), 12, DEFAULT_POLL_INTERVAL);

    let err = handle.finish().await.unwrap_err();
    assert!(err.is_session_expired());
    if let cardops_console::ConsoleError::Api(e) = &err {
        assert_eq!(
            session.on_api_error(e),
            Some(Navigation::To(Route::Login))
        );
    }
    assert!(!session.snapshot().is_authenticated());
    assert_eq!(api.count("draft_status"), 2);
}

// ---------------------------------------------------------------------------
// Batch actions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn reject_from_batch_details_needs_reason() {
    let api = ScriptedApi::new()
        .with_batches(testing::page(vec![testing::batch(77, "PENDING_APPROVAL")], 1, 1))
        .with_applications(testing::page(vec![testing::record(1, 77, "PENDING")], 1, 10))
        .with_action(Ok(()));
    let session = signed_in(&["applications.view", "applications.reject"]);

    let details = batches::load_batch_details(&api, 77, 0, batches::DEFAULT_PAGE_SIZE)
        .await
        .unwrap();
    let actions = details.available_actions(&session.snapshot());
    assert_eq!(actions, vec![BatchAction::Reject]);

    let mut dialog = ActionDialog::new(77);
    dialog.open(BatchAction::Reject);
    assert!(!dialog.can_confirm());
    dialog.set_reason("Duplicate batch");
    assert!(dialog.can_confirm());

    let outcome = dialog.confirm(&api, &session).await.unwrap();
    assert_eq!(outcome.navigation, Navigation::Reload);
    assert_eq!(
        api.last_action(),
        Some((77, BatchAction::Reject, "Duplicate batch".to_string()))
    );
}

// ---------------------------------------------------------------------------
// Bulk file
// ---------------------------------------------------------------------------

#[test]
fn downloaded_sample_reuploads_unchanged() {
    let sample = bulk_file::sample_csv().unwrap();
    let header = sample.split(|b| *b == b'\n').next().unwrap();
    assert_eq!(header, bulk_file::HEADERS.join(",").as_bytes());

    let entries = bulk_file::parse_entries(&sample).unwrap();
    assert_eq!(bulk_file::write_entries(&entries).unwrap(), sample);
}
