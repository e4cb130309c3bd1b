use tracing::{info, warn};

use cardops_client::CardOpsError;

use crate::api::ConsoleApi;
use crate::error::{ConsoleError, Result};
use crate::notice::{Notice, Outcome};
use crate::session::SessionStore;
use crate::shell::{Navigation, Route};
use crate::staging::poller::StatusBoard;

/// Final "Submit" control of the staging status view.
#[derive(Debug, Default)]
pub struct SubmitControl {
    submitting: bool,
}

impl SubmitControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    pub fn is_enabled(&self, board: &StatusBoard) -> bool {
        board.can_submit(self.submitting)
    }

    /// Submit the validated batch shown on `board`.
    pub async fn submit(
        &mut self,
        api: &dyn ConsoleApi,
        session: &SessionStore,
        board: &StatusBoard,
    ) -> Result<Outcome> {
        if !self.is_enabled(board) {
            return Err(ConsoleError::NotAllowed(format!(
                "batch {} is not ready for submission",
                board.batch_id()
            )));
        }

        self.submitting = true;
        let result = api.submit_draft(board.batch_id()).await;
        self.submitting = false;

        Ok(submission_outcome(board.batch_id(), result, session))
    }
}

/// Submit a staging batch without a status board, e.g. from the CLI after
/// a separate status check.
pub async fn submit_batch(api: &dyn ConsoleApi, session: &SessionStore, batch_id: i64) -> Result<Outcome> {
    let status = api.draft_status(batch_id).await?;
    let mut board = StatusBoard::new(batch_id);
    board.apply(1, status);
    SubmitControl::new().submit(api, session, &board).await
}

fn submission_outcome(
    batch_id: i64,
    result: cardops_client::Result<()>,
    session: &SessionStore,
) -> Outcome {
    match result {
        Ok(()) => {
            info!(batch_id, "Staging batch submitted");
            Outcome::navigate(Navigation::To(Route::Applications)).with_notice(Notice::success(
                "Submitted",
                "Applications submitted successfully.",
            ))
        }
        Err(e) => {
            if let Some(nav) = session.on_api_error(&e) {
                return Outcome::navigate(nav);
            }
            warn!(batch_id, error = %e, "Submission failed");
            Outcome::stay().with_notice(Notice::error("Submission Failed", failure_text(&e)))
        }
    }
}

fn failure_text(err: &CardOpsError) -> String {
    match err {
        CardOpsError::Rejected { description, .. } => description.clone(),
        _ => "Something went wrong. Please try again.".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self, Failure, ScriptedApi};

    fn validated(total: u64, valid: u64, invalid: u64) -> StatusBoard {
        let mut board = StatusBoard::new(7);
        board.apply(1, testing::status("VALIDATED", total, valid, invalid));
        board
    }

    #[tokio::test]
    async fn success_navigates_to_applications() {
        let api = ScriptedApi::new().with_submit(Ok(()));
        let session = SessionStore::new();
        let mut control = SubmitControl::new();

        let outcome = control
            .submit(&api, &session, &validated(10, 8, 2))
            .await
            .unwrap();

        assert_eq!(outcome.navigation, Navigation::To(Route::Applications));
        assert!(!outcome.notices[0].is_error());
        assert!(!control.is_submitting());
    }

    #[tokio::test]
    async fn rejection_stays_with_backend_description() {
        let api = ScriptedApi::new().with_submit(Err(Failure::rejected("Batch already submitted")));
        let session = SessionStore::new();

        let outcome = SubmitControl::new()
            .submit(&api, &session, &validated(3, 3, 0))
            .await
            .unwrap();

        assert_eq!(outcome.navigation, Navigation::Stay);
        assert_eq!(outcome.notices[0].description, "Batch already submitted");
    }

    #[tokio::test]
    async fn empty_or_unvalidated_batches_are_refused_locally() {
        let api = ScriptedApi::new().with_submit(Ok(()));
        let session = SessionStore::new();
        let mut control = SubmitControl::new();

        assert!(control.submit(&api, &session, &validated(0, 0, 0)).await.is_err());
        assert!(control
            .submit(&api, &session, &StatusBoard::new(7))
            .await
            .is_err());
        assert_eq!(api.count("submit_draft"), 0);
    }

    #[tokio::test]
    async fn submit_batch_checks_status_first() {
        let api = ScriptedApi::new()
            .with_statuses(vec![Ok(testing::status("VALIDATING", 0, 0, 0))])
            .with_submit(Ok(()));
        let session = SessionStore::new();

        assert!(submit_batch(&api, &session, 7).await.is_err());
        assert_eq!(api.calls(), vec!["draft_status"]);
    }

    #[tokio::test]
    async fn expired_session_goes_to_login() {
        let api = ScriptedApi::new().with_submit(Err(Failure::Unauthorized));
        let session = SessionStore::new();
        session.set_user(Some(testing::user(&[], vec![])));

        let outcome = SubmitControl::new()
            .submit(&api, &session, &validated(1, 1, 0))
            .await
            .unwrap();

        assert_eq!(outcome.navigation, Navigation::To(Route::Login));
        assert!(!session.snapshot().is_authenticated());
    }
}
