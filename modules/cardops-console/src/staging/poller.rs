//! Status polling for a staging batch.
//!
//! One fetch is in flight at a time. Each fetch is raced against the
//! cancellation token, so nothing is published after the poller is stopped.
//! Results land on a [`StatusBoard`] that ignores stale sequence numbers and
//! freezes once a terminal status has been shown.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use cardops_client::{CardOpsError, StagingStatus};

use crate::api::ConsoleApi;
use crate::error::{ConsoleError, Result};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// What the staging status view renders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusBoard {
    batch_id: i64,
    latest: Option<StagingStatus>,
    seq: u64,
}

impl StatusBoard {
    pub fn new(batch_id: i64) -> Self {
        Self {
            batch_id,
            latest: None,
            seq: 0,
        }
    }

    pub fn batch_id(&self) -> i64 {
        self.batch_id
    }

    pub fn latest(&self) -> Option<&StagingStatus> {
        self.latest.as_ref()
    }

    /// Publish a fetched status. Returns false when the update was dropped
    /// because it is older than what is shown or the board is already
    /// terminal.
    pub fn apply(&mut self, seq: u64, status: StagingStatus) -> bool {
        if seq <= self.seq || self.is_terminal() {
            return false;
        }
        self.seq = seq;
        self.latest = Some(status);
        true
    }

    pub fn is_terminal(&self) -> bool {
        self.latest.as_ref().is_some_and(|s| s.status.is_terminal())
    }

    pub fn is_validated(&self) -> bool {
        self.latest.as_ref().is_some_and(|s| s.status.is_validated())
    }

    /// Still validating (or nothing fetched yet).
    pub fn is_busy(&self) -> bool {
        !self.is_terminal()
    }

    pub fn show_error_report(&self) -> bool {
        self.is_terminal() && self.latest.as_ref().is_some_and(|s| s.invalid_count > 0)
    }

    /// Final submission needs a validated batch with at least one valid
    /// record and no submission already running.
    pub fn can_submit(&self, submitting: bool) -> bool {
        !submitting
            && self.is_validated()
            && self.latest.as_ref().is_some_and(|s| s.valid_count > 0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Terminal(StagingStatus),
    Cancelled,
}

/// Cancels its token when dropped. Every exit from the poll loop goes
/// through this, so the loop is released exactly once.
pub struct PollGuard(CancellationToken);

impl PollGuard {
    pub fn new(token: CancellationToken) -> Self {
        Self(token)
    }
}

impl Drop for PollGuard {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

/// Poll `draft_status` until the batch reaches a terminal status, the token
/// is cancelled, or the session expires. Other failures are retried on the
/// next tick.
pub async fn poll_until_terminal(
    api: &dyn ConsoleApi,
    board: &watch::Sender<StatusBoard>,
    interval: Duration,
    cancel: &CancellationToken,
) -> std::result::Result<PollOutcome, CardOpsError> {
    let batch_id = board.borrow().batch_id();
    let mut seq = 0u64;

    loop {
        seq += 1;
        let fetched = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(batch_id, "Status polling cancelled");
                return Ok(PollOutcome::Cancelled);
            }
            result = api.draft_status(batch_id) => result,
        };

        match fetched {
            Ok(status) => {
                let terminal = status.status.is_terminal();
                debug!(batch_id, seq, status = %status.status, "Staging status");
                board.send_if_modified(|b| b.apply(seq, status.clone()));
                if terminal {
                    info!(
                        batch_id,
                        status = %status.status,
                        total = status.total_count,
                        valid = status.valid_count,
                        invalid = status.invalid_count,
                        "Validation finished"
                    );
                    return Ok(PollOutcome::Terminal(status));
                }
            }
            Err(e) if e.is_session_expired() => return Err(e),
            Err(e) => warn!(batch_id, error = %e, "Status poll failed, retrying"),
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(batch_id, "Status polling cancelled");
                return Ok(PollOutcome::Cancelled);
            }
            _ = tokio::time::sleep(interval) => {}
        }
    }
}

/// A background poller bound to one staging batch. Dropping the handle
/// stops the poller.
pub struct PollHandle {
    cancel: CancellationToken,
    board: watch::Receiver<StatusBoard>,
    task: Option<JoinHandle<std::result::Result<PollOutcome, CardOpsError>>>,
}

impl PollHandle {
    pub fn spawn(api: Arc<dyn ConsoleApi>, batch_id: i64, interval: Duration) -> Self {
        let cancel = CancellationToken::new();
        let (tx, rx) = watch::channel(StatusBoard::new(batch_id));

        let token = cancel.clone();
        let task = tokio::spawn(async move {
            let _guard = PollGuard::new(token.clone());
            poll_until_terminal(api.as_ref(), &tx, interval, &token).await
        });

        Self {
            cancel,
            board: rx,
            task: Some(task),
        }
    }

    pub fn board(&self) -> StatusBoard {
        self.board.borrow().clone()
    }

    /// Wait for the next published status. Returns false once the poller
    /// has stopped publishing.
    pub async fn changed(&mut self) -> bool {
        self.board.changed().await.is_ok()
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Wait for the poller to end and report how it ended.
    pub async fn finish(mut self) -> Result<PollOutcome> {
        let Some(task) = self.task.take() else {
            return Ok(PollOutcome::Cancelled);
        };
        match task.await {
            Ok(outcome) => Ok(outcome?),
            Err(e) => Err(ConsoleError::Task(e.to_string())),
        }
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self, Failure, ScriptedApi};

    fn board_with(status: StagingStatus) -> StatusBoard {
        let mut board = StatusBoard::new(7);
        assert!(board.apply(1, status));
        board
    }

    #[test]
    fn stale_updates_are_ignored() {
        let mut board = StatusBoard::new(7);
        assert!(board.apply(2, testing::status("VALIDATING", 0, 0, 0)));
        assert!(!board.apply(1, testing::status("VALIDATED", 5, 5, 0)));
        assert!(board.is_busy());
    }

    #[test]
    fn terminal_board_is_frozen() {
        let mut board = board_with(testing::status("VALIDATED", 10, 8, 2));
        assert!(!board.apply(2, testing::status("VALIDATING", 0, 0, 0)));
        assert!(board.is_terminal());
        assert_eq!(board.latest().unwrap().valid_count, 8);
    }

    #[test]
    fn validated_batch_offers_report_and_submit() {
        let board = board_with(testing::status("VALIDATED", 10, 8, 2));
        assert!(board.show_error_report());
        assert!(board.can_submit(false));
        assert!(!board.can_submit(true));
    }

    #[test]
    fn completed_counts_as_validated() {
        let board = board_with(testing::status("COMPLETED", 3, 3, 0));
        assert!(board.is_terminal());
        assert!(board.can_submit(false));
        assert!(!board.show_error_report());
    }

    #[test]
    fn empty_batch_cannot_be_submitted() {
        let board = board_with(testing::status("VALIDATED", 0, 0, 0));
        assert!(board.is_terminal());
        assert!(!board.show_error_report());
        assert!(!board.can_submit(false));
    }

    #[test]
    fn failed_batch_only_offers_the_report() {
        let board = board_with(testing::status("FAILED", 4, 0, 4));
        assert!(board.show_error_report());
        assert!(!board.can_submit(false));
    }

    #[test]
    fn nothing_is_offered_while_validating() {
        let board = board_with(testing::status("VALIDATING", 10, 0, 0));
        assert!(board.is_busy());
        assert!(!board.show_error_report());
        assert!(!board.can_submit(false));
    }

    #[tokio::test(start_paused = true)]
    async fn polls_until_terminal_then_stops() {
        let api = ScriptedApi::new().with_statuses(vec![
            Ok(testing::status("VALIDATING", 0, 0, 0)),
            Ok(testing::status("VALIDATING", 10, 0, 0)),
            Ok(testing::status("VALIDATED", 10, 8, 2)),
        ]);
        let (tx, rx) = watch::channel(StatusBoard::new(7));
        let cancel = CancellationToken::new();

        let outcome = poll_until_terminal(&api, &tx, DEFAULT_POLL_INTERVAL, &cancel)
            .await
            .unwrap();

        assert!(matches!(outcome, PollOutcome::Terminal(ref s) if s.valid_count == 8));
        assert_eq!(api.count("draft_status"), 3);
        assert!(rx.borrow().show_error_report());
        assert!(rx.borrow().can_submit(false));
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_keep_polling() {
        let api = ScriptedApi::new().with_statuses(vec![
            Err(Failure::Network),
            Err(Failure::Server(503)),
            Err(Failure::rejected("Temporarily unavailable")),
            Ok(testing::status("FAILED", 2, 0, 2)),
        ]);
        let (tx, _rx) = watch::channel(StatusBoard::new(7));
        let cancel = CancellationToken::new();

        let outcome = poll_until_terminal(&api, &tx, DEFAULT_POLL_INTERVAL, &cancel)
            .await
            .unwrap();

        assert!(matches!(outcome, PollOutcome::Terminal(_)));
        assert_eq!(api.count("draft_status"), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_polls_keep_the_last_good_status() {
        let api = Arc::new(ScriptedApi::new().with_statuses(vec![
            Ok(testing::status("VALIDATING", 4, 1, 0)),
            Err(Failure::Network),
            Err(Failure::Server(503)),
            Ok(testing::status("VALIDATING", 4, 3, 0)),
        ]));
        let handle = PollHandle::spawn(api.clone(), 7, DEFAULT_POLL_INTERVAL);

        // Polls at 0 s, 3 s and 6 s; the last two fail.
        tokio::time::sleep(DEFAULT_POLL_INTERVAL * 2 + Duration::from_millis(10)).await;
        assert_eq!(api.count("draft_status"), 3);
        let board = handle.board();
        assert_eq!(board.latest(), Some(&testing::status("VALIDATING", 4, 1, 0)));
        assert!(board.is_busy());
        assert!(!board.is_terminal());

        tokio::time::sleep(DEFAULT_POLL_INTERVAL).await;
        assert_eq!(handle.board().latest().unwrap().valid_count, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_session_ends_polling() {
        let api = ScriptedApi::new().with_statuses(vec![Err(Failure::Unauthorized)]);
        let (tx, _rx) = watch::channel(StatusBoard::new(7));
        let cancel = CancellationToken::new();

        let err = poll_until_terminal(&api, &tx, DEFAULT_POLL_INTERVAL, &cancel)
            .await
            .unwrap_err();

        assert!(err.is_session_expired());
        assert_eq!(api.count("draft_status"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stopping_discards_the_in_flight_response() {
        let api = Arc::new(
            ScriptedApi::new()
                .with_statuses(vec![Ok(testing::status("VALIDATED", 1, 1, 0))])
                .with_status_delay(Duration::from_secs(10)),
        );
        let handle = PollHandle::spawn(api.clone(), 7, DEFAULT_POLL_INTERVAL);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(api.count("draft_status"), 1);
        handle.stop();

        let board = handle.board();
        assert_eq!(handle.finish().await.unwrap(), PollOutcome::Cancelled);
        assert!(board.latest().is_none());

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(api.count("draft_status"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_handle_stops_polling() {
        let api = Arc::new(
            ScriptedApi::new().with_statuses(vec![Ok(testing::status("VALIDATING", 0, 0, 0))]),
        );
        let handle = PollHandle::spawn(api.clone(), 7, DEFAULT_POLL_INTERVAL);

        tokio::time::sleep(DEFAULT_POLL_INTERVAL + Duration::from_millis(100)).await;
        let polled = api.count("draft_status");
        assert_eq!(polled, 2);

        drop(handle);
        tokio::time::sleep(DEFAULT_POLL_INTERVAL * 10).await;
        assert_eq!(api.count("draft_status"), polled);
    }

    #[tokio::test(start_paused = true)]
    async fn handle_publishes_each_status() {
        let api = Arc::new(ScriptedApi::new().with_statuses(vec![
            Ok(testing::status("VALIDATING", 0, 0, 0)),
            Ok(testing::status("VALIDATED", 4, 4, 0)),
        ]));
        let mut handle = PollHandle::spawn(api, 9, DEFAULT_POLL_INTERVAL);

        while handle.changed().await {
            if handle.board().is_terminal() {
                break;
            }
        }
        let board = handle.board();
        assert_eq!(board.batch_id(), 9);
        assert!(board.can_submit(false));
        assert!(matches!(
            handle.finish().await.unwrap(),
            PollOutcome::Terminal(_)
        ));
    }
}
