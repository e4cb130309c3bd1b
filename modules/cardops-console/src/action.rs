use tracing::{info, warn};

use cardops_client::{BatchAction, CardOpsError};

use crate::api::ConsoleApi;
use crate::error::{ConsoleError, Result};
use crate::notice::{Notice, Outcome};
use crate::session::SessionStore;
use crate::shell::Navigation;

/// Reason sent with an approval; approvals never ask the user for one.
pub const APPROVAL_REASON: &str = "All applications approved";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DialogState {
    Closed,
    Open,
    Confirming,
}

/// Confirmation dialog for approving, rejecting or cancelling a batch.
#[derive(Debug, Clone)]
pub struct ActionDialog {
    batch_id: i64,
    action: Option<BatchAction>,
    reason: String,
    state: DialogState,
}

impl ActionDialog {
    pub fn new(batch_id: i64) -> Self {
        Self {
            batch_id,
            action: None,
            reason: String::new(),
            state: DialogState::Closed,
        }
    }

    pub fn open(&mut self, action: BatchAction) {
        self.action = Some(action);
        self.reason.clear();
        self.state = DialogState::Open;
    }

    pub fn close(&mut self) {
        self.action = None;
        self.reason.clear();
        self.state = DialogState::Closed;
    }

    pub fn is_open(&self) -> bool {
        self.state != DialogState::Closed
    }

    pub fn action(&self) -> Option<BatchAction> {
        self.action
    }

    pub fn set_reason(&mut self, reason: impl Into<String>) {
        self.reason = reason.into();
    }

    pub fn can_confirm(&self) -> bool {
        match (self.state, self.action) {
            (DialogState::Open, Some(action)) => {
                !action.requires_reason() || !self.reason.trim().is_empty()
            }
            _ => false,
        }
    }

    fn reason_to_send(&self, action: BatchAction) -> String {
        match action {
            BatchAction::Approve => APPROVAL_REASON.to_string(),
            _ => self.reason.trim().to_string(),
        }
    }

    /// Send the action. Succeeds at most once per opening of the dialog.
    pub async fn confirm(&mut self, api: &dyn ConsoleApi, session: &SessionStore) -> Result<Outcome> {
        let action = match self.action {
            Some(action) if self.can_confirm() => action,
            _ => {
                return Err(ConsoleError::NotAllowed(
                    "action cannot be confirmed".to_string(),
                ))
            }
        };

        self.state = DialogState::Confirming;
        let reason = self.reason_to_send(action);
        match api.batch_action(self.batch_id, action, &reason).await {
            Ok(()) => {
                info!(batch_id = self.batch_id, %action, "Batch action applied");
                self.close();
                Ok(Outcome::navigate(Navigation::Reload))
            }
            Err(e) => {
                self.state = DialogState::Open;
                if let Some(nav) = session.on_api_error(&e) {
                    self.close();
                    return Ok(Outcome::navigate(nav));
                }
                warn!(batch_id = self.batch_id, %action, error = %e, "Batch action failed");
                Ok(Outcome::stay().with_notice(Notice::error(
                    failure_title(action),
                    failure_text(&e),
                )))
            }
        }
    }
}

fn failure_title(action: BatchAction) -> &'static str {
    match action {
        BatchAction::Approve => "Approval failed",
        BatchAction::Reject => "Rejection failed",
        BatchAction::Cancel => "Cancellation failed",
    }
}

fn failure_text(err: &CardOpsError) -> String {
    match err {
        CardOpsError::Rejected { description, .. } => description.clone(),
        other => other.to_string(),
    }
}
