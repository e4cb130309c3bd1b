use std::sync::Arc;

use tracing::{info, warn};

use cardops_client::Corporate;

use crate::api::ConsoleApi;
use crate::config::ConsoleConfig;
use crate::error::{ConsoleError, Result};
use crate::login::sign_in;
use crate::notice::Outcome;
use crate::session::{SessionSnapshot, SessionStore};
use crate::shell::{check_health, guard, Guard, HealthStatus, Navigation, Route};

/// A running console: backend handle, session and configuration.
pub struct Console {
    pub api: Arc<dyn ConsoleApi>,
    pub session: SessionStore,
    pub config: ConsoleConfig,
}

impl Console {
    pub fn new(api: Arc<dyn ConsoleApi>, config: ConsoleConfig) -> Self {
        let session = SessionStore::new().with_preferred_corporate(config.corporate.clone());
        Self {
            api,
            session,
            config,
        }
    }

    /// Health gate, then the session probe. When no session exists and
    /// credentials are configured, signs in with them.
    pub async fn start(&self) -> Result<Arc<SessionSnapshot>> {
        if check_health(self.api.as_ref()).await == HealthStatus::Down {
            return Err(ConsoleError::BackendDown);
        }

        self.session.check_session(self.api.as_ref()).await;
        if self.session.snapshot().is_authenticated() {
            return Ok(self.session.snapshot());
        }

        if let Some((email, password)) = self.config.credentials() {
            let outcome = sign_in(self.api.as_ref(), &self.session, email, password).await?;
            if let Some(notice) = failed_sign_in(&outcome) {
                warn!(reason = %notice, "Configured credentials were not accepted");
                return Err(ConsoleError::NotAllowed(notice));
            }
        }

        let snapshot = self.session.snapshot();
        info!(
            signed_in = snapshot.is_authenticated(),
            corporate = snapshot.selected_corporate.as_ref().map(|c| c.code.as_str()),
            "Console ready"
        );
        Ok(snapshot)
    }

    /// Session snapshot for `route`, or an error when the guard would
    /// redirect to login.
    pub fn enter(&self, route: &Route) -> Result<Arc<SessionSnapshot>> {
        let snapshot = self.session.snapshot();
        match guard(route, &snapshot) {
            Guard::Allow => Ok(snapshot),
            Guard::Loading | Guard::Redirect(_) => Err(ConsoleError::Unauthenticated),
        }
    }

    pub fn require_permission(&self, code: &str) -> Result<()> {
        if self.session.snapshot().has_permission(code) {
            Ok(())
        } else {
            Err(ConsoleError::NotAllowed(format!("missing permission {code}")))
        }
    }

    pub fn selected_corporate(&self) -> Result<Corporate> {
        self.session
            .snapshot()
            .selected_corporate
            .clone()
            .ok_or(ConsoleError::NoCorporate)
    }
}

fn failed_sign_in(outcome: &Outcome) -> Option<String> {
    if outcome.navigation == Navigation::To(Route::Dashboard) {
        return None;
    }
    Some(
        outcome
            .notices
            .first()
            .map(|n| n.description.clone())
            .unwrap_or_else(|| "sign-in did not complete".to_string()),
    )
}
