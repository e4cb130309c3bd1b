//! Two-step sign-in (email, then password) and sign-out.

use tracing::{info, warn};

use cardops_client::CardOpsError;

use crate::api::ConsoleApi;
use crate::error::{ConsoleError, Result};
use crate::notice::{Notice, Outcome};
use crate::session::SessionStore;
use crate::shell::{Navigation, Route};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginStep {
    Email,
    Password { email: String },
    /// The account only allows SSO, which the console does not offer.
    SsoUnsupported { email: String },
    Unavailable { email: String },
}

#[derive(Debug, Clone)]
pub struct LoginFlow {
    step: LoginStep,
}

impl LoginFlow {
    pub fn new() -> Self {
        Self {
            step: LoginStep::Email,
        }
    }

    pub fn step(&self) -> &LoginStep {
        &self.step
    }

    /// Back to the email step.
    pub fn restart(&mut self) {
        self.step = LoginStep::Email;
    }

    /// Ask the backend which sign-in methods the email supports.
    pub async fn submit_email(&mut self, api: &dyn ConsoleApi, email: &str) -> Outcome {
        let email = email.trim().to_string();
        match api.auth_options(&email).await {
            Ok(options) if options.password_enabled => {
                self.step = LoginStep::Password { email };
                Outcome::stay()
            }
            Ok(options) if options.sso_enabled => {
                self.step = LoginStep::SsoUnsupported { email };
                Outcome::stay().with_notice(Notice::error(
                    "SSO not available",
                    "SSO login is enabled for your account. SSO flow is not implemented yet.",
                ))
            }
            Ok(_) => {
                self.step = LoginStep::Unavailable { email };
                Outcome::stay().with_notice(Notice::error(
                    "Login unavailable",
                    "Login method not available.",
                ))
            }
            Err(e) => {
                warn!(error = %e, "Auth options lookup failed");
                Outcome::stay().with_notice(Notice::error("Login failed", failure_text(&e)))
            }
        }
    }

    /// Sign in with the password, load the session and go to the dashboard.
    pub async fn submit_password(
        &mut self,
        api: &dyn ConsoleApi,
        session: &SessionStore,
        password: &str,
    ) -> Result<Outcome> {
        let LoginStep::Password { email } = &self.step else {
            return Err(ConsoleError::NotAllowed(
                "password step not reached".to_string(),
            ));
        };

        if let Err(e) = api.login(email, password).await {
            warn!(error = %e, "Login failed");
            return Ok(Outcome::stay().with_notice(Notice::error("Login failed", failure_text(&e))));
        }

        session.check_session(api).await;
        if !session.snapshot().is_authenticated() {
            return Ok(Outcome::stay().with_notice(Notice::error(
                "Login failed",
                "Signed in but no session was established. Please try again.",
            )));
        }

        info!(user = %email, "Signed in");
        self.step = LoginStep::Email;
        Ok(Outcome::navigate(Navigation::To(Route::Dashboard)))
    }
}

impl Default for LoginFlow {
    fn default() -> Self {
        Self::new()
    }
}

/// Both login steps in one go. Used by the CLI with configured credentials.
pub async fn sign_in(
    api: &dyn ConsoleApi,
    session: &SessionStore,
    email: &str,
    password: &str,
) -> Result<Outcome> {
    let mut flow = LoginFlow::new();
    let outcome = flow.submit_email(api, email).await;
    if !matches!(flow.step(), LoginStep::Password { .. }) {
        return Ok(outcome);
    }
    flow.submit_password(api, session, password).await
}

/// Sign out and return to the login screen.
pub async fn logout(api: &dyn ConsoleApi, session: &SessionStore) -> Outcome {
    match api.logout().await {
        Ok(()) => {
            session.set_user(None);
            info!("Signed out");
            Outcome::navigate(Navigation::To(Route::Login))
        }
        Err(e) if e.is_session_expired() => {
            session.clear();
            Outcome::navigate(Navigation::To(Route::Login))
        }
        Err(e) => {
            warn!(error = %e, "Logout failed");
            Outcome::stay().with_notice(Notice::error(
                "Logout failed",
                "Logout failed. Please try again.",
            ))
        }
    }
}

fn failure_text(err: &CardOpsError) -> String {
    match err {
        CardOpsError::Rejected { description, .. } => description.clone(),
        CardOpsError::SessionExpired => "Invalid email or password.".to_string(),
        _ => "An unexpected error occurred. Please try again.".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self, Failure, ScriptedApi};

    #[tokio::test]
    async fn password_accounts_reach_the_dashboard() {
        let api = ScriptedApi::new()
            .with_auth_options(true, false)
            .with_user(testing::user(&["dashboard.view"], vec![testing::corporate(1, "ACME")]));
        let session = SessionStore::new();
        let mut flow = LoginFlow::new();

        let outcome = flow.submit_email(&api, " jane@example.com ").await;
        assert!(outcome.notices.is_empty());
        assert_eq!(
            flow.step(),
            &LoginStep::Password {
                email: "jane@example.com".to_string()
            }
        );

        let outcome = flow.submit_password(&api, &session, "secret").await.unwrap();
        assert_eq!(outcome.navigation, Navigation::To(Route::Dashboard));
        assert!(session.snapshot().is_authenticated());
        assert_eq!(api.calls(), vec!["auth_options", "login", "me"]);
    }

    #[tokio::test]
    async fn sso_only_accounts_stop_at_email() {
        let api = ScriptedApi::new().with_auth_options(false, true);
        let mut flow = LoginFlow::new();

        let outcome = flow.submit_email(&api, "sso@example.com").await;
        assert!(matches!(flow.step(), LoginStep::SsoUnsupported { .. }));
        assert!(outcome.notices[0].is_error());
    }

    #[tokio::test]
    async fn accounts_without_methods_are_unavailable() {
        let api = ScriptedApi::new().with_auth_options(false, false);
        let mut flow = LoginFlow::new();
        flow.submit_email(&api, "x@example.com").await;
        assert!(matches!(flow.step(), LoginStep::Unavailable { .. }));
    }

    #[tokio::test]
    async fn wrong_password_stays_on_password_step() {
        let api = ScriptedApi::new()
            .with_auth_options(true, false)
            .with_login(Err(Failure::rejected("Invalid credentials")));
        let session = SessionStore::new();

        let outcome = sign_in(&api, &session, "jane@example.com", "nope")
            .await
            .unwrap();
        assert_eq!(outcome.navigation, Navigation::Stay);
        assert_eq!(outcome.notices[0].description, "Invalid credentials");
        assert_eq!(api.count("me"), 0);
    }

    #[tokio::test]
    async fn password_before_email_is_refused() {
        let api = ScriptedApi::new();
        let session = SessionStore::new();
        let mut flow = LoginFlow::new();
        assert!(flow.submit_password(&api, &session, "secret").await.is_err());
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn logout_clears_session() {
        let api = ScriptedApi::new();
        let session = SessionStore::new();
        session.set_user(Some(testing::user(&[], vec![testing::corporate(1, "ACME")])));
        session.select_corporate(Some(testing::corporate(1, "ACME")));

        let outcome = logout(&api, &session).await;
        assert_eq!(outcome.navigation, Navigation::To(Route::Login));
        let snap = session.snapshot();
        assert!(!snap.is_authenticated());
        assert!(snap.selected_corporate.is_none());
    }
}
