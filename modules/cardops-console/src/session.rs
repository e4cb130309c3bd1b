//! Process-wide session state: current user, permissions, selected corporate.
//!
//! Readers take one immutable [`SessionSnapshot`] per render and never see a
//! half-applied update. All writes go through the store's own methods.

use std::sync::Arc;

use arc_swap::ArcSwap;
use tracing::{debug, info};

use cardops_client::{CardOpsError, Corporate, User};

use crate::api::ConsoleApi;
use crate::error::{ConsoleError, Result};
use crate::shell::{Navigation, Route};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub user: Option<User>,
    pub loading: bool,
    pub selected_corporate: Option<Corporate>,
}

impl SessionSnapshot {
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    pub fn has_permission(&self, code: &str) -> bool {
        self.user.as_ref().is_some_and(|u| u.has_permission(code))
    }

    pub fn has_any_permission(&self, codes: &[&str]) -> bool {
        codes.iter().any(|code| self.has_permission(code))
    }
}

pub struct SessionStore {
    state: ArcSwap<SessionSnapshot>,
    preferred_corporate: Option<String>,
}

impl SessionStore {
    /// A store still waiting for its first session probe.
    pub fn new() -> Self {
        Self {
            state: ArcSwap::from_pointee(SessionSnapshot {
                loading: true,
                ..Default::default()
            }),
            preferred_corporate: None,
        }
    }

    /// Prefer this corporate code when the user belongs to several.
    pub fn with_preferred_corporate(mut self, code: Option<String>) -> Self {
        self.preferred_corporate = code;
        self
    }

    pub fn snapshot(&self) -> Arc<SessionSnapshot> {
        self.state.load_full()
    }

    /// Replace the user. Clearing the user also clears the corporate.
    pub fn set_user(&self, user: Option<User>) {
        self.state.rcu(|current| {
            let selected_corporate = match &user {
                Some(_) => current.selected_corporate.clone(),
                None => None,
            };
            SessionSnapshot {
                user: user.clone(),
                loading: current.loading,
                selected_corporate,
            }
        });
    }

    pub fn select_corporate(&self, corporate: Option<Corporate>) {
        self.state.rcu(|current| SessionSnapshot {
            selected_corporate: corporate.clone(),
            ..SessionSnapshot::clone(current)
        });
    }

    /// Select one of the signed-in user's corporates by code.
    pub fn select_corporate_by_code(&self, code: &str) -> Result<Corporate> {
        let snapshot = self.snapshot();
        let user = snapshot
            .user
            .as_ref()
            .ok_or_else(|| ConsoleError::NotAllowed("not signed in".to_string()))?;
        let corporate = user
            .corporates
            .iter()
            .find(|c| c.code == code)
            .cloned()
            .ok_or_else(|| ConsoleError::NotFound(format!("corporate {code}")))?;

        self.select_corporate(Some(corporate.clone()));
        info!(corporate = %corporate.code, "Corporate selected");
        Ok(corporate)
    }

    pub fn finish_loading(&self) {
        self.state.rcu(|current| SessionSnapshot {
            loading: false,
            ..SessionSnapshot::clone(current)
        });
    }

    /// Drop everything the console knows about the signed-in user.
    pub fn clear(&self) {
        self.state.store(Arc::new(SessionSnapshot::default()));
    }

    /// Probe `/auth/me` and populate the store. Failure means "not signed
    /// in" and is not reported further.
    pub async fn check_session(&self, api: &dyn ConsoleApi) {
        match api.me().await {
            Ok(user) => {
                let selected = self.initial_corporate(&user);
                info!(
                    user = %user.email,
                    corporates = user.corporates.len(),
                    selected = selected.as_ref().map(|c| c.code.as_str()),
                    "Session active"
                );
                self.state.store(Arc::new(SessionSnapshot {
                    user: Some(user),
                    loading: true,
                    selected_corporate: selected,
                }));
            }
            Err(e) => debug!(error = %e, "No active session found"),
        }
        self.finish_loading();
    }

    /// Apply the auth-reset rule to a failed call: on an expired session the
    /// store is cleared and the console must go to the login screen.
    pub fn on_api_error(&self, err: &CardOpsError) -> Option<Navigation> {
        if err.is_session_expired() {
            info!("Session expired, returning to login");
            self.clear();
            return Some(Navigation::To(Route::Login));
        }
        None
    }

    fn initial_corporate(&self, user: &User) -> Option<Corporate> {
        if let Some(code) = &self.preferred_corporate {
            if let Some(c) = user.corporates.iter().find(|c| &c.code == code) {
                return Some(c.clone());
            }
        }
        match user.corporates.as_slice() {
            [only] => Some(only.clone()),
            _ => None,
        }
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self, ScriptedApi};

    #[tokio::test]
    async fn check_session_auto_selects_single_corporate() {
        let acme = testing::corporate(1, "ACME");
        let api = ScriptedApi::new().with_user(testing::user(&["dashboard.view"], vec![acme.clone()]));
        let store = SessionStore::new();
        assert!(store.snapshot().loading);

        store.check_session(&api).await;

        let snap = store.snapshot();
        assert!(!snap.loading);
        assert!(snap.is_authenticated());
        assert_eq!(snap.selected_corporate, Some(acme));
        assert!(snap.has_permission("dashboard.view"));
        assert!(!snap.has_permission("applications.create"));
    }

    #[tokio::test]
    async fn check_session_leaves_choice_open_for_several_corporates() {
        let api = ScriptedApi::new().with_user(testing::user(
            &[],
            vec![testing::corporate(1, "ACME"), testing::corporate(2, "GLOBEX")],
        ));
        let store = SessionStore::new();
        store.check_session(&api).await;
        assert!(store.snapshot().selected_corporate.is_none());

        let picked = store.select_corporate_by_code("GLOBEX").unwrap();
        assert_eq!(picked.id, 2);
        assert!(store.select_corporate_by_code("INITECH").is_err());
    }

    #[tokio::test]
    async fn preferred_corporate_wins() {
        let api = ScriptedApi::new().with_user(testing::user(
            &[],
            vec![testing::corporate(1, "ACME"), testing::corporate(2, "GLOBEX")],
        ));
        let store = SessionStore::new().with_preferred_corporate(Some("GLOBEX".to_string()));
        store.check_session(&api).await;
        assert_eq!(store.snapshot().selected_corporate.as_ref().unwrap().code, "GLOBEX");
    }

    #[tokio::test]
    async fn failed_probe_is_silent_and_finishes_loading() {
        let api = ScriptedApi::new();
        let store = SessionStore::new();
        store.check_session(&api).await;
        let snap = store.snapshot();
        assert!(!snap.loading);
        assert!(!snap.is_authenticated());
    }

    #[test]
    fn clearing_user_clears_corporate() {
        let store = SessionStore::new();
        store.set_user(Some(testing::user(&[], vec![])));
        store.select_corporate(Some(testing::corporate(1, "ACME")));
        assert!(store.snapshot().selected_corporate.is_some());

        store.set_user(None);
        assert!(store.snapshot().selected_corporate.is_none());
    }

    #[test]
    fn snapshots_are_immutable_once_taken() {
        let store = SessionStore::new();
        let before = store.snapshot();
        store.set_user(Some(testing::user(&[], vec![])));
        assert!(before.user.is_none());
        assert!(store.snapshot().user.is_some());
    }

    #[test]
    fn expired_session_resets_store() {
        let store = SessionStore::new();
        store.set_user(Some(testing::user(&[], vec![])));

        let nav = store.on_api_error(&CardOpsError::SessionExpired);
        assert_eq!(nav, Some(Navigation::To(Route::Login)));
        assert!(!store.snapshot().is_authenticated());

        store.set_user(Some(testing::user(&[], vec![])));
        let transient = CardOpsError::Network("reset".to_string());
        assert_eq!(store.on_api_error(&transient), None);
        assert!(store.snapshot().is_authenticated());
    }
}
