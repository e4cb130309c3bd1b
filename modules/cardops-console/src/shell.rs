//! Presentation shell: routes, route guard, permission-gated navigation and
//! the backend health gate.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::api::ConsoleApi;
use crate::session::SessionSnapshot;

pub const DEFAULT_HEALTH_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Login,
    Dashboard,
    Applications,
    CreateApplication,
    StagingStatus(i64),
    BatchDetails(i64),
    ApplicationDetails { batch_id: i64, application_id: i64 },
    NotFound(String),
}

impl Route {
    pub fn parse(path: &str) -> Route {
        let trimmed = path.trim_end_matches('/');
        let segments: Vec<&str> = trimmed.split('/').filter(|s| !s.is_empty()).collect();

        match segments.as_slice() {
            [] => Route::Dashboard,
            ["login"] => Route::Login,
            ["dashboard"] => Route::Dashboard,
            ["applications"] => Route::Applications,
            ["applications", "create"] => Route::CreateApplication,
            ["applications", "staging", id] => match id.parse() {
                Ok(id) => Route::StagingStatus(id),
                Err(_) => Route::NotFound(path.to_string()),
            },
            ["applications", batch] => match batch.parse() {
                Ok(batch_id) => Route::BatchDetails(batch_id),
                Err(_) => Route::NotFound(path.to_string()),
            },
            ["applications", batch, app] => match (batch.parse(), app.parse()) {
                (Ok(batch_id), Ok(application_id)) => Route::ApplicationDetails {
                    batch_id,
                    application_id,
                },
                _ => Route::NotFound(path.to_string()),
            },
            _ => Route::NotFound(path.to_string()),
        }
    }

    pub fn path(&self) -> String {
        match self {
            Route::Login => "/login".to_string(),
            Route::Dashboard => "/dashboard".to_string(),
            Route::Applications => "/applications".to_string(),
            Route::CreateApplication => "/applications/create".to_string(),
            Route::StagingStatus(id) => format!("/applications/staging/{id}"),
            Route::BatchDetails(id) => format!("/applications/{id}"),
            Route::ApplicationDetails {
                batch_id,
                application_id,
            } => format!("/applications/{batch_id}/{application_id}"),
            Route::NotFound(path) => path.clone(),
        }
    }

    pub fn is_protected(&self) -> bool {
        !matches!(self, Route::Login | Route::NotFound(_))
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// Where the console goes after an action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    Stay,
    To(Route),
    /// Re-fetch the current view from the backend.
    Reload,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Guard {
    /// The initial session probe has not finished.
    Loading,
    Redirect(Route),
    Allow,
}

pub fn guard(route: &Route, session: &SessionSnapshot) -> Guard {
    if !route.is_protected() {
        return Guard::Allow;
    }
    if session.loading {
        return Guard::Loading;
    }
    if session.user.is_none() {
        return Guard::Redirect(Route::Login);
    }
    Guard::Allow
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavItem {
    pub title: &'static str,
    pub route: Route,
    pub permission: &'static str,
}

/// Sidebar entries the current user may see.
pub fn navigation(session: &SessionSnapshot) -> Vec<NavItem> {
    [
        NavItem {
            title: "Dashboard",
            route: Route::Dashboard,
            permission: "dashboard.view",
        },
        NavItem {
            title: "Create Application",
            route: Route::CreateApplication,
            permission: "applications.create",
        },
        NavItem {
            title: "View Applications",
            route: Route::Applications,
            permission: "applications.view",
        },
    ]
    .into_iter()
    .filter(|item| session.has_permission(item.permission))
    .collect()
}

// --- Health gate ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Checking,
    Up,
    Down,
}

pub async fn check_health(api: &(dyn ConsoleApi)) -> HealthStatus {
    match api.health().await {
        Ok(report) if report.is_up() => HealthStatus::Up,
        Ok(report) => {
            warn!(status = %report.status, "Backend reports unhealthy");
            HealthStatus::Down
        }
        Err(e) => {
            warn!(error = %e, "Health check failed");
            HealthStatus::Down
        }
    }
}

/// Re-checks backend health on a fixed interval until dropped.
pub struct HealthMonitor {
    cancel: CancellationToken,
    status: watch::Receiver<HealthStatus>,
    task: JoinHandle<()>,
}

impl HealthMonitor {
    pub fn spawn(api: Arc<dyn ConsoleApi>, interval: Duration) -> Self {
        let cancel = CancellationToken::new();
        let (tx, rx) = watch::channel(HealthStatus::Checking);

        let token = cancel.clone();
        let task = tokio::spawn(async move {
            loop {
                let status = tokio::select! {
                    biased;
                    _ = token.cancelled() => return,
                    status = check_health(api.as_ref()) => status,
                };
                if *tx.borrow() != status {
                    info!(?status, "Backend health changed");
                }
                tx.send_replace(status);

                tokio::select! {
                    biased;
                    _ = token.cancelled() => return,
                    _ = tokio::time::sleep(interval) => {}
                }
            }
        });

        Self {
            cancel,
            status: rx,
            task,
        }
    }

    pub fn status(&self) -> HealthStatus {
        *self.status.borrow()
    }

    /// Wait until the first check has completed.
    pub async fn settled(&mut self) -> HealthStatus {
        let _ = self
            .status
            .wait_for(|s| *s != HealthStatus::Checking)
            .await;
        self.status()
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for HealthMonitor {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
