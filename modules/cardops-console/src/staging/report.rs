use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::api::ConsoleApi;
use crate::error::{ConsoleError, Result};
use crate::notice::{Notice, Outcome};
use crate::session::SessionStore;
use crate::shell::{Navigation, Route};

/// File name of a server-side report path: its last `/` segment.
pub fn report_file_name(path: &str) -> Option<&str> {
    path.rsplit('/').next().filter(|name| !name.is_empty())
}

/// Fetch the invalid-record report of a staging batch and write it into
/// `dir`. Returns the written path.
pub async fn fetch_error_report(api: &dyn ConsoleApi, batch_id: i64, dir: &Path) -> Result<PathBuf> {
    let report = api.draft_errors(batch_id).await?;
    let path = report
        .file_path
        .filter(|p| !p.trim().is_empty())
        .ok_or(ConsoleError::MissingReport)?;
    let file_name = report_file_name(&path).ok_or(ConsoleError::MissingReport)?;

    let contents = api.download_file(file_name).await?;
    tokio::fs::create_dir_all(dir).await?;
    let target = dir.join(file_name);
    tokio::fs::write(&target, &contents).await?;

    info!(batch_id, path = %target.display(), bytes = contents.len(), "Error report saved");
    Ok(target)
}

/// [`fetch_error_report`] reported as a notice.
pub async fn download_error_report(
    api: &dyn ConsoleApi,
    session: &SessionStore,
    batch_id: i64,
    dir: &Path,
) -> Outcome {
    match fetch_error_report(api, batch_id, dir).await {
        Ok(path) => Outcome::stay().with_notice(Notice::success(
            "Download started",
            format!("Error report saved to {}", path.display()),
        )),
        Err(ConsoleError::Api(e)) if session.on_api_error(&e).is_some() => {
            Outcome::navigate(Navigation::To(Route::Login))
        }
        Err(e) => {
            warn!(batch_id, error = %e, "Error report download failed");
            Outcome::stay().with_notice(Notice::error("Download Failed", e.to_string()))
        }
    }
}
