//! The staging workflow: upload or enter applications, watch validation,
//! fetch the error report, submit the valid records.

pub mod poller;
pub mod report;
pub mod submit;
pub mod upload;

pub use poller::{poll_until_terminal, PollGuard, PollHandle, PollOutcome, StatusBoard, DEFAULT_POLL_INTERVAL};
pub use report::{download_error_report, fetch_error_report, report_file_name};
pub use submit::{submit_batch, SubmitControl};
pub use upload::{active_products, EntryMode, SelectedFile, UploadForm, UploadStatus, ACCEPTED_EXTENSIONS};
