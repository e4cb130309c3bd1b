pub mod action;
pub mod api;
pub mod batches;
pub mod bulk_file;
pub mod config;
pub mod console;
pub mod error;
pub mod login;
pub mod notice;
pub mod session;
pub mod shell;
pub mod staging;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use api::ConsoleApi;
pub use config::ConsoleConfig;
pub use console::Console;
pub use error::{ConsoleError, Result};
pub use notice::{Notice, NoticeKind, Outcome};
pub use session::{SessionSnapshot, SessionStore};
pub use shell::{Navigation, Route};
