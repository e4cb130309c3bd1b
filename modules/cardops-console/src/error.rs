use std::collections::BTreeMap;

use thiserror::Error;

use cardops_client::CardOpsError;

pub type Result<T> = std::result::Result<T, ConsoleError>;

#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error(transparent)]
    Api(#[from] CardOpsError),

    #[error("Form incomplete: missing {}", .0.join(", "))]
    Incomplete(Vec<&'static str>),

    #[error("An upload is already in progress")]
    UploadInFlight,

    #[error("Unsupported file type: {0}")]
    UnsupportedFile(String),

    #[error("Service unavailable: the backend is not responding")]
    BackendDown,

    #[error("Sign-in required")]
    Unauthenticated,

    #[error("No corporate selected")]
    NoCorporate,

    #[error("Not allowed: {0}")]
    NotAllowed(String),

    #[error("No error file path returned.")]
    MissingReport,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("CSV error: {0}")]
    Csv(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Background task failed: {0}")]
    Task(String),
}

impl ConsoleError {
    pub fn is_session_expired(&self) -> bool {
        match self {
            ConsoleError::Api(e) => e.is_session_expired(),
            ConsoleError::Unauthenticated => true,
            _ => false,
        }
    }
}

impl From<csv::Error> for ConsoleError {
    fn from(err: csv::Error) -> Self {
        ConsoleError::Csv(err.to_string())
    }
}

/// The four ways a backend failure reaches the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Keyed by form field, rendered inline.
    Field,
    /// Business error, rendered as a banner or notice.
    Page,
    /// Network failure, non-2xx, unreadable body.
    Transport,
    /// 401: reset the session and go to login.
    Auth,
}

pub fn classify(err: &CardOpsError) -> ErrorClass {
    match err {
        CardOpsError::SessionExpired => ErrorClass::Auth,
        CardOpsError::Rejected { errors, .. } if errors.iter().any(|e| e.field.is_some()) => {
            ErrorClass::Field
        }
        CardOpsError::Rejected { .. } => ErrorClass::Page,
        _ => ErrorClass::Transport,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageError {
    pub title: String,
    pub description: String,
    pub code: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorMapping {
    pub field_errors: BTreeMap<String, String>,
    pub page_error: Option<PageError>,
}

/// Split a backend failure into inline field errors and at most one
/// page-level error.
pub fn map_api_errors(err: &CardOpsError) -> ErrorMapping {
    let mut mapping = ErrorMapping::default();

    match err {
        CardOpsError::Rejected {
            title,
            description,
            code,
            errors,
        } => {
            let title = title.clone().unwrap_or_else(|| "Error".to_string());

            for e in errors {
                match &e.field {
                    Some(field) => {
                        mapping.field_errors.insert(field.clone(), e.message.clone());
                    }
                    None if mapping.page_error.is_none() => {
                        mapping.page_error = Some(PageError {
                            title: title.clone(),
                            description: e.message.clone(),
                            code: e
                                .reason_code
                                .clone()
                                .or_else(|| code.clone())
                                .unwrap_or_else(|| "UNKNOWN".to_string()),
                        });
                    }
                    None => {}
                }
            }

            if mapping.field_errors.is_empty() && mapping.page_error.is_none() {
                mapping.page_error = Some(PageError {
                    title,
                    description: description.clone(),
                    code: code.clone().unwrap_or_else(|| "UNKNOWN".to_string()),
                });
            }
        }
        CardOpsError::SessionExpired => {
            mapping.page_error = Some(PageError {
                title: "Session expired".to_string(),
                description: err.to_string(),
                code: "UNAUTHORIZED".to_string(),
            });
        }
        CardOpsError::Http { status, .. } => {
            mapping.page_error = Some(generic_failure(format!("HTTP_{status}")));
        }
        _ => {
            mapping.page_error = Some(generic_failure("TRANSPORT".to_string()));
        }
    }

    mapping
}

fn generic_failure(code: String) -> PageError {
    PageError {
        title: "Error".to_string(),
        description: "Something went wrong. Please try again.".to_string(),
        code,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardops_client::ApiFieldError;

    fn rejected(errors: Vec<ApiFieldError>) -> CardOpsError {
        CardOpsError::Rejected {
            title: Some("Validation Failed".to_string()),
            description: "Invalid request".to_string(),
            code: Some("VAL".to_string()),
            errors,
        }
    }

    fn field_error(field: Option<&str>, message: &str) -> ApiFieldError {
        ApiFieldError {
            field: field.map(String::from),
            message: message.to_string(),
            reason_code: None,
        }
    }

    #[test]
    fn field_errors_are_keyed_by_field() {
        let err = rejected(vec![
            field_error(Some("email"), "Invalid email"),
            field_error(Some("mobile"), "Too short"),
        ]);
        let mapping = map_api_errors(&err);
        assert_eq!(mapping.field_errors["email"], "Invalid email");
        assert_eq!(mapping.field_errors["mobile"], "Too short");
        assert!(mapping.page_error.is_none());
        assert_eq!(classify(&err), ErrorClass::Field);
    }

    #[test]
    fn first_fieldless_error_becomes_page_error() {
        let err = rejected(vec![
            field_error(None, "Corporate suspended"),
            field_error(None, "Second problem"),
        ]);
        let page = map_api_errors(&err).page_error.unwrap();
        assert_eq!(page.title, "Validation Failed");
        assert_eq!(page.description, "Corporate suspended");
        assert_eq!(page.code, "VAL");
        assert_eq!(classify(&err), ErrorClass::Page);
    }

    #[test]
    fn rejection_without_errors_uses_description() {
        let page = map_api_errors(&rejected(vec![])).page_error.unwrap();
        assert_eq!(page.description, "Invalid request");
    }

    #[test]
    fn transport_errors_are_generic() {
        let err = CardOpsError::Http {
            status: 503,
            message: "Service Unavailable".to_string(),
        };
        let page = map_api_errors(&err).page_error.unwrap();
        assert_eq!(page.description, "Something went wrong. Please try again.");
        assert_eq!(page.code, "HTTP_503");
        assert_eq!(classify(&err), ErrorClass::Transport);
        assert_eq!(
            classify(&CardOpsError::Network("refused".to_string())),
            ErrorClass::Transport
        );
    }

    #[test]
    fn session_expiry_is_auth_class() {
        assert_eq!(classify(&CardOpsError::SessionExpired), ErrorClass::Auth);
        let console: ConsoleError = CardOpsError::SessionExpired.into();
        assert!(console.is_session_expired());
    }
}
