//! Decoding of the backend's `{ success, data, description, errors }` envelope.
//!
//! Everything here is a pure function of the HTTP status and the raw body so
//! the error taxonomy can be checked without a server.

use reqwest::StatusCode;
use serde::de::DeserializeOwned;

use crate::error::{CardOpsError, Result};
use crate::types::Envelope;

const DEFAULT_REJECTION: &str = "API error occurred.";

/// What a 401 means for a given call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPolicy {
    /// Reset the session and send the user to the login screen.
    Redirect,
    /// Report the 401 like any other HTTP failure. Used by the "who am I"
    /// probe so that being logged out is not an error worth shouting about.
    Silent,
}

/// Decode an envelope whose `data` is required.
pub fn decode<T: DeserializeOwned>(status: StatusCode, body: &[u8], policy: AuthPolicy) -> Result<T> {
    let envelope: Envelope<T> = open(status, body, policy)?;
    envelope
        .data
        .ok_or_else(|| CardOpsError::MalformedEnvelope("success response without data".to_string()))
}

/// Decode an acknowledgement. `data`, if present, is ignored.
pub fn decode_ack(status: StatusCode, body: &[u8], policy: AuthPolicy) -> Result<()> {
    let _: Envelope<serde_json::Value> = open(status, body, policy)?;
    Ok(())
}

/// Map a non-success HTTP status to an error. `Ok` for 2xx.
pub fn check_status(status: StatusCode, body: &[u8], policy: AuthPolicy) -> Result<()> {
    if status.is_success() {
        return Ok(());
    }
    if status == StatusCode::UNAUTHORIZED && policy == AuthPolicy::Redirect {
        return Err(CardOpsError::SessionExpired);
    }

    let text = String::from_utf8_lossy(body).trim().to_string();
    let message = if text.is_empty() {
        status.canonical_reason().unwrap_or("Unknown").to_string()
    } else {
        text
    };
    Err(CardOpsError::Http {
        status: status.as_u16(),
        message,
    })
}

fn open<T: DeserializeOwned>(status: StatusCode, body: &[u8], policy: AuthPolicy) -> Result<Envelope<T>> {
    check_status(status, body, policy)?;

    let envelope: Envelope<T> = serde_json::from_slice(body)
        .map_err(|e| CardOpsError::MalformedEnvelope(e.to_string()))?;

    if !envelope.success {
        return Err(CardOpsError::Rejected {
            title: envelope.title,
            description: envelope
                .description
                .filter(|d| !d.is_empty())
                .unwrap_or_else(|| DEFAULT_REJECTION.to_string()),
            code: envelope.code.or(envelope.rc),
            errors: envelope.errors,
        });
    }

    Ok(envelope)
}
