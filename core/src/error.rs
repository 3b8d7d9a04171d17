//! Error types for the todo API client.
//!
//! # Design
//! Every exchange resolves to either a payload or an `ApiError`, and the
//! `Display` of an `ApiError` is exactly the message shown to the user.
//! `Transport` covers both "no response at all" and "a response we could not
//! read"; `Rejected` carries the server's own explanation, normalized from
//! whatever shape its `error` field took.

use std::collections::BTreeMap;

use serde::Deserialize;
use thiserror::Error;

/// User-facing text for any failure to obtain a readable response.
pub const CONNECTION_ERROR: &str = "Server connection error";

/// Errors returned by `TodoClient` parse methods.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// The request never produced a usable response: network failure,
    /// timeout, or a body that was not the JSON we expected.
    #[error("Server connection error")]
    Transport,

    /// The server answered with a non-2xx status.
    #[error("{message}")]
    Rejected { status: u16, message: String },
}

impl ApiError {
    pub fn message(&self) -> String {
        self.to_string()
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Transport => None,
            ApiError::Rejected { status, .. } => Some(*status),
        }
    }
}

/// The `error` field of a failure body, decoded in priority order:
/// a single string, then a list of strings, then a field→message(s) map.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ErrorField {
    Message(String),
    Messages(Vec<String>),
    Fields(BTreeMap<String, FieldMessages>),
}

/// A single field's value inside `ErrorField::Fields`. Values that are not
/// text land in `Other` and contribute nothing to the joined message.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum FieldMessages {
    One(String),
    Many(Vec<String>),
    Other(serde_json::Value),
}

impl ErrorField {
    /// Flatten into one space-separated message. Map values are visited in
    /// field-name order.
    pub fn join(&self) -> String {
        match self {
            ErrorField::Message(msg) => msg.clone(),
            ErrorField::Messages(msgs) => msgs.join(" "),
            ErrorField::Fields(fields) => fields
                .values()
                .flat_map(|v| match v {
                    FieldMessages::One(msg) => std::slice::from_ref(msg),
                    FieldMessages::Many(msgs) => msgs.as_slice(),
                    FieldMessages::Other(_) => Default::default(),
                })
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    error: Option<serde_json::Value>,
}

/// Turn a non-2xx response body into the message the user sees.
///
/// A body that is not a JSON object is treated like a transport failure. An
/// `error` field that is missing, has an unrecognized shape, or flattens to
/// nothing yields `default`.
pub fn normalize_error_body(status: u16, body: &str, default: &str) -> ApiError {
    let envelope: ErrorEnvelope = match serde_json::from_str(body) {
        Ok(envelope) => envelope,
        Err(_) => return ApiError::Transport,
    };

    let message = envelope
        .error
        .and_then(|value| ErrorField::deserialize(value).ok())
        .map(|field| field.join())
        .filter(|msg| !msg.is_empty())
        .unwrap_or_else(|| default.to_string());

    ApiError::Rejected { status, message }
}
