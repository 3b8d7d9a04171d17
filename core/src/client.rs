//! Stateless HTTP request builder and response parser for the todo API.
//!
//! # Design
//! `TodoClient` holds only a `base_url` and carries no mutable state between
//! calls. Each operation is split into a `build_*` method that produces an
//! `HttpRequest` and a `parse_*` method that consumes the host's `Outcome`.
//! The caller executes the actual HTTP round-trip, keeping the core
//! deterministic and free of I/O dependencies.
//!
//! Every `parse_*` resolves to `Ok(payload)` or an `ApiError` whose display
//! text is ready for the user; nothing escapes as a panic.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{normalize_error_body, ApiError};
use crate::http::{HttpMethod, HttpRequest, HttpResponse, Outcome};
use crate::types::{CreateTask, LoginRequest, LoginResponse, RegisterRequest, Task, UpdateTask};

const REGISTER_PATH: &str = "/auth/register/";
const LOGIN_PATH: &str = "/auth/login/";
const TODOS_PATH: &str = "/api/v1/todos/";

/// The six exchanges the client performs, each with its own fallback message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Register,
    Login,
    ListTodos,
    CreateTodo,
    UpdateTodo,
    DeleteTodo,
}

impl Operation {
    pub const ALL: [Operation; 6] = [
        Operation::Register,
        Operation::Login,
        Operation::ListTodos,
        Operation::CreateTodo,
        Operation::UpdateTodo,
        Operation::DeleteTodo,
    ];

    /// Message used when a failure body carries no usable `error` field.
    pub fn default_error(self) -> &'static str {
        match self {
            Operation::Register => "Registration failed",
            Operation::Login => "Login failed",
            Operation::ListTodos => "Failed to fetch todos",
            Operation::CreateTodo => "Failed to create todo",
            Operation::UpdateTodo => "Failed to update todo",
            Operation::DeleteTodo => "Failed to delete todo",
        }
    }
}

/// Synchronous, stateless client for the todo API.
#[derive(Debug, Clone)]
pub struct TodoClient {
    base_url: String,
}

impl TodoClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn build_register(&self, username: &str, email: &str, password: &str) -> HttpRequest {
        let input = RegisterRequest {
            username: username.to_string(),
            email: email.to_string(),
            password1: password.to_string(),
            password2: password.to_string(),
        };
        self.json_request(HttpMethod::Post, REGISTER_PATH.to_string(), None, &input)
    }

    pub fn build_login(&self, username: &str, password: &str) -> HttpRequest {
        let input = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        self.json_request(HttpMethod::Post, LOGIN_PATH.to_string(), None, &input)
    }

    pub fn build_list_todos(&self, token: &str) -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Get,
            path: format!("{}{TODOS_PATH}", self.base_url),
            headers: vec![bearer(token)],
            body: None,
        }
    }

    pub fn build_create_todo(&self, title: &str, token: &str) -> HttpRequest {
        let input = CreateTask {
            title: title.to_string(),
        };
        self.json_request(HttpMethod::Post, TODOS_PATH.to_string(), Some(token), &input)
    }

    pub fn build_update_todo(&self, id: i64, input: &UpdateTask, token: &str) -> HttpRequest {
        self.json_request(HttpMethod::Patch, todo_path(id), Some(token), input)
    }

    pub fn build_delete_todo(&self, id: i64, token: &str) -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Delete,
            path: format!("{}{}", self.base_url, todo_path(id)),
            headers: vec![bearer(token)],
            body: None,
        }
    }

    /// Registration succeeds on any 2xx; the body is ignored.
    pub fn parse_register(&self, outcome: Outcome) -> Result<(), ApiError> {
        check_status(Operation::Register, outcome).map(|_| ())
    }

    /// Returns the bearer token issued by the server.
    pub fn parse_login(&self, outcome: Outcome) -> Result<String, ApiError> {
        let response = check_status(Operation::Login, outcome)?;
        decode_body::<LoginResponse>(&response).map(|body| body.token)
    }

    pub fn parse_list_todos(&self, outcome: Outcome) -> Result<Vec<Task>, ApiError> {
        let response = check_status(Operation::ListTodos, outcome)?;
        decode_body(&response)
    }

    pub fn parse_create_todo(&self, outcome: Outcome) -> Result<Task, ApiError> {
        let response = check_status(Operation::CreateTodo, outcome)?;
        decode_body(&response)
    }

    pub fn parse_update_todo(&self, outcome: Outcome) -> Result<Task, ApiError> {
        let response = check_status(Operation::UpdateTodo, outcome)?;
        decode_body(&response)
    }

    pub fn parse_delete_todo(&self, outcome: Outcome) -> Result<(), ApiError> {
        check_status(Operation::DeleteTodo, outcome).map(|_| ())
    }

    fn json_request<T: Serialize>(
        &self,
        method: HttpMethod,
        path: String,
        token: Option<&str>,
        input: &T,
    ) -> HttpRequest {
        let mut headers = vec![("content-type".to_string(), "application/json".to_string())];
        if let Some(token) = token {
            headers.push(bearer(token));
        }
        // Serializing plain string/bool structs cannot fail.
        let body = serde_json::to_string(input).unwrap_or_default();
        HttpRequest {
            method,
            path: format!("{}{path}", self.base_url),
            headers,
            body: Some(body),
        }
    }
}

fn todo_path(id: i64) -> String {
    format!("{TODOS_PATH}{id}/")
}

fn bearer(token: &str) -> (String, String) {
    ("authorization".to_string(), format!("Bearer {token}"))
}

/// Map a transport failure or non-2xx status to the appropriate `ApiError`.
fn check_status(op: Operation, outcome: Outcome) -> Result<HttpResponse, ApiError> {
    let response = outcome.map_err(|err| {
        tracing::warn!(operation = ?op, error = %err, "request failed before a response arrived");
        ApiError::Transport
    })?;
    if response.is_success() {
        return Ok(response);
    }
    let err = normalize_error_body(response.status, &response.body, op.default_error());
    tracing::debug!(operation = ?op, status = response.status, error = %err, "request rejected");
    Err(err)
}

fn decode_body<T: DeserializeOwned>(response: &HttpResponse) -> Result<T, ApiError> {
    serde_json::from_str(&response.body).map_err(|err| {
        tracing::warn!(error = %err, "malformed success body");
        ApiError::Transport
    })
}
