//! Session and task-synchronization core for the todo client.
//!
//! # Overview
//! Builds `HttpRequest` values and parses `HttpResponse` values without
//! touching the network (host-does-IO pattern), and keeps the client's state
//! consistent with the server: token expiry, optimistic task mutation applied
//! from server replies, transient notifications, and resync after errors.
//!
//! # Design
//! - `TodoClient` is stateless; it holds only `base_url`.
//! - Each operation is split into `build_*` (produces request) and `parse_*`
//!   (consumes the host's `Outcome`), so the I/O boundary is explicit.
//! - Nothing here reads a clock. Timers are deadlines (`Instant`) that the
//!   host drives through `App::tick`, which keeps every test deterministic.
//! - DTOs are defined independently from the mock-server crate; integration
//!   tests catch schema drift.

pub mod app;
pub mod client;
pub mod dashboard;
pub mod error;
pub mod http;
pub mod monitor;
pub mod notification;
pub mod session;
pub mod store;
pub mod token;
pub mod types;

pub use app::{App, Call, CallId, Effect, RegisterForm, View};
pub use client::{Operation, TodoClient};
pub use dashboard::{Dashboard, TaskCall};
pub use error::{ApiError, ErrorField};
pub use http::{HttpMethod, HttpRequest, HttpResponse, Outcome, TransportError};
pub use notification::{Notification, NotificationKind};
pub use session::{PersistedSession, Session, SessionId};
pub use store::TaskStore;
pub use token::{decode_claims, Claims};
pub use types::{CreateTask, LoginRequest, LoginResponse, RegisterRequest, Task, UpdateTask};
