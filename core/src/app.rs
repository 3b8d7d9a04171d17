//! Top-level client state machine.
//!
//! # Design
//! `App` routes between the login, register and dashboard views and owns the
//! at-most-one live `Dashboard`. It never performs I/O: every method returns
//! the `Effect`s the host must carry out, in order. Requests leave as
//! `Effect::Send` with a `CallId`; the host hands the outcome back through
//! `handle_reply`. Each id remembers which session issued it, so a reply that
//! arrives after logout (or after a new login) is dropped instead of being
//! applied to the wrong state.

use std::collections::HashMap;
use std::time::Instant;

use crate::client::TodoClient;
use crate::dashboard::{Dashboard, TaskCall};
use crate::http::{HttpRequest, Outcome};
use crate::notification::Notification;
use crate::session::{PersistedSession, Session, SessionId};
use crate::store::TaskStore;

pub const FIELDS_REQUIRED: &str = "All fields are required";
pub const PASSWORDS_MISMATCH: &str = "Passwords do not match";
pub const REGISTERED_NOTICE: &str = "Registration successful. Please log in.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallId(pub u64);

/// A request the host must execute and answer with `App::handle_reply`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub id: CallId,
    pub request: HttpRequest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Send(Call),
    /// Write the session to durable storage.
    Persist(PersistedSession),
    /// Remove every trace of the session from durable storage.
    ClearPersisted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Login,
    Register,
    Dashboard,
}

/// Registration form input as typed by the user.
#[derive(Debug, Clone, Default)]
pub struct RegisterForm {
    pub username: String,
    pub email: String,
    pub password1: String,
    pub password2: String,
}

impl RegisterForm {
    fn validate(&self) -> Result<(), &'static str> {
        if [&self.username, &self.email, &self.password1, &self.password2]
            .iter()
            .any(|field| field.is_empty())
        {
            return Err(FIELDS_REQUIRED);
        }
        if self.password1 != self.password2 {
            return Err(PASSWORDS_MISMATCH);
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
enum CallKind {
    Register,
    Login { username: String },
    Task { session: SessionId, call: TaskCall },
}

#[derive(Debug)]
pub struct App {
    client: TodoClient,
    view: View,
    dashboard: Option<Dashboard>,
    pending: HashMap<CallId, CallKind>,
    next_call: u64,
    next_session: u64,
    form_error: Option<String>,
    notice: Option<String>,
}

impl App {
    pub fn new(client: TodoClient) -> Self {
        Self {
            client,
            view: View::Login,
            dashboard: None,
            pending: HashMap::new(),
            next_call: 0,
            next_session: 0,
            form_error: None,
            notice: None,
        }
    }

    pub fn view(&self) -> View {
        self.view
    }

    pub fn form_error(&self) -> Option<&str> {
        self.form_error.as_deref()
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn dashboard(&self) -> Option<&Dashboard> {
        self.dashboard.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.dashboard.is_some()
    }

    pub fn username(&self) -> Option<&str> {
        self.dashboard.as_ref().map(|d| d.session().username())
    }

    pub fn tasks(&self) -> Option<&TaskStore> {
        self.dashboard.as_ref().map(Dashboard::tasks)
    }

    pub fn notification(&self, now: Instant) -> Option<&Notification> {
        self.dashboard.as_ref().and_then(|d| d.notification(now))
    }

    /// Number of requests still awaiting a reply.
    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }

    /// Resume a session the host loaded from durable storage at startup.
    pub fn restore(&mut self, persisted: Option<PersistedSession>, now: Instant) -> Vec<Effect> {
        match persisted {
            Some(persisted) => self.establish(persisted.token, persisted.username, now, false),
            None => Vec::new(),
        }
    }

    pub fn show_login(&mut self) {
        if self.dashboard.is_none() {
            self.view = View::Login;
            self.form_error = None;
        }
    }

    pub fn show_register(&mut self) {
        if self.dashboard.is_none() {
            self.view = View::Register;
            self.form_error = None;
            self.notice = None;
        }
    }

    pub fn submit_register(&mut self, form: RegisterForm) -> Vec<Effect> {
        if self.dashboard.is_some() {
            return Vec::new();
        }
        self.view = View::Register;
        self.notice = None;
        if let Err(msg) = form.validate() {
            self.form_error = Some(msg.to_string());
            return Vec::new();
        }
        self.form_error = None;
        let request = self
            .client
            .build_register(&form.username, &form.email, &form.password1);
        vec![self.send(CallKind::Register, request)]
    }

    pub fn submit_login(&mut self, username: &str, password: &str) -> Vec<Effect> {
        if self.dashboard.is_some() {
            return Vec::new();
        }
        self.view = View::Login;
        if username.is_empty() || password.is_empty() {
            self.form_error = Some(FIELDS_REQUIRED.to_string());
            return Vec::new();
        }
        self.form_error = None;
        let request = self.client.build_login(username, password);
        let kind = CallKind::Login {
            username: username.to_string(),
        };
        vec![self.send(kind, request)]
    }

    /// Show the dashboard. Safe to call repeatedly: only the first entry per
    /// session fetches the task list.
    pub fn enter_dashboard(&mut self) -> Vec<Effect> {
        let Some(dashboard) = self.dashboard.as_mut() else {
            return Vec::new();
        };
        self.view = View::Dashboard;
        let session = dashboard.session().id();
        let generation = dashboard.generation();
        match dashboard.begin_initial_fetch(&self.client) {
            Some(request) => {
                let call = TaskCall::InitialFetch { generation };
                vec![self.send(CallKind::Task { session, call }, request)]
            }
            None => Vec::new(),
        }
    }

    pub fn add_task(&mut self, title: &str) -> Vec<Effect> {
        self.task_request(TaskCall::Create, |d, client| d.begin_add(client, title))
    }

    pub fn toggle_task(&mut self, id: i64) -> Vec<Effect> {
        self.task_request(TaskCall::Toggle { id }, |d, client| d.begin_toggle(client, id))
    }

    pub fn delete_task(&mut self, id: i64) -> Vec<Effect> {
        self.task_request(TaskCall::Delete { id }, |d, client| {
            Some(d.begin_delete(client, id))
        })
    }

    /// End the session. Dropping the dashboard cancels all of its timers.
    pub fn logout(&mut self) -> Vec<Effect> {
        if let Some(dashboard) = self.dashboard.take() {
            let session = dashboard.session().id();
            tracing::info!(session = session.0, "logged out");
            self.pending
                .retain(|_, kind| !matches!(kind, CallKind::Task { session: s, .. } if *s == session));
        }
        self.view = View::Login;
        self.form_error = None;
        vec![Effect::ClearPersisted]
    }

    pub fn handle_reply(&mut self, id: CallId, outcome: Outcome, now: Instant) -> Vec<Effect> {
        let Some(kind) = self.pending.remove(&id) else {
            tracing::debug!(call = id.0, "reply for unknown or abandoned call dropped");
            return Vec::new();
        };

        match kind {
            CallKind::Register => {
                if self.dashboard.is_some() {
                    return Vec::new();
                }
                match self.client.parse_register(outcome) {
                    Ok(()) => {
                        self.view = View::Login;
                        self.form_error = None;
                        self.notice = Some(REGISTERED_NOTICE.to_string());
                    }
                    Err(err) => self.form_error = Some(err.message()),
                }
                Vec::new()
            }
            CallKind::Login { username } => {
                if self.dashboard.is_some() {
                    tracing::debug!("login reply arrived while already authenticated");
                    return Vec::new();
                }
                match self.client.parse_login(outcome) {
                    Ok(token) => self.establish(token, Some(username), now, true),
                    Err(err) => {
                        self.form_error = Some(err.message());
                        Vec::new()
                    }
                }
            }
            CallKind::Task { session, call } => {
                match self.dashboard.as_mut() {
                    Some(dashboard) if dashboard.session().id() == session => {
                        dashboard.apply(&self.client, call, outcome, now);
                    }
                    _ => tracing::debug!(?call, "reply for an ended session dropped"),
                }
                Vec::new()
            }
        }
    }

    /// Advance timers. Call whenever `next_deadline` has passed.
    pub fn tick(&mut self, now: Instant, unix_now: i64) -> Vec<Effect> {
        let Some(dashboard) = self.dashboard.as_mut() else {
            return Vec::new();
        };
        let session = dashboard.session().id();
        let generation = dashboard.generation();
        let tick = dashboard.tick(&self.client, now, unix_now);
        if tick.expired {
            return self.logout();
        }
        let call = TaskCall::Resync { generation };
        tick.resyncs
            .into_iter()
            .map(|request| self.send(CallKind::Task { session, call }, request))
            .collect()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.dashboard.as_ref().and_then(Dashboard::next_deadline)
    }

    fn establish(
        &mut self,
        token: String,
        username: Option<String>,
        now: Instant,
        persist: bool,
    ) -> Vec<Effect> {
        self.next_session += 1;
        let id = SessionId(self.next_session);

        let dashboard = Session::establish(id, token, username)
            .and_then(|session| Dashboard::open(session, now));
        let Some(dashboard) = dashboard else {
            tracing::info!("token carries no readable claims; logging out");
            return self.logout();
        };

        tracing::info!(session = id.0, username = dashboard.session().username(), "session established");
        let mut effects = Vec::new();
        if persist {
            effects.push(Effect::Persist(dashboard.session().to_persisted()));
        }
        self.dashboard = Some(dashboard);
        self.form_error = None;
        self.notice = None;
        effects.extend(self.enter_dashboard());
        effects
    }

    fn task_request<F>(&mut self, call: TaskCall, build: F) -> Vec<Effect>
    where
        F: FnOnce(&Dashboard, &TodoClient) -> Option<HttpRequest>,
    {
        let Some(dashboard) = self.dashboard.as_ref() else {
            return Vec::new();
        };
        let session = dashboard.session().id();
        match build(dashboard, &self.client) {
            Some(request) => vec![self.send(CallKind::Task { session, call }, request)],
            None => Vec::new(),
        }
    }

    fn send(&mut self, kind: CallKind, request: HttpRequest) -> Effect {
        self.next_call += 1;
        let id = CallId(self.next_call);
        self.pending.insert(id, kind);
        Effect::Send(Call { id, request })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::dashboard::RESYNC_DELAY;
    use crate::http::{HttpMethod, HttpResponse};
    use crate::monitor::EXPIRY_POLL_INTERVAL;
    use crate::notification::NOTIFICATION_WINDOW;
    use crate::session::test_tokens::token;

    const FAR_FUTURE: i64 = 4_000_000_000;

    fn app() -> App {
        App::new(TodoClient::new("http://api.test"))
    }

    fn sends(effects: &[Effect]) -> Vec<&Call> {
        effects
            .iter()
            .filter_map(|e| match e {
                Effect::Send(call) => Some(call),
                _ => None,
            })
            .collect()
    }

    fn only_send(effects: &[Effect]) -> Call {
        let calls = sends(effects);
        assert_eq!(calls.len(), 1, "expected exactly one request, got {effects:?}");
        calls[0].clone()
    }

    fn ok(status: u16, body: serde_json::Value) -> Outcome {
        Ok(HttpResponse::new(status, body.to_string()))
    }

    /// Log in and answer the initial fetch with `tasks`.
    fn logged_in(app: &mut App, t0: Instant, tasks: serde_json::Value) {
        let login = only_send(&app.submit_login("alice", "secret123"));
        let effects = app.handle_reply(
            login.id,
            ok(200, serde_json::json!({"token": token(FAR_FUTURE, "alice")})),
            t0,
        );
        let fetch = only_send(&effects);
        app.handle_reply(fetch.id, ok(200, tasks), t0);
    }

    #[test]
    fn login_persists_and_fetches_once() {
        let t0 = Instant::now();
        let mut app = app();
        let login = only_send(&app.submit_login("alice", "secret123"));
        assert_eq!(login.request.path, "http://api.test/auth/login/");

        let tok = token(FAR_FUTURE, "alice");
        let effects = app.handle_reply(login.id, ok(200, serde_json::json!({"token": tok})), t0);
        assert_eq!(
            effects[0],
            Effect::Persist(PersistedSession {
                token: tok.clone(),
                username: Some("alice".into()),
            })
        );
        let fetch = only_send(&effects);
        assert_eq!(fetch.request.method, HttpMethod::Get);
        assert_eq!(app.view(), View::Dashboard);
        assert_eq!(app.username(), Some("alice"));

        assert!(app.enter_dashboard().is_empty());
        assert!(app.enter_dashboard().is_empty());
    }

    #[test]
    fn login_failure_sets_form_error() {
        let t0 = Instant::now();
        let mut app = app();
        let login = only_send(&app.submit_login("alice", "bad"));
        let body = serde_json::json!({"error": {"password": "Password is incorrect."}});
        assert!(app.handle_reply(login.id, ok(400, body), t0).is_empty());
        assert_eq!(app.form_error(), Some("Password is incorrect."));
        assert_eq!(app.view(), View::Login);
    }

    #[test]
    fn login_requires_both_fields() {
        let mut app = app();
        assert!(app.submit_login("", "x").is_empty());
        assert_eq!(app.form_error(), Some(FIELDS_REQUIRED));
    }

    #[test]
    fn login_with_undecodable_token_logs_out_silently() {
        let t0 = Instant::now();
        let mut app = app();
        let login = only_send(&app.submit_login("alice", "pw"));
        let effects = app.handle_reply(login.id, ok(200, serde_json::json!({"token": "nope"})), t0);
        assert_eq!(effects, vec![Effect::ClearPersisted]);
        assert_eq!(app.view(), View::Login);
        assert!(app.form_error().is_none());
    }

    #[test]
    fn register_validates_before_sending() {
        let mut app = app();
        let mut form = RegisterForm {
            username: "bob".into(),
            email: "bob@example.com".into(),
            password1: "longpassword".into(),
            password2: String::new(),
        };
        assert!(app.submit_register(form.clone()).is_empty());
        assert_eq!(app.form_error(), Some(FIELDS_REQUIRED));

        form.password2 = "different".into();
        assert!(app.submit_register(form).is_empty());
        assert_eq!(app.form_error(), Some(PASSWORDS_MISMATCH));
    }

    #[test]
    fn register_success_returns_to_login() {
        let t0 = Instant::now();
        let mut app = app();
        app.show_register();
        let form = RegisterForm {
            username: "bob".into(),
            email: "bob@example.com".into(),
            password1: "longpassword".into(),
            password2: "longpassword".into(),
        };
        let call = only_send(&app.submit_register(form));
        assert_eq!(call.request.path, "http://api.test/auth/register/");
        app.handle_reply(call.id, Ok(HttpResponse::new(201, "")), t0);
        assert_eq!(app.view(), View::Login);
        assert_eq!(app.notice(), Some(REGISTERED_NOTICE));
    }

    #[test]
    fn register_failure_joins_field_messages() {
        let t0 = Instant::now();
        let mut app = app();
        let form = RegisterForm {
            username: "bob".into(),
            email: "bob@example.com".into(),
            password1: "longpassword".into(),
            password2: "longpassword".into(),
        };
        let call = only_send(&app.submit_register(form));
        let body = serde_json::json!({"error": {"email": ["This email is already in use."], "username": ["Taken."]}});
        app.handle_reply(call.id, ok(400, body), t0);
        let msg = app.form_error().unwrap();
        assert!(msg.contains("This email is already in use."));
        assert!(msg.contains("Taken."));
        assert_eq!(app.view(), View::Register);
    }

    #[test]
    fn restore_with_valid_token_fetches() {
        let t0 = Instant::now();
        let mut app = app();
        let effects = app.restore(
            Some(PersistedSession {
                token: token(FAR_FUTURE, "carol"),
                username: None,
            }),
            t0,
        );
        assert_eq!(only_send(&effects).request.method, HttpMethod::Get);
        assert!(!effects.iter().any(|e| matches!(e, Effect::Persist(_))));
        assert_eq!(app.username(), Some("carol"));
    }

    #[test]
    fn restore_with_garbage_token_clears_storage() {
        let mut app = app();
        let effects = app.restore(
            Some(PersistedSession {
                token: "garbage".into(),
                username: Some("x".into()),
            }),
            Instant::now(),
        );
        assert_eq!(effects, vec![Effect::ClearPersisted]);
        assert!(!app.is_authenticated());
    }

    #[test]
    fn add_task_round_trip() {
        let t0 = Instant::now();
        let mut app = app();
        logged_in(&mut app, t0, serde_json::json!([]));

        let call = only_send(&app.add_task("Buy milk"));
        app.handle_reply(
            call.id,
            ok(201, serde_json::json!({"id": 7, "title": "Buy milk", "completed": false})),
            t0,
        );
        let tasks = app.tasks().unwrap();
        assert_eq!(tasks.total(), 1);
        assert_eq!(tasks.get(7).unwrap().title, "Buy milk");
        assert_eq!(app.notification(t0).unwrap().text, "Task successfully added!");
    }

    #[test]
    fn reply_after_logout_is_dropped() {
        let t0 = Instant::now();
        let mut app = app();
        logged_in(&mut app, t0, serde_json::json!([]));
        let call = only_send(&app.add_task("late"));
        assert_eq!(app.logout(), vec![Effect::ClearPersisted]);
        assert_eq!(app.in_flight(), 0);

        let effects = app.handle_reply(
            call.id,
            ok(201, serde_json::json!({"id": 1, "title": "late", "completed": false})),
            t0,
        );
        assert!(effects.is_empty());
        assert!(app.tasks().is_none());
    }

    #[test]
    fn reply_from_previous_session_is_not_applied_to_new_one() {
        let t0 = Instant::now();
        let mut app = app();
        logged_in(&mut app, t0, serde_json::json!([]));
        let stale = only_send(&app.add_task("old"));

        // Logout already forgets the call; put it back so the session check
        // itself is what rejects the reply.
        let kind = CallKind::Task {
            session: SessionId(1),
            call: TaskCall::Create,
        };
        app.logout();
        app.pending.insert(stale.id, kind);
        logged_in(&mut app, t0, serde_json::json!([]));

        app.handle_reply(
            stale.id,
            ok(201, serde_json::json!({"id": 1, "title": "old", "completed": false})),
            t0,
        );
        assert!(app.tasks().unwrap().is_empty());
    }

    #[test]
    fn failed_toggle_resyncs_after_delay() {
        let t0 = Instant::now();
        let mut app = app();
        logged_in(
            &mut app,
            t0,
            serde_json::json!([{"id": 7, "title": "Buy milk", "completed": false}]),
        );

        let call = only_send(&app.toggle_task(7));
        assert_eq!(call.request.method, HttpMethod::Patch);
        app.handle_reply(call.id, ok(500, serde_json::json!({"error": "boom"})), t0);
        assert_eq!(app.notification(t0).unwrap().text, "boom");
        assert_eq!(app.next_deadline(), Some(t0 + RESYNC_DELAY));

        assert!(app.tick(t0 + Duration::from_millis(3_999), 0).is_empty());
        let resync = only_send(&app.tick(t0 + RESYNC_DELAY, 0));
        assert_eq!(resync.request.path, "http://api.test/api/v1/todos/");
        app.handle_reply(
            resync.id,
            ok(200, serde_json::json!([{"id": 7, "title": "Buy milk", "completed": true}])),
            t0 + RESYNC_DELAY,
        );
        assert!(app.tasks().unwrap().get(7).unwrap().completed);
    }

    #[test]
    fn every_failed_mutation_gets_its_own_resync() {
        let t0 = Instant::now();
        let mut app = app();
        logged_in(
            &mut app,
            t0,
            serde_json::json!([{"id": 1, "title": "a", "completed": false}]),
        );

        let first = only_send(&app.delete_task(1));
        app.handle_reply(first.id, ok(500, serde_json::json!({"error": "one"})), t0);
        let t1 = t0 + Duration::from_secs(2);
        let second = only_send(&app.toggle_task(1));
        app.handle_reply(second.id, ok(500, serde_json::json!({"error": "two"})), t1);

        assert_eq!(app.next_deadline(), Some(t0 + RESYNC_DELAY));
        let resync = only_send(&app.tick(t0 + RESYNC_DELAY, 0));
        assert_eq!(resync.request.method, HttpMethod::Get);
        assert_eq!(app.next_deadline(), Some(t1 + RESYNC_DELAY));
        let resync = only_send(&app.tick(t1 + RESYNC_DELAY, 0));
        assert_eq!(resync.request.method, HttpMethod::Get);
    }

    #[test]
    fn initial_listing_overtaken_by_an_add_is_refetched() {
        let t0 = Instant::now();
        let mut app = app();
        let login = only_send(&app.submit_login("alice", "secret123"));
        let effects = app.handle_reply(
            login.id,
            ok(200, serde_json::json!({"token": token(FAR_FUTURE, "alice")})),
            t0,
        );
        let fetch = only_send(&effects);

        let add = only_send(&app.add_task("fresh"));
        app.handle_reply(
            add.id,
            ok(201, serde_json::json!({"id": 9, "title": "fresh", "completed": false})),
            t0,
        );
        app.handle_reply(fetch.id, ok(200, serde_json::json!([])), t0);
        assert_eq!(app.tasks().unwrap().total(), 1);
        assert_eq!(app.next_deadline(), Some(t0));

        let refetch = only_send(&app.tick(t0, 0));
        app.handle_reply(
            refetch.id,
            ok(200, serde_json::json!([{"id": 9, "title": "fresh", "completed": false}])),
            t0,
        );
        assert_eq!(app.tasks().unwrap().get(9).unwrap().title, "fresh");
        assert_eq!(app.next_deadline(), Some(t0 + NOTIFICATION_WINDOW));
    }

    #[test]
    fn toggle_unknown_task_sends_nothing() {
        let t0 = Instant::now();
        let mut app = app();
        logged_in(&mut app, t0, serde_json::json!([]));
        assert!(app.toggle_task(42).is_empty());
    }

    #[test]
    fn expiry_logs_out_once() {
        let t0 = Instant::now();
        let mut app = app();
        let login = only_send(&app.submit_login("alice", "pw"));
        let effects = app.handle_reply(
            login.id,
            ok(200, serde_json::json!({"token": token(100, "alice")})),
            t0,
        );
        assert!(!sends(&effects).is_empty());

        let effects = app.tick(t0 + EXPIRY_POLL_INTERVAL, 100);
        assert_eq!(effects, vec![Effect::ClearPersisted]);
        assert_eq!(app.view(), View::Login);
        assert!(app.next_deadline().is_none());
        assert!(app.tick(t0 + EXPIRY_POLL_INTERVAL * 2, 100).is_empty());
    }

    #[test]
    fn mutations_require_a_session() {
        let mut app = app();
        assert!(app.add_task("x").is_empty());
        assert!(app.delete_task(1).is_empty());
        assert!(app.enter_dashboard().is_empty());
    }
}
