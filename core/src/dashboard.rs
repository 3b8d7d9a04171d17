//! Per-session task synchronization.
//!
//! # Design
//! `Dashboard` owns everything that lives exactly as long as one
//! authenticated session: the task collection, the notification slot, the
//! expiry monitor and the pending resyncs. Dropping it cancels every timer it
//! holds, so nothing can fire against a torn-down session.
//!
//! Mutations are applied from the server's reply, never guessed ahead of it.
//! Every failed mutation shows its error and schedules its own full re-fetch
//! `RESYNC_DELAY` later; the failed request itself is never retried.
//!
//! Each applied mutation bumps a generation counter. A listing requested
//! under an older generation may not reflect that mutation, so it is not
//! applied; a fresh listing is queued instead.

use std::time::{Duration, Instant};

use crate::client::TodoClient;
use crate::http::{HttpRequest, Outcome};
use crate::monitor::{ExpiryMonitor, MonitorVerdict};
use crate::notification::{Notification, NotificationKind, Notifier};
use crate::session::Session;
use crate::store::TaskStore;
use crate::types::UpdateTask;

/// Delay between an error notification and the re-fetch that follows it.
pub const RESYNC_DELAY: Duration = Duration::from_secs(4);

pub const ADDED_MESSAGE: &str = "Task successfully added!";
pub const UPDATED_MESSAGE: &str = "Task successfully updated!";
pub const DELETED_MESSAGE: &str = "Task successfully deleted!";

/// Which task exchange a reply belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskCall {
    /// `generation` is the dashboard's generation when the listing was sent.
    InitialFetch { generation: u64 },
    Resync { generation: u64 },
    Create,
    Toggle { id: i64 },
    Delete { id: i64 },
}

/// What a timer tick asks the owner to do.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DashboardTick {
    /// List requests for every resync that came due, in scheduling order.
    pub resyncs: Vec<HttpRequest>,
    /// The token expired; the owner must log out.
    pub expired: bool,
}

#[derive(Debug, Clone, Copy)]
struct PendingResync {
    at: Instant,
    /// The error notification to clear when this fires.
    notification: Option<u64>,
}

#[derive(Debug)]
pub struct Dashboard {
    session: Session,
    tasks: TaskStore,
    notifier: Notifier,
    monitor: ExpiryMonitor,
    resyncs: Vec<PendingResync>,
    generation: u64,
    fetch_started: bool,
}

impl Dashboard {
    /// Returns `None` when the session's token no longer decodes.
    pub fn open(session: Session, now: Instant) -> Option<Self> {
        let monitor = ExpiryMonitor::start(&session, now)?;
        Some(Self {
            session,
            tasks: TaskStore::new(),
            notifier: Notifier::new(),
            monitor,
            resyncs: Vec::new(),
            generation: 0,
            fetch_started: false,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn tasks(&self) -> &TaskStore {
        &self.tasks
    }

    pub fn notification(&self, now: Instant) -> Option<&Notification> {
        self.notifier.current(now)
    }

    /// Earliest pending resync.
    pub fn resync_due_at(&self) -> Option<Instant> {
        self.resyncs.iter().map(|r| r.at).min()
    }

    pub fn pending_resyncs(&self) -> usize {
        self.resyncs.len()
    }

    /// Number of mutations applied to the task list so far.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The list request for this session's first load. Only the first call
    /// returns a request; the flag is set before the request is built.
    pub fn begin_initial_fetch(&mut self, client: &TodoClient) -> Option<HttpRequest> {
        if self.fetch_started {
            return None;
        }
        self.fetch_started = true;
        Some(client.build_list_todos(self.session.token()))
    }

    /// Blank titles are dropped without a request.
    pub fn begin_add(&self, client: &TodoClient, title: &str) -> Option<HttpRequest> {
        if title.trim().is_empty() {
            return None;
        }
        Some(client.build_create_todo(title, self.session.token()))
    }

    /// Unknown ids are a silent no-op.
    pub fn begin_toggle(&self, client: &TodoClient, id: i64) -> Option<HttpRequest> {
        let task = self.tasks.get(id)?;
        let update = UpdateTask::completed(!task.completed);
        Some(client.build_update_todo(id, &update, self.session.token()))
    }

    pub fn begin_delete(&self, client: &TodoClient, id: i64) -> HttpRequest {
        client.build_delete_todo(id, self.session.token())
    }

    /// Apply a reply to local state and surface its outcome.
    pub fn apply(&mut self, client: &TodoClient, call: TaskCall, outcome: Outcome, now: Instant) {
        match call {
            TaskCall::InitialFetch { generation } | TaskCall::Resync { generation } => {
                self.apply_listing(client, call, generation, outcome, now)
            }
            TaskCall::Create => match client.parse_create_todo(outcome) {
                Ok(task) => {
                    self.tasks.append(task);
                    self.generation += 1;
                    self.notifier.show(ADDED_MESSAGE, NotificationKind::Success, now);
                }
                Err(err) => self.fail(err.message(), now),
            },
            TaskCall::Toggle { id } => match client.parse_update_todo(outcome) {
                Ok(task) => {
                    if self.tasks.replace(id, task) {
                        self.generation += 1;
                    } else {
                        tracing::debug!(id, "updated task is no longer listed; reply dropped");
                    }
                    self.notifier.show(UPDATED_MESSAGE, NotificationKind::Success, now);
                }
                Err(err) => self.fail(err.message(), now),
            },
            TaskCall::Delete { id } => match client.parse_delete_todo(outcome) {
                Ok(()) => {
                    if self.tasks.remove(id) {
                        self.generation += 1;
                    }
                    self.notifier.show(DELETED_MESSAGE, NotificationKind::Success, now);
                }
                Err(err) => self.fail(err.message(), now),
            },
        }
    }

    fn apply_listing(
        &mut self,
        client: &TodoClient,
        call: TaskCall,
        generation: u64,
        outcome: Outcome,
        now: Instant,
    ) {
        match client.parse_list_todos(outcome) {
            Ok(_) if generation != self.generation => {
                tracing::debug!(?call, current = self.generation, "listing predates a local change; refetching");
                self.resyncs.push(PendingResync {
                    at: now,
                    notification: None,
                });
            }
            Ok(tasks) => self.tasks.replace_all(tasks),
            Err(err) => {
                // A failed listing is reported but does not chain another resync.
                tracing::warn!(?call, error = %err, "task listing failed");
                self.notifier.show(err.message(), NotificationKind::Error, now);
            }
        }
    }

    fn fail(&mut self, message: String, now: Instant) {
        tracing::warn!(%message, "task mutation failed; resync scheduled");
        let notification = self.notifier.show(message, NotificationKind::Error, now);
        self.resyncs.push(PendingResync {
            at: now + RESYNC_DELAY,
            notification: Some(notification),
        });
    }

    /// Advance every timer this dashboard owns.
    pub fn tick(&mut self, client: &TodoClient, now: Instant, unix_now: i64) -> DashboardTick {
        let mut out = DashboardTick::default();

        let (due, waiting): (Vec<_>, Vec<_>) = self.resyncs.drain(..).partition(|r| r.at <= now);
        self.resyncs = waiting;
        for pending in due {
            tracing::debug!("resync due");
            if let Some(seq) = pending.notification {
                self.notifier.clear_if(seq);
            }
            out.resyncs.push(client.build_list_todos(self.session.token()));
        }
        self.notifier.tick(now);

        if self.monitor.poll(self.session.token(), now, unix_now) == MonitorVerdict::Expired {
            out.expired = true;
        }
        out
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        [
            self.resync_due_at(),
            self.notifier.next_deadline(),
            self.monitor.next_deadline(),
        ]
        .into_iter()
        .flatten()
        .min()
    }
}
