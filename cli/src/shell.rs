//! Interactive shell: the host that performs the core's effects.
//!
//! # Design
//! One current-thread runtime multiplexes three event sources with
//! `tokio::select!`: stdin lines, replies from spawned request tasks (via an
//! unbounded mpsc channel) and the earliest timer deadline the core reports.
//! Every event is handed to `App`, the effects it returns are executed in
//! order, and the view is redrawn when its text changes.

use std::time::Instant;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use todo_core::{App, CallId, Effect, Outcome, RegisterForm, TodoClient};

use crate::commands::{self, Command, HELP};
use crate::config::Config;
use crate::render::render;
use crate::storage::SessionFile;
use crate::transport::Executor;

type Reply = (CallId, Outcome);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub struct Shell {
    app: App,
    executor: Executor,
    storage: SessionFile,
    replies: mpsc::UnboundedSender<Reply>,
    last_frame: Option<String>,
}

impl Shell {
    pub fn new(
        client: TodoClient,
        executor: Executor,
        storage: SessionFile,
        replies: mpsc::UnboundedSender<Reply>,
    ) -> Self {
        Self {
            app: App::new(client),
            executor,
            storage,
            replies,
            last_frame: None,
        }
    }

    pub fn app(&self) -> &App {
        &self.app
    }

    /// Resume the stored session, if any. An unreadable file is discarded.
    pub fn restore(&mut self) {
        let persisted = match self.storage.load() {
            Ok(persisted) => persisted,
            Err(e) => {
                tracing::warn!(error = %e, "discarding unreadable session file");
                if let Err(e) = self.storage.clear() {
                    tracing::warn!(error = %e, "failed to remove session file");
                }
                None
            }
        };
        let effects = self.app.restore(persisted, Instant::now());
        self.execute(effects);
    }

    pub fn handle_line(&mut self, line: &str) -> Flow {
        let command = match commands::parse(line) {
            Ok(Some(command)) => command,
            Ok(None) => return Flow::Continue,
            Err(e) => {
                println!("{e}");
                return Flow::Continue;
            }
        };

        let effects = match command {
            Command::ShowRegister => {
                self.app.show_register();
                Vec::new()
            }
            Command::ShowLogin => {
                self.app.show_login();
                Vec::new()
            }
            Command::Register {
                username,
                email,
                password,
                confirm,
            } => self.app.submit_register(RegisterForm {
                username,
                email,
                password1: password,
                password2: confirm,
            }),
            Command::Login { username, password } => self.app.submit_login(&username, &password),
            Command::List => {
                if self.require_session() {
                    self.last_frame = None;
                }
                Vec::new()
            }
            Command::Add(title) if self.require_session() => self.app.add_task(&title),
            Command::Toggle(id) if self.require_session() => {
                if self.app.tasks().is_some_and(|tasks| tasks.get(id).is_none()) {
                    println!("no task with id {id}");
                }
                self.app.toggle_task(id)
            }
            Command::Delete(id) if self.require_session() => self.app.delete_task(id),
            Command::Add(_) | Command::Toggle(_) | Command::Delete(_) => Vec::new(),
            Command::Logout => self.app.logout(),
            Command::Help => {
                println!("{HELP}");
                Vec::new()
            }
            Command::Quit => return Flow::Quit,
        };
        self.execute(effects);
        Flow::Continue
    }

    pub fn handle_reply(&mut self, id: CallId, outcome: Outcome) {
        let effects = self.app.handle_reply(id, outcome, Instant::now());
        self.execute(effects);
    }

    pub fn tick(&mut self) {
        let effects = self.app.tick(Instant::now(), chrono::Utc::now().timestamp());
        self.execute(effects);
    }

    /// Print the view if it differs from the last one printed.
    pub fn redraw(&mut self) {
        let frame = render(&self.app, Instant::now());
        if self.last_frame.as_deref() != Some(frame.as_str()) {
            println!("{frame}");
            self.last_frame = Some(frame);
        }
    }

    fn require_session(&self) -> bool {
        let authenticated = self.app.is_authenticated();
        if !authenticated {
            println!("Log in first.");
        }
        authenticated
    }

    fn execute(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Send(call) => {
                    let executor = self.executor.clone();
                    let replies = self.replies.clone();
                    tokio::spawn(async move {
                        let outcome = executor.execute(&call.request).await;
                        // The receiver only closes when the shell exits.
                        let _ = replies.send((call.id, outcome));
                    });
                }
                Effect::Persist(session) => {
                    if let Err(e) = self.storage.save(&session) {
                        tracing::warn!(error = %e, "failed to persist session");
                    }
                }
                Effect::ClearPersisted => {
                    if let Err(e) = self.storage.clear() {
                        tracing::warn!(error = %e, "failed to clear session");
                    }
                }
            }
        }
    }
}

/// Run the shell until `quit` or end of input.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let executor = Executor::new().context("failed to build HTTP client")?;
    let storage = SessionFile::new(&config.state_dir);
    let (tx, mut replies) = mpsc::unbounded_channel();
    let mut shell = Shell::new(TodoClient::new(&config.api_url), executor, storage, tx);

    tracing::info!(api_url = %config.api_url, state = %config.state_dir.display(), "starting");
    shell.restore();
    println!("{HELP}\n");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        shell.redraw();
        let deadline = shell.app().next_deadline();
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read from stdin")? else {
                    break;
                };
                if shell.handle_line(&line) == Flow::Quit {
                    break;
                }
            }
            Some((id, outcome)) = replies.recv() => shell.handle_reply(id, outcome),
            _ = sleep_until(deadline) => shell.tick(),
        }
    }
    Ok(())
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(tokio::time::Instant::from_std(at)).await,
        None => std::future::pending().await,
    }
}
