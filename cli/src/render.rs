//! Text rendering of the client state.

use std::fmt::Write;
use std::time::Instant;

use todo_core::{App, NotificationKind, View};

/// Draw the current view as of `now`.
pub fn render(app: &App, now: Instant) -> String {
    let mut out = String::new();
    match app.view() {
        View::Login => {
            out.push_str("== Login ==\n");
            if let Some(notice) = app.notice() {
                let _ = writeln!(out, "{notice}");
            }
            form_error(&mut out, app);
            out.push_str("Type 'login <username> <password>', or 'register' to create an account.\n");
        }
        View::Register => {
            out.push_str("== Register ==\n");
            form_error(&mut out, app);
            out.push_str("Type 'register <username> <email> <password> <confirm>', or 'login' to sign in.\n");
        }
        View::Dashboard => dashboard(&mut out, app, now),
    }
    out
}

fn form_error(out: &mut String, app: &App) {
    if let Some(error) = app.form_error() {
        let _ = writeln!(out, "Error: {error}");
    }
}

fn dashboard(out: &mut String, app: &App, now: Instant) {
    out.push_str("== Todo List ==\n");
    match app.username() {
        Some(name) if !name.is_empty() => {
            let _ = writeln!(out, "Welcome back, {name}!");
        }
        _ => out.push_str("Welcome back!\n"),
    }

    if let Some(tasks) = app.tasks() {
        let _ = writeln!(out, "Total: {}  Completed: {}", tasks.total(), tasks.completed_count());
        if tasks.is_empty() {
            out.push_str("  (no tasks yet)\n");
        }
        for task in tasks.iter() {
            let mark = if task.completed { 'x' } else { ' ' };
            let _ = writeln!(out, "  [{mark}] {:>4}  {}", task.id, task.title);
        }
    }

    if let Some(note) = app.notification(now) {
        let tag = match note.kind {
            NotificationKind::Success => "ok",
            NotificationKind::Error => "error",
        };
        let _ = writeln!(out, "[{tag}] {}", note.text);
    }
}
