//! Shell command parsing.

use thiserror::Error;

pub const HELP: &str = "\
Commands:
  register                                           open the registration form
  register <username> <email> <password> <confirm>   create an account
  login                                              open the login form
  login <username> <password>                        sign in
  list                                               show your tasks
  add <title...>                                     add a task
  toggle <id>                                        flip a task's completed flag
  delete <id>                                        remove a task
  logout                                             sign out
  help                                               show this text
  quit                                               leave";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    ShowRegister,
    ShowLogin,
    Register {
        username: String,
        email: String,
        password: String,
        confirm: String,
    },
    Login {
        username: String,
        password: String,
    },
    List,
    Add(String),
    Toggle(i64),
    Delete(i64),
    Logout,
    Help,
    Quit,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown command '{0}', type 'help' for a list")]
    Unknown(String),

    #[error("usage: {0}")]
    Usage(&'static str),

    #[error("'{0}' is not a task id")]
    InvalidId(String),
}

/// Parse one input line. Blank lines yield `Ok(None)`.
///
/// A bare `register` or `login` switches to that form. Otherwise missing
/// arguments become empty strings so the form validation can report them.
pub fn parse(line: &str) -> Result<Option<Command>, CommandError> {
    let mut words = line.split_whitespace().peekable();
    let Some(name) = words.next() else {
        return Ok(None);
    };
    let bare = words.peek().is_none();
    let mut arg = || words.next().unwrap_or_default().to_string();

    let command = match name.to_ascii_lowercase().as_str() {
        "register" if bare => Command::ShowRegister,
        "login" if bare => Command::ShowLogin,
        "register" => Command::Register {
            username: arg(),
            email: arg(),
            password: arg(),
            confirm: arg(),
        },
        "login" => Command::Login {
            username: arg(),
            password: arg(),
        },
        "list" | "ls" => Command::List,
        "add" => {
            let title = line.trim_start()[name.len()..].trim();
            if title.is_empty() {
                return Err(CommandError::Usage("add <title...>"));
            }
            Command::Add(title.to_string())
        }
        "toggle" => Command::Toggle(task_id(arg(), "toggle <id>")?),
        "delete" | "rm" => Command::Delete(task_id(arg(), "delete <id>")?),
        "logout" => Command::Logout,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => return Err(CommandError::Unknown(other.to_string())),
    };
    Ok(Some(command))
}

fn task_id(word: String, usage: &'static str) -> Result<i64, CommandError> {
    if word.is_empty() {
        return Err(CommandError::Usage(usage));
    }
    word.parse().map_err(|_| CommandError::InvalidId(word))
}
