//! Interactive console standing in for the HTTP transport
//!
//! Each local session is a separate anonymous identity on the relay, so a
//! single console can play several participants and switch between them.

use std::collections::BTreeMap;
use std::io::Write;
use std::sync::Arc;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};
use vanish_core::{FetchedMessage, MessageContent, MessageRecord, RelayError, SessionToken};
use vanish_runtime::RelayService;

use crate::config::ConsoleConfig;

// ----------------------------------------------------------------------------
// Command Parsing
// ----------------------------------------------------------------------------

/// A single console command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Join(String),
    Switch(String),
    Send {
        recipient: Option<String>,
        text: String,
    },
    Fetch,
    Leave,
    Who,
    Sessions,
    Stats,
    Wipe,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandParseError {
    #[error("unknown command: /{0}")]
    UnknownCommand(String),

    #[error("usage: {0}")]
    Usage(&'static str),
}

impl ShellCommand {
    /// Parse one input line; blank lines yield `None`
    ///
    /// A line without a leading `/` is a broadcast message.
    pub fn parse(line: &str) -> Result<Option<Self>, CommandParseError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        let Some(body) = line.strip_prefix('/') else {
            return Ok(Some(ShellCommand::Send {
                recipient: None,
                text: line.to_string(),
            }));
        };

        let (name, rest) = match body.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (body, ""),
        };

        let command = match name.to_lowercase().as_str() {
            "join" => ShellCommand::Join(require_arg(rest, "/join <username>")?),
            "switch" | "as" => ShellCommand::Switch(require_arg(rest, "/switch <username>")?),
            "send" => parse_send(rest)?,
            "fetch" | "inbox" => ShellCommand::Fetch,
            "leave" => ShellCommand::Leave,
            "who" | "users" => ShellCommand::Who,
            "sessions" => ShellCommand::Sessions,
            "stats" => ShellCommand::Stats,
            "wipe" => ShellCommand::Wipe,
            "help" | "?" => ShellCommand::Help,
            "quit" | "exit" => ShellCommand::Quit,
            other => return Err(CommandParseError::UnknownCommand(other.to_string())),
        };
        Ok(Some(command))
    }
}

fn require_arg(rest: &str, usage: &'static str) -> Result<String, CommandParseError> {
    if rest.is_empty() {
        Err(CommandParseError::Usage(usage))
    } else {
        Ok(rest.to_string())
    }
}

fn parse_send(rest: &str) -> Result<ShellCommand, CommandParseError> {
    const USAGE: &str = "/send [@username] <message>";
    if let Some(addressed) = rest.strip_prefix('@') {
        let (recipient, text) = addressed
            .split_once(char::is_whitespace)
            .ok_or(CommandParseError::Usage(USAGE))?;
        let text = text.trim();
        if recipient.is_empty() || text.is_empty() {
            return Err(CommandParseError::Usage(USAGE));
        }
        return Ok(ShellCommand::Send {
            recipient: Some(recipient.to_string()),
            text: text.to_string(),
        });
    }
    Ok(ShellCommand::Send {
        recipient: None,
        text: require_arg(rest, USAGE)?,
    })
}

const HELP: &str = "\
commands:
  /join <username>            create an anonymous identity and switch to it
  /switch <username>          act as another local identity
  /send [@username] <text>    send a message (plain text also broadcasts)
  /fetch                      read your messages
  /leave                      erase the current identity
  /who                        list active usernames
  /sessions                   list local identities
  /stats                      relay counters
  /wipe                       erase every identity on the relay
  /quit                       exit";

// ----------------------------------------------------------------------------
// Shell
// ----------------------------------------------------------------------------

/// Whether the shell keeps reading input after a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Console state: local sessions plus the one currently in use
pub struct Shell {
    service: Arc<RelayService>,
    config: ConsoleConfig,
    sessions: BTreeMap<String, SessionToken>,
    active: Option<String>,
}

impl Shell {
    pub fn new(service: Arc<RelayService>, config: ConsoleConfig) -> Self {
        Self {
            service,
            config,
            sessions: BTreeMap::new(),
            active: None,
        }
    }

    /// Username of the local identity in use
    pub fn active(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// Run one command, returning the lines to print
    pub fn execute(&mut self, command: ShellCommand) -> (Flow, Vec<String>) {
        let mut out = Vec::new();
        let flow = match command {
            ShellCommand::Quit => Flow::Quit,
            ShellCommand::Help => {
                out.push(HELP.to_string());
                Flow::Continue
            }
            ShellCommand::Join(username) => {
                match self.service.join(&username) {
                    Ok(receipt) => {
                        out.push(format!(
                            "joined as {} (handle {})",
                            receipt.username, receipt.identity_handle
                        ));
                        self.active = Some(receipt.username.clone());
                        self.sessions.insert(receipt.username, receipt.session_token);
                    }
                    Err(err) => out.push(render_error(&err)),
                }
                Flow::Continue
            }
            ShellCommand::Switch(username) => {
                let found = self
                    .sessions
                    .keys()
                    .find(|name| name.to_lowercase() == username.to_lowercase())
                    .cloned();
                match found {
                    Some(name) => {
                        out.push(format!("now acting as {}", name));
                        self.active = Some(name);
                    }
                    None => out.push(format!("no local session for {}", username)),
                }
                Flow::Continue
            }
            ShellCommand::Sessions => {
                if self.sessions.is_empty() {
                    out.push("no local sessions".to_string());
                }
                for name in self.sessions.keys() {
                    let marker = if self.active.as_deref() == Some(name.as_str()) {
                        "*"
                    } else {
                        " "
                    };
                    out.push(format!("{} {}", marker, name));
                }
                Flow::Continue
            }
            ShellCommand::Send { recipient, text } => {
                if let Some(token) = self.require_session(&mut out) {
                    match self
                        .service
                        .send_message(&token, &text, recipient.as_deref())
                    {
                        Ok(id) => out.push(format!("sent {}", id)),
                        Err(err) => self.report(err, &mut out),
                    }
                }
                Flow::Continue
            }
            ShellCommand::Fetch => {
                if let Some(token) = self.require_session(&mut out) {
                    match self.service.fetch_messages(&token) {
                        Ok(messages) if messages.is_empty() => out.push("no messages".to_string()),
                        Ok(messages) => out.extend(messages.iter().map(render_message)),
                        Err(err) => self.report(err, &mut out),
                    }
                }
                Flow::Continue
            }
            ShellCommand::Leave => {
                if let Some(token) = self.require_session(&mut out) {
                    match self.service.leave(&token) {
                        Ok(()) => {
                            out.push("identity erased".to_string());
                            self.forget_active();
                        }
                        Err(err) => self.report(err, &mut out),
                    }
                }
                Flow::Continue
            }
            ShellCommand::Who => {
                match self.service.list_usernames() {
                    Ok(names) if names.is_empty() => out.push("nobody is here".to_string()),
                    Ok(names) => out.push(names.join(", ")),
                    Err(err) => out.push(render_error(&err)),
                }
                Flow::Continue
            }
            ShellCommand::Stats => {
                match self.service.stats() {
                    Ok(stats) => out.push(format!(
                        "identities={} sessions={} keys={} cached_messages={} sweeps={}",
                        stats.identities,
                        stats.sessions,
                        stats.keys,
                        stats.cached_messages,
                        self.service
                            .reaper_sweeps()
                            .map_or_else(|| "-".to_string(), |n| n.to_string()),
                    )),
                    Err(err) => out.push(render_error(&err)),
                }
                Flow::Continue
            }
            ShellCommand::Wipe => {
                match self.service.wipe() {
                    Ok(count) => {
                        out.push(format!("erased {} identities", count));
                        self.sessions.clear();
                        self.active = None;
                    }
                    Err(err) => out.push(render_error(&err)),
                }
                Flow::Continue
            }
        };
        (flow, out)
    }

    fn require_session(&self, out: &mut Vec<String>) -> Option<SessionToken> {
        let token = self
            .active
            .as_ref()
            .and_then(|name| self.sessions.get(name))
            .cloned();
        if token.is_none() {
            out.push("no active session, /join first".to_string());
        }
        token
    }

    /// Print an error; a dead session is dropped locally
    fn report(&mut self, err: RelayError, out: &mut Vec<String>) {
        out.push(render_error(&err));
        if err == RelayError::InvalidSession {
            self.forget_active();
        }
    }

    fn forget_active(&mut self) {
        if let Some(name) = self.active.take() {
            self.sessions.remove(&name);
        }
    }

    /// Read commands from stdin until `/quit` or end of input
    pub async fn run(mut self) -> anyhow::Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut events = self.service.subscribe();
        let mut listening = self.config.show_broadcasts;

        println!("{}", HELP);
        loop {
            self.prompt()?;
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else {
                        debug!("Input closed");
                        break;
                    };
                    let command = match ShellCommand::parse(&line) {
                        Ok(Some(command)) => command,
                        Ok(None) => continue,
                        Err(err) => {
                            println!("{}", err);
                            continue;
                        }
                    };
                    let (flow, output) = self.execute(command);
                    for line in output {
                        println!("{}", line);
                    }
                    if flow == Flow::Quit {
                        break;
                    }
                }
                event = events.recv(), if listening => {
                    match event {
                        Ok(record) => println!("\r{}", render_event(&record)),
                        Err(RecvError::Lagged(skipped)) => {
                            warn!("Broadcast listener lagged, skipped {} events", skipped);
                        }
                        Err(RecvError::Closed) => listening = false,
                    }
                }
            }
        }
        Ok(())
    }

    fn prompt(&self) -> std::io::Result<()> {
        let mut stdout = std::io::stdout();
        match &self.active {
            Some(name) => write!(stdout, "[{}] {}", name, self.config.prompt)?,
            None => write!(stdout, "{}", self.config.prompt)?,
        }
        stdout.flush()
    }
}

// ----------------------------------------------------------------------------
// Rendering
// ----------------------------------------------------------------------------

fn render_error(err: &RelayError) -> String {
    format!("error {}: {}", err.status_code(), err)
}

fn render_message(message: &FetchedMessage) -> String {
    let body = match &message.content {
        MessageContent::Plaintext(text) => text.as_str(),
        MessageContent::Undecryptable => "<undecryptable>",
    };
    format!(
        "[{}] {} -> {}: {}",
        message.timestamp.as_millis(),
        message.sender_username,
        message.recipient,
        body
    )
}

fn render_event(record: &MessageRecord) -> String {
    format!(
        "* {} -> {}: {} encrypted bytes",
        record.sender_username,
        record.recipient,
        record.ciphertext.len()
    )
}
