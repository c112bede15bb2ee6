// ─── Control Channel ───
// Addressing a live server console. The core only speaks in
// `ServerCommand`s; the channel decides how they reach the process.

use async_trait::async_trait;
use serde_json::json;
use tokio::process::Command;
use tracing::{debug, warn};

/// Everything the updater ever asks a running server to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerCommand {
    Stop,
    BroadcastTitle(String),
    BroadcastSubtitle(String),
    BroadcastChat(String),
}

impl ServerCommand {
    /// Minecraft console line for this command.
    pub fn console_line(&self) -> String {
        match self {
            ServerCommand::Stop => "stop".to_string(),
            ServerCommand::BroadcastTitle(text) => {
                format!("title @a title {}", json!({"text": text, "color": "red"}))
            }
            ServerCommand::BroadcastSubtitle(text) => {
                format!("title @a subtitle {}", json!({"text": text, "color": "yellow"}))
            }
            ServerCommand::BroadcastChat(text) => {
                format!("tellraw @a {}", json!({"text": text, "color": "red"}))
            }
        }
    }
}

#[async_trait]
pub trait ControlChannel: Send + Sync {
    fn session(&self) -> &str;

    async fn session_exists(&self) -> bool;

    /// Fire-and-forget delivery. `false` when the command could not be handed over.
    async fn send(&self, command: &ServerCommand) -> bool;
}

/// GNU screen session running the server console.
pub struct ScreenChannel {
    session: String,
}

impl ScreenChannel {
    pub fn new(session: &str) -> Self {
        Self {
            session: session.to_string(),
        }
    }
}

/// `screen -list` prints `<pid>.<name>\t(...)`; match the name exactly.
pub fn screen_listing_contains(listing: &str, session: &str) -> bool {
    let needle = format!(".{session}");
    listing.lines().any(|line| {
        line.split_whitespace()
            .next()
            .map(|id| id.ends_with(&needle) && id.len() > needle.len())
            .unwrap_or(false)
    })
}

#[async_trait]
impl ControlChannel for ScreenChannel {
    fn session(&self) -> &str {
        &self.session
    }

    async fn session_exists(&self) -> bool {
        // `screen -list` exits non-zero when there is nothing to list.
        match Command::new("screen").arg("-list").output().await {
            Ok(output) => {
                screen_listing_contains(&String::from_utf8_lossy(&output.stdout), &self.session)
            }
            Err(e) => {
                debug!("screen -list failed: {}", e);
                false
            }
        }
    }

    async fn send(&self, command: &ServerCommand) -> bool {
        let line = command.console_line();
        debug!("screen[{}] <- {}", self.session, line);

        let result = Command::new("screen")
            .args(["-S", &self.session, "-X", "stuff"])
            .arg(format!("{line}\n"))
            .output()
            .await;

        match result {
            Ok(output) if output.status.success() => true,
            Ok(output) => {
                warn!(
                    "Failed to send to screen {}: {} (stderr: {})",
                    self.session,
                    line,
                    String::from_utf8_lossy(&output.stderr).trim()
                );
                false
            }
            Err(e) => {
                warn!("Cannot run screen for {}: {}", self.session, e);
                false
            }
        }
    }
}
