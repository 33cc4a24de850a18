//! Command handlers for the hangouts CLI

use std::time::Duration;

use hangouts_core::{Command, Hangout, Identity, Projection};
use hangouts_runtime::{EngineBuilder, EngineHandle, Session};
use tracing::{info, warn};

use crate::cli::{Commands, IntentKind};
use crate::config::CliAppConfig;
use crate::error::{CliError, Result};

/// How long to wait for the store to be read back at startup
const LOAD_TIMEOUT: Duration = Duration::from_secs(5);

/// Command dispatcher for handling CLI commands
pub struct CommandDispatcher;

impl CommandDispatcher {
    /// Start an engine for the configured identity and run one command on it
    pub async fn execute(command: Commands, config: CliAppConfig) -> Result<()> {
        if matches!(command, Commands::InitConfig { .. }) {
            return Err(CliError::Usage(
                "init-config runs without an engine".to_string(),
            ));
        }
        let mut session = Session::new(config.username());
        if let Some(token) = &config.identity.token {
            session = session.with_token(token.clone());
        }
        let mut handle = EngineBuilder::new(session)
            .with_config(config.engine.clone())
            .build_and_start()
            .await?;
        Self::load(&handle).await?;

        let result = match command {
            Commands::Connect => Self::handle_connect_command(&handle, &config).await,
            Commands::Send {
                action,
                peer,
                text,
                email,
            } => Self::handle_send_command(&handle, &config, action, peer, text, email).await,
            Commands::Inbox { json } => Self::handle_inbox_command(&handle, json),
            Commands::Show { peer } => Self::handle_show_command(&handle, peer).await,
            Commands::Search { query } => Self::handle_search_command(&handle, query).await,
            Commands::InitConfig { .. } => Ok(()),
        };

        let stats = handle.shutdown().await?;
        info!(
            frames = stats.frames_reconciled,
            sent = stats.intents_sent,
            buffered = stats.intents_buffered,
            "engine stopped"
        );
        result
    }

    async fn load(handle: &EngineHandle) -> Result<()> {
        handle.send_command(Command::Load).await?;
        handle
            .wait_for(LOAD_TIMEOUT, |p| p.loaded)
            .await
            .map_err(|_| CliError::Timeout("loading the local store".to_string()))?;
        Ok(())
    }

    async fn open_channel(handle: &EngineHandle, config: &CliAppConfig) -> Result<()> {
        handle.send_command(Command::Connect).await?;
        let timeout = Duration::from_secs(config.cli.connect_timeout_secs);
        handle
            .wait_for(timeout, |p| p.ready())
            .await
            .map_err(|_| {
                CliError::Timeout(format!("connecting to {}", config.engine.server.host))
            })?;
        info!(host = %config.engine.server.host, "channel open");
        Ok(())
    }

    /// Stay connected and report every change to the unread set
    async fn handle_connect_command(handle: &EngineHandle, config: &CliAppConfig) -> Result<()> {
        Self::open_channel(handle, config).await?;
        println!("Connected as {}. Press Ctrl+C to stop.", handle.identity());

        let mut projection = handle.subscribe();
        let mut seen: Vec<Hangout> = projection.borrow_and_update().unread.clone();
        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => break,
                changed = projection.changed() => {
                    if changed.is_err() {
                        warn!("engine stopped");
                        break;
                    }
                    let current = projection.borrow_and_update().clone();
                    for hangout in current.unread.iter().filter(|h| !seen.contains(h)) {
                        println!("{}", format_hangout(hangout));
                    }
                    if let Some(error) = &current.channel_error {
                        warn!("channel error: {}", error);
                    }
                    seen = current.unread;
                }
            }
        }
        Ok(())
    }

    async fn handle_send_command(
        handle: &EngineHandle,
        config: &CliAppConfig,
        action: IntentKind,
        peer: String,
        text: Option<String>,
        email: Option<String>,
    ) -> Result<()> {
        if action == IntentKind::Message && text.as_deref().map_or(true, str::is_empty) {
            return Err(CliError::Usage("a message needs text".to_string()));
        }
        let peer = Identity::new(peer);
        let state = action.state();

        Self::open_channel(handle, config).await?;
        handle
            .send_command(Command::SubmitIntent {
                peer: peer.clone(),
                command: state,
                email,
                text,
            })
            .await?;

        // the optimistic write lands first, so any later delivered record is our ack
        let short = Duration::from_secs(config.cli.connect_timeout_secs);
        handle
            .wait_for(short, |p| {
                p.last_intent
                    .as_ref()
                    .is_some_and(|intent| intent.peer == peer && intent.command == state)
            })
            .await?;
        println!("{} sent to {}", state, peer);

        let timeout = Duration::from_secs(config.cli.ack_timeout_secs);
        let acknowledged = state.acknowledged();
        let projection = handle
            .wait_for(timeout, |p| {
                p.find(&peer)
                    .is_some_and(|h| h.delivered && h.state == acknowledged)
            })
            .await
            .map_err(|_| CliError::Timeout(format!("waiting for {peer} to acknowledge")))?;
        if let Some(hangout) = projection.find(&peer) {
            println!("{}", format_hangout(hangout));
        }
        Ok(())
    }

    fn handle_inbox_command(handle: &EngineHandle, json: bool) -> Result<()> {
        let projection = handle.projection();
        if json {
            println!("{}", serde_json::to_string_pretty(&projection.hangouts)?);
            return Ok(());
        }
        print_inbox(&projection);
        Ok(())
    }

    async fn handle_show_command(handle: &EngineHandle, peer: String) -> Result<()> {
        let peer = Identity::new(peer);
        if handle.projection().find(&peer).is_none() {
            return Err(CliError::Usage(format!("no hangout with {peer}")));
        }
        handle
            .send_command(Command::OpenConversation { peer: peer.clone() })
            .await?;
        let projection = handle
            .wait_for(LOAD_TIMEOUT, |p| p.focused_peer() == Some(&peer))
            .await?;

        for message in &projection.messages {
            let marker = if message.system {
                "*"
            } else if message.delivered {
                " "
            } else {
                "~"
            };
            println!(
                "{} [{}] {}: {}",
                marker, message.timestamp, message.author, message.text
            );
        }
        if projection.messages.is_empty() {
            println!("No messages with {}", peer);
        }
        Ok(())
    }

    async fn handle_search_command(handle: &EngineHandle, query: String) -> Result<()> {
        if query.trim().is_empty() {
            return Err(CliError::Usage("search query is empty".to_string()));
        }
        handle
            .send_command(Command::Search {
                query: query.clone(),
            })
            .await?;
        let projection = handle
            .wait_for(LOAD_TIMEOUT, |p| p.search == query && !p.loading)
            .await?;

        if let Some(error) = &projection.error {
            return Err(CliError::Usage(format!("search failed: {error}")));
        }
        if projection.search_results.is_empty() {
            println!("No peers match '{}'", query);
        }
        for hangout in &projection.search_results {
            println!("{}", format_hangout(hangout));
        }
        Ok(())
    }
}

fn format_hangout(hangout: &Hangout) -> String {
    let mut line = format!("{:<16} {:<10}", hangout.peer.as_str(), hangout.state.name());
    if !hangout.delivered {
        line.push_str(" (pending)");
    }
    if let Some(message) = &hangout.message {
        line.push_str(&format!(" \"{}\"", message.text));
    }
    line
}

fn print_inbox(projection: &Projection) {
    if projection.hangouts.is_empty() {
        println!("No hangouts yet");
    }
    for hangout in &projection.hangouts {
        let unread = if hangout.read { " " } else { "●" };
        println!("{} {}", unread, format_hangout(hangout));
    }
    if !projection.unread.is_empty() {
        println!("\n{} unread", projection.unread.len());
    }
    if projection.queued > 0 {
        println!("{} intents waiting for the channel", projection.queued);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hangouts_core::{HangoutState, Timestamp};

    #[test]
    fn test_format_hangout_marks_pending_and_message() {
        let hangout = Hangout::new("bob".into(), HangoutState::Messanger, Timestamp::new(1))
            .with_message("hi");
        let line = format_hangout(&hangout);
        assert!(line.starts_with("bob"));
        assert!(line.contains("MESSANGER"));
        assert!(line.contains("(pending)"));
        assert!(line.ends_with("\"hi\""));

        let mut delivered = hangout.clone();
        delivered.delivered = true;
        assert!(!format_hangout(&delivered).contains("(pending)"));
    }
}
