//! Command-line interface definitions and parsing

use clap::{Parser, Subcommand, ValueEnum};
use hangouts_core::HangoutState;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Identity to connect as
    #[arg(short, long, global = true)]
    pub username: Option<String>,

    /// Server host and port, e.g. `localhost:3000`
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// Bearer token for the search endpoint
    #[arg(long, global = true)]
    pub token: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Data directory for the durable store
    #[arg(short, long, global = true)]
    pub data_dir: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Stay connected and report incoming hangouts until Ctrl+C
    Connect,
    /// Send one intent and wait for its acknowledgement
    Send {
        /// What to do
        #[arg(value_enum)]
        action: IntentKind,
        /// Peer identity
        peer: String,
        /// Message text
        text: Option<String>,
        /// Peer email, carried with invitations
        #[arg(long)]
        email: Option<String>,
    },
    /// Print stored hangouts and the unread set
    Inbox {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the conversation with one peer and mark it read
    Show { peer: String },
    /// Find peers by name
    Search { query: String },
    /// Write an example configuration file
    InitConfig {
        /// Where to write it; defaults to the user config file
        path: Option<String>,
        /// Replace an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Intents a user can issue from the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum IntentKind {
    Invite,
    Accept,
    Decline,
    Block,
    Unblock,
    Message,
}

impl IntentKind {
    /// The role this intent puts the local user in
    pub fn state(&self) -> HangoutState {
        match self {
            IntentKind::Invite => HangoutState::Inviter,
            IntentKind::Accept => HangoutState::Accepter,
            IntentKind::Decline => HangoutState::Decliner,
            IntentKind::Block => HangoutState::Blocker,
            IntentKind::Unblock => HangoutState::Unblocker,
            IntentKind::Message => HangoutState::Messanger,
        }
    }
}
