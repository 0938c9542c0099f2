//! CLI entry point for roci-chat.

pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// roci-chat CLI
#[derive(Parser, Debug)]
#[command(name = "roci-chat", version, about = "Streaming chat with tool calling")]
pub struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Send a message and stream the response frames
    Chat(ChatArgs),
    /// Print the stored messages of a session
    History(SessionArgs),
    /// Delete a session
    Clear(SessionArgs),
    /// List a user's sessions, newest first
    Sessions(SessionsArgs),
    /// Set a session's title
    Rename(RenameArgs),
}

/// Arguments for the `chat` subcommand.
#[derive(Parser, Debug)]
pub struct ChatArgs {
    /// User message
    pub prompt: String,

    /// Continue an existing session
    #[arg(short, long)]
    pub session: Option<String>,

    /// Model override
    #[arg(short, long)]
    pub model: Option<String>,

    /// Do not advertise tools to the model
    #[arg(long)]
    pub no_tools: bool,

    /// Emit server-sent events instead of NDJSON
    #[arg(long)]
    pub sse: bool,

    /// Numeric user id recorded on new sessions
    #[arg(long, default_value_t = 0)]
    pub user: i64,
}

/// A session id argument.
#[derive(Parser, Debug)]
pub struct SessionArgs {
    pub session: String,
}

/// Arguments for the `sessions` subcommand.
#[derive(Parser, Debug)]
pub struct SessionsArgs {
    /// Numeric user id
    #[arg(long, default_value_t = 0)]
    pub user: i64,

    /// Maximum number of sessions
    #[arg(short, long, default_value_t = 20)]
    pub limit: usize,
}

/// Arguments for the `rename` subcommand.
#[derive(Parser, Debug)]
pub struct RenameArgs {
    pub session: String,
    pub title: String,
}
