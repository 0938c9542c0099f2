//! Handlers for the CLI subcommands.

use std::io::Write;
use std::path::Path;

use futures::StreamExt;

use super::{ChatArgs, RenameArgs, SessionArgs, SessionsArgs};
use crate::chat::{ChatRequest, ChatService};
use crate::config::ChatConfig;
use crate::encoder::FrameType;
use crate::error::{ChatError, Result};
use crate::tools::{builtin, ToolRegistry};

fn service(config_path: Option<&Path>) -> Result<ChatService> {
    let config = ChatConfig::load(config_path)?;
    let mut registry = ToolRegistry::new();
    registry.register(builtin::current_time_tool());
    ChatService::from_config(config, registry)
}

/// Stream one request's frames to stdout.
pub async fn handle_chat(config_path: Option<&Path>, args: ChatArgs) -> Result<()> {
    let service = service(config_path)?;
    let request = ChatRequest::builder()
        .user_id(args.user)
        .message(args.prompt)
        .maybe_session_id(args.session)
        .maybe_model(args.model)
        .enable_tools(!args.no_tools)
        .build();

    let mut frames = service.chat(request).await?;
    eprintln!("session: {}", frames.session_id());

    let mut failure = None;
    let mut stdout = std::io::stdout();
    while let Some(frame) = frames.next().await {
        let line = if args.sse {
            frame.to_sse()
        } else {
            frame.to_ndjson_line()
        };
        stdout.write_all(line.as_bytes())?;
        stdout.flush()?;
        if frame.frame_type == FrameType::Error {
            failure = Some(frame.text);
        }
    }

    service.flush().await;
    match failure {
        Some(message) => Err(ChatError::Stream(message)),
        None => Ok(()),
    }
}

pub async fn handle_history(config_path: Option<&Path>, args: SessionArgs) -> Result<()> {
    let service = service(config_path)?;
    for message in service.history(&args.session).await? {
        println!("{}", serde_json::to_string(&message)?);
    }
    Ok(())
}

pub async fn handle_clear(config_path: Option<&Path>, args: SessionArgs) -> Result<()> {
    let service = service(config_path)?;
    service.clear_session(&args.session).await;
    service.flush().await;
    eprintln!("cleared {}", args.session);
    Ok(())
}

/// Print session summaries as JSON lines.
pub async fn handle_sessions(config_path: Option<&Path>, args: SessionsArgs) -> Result<()> {
    let service = service(config_path)?;
    for summary in service.sessions(args.user, args.limit).await? {
        println!("{}", serde_json::to_string(&summary)?);
    }
    Ok(())
}

pub async fn handle_rename(config_path: Option<&Path>, args: RenameArgs) -> Result<()> {
    let service = service(config_path)?;
    service.rename_session(&args.session, &args.title).await?;
    service.flush().await;
    eprintln!("renamed {}", args.session);
    Ok(())
}
