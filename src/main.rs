//! roci-chat CLI binary entry point.

use clap::Parser;
use roci_chat::cli::{commands, Cli, Commands};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();
    let config = cli.config.as_deref();

    let result = match cli.command {
        Commands::Chat(args) => commands::handle_chat(config, args).await,
        Commands::History(args) => commands::handle_history(config, args).await,
        Commands::Clear(args) => commands::handle_clear(config, args).await,
        Commands::Sessions(args) => commands::handle_sessions(config, args).await,
        Commands::Rename(args) => commands::handle_rename(config, args).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
