#![cfg_attr(not(test), forbid(unsafe_code))]

//! Main entry point for the TaskBridge chat CLI.

use clap::{CommandFactory, Parser, Subcommand};
use dotenv::dotenv;

mod commands;
mod session;

/// TaskBridge chat CLI
#[derive(Parser)]
#[command(name = "taskbridge")]
#[command(about = "Command-line chat client for the TaskBridge marketplace", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Subcommands for the TaskBridge CLI
#[derive(Subcommand)]
enum Commands {
    /// Manage the stored chat session (credential and server)
    #[command(subcommand)]
    Session(commands::session::SessionCommands),

    /// List conversations, or show one conversation's messages
    Chat(commands::chat::ChatArgs),

    /// Send a message to another user
    Send(commands::chat::SendArgs),

    /// Follow live pushes, reconciling them into the conversation list
    Follow(commands::chat::FollowArgs),

    /// Soft-delete a single message
    DeleteMessage(commands::chat::DeleteMessageArgs),

    /// Hide a whole conversation for the current user
    DeleteConversation(commands::chat::DeleteConversationArgs),

    /// Generate shell completion scripts for the CLI
    Completion {
        /// The shell type for which to generate the completion script (e.g., bash, zsh, fish, powershell)
        #[arg(
            long,
            short,
            help = "The shell type for which to generate the completion script (e.g., bash, zsh, fish, powershell)"
        )]
        shell: String,
    },

    /// Generate a configuration file
    Config {
        /// Format of the configuration file to generate (yaml or json). Defaults to yaml.
        #[arg(
            long,
            short,
            help = "Format of the configuration file to generate (yaml or json). Defaults to yaml."
        )]
        format: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Commands::Session(command) => commands::session::handle(command),
        Commands::Chat(args) => commands::chat::handle_chat(args).await,
        Commands::Send(args) => commands::chat::handle_send(args).await,
        Commands::Follow(args) => commands::chat::handle_follow(args).await,
        Commands::DeleteMessage(args) => commands::chat::handle_delete_message(args).await,
        Commands::DeleteConversation(args) => {
            commands::chat::handle_delete_conversation(args).await
        }
        Commands::Completion { shell } => {
            commands::completion::handle_completion_command(&shell, &mut Cli::command())
        }
        Commands::Config { format } => commands::config::handle_config_command(format.as_deref()),
    }
}
