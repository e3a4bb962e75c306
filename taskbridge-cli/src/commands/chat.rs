//! Chat commands: history-backed conversation views, sending, live follow,
//! and soft-deletes.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use clap::Args;
use reqwest::Client;
use shared::{
    config::server::Config,
    models::{ChatMessage, SendMessageRequest, StreamEvent, Timestamp},
};
use tokio::sync::mpsc;
use url::Url;

use super::session::{self, StoredSession};
use crate::session::{
    connection::ChatConnection,
    state::{ConversationView, SessionState},
};

fn client_with_session() -> Result<(Client, StoredSession, Url)> {
    let path = session::session_path();
    let stored = session::load_session(&path).with_context(|| {
        format!(
            "no session found at {}; run `taskbridge session login` first",
            path.display()
        )
    })?;
    let server_url = Url::parse(&stored.server).context("invalid server URL in session")?;
    let client = session::build_client()?;
    Ok((client, stored, server_url))
}

#[derive(Args, Debug)]
#[command(about = "List conversations, or show one conversation's messages")]
pub struct ChatArgs {
    /// Partner username whose conversation to open
    #[arg(long, alias = "partner")]
    pub with: Option<String>,
}

#[derive(Args, Debug)]
#[command(about = "Send a message to another user")]
pub struct SendArgs {
    /// Recipient username
    #[arg(long)]
    pub to: String,

    /// Message text
    #[arg()]
    pub text: String,
}

#[derive(Args, Debug)]
#[command(about = "Follow live pushes and fold them into the conversation list")]
pub struct FollowArgs {
    /// Treat this partner's conversation as the open one (its pushes do not
    /// count as unread)
    #[arg(long)]
    pub with: Option<String>,
}

#[derive(Args, Debug)]
#[command(about = "Soft-delete a single message")]
pub struct DeleteMessageArgs {
    /// Identity of the message to delete
    #[arg(long)]
    pub id: i64,

    /// Also hide the message from the recipient (senders only)
    #[arg(long)]
    pub for_all: bool,
}

#[derive(Args, Debug)]
#[command(about = "Hide a whole conversation for the current user")]
pub struct DeleteConversationArgs {
    /// Partner username whose conversation to hide
    #[arg(long)]
    pub with: String,
}

pub async fn handle_chat(args: ChatArgs) -> Result<()> {
    let (client, stored, server_url) = client_with_session()?;

    let mut state = SessionState::new(stored.username.clone());
    match fetch_history(&client, &server_url, &stored).await {
        Ok(messages) => state.load_history(messages),
        Err(err) => {
            // A failed load degrades to an empty list rather than aborting.
            eprintln!("warning: failed to load history: {err}");
        }
    }

    if let Some(partner) = args.with {
        // Opening also materializes an empty conversation for a partner the
        // user has never talked to, so a follow-up send has a target.
        state.open_conversation(&partner);
        if let Some(conversation) = state.conversation(&partner) {
            if conversation.messages.is_empty() {
                println!("No messages with {partner} yet.");
            } else {
                render_conversation(conversation);
            }
        }
    } else {
        render_conversation_list(state.conversations());
    }

    Ok(())
}

pub async fn handle_send(args: SendArgs) -> Result<()> {
    if args.text.trim().is_empty() {
        bail!("refusing to send an empty message");
    }

    let (client, stored, server_url) = client_with_session()?;

    let payload = SendMessageRequest {
        recipient_username: args.to.clone(),
        content: args.text,
        timestamp: Timestamp(Utc::now()),
    };

    let response = client
        .post(server_url.join("api/v1/chat")?)
        .bearer_auth(&stored.token)
        .json(&payload)
        .send()
        .await
        .context("send request failed")?
        .error_for_status()
        .context("message rejected")?;

    let message: ChatMessage = response.json().await?;
    println!("Sent message {} to {}", message.id, message.recipient_username);
    Ok(())
}

pub async fn handle_follow(args: FollowArgs) -> Result<()> {
    let (client, stored, server_url) = client_with_session()?;
    let config = Config::load_config(None, None)
        .map_err(|err| anyhow::anyhow!("failed to load configuration: {err}"))?;

    let mut state = SessionState::new(stored.username.clone());
    match fetch_history(&client, &server_url, &stored).await {
        Ok(messages) => state.load_history(messages),
        Err(err) => eprintln!("warning: failed to load history: {err}"),
    }
    if let Some(partner) = &args.with {
        state.open_conversation(partner);
    }
    render_conversation_list(state.conversations());

    let (events, mut receiver) = mpsc::channel(config.stream.channel_capacity);
    let connection = ChatConnection::new(
        client,
        &server_url,
        stored.token.clone(),
        Duration::from_secs(config.stream.reconnect_delay_seconds),
        events,
    )?;
    connection.ensure_connection();

    println!(
        "Following live messages ({:?})... (press Ctrl+C to stop)",
        connection.state()
    );

    while let Some(event) = receiver.recv().await {
        match event {
            StreamEvent::Connected { username } => {
                eprintln!("[connected as {username}]");
            }
            StreamEvent::Message { message } => {
                let partner = message.partner_of(state.current_user()).to_string();
                let line = format!(
                    "[{}] {}: {}",
                    message.timestamp.0.format("%Y-%m-%d %H:%M:%S"),
                    message.sender_username,
                    message.content
                );
                if state.apply_push(message) {
                    println!("{line}");
                    if let Some(conversation) = state.conversation(&partner) {
                        if conversation.unread_count > 0 {
                            println!("  ({} unread from {partner})", conversation.unread_count);
                        }
                    }
                }
            }
            StreamEvent::Ping => {}
        }
    }

    Ok(())
}

pub async fn handle_delete_message(args: DeleteMessageArgs) -> Result<()> {
    let (client, stored, server_url) = client_with_session()?;

    // Load the current view first so the delete can be mirrored locally
    // instead of refetching afterwards.
    let mut state = SessionState::new(stored.username.clone());
    match fetch_history(&client, &server_url, &stored).await {
        Ok(messages) => state.load_history(messages),
        Err(err) => eprintln!("warning: failed to load history: {err}"),
    }
    let partner = state
        .conversations()
        .iter()
        .find(|c| c.messages.iter().any(|m| m.id == args.id))
        .map(|c| c.partner.clone());

    let mut endpoint = server_url.join(&format!("api/v1/chat/message/{}/delete", args.id))?;
    endpoint
        .query_pairs_mut()
        .append_pair("currentUsername", &stored.username)
        .append_pair("deleteForAll", if args.for_all { "true" } else { "false" });

    client
        .post(endpoint)
        .bearer_auth(&stored.token)
        .send()
        .await
        .context("delete request failed")?
        .error_for_status()
        .context("delete rejected")?;

    println!("Deleted message {}", args.id);
    if let Some(partner) = partner {
        state.remove_message(&partner, args.id);
        render_conversation_list(state.conversations());
    }
    Ok(())
}

pub async fn handle_delete_conversation(args: DeleteConversationArgs) -> Result<()> {
    let (client, stored, server_url) = client_with_session()?;

    let mut state = SessionState::new(stored.username.clone());
    match fetch_history(&client, &server_url, &stored).await {
        Ok(messages) => state.load_history(messages),
        Err(err) => eprintln!("warning: failed to load history: {err}"),
    }

    let mut endpoint = server_url.join(&format!("api/v1/chat/conversation/{}", args.with))?;
    endpoint
        .query_pairs_mut()
        .append_pair("currentUsername", &stored.username);

    client
        .delete(endpoint)
        .bearer_auth(&stored.token)
        .send()
        .await
        .context("delete request failed")?
        .error_for_status()
        .context("delete rejected")?;

    println!("Hid conversation with {}", args.with);
    state.remove_conversation(&args.with);
    render_conversation_list(state.conversations());
    Ok(())
}

async fn fetch_history(
    client: &Client,
    server_url: &Url,
    stored: &StoredSession,
) -> Result<Vec<ChatMessage>> {
    let endpoint = server_url
        .join(&format!("api/v1/chat/{}", stored.username))
        .context("invalid history endpoint")?;

    let response = client
        .get(endpoint)
        .bearer_auth(&stored.token)
        .send()
        .await
        .context("failed to fetch history")?
        .error_for_status()
        .context("history request rejected")?;

    Ok(response.json().await?)
}

fn render_conversation_list(conversations: &[ConversationView]) {
    if conversations.is_empty() {
        println!("No conversations yet.");
        return;
    }

    for conversation in conversations {
        let last_time = conversation
            .last_message_time
            .as_ref()
            .map_or_else(String::new, |time| {
                time.0.format("%Y-%m-%d %H:%M:%S").to_string()
            });
        println!(
            "- {} unread={} last={last_time}",
            conversation.partner, conversation.unread_count
        );
        if !conversation.last_message.is_empty() {
            println!("  {}", conversation.last_message);
        }
    }
}

fn render_conversation(conversation: &ConversationView) {
    println!("Conversation with {}", conversation.partner);
    for message in &conversation.messages {
        println!(
            "[{}] {}: {}",
            message.timestamp.0.format("%Y-%m-%d %H:%M:%S"),
            message.sender_username,
            message.content
        );
    }
}
