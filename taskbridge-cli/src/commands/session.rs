//! Stored chat session: which server to talk to and the credential to present.
//!
//! Credential issuance is the marketplace auth service's job; the CLI only
//! stores a token it was handed (or a locally minted unsigned one for dev
//! servers, which do not verify signatures).

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail};
use clap::{Args, Subcommand};
use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use shared::config::server::Config;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredSession {
    pub username: String,
    pub token: String,
    pub server: String,
}

#[derive(Subcommand, Debug)]
pub enum SessionCommands {
    /// Store a credential and server for subsequent chat commands
    Login(LoginArgs),
    /// Print the identity of the stored session
    Whoami,
    /// Remove the stored session
    Logout,
}

#[derive(Args, Debug)]
pub struct LoginArgs {
    /// JWT issued by the marketplace auth service
    #[arg(long, conflicts_with = "user")]
    pub token: Option<String>,

    /// Mint an unsigned dev token for this username instead of presenting a
    /// real one (dev servers only)
    #[arg(long)]
    pub user: Option<String>,

    /// TaskBridge server base URL (default: from config/environment)
    #[arg(long)]
    pub server: Option<String>,
}

pub fn handle(command: SessionCommands) -> Result<()> {
    match command {
        SessionCommands::Login(args) => login(args),
        SessionCommands::Whoami => whoami(),
        SessionCommands::Logout => logout(),
    }
}

fn login(args: LoginArgs) -> Result<()> {
    let token = match (args.token, args.user) {
        (Some(token), _) => token,
        (None, Some(user)) => shared::auth::unsigned_token(&user),
        (None, None) => bail!("provide either --token or --user"),
    };

    let username = shared::auth::username_from_token(&token)
        .context("token carries no resolvable username")?;

    let server = match args.server {
        Some(server) => server,
        None => {
            let config = Config::load_config(None, None)
                .map_err(|err| anyhow::anyhow!("failed to load configuration: {err}"))?;
            config.client.base_url
        }
    };

    let session = StoredSession {
        username: username.clone(),
        token,
        server,
    };
    let path = session_path();
    save_session(&path, &session)?;

    println!("Logged in as {username}");
    println!("session stored at {}", path.display());
    Ok(())
}

fn whoami() -> Result<()> {
    let path = session_path();
    let session = load_session(&path)
        .with_context(|| "no active session found; run `taskbridge session login` first")?;
    println!("{} @ {}", session.username, session.server);
    Ok(())
}

fn logout() -> Result<()> {
    let path = session_path();
    if path.exists() {
        fs::remove_file(&path)
            .with_context(|| format!("failed to remove session at {}", path.display()))?;
        println!("Removed session at {}", path.display());
    } else {
        println!("No session found at {}", path.display());
    }
    Ok(())
}

pub fn session_path() -> PathBuf {
    BaseDirs::new()
        .map(|dirs| dirs.config_dir().join("taskbridge").join("session.json"))
        .unwrap_or_else(|| PathBuf::from("./session.json"))
}

pub fn load_session(path: &Path) -> Result<StoredSession> {
    if !path.exists() {
        bail!("session file not found at {}", path.display());
    }
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read session at {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("malformed session file at {}", path.display()))
}

pub fn save_session(path: &Path, session: &StoredSession) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create session directory {}", parent.display()))?;
    }
    fs::write(path, serde_json::to_vec_pretty(session)?)
        .with_context(|| format!("failed to write session at {}", path.display()))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))
            .context("failed to set session file permissions")?;
    }
    Ok(())
}

pub fn build_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent("taskbridge-cli")
        .build()
        .context("failed to build HTTP client")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn session_round_trips_through_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("session.json");
        let session = StoredSession {
            username: "alice".into(),
            token: shared::auth::unsigned_token("alice"),
            server: "http://localhost:8080".into(),
        };

        save_session(&path, &session).unwrap();
        let loaded = load_session(&path).unwrap();
        assert_eq!(loaded, session);
    }

    #[test]
    fn loading_a_missing_session_fails_with_context() {
        let dir = TempDir::new().unwrap();
        let err = load_session(&dir.path().join("absent.json")).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
