use std::io;
use std::str::FromStr;

use anyhow::{Result, bail};
use clap_complete::{Shell, generate};

/// Writes a completion script for the requested shell to stdout.
pub fn handle_completion_command(shell: &str, command: &mut clap::Command) -> Result<()> {
    let Ok(shell) = Shell::from_str(shell) else {
        bail!("unsupported shell '{shell}'; expected bash, zsh, fish, elvish, or powershell");
    };

    let name = command.get_name().to_string();
    generate(shell, command, name, &mut io::stdout());
    Ok(())
}
