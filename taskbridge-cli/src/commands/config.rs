use anyhow::{Result, bail};
use shared::config::server::Config;

/// Prints a default configuration file to stdout in the requested format.
pub fn handle_config_command(format: Option<&str>) -> Result<()> {
    let config = Config::with_defaults();

    let rendered = match format.unwrap_or("yaml") {
        "yaml" | "yml" => serde_yml::to_string(&config)?,
        "json" => serde_json::to_string_pretty(&config)?,
        other => bail!("unsupported format '{other}'; expected yaml or json"),
    };

    println!("{rendered}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_known_formats_only() {
        assert!(handle_config_command(None).is_ok());
        assert!(handle_config_command(Some("json")).is_ok());
        assert!(handle_config_command(Some("toml")).is_err());
    }
}
