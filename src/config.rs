//! Runtime configuration assembled from command-line flags and environment.

use std::time::Duration;

use anyhow::{bail, Result};

use crate::cli::Cli;

pub const DEFAULT_API_URL: &str = "http://localhost:10000";

/// Connection settings for the remote API.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: String,
    pub token: Option<String>,
    pub timeout: Duration,
    /// Project id or name to work in; the first project by name when unset.
    pub project: Option<String>,
}

impl Config {
    /// Build and validate the configuration from parsed CLI arguments.
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let api_url = cli.api_url.trim().to_string();
        if !(api_url.starts_with("http://") || api_url.starts_with("https://")) {
            bail!("API URL must start with http:// or https:// (got '{api_url}')");
        }
        if cli.timeout_secs == 0 {
            bail!("--timeout-secs must be at least 1");
        }
        let token = cli
            .token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string);
        let project = cli
            .project
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string);

        Ok(Config {
            api_url,
            token,
            timeout: Duration::from_secs(cli.timeout_secs),
            project,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["tb"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn explicit_flags_build_config() {
        let cli = parse(&["--api-url", "https://tasks.example.test", "--token", " abc ", "--project", "Apollo", "team"]);
        let config = Config::from_cli(&cli).unwrap();
        assert_eq!(config.api_url, "https://tasks.example.test");
        assert_eq!(config.token.as_deref(), Some("abc"));
        assert_eq!(config.project.as_deref(), Some("Apollo"));
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[test]
    fn rejects_non_http_url() {
        let cli = parse(&["--api-url", "localhost:10000", "team"]);
        assert!(Config::from_cli(&cli).is_err());
    }

    #[test]
    fn blank_token_is_treated_as_missing() {
        let cli = parse(&["--api-url", DEFAULT_API_URL, "--token", "   ", "team"]);
        assert!(Config::from_cli(&cli).unwrap().token.is_none());
    }
}
