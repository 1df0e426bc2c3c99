//! Agent configuration
//!
//! Assembled from two sources:
//! 1. `.env`: infrastructure env vars (service URLs, contract address)
//! 2. `agent.toml`: agent-specific settings (polling, watched assets)
//!
//! The sync agent and any embedding service share this `BaseConfig`.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::addr::is_well_formed;

/// Agent-specific TOML configuration
#[derive(Debug, Clone, Deserialize)]
struct AgentToml {
    #[serde(default = "default_poll_interval_secs")]
    poll_interval_secs: u64,
    #[serde(default = "default_connection_timeout_secs")]
    connection_timeout_secs: u64,
    /// Assets to watch; empty means reconcile everything the source returns
    #[serde(default)]
    assets: Vec<u64>,
}

/// Shared agent configuration.
#[derive(Debug, Clone)]
pub struct BaseConfig {
    // From .env
    pub api_url: String,
    pub events_url: String,
    pub contract_address: String,
    pub participant: Option<String>,

    // From agent.toml
    pub poll_interval_secs: u64,
    pub connection_timeout_secs: u64,
    pub assets: Vec<u64>,
}

impl BaseConfig {
    /// Load configuration from env vars + agent.toml.
    pub fn load<P: AsRef<Path>>(agent_toml_path: P) -> Result<Self> {
        // 1. Read agent.toml (optional; defaults apply when absent)
        let contents = fs::read_to_string(agent_toml_path.as_ref()).unwrap_or_else(|_| {
            tracing::warn!(
                "{} not found, using defaults",
                agent_toml_path.as_ref().display()
            );
            String::new()
        });
        let agent: AgentToml = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse {}", agent_toml_path.as_ref().display()))?;

        // 2. Read env vars
        let api_url =
            std::env::var("API_URL").map_err(|_| anyhow!("API_URL env var is required"))?;
        if !api_url.starts_with("https://") && !api_url.starts_with("http://") {
            anyhow::bail!("API_URL must use http or https");
        }

        let events_url = std::env::var("EVENTS_URL").unwrap_or_else(|_| api_url.clone());

        let contract_address = std::env::var("CONTRACT_ADDRESS")
            .map_err(|_| anyhow!("CONTRACT_ADDRESS env var is required"))?;
        if !is_well_formed(&contract_address) {
            anyhow::bail!("CONTRACT_ADDRESS is not a well-formed address");
        }

        let participant = std::env::var("PARTICIPANT_ADDRESS").ok();
        if let Some(p) = &participant {
            if !is_well_formed(p) {
                anyhow::bail!("PARTICIPANT_ADDRESS is not a well-formed address");
            }
        }

        Ok(BaseConfig {
            api_url,
            events_url,
            contract_address,
            participant,
            poll_interval_secs: agent.poll_interval_secs,
            connection_timeout_secs: agent.connection_timeout_secs,
            assets: agent.assets,
        })
    }
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_connection_timeout_secs() -> u64 {
    30
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_toml_defaults() {
        let agent: AgentToml = toml::from_str("").unwrap();
        assert_eq!(agent.poll_interval_secs, 5);
        assert_eq!(agent.connection_timeout_secs, 30);
        assert!(agent.assets.is_empty());
    }

    #[test]
    fn test_agent_toml_parses_assets() {
        let agent: AgentToml = toml::from_str(
            "poll_interval_secs = 12\nassets = [7, 9]\n",
        )
        .unwrap();
        assert_eq!(agent.poll_interval_secs, 12);
        assert_eq!(agent.assets, vec![7, 9]);
    }
}
