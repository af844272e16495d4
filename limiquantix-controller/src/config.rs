//! Configuration for the control plane core.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use limiquantix_domain::DEFAULT_PROJECT_ID;
use limiquantix_nodeclient::DEFAULT_AGENT_PORT;

/// Tunables for the orchestrator.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Project assigned when a request names none
    pub default_project_id: String,
    /// Port node agents listen on when the inventory address has none
    pub agent_port: u16,
    /// Hypervisor-side grace window for graceful stops, in seconds
    pub stop_grace_secs: u64,
    /// Page size when a list request passes none
    pub default_page_size: usize,
    /// Hard ceiling on requested page sizes
    pub max_page_size: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            default_project_id: DEFAULT_PROJECT_ID.to_string(),
            agent_port: DEFAULT_AGENT_PORT,
            stop_grace_secs: 30,
            default_page_size: 50,
            max_page_size: 1000,
        }
    }
}

impl ControllerConfig {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: ControllerConfig =
            serde_yaml::from_str(&content).context("Failed to parse config file")?;

        Ok(config)
    }

    /// Grace window handed to the agent on graceful stops.
    pub fn stop_grace(&self) -> Duration {
        Duration::from_secs(self.stop_grace_secs)
    }

    /// Clamp a requested page size into the permitted range.
    pub fn clamp_page_size(&self, requested: usize) -> usize {
        if requested == 0 {
            self.default_page_size
        } else {
            requested.clamp(1, self.max_page_size)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_carry_well_known_constants() {
        let config = ControllerConfig::default();
        assert_eq!(
            config.default_project_id,
            "00000000-0000-0000-0000-000000000001"
        );
        assert_eq!(config.agent_port, 9090);
        assert_eq!(config.stop_grace(), Duration::from_secs(30));
        assert_eq!(config.default_page_size, 50);
    }

    #[test]
    fn test_page_size_clamping() {
        let config = ControllerConfig::default();
        assert_eq!(config.clamp_page_size(0), 50);
        assert_eq!(config.clamp_page_size(3), 3);
        assert_eq!(config.clamp_page_size(5000), 1000);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config: ControllerConfig = serde_yaml::from_str("stop_grace_secs: 60\n").unwrap();
        assert_eq!(config.stop_grace_secs, 60);
        assert_eq!(config.agent_port, 9090);
    }
}
