//! Probe configuration and preflight validation.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Result};

/// Settings for a probe and its control-plane session.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Control plane address as `host:port`.
    pub endpoint: String,
    /// Root package that relative trace paths resolve against.
    pub package: String,
    /// Directory holding the script tree.
    pub script_root: PathBuf,
    /// Relative paths (files or directories) left out of loading and the
    /// uploaded inventory.
    pub exclude: Vec<String>,
    pub heartbeat_interval: Duration,
    /// Capacity of the log shipping buffer; overflow drops events.
    pub log_buffer: usize,
    pub reconnect_initial: Duration,
    pub reconnect_max: Duration,
    /// Name this probe announces in its session hello.
    pub probe_name: String,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        ProbeConfig {
            endpoint: String::new(),
            package: "main".to_string(),
            script_root: PathBuf::from("."),
            exclude: Vec::new(),
            heartbeat_interval: Duration::from_secs(30),
            log_buffer: 1024,
            reconnect_initial: Duration::from_secs(1),
            reconnect_max: Duration::from_secs(30),
            probe_name: format!("periscope-{}", std::process::id()),
        }
    }
}

impl ProbeConfig {
    /// Checks the parts that would otherwise fail deep inside the agent,
    /// so the binary can refuse bad setups up front.
    pub fn validate(&self) -> Result<()> {
        if self.endpoint.is_empty() {
            bail!("Control plane endpoint is empty");
        }
        if !valid_package(&self.package) {
            bail!(
                "Package `{}` is not a valid dotted module path",
                self.package
            );
        }
        if !self.script_root.is_dir() {
            bail!(
                "Script root {} does not exist or is not a directory",
                self.script_root.display()
            );
        }
        if self.log_buffer == 0 {
            bail!("Log buffer capacity must be at least 1");
        }
        if self.heartbeat_interval.is_zero() {
            bail!("Heartbeat interval must be non-zero");
        }
        Ok(())
    }
}

fn valid_package(package: &str) -> bool {
    !package.is_empty()
        && package.split('.').all(|segment| {
            let mut chars = segment.chars();
            match chars.next() {
                Some(first) if first.is_ascii_alphabetic() || first == '_' => {
                    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
                }
                _ => false,
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config(root: &std::path::Path) -> ProbeConfig {
        ProbeConfig {
            endpoint: "127.0.0.1:9000".to_string(),
            package: "app.worker".to_string(),
            script_root: root.to_path_buf(),
            ..ProbeConfig::default()
        }
    }

    #[test]
    fn test_valid_config_passes() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        valid_config(dir.path()).validate().expect("Config should validate");
    }

    #[test]
    fn test_empty_endpoint_rejected() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let mut config = valid_config(dir.path());
        config.endpoint.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_package_rejected() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        for package in ["", ".", "a..b", "1app", "app-web"] {
            let mut config = valid_config(dir.path());
            config.package = package.to_string();
            assert!(config.validate().is_err(), "package {package:?} should be rejected");
        }
    }

    #[test]
    fn test_missing_root_rejected() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let mut config = valid_config(dir.path());
        config.script_root = dir.path().join("absent");
        assert!(config.validate().is_err());
    }
}
