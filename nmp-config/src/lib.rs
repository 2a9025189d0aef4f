// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Configuration model for the check bridge, read from a human-edited HCL
//! file.
//!
//! The file declares the spool directory, the forward listen address, the
//! record-tag allow-list, an optional topology block, and one `check` block
//! per rule. Check names are block labels, so a name cannot be declared
//! twice within one configuration. Override blocks are kept in declaration
//! order because rule evaluation is order-sensitive.

use indexmap::IndexMap;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_BIND: &str = "0.0.0.0:24224";
pub const DEFAULT_COMPARATOR: &str = ">=";
pub const DEFAULT_TOPOLOGY_ADDRESS: &str = "http://127.0.0.1:8500";
pub const DEFAULT_REFRESH_SECS: u64 = 60;
pub const DEFAULT_TTL_SECS: u64 = 300;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("error reading {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("error decoding {path}: {source}")]
    Decode { path: PathBuf, source: hcl::Error },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Spool directory consumed by the monitor.
    pub check_results_dir: String,
    /// Address the forward TCP ingest and UDP heartbeat bind to.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Record tags accepted by the normalizer.
    #[serde(default = "default_tags")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub topology: Option<TopologyConfig>,
    #[serde(default)]
    pub check: IndexMap<String, Check>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TopologyConfig {
    #[serde(default = "default_topology_address")]
    pub address: String,
    #[serde(default = "default_refresh_secs")]
    pub refresh_secs: u64,
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

/// One rule declaration. Threshold strings are expressions handed to the
/// evaluator's compiler; `value` is a record template. Empty strings mean
/// "use the rule default".
#[derive(Debug, Clone, Deserialize)]
pub struct Check {
    pub plugin: String,
    #[serde(default)]
    pub plugin_instance: String,
    #[serde(default, rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub type_instance: String,
    #[serde(default = "default_comparator")]
    pub comparator: String,
    #[serde(default)]
    pub warning: String,
    #[serde(default)]
    pub critical: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub humanize: String,
    /// Host overrides keyed by host regex, in declaration order.
    #[serde(default)]
    pub host: IndexMap<String, HostOverride>,
    /// Meta overrides keyed by `"key:value"`, in declaration order.
    #[serde(default)]
    pub meta: IndexMap<String, MetaOverride>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HostOverride {
    #[serde(default)]
    pub warning: String,
    #[serde(default)]
    pub critical: String,
    #[serde(default)]
    pub priority: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetaOverride {
    #[serde(default)]
    pub warning: String,
    #[serde(default)]
    pub critical: String,
}

fn default_bind() -> String {
    DEFAULT_BIND.to_owned()
}

fn default_tags() -> Vec<String> {
    vec!["collectd".to_owned()]
}

fn default_comparator() -> String {
    DEFAULT_COMPARATOR.to_owned()
}

fn default_topology_address() -> String {
    DEFAULT_TOPOLOGY_ADDRESS.to_owned()
}

fn default_refresh_secs() -> u64 {
    DEFAULT_REFRESH_SECS
}

fn default_ttl_secs() -> u64 {
    DEFAULT_TTL_SECS
}

/// Read and decode the configuration file.
///
/// # Errors
/// Any read, decode or validation failure is fatal at startup; the caller
/// is expected to exit with the message.
pub fn load(path: &Path) -> Result<Config, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_owned(),
        source,
    })?;
    let config: Config = hcl::from_str(&text).map_err(|source| ConfigError::Decode {
        path: path.to_owned(),
        source,
    })?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.check_results_dir.is_empty() {
        return Err(ConfigError::Invalid(
            "check_results_dir must not be empty".to_owned(),
        ));
    }
    if config.bind.parse::<SocketAddr>().is_err() {
        return Err(ConfigError::Invalid(format!(
            "bind is not a valid socket address: {}",
            config.bind
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
check_results_dir = "/var/spool/checks"

check "cpu-idle" {
  plugin        = "cpu"
  type          = "cpu"
  type_instance = "idle"
  comparator    = "<"
  warning       = "20"
  critical      = "10"
  value         = "values[0]"

  host "^db-.*$" {
    warning  = "50"
    critical = "30"
    priority = 10
  }

  host "^.*$" {
    warning  = "80"
    critical = "60"
    priority = 1
  }

  meta "role:db" {
    warning  = "90"
    critical = "70"
  }
}

check "load-short" {
  plugin   = "load"
  type     = "load"
  warning  = "8"
  critical = "16"
}
"#;

    #[test]
    fn decodes_sample() {
        let config: Config = hcl::from_str(SAMPLE).unwrap();
        assert_eq!(config.check_results_dir, "/var/spool/checks");
        assert_eq!(config.bind, DEFAULT_BIND);
        assert_eq!(config.tags, vec!["collectd".to_owned()]);
        assert!(config.topology.is_none());
        assert_eq!(config.check.len(), 2);

        let cpu = &config.check["cpu-idle"];
        assert_eq!(cpu.plugin, "cpu");
        assert_eq!(cpu.type_name, "cpu");
        assert_eq!(cpu.comparator, "<");
        assert_eq!(cpu.host.len(), 2);
        assert_eq!(cpu.host["^db-.*$"].priority, 10);
        assert_eq!(cpu.meta["role:db"].critical, "70");

        let load = &config.check["load-short"];
        assert_eq!(load.comparator, DEFAULT_COMPARATOR);
        assert_eq!(load.value, "");
        assert_eq!(load.plugin_instance, "");
    }

    #[test]
    fn override_declaration_order_is_preserved() {
        let config: Config = hcl::from_str(SAMPLE).unwrap();
        let patterns: Vec<&str> = config.check["cpu-idle"]
            .host
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(patterns, vec!["^db-.*$", "^.*$"]);
    }

    #[test]
    fn decodes_topology_block() {
        let text = r#"
check_results_dir = "/tmp/spool"
topology {
  address      = "http://consul.service:8500"
  refresh_secs = 30
}
"#;
        let config: Config = hcl::from_str(text).unwrap();
        let topology = config.topology.unwrap();
        assert_eq!(topology.address, "http://consul.service:8500");
        assert_eq!(topology.refresh_secs, 30);
        assert_eq!(topology.ttl_secs, DEFAULT_TTL_SECS);
    }

    #[test]
    fn load_rejects_missing_file() {
        let err = load(Path::new("/nonexistent/config.hcl")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn load_rejects_empty_spool_dir() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "check_results_dir = \"\"").unwrap();
        let err = load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn load_rejects_bad_bind() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "check_results_dir = \"/tmp/spool\"").unwrap();
        writeln!(file, "bind = \"not-an-address\"").unwrap();
        let err = load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn load_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let config = load(file.path()).unwrap();
        assert_eq!(config.check.len(), 2);
    }
}
