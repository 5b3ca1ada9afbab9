//! Tester configuration (TOML).

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// How to reach one backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BackendConfig {
    /// Client invocation; the statement is appended as the final argument.
    pub command: Vec<String>,
}

impl BackendConfig {
    fn mysql_client(port: u16) -> Self {
        let port = port.to_string();
        let args = [
            "mysql",
            "--batch",
            "-h",
            "127.0.0.1",
            "-P",
            port.as_str(),
            "-u",
            "root",
            "-e",
        ];
        Self {
            command: args.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self::mysql_client(3306)
    }
}

/// Tester configuration.
///
/// Missing fields default to a local MySQL on 3306 and a local vtgate on 15306.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TesterConfig {
    /// Row limit for direct fetches (traces, traced DML on the reference).
    pub row_limit: usize,

    /// Per-statement wall-clock budget in seconds.
    pub statement_timeout_secs: u64,

    /// Truncate client output beyond this many bytes; truncation fails the statement.
    pub output_limit_bytes: usize,

    /// Run `set workload = 'olap'` on the target before the script.
    pub olap: bool,

    /// Register created tables with the schema manager and drop every table at the end.
    pub auto_schema: bool,

    /// Keyspaces handed to the schema manager; created tables go to the first.
    pub keyspaces: Vec<String>,

    /// Tables known up front, per keyspace.
    pub keyspace_tables: BTreeMap<String, Vec<String>>,

    pub reference: BackendConfig,

    pub target: BackendConfig,
}

impl Default for TesterConfig {
    fn default() -> Self {
        Self {
            row_limit: 10_000,
            statement_timeout_secs: 60,
            output_limit_bytes: 10_000_000,
            olap: false,
            auto_schema: false,
            keyspaces: vec!["ks".to_string()],
            keyspace_tables: BTreeMap::new(),
            reference: BackendConfig::mysql_client(3306),
            target: BackendConfig::mysql_client(15306),
        }
    }
}

impl TesterConfig {
    pub fn validate(&self) -> Result<()> {
        if self.row_limit == 0 {
            return Err(anyhow!("row_limit must be > 0"));
        }
        if self.statement_timeout_secs == 0 {
            return Err(anyhow!("statement_timeout_secs must be > 0"));
        }
        if self.output_limit_bytes == 0 {
            return Err(anyhow!("output_limit_bytes must be > 0"));
        }
        for (label, backend) in [("reference", &self.reference), ("target", &self.target)] {
            if backend.command.is_empty() || backend.command[0].trim().is_empty() {
                return Err(anyhow!("{label}.command must be a non-empty array"));
            }
        }
        if self.auto_schema && self.keyspaces.is_empty() {
            return Err(anyhow!("auto_schema requires at least one keyspace"));
        }
        Ok(())
    }

    pub fn statement_timeout(&self) -> Duration {
        Duration::from_secs(self.statement_timeout_secs)
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `TesterConfig::default()`.
pub fn load_config(path: &Path) -> Result<TesterConfig> {
    if !path.exists() {
        let cfg = TesterConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: TesterConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}
