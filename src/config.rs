//! Engine and analysis configuration.
//!
//! Replaces what would otherwise be hard-coded globals (binary path,
//! thread count, ...) with an explicit value built at driver construction
//! and deserialisable from a TOML file via `serde`.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Everything the engine driver needs to spawn and configure the child
/// process. None of this has a sensible built-in default beyond the
/// binary path — an operator's engine install layout varies too much.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub engine_binary: String,
    #[serde(default)]
    pub engine_working_dir: Option<String>,
    #[serde(default = "default_threads")]
    pub threads: u32,
    #[serde(default = "default_hash_mb")]
    pub hash_mb: u32,
    #[serde(default)]
    pub tablebase_path: Option<String>,
    #[serde(default = "default_multipv")]
    pub multipv: u32,
}

fn default_threads() -> u32 {
    1
}

fn default_hash_mb() -> u32 {
    128
}

fn default_multipv() -> u32 {
    1
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            engine_binary: "stockfish".to_string(),
            engine_working_dir: None,
            threads: default_threads(),
            hash_mb: default_hash_mb(),
            tablebase_path: None,
            multipv: default_multipv(),
        }
    }
}

impl EngineConfig {
    pub fn from_toml(text: &str) -> Result<Self, rootcause::Report> {
        toml::from_str(text).map_err(rootcause::Report::from)
    }

    /// The `setoption` commands implied by this config, in the order the
    /// startup handshake sends them.
    pub fn option_commands(&self) -> Vec<String> {
        let mut cmds = vec![
            format!("setoption name Threads value {}", self.threads),
            format!("setoption name Hash value {}", self.hash_mb),
            "setoption name UCI_AnalyseMode value true".to_string(),
        ];
        if let Some(path) = &self.tablebase_path {
            cmds.push(format!("setoption name SyzygyPath value {path}"));
        }
        if self.multipv > 1 {
            cmds.push(format!("setoption name MultiPV value {}", self.multipv));
        }
        cmds
    }
}

/// The depth-stability policy the analysis controller enforces.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub min_depth: u32,
    pub max_depth: u32,
    #[serde(with = "duration_millis")]
    pub min_time: Duration,
    #[serde(with = "duration_millis")]
    pub max_time: Duration,
    pub depth_delta: u32,
    pub multipv: u32,
    pub min_nodes: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            min_depth: 20,
            max_depth: 40,
            min_time: Duration::from_secs(0),
            max_time: Duration::from_secs(60),
            depth_delta: 3,
            multipv: 1,
            min_nodes: 0,
        }
    }
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_engine_config() {
        let cfg = EngineConfig::from_toml(r#"engine_binary = "/usr/bin/stockfish""#).unwrap();
        assert_eq!(cfg.threads, 1);
        assert_eq!(cfg.hash_mb, 128);
    }

    #[test]
    fn option_commands_include_tablebase_when_set() {
        let mut cfg = EngineConfig::default();
        cfg.tablebase_path = Some("/tb".to_string());
        assert!(cfg.option_commands().iter().any(|c| c.contains("SyzygyPath")));
    }
}
