// SPDX-License-Identifier: AGPL-3.0

//! Configuration for solcov
//!
//! Command line flags, optionally layered over a `solcov.toml` file. Values
//! given on the command line win over the file; the file wins over
//! built-in defaults.

use anyhow::{Context, Result};
use clap::Parser;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "solcov.toml";

#[derive(Debug, Clone, Parser, Serialize, Deserialize)]
#[clap(
    name = "solcov",
    version,
    about = "Statement, branch and function coverage for Solidity contracts"
)]
pub struct Config {
    /// Project root directory
    #[clap(long, default_value = ".")]
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Path to the config file (defaults to <root>/solcov.toml when present)
    #[clap(long)]
    pub config: Option<PathBuf>,

    /// Directory of compiled contract artifacts
    #[clap(long, default_value = "build/contracts")]
    #[serde(default = "default_artifacts")]
    pub artifacts: PathBuf,

    /// Directory of Solidity sources
    #[clap(long, default_value = "contracts")]
    #[serde(default = "default_sources")]
    pub sources: PathBuf,

    /// Directory of parsed source ASTs, one `<name>.json` per source file
    #[clap(long, default_value = "build/asts")]
    #[serde(default = "default_asts")]
    pub asts: PathBuf,

    /// Network id the artifacts were deployed to
    #[clap(long, default_value = "50")]
    #[serde(default = "default_network_id")]
    pub network_id: u64,

    /// Collected transaction traces
    #[clap(long, default_value = "coverage/traces.json")]
    #[serde(default = "default_traces")]
    pub traces: PathBuf,

    /// Where to write the coverage report
    #[clap(long, default_value = "coverage/coverage.json")]
    #[serde(default = "default_output")]
    pub output: PathBuf,

    /// Only report files whose path matches the given regex
    #[clap(long, default_value = "")]
    #[serde(default)]
    pub match_file: String,

    /// Exit with a non-zero code when any trace or contract was skipped
    #[clap(long)]
    #[serde(default)]
    pub strict: bool,

    /// Verbosity level (can be repeated: -v, -vv, -vvv)
    #[clap(short, long, action = clap::ArgAction::Count)]
    #[serde(default)]
    pub verbose: u8,

    /// Also write a JSON run summary to this file
    #[clap(long)]
    #[serde(default)]
    pub json_summary: Option<PathBuf>,
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_artifacts() -> PathBuf {
    PathBuf::from("build/contracts")
}

fn default_sources() -> PathBuf {
    PathBuf::from("contracts")
}

fn default_asts() -> PathBuf {
    PathBuf::from("build/asts")
}

fn default_network_id() -> u64 {
    50
}

fn default_traces() -> PathBuf {
    PathBuf::from("coverage/traces.json")
}

fn default_output() -> PathBuf {
    PathBuf::from("coverage/coverage.json")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root: default_root(),
            config: None,
            artifacts: default_artifacts(),
            sources: default_sources(),
            asts: default_asts(),
            network_id: default_network_id(),
            traces: default_traces(),
            output: default_output(),
            match_file: String::new(),
            strict: false,
            verbose: 0,
            json_summary: None,
        }
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let parsed: TomlConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        parsed.to_config()
    }

    /// Merge with another configuration (command line overrides file config)
    pub fn merge(&mut self, other: Self) {
        if other.root != default_root() {
            self.root = other.root;
        }
        if other.config.is_some() {
            self.config = other.config;
        }
        if other.artifacts != default_artifacts() {
            self.artifacts = other.artifacts;
        }
        if other.sources != default_sources() {
            self.sources = other.sources;
        }
        if other.asts != default_asts() {
            self.asts = other.asts;
        }
        if other.network_id != default_network_id() {
            self.network_id = other.network_id;
        }
        if other.traces != default_traces() {
            self.traces = other.traces;
        }
        if other.output != default_output() {
            self.output = other.output;
        }
        if !other.match_file.is_empty() {
            self.match_file = other.match_file;
        }
        if other.strict {
            self.strict = true;
        }
        if other.verbose > 0 {
            self.verbose = other.verbose;
        }
        if other.json_summary.is_some() {
            self.json_summary = other.json_summary;
        }
    }

    /// Command line arguments layered over the config file, if any.
    pub fn load() -> Result<Self> {
        Self::layered(Config::parse())
    }

    pub fn layered(cli: Config) -> Result<Self> {
        match cli.resolve_config_path() {
            Some(path) => {
                let mut config = Config::from_file(&path)?;
                config.merge(cli);
                Ok(config)
            }
            None => Ok(cli),
        }
    }

    /// Resolve config file path
    pub fn resolve_config_path(&self) -> Option<PathBuf> {
        if let Some(config) = &self.config {
            Some(config.clone())
        } else {
            let default_path = self.root.join(CONFIG_FILE_NAME);
            if default_path.exists() {
                Some(default_path)
            } else {
                None
            }
        }
    }

    fn under_root(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    pub fn artifacts_dir(&self) -> PathBuf {
        self.under_root(&self.artifacts)
    }

    pub fn sources_dir(&self) -> PathBuf {
        self.under_root(&self.sources)
    }

    pub fn asts_dir(&self) -> PathBuf {
        self.under_root(&self.asts)
    }

    pub fn traces_path(&self) -> PathBuf {
        self.under_root(&self.traces)
    }

    pub fn output_path(&self) -> PathBuf {
        self.under_root(&self.output)
    }

    /// Regex selecting report files; matches everything when unset.
    pub fn file_regex(&self) -> Result<Regex> {
        let pattern = if self.match_file.is_empty() {
            ".*"
        } else {
            self.match_file.as_str()
        };
        Regex::new(pattern).with_context(|| format!("Invalid --match-file regex: {}", pattern))
    }
}

/// TOML configuration structure (for parsing from file)
#[derive(Debug, Deserialize)]
struct TomlConfig {
    #[serde(default)]
    global: HashMap<String, toml::Value>,
}

impl TomlConfig {
    fn to_config(self) -> Result<Config> {
        let mut config = Config::default();

        for (key, value) in self.global {
            let key = key.replace('-', "_");

            match key.as_str() {
                "root" => config.root = parse_toml_path(&value)?,
                "artifacts" => config.artifacts = parse_toml_path(&value)?,
                "sources" => config.sources = parse_toml_path(&value)?,
                "asts" => config.asts = parse_toml_path(&value)?,
                "network_id" => config.network_id = parse_toml_u64(&value)?,
                "traces" => config.traces = parse_toml_path(&value)?,
                "output" => config.output = parse_toml_path(&value)?,
                "match_file" => config.match_file = parse_toml_string(&value)?,
                "strict" => config.strict = parse_toml_bool(&value)?,
                "verbose" => config.verbose = parse_toml_u8(&value)?,
                "json_summary" => config.json_summary = Some(parse_toml_path(&value)?),
                _ => {
                    // unknown keys are ignored
                }
            }
        }

        Ok(config)
    }
}

fn parse_toml_string(value: &toml::Value) -> Result<String> {
    value
        .as_str()
        .map(|s| s.to_string())
        .ok_or_else(|| anyhow::anyhow!("Expected string, got {:?}", value))
}

fn parse_toml_bool(value: &toml::Value) -> Result<bool> {
    value
        .as_bool()
        .ok_or_else(|| anyhow::anyhow!("Expected bool, got {:?}", value))
}

fn parse_toml_u8(value: &toml::Value) -> Result<u8> {
    value
        .as_integer()
        .and_then(|i| u8::try_from(i).ok())
        .ok_or_else(|| anyhow::anyhow!("Expected u8, got {:?}", value))
}

fn parse_toml_u64(value: &toml::Value) -> Result<u64> {
    value
        .as_integer()
        .and_then(|i| u64::try_from(i).ok())
        .ok_or_else(|| anyhow::anyhow!("Expected u64, got {:?}", value))
}

fn parse_toml_path(value: &toml::Value) -> Result<PathBuf> {
    Ok(PathBuf::from(parse_toml_string(value)?))
}
