use crate::data::DataSource;
use anyhow::{Context, Result};
use clap::{ArgAction, Parser, ValueHint};
use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Projection file looked up in the working directory when nothing else is set.
pub const DEFAULT_SOURCE: &str = "Long-Term_Portfolio_Projection__Oscillating_Repayments_0-65__.csv";

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Terminal dashboard for a 20-year margin loan portfolio projection"
)]
pub struct Cli {
    /// Projection CSV: a file path or an http(s) URL
    #[arg(short, long, value_hint = ValueHint::AnyPath)]
    pub source: Option<String>,

    /// Config file [default: <config dir>/projection-tui/config.json]
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Where diagnostics are written; the terminal belongs to the dashboard
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub log_file: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, action = ArgAction::SetTrue)]
    pub verbose: bool,
}

/// Optional settings file. Every field may be left out.
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub source: Option<String>,
    pub log_file: Option<PathBuf>,
}

impl FileConfig {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("projection-tui").join("config.json"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("invalid config {}", path.display()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub source: DataSource,
    pub log_file: PathBuf,
    pub verbose: bool,
}

impl Settings {
    /// An explicit `--config` must exist; the default location is optional.
    pub fn resolve(cli: Cli) -> Result<Self> {
        let file = match &cli.config {
            Some(path) => FileConfig::load(path)?,
            None => match FileConfig::default_path() {
                Some(path) if path.exists() => FileConfig::load(&path)?,
                _ => FileConfig::default(),
            },
        };
        Ok(Self::merge(cli, file))
    }

    /// Command line over config file over built-in defaults.
    pub fn merge(cli: Cli, file: FileConfig) -> Self {
        let source = cli
            .source
            .or(file.source)
            .unwrap_or_else(|| DEFAULT_SOURCE.to_string());
        let log_file = cli
            .log_file
            .or(file.log_file)
            .unwrap_or_else(default_log_file);

        Settings {
            source: DataSource::parse(&source),
            log_file,
            verbose: cli.verbose,
        }
    }

    pub fn log_level(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else {
            "info"
        }
    }
}

pub fn default_log_file() -> PathBuf {
    std::env::temp_dir()
        .join("projection-tui")
        .join("projection-tui.log")
}
