// src/config.rs
use crate::content::{ContentFs, DirFs};
use clap::Parser;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_BIND: &str = "0.0.0.0:8888";
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_DEBOUNCE_MS: u64 = 250;

/// Command-line arguments for the application.
#[derive(Parser, Debug, Deserialize, Default)]
#[clap(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Directory holding the asteroid (markdown documents and media)
    #[clap(
        short = 'd',
        long,
        value_parser,
        help = "Directory holding the asteroid (markdown documents and media) [mandatory]"
    )]
    pub asteroid_dir: Option<PathBuf>,

    /// Website title; defaults to the content of <asteroid-dir>/.TITLE
    #[clap(
        short = 'n',
        long,
        value_parser,
        help = "Website title; defaults to the content of <asteroid-dir>/.TITLE"
    )]
    pub asteroid_name: Option<String>,

    /// Theme directory (css/, img/, font/) replacing the embedded theme
    #[clap(
        short,
        long,
        value_parser,
        help = "Theme directory (css/, img/, font/) replacing the embedded theme"
    )]
    pub theme_dir: Option<PathBuf>,

    /// Directory of view templates overriding the embedded ones
    #[clap(
        long,
        value_parser,
        help = "Directory of view templates overriding the embedded ones, file by file"
    )]
    pub views_dir: Option<PathBuf>,

    /// HTTP listening address (e.g., "0.0.0.0:8888")
    #[clap(
        short,
        long,
        value_parser,
        help = "HTTP listening address (e.g., \"0.0.0.0:8888\")"
    )]
    pub bind: Option<String>,

    /// Path to a configuration file (e.g., asteroid.toml)
    #[clap(
        short,
        long,
        value_parser,
        help = "Path to a configuration file (e.g., asteroid.toml)"
    )]
    pub config: Option<PathBuf>,

    /// Log level (e.g., trace, debug, info, warn, error)
    #[clap(
        long,
        value_parser,
        help = "Log level (e.g., trace, debug, info, warn, error)"
    )]
    pub log_level: Option<String>,

    #[clap(
        long,
        value_parser,
        help = "Milliseconds to wait for file changes to settle before reloading"
    )]
    pub debounce_ms: Option<u64>,

    #[clap(
        long,
        help = "Keep serving the last good site when a reload fails, instead of exiting"
    )]
    pub keep_serving_on_reload_failure: bool,

    #[clap(long, help = "Do not watch the filesystem; reload on SIGUSR1 only")]
    pub no_watch: bool,
}

/// What to do when a reload cannot rebuild the site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReloadFailurePolicy {
    /// Terminate, as a failed startup would.
    #[default]
    Exit,
    /// Log and keep the previous site active.
    KeepServing,
}

/// Configuration loaded from file, environment, or defaults.
#[derive(Deserialize, Serialize, Debug, Default)]
pub struct FileConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asteroid_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asteroid_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub views_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debounce_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reload_failure: Option<ReloadFailurePolicy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub watch: Option<bool>,
}

impl From<&CliArgs> for FileConfig {
    fn from(cli: &CliArgs) -> Self {
        FileConfig {
            asteroid_dir: cli.asteroid_dir.clone(),
            asteroid_name: cli.asteroid_name.clone(),
            theme_dir: cli.theme_dir.clone(),
            views_dir: cli.views_dir.clone(),
            bind: cli.bind.clone(),
            log_level: cli.log_level.clone(),
            debounce_ms: cli.debounce_ms,
            // Flags only override when present.
            reload_failure: cli
                .keep_serving_on_reload_failure
                .then_some(ReloadFailurePolicy::KeepServing),
            watch: cli.no_watch.then_some(false),
        }
    }
}

/// Startup preconditions that make serving impossible.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("--asteroid-dir is mandatory")]
    MissingAsteroidDir,
    #[error("{} is not a directory. --{flag} must exist, if supplied.", path.display())]
    NotADirectory { flag: &'static str, path: PathBuf },
    #[error("invalid bind address {addr:?}: {source}")]
    InvalidBind {
        addr: String,
        #[source]
        source: std::net::AddrParseError,
    },
    #[error(transparent)]
    Figment(#[from] figment::Error),
}

/// Final application configuration after merging all sources.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Root of the content tree
    pub asteroid_dir: PathBuf,
    /// Explicit website title, if any
    pub asteroid_name: Option<String>,
    /// Theme replacing the embedded one
    pub theme_dir: Option<PathBuf>,
    /// Views overriding the embedded ones
    pub views_dir: Option<PathBuf>,
    /// HTTP listening address
    pub bind_addr: SocketAddr,
    /// Log level
    pub log_level: String,
    /// Settle time for filesystem events
    pub debounce: Duration,
    pub reload_failure: ReloadFailurePolicy,
    /// Whether the filesystem watcher runs
    pub watch: bool,
}

impl AppConfig {
    /// Loads the application configuration by merging CLI, file, environment, and defaults.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_args(CliArgs::parse())
    }

    /// Merges defaults < config file < `ASTEROID_*` environment < CLI, then validates.
    pub fn from_args(cli_args: CliArgs) -> Result<Self, ConfigError> {
        let config_file_path = cli_args
            .config
            .clone()
            .unwrap_or_else(|| PathBuf::from("asteroid.toml"));

        let fig = Figment::new()
            .merge(Serialized::defaults(FileConfig {
                bind: Some(DEFAULT_BIND.to_string()),
                log_level: Some(DEFAULT_LOG_LEVEL.to_string()),
                debounce_ms: Some(DEFAULT_DEBOUNCE_MS),
                reload_failure: Some(ReloadFailurePolicy::Exit),
                watch: Some(true),
                ..Default::default()
            }))
            .merge(Toml::file(config_file_path).nested())
            .merge(
                Env::prefixed("ASTEROID_")
                    .map(|key| key.as_str().replace("__", ".").into())
                    .global(),
            )
            .merge(Serialized::globals(FileConfig::from(&cli_args)));

        let merged: FileConfig = fig.select("asteroid").extract()?;
        Self::validate(merged)
    }

    fn validate(merged: FileConfig) -> Result<Self, ConfigError> {
        let asteroid_dir = merged
            .asteroid_dir
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or(ConfigError::MissingAsteroidDir)?;
        require_dir("asteroid-dir", &asteroid_dir)?;
        if let Some(theme_dir) = &merged.theme_dir {
            require_dir("theme-dir", theme_dir)?;
        }
        if let Some(views_dir) = &merged.views_dir {
            require_dir("views-dir", views_dir)?;
        }

        let bind = merged.bind.unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind_addr = bind
            .parse()
            .map_err(|source| ConfigError::InvalidBind { addr: bind, source })?;

        Ok(AppConfig {
            asteroid_dir,
            asteroid_name: merged.asteroid_name.filter(|n| !n.is_empty()),
            theme_dir: merged.theme_dir,
            views_dir: merged.views_dir,
            bind_addr,
            log_level: merged
                .log_level
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
            debounce: Duration::from_millis(merged.debounce_ms.unwrap_or(DEFAULT_DEBOUNCE_MS)),
            reload_failure: merged.reload_failure.unwrap_or_default(),
            watch: merged.watch.unwrap_or(true),
        })
    }

    /// The per-cycle site configuration backed by the asteroid directory.
    pub fn site_config(&self) -> SiteConfig {
        SiteConfig {
            content: Arc::new(DirFs::new(&self.asteroid_dir)),
            asteroid_name: self.asteroid_name.clone(),
            theme_dir: self.theme_dir.clone(),
            views_dir: self.views_dir.clone(),
        }
    }

    /// Directories whose changes trigger a reload.
    pub fn watch_roots(&self) -> Vec<PathBuf> {
        std::iter::once(self.asteroid_dir.clone())
            .chain(self.theme_dir.clone())
            .chain(self.views_dir.clone())
            .collect()
    }
}

fn require_dir(flag: &'static str, path: &Path) -> Result<(), ConfigError> {
    if path.is_dir() {
        Ok(())
    } else {
        Err(ConfigError::NotADirectory {
            flag,
            path: path.to_path_buf(),
        })
    }
}

/// Everything a site is built from, fixed for one reload cycle.
#[derive(Debug, Clone)]
pub struct SiteConfig {
    pub content: Arc<dyn ContentFs>,
    /// Overrides `.TITLE` when set.
    pub asteroid_name: Option<String>,
    pub theme_dir: Option<PathBuf>,
    pub views_dir: Option<PathBuf>,
}

impl SiteConfig {
    pub fn new(content: Arc<dyn ContentFs>) -> Self {
        Self {
            content,
            asteroid_name: None,
            theme_dir: None,
            views_dir: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.asteroid_name = Some(name.into());
        self
    }

    pub fn with_theme_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.theme_dir = Some(dir.into());
        self
    }

    pub fn with_views_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.views_dir = Some(dir.into());
        self
    }
}
