//! Configuration management for iris

use crate::error::{IrisError, Result};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Headless browser settings
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Bound on waiting for a page to settle
    pub timeout_secs: u64,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub headless: bool,
    /// Extra Chromium command line switches
    pub chrome_args: Vec<String>,
    /// Explicit browser binary; auto-detected when unset
    pub executable: Option<PathBuf>,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            viewport_width: 1280,
            viewport_height: 720,
            headless: true,
            chrome_args: vec![
                "--no-sandbox".to_string(),
                "--disable-setuid-sandbox".to_string(),
                "--disable-dev-shm-usage".to_string(),
            ],
            executable: None,
        }
    }
}

impl RendererConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    /// Path to the axe-core bundle injected into each page
    pub script_path: PathBuf,
    pub timeout_secs: u64,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            script_path: PathBuf::from("vendor/axe.min.js"),
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("iris_scans.json"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 3000)),
        }
    }
}

/// Effective application configuration
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub renderer: RendererConfig,
    pub analyzer: AnalyzerConfig,
    pub store: StoreConfig,
    pub server: ServerConfig,
}

/// File-based configuration structure matching default.toml
#[derive(Debug, Deserialize)]
struct FileConfig {
    renderer: Option<RendererSection>,
    analyzer: Option<AnalyzerSection>,
    store: Option<StoreSection>,
    server: Option<ServerSection>,
}

#[derive(Debug, Deserialize)]
struct RendererSection {
    timeout_secs: Option<u64>,
    viewport_width: Option<u32>,
    viewport_height: Option<u32>,
    headless: Option<bool>,
    chrome_args: Option<Vec<String>>,
    executable: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct AnalyzerSection {
    script_path: Option<PathBuf>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct StoreSection {
    path: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct ServerSection {
    bind: Option<String>,
}

/// Loads configuration from a TOML file and merges with defaults
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(IrisError::IoError)?;
    parse_config(&content)
}

/// Parses TOML configuration text, filling gaps with defaults
pub fn parse_config(content: &str) -> Result<AppConfig> {
    let file_config: FileConfig = toml::from_str(content)?;

    let mut config = AppConfig::default();

    if let Some(renderer) = file_config.renderer {
        if let Some(timeout) = renderer.timeout_secs {
            config.renderer.timeout_secs = timeout;
        }
        if let Some(width) = renderer.viewport_width {
            config.renderer.viewport_width = width;
        }
        if let Some(height) = renderer.viewport_height {
            config.renderer.viewport_height = height;
        }
        if let Some(headless) = renderer.headless {
            config.renderer.headless = headless;
        }
        if let Some(args) = renderer.chrome_args {
            config.renderer.chrome_args = args;
        }
        config.renderer.executable = renderer.executable;
    }

    if let Some(analyzer) = file_config.analyzer {
        if let Some(script) = analyzer.script_path {
            config.analyzer.script_path = script;
        }
        if let Some(timeout) = analyzer.timeout_secs {
            config.analyzer.timeout_secs = timeout;
        }
    }

    if let Some(store) = file_config.store {
        if let Some(path) = store.path {
            config.store.path = path;
        }
    }

    if let Some(server) = file_config.server {
        if let Some(bind) = server.bind {
            config.server.bind = bind
                .parse()
                .map_err(|e| IrisError::ConfigError(format!("Invalid bind address '{bind}': {e}")))?;
        }
    }

    if config.renderer.timeout_secs == 0 {
        return Err(IrisError::ConfigError(
            "renderer.timeout_secs must be greater than zero".to_string(),
        ));
    }

    Ok(config)
}

/// Resolves the config file: explicit path, then `config/default.toml`, then built-in defaults
pub fn resolve(path: Option<&Path>) -> Result<AppConfig> {
    if let Some(path) = path {
        return load_config(path);
    }
    let default_path = Path::new("config/default.toml");
    if default_path.exists() {
        load_config(default_path)
    } else {
        Ok(AppConfig::default())
    }
}

/// Merges CLI arguments into an existing AppConfig
pub fn merge_cli_args(
    config: &mut AppConfig,
    store: Option<PathBuf>,
    script: Option<PathBuf>,
    timeout: Option<u64>,
    bind: Option<SocketAddr>,
) {
    if let Some(s) = store {
        config.store.path = s;
    }
    if let Some(s) = script {
        config.analyzer.script_path = s;
    }
    if let Some(t) = timeout {
        if t > 0 {
            config.renderer.timeout_secs = t;
        }
    }
    if let Some(b) = bind {
        config.server.bind = b;
    }
}
