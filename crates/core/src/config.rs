use config::{Config, ConfigError, Environment, File};
use secrecy::Secret;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub bridge: BridgeConfig,
    pub worldedit: WorldEditConfig,
    pub sandbox: SandboxLimits,
    pub safety: SafetyConfig,
    pub schematic: SchematicConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub enable_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 3000,
            enable_cors: true,
        }
    }
}

/// Connection settings for the client-mod bridge.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BridgeConfig {
    pub host: String,
    pub port: u16,
    pub path: String,
    pub use_ssl: bool,
    pub token: Option<Secret<String>>,
    /// Per-request deadline, also used as the connect timeout.
    pub timeout_secs: f64,
    /// A connection unused for longer than this is replaced on next use.
    pub max_idle_secs: f64,
    pub inbox_capacity: usize,
    pub backoff: BackoffConfig,
}

impl BridgeConfig {
    /// WebSocket URL of the client mod.
    pub fn endpoint(&self) -> String {
        let scheme = if self.use_ssl { "wss" } else { "ws" };
        let path = if self.path.starts_with('/') {
            self.path.clone()
        } else {
            format!("/{}", self.path)
        };
        format!("{}://{}:{}{}", scheme, self.host, self.port, path)
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8766,
            path: "/vibecraft".into(),
            use_ssl: false,
            token: None,
            timeout_secs: 10.0,
            max_idle_secs: 300.0,
            inbox_capacity: 100,
            backoff: BackoffConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BackoffConfig {
    pub base_secs: f64,
    pub max_secs: f64,
    pub multiplier: f64,
    /// Fraction of the delay applied as uniform +/- jitter.
    pub jitter: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_secs: 1.0,
            max_secs: 60.0,
            multiplier: 2.0,
            jitter: 0.25,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum WorldEditMode {
    Off,
    #[default]
    Auto,
    Force,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum WorldEditFallback {
    #[default]
    Warn,
    Disable,
}

#[derive(Debug, Deserialize, Clone, Copy, Default)]
#[serde(default)]
pub struct WorldEditConfig {
    pub mode: WorldEditMode,
    pub fallback: WorldEditFallback,
}

/// Resource limits applied to generation scripts.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SandboxLimits {
    pub max_commands: usize,
    pub max_iterations: u64,
    pub max_code_length: usize,
    pub max_nesting_depth: usize,
    /// Zero disables the wall-clock limit.
    pub timeout_secs: u64,
}

impl Default for SandboxLimits {
    fn default() -> Self {
        Self {
            max_commands: 10_000,
            max_iterations: 100_000,
            max_code_length: 50_000,
            max_nesting_depth: 10,
            timeout_secs: 5,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SafetyConfig {
    pub max_command_length: usize,
    pub allow_dangerous_commands: bool,
    pub build_area: Option<BuildArea>,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            max_command_length: 1000,
            allow_dangerous_commands: true,
            build_area: None,
        }
    }
}

/// Optional world-coordinate bounds for generated placements.
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(default)]
pub struct BuildArea {
    pub min_x: Option<i64>,
    pub max_x: Option<i64>,
    pub min_y: Option<i64>,
    pub max_y: Option<i64>,
    pub min_z: Option<i64>,
    pub max_z: Option<i64>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SchematicConfig {
    /// JSON file with `[{"name": "stone"}, ...]`; the built-in list is used when unset.
    pub block_catalog_path: Option<String>,
    /// Ceiling on grid cells after run-length, repeat, range and shape expansion.
    pub max_cells: usize,
    /// Ceiling on layers after Y-range and shape expansion.
    pub max_layers: usize,
}

impl Default for SchematicConfig {
    fn default() -> Self {
        Self {
            block_catalog_path: None,
            max_cells: 1_000_000,
            max_layers: 1024,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct LoggingConfig {
    pub json: bool,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("VIBECRAFT_ENV").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(File::with_name("config/local").required(false))
            // Map VIBECRAFT__BRIDGE__PORT=9000 to bridge.port
            .add_source(Environment::with_prefix("VIBECRAFT").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
