use serde::{Deserialize, Serialize};
use std::fs;

/// Bot-level settings. Read-mostly: loaded once at startup from an
/// optional TOML file named by `LATTE_CONFIG`, then overridden by
/// `LATTE_*` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BotConfig {
    pub command_prefix: String,
    pub default_vote_channel: Option<u64>,
    pub max_players: u32,
    pub log_path: Option<String>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            command_prefix: "!".into(),
            default_vote_channel: None,
            max_players: 10,
            log_path: None,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Invalid(String),
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}
impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e)
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

pub fn load() -> Result<BotConfig, ConfigError> {
    let file = std::env::var("LATTE_CONFIG").ok();
    load_with(file.as_deref(), &|key| std::env::var(key).ok())
}

/// Same as [`load`] but with the file path and environment injected,
/// so tests stay independent of process-global state.
pub fn load_with(
    file: Option<&str>,
    env: &dyn Fn(&str) -> Option<String>,
) -> Result<BotConfig, ConfigError> {
    let mut cfg = BotConfig::default();
    if let Some(path) = file {
        let s = fs::read_to_string(path)?;
        apply_file(&mut cfg, &toml::from_str::<FileConfig>(&s)?);
    }

    if let Some(prefix) = env("LATTE_PREFIX") {
        if !prefix.is_empty() {
            cfg.command_prefix = prefix;
        }
    }
    if let Some(channel) = env("LATTE_VOTE_CHANNEL") {
        if !channel.is_empty() {
            cfg.default_vote_channel = Some(
                channel
                    .parse()
                    .map_err(|_| ConfigError::Invalid("Invalid vote channel".into()))?,
            );
        }
    }
    if let Some(max) = env("LATTE_MAX_PLAYERS") {
        if !max.is_empty() {
            cfg.max_players = max
                .parse()
                .map_err(|_| ConfigError::Invalid("Invalid max players".into()))?;
        }
    }
    if let Some(path) = env("LATTE_LOG_PATH") {
        if !path.is_empty() {
            cfg.log_path = Some(path);
        }
    }

    validate(&cfg)?;
    Ok(cfg)
}

#[derive(Debug, Deserialize)]
struct FileConfig {
    #[serde(default)]
    command_prefix: Option<String>,
    #[serde(default)]
    default_vote_channel: Option<u64>,
    #[serde(default)]
    max_players: Option<u32>,
    #[serde(default)]
    log_path: Option<String>,
}

fn apply_file(cfg: &mut BotConfig, file: &FileConfig) {
    if let Some(v) = &file.command_prefix {
        cfg.command_prefix = v.clone();
    }
    if let Some(v) = file.default_vote_channel {
        cfg.default_vote_channel = Some(v);
    }
    if let Some(v) = file.max_players {
        cfg.max_players = v;
    }
    if let Some(v) = &file.log_path {
        cfg.log_path = Some(v.clone());
    }
}

fn validate(cfg: &BotConfig) -> Result<(), ConfigError> {
    if cfg.command_prefix.is_empty() {
        return Err(ConfigError::Invalid(
            "Invalid configuration: command_prefix must not be empty".into(),
        ));
    }
    if cfg.max_players == 0 {
        return Err(ConfigError::Invalid(
            "Invalid configuration: max_players must be >0".into(),
        ));
    }
    Ok(())
}

/// Raw key-path access over the parsed configuration tree, e.g.
/// `raw.get("mafia.vote_channel")`. Absent paths return `None`.
#[derive(Debug, Clone)]
pub struct RawConfig {
    root: toml::Value,
}

impl RawConfig {
    pub fn from_str(s: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            root: toml::from_str(s)?,
        })
    }

    pub fn get(&self, path: &str) -> Option<&toml::Value> {
        let mut current = &self.root;
        for key in path.split('.') {
            current = current.as_table()?.get(key)?;
        }
        Some(current)
    }

    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(toml::Value::as_str)
    }

    pub fn get_int(&self, path: &str) -> Option<i64> {
        self.get(path).and_then(toml::Value::as_integer)
    }

    pub fn get_bool(&self, path: &str) -> Option<bool> {
        self.get(path).and_then(toml::Value::as_bool)
    }
}
