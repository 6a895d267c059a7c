//! Layered configuration: defaults, `config.json`, then environment

use super::schema::Config;
use super::validate::validate_config;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Prefix for path overrides, e.g. `CHAT_RELAY__RELAY__DEBOUNCE_MS=500`
const ENV_PREFIX: &str = "CHAT_RELAY__";

/// Short variables for the settings most often changed per deployment
const ENV_ALIASES: &[(&str, &[&str])] = &[
    ("RESPONDER_URL", &["responder", "url"]),
    ("WHATSAPP_BRIDGE_URL", &["channels", "whatsapp", "bridge_url"]),
];

/// Reads and writes `config.json` inside a config directory
pub struct ConfigLoader {
    config_dir: PathBuf,
}

impl ConfigLoader {
    /// Loader rooted at `~/.chat-relay`
    pub fn new() -> Self {
        Self::with_dir(dirs::home_dir().unwrap_or_default().join(".chat-relay"))
    }

    pub fn with_dir<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            config_dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Build the effective configuration and validate it
    ///
    /// Later layers win: defaults, the config file (if present), alias
    /// variables, then `CHAT_RELAY__` path variables.
    pub fn load(&self) -> crate::Result<Config> {
        let mut layered = serde_json::to_value(Config::default())?;
        if let Some(file) = self.read_file()? {
            overlay(&mut layered, file);
        }
        for (path, value) in env_overrides(std::env::vars()) {
            assign(&mut layered, &path, value);
        }

        let config: Config = serde_json::from_value(layered)?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Write `config` as pretty JSON, creating the directory if needed
    pub fn save(&self, config: &Config) -> crate::Result<()> {
        std::fs::create_dir_all(&self.config_dir)?;
        std::fs::write(self.config_path(), serde_json::to_string_pretty(config)?)?;
        Ok(())
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn config_path(&self) -> PathBuf {
        self.config_dir.join("config.json")
    }

    fn read_file(&self) -> crate::Result<Option<Value>> {
        match std::fs::read_to_string(self.config_path()) {
            Ok(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Deep-merge `top` into `base`; objects merge per key, anything else replaces
fn overlay(base: &mut Value, top: Value) {
    let Value::Object(top_map) = top else {
        *base = top;
        return;
    };
    let Some(base_map) = base.as_object_mut() else {
        *base = Value::Object(top_map);
        return;
    };
    for (key, value) in top_map {
        match base_map.get_mut(&key) {
            Some(slot) => overlay(slot, value),
            None => {
                base_map.insert(key, value);
            }
        }
    }
}

/// Set the value at `path`, creating intermediate objects
fn assign(root: &mut Value, path: &[String], value: Value) {
    let Some((head, rest)) = path.split_first() else {
        *root = value;
        return;
    };
    if !root.is_object() {
        *root = Value::Object(Map::new());
    }
    if let Value::Object(map) = root {
        assign(map.entry(head.clone()).or_insert(Value::Null), rest, value);
    }
}

/// Collect overrides from environment variables, aliases before path variables
fn env_overrides(vars: impl IntoIterator<Item = (String, String)>) -> Vec<(Vec<String>, Value)> {
    let mut aliased = Vec::new();
    let mut pathed = Vec::new();

    for (key, raw) in vars {
        if let Some((_, path)) = ENV_ALIASES.iter().find(|(alias, _)| *alias == key) {
            let path: Vec<String> = path.iter().map(|s| s.to_string()).collect();
            aliased.push((path, Value::String(raw)));
        } else if let Some(suffix) = key.strip_prefix(ENV_PREFIX) {
            let path: Vec<String> = suffix
                .split("__")
                .filter(|s| !s.is_empty())
                .map(str::to_ascii_lowercase)
                .collect();
            if !path.is_empty() {
                pathed.push((path, env_value(&raw)));
            }
        }
    }

    aliased.extend(pathed);
    aliased
}

/// JSON when it parses, otherwise a plain string (`TRUE`/`False` become booleans)
fn env_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| match raw.to_ascii_lowercase().as_str() {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::String(raw.to_string()),
    })
}
