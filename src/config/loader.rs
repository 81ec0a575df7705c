//! Configuration loader with tier-based merging.
//!
//! Reads the file layer (found by searching upward from the start directory)
//! and the `CTXVARS_*` environment layer, then merges them with the caller's
//! programmatic layer. Nothing here fails: an unreadable or malformed config
//! file is logged and treated as an empty layer.

use super::merge::merge;
use super::types::{ConfigLayer, EffectiveConfig, PromptMode, SavePrompt, SaveTarget};
use crate::env::EnvSource;
use crate::logging::LogLevel;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Config file names checked in each directory, in order.
pub const CONFIG_FILE_NAMES: &[&str] = &["ctxvars.json", "ctxvars.yaml", "ctxvars.yml"];

/// Prefix for environment-supplied configuration.
pub const ENV_PREFIX: &str = "CTXVARS_";

/// Configuration tier priority (lowest to highest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConfigTier {
    /// Config file found by upward search (lowest priority)
    File = 0,
    /// `CTXVARS_*` environment variables
    Environment = 1,
    /// Set by the caller through `Resolver::configure` (highest priority)
    Programmatic = 2,
}

impl std::fmt::Display for ConfigTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigTier::File => write!(f, "file"),
            ConfigTier::Environment => write!(f, "environment"),
            ConfigTier::Programmatic => write!(f, "programmatic"),
        }
    }
}

/// Loads the file and environment layers for a start directory.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    start_dir: PathBuf,
    env: EnvSource,
}

impl ConfigLoader {
    /// `start_dir` should be absolute; it anchors the upward search and
    /// relative paths from the environment and programmatic layers.
    pub fn new(start_dir: impl Into<PathBuf>, env: EnvSource) -> Self {
        Self {
            start_dir: start_dir.into(),
            env,
        }
    }

    pub fn start_dir(&self) -> &Path {
        &self.start_dir
    }

    pub fn env(&self) -> &EnvSource {
        &self.env
    }

    /// Compute the effective configuration. Re-reads the config file and the
    /// environment on every call.
    pub fn load(&self, programmatic: &ConfigLayer) -> EffectiveConfig {
        let config_file = find_config_file(&self.start_dir);

        let (file_layer, default_root) = match &config_file {
            Some(path) => {
                let dir = path
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| self.start_dir.clone());
                (load_file_layer(path).resolve_paths(&dir), dir)
            }
            None => (ConfigLayer::default(), self.start_dir.clone()),
        };
        let env_layer = env_layer(&self.env).resolve_paths(&self.start_dir);
        let programmatic = programmatic.clone().resolve_paths(&self.start_dir);

        let mut config = merge(&file_layer, &env_layer, &programmatic, default_root);
        config.config_file = config_file;
        config
    }
}

/// Search `start` and its ancestors for a config file.
pub fn find_config_file(start: &Path) -> Option<PathBuf> {
    for dir in start.ancestors() {
        for name in CONFIG_FILE_NAMES {
            let candidate = dir.join(name);
            if candidate.is_file() {
                debug!(path = %candidate.display(), "found config file");
                return Some(candidate);
            }
        }
    }
    None
}

/// Read a config file into a layer. Failures yield an empty layer.
pub fn load_file_layer(path: &Path) -> ConfigLayer {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "cannot read config file; ignoring");
            return ConfigLayer::default();
        }
    };

    let is_yaml = matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yaml") | Some("yml")
    );
    let parsed: Result<Value, String> = if is_yaml {
        serde_yaml::from_str(&content).map_err(|e| e.to_string())
    } else {
        serde_json::from_str(&content).map_err(|e| e.to_string())
    };

    match parsed {
        Ok(Value::Object(fields)) => layer_from_fields(&fields),
        Ok(Value::Null) => ConfigLayer::default(),
        Ok(_) => {
            warn!(path = %path.display(), "config file is not an object; ignoring");
            ConfigLayer::default()
        }
        Err(err) => {
            warn!(path = %path.display(), error = %err, "malformed config file; ignoring");
            ConfigLayer::default()
        }
    }
}

/// Build a layer from a parsed config object. Unknown and mistyped fields
/// are ignored individually.
pub fn layer_from_fields(fields: &Map<String, Value>) -> ConfigLayer {
    let get = |names: &[&str]| field(fields, names);
    let string = |names: &[&str]| field(fields, names).and_then(Value::as_str);

    ConfigLayer {
        context: get(&["context"]).and_then(string_list),
        add_context: get(&["addContext", "add_context"]).and_then(string_list),
        prompt: string(&["prompt"]).and_then(PromptMode::parse),
        ignore_env: get(&["ignoreEnv", "ignore_env"]).and_then(Value::as_bool),
        ignore_context: get(&["ignoreContext", "ignore_context"]).and_then(Value::as_bool),
        overrides: get(&["overrides"])
            .and_then(Value::as_object)
            .map(|map| {
                map.iter()
                    .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                    .collect()
            })
            .unwrap_or_default(),
        save: string(&["save"]).and_then(SaveTarget::parse),
        save_prompt: string(&["savePrompt", "save_prompt"]).and_then(SavePrompt::parse),
        root: string(&["root"]).map(PathBuf::from),
        context_dir: string(&["contextDir", "context_dir"]).map(PathBuf::from),
        log_level: string(&["logLevel", "log_level"]).and_then(LogLevel::parse),
    }
}

/// First present field among alternative spellings.
fn field<'a>(fields: &'a Map<String, Value>, names: &[&str]) -> Option<&'a Value> {
    names.iter().find_map(|name| fields.get(*name))
}

/// A list is an array of strings or a comma-separated string.
fn string_list(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::String(s) => Some(split_list(s)),
        Value::Array(items) => items
            .iter()
            .map(|item| item.as_str().map(str::to_string))
            .collect(),
        _ => None,
    }
}

/// Split a comma-separated list, dropping blank entries.
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Lenient boolean: 1/true/yes/on and 0/false/no/off, any case.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Build the environment layer from `CTXVARS_*` variables.
pub fn env_layer(env: &EnvSource) -> ConfigLayer {
    let var = |name: &str| env.get_non_empty(&format!("{}{}", ENV_PREFIX, name));

    ConfigLayer {
        context: var("CONTEXT").map(|v| split_list(&v)),
        add_context: var("ADD_CONTEXT").map(|v| split_list(&v)),
        prompt: var("PROMPT").and_then(|v| PromptMode::parse(&v)),
        ignore_env: var("IGNORE_ENV").and_then(|v| parse_bool(&v)),
        ignore_context: var("IGNORE_CONTEXT").and_then(|v| parse_bool(&v)),
        overrides: Default::default(),
        save: var("SAVE").and_then(|v| SaveTarget::parse(&v)),
        save_prompt: var("SAVE_PROMPT").and_then(|v| SavePrompt::parse(&v)),
        root: var("ROOT").map(PathBuf::from),
        context_dir: var("CONTEXT_DIR").map(PathBuf::from),
        log_level: var("LOG_LEVEL").and_then(|v| LogLevel::parse(&v)),
    }
}
