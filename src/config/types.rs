//! Configuration types.
//!
//! [`ConfigLayer`] is a partial configuration as supplied by one source (the
//! config file, the `CTXVARS_*` environment, or the caller). Layers are merged
//! into an [`EffectiveConfig`] by [`super::merge::merge`].

use crate::logging::LogLevel;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// When resolution asks the user for a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PromptMode {
    /// Prompt on every resolution.
    Always,
    /// Never prompt.
    Never,
    /// Prompt only when no source produced a value (default).
    #[default]
    Fallback,
    /// Prompt unless the value came from the variable's environment variable.
    NoEnv,
}

impl PromptMode {
    /// Case-insensitive parse; values outside the set yield `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "always" => Some(PromptMode::Always),
            "never" => Some(PromptMode::Never),
            "fallback" => Some(PromptMode::Fallback),
            "no-env" | "no_env" | "noenv" => Some(PromptMode::NoEnv),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PromptMode::Always => "always",
            PromptMode::Never => "never",
            PromptMode::Fallback => "fallback",
            PromptMode::NoEnv => "no-env",
        }
    }
}

impl std::fmt::Display for PromptMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a prompted value is written to a context file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SavePrompt {
    /// Keep prompted values in the session only (default).
    #[default]
    Never,
    /// Save without asking.
    Always,
    /// Ask through the `confirm_save` callback.
    Ask,
}

impl SavePrompt {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "never" => Some(SavePrompt::Never),
            "always" => Some(SavePrompt::Always),
            "ask" => Some(SavePrompt::Ask),
            _ => None,
        }
    }
}

/// Context that saved values are written to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveTarget {
    /// Ask through the `choose_context` callback.
    Ask,
    /// A named context.
    Context(String),
}

impl SaveTarget {
    /// `ask` (any case) is the sentinel; blank input means no target.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.is_empty() {
            None
        } else if value.eq_ignore_ascii_case("ask") {
            Some(SaveTarget::Ask)
        } else {
            Some(SaveTarget::Context(value.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            SaveTarget::Ask => "ask",
            SaveTarget::Context(name) => name,
        }
    }
}

impl Serialize for SaveTarget {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Partial configuration from a single source. `None` means "not set here".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigLayer {
    /// Context list that replaces anything from lower layers.
    pub context: Option<Vec<String>>,
    /// Contexts appended to the list from lower layers.
    pub add_context: Option<Vec<String>>,
    pub prompt: Option<PromptMode>,
    pub ignore_env: Option<bool>,
    pub ignore_context: Option<bool>,
    /// Explicit key -> value overrides; merged key by key across layers.
    pub overrides: BTreeMap<String, String>,
    pub save: Option<SaveTarget>,
    pub save_prompt: Option<SavePrompt>,
    pub root: Option<PathBuf>,
    pub context_dir: Option<PathBuf>,
    pub log_level: Option<LogLevel>,
}

impl ConfigLayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_context<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.context = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_add_context<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.add_context = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_prompt(mut self, mode: PromptMode) -> Self {
        self.prompt = Some(mode);
        self
    }

    pub fn with_ignore_env(mut self, ignore: bool) -> Self {
        self.ignore_env = Some(ignore);
        self
    }

    pub fn with_ignore_context(mut self, ignore: bool) -> Self {
        self.ignore_context = Some(ignore);
        self
    }

    pub fn with_override(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.overrides.insert(key.into(), value.into());
        self
    }

    pub fn with_save(mut self, target: SaveTarget) -> Self {
        self.save = Some(target);
        self
    }

    pub fn with_save_prompt(mut self, policy: SavePrompt) -> Self {
        self.save_prompt = Some(policy);
        self
    }

    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    pub fn with_context_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.context_dir = Some(dir.into());
        self
    }

    pub fn with_log_level(mut self, level: LogLevel) -> Self {
        self.log_level = Some(level);
        self
    }

    /// Apply `other` on top of this layer: set fields replace, overrides merge.
    pub fn overlay(&mut self, other: ConfigLayer) {
        if other.context.is_some() {
            self.context = other.context;
        }
        if other.add_context.is_some() {
            self.add_context = other.add_context;
        }
        self.prompt = other.prompt.or(self.prompt);
        self.ignore_env = other.ignore_env.or(self.ignore_env);
        self.ignore_context = other.ignore_context.or(self.ignore_context);
        self.overrides.extend(other.overrides);
        if other.save.is_some() {
            self.save = other.save;
        }
        self.save_prompt = other.save_prompt.or(self.save_prompt);
        if other.root.is_some() {
            self.root = other.root;
        }
        if other.context_dir.is_some() {
            self.context_dir = other.context_dir;
        }
        self.log_level = other.log_level.or(self.log_level);
    }

    /// Make relative `root` / `context_dir` absolute against `base`.
    pub fn resolve_paths(mut self, base: &Path) -> Self {
        self.root = self.root.map(|p| absolutize(base, p));
        self.context_dir = self.context_dir.map(|p| absolutize(base, p));
        self
    }
}

fn absolutize(base: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}

/// The merged configuration used by one resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectiveConfig {
    /// Contexts to load, in override order (later wins).
    pub contexts: Vec<String>,
    pub prompt: PromptMode,
    pub ignore_env: bool,
    pub ignore_context: bool,
    pub overrides: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub save: Option<SaveTarget>,
    pub save_prompt: SavePrompt,
    /// Directory scanned for context files.
    pub root: PathBuf,
    /// Preferred directory for context lookups and new context files.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_dir: Option<PathBuf>,
    pub log_level: LogLevel,
    /// Config file that supplied the file layer, if one was found.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_file: Option<PathBuf>,
}

impl EffectiveConfig {
    /// Defaults with the given root and no layers applied.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            contexts: Vec::new(),
            prompt: PromptMode::default(),
            ignore_env: false,
            ignore_context: false,
            overrides: BTreeMap::new(),
            save: None,
            save_prompt: SavePrompt::default(),
            root: root.into(),
            context_dir: None,
            log_level: LogLevel::default(),
            config_file: None,
        }
    }
}
