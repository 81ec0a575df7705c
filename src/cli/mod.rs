//! CLI command definitions for ctxvars
//!
//! Global flags form the programmatic configuration layer. Subcommands
//! resolve a variable or work with context files.

pub mod commands;

use crate::config::{ConfigLayer, PromptMode, SavePrompt, SaveTarget, split_list};
use crate::logging::LogLevel;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Resolve variables from overrides, environment, context files and prompts
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Contexts to load, comma-separated (replaces lower layers)
    #[arg(long, value_name = "LIST", global = true)]
    pub context: Option<String>,

    /// Contexts to append, comma-separated
    #[arg(long, value_name = "LIST", global = true)]
    pub add_context: Option<String>,

    /// Prompt mode: always, never, fallback or no-env
    #[arg(long, value_name = "MODE", global = true)]
    pub prompt: Option<String>,

    /// Skip environment variables
    #[arg(long, global = true)]
    pub ignore_env: bool,

    /// Skip context files
    #[arg(long, global = true)]
    pub ignore_context: bool,

    /// Explicit override, repeatable
    #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_key_value, global = true)]
    pub overrides: Vec<(String, String)>,

    /// Context to save prompted values to, or "ask"
    #[arg(long, value_name = "CONTEXT", global = true)]
    pub save: Option<String>,

    /// Save policy for prompted values: never, always or ask
    #[arg(long, value_name = "POLICY", global = true)]
    pub save_prompt: Option<String>,

    /// Directory scanned for context files
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// Preferred directory for context files
    #[arg(long, global = true)]
    pub context_dir: Option<PathBuf>,

    /// Log level: error, warn, info, debug or trace
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: String,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve a variable and print its value
    Get(GetArgs),

    /// Write a value into a context file
    Set(SetArgs),

    /// List discovered contexts
    Contexts,

    /// Print the effective configuration as JSON
    Config,
}

/// Arguments for the get subcommand
#[derive(Args, Debug)]
pub struct GetArgs {
    /// Display name of the variable
    pub name: String,

    /// Storage key (default: snake_case of the name)
    #[arg(long)]
    pub key: Option<String>,

    /// Environment variable (default: UPPER_SNAKE_CASE of the key)
    #[arg(long)]
    pub env: Option<String>,

    /// Value used when no source has one
    #[arg(long)]
    pub default: Option<String>,
}

/// Arguments for the set subcommand
#[derive(Args, Debug)]
pub struct SetArgs {
    /// Context name
    #[arg(value_name = "CONTEXT")]
    pub context_name: String,

    pub key: String,

    pub value: String,
}

impl Cli {
    /// Programmatic configuration layer from the global flags.
    ///
    /// Invalid enum values are ignored, as they are in the environment layer.
    pub fn to_layer(&self) -> ConfigLayer {
        ConfigLayer {
            context: self.context.as_deref().map(split_list),
            add_context: self.add_context.as_deref().map(split_list),
            prompt: self.prompt.as_deref().and_then(PromptMode::parse),
            ignore_env: self.ignore_env.then_some(true),
            ignore_context: self.ignore_context.then_some(true),
            overrides: self.overrides.iter().cloned().collect(),
            save: self.save.as_deref().and_then(SaveTarget::parse),
            save_prompt: self.save_prompt.as_deref().and_then(SavePrompt::parse),
            root: self.root.clone(),
            context_dir: self.context_dir.clone(),
            log_level: self.log_level.as_deref().and_then(LogLevel::parse),
        }
    }
}

fn parse_key_value(value: &str) -> Result<(String, String), String> {
    match value.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got '{}'", value)),
    }
}
