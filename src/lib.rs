//! ctxvars library
//!
//! Resolves named variables from explicit overrides, environment variables,
//! on-disk context files, defaults and interactive prompts, with the policy
//! for each run coming from layered configuration rather than code.

pub mod cli;
pub mod config;
pub mod context;
pub mod env;
pub mod error;
pub mod interaction;
pub mod logging;
pub mod reference;
pub mod resolver;
pub mod save;
pub mod variable;

pub use config::{ConfigLayer, EffectiveConfig, PromptMode, SavePrompt, SaveTarget};
pub use env::EnvSource;
pub use error::{ErrorCode, ResolveError, ResolveResult};
pub use interaction::{Callbacks, ConsoleInteraction, Interaction, PromptRequest, Prompter, SaveRequest};
pub use resolver::{GetOptions, Resolution, Resolver, ResolverBuilder, SafeGet, Source};
pub use variable::{Validation, VarValue, Variable};
