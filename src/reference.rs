//! Reference expansion inside resolved values.
//!
//! Every pass first interpolates `$NAME` / `${NAME}` from the environment
//! (unset names become empty), then checks whether the whole string is a
//! context reference:
//! - `@ctx:key` - the value of `key` in context `ctx`
//! - `@ctx` - the value of the current variable's own key in context `ctx`
//!
//! A looked-up value is expanded again, one level deeper. Going past
//! [`MAX_REFERENCE_DEPTH`] is an error, which is how cycles surface.

use crate::context::ContextStore;
use crate::env::EnvSource;
use regex_lite::{Captures, Regex};
use std::future::Future;
use std::pin::Pin;
use std::sync::LazyLock;
use thiserror::Error;
use tracing::debug;

/// Maximum nesting of context references.
pub const MAX_REFERENCE_DEPTH: usize = 10;

static ENV_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)")
        .expect("env reference pattern is valid")
});

static CONTEXT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^@([A-Za-z0-9_][A-Za-z0-9_.-]*)(?::(.+))?$")
        .expect("context reference pattern is valid")
});

/// A reference that could not be expanded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReferenceError {
    #[error("Context '{context}' referenced by '{reference}' was not found")]
    ContextNotFound { context: String, reference: String },

    #[error("Key '{key}' not found in context '{context}'")]
    KeyNotFound { context: String, key: String },

    #[error("Reference depth exceeded {limit} while expanding '{reference}' (circular reference?)")]
    DepthExceeded { reference: String, limit: usize },
}

/// A parsed `@ctx[:key]` reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextReference<'a> {
    pub context: &'a str,
    pub key: Option<&'a str>,
}

impl<'a> ContextReference<'a> {
    /// Parse a whole-string reference; anything else yields `None`.
    pub fn parse(value: &'a str) -> Option<Self> {
        let caps = CONTEXT_PATTERN.captures(value)?;
        Some(Self {
            context: caps.get(1)?.as_str(),
            key: caps.get(2).map(|m| m.as_str()),
        })
    }
}

/// Replace every `$NAME` and `${NAME}` with its environment value.
pub fn interpolate_env(value: &str, env: &EnvSource) -> String {
    if !value.contains('$') {
        return value.to_string();
    }
    ENV_PATTERN
        .replace_all(value, |caps: &Captures| {
            caps.get(1)
                .or_else(|| caps.get(2))
                .and_then(|name| env.get(name.as_str()))
                .unwrap_or_default()
        })
        .into_owned()
}

type ExpandFuture<'a> = Pin<Box<dyn Future<Output = Result<String, ReferenceError>> + Send + 'a>>;

/// Expands references for one variable.
pub struct ReferenceResolver<'a> {
    env: &'a EnvSource,
    store: &'a ContextStore,
    own_key: &'a str,
}

impl<'a> ReferenceResolver<'a> {
    /// `own_key` is the storage key used for bare `@ctx` references.
    pub fn new(env: &'a EnvSource, store: &'a ContextStore, own_key: &'a str) -> Self {
        Self {
            env,
            store,
            own_key,
        }
    }

    pub async fn expand(&self, raw: &str) -> Result<String, ReferenceError> {
        self.expand_at(raw.to_string(), 0).await
    }

    fn expand_at(&self, raw: String, depth: usize) -> ExpandFuture<'_> {
        Box::pin(async move {
            if depth > MAX_REFERENCE_DEPTH {
                return Err(ReferenceError::DepthExceeded {
                    reference: raw,
                    limit: MAX_REFERENCE_DEPTH,
                });
            }

            let value = interpolate_env(&raw, self.env);
            let Some(reference) = ContextReference::parse(&value) else {
                return Ok(value);
            };
            let key = reference.key.unwrap_or(self.own_key);

            let values = self.store.load_single(reference.context).await.ok_or_else(|| {
                ReferenceError::ContextNotFound {
                    context: reference.context.to_string(),
                    reference: value.clone(),
                }
            })?;
            let next = values
                .get(key)
                .cloned()
                .ok_or_else(|| ReferenceError::KeyNotFound {
                    context: reference.context.to_string(),
                    key: key.to_string(),
                })?;

            debug!(context = reference.context, key, depth, "expanded context reference");
            self.expand_at(next, depth + 1).await
        })
    }
}
