//! Variable descriptors and validation.

use crate::error::{ResolveError, ResolveResult};
use crate::interaction::{PromptRequest, Prompter, prompt_fn};
use heck::{ToShoutySnakeCase, ToSnakeCase};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// A type a variable can resolve to. Raw values are always strings.
pub trait VarValue: Clone + Send + Sync + 'static {
    fn parse_raw(raw: &str) -> Result<Self, String>;
    fn to_raw(&self) -> String;
}

impl<T> VarValue for T
where
    T: FromStr + ToString + Clone + Send + Sync + 'static,
    T::Err: fmt::Display,
{
    fn parse_raw(raw: &str) -> Result<Self, String> {
        raw.parse::<T>().map_err(|e| e.to_string())
    }

    fn to_raw(&self) -> String {
        self.to_string()
    }
}

/// Result of a validator.
#[derive(Debug, Clone, PartialEq)]
pub enum Validation<T> {
    /// Accepted. `Some` replaces the value; `None` parses the raw string.
    Valid(Option<T>),
    /// Rejected, with an opaque payload handed back to the caller untouched.
    Invalid(Option<Value>),
}

impl<T> Validation<T> {
    pub fn ok() -> Self {
        Validation::Valid(None)
    }

    pub fn replace(value: T) -> Self {
        Validation::Valid(Some(value))
    }

    pub fn fail(payload: impl Into<Value>) -> Self {
        Validation::Invalid(Some(payload.into()))
    }

    pub fn from_bool(valid: bool) -> Self {
        if valid {
            Validation::Valid(None)
        } else {
            Validation::Invalid(None)
        }
    }

    pub fn from_result<E: Into<Value>>(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Validation::Valid(Some(value)),
            Err(payload) => Validation::Invalid(Some(payload.into())),
        }
    }
}

type ValidatorFn<T> = dyn Fn(&str) -> Validation<T> + Send + Sync;

/// Describes one configuration variable.
///
/// Created once and resolved many times. The storage key defaults to the
/// snake_case form of the name, the environment name to the
/// SHOUTY_SNAKE_CASE form of the key.
pub struct Variable<T: VarValue = String> {
    name: String,
    key: String,
    env: Option<String>,
    default: Option<String>,
    validator: Option<Arc<ValidatorFn<T>>>,
    prompt: Option<Arc<dyn Prompter>>,
}

impl<T: VarValue> Variable<T> {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let key = name.to_snake_case();
        Self {
            name,
            key,
            env: None,
            default: None,
            validator: None,
            prompt: None,
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    pub fn with_env(mut self, env: impl Into<String>) -> Self {
        self.env = Some(env.into());
        self
    }

    /// Raw default; references in it are expanded at resolution time.
    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_default_value(self, default: &T) -> Self {
        self.with_default(default.to_raw())
    }

    pub fn with_validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&str) -> Validation<T> + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(validator));
        self
    }

    pub fn with_prompt<F>(self, prompt: F) -> Self
    where
        F: Fn(&PromptRequest) -> ResolveResult<String> + Send + Sync + 'static,
    {
        self.with_prompter(Arc::new(prompt_fn(prompt)))
    }

    pub fn with_prompter(mut self, prompter: Arc<dyn Prompter>) -> Self {
        self.prompt = Some(prompter);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn env_name(&self) -> String {
        match &self.env {
            Some(env) => env.clone(),
            None => self.key.to_shouty_snake_case(),
        }
    }

    pub fn default_raw(&self) -> Option<&str> {
        self.default.as_deref()
    }

    pub fn prompter(&self) -> Option<&Arc<dyn Prompter>> {
        self.prompt.as_ref()
    }

    /// Validate a raw value, returning the typed value and its raw form.
    pub fn validate(&self, raw: &str) -> ResolveResult<(T, String)> {
        let outcome = match &self.validator {
            Some(validator) => validator(raw),
            None => Validation::Valid(None),
        };
        match outcome {
            Validation::Valid(Some(value)) => {
                let raw = value.to_raw();
                Ok((value, raw))
            }
            Validation::Valid(None) => match T::parse_raw(raw) {
                Ok(value) => Ok((value, raw.to_string())),
                Err(message) => Err(ResolveError::validation(
                    &self.name,
                    &self.key,
                    Some(Value::String(message)),
                )),
            },
            Validation::Invalid(payload) => {
                Err(ResolveError::validation(&self.name, &self.key, payload))
            }
        }
    }
}

impl<T: VarValue> Clone for Variable<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            key: self.key.clone(),
            env: self.env.clone(),
            default: self.default.clone(),
            validator: self.validator.clone(),
            prompt: self.prompt.clone(),
        }
    }
}

impl<T: VarValue> fmt::Debug for Variable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Variable")
            .field("name", &self.name)
            .field("key", &self.key)
            .field("env", &self.env_name())
            .field("default", &self.default)
            .field("validator", &self.validator.is_some())
            .field("prompt", &self.prompt.is_some())
            .finish()
    }
}
