//! Variable resolution.
//!
//! A [`Resolver`] owns the state shared by every resolution in a process:
//! the programmatic configuration layer, the in-process override layer and
//! the last value resolved per key. Resolution walks a fixed waterfall and
//! stops at the first hit:
//!
//! 1. the `overrides` map of the effective configuration
//! 2. the environment variable (non-empty), unless `ignore_env`
//! 3. the in-process override layer, then the merged contexts (unless `ignore_context`)
//!
//! Every hit is reference-expanded. The prompt mode then decides whether
//! the user is asked; otherwise the hit, or the expanded default, is used.
//! A key already entered in this process is never asked for again.

use crate::config::{ConfigLayer, ConfigLoader, EffectiveConfig, PromptMode};
use crate::context::{ContextMap, ContextStore, ContextValues, OverrideLayer};
use crate::env::EnvSource;
use crate::error::{ResolveError, ResolveResult};
use crate::interaction::{Callbacks, Interaction, PromptRequest, Prompter, prompt_fn};
use crate::reference::ReferenceResolver;
use crate::variable::{VarValue, Variable};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

/// Where a resolved value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Override,
    Environment,
    /// The in-process override layer.
    Session,
    Context,
    Default,
    Prompt,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Override => "override",
            Source::Environment => "environment",
            Source::Session => "session",
            Source::Context => "context",
            Source::Default => "default",
            Source::Prompt => "prompt",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A raw value, expanded but not yet validated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub value: String,
    pub source: Source,
    /// True when the value was entered at a prompt.
    pub prompted: bool,
}

/// Overrides for a single call. The variable itself is never changed.
#[derive(Clone, Default)]
pub struct GetOptions {
    pub prompt: Option<Arc<dyn Prompter>>,
    pub default: Option<String>,
}

impl GetOptions {
    pub fn new() -> Self {
        Self::default()
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

    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }
}

impl fmt::Debug for GetOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GetOptions")
            .field("prompt", &self.prompt.is_some())
            .field("default", &self.default)
            .finish()
    }
}

/// Outcome of [`Resolver::safe_get`].
#[derive(Debug, Clone, PartialEq)]
pub enum SafeGet<T> {
    Success(T),
    Failure(ResolveError),
}

impl<T> SafeGet<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, SafeGet::Success(_))
    }

    pub fn into_result(self) -> ResolveResult<T> {
        match self {
            SafeGet::Success(value) => Ok(value),
            SafeGet::Failure(err) => Err(err),
        }
    }

    pub fn ok(self) -> Option<T> {
        match self {
            SafeGet::Success(value) => Some(value),
            SafeGet::Failure(_) => None,
        }
    }
}

impl<T> From<ResolveResult<T>> for SafeGet<T> {
    fn from(result: ResolveResult<T>) -> Self {
        match result {
            Ok(value) => SafeGet::Success(value),
            Err(err) => SafeGet::Failure(err),
        }
    }
}

/// Builder for [`Resolver`].
#[derive(Default)]
pub struct ResolverBuilder {
    start_dir: Option<PathBuf>,
    env: EnvSource,
    interaction: Option<Arc<dyn Interaction>>,
    programmatic: ConfigLayer,
}

impl ResolverBuilder {
    /// Directory the config file search starts from. Defaults to the
    /// current directory.
    pub fn start_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.start_dir = Some(dir.into());
        self
    }

    pub fn env(mut self, env: EnvSource) -> Self {
        self.env = env;
        self
    }

    pub fn interaction(mut self, interaction: Arc<dyn Interaction>) -> Self {
        self.interaction = Some(interaction);
        self
    }

    pub fn callbacks(self, callbacks: Callbacks) -> Self {
        self.interaction(Arc::new(callbacks))
    }

    /// Initial programmatic layer.
    pub fn configure(mut self, layer: ConfigLayer) -> Self {
        self.programmatic.overlay(layer);
        self
    }

    pub fn build(self) -> ResolveResult<Resolver> {
        let start_dir = match self.start_dir {
            Some(dir) => std::path::absolute(dir).map_err(ResolveError::io)?,
            None => std::env::current_dir().map_err(ResolveError::io)?,
        };
        Ok(Resolver {
            loader: ConfigLoader::new(start_dir, self.env),
            programmatic: Mutex::new(self.programmatic),
            session: OverrideLayer::new(),
            last: Mutex::new(HashMap::new()),
            interaction: self
                .interaction
                .unwrap_or_else(|| Arc::new(Callbacks::default())),
        })
    }
}

/// Resolves variables against layered configuration.
///
/// Thread-safe: shared state sits behind mutexes that are never held across
/// an await, so concurrent resolutions see each other's prompted values.
pub struct Resolver {
    loader: ConfigLoader,
    programmatic: Mutex<ConfigLayer>,
    pub(crate) session: OverrideLayer,
    last: Mutex<HashMap<String, String>>,
    pub(crate) interaction: Arc<dyn Interaction>,
}

impl Resolver {
    /// Resolver for the current directory and process environment, with
    /// no callbacks configured.
    pub fn new() -> ResolveResult<Self> {
        Self::builder().build()
    }

    pub fn builder() -> ResolverBuilder {
        ResolverBuilder::default()
    }

    /// Overlay `layer` onto the programmatic configuration.
    pub fn configure(&self, layer: ConfigLayer) {
        self.programmatic
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .overlay(layer);
    }

    /// Clear the programmatic configuration, the in-process override layer
    /// and the remembered values.
    pub fn reset(&self) {
        *self
            .programmatic
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = ConfigLayer::default();
        self.session.clear();
        self.last
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Compute the effective configuration from all layers.
    pub fn config(&self) -> EffectiveConfig {
        let programmatic = self
            .programmatic
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        self.loader.load(&programmatic)
    }

    pub fn session(&self) -> &OverrideLayer {
        &self.session
    }

    pub fn env(&self) -> &EnvSource {
        self.loader.env()
    }

    /// Every context discoverable under the configured directories.
    pub async fn list_contexts(&self) -> ContextMap {
        ContextStore::from_config(&self.config()).discover().await
    }

    /// Values of the configured contexts, merged in order.
    pub async fn context_values(&self) -> ContextValues {
        let config = self.config();
        ContextStore::from_config(&config)
            .load_merged(&config.contexts)
            .await
    }

    /// Last raw value resolved or saved for `key` in this process.
    pub fn last_value(&self, key: &str) -> Option<String> {
        self.last
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    pub(crate) fn remember(&self, key: &str, raw: &str) {
        self.last
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), raw.to_string());
    }

    /// Resolve to an expanded raw value without validating or saving.
    pub async fn resolve<T: VarValue>(
        &self,
        var: &Variable<T>,
        options: &GetOptions,
    ) -> ResolveResult<Resolution> {
        let config = self.config();
        self.resolve_with_config(var, options, &config).await
    }

    async fn resolve_with_config<T: VarValue>(
        &self,
        var: &Variable<T>,
        options: &GetOptions,
        config: &EffectiveConfig,
    ) -> ResolveResult<Resolution> {
        let store = ContextStore::from_config(config);
        let references = ReferenceResolver::new(self.loader.env(), &store, var.key());

        let hit = match self.raw_value(var, config, &store).await {
            Some((source, raw)) => Some((source, expand(&references, var, &raw).await?)),
            None => None,
        };

        let should_prompt = match config.prompt {
            PromptMode::Always => true,
            PromptMode::Never => false,
            PromptMode::Fallback => hit.is_none(),
            PromptMode::NoEnv => !matches!(hit, Some((Source::Environment, _))),
        };

        let default = options.default.as_deref().or(var.default_raw());

        if should_prompt {
            // Prompted or saved earlier in this process, even when an
            // override or the environment shadows it.
            if let Some(value) = self.session.get(var.key()) {
                debug!(variable = %var.name(), "already entered; not prompting");
                return Ok(Resolution {
                    value: expand(&references, var, &value).await?,
                    source: Source::Session,
                    prompted: false,
                });
            }

            let suggested = match &hit {
                Some((_, value)) => Some(value.clone()),
                None => match default {
                    Some(default) => Some(expand(&references, var, default).await?),
                    None => None,
                },
            };
            let request = PromptRequest {
                name: var.name().to_string(),
                key: var.key().to_string(),
                suggested,
            };
            debug!(variable = %var.name(), mode = %config.prompt, "prompting");

            let answer = match options.prompt.as_ref().or(var.prompter()) {
                Some(prompter) => prompter.prompt(&request).await,
                None => self.interaction.prompt(&request).await,
            }
            .map_err(|err| err.for_variable(var.name(), var.key()))?;

            return Ok(Resolution {
                value: expand(&references, var, &answer).await?,
                source: Source::Prompt,
                prompted: true,
            });
        }

        if let Some((source, value)) = hit {
            debug!(variable = %var.name(), %source, "resolved");
            return Ok(Resolution {
                value,
                source,
                prompted: false,
            });
        }

        match default {
            Some(default) => Ok(Resolution {
                value: expand(&references, var, default).await?,
                source: Source::Default,
                prompted: false,
            }),
            None => Err(ResolveError::missing_value(var.name(), var.key())),
        }
    }

    /// First raw hit in the waterfall, before expansion.
    async fn raw_value<T: VarValue>(
        &self,
        var: &Variable<T>,
        config: &EffectiveConfig,
        store: &ContextStore,
    ) -> Option<(Source, String)> {
        if let Some(value) = config.overrides.get(var.key()) {
            return Some((Source::Override, value.clone()));
        }

        if !config.ignore_env {
            if let Some(value) = self.loader.env().get_non_empty(&var.env_name()) {
                return Some((Source::Environment, value));
            }
        }

        if let Some(value) = self.session.get(var.key()) {
            return Some((Source::Session, value));
        }

        if !config.ignore_context {
            let mut values = store.load_merged(&config.contexts).await;
            if let Some(value) = values.remove(var.key()) {
                return Some((Source::Context, value));
            }
        }

        None
    }

    pub async fn get<T: VarValue>(&self, var: &Variable<T>) -> ResolveResult<T> {
        self.get_with(var, &GetOptions::default()).await
    }

    /// Resolve, validate and, for prompted values, apply the save policy.
    pub async fn get_with<T: VarValue>(
        &self,
        var: &Variable<T>,
        options: &GetOptions,
    ) -> ResolveResult<T> {
        let config = self.config();
        let resolution = self.resolve_with_config(var, options, &config).await?;
        let (value, raw) = var.validate(&resolution.value)?;
        self.remember(var.key(), &raw);

        if resolution.prompted {
            self.session.set(var.key(), raw.clone());
            self.save_after_prompt(var, &raw, &config).await?;
        }
        Ok(value)
    }

    /// Like [`get`](Self::get), but failures are returned as a value.
    pub async fn safe_get<T: VarValue>(&self, var: &Variable<T>) -> SafeGet<T> {
        self.get(var).await.into()
    }

    pub async fn safe_get_with<T: VarValue>(
        &self,
        var: &Variable<T>,
        options: &GetOptions,
    ) -> SafeGet<T> {
        self.get_with(var, options).await.into()
    }
}

/// Expand references, attributing failures to `var`.
async fn expand<T: VarValue>(
    references: &ReferenceResolver<'_>,
    var: &Variable<T>,
    raw: &str,
) -> ResolveResult<String> {
    references
        .expand(raw)
        .await
        .map_err(|err| ResolveError::from(err).for_variable(var.name(), var.key()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    fn resolver(dir: &TempDir, env: EnvSource) -> Resolver {
        Resolver::builder()
            .start_dir(dir.path())
            .env(env)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_override_beats_environment() {
        let temp = TempDir::new().unwrap();
        let resolver = resolver(&temp, EnvSource::fixed([("API_URL", "from-env")]));
        let var: Variable = Variable::new("API URL");

        assert_eq!(resolver.get(&var).await.unwrap(), "from-env");

        resolver.configure(ConfigLayer::new().with_override("api_url", "from-override"));
        let resolution = resolver.resolve(&var, &GetOptions::new()).await.unwrap();
        assert_eq!(resolution.value, "from-override");
        assert_eq!(resolution.source, Source::Override);
    }

    #[tokio::test]
    async fn test_empty_env_is_absent() {
        let temp = TempDir::new().unwrap();
        let resolver = resolver(&temp, EnvSource::fixed([("API_URL", "")]));
        let var: Variable = Variable::new("API URL").with_default("fallback");
        assert_eq!(resolver.get(&var).await.unwrap(), "fallback");
    }

    #[tokio::test]
    async fn test_per_call_default_and_prompt() {
        let temp = TempDir::new().unwrap();
        let resolver = resolver(&temp, EnvSource::empty());
        let var: Variable = Variable::new("Name").with_default("var-default");

        let options = GetOptions::new().with_default("call-default");
        assert_eq!(resolver.get_with(&var, &options).await.unwrap(), "call-default");
        assert_eq!(resolver.get(&var).await.unwrap(), "var-default");

        resolver.configure(ConfigLayer::new().with_prompt(PromptMode::Always));
        let options = GetOptions::new().with_prompt(|req| {
            Ok(format!("answer to {}", req.suggested.clone().unwrap_or_default()))
        });
        assert_eq!(
            resolver.get_with(&var, &options).await.unwrap(),
            "answer to var-default"
        );
    }

    #[tokio::test]
    async fn test_no_env_mode_prompts_without_env_hit() {
        let temp = TempDir::new().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let resolver = Resolver::builder()
            .start_dir(temp.path())
            .env(EnvSource::fixed([("TOKEN", "env-token")]))
            .callbacks(
                Callbacks::builder()
                    .prompt(move |_| {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Ok("typed".to_string())
                    })
                    .build(),
            )
            .configure(ConfigLayer::new().with_prompt(PromptMode::NoEnv))
            .build()
            .unwrap();

        let token: Variable = Variable::new("Token");
        assert_eq!(resolver.get(&token).await.unwrap(), "env-token");
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let other: Variable = Variable::new("Other").with_default("d");
        assert_eq!(resolver.get(&other).await.unwrap(), "typed");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_no_env_override_prompts_once() {
        let temp = TempDir::new().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let resolver = Resolver::builder()
            .start_dir(temp.path())
            .env(EnvSource::empty())
            .callbacks(
                Callbacks::builder()
                    .prompt(move |req| {
                        counter.fetch_add(1, Ordering::SeqCst);
                        assert_eq!(req.suggested.as_deref(), Some("from-override"));
                        Ok("typed".to_string())
                    })
                    .build(),
            )
            .configure(
                ConfigLayer::new()
                    .with_prompt(PromptMode::NoEnv)
                    .with_override("token", "from-override"),
            )
            .build()
            .unwrap();

        let token: Variable = Variable::new("Token");
        assert_eq!(resolver.get(&token).await.unwrap(), "typed");
        assert_eq!(resolver.get(&token).await.unwrap(), "typed");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_never_mode_without_value_is_missing() {
        let temp = TempDir::new().unwrap();
        let resolver = resolver(&temp, EnvSource::empty());
        resolver.configure(ConfigLayer::new().with_prompt(PromptMode::Never));
        let var: Variable = Variable::new("Secret");

        let err = resolver.get(&var).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::MissingValue);
        assert!(!resolver.safe_get(&var).await.is_success());
    }

    #[tokio::test]
    async fn test_reset_clears_state() {
        let temp = TempDir::new().unwrap();
        let resolver = resolver(&temp, EnvSource::empty());
        resolver.configure(ConfigLayer::new().with_override("name", "x"));
        resolver.session().set("other", "y");
        let var: Variable = Variable::new("Name");
        assert_eq!(resolver.get(&var).await.unwrap(), "x");
        assert_eq!(resolver.last_value("name").as_deref(), Some("x"));

        resolver.reset();
        assert!(resolver.config().overrides.is_empty());
        assert!(resolver.session().snapshot().is_empty());
        assert_eq!(resolver.last_value("name"), None);
    }

    #[test]
    fn test_safe_get_conversions() {
        let ok: SafeGet<u8> = Ok(1).into();
        assert!(ok.is_success());
        assert_eq!(ok.ok(), Some(1));

        let failed: SafeGet<u8> = Err(ResolveError::missing_value("A", "a")).into();
        assert!(failed.into_result().unwrap_err().is_missing_value());
    }
}
