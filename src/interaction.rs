//! Interactive callbacks: prompting for values and deciding where to save them.
//!
//! [`Interaction`] has every member required. [`Callbacks::builder`] assembles
//! one from plain closures, filling unset members with built-ins that fail
//! with [`ErrorCode::MissingCallback`](crate::error::ErrorCode::MissingCallback),
//! so resolution never has to check whether a callback exists.
//! [`ConsoleInteraction`] asks on the terminal.

use crate::error::{ResolveError, ResolveResult};
use async_trait::async_trait;
use dialoguer::{Confirm, Input, Select};
use std::fmt;
use std::sync::Arc;

/// What a prompt is asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptRequest {
    /// Display name of the variable.
    pub name: String,
    /// Storage key of the variable.
    pub key: String,
    /// Value to offer as the default answer.
    pub suggested: Option<String>,
}

/// A value about to be saved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveRequest {
    pub name: String,
    pub key: String,
    pub value: String,
    /// Discovered contexts plus the configured list, offered as destinations.
    pub contexts: Vec<String>,
}

/// Produces a value for a variable.
#[async_trait]
pub trait Prompter: Send + Sync {
    async fn prompt(&self, request: &PromptRequest) -> ResolveResult<String>;
}

/// Adapter that turns a closure into a [`Prompter`].
pub struct FnPrompter<F>(F);

/// Wrap a synchronous closure as a [`Prompter`].
pub fn prompt_fn<F>(f: F) -> FnPrompter<F>
where
    F: Fn(&PromptRequest) -> ResolveResult<String> + Send + Sync,
{
    FnPrompter(f)
}

#[async_trait]
impl<F> Prompter for FnPrompter<F>
where
    F: Fn(&PromptRequest) -> ResolveResult<String> + Send + Sync,
{
    async fn prompt(&self, request: &PromptRequest) -> ResolveResult<String> {
        (self.0)(request)
    }
}

/// Callbacks the resolver needs from its host.
#[async_trait]
pub trait Interaction: Send + Sync {
    /// Ask for a variable's value.
    async fn prompt(&self, request: &PromptRequest) -> ResolveResult<String>;

    /// Decide whether a prompted value should be saved.
    async fn confirm_save(&self, request: &SaveRequest) -> ResolveResult<bool>;

    /// Pick the context a value is saved to.
    async fn choose_context(&self, request: &SaveRequest) -> ResolveResult<String>;
}

type ConfirmFn = dyn Fn(&SaveRequest) -> ResolveResult<bool> + Send + Sync;
type ChooseFn = dyn Fn(&SaveRequest) -> ResolveResult<String> + Send + Sync;

/// [`Interaction`] built from individual callbacks.
#[derive(Clone)]
pub struct Callbacks {
    prompt: Arc<dyn Prompter>,
    confirm_save: Arc<ConfirmFn>,
    choose_context: Arc<ChooseFn>,
}

impl Callbacks {
    pub fn builder() -> CallbacksBuilder {
        CallbacksBuilder::default()
    }
}

impl Default for Callbacks {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callbacks").finish_non_exhaustive()
    }
}

#[async_trait]
impl Interaction for Callbacks {
    async fn prompt(&self, request: &PromptRequest) -> ResolveResult<String> {
        self.prompt.prompt(request).await
    }

    async fn confirm_save(&self, request: &SaveRequest) -> ResolveResult<bool> {
        (self.confirm_save)(request)
    }

    async fn choose_context(&self, request: &SaveRequest) -> ResolveResult<String> {
        (self.choose_context)(request)
    }
}

/// Builder for [`Callbacks`].
#[derive(Default)]
pub struct CallbacksBuilder {
    prompt: Option<Arc<dyn Prompter>>,
    confirm_save: Option<Arc<ConfirmFn>>,
    choose_context: Option<Arc<ChooseFn>>,
}

impl CallbacksBuilder {
    pub fn prompt<F>(self, f: F) -> Self
    where
        F: Fn(&PromptRequest) -> ResolveResult<String> + Send + Sync + 'static,
    {
        self.prompter(Arc::new(prompt_fn(f)))
    }

    pub fn prompter(mut self, prompter: Arc<dyn Prompter>) -> Self {
        self.prompt = Some(prompter);
        self
    }

    pub fn confirm_save<F>(mut self, f: F) -> Self
    where
        F: Fn(&SaveRequest) -> ResolveResult<bool> + Send + Sync + 'static,
    {
        self.confirm_save = Some(Arc::new(f));
        self
    }

    pub fn choose_context<F>(mut self, f: F) -> Self
    where
        F: Fn(&SaveRequest) -> ResolveResult<String> + Send + Sync + 'static,
    {
        self.choose_context = Some(Arc::new(f));
        self
    }

    /// Unset callbacks fail with `MissingCallback` when invoked.
    pub fn build(self) -> Callbacks {
        let prompt: Arc<dyn Prompter> = match self.prompt {
            Some(prompter) => prompter,
            None => Arc::new(prompt_fn(|_| Err(ResolveError::missing_callback("prompt")))),
        };
        let confirm_save: Arc<ConfirmFn> = match self.confirm_save {
            Some(f) => f,
            None => Arc::new(|_: &SaveRequest| -> ResolveResult<bool> {
                Err(ResolveError::missing_callback("confirm_save"))
            }),
        };
        let choose_context: Arc<ChooseFn> = match self.choose_context {
            Some(f) => f,
            None => Arc::new(|_: &SaveRequest| -> ResolveResult<String> {
                Err(ResolveError::missing_callback("choose_context"))
            }),
        };
        Callbacks {
            prompt,
            confirm_save,
            choose_context,
        }
    }
}

/// Terminal prompts via `dialoguer`, run on the blocking thread pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleInteraction;

#[async_trait]
impl Interaction for ConsoleInteraction {
    async fn prompt(&self, request: &PromptRequest) -> ResolveResult<String> {
        let label = request.name.clone();
        let suggested = request.suggested.clone();
        tokio::task::spawn_blocking(move || {
            let mut input = Input::<String>::new().with_prompt(label).allow_empty(true);
            if let Some(default) = suggested {
                input = input.default(default);
            }
            input.interact_text()
        })
        .await
        .map_err(ResolveError::internal)?
        .map_err(ResolveError::io)
    }

    async fn confirm_save(&self, request: &SaveRequest) -> ResolveResult<bool> {
        let question = format!("Save {} for future runs?", request.name);
        tokio::task::spawn_blocking(move || {
            Confirm::new().with_prompt(question).default(true).interact()
        })
        .await
        .map_err(ResolveError::internal)?
        .map_err(ResolveError::io)
    }

    async fn choose_context(&self, request: &SaveRequest) -> ResolveResult<String> {
        let question = format!("Save {} to which context?", request.name);
        let contexts = request.contexts.clone();
        tokio::task::spawn_blocking(move || {
            if contexts.is_empty() {
                return Input::<String>::new().with_prompt(question).interact_text();
            }
            let index = Select::new()
                .with_prompt(question)
                .items(&contexts)
                .default(contexts.len() - 1)
                .interact()?;
            Ok(contexts[index].clone())
        })
        .await
        .map_err(ResolveError::internal)?
        .map_err(ResolveError::io)
    }
}
