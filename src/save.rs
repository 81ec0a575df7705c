//! Persisting resolved values to context files.
//!
//! Prompted values go through the `save_prompt` policy; explicit
//! [`Resolver::save`] calls always write. Both pick the destination the same
//! way: the configured save target, or the `choose_context` callback when the
//! target is `ask`.

use crate::config::{EffectiveConfig, SavePrompt, SaveTarget};
use crate::context::ContextStore;
use crate::error::{ResolveError, ResolveResult};
use crate::interaction::SaveRequest;
use crate::resolver::Resolver;
use crate::variable::{VarValue, Variable};
use std::path::PathBuf;
use tracing::{debug, warn};

impl Resolver {
    /// Apply the save-prompt policy to a value that was just prompted for.
    pub(crate) async fn save_after_prompt<T: VarValue>(
        &self,
        var: &Variable<T>,
        raw: &str,
        config: &EffectiveConfig,
    ) -> ResolveResult<()> {
        let request = match config.save_prompt {
            SavePrompt::Never => return Ok(()),
            SavePrompt::Always => self.save_request(var, raw, config).await,
            SavePrompt::Ask => {
                let request = self.save_request(var, raw, config).await;
                let confirmed = self
                    .interaction
                    .confirm_save(&request)
                    .await
                    .map_err(|err| err.for_variable(var.name(), var.key()))?;
                if !confirmed {
                    debug!(variable = %var.name(), "save declined");
                    return Ok(());
                }
                request
            }
        };

        match self.destination(var, &request, config).await? {
            Some(context) => {
                self.persist(var, &context, raw, config).await?;
            }
            None => warn!(variable = %var.name(), "no save target configured; value not saved"),
        }
        Ok(())
    }

    /// Validate and save a value for `var`.
    ///
    /// Without an explicit value, the last value resolved for the variable's
    /// key in this process is saved. The value also becomes the in-process
    /// override for the key.
    pub async fn save<T: VarValue>(&self, var: &Variable<T>, value: Option<&str>) -> ResolveResult<T> {
        let raw = match value {
            Some(value) => value.to_string(),
            None => self
                .last_value(var.key())
                .ok_or_else(|| ResolveError::missing_value(var.name(), var.key()))?,
        };
        let (typed, raw) = var.validate(&raw)?;
        self.remember(var.key(), &raw);
        self.session.set(var.key(), raw.clone());

        let config = self.config();
        let request = self.save_request(var, &raw, &config).await;
        let context = self
            .destination(var, &request, &config)
            .await?
            .ok_or_else(|| ResolveError::no_save_target(var.name(), var.key()))?;
        self.persist(var, &context, &raw, &config).await?;
        Ok(typed)
    }

    async fn save_request<T: VarValue>(
        &self,
        var: &Variable<T>,
        raw: &str,
        config: &EffectiveConfig,
    ) -> SaveRequest {
        let discovered = ContextStore::from_config(config).discover().await;
        let mut contexts: Vec<String> = discovered.names().map(str::to_string).collect();
        for name in &config.contexts {
            if !contexts.contains(name) {
                contexts.push(name.clone());
            }
        }
        SaveRequest {
            name: var.name().to_string(),
            key: var.key().to_string(),
            value: raw.to_string(),
            contexts,
        }
    }

    /// Context to write to, or `None` when nothing is configured.
    async fn destination<T: VarValue>(
        &self,
        var: &Variable<T>,
        request: &SaveRequest,
        config: &EffectiveConfig,
    ) -> ResolveResult<Option<String>> {
        match &config.save {
            None => Ok(None),
            Some(SaveTarget::Context(name)) => Ok(Some(name.clone())),
            Some(SaveTarget::Ask) => {
                let chosen = self
                    .interaction
                    .choose_context(request)
                    .await
                    .map_err(|err| err.for_variable(var.name(), var.key()))?;
                let chosen = chosen.trim();
                if chosen.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(chosen.to_string()))
                }
            }
        }
    }

    async fn persist<T: VarValue>(
        &self,
        var: &Variable<T>,
        context: &str,
        raw: &str,
        config: &EffectiveConfig,
    ) -> ResolveResult<PathBuf> {
        ContextStore::from_config(config)
            .write(context, var.key(), raw)
            .await
            .map_err(|err| ResolveError::from(err).for_variable(var.name(), var.key()))
    }
}
