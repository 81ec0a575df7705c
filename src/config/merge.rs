//! Layer merging.
//!
//! Scalars: programmatic overrides environment overrides file; an unset field
//! falls through. Overrides maps merge key by key.
//!
//! Context lists: the highest layer that sets a replace list (`context`)
//! anchors the result. Its `add_context` and everything below it are ignored;
//! `add_context` lists from layers above the anchor are appended in order,
//! skipping names already present. With no replace list anywhere, every
//! layer's `add_context` is appended starting from an empty list.

use super::loader::ConfigTier;
use super::types::{ConfigLayer, EffectiveConfig};
use std::path::PathBuf;
use tracing::debug;

/// Merge the three layers into an effective configuration.
///
/// `default_root` is used when no layer sets `root`; callers pass the
/// directory of the discovered config file, or the start directory.
pub fn merge(
    file: &ConfigLayer,
    env: &ConfigLayer,
    programmatic: &ConfigLayer,
    default_root: PathBuf,
) -> EffectiveConfig {
    let layers = [file, env, programmatic];
    let defaults = EffectiveConfig::with_root(default_root);

    let mut overrides = defaults.overrides;
    for layer in layers {
        overrides.extend(
            layer
                .overrides
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
    }

    EffectiveConfig {
        contexts: merge_context_lists(&layers),
        prompt: highest(&layers, |l| l.prompt).unwrap_or(defaults.prompt),
        ignore_env: highest(&layers, |l| l.ignore_env).unwrap_or(defaults.ignore_env),
        ignore_context: highest(&layers, |l| l.ignore_context)
            .unwrap_or(defaults.ignore_context),
        overrides,
        save: highest(&layers, |l| l.save.clone()),
        save_prompt: highest(&layers, |l| l.save_prompt).unwrap_or(defaults.save_prompt),
        root: highest(&layers, |l| l.root.clone()).unwrap_or(defaults.root),
        context_dir: highest(&layers, |l| l.context_dir.clone()),
        log_level: highest(&layers, |l| l.log_level).unwrap_or(defaults.log_level),
        config_file: None,
    }
}

/// First value set, searching from the highest-precedence layer down.
fn highest<T>(layers: &[&ConfigLayer], field: impl Fn(&ConfigLayer) -> Option<T>) -> Option<T> {
    layers.iter().rev().find_map(|layer| field(layer))
}

/// Merge the file, environment and programmatic context lists.
pub fn merge_context_lists(layers: &[&ConfigLayer; 3]) -> Vec<String> {
    const TIERS: [ConfigTier; 3] = [
        ConfigTier::File,
        ConfigTier::Environment,
        ConfigTier::Programmatic,
    ];
    let mut merged = Vec::new();

    let anchor = layers
        .iter()
        .zip(TIERS)
        .enumerate()
        .rev()
        .find_map(|(index, (layer, tier))| {
            layer.context.as_deref().map(|list| (index, tier, list))
        });

    let above: &[&ConfigLayer] = match anchor {
        Some((index, tier, list)) => {
            debug!(%tier, "context list replaced");
            push_unique(&mut merged, list);
            &layers[index + 1..]
        }
        None => layers,
    };

    for layer in above {
        if let Some(add) = layer.add_context.as_deref() {
            push_unique(&mut merged, add);
        }
    }
    merged
}

/// Append names not already present, keeping first-occurrence order.
fn push_unique(list: &mut Vec<String>, names: &[String]) {
    for name in names {
        let name = name.trim();
        if !name.is_empty() && !list.iter().any(|existing| existing == name) {
            list.push(name.to_string());
        }
    }
}
