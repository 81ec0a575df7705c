//! Environment variable access.
//!
//! The environment is read in three places: the `CTXVARS_*` configuration
//! layer, the environment step of variable resolution, and `$NAME`
//! interpolation inside values. All three go through [`EnvSource`] so a fixed
//! map can stand in for the process environment.

use std::collections::HashMap;

/// Where environment variables are read from.
#[derive(Debug, Clone, Default)]
pub enum EnvSource {
    /// The real process environment.
    #[default]
    Process,
    /// A fixed set of variables; anything not in the map is unset.
    Fixed(HashMap<String, String>),
}

impl EnvSource {
    /// Build a fixed environment from key/value pairs.
    pub fn fixed<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::Fixed(
            vars.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// An environment with nothing set.
    pub fn empty() -> Self {
        Self::Fixed(HashMap::new())
    }

    /// Look up a variable. Non-unicode process values count as unset.
    pub fn get(&self, name: &str) -> Option<String> {
        match self {
            EnvSource::Process => std::env::var(name).ok(),
            EnvSource::Fixed(vars) => vars.get(name).cloned(),
        }
    }

    /// Look up a variable, treating the empty string as unset.
    pub fn get_non_empty(&self, name: &str) -> Option<String> {
        self.get(name).filter(|value| !value.is_empty())
    }
}
