//! Layered configuration.
//!
//! Three layers are merged, lowest precedence first:
//! 1. **File** - `ctxvars.json` / `ctxvars.yaml` / `ctxvars.yml`, searched
//!    upward from the start directory
//! 2. **Environment** - `CTXVARS_*` variables
//! 3. **Programmatic** - `Resolver::configure` and CLI flags
//!
//! ## Merge Strategy
//! - Scalars: the highest layer that sets a field wins
//! - `overrides`: merged key by key
//! - Context lists: the highest `context` list replaces everything below it;
//!   `addContext` lists above it are appended in order

mod loader;
mod merge;
mod types;

pub use loader::{
    CONFIG_FILE_NAMES, ConfigLoader, ConfigTier, ENV_PREFIX, env_layer, find_config_file,
    layer_from_fields, load_file_layer, parse_bool, split_list,
};
pub use merge::{merge, merge_context_lists};
pub use types::*;
