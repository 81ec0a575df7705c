//! Named context files and the in-process override layer.
//!
//! ## Layout
//! - `<name>.context.json` files anywhere under the root (hidden entries skipped)
//! - new contexts are created in `contextDir` when configured, else the root

mod session;
mod store;

pub use session::OverrideLayer;
pub use store::{
    CONTEXT_SUFFIX, ContextMap, ContextStore, ContextValues, context_name, discover, read_values,
};
