//! Runtime support for stores.
//!
//! This module provides the channel registry that routes each store
//! definition to its subtree, and the scope stack that carries published
//! values down the component tree.

mod context;
mod registry;

pub(crate) use context::Env;
pub use context::Channel;
pub use registry::{DefinitionId, StoreRegistry};
