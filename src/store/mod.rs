//! Store definitions, live instances and class-style containers.
//!
//! Two flavours share one listener protocol:
//! - `StoreDefinition<T>`: a factory instantiated once per provider mount,
//!   holding its state in `StateCell`s
//! - `Container<S>`: a single shared state record with shallow-merge updates

mod container;
mod definition;
mod instance;
mod listener;

pub use container::{Container, State, StateSetter};
pub use definition::{StateCell, StoreCx, StoreDefinition};
pub use instance::Instance;
pub use listener::Listener;
