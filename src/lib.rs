//! # Stowaway
//!
//! Shared stores for component trees.
//!
//! Stowaway lets independently defined stores be instantiated once, shared
//! with a component subtree, and subscribed to by components so that a store
//! update re-renders exactly the components reading it.
//!
//! ## Function stores
//!
//! - `StoreDefinition<T>` - A factory describing a store's state and behaviour
//! - `Provider` - Instantiates definitions once per mount for its subtree
//! - `use_store` - Reads an instance and subscribes the calling component
//!
//! ## Containers
//!
//! A single shared state record with shallow-merge updates:
//! - `Container<S>` - State plus `set_state`/`subscribe`/`unsubscribe`
//! - `ContainerProvider` - Publishes one container on the default channel
//! - `use_container` - Returns `(state, setter, container)`
//!
//! ## Host
//!
//! A minimal single-threaded component tree (`Tree`, `Element`, `Cx`)
//! provides the render/commit contract the hooks bind to.
//!
//! ## Example
//!
//! ```
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use stowaway::{use_store, Element, Provider, StateCell, StoreDefinition, Tree};
//!
//! struct Counter {
//!     count: StateCell<i64>,
//! }
//!
//! let counter = StoreDefinition::new(|cx| Counter { count: cx.use_state(0) });
//! let handle = Rc::new(Cell::new(None));
//!
//! let view = Element::new({
//!     let (counter, handle) = (counter.clone(), handle.clone());
//!     move |cx| {
//!         let store = use_store(cx, &counter)?;
//!         handle.set(Some(store));
//!         Ok(vec![])
//!     }
//! });
//!
//! let mut tree = Tree::mount(Provider::new().store(&counter).child(view).into()).unwrap();
//! let store = handle.take().unwrap();
//! tree.act(|| store.count.update(|count| *count += 1)).unwrap();
//! assert_eq!(store.count.get(), 1);
//! ```

mod error;
pub mod host;
pub mod provider;
pub mod runtime;
pub mod store;

// Re-export main types for convenience
pub use error::{Error, Result};
pub use host::{Children, Cleanup, Cx, Element, RerenderTrigger, Tree};
pub use provider::{compose, use_container, use_published, use_store, AnyDefinition, ContainerProvider, Provider, PublishedMap};
pub use runtime::{Channel, DefinitionId, StoreRegistry};
pub use store::{Container, Instance, Listener, State, StateCell, StateSetter, StoreCx, StoreDefinition};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_works() {
        // Basic smoke test
        let counter = StoreDefinition::new(|cx| cx.use_state(0));
        let Some(instance) = counter.instantiate() else {
            panic!("counter should instantiate");
        };
        assert_eq!(instance.get(), 0);
        instance.set(42);
        assert_eq!(instance.get(), 42);
    }
}
