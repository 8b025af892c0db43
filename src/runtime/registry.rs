use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use super::context::Channel;

/// Reference identity of a store definition.
///
/// Every constructed definition gets a fresh id; clones share it. Two
/// definitions with identical factories still get distinct ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DefinitionId(usize);

impl DefinitionId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicUsize = AtomicUsize::new(0);
        DefinitionId(NEXT.fetch_add(1, Ordering::SeqCst))
    }
}

/// Registry mapping store definitions to their propagation channels.
///
/// Supports both a process-wide registry (default) and scoped registries for
/// isolation. Channels are created on first use and live as long as the
/// registry does; for the global registry that is the process lifetime.
///
/// The global registry is keyed only by definition identity, so two
/// unrelated providers given the same definition share its channel. Each
/// consumer still resolves the nearest enclosing publication, so disjoint
/// subtrees keep separate instances.
///
/// # Examples
///
/// ```
/// use stowaway::{StoreDefinition, StoreRegistry};
///
/// let counter = StoreDefinition::new(|cx| cx.use_state(0));
///
/// StoreRegistry::scope(|| {
///     let registry = StoreRegistry::current();
///     let channel = registry.channel_for(&counter);
///     assert_eq!(registry.channel_for(&counter), channel);
///     assert_eq!(registry.channel_count(), 1);
/// });
/// // The scoped registry and its channels are dropped here
/// ```
#[derive(Debug, Default)]
pub struct StoreRegistry {
    channels: Mutex<HashMap<DefinitionId, Channel>>,
}

// Thread-local stack for scoped registries
thread_local! {
    static REGISTRY_STACK: RefCell<Vec<Arc<StoreRegistry>>> = const { RefCell::new(Vec::new()) };
}

impl StoreRegistry {
    /// Create a new, empty registry.
    pub fn new() -> Arc<Self> {
        Arc::new(StoreRegistry::default())
    }

    /// Run a function with a fresh isolated registry.
    ///
    /// Providers and hooks rendered inside `f` resolve channels against the
    /// new registry, which is dropped when `f` returns.
    pub fn scope<F, R>(f: F) -> R
    where
        F: FnOnce() -> R,
    {
        Self::with_registry(Self::new(), f)
    }

    /// Get or create the process-wide registry.
    pub fn global() -> Arc<Self> {
        static REGISTRY: OnceLock<Arc<StoreRegistry>> = OnceLock::new();
        Arc::clone(REGISTRY.get_or_init(Self::new))
    }

    /// Get the current registry (scoped or global fallback).
    pub fn current() -> Arc<Self> {
        REGISTRY_STACK.with(|stack| stack.borrow().last().cloned().unwrap_or_else(Self::global))
    }

    /// Run a function with a specific registry as the current one.
    ///
    /// The registry is popped again even if `f` panics.
    pub fn with_registry<F, R>(registry: Arc<Self>, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        REGISTRY_STACK.with(|stack| {
            stack.borrow_mut().push(registry);
        });

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(f));

        REGISTRY_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });

        match result {
            Ok(r) => r,
            Err(e) => std::panic::resume_unwind(e),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<DefinitionId, Channel>> {
        // Entries are insert-only, so a poisoned map is still consistent.
        self.channels.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Look up the channel for a definition id, creating it on first use.
    pub fn channel(&self, id: DefinitionId) -> Channel {
        *self.lock().entry(id).or_insert_with(|| {
            let channel = Channel::next();
            tracing::debug!(definition = ?id, channel = channel.id(), "created store channel");
            channel
        })
    }

    /// Look up the channel for a definition, creating it on first use.
    pub fn channel_for<T: 'static>(&self, definition: &crate::StoreDefinition<T>) -> Channel {
        self.channel(definition.id())
    }

    /// Look up an existing channel without creating one.
    pub fn get(&self, id: DefinitionId) -> Option<Channel> {
        self.lock().get(&id).copied()
    }

    /// Number of channels created so far.
    pub fn channel_count(&self) -> usize {
        self.lock().len()
    }

    /// Forget every channel.
    ///
    /// Useful for resetting between tests. Subtrees that are still mounted
    /// keep publishing on their old channels while new lookups get new ones,
    /// so only clear a registry nothing is rendering against.
    pub fn clear(&self) {
        self.lock().clear();
    }
}
