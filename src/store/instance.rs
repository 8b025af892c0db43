use std::fmt;
use std::ops::Deref;
use std::rc::Rc;

use super::listener::{Listener, ListenerSet};
use crate::runtime::DefinitionId;

/// The live realization of a store definition for one mounted subtree.
///
/// Owned by the provider that created it; descendants only hold shared
/// handles obtained through [`use_store`](crate::use_store). Derefs to the
/// record the factory produced.
pub struct Instance<T> {
    definition: DefinitionId,
    value: T,
    listeners: Rc<ListenerSet<()>>,
}

impl<T> Instance<T> {
    pub(crate) fn new(definition: DefinitionId, value: T, listeners: Rc<ListenerSet<()>>) -> Self {
        Self {
            definition,
            value,
            listeners,
        }
    }

    /// The definition this instance was created from.
    pub fn definition(&self) -> DefinitionId {
        self.definition
    }

    /// Subscribe to changes of any state cell of this instance.
    pub fn subscribe(&self, listener: &Listener<()>) {
        if self.listeners.subscribe(listener) {
            tracing::trace!(definition = ?self.definition, listeners = self.listener_count(), "store listener subscribed");
        }
    }

    /// Remove a listener.
    pub fn unsubscribe(&self, listener: &Listener<()>) {
        if self.listeners.unsubscribe(listener) {
            tracing::trace!(definition = ?self.definition, listeners = self.listener_count(), "store listener unsubscribed");
        }
    }

    /// Number of currently registered listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Drop every listener; called when the owning provider unmounts.
    pub(crate) fn release(&self) {
        tracing::debug!(definition = ?self.definition, listeners = self.listener_count(), "released store instance");
        self.listeners.clear();
    }
}

impl<T> Deref for Instance<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T: fmt::Debug> fmt::Debug for Instance<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("definition", &self.definition)
            .field("value", &self.value)
            .field("listeners", &self.listener_count())
            .finish()
    }
}
