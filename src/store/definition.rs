use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use super::instance::Instance;
use super::listener::ListenerSet;
use crate::runtime::DefinitionId;

type Factory<T> = dyn Fn(&StoreCx) -> Option<T>;

/// A store definition: a factory describing a store's state and behaviour.
///
/// Definitions are identified by reference. Clones share identity and
/// resolve to the same channel; a second definition built from the same
/// closure is a different store.
///
/// # Examples
///
/// ```
/// use stowaway::{StateCell, StoreDefinition};
///
/// struct Counter {
///     count: StateCell<i64>,
/// }
///
/// impl Counter {
///     fn increment(&self, amount: i64) {
///         self.count.update(|count| *count += amount);
///     }
/// }
///
/// let counter = StoreDefinition::new(|cx| Counter {
///     count: cx.use_state(0),
/// });
///
/// let instance = counter.instantiate().unwrap();
/// instance.increment(2);
/// assert_eq!(instance.count.get(), 2);
/// ```
pub struct StoreDefinition<T> {
    id: DefinitionId,
    factory: Rc<Factory<T>>,
}

impl<T: 'static> StoreDefinition<T> {
    /// Create a definition from a factory that always yields a record.
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn(&StoreCx) -> T + 'static,
    {
        Self::fallible(move |cx| Some(factory(cx)))
    }

    /// Create a definition whose factory may yield nothing usable.
    ///
    /// A definition that yields `None` is published as uninitialized, and
    /// consuming it fails with [`Error::UninitializedStore`](crate::Error::UninitializedStore).
    pub fn fallible<F>(factory: F) -> Self
    where
        F: Fn(&StoreCx) -> Option<T> + 'static,
    {
        Self {
            id: DefinitionId::next(),
            factory: Rc::new(factory),
        }
    }

    /// Get the definition's identity.
    pub fn id(&self) -> DefinitionId {
        self.id
    }

    /// Run the factory once and wrap the result in a live instance.
    ///
    /// Providers call this on mount; calling it directly yields an instance
    /// no provider knows about.
    pub fn instantiate(&self) -> Option<Rc<Instance<T>>> {
        let cx = StoreCx {
            listeners: Rc::new(ListenerSet::new()),
        };
        let value = (self.factory)(&cx);
        match value {
            Some(value) => {
                tracing::debug!(definition = ?self.id, store = std::any::type_name::<T>(), "instantiated store");
                Some(Rc::new(Instance::new(self.id, value, cx.listeners)))
            }
            None => {
                tracing::debug!(definition = ?self.id, "store factory produced no instance");
                None
            }
        }
    }

    /// Returns `true` if both handles are the same definition.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Clone for StoreDefinition<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            factory: Rc::clone(&self.factory),
        }
    }
}

impl<T> fmt::Debug for StoreDefinition<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreDefinition")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

/// Setup context handed to a store factory.
///
/// State created here belongs to the instance being built: writing to it
/// notifies that instance's subscribers. Custom store hooks are plain
/// functions taking `&StoreCx`.
pub struct StoreCx {
    listeners: Rc<ListenerSet<()>>,
}

impl StoreCx {
    /// Create a piece of state owned by the instance being built.
    pub fn use_state<V: 'static>(&self, initial: V) -> StateCell<V> {
        StateCell {
            value: Rc::new(RefCell::new(initial)),
            listeners: Rc::clone(&self.listeners),
        }
    }
}

impl fmt::Debug for StoreCx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreCx").finish_non_exhaustive()
    }
}

/// A piece of store state that notifies the owning instance's subscribers
/// whenever it is written.
pub struct StateCell<V> {
    value: Rc<RefCell<V>>,
    listeners: Rc<ListenerSet<()>>,
}

impl<V: 'static> StateCell<V> {
    /// Get the current value.
    pub fn get(&self) -> V
    where
        V: Clone,
    {
        self.value.borrow().clone()
    }

    /// Set a new value and notify subscribers.
    pub fn set(&self, new_value: V) {
        *self.value.borrow_mut() = new_value;
        self.listeners.notify(&());
    }

    /// Update the value using a function.
    pub fn update(&self, f: impl FnOnce(&mut V)) {
        let mut value = self.value.borrow_mut();
        f(&mut *value);
        drop(value); // Release the borrow before notifying
        self.listeners.notify(&());
    }

    /// Read the value with a function without cloning.
    pub fn with<R>(&self, f: impl FnOnce(&V) -> R) -> R {
        let value = self.value.borrow();
        f(&*value)
    }

    /// Returns `true` if both handles point at the same state.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.value, &other.value)
    }
}

impl<V> Clone for StateCell<V> {
    fn clone(&self) -> Self {
        Self {
            value: Rc::clone(&self.value),
            listeners: Rc::clone(&self.listeners),
        }
    }
}

impl<V: fmt::Debug> fmt::Debug for StateCell<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("StateCell").field(&*self.value.borrow()).finish()
    }
}
