use std::cell::{Ref, RefCell};
use std::fmt;
use std::rc::Rc;

use serde_json::{Map, Value};

use super::listener::{Listener, ListenerSet};

/// A state record that can absorb partial updates.
///
/// `merge` performs a shallow merge: fields present in the partial replace
/// the corresponding fields of the record, everything else is kept.
pub trait State: Clone + 'static {
    /// The shape of a partial update.
    type Partial;

    /// Merge `partial` into `self`.
    fn merge(&mut self, partial: Self::Partial);
}

/// JSON objects merge by top-level key.
impl State for Map<String, Value> {
    type Partial = Map<String, Value>;

    fn merge(&mut self, partial: Self::Partial) {
        for (key, value) in partial {
            self.insert(key, value);
        }
    }
}

struct Inner<S> {
    state: RefCell<S>,
    listeners: ListenerSet<S>,
}

/// A shared state container with subscribe/notify semantics.
///
/// Cloning a container yields another handle to the same instance. Every
/// successful update merges into the canonical state and then synchronously
/// notifies listeners with the new state, in registration order.
///
/// # Examples
///
/// ```
/// use stowaway::Container;
/// use serde_json::{json, Map, Value};
///
/// let mut initial = Map::new();
/// initial.insert("count".into(), json!(0));
/// let counter: Container<Map<String, Value>> = Container::new(initial);
///
/// let mut patch = Map::new();
/// patch.insert("count".into(), json!(5));
/// counter.set_state(patch);
///
/// assert_eq!(counter.state()["count"], json!(5));
/// ```
pub struct Container<S: State> {
    inner: Rc<Inner<S>>,
}

impl<S: State> Container<S> {
    /// Create a new container with the given initial state.
    pub fn new(initial: S) -> Self {
        Self {
            inner: Rc::new(Inner {
                state: RefCell::new(initial),
                listeners: ListenerSet::new(),
            }),
        }
    }

    /// Get a clone of the current state.
    pub fn state(&self) -> S {
        self.inner.state.borrow().clone()
    }

    /// Borrow the current state without cloning it.
    pub fn read(&self) -> Ref<'_, S> {
        self.inner.state.borrow()
    }

    /// Merge a partial update and notify listeners.
    ///
    /// `None` leaves the state untouched and notifies nobody.
    pub fn set_state(&self, partial: impl Into<Option<S::Partial>>) {
        self.apply(partial.into());
    }

    /// Compute a partial update from the previous state, then merge it.
    ///
    /// `f` sees a snapshot, so it may itself write to this container.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&S) -> Option<S::Partial>,
    {
        let previous = self.state();
        let partial = f(&previous);
        self.apply(partial);
    }

    /// Like [`set_state`](Self::set_state), then run `callback`.
    ///
    /// The callback runs after listeners have been notified, or right away
    /// if the update was a no-op.
    pub fn set_state_and_then<C>(&self, partial: impl Into<Option<S::Partial>>, callback: C)
    where
        C: FnOnce(),
    {
        self.apply(partial.into());
        callback();
    }

    /// Like [`update`](Self::update), then run `callback`.
    pub fn update_and_then<F, C>(&self, f: F, callback: C)
    where
        F: FnOnce(&S) -> Option<S::Partial>,
        C: FnOnce(),
    {
        self.update(f);
        callback();
    }

    fn apply(&self, partial: Option<S::Partial>) {
        let Some(partial) = partial else {
            tracing::trace!("ignoring empty state update");
            return;
        };
        let next = {
            let mut state = self.inner.state.borrow_mut();
            state.merge(partial);
            state.clone()
        };
        // The borrow is released so listeners can read or update again.
        self.inner.listeners.notify(&next);
    }

    /// Subscribe to state changes. Subscribing the same listener twice is a no-op.
    pub fn subscribe(&self, listener: &Listener<S>) {
        if self.inner.listeners.subscribe(listener) {
            tracing::trace!(listeners = self.listener_count(), "container listener subscribed");
        }
    }

    /// Remove a listener.
    pub fn unsubscribe(&self, listener: &Listener<S>) {
        if self.inner.listeners.unsubscribe(listener) {
            tracing::trace!(listeners = self.listener_count(), "container listener unsubscribed");
        }
    }

    /// Number of currently registered listeners.
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.len()
    }

    /// A setter bound to this container.
    pub fn setter(&self) -> StateSetter<S> {
        StateSetter {
            container: self.clone(),
        }
    }

    /// Returns `true` if both handles point at the same container.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn key(&self) -> *const () {
        Rc::as_ptr(&self.inner) as *const ()
    }
}

impl<S: State> Clone for Container<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<S: State + fmt::Debug> fmt::Debug for Container<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("state", &*self.read())
            .field("listeners", &self.listener_count())
            .finish()
    }
}

/// The `set_state` half of a container, handed out by
/// [`use_container`](crate::use_container).
///
/// Setters for the same container compare equal, so they are safe to use
/// as effect dependencies.
pub struct StateSetter<S: State> {
    container: Container<S>,
}

impl<S: State> StateSetter<S> {
    /// See [`Container::set_state`].
    pub fn set(&self, partial: impl Into<Option<S::Partial>>) {
        self.container.set_state(partial);
    }

    /// See [`Container::update`].
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&S) -> Option<S::Partial>,
    {
        self.container.update(f);
    }
}

impl<S: State> Clone for StateSetter<S> {
    fn clone(&self) -> Self {
        Self {
            container: self.container.clone(),
        }
    }
}

impl<S: State> PartialEq for StateSetter<S> {
    fn eq(&self, other: &Self) -> bool {
        self.container.ptr_eq(&other.container)
    }
}

impl<S: State> fmt::Debug for StateSetter<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateSetter")
            .field("container", &self.container.key())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::Cell;

    #[derive(Clone, Debug, PartialEq)]
    struct AppState {
        count: i64,
        name: String,
    }

    #[derive(Default)]
    struct AppPatch {
        count: Option<i64>,
        name: Option<String>,
    }

    impl State for AppState {
        type Partial = AppPatch;

        fn merge(&mut self, partial: AppPatch) {
            if let Some(count) = partial.count {
                self.count = count;
            }
            if let Some(name) = partial.name {
                self.name = name;
            }
        }
    }

    fn app() -> Container<AppState> {
        Container::new(AppState {
            count: 0,
            name: "test".to_string(),
        })
    }

    fn counting_listener(calls: &Rc<Cell<usize>>) -> Listener<AppState> {
        let calls = Rc::clone(calls);
        Rc::new(move |_: &AppState| calls.set(calls.get() + 1))
    }

    #[test]
    fn set_state_merges_shallowly() {
        let store = app();

        store.set_state(AppPatch {
            count: Some(42),
            ..Default::default()
        });

        assert_eq!(
            store.state(),
            AppState {
                count: 42,
                name: "test".to_string(),
            }
        );
    }

    #[test]
    fn update_sees_previous_state() {
        let store = app();

        store.update(|state| {
            Some(AppPatch {
                count: Some(state.count + 10),
                ..Default::default()
            })
        });
        store.update(|state| {
            Some(AppPatch {
                count: Some(state.count + 10),
                ..Default::default()
            })
        });

        assert_eq!(store.state().count, 20);
    }

    #[test]
    fn updater_may_write_to_its_own_container() {
        let store = app();

        store.update(|state| {
            store.set_state(AppPatch {
                name: Some("renamed".to_string()),
                ..Default::default()
            });
            Some(AppPatch {
                count: Some(state.count + 1),
                ..Default::default()
            })
        });

        assert_eq!(
            store.state(),
            AppState {
                count: 1,
                name: "renamed".to_string(),
            }
        );
    }

    #[test]
    fn empty_update_does_not_notify() {
        let store = app();
        let calls = Rc::new(Cell::new(0));
        store.subscribe(&counting_listener(&calls));

        store.set_state(None::<AppPatch>);
        store.update(|_| None);

        assert_eq!(calls.get(), 0);
        assert_eq!(store.state().count, 0);
    }

    #[test]
    fn listeners_receive_new_state_synchronously() {
        let store = app();
        let seen = Rc::new(Cell::new(-1));
        let listener: Listener<AppState> = {
            let seen = Rc::clone(&seen);
            Rc::new(move |state: &AppState| seen.set(state.count))
        };
        store.subscribe(&listener);

        store.set_state(AppPatch {
            count: Some(7),
            ..Default::default()
        });

        assert_eq!(seen.get(), 7);
    }

    #[test]
    fn subscribe_is_idempotent() {
        let store = app();
        let calls = Rc::new(Cell::new(0));
        let listener = counting_listener(&calls);

        store.subscribe(&listener);
        store.subscribe(&listener);
        assert_eq!(store.listener_count(), 1);

        store.set_state(AppPatch::default());
        assert_eq!(calls.get(), 1);

        store.unsubscribe(&listener);
        assert_eq!(store.listener_count(), 0);
    }

    #[test]
    fn callback_runs_after_notification() {
        let store = app();
        let order = Rc::new(RefCell::new(Vec::new()));
        let listener: Listener<AppState> = {
            let order = Rc::clone(&order);
            Rc::new(move |_: &AppState| order.borrow_mut().push("listener"))
        };
        store.subscribe(&listener);

        store.set_state_and_then(AppPatch::default(), || order.borrow_mut().push("callback"));
        store.update_and_then(|_| None, || order.borrow_mut().push("noop callback"));

        assert_eq!(*order.borrow(), vec!["listener", "callback", "noop callback"]);
    }

    #[test]
    fn listener_may_update_reentrantly() {
        let store = app();
        let listener: Listener<AppState> = {
            let store = store.clone();
            Rc::new(move |state: &AppState| {
                if state.count == 1 {
                    store.set_state(AppPatch {
                        name: Some("reached one".to_string()),
                        ..Default::default()
                    });
                }
            })
        };
        store.subscribe(&listener);

        store.set_state(AppPatch {
            count: Some(1),
            ..Default::default()
        });

        assert_eq!(store.state().name, "reached one");
    }

    #[test]
    fn json_records_merge_by_key() {
        let mut initial = Map::new();
        initial.insert("count".into(), json!(1));
        initial.insert("label".into(), json!("odds"));
        let store = Container::new(initial);

        let mut patch = Map::new();
        patch.insert("count".into(), json!(3));
        store.set_state(patch);

        assert_eq!(store.state()["count"], json!(3));
        assert_eq!(store.state()["label"], json!("odds"));
    }

    #[test]
    fn setters_compare_by_container() {
        let store = app();
        assert_eq!(store.setter(), store.setter());
        assert_ne!(store.setter(), app().setter());
    }
}
