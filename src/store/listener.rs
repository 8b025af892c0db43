use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// A re-render trigger registered against a store.
///
/// Listeners are compared by reference: registering the same `Rc` twice is a
/// no-op, while two closures with identical bodies are distinct listeners.
pub type Listener<A> = Rc<dyn Fn(&A)>;

fn same<A>(a: &Listener<A>, b: &Listener<A>) -> bool {
    Rc::as_ptr(a) as *const () == Rc::as_ptr(b) as *const ()
}

/// Ordered set of listeners, notified in registration order.
pub(crate) struct ListenerSet<A> {
    listeners: RefCell<Vec<Listener<A>>>,
}

impl<A> ListenerSet<A> {
    pub(crate) fn new() -> Self {
        Self {
            listeners: RefCell::new(Vec::new()),
        }
    }

    /// Register a listener. Returns `false` if it was already registered.
    pub(crate) fn subscribe(&self, listener: &Listener<A>) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        if listeners.iter().any(|l| same(l, listener)) {
            return false;
        }
        listeners.push(Rc::clone(listener));
        true
    }

    /// Remove a listener. Returns `false` if it wasn't registered.
    pub(crate) fn unsubscribe(&self, listener: &Listener<A>) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|l| !same(l, listener));
        listeners.len() != before
    }

    fn contains(&self, listener: &Listener<A>) -> bool {
        self.listeners.borrow().iter().any(|l| same(l, listener))
    }

    /// Call every listener with `value`.
    ///
    /// Listeners may subscribe or unsubscribe while being notified. One that
    /// is removed mid-round is not called afterwards.
    pub(crate) fn notify(&self, value: &A) {
        let snapshot = self.listeners.borrow().clone();
        tracing::trace!(listeners = snapshot.len(), "notifying store listeners");
        for listener in &snapshot {
            if self.contains(listener) {
                listener(value);
            }
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.listeners.borrow().len()
    }

    pub(crate) fn clear(&self) {
        self.listeners.borrow_mut().clear();
    }
}

impl<A> fmt::Debug for ListenerSet<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerSet").field("len", &self.len()).finish()
    }
}
