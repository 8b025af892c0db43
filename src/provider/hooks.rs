use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use super::compose::PublishedMap;
use crate::host::{Children, Cleanup, Cx, Element};
use crate::runtime::Channel;
use crate::store::{Container, Instance, Listener, State, StateSetter, StoreDefinition};
use crate::{Error, Result};

/// Unsubscribes a listener when the hook slot holding it is dropped.
///
/// Slots drop when their component unmounts, including the teardown after a
/// failed render, and when they are re-keyed to another store.
struct Subscription {
    unsubscribe: Option<Cleanup>,
}

impl Subscription {
    fn new(unsubscribe: impl FnOnce() + 'static) -> Rc<Self> {
        Rc::new(Self {
            unsubscribe: Some(Box::new(unsubscribe)),
        })
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

/// The published map of the nearest enclosing [`Provider`](crate::Provider).
pub fn use_published(cx: &mut Cx<'_>) -> Result<Rc<PublishedMap>> {
    cx.lookup_as::<PublishedMap>(Channel::PROVIDER)
        .ok_or(Error::MissingProvider)
}

/// Read a store instance and re-render this component whenever it changes.
///
/// Resolves the instance the nearest enclosing provider published for
/// `definition`. Fails with [`Error::MissingProvider`] outside any provider
/// and with [`Error::UninitializedStore`] when the provider has no usable
/// instance for this exact definition.
///
/// The returned handle is the same `Rc` on every render of one provider
/// mount, so it and anything derived from it are stable effect dependencies.
///
/// Channels resolve through the registry the provider mounted with, so a
/// tree mounted inside [`StoreRegistry::scope`](crate::StoreRegistry::scope)
/// keeps working after the scope returns.
pub fn use_store<T: 'static>(cx: &mut Cx<'_>, definition: &StoreDefinition<T>) -> Result<Rc<Instance<T>>> {
    let channel = use_published(cx)?.registry().channel_for(definition);
    let instance = cx
        .lookup_as::<Instance<T>>(channel)
        .ok_or(Error::UninitializedStore)?;

    let trigger = cx.rerender_trigger();
    let listener = cx.use_ref(move || -> Listener<()> { Rc::new(move |_: &()| trigger.schedule()) })?;
    cx.use_memo(Rc::as_ptr(&instance), || {
        instance.subscribe(&listener);
        let instance = Rc::clone(&instance);
        Subscription::new(move || instance.unsubscribe(&listener))
    })?;

    Ok(instance)
}

/// Read a container and re-render this component whenever it changes.
///
/// Uses `container` if given, else the one published by the nearest
/// [`ContainerProvider`]; fails with [`Error::MissingStore`] if neither
/// exists. Returns the component's copy of the state, a setter and the
/// container itself.
///
/// The component subscribes on its first render and unsubscribes when it
/// unmounts, even if the render that mounted it failed. If the resolved
/// container changes between renders, the component moves its subscription
/// to the new one and starts again from its current state.
pub fn use_container<S: State>(
    cx: &mut Cx<'_>,
    container: Option<&Container<S>>,
) -> Result<(S, StateSetter<S>, Container<S>)> {
    let container = match container {
        Some(container) => container.clone(),
        None => cx
            .lookup_as::<Container<S>>(Channel::DEFAULT)
            .map(|container| (*container).clone())
            .ok_or(Error::MissingStore)?,
    };

    let local = cx.use_memo(container.key(), || Rc::new(RefCell::new(container.state())))?;
    let trigger = cx.rerender_trigger();
    cx.use_memo(container.key(), || {
        let listener: Listener<S> = {
            let local = Rc::clone(&local);
            Rc::new(move |state: &S| {
                *local.borrow_mut() = state.clone();
                trigger.schedule();
            })
        };
        container.subscribe(&listener);
        let container = container.clone();
        Subscription::new(move || container.unsubscribe(&listener))
    })?;

    let state = local.borrow().clone();
    Ok((state, container.setter(), container))
}

/// Publishes one container on the default channel for its children.
pub struct ContainerProvider<S: State> {
    container: Container<S>,
    children: Children,
}

impl<S: State> ContainerProvider<S> {
    /// Create a provider for `container`.
    pub fn new(container: Container<S>) -> Self {
        Self {
            container,
            children: Vec::new(),
        }
    }

    /// Add a child element.
    pub fn child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    /// Add several child elements.
    pub fn children(mut self, children: impl IntoIterator<Item = Element>) -> Self {
        self.children.extend(children);
        self
    }

    /// Turn the provider into a mountable element.
    pub fn into_element(self) -> Element {
        let ContainerProvider { container, children } = self;
        Element::new(move |cx| {
            cx.provide(Channel::DEFAULT, Rc::new(container.clone()));
            Ok(children.clone())
        })
    }
}

impl<S: State> From<ContainerProvider<S>> for Element {
    fn from(provider: ContainerProvider<S>) -> Self {
        provider.into_element()
    }
}

impl<S: State> fmt::Debug for ContainerProvider<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerProvider")
            .field("listeners", &self.container.listener_count())
            .field("children", &self.children.len())
            .finish()
    }
}
