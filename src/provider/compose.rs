use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use crate::host::{Children, Cleanup, Element};
use crate::runtime::{Channel, DefinitionId, StoreRegistry};
use crate::store::{Instance, StoreDefinition};
use crate::Error;

/// Published on a store's channel when its factory produced nothing.
struct Uninitialized;

/// Ordered record of the instances a provider published for its subtree.
///
/// Entries appear in definition order as the provider mounts and disappear
/// when it unmounts. An entry without an instance marks a definition whose
/// factory produced nothing.
///
/// The map also carries the registry that was current when the provider
/// mounted. Channels for the subtree resolve through it for the whole mount.
pub struct PublishedMap {
    registry: Arc<StoreRegistry>,
    entries: RefCell<Vec<(DefinitionId, Option<Rc<dyn Any>>)>>,
}

impl PublishedMap {
    fn new(registry: Arc<StoreRegistry>) -> Self {
        Self {
            registry,
            entries: RefCell::new(Vec::new()),
        }
    }

    /// The registry the provider resolves its channels against.
    pub fn registry(&self) -> &Arc<StoreRegistry> {
        &self.registry
    }

    fn insert(&self, id: DefinitionId, instance: Option<Rc<dyn Any>>) {
        let mut entries = self.entries.borrow_mut();
        match entries.iter_mut().find(|(entry, _)| *entry == id) {
            Some(entry) => entry.1 = instance,
            None => entries.push((id, instance)),
        }
    }

    fn remove(&self, id: DefinitionId) {
        self.entries.borrow_mut().retain(|(entry, _)| *entry != id);
    }

    fn retain(&self, stores: &[AnyDefinition]) {
        self.entries
            .borrow_mut()
            .retain(|(entry, _)| stores.iter().any(|store| store.id() == *entry));
    }

    /// Number of published definitions, uninitialized ones included.
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    /// Returns `true` if nothing has been published yet.
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Published definitions, outermost first.
    pub fn definitions(&self) -> Vec<DefinitionId> {
        self.entries.borrow().iter().map(|(id, _)| *id).collect()
    }

    /// Returns `true` if the provider has an entry for `definition`.
    pub fn contains<T>(&self, definition: &StoreDefinition<T>) -> bool
    where
        T: 'static,
    {
        self.entries.borrow().iter().any(|(id, _)| *id == definition.id())
    }

    /// The instance published for `definition`, if it initialized.
    pub fn get<T: 'static>(&self, definition: &StoreDefinition<T>) -> Option<Rc<Instance<T>>> {
        self.entries
            .borrow()
            .iter()
            .find(|(id, _)| *id == definition.id())
            .and_then(|(_, instance)| instance.clone())
            .and_then(|instance| instance.downcast::<Instance<T>>().ok())
    }
}

impl fmt::Debug for PublishedMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(
                self.entries
                    .borrow()
                    .iter()
                    .map(|(id, instance)| (id, instance.is_some())),
            )
            .finish()
    }
}

trait Mountable {
    fn id(&self) -> DefinitionId;

    fn container(&self, channel: Channel, published: Rc<PublishedMap>, children: Children) -> Element;
}

impl<T: 'static> Mountable for StoreDefinition<T> {
    fn id(&self) -> DefinitionId {
        StoreDefinition::id(self)
    }

    fn container(&self, channel: Channel, published: Rc<PublishedMap>, children: Children) -> Element {
        instance_container(self.clone(), channel, published, children)
    }
}

/// A store definition with its record type erased, so definitions of
/// different stores can be handed to one [`Provider`].
#[derive(Clone)]
pub struct AnyDefinition(Rc<dyn Mountable>);

impl AnyDefinition {
    /// Identity of the wrapped definition.
    pub fn id(&self) -> DefinitionId {
        self.0.id()
    }
}

impl<T: 'static> From<StoreDefinition<T>> for AnyDefinition {
    fn from(definition: StoreDefinition<T>) -> Self {
        AnyDefinition(Rc::new(definition))
    }
}

impl<T: 'static> From<&StoreDefinition<T>> for AnyDefinition {
    fn from(definition: &StoreDefinition<T>) -> Self {
        AnyDefinition(Rc::new(definition.clone()))
    }
}

impl fmt::Debug for AnyDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AnyDefinition").field(&self.id()).finish()
    }
}

/// Owns one live instance for the lifetime of its mount and publishes it on
/// the definition's channel.
fn instance_container<T: 'static>(
    definition: StoreDefinition<T>,
    channel: Channel,
    published: Rc<PublishedMap>,
    children: Children,
) -> Element {
    Element::new(move |cx| {
        let id = definition.id();
        let instance = cx.use_memo(id, || {
            let instance = definition.instantiate();
            published.insert(id, instance.clone().map(|instance| instance as Rc<dyn Any>));
            instance
        })?;

        match &instance {
            Some(instance) => cx.provide(channel, Rc::clone(instance)),
            None => cx.provide(channel, Rc::new(Uninitialized)),
        }

        let key = instance.as_ref().map(Rc::as_ptr);
        let published = Rc::clone(&published);
        cx.use_effect(key, move || {
            Some(Box::new(move || {
                if let Some(instance) = instance {
                    instance.release();
                }
                published.remove(id);
            }) as Cleanup)
        })?;

        Ok(children.clone())
    })
}

/// Composition root: instantiates a list of store definitions once per mount
/// and exposes the instances to its children.
///
/// Definitions are nested in list order, the first one outermost. Each has
/// its own channel, so the order only matters for the order instances are
/// created in. A provider without definitions fails to render with
/// [`Error::Configuration`].
///
/// # Examples
///
/// ```
/// use stowaway::{use_store, Element, Provider, StoreDefinition, Tree};
///
/// let greeting = StoreDefinition::new(|cx| cx.use_state(String::from("hello")));
///
/// let reader = Element::new({
///     let greeting = greeting.clone();
///     move |cx| {
///         let store = use_store(cx, &greeting)?;
///         assert_eq!(store.get(), "hello");
///         Ok(vec![])
///     }
/// });
///
/// let app = Provider::new().store(&greeting).child(reader);
/// let _tree = Tree::mount(app.into()).unwrap();
/// ```
#[derive(Clone, Default)]
pub struct Provider {
    stores: Vec<AnyDefinition>,
    children: Children,
}

impl Provider {
    /// Create a provider with no definitions and no children.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one store definition.
    pub fn store(mut self, definition: impl Into<AnyDefinition>) -> Self {
        self.stores.push(definition.into());
        self
    }

    /// Add several store definitions, in order.
    pub fn stores<I>(mut self, definitions: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<AnyDefinition>,
    {
        self.stores.extend(definitions.into_iter().map(Into::into));
        self
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
        compose(self.stores, self.children)
    }
}

impl From<Provider> for Element {
    fn from(provider: Provider) -> Self {
        provider.into_element()
    }
}

impl fmt::Debug for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provider")
            .field("stores", &self.stores)
            .field("children", &self.children.len())
            .finish()
    }
}

/// Build a composition root for `definitions` around `children`.
pub fn compose(definitions: Vec<AnyDefinition>, children: Children) -> Element {
    Element::new(move |cx| {
        if definitions.is_empty() {
            return Err(Error::Configuration);
        }

        let published = cx.use_ref(|| Rc::new(PublishedMap::new(StoreRegistry::current())))?;
        published.retain(&definitions);
        cx.provide(Channel::PROVIDER, Rc::clone(&published));

        let mut subtree = children.clone();
        for definition in definitions.iter().rev() {
            let channel = published.registry().channel(definition.id());
            subtree = vec![definition.0.container(channel, Rc::clone(&published), subtree)];
        }
        Ok(subtree)
    })
}
