use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use super::tree::{Node, Scheduler};
use crate::runtime::{Channel, Env};
use crate::{Error, Result};

/// The elements a component renders.
pub type Children = Vec<Element>;

/// Teardown returned by an effect.
pub type Cleanup = Box<dyn FnOnce()>;

type RenderFn = dyn Fn(&mut Cx<'_>) -> Result<Children>;

/// A function component.
///
/// Two elements are the same kind of component when they were built from the
/// same closure expression, so re-rendering a parent keeps a child's mounted
/// state as long as the child sits at the same position.
///
/// # Examples
///
/// ```
/// use stowaway::{Element, Tree};
///
/// let leaf = Element::new(|_cx| Ok(vec![]));
/// let root = Element::new(move |_cx| Ok(vec![leaf.clone()]));
///
/// let tree = Tree::mount(root).unwrap();
/// assert!(tree.is_mounted());
/// ```
#[derive(Clone)]
pub struct Element {
    kind: TypeId,
    name: &'static str,
    render: Rc<RenderFn>,
}

impl Element {
    /// Create an element from a render function.
    pub fn new<F>(render: F) -> Self
    where
        F: Fn(&mut Cx<'_>) -> Result<Children> + 'static,
    {
        Self {
            kind: TypeId::of::<F>(),
            name: std::any::type_name::<F>(),
            render: Rc::new(render),
        }
    }

    /// An element that renders the given children unchanged.
    pub fn fragment(children: Children) -> Self {
        Self::new(move |_| Ok(children.clone()))
    }

    pub(crate) fn same_kind(&self, other: &Element) -> bool {
        self.kind == other.kind
    }

    pub(crate) fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn render(&self, cx: &mut Cx<'_>) -> Result<Children> {
        (self.render)(cx)
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Element").field(&self.name).finish()
    }
}

struct MemoSlot<D, T> {
    deps: D,
    value: T,
}

#[derive(Default)]
pub(crate) struct EffectSlot {
    deps: Option<Box<dyn Any>>,
    cleanup: Option<Cleanup>,
}

pub(crate) type EffectCell = Rc<RefCell<EffectSlot>>;

/// An effect queued during render, run at commit.
pub(crate) struct PendingEffect {
    cell: EffectCell,
    deps: Box<dyn Any>,
    run: Box<dyn FnOnce() -> Option<Cleanup>>,
}

impl PendingEffect {
    pub(crate) fn commit(self) {
        let previous = {
            let mut slot = self.cell.borrow_mut();
            slot.deps = Some(self.deps);
            slot.cleanup.take()
        };
        if let Some(cleanup) = previous {
            cleanup();
        }
        let cleanup = (self.run)();
        self.cell.borrow_mut().cleanup = cleanup;
    }
}

/// Run the cleanup stored in a hook slot, if the slot is an effect.
pub(crate) fn run_cleanup(slot: &dyn Any) {
    if let Some(cell) = slot.downcast_ref::<EffectCell>() {
        let cleanup = cell.borrow_mut().cleanup.take();
        if let Some(cleanup) = cleanup {
            cleanup();
        }
    }
}

/// Schedules a re-render of the component it was taken from.
///
/// Triggers for an unmounted component do nothing.
#[derive(Clone)]
pub struct RerenderTrigger {
    node: Weak<RefCell<Node>>,
    scheduler: Scheduler,
}

impl RerenderTrigger {
    /// Mark the component dirty; it re-renders on the next flush.
    pub fn schedule(&self) {
        self.scheduler.schedule(self.node.clone());
    }
}

impl fmt::Debug for RerenderTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RerenderTrigger").finish_non_exhaustive()
    }
}

/// Render context for one component render.
///
/// Hook slots are positional: a component must call its hooks in the same
/// order on every render.
pub struct Cx<'a> {
    hooks: &'a mut Vec<Box<dyn Any>>,
    cursor: usize,
    env: Env,
    child_env: Env,
    trigger: RerenderTrigger,
    effects: &'a mut Vec<PendingEffect>,
    name: &'static str,
}

impl<'a> Cx<'a> {
    pub(crate) fn new(
        hooks: &'a mut Vec<Box<dyn Any>>,
        env: Env,
        node: Weak<RefCell<Node>>,
        scheduler: Scheduler,
        effects: &'a mut Vec<PendingEffect>,
        name: &'static str,
    ) -> Self {
        Self {
            hooks,
            cursor: 0,
            child_env: env.clone(),
            env,
            trigger: RerenderTrigger { node, scheduler },
            effects,
            name,
        }
    }

    /// The environment this component's children inherit.
    pub(crate) fn into_child_env(self) -> Env {
        self.child_env
    }

    fn slot<T: 'static>(&mut self, init: impl FnOnce() -> T) -> Result<&mut T> {
        let index = self.cursor;
        self.cursor += 1;
        if index == self.hooks.len() {
            self.hooks.push(Box::new(init()));
        }
        self.hooks[index]
            .downcast_mut::<T>()
            .ok_or(Error::HookOrder { index })
    }

    /// Memoize a value until `deps` change.
    ///
    /// `init` runs on mount and again whenever `deps` differ from the
    /// previous render's; otherwise the stored value is returned.
    pub fn use_memo<D, T>(&mut self, deps: D, init: impl FnOnce() -> T) -> Result<T>
    where
        D: PartialEq + 'static,
        T: Clone + 'static,
    {
        let slot = self.slot(|| None::<MemoSlot<D, T>>)?;
        if let Some(memo) = slot.as_ref().filter(|memo| memo.deps == deps) {
            return Ok(memo.value.clone());
        }
        let value = init();
        *slot = Some(MemoSlot {
            deps,
            value: value.clone(),
        });
        Ok(value)
    }

    /// A value created on mount and kept until unmount.
    pub fn use_ref<T>(&mut self, init: impl FnOnce() -> T) -> Result<T>
    where
        T: Clone + 'static,
    {
        self.use_memo((), init)
    }

    /// Run `effect` after commit whenever `deps` change.
    ///
    /// The cleanup returned by the previous run executes first; the last
    /// cleanup executes when the component unmounts.
    pub fn use_effect<D, F>(&mut self, deps: D, effect: F) -> Result<()>
    where
        D: PartialEq + 'static,
        F: FnOnce() -> Option<Cleanup> + 'static,
    {
        let cell = Rc::clone(self.slot(|| EffectCell::default())?);
        let changed = cell
            .borrow()
            .deps
            .as_ref()
            .and_then(|previous| previous.downcast_ref::<D>())
            .map_or(true, |previous| *previous != deps);
        if changed {
            self.effects.push(PendingEffect {
                cell,
                deps: Box::new(deps),
                run: Box::new(effect),
            });
        }
        Ok(())
    }

    /// Publish `value` on `channel` for this component's descendants.
    pub fn provide<T: 'static>(&mut self, channel: Channel, value: Rc<T>) {
        self.child_env = self.child_env.with(channel, value);
    }

    /// Resolve the nearest publication on `channel` above this component.
    pub fn lookup(&self, channel: Channel) -> Option<Rc<dyn Any>> {
        self.env.lookup(channel)
    }

    /// Like [`lookup`](Self::lookup), downcast to `T`.
    ///
    /// Returns `None` both when nothing is published and when the nearest
    /// publication has another type.
    pub fn lookup_as<T: 'static>(&self, channel: Channel) -> Option<Rc<T>> {
        self.lookup(channel).and_then(|value| value.downcast::<T>().ok())
    }

    /// A handle that schedules this component for re-render.
    pub fn rerender_trigger(&self) -> RerenderTrigger {
        self.trigger.clone()
    }

    /// Type name of the component being rendered, for diagnostics.
    pub fn component_name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Debug for Cx<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cx")
            .field("component", &self.name)
            .field("hooks", &self.hooks.len())
            .field("env", &self.env)
            .finish()
    }
}
