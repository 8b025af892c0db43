use std::any::Any;
use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::rc::{Rc, Weak};

use super::cx::{run_cleanup, Children, Cx, Element, PendingEffect};
use crate::runtime::Env;
use crate::{Error, Result};

/// Upper bound on flush passes before giving up on a component that keeps
/// scheduling itself.
const MAX_FLUSH_PASSES: usize = 64;

pub(crate) type NodeRef = Rc<RefCell<Node>>;

/// A mounted component.
pub(crate) struct Node {
    element: Element,
    env: Env,
    hooks: Vec<Box<dyn Any>>,
    children: Vec<NodeRef>,
    depth: usize,
    mounted: bool,
    rendered_in: u64,
}

impl Node {
    fn new(element: Element, env: Env, depth: usize) -> NodeRef {
        Rc::new(RefCell::new(Node {
            element,
            env,
            hooks: Vec::new(),
            children: Vec::new(),
            depth,
            mounted: true,
            rendered_in: 0,
        }))
    }
}

/// Queue of components waiting to re-render.
#[derive(Clone, Default)]
pub(crate) struct Scheduler {
    queue: Rc<RefCell<Vec<Weak<RefCell<Node>>>>>,
}

impl Scheduler {
    pub(crate) fn schedule(&self, node: Weak<RefCell<Node>>) {
        self.queue.borrow_mut().push(node);
    }

    /// Take every scheduled component that is still mounted, parents first,
    /// each at most once.
    fn drain(&self) -> Vec<NodeRef> {
        let queued = std::mem::take(&mut *self.queue.borrow_mut());
        let mut seen = HashSet::new();
        let mut dirty: Vec<NodeRef> = queued
            .iter()
            .filter_map(Weak::upgrade)
            .filter(|node| node.borrow().mounted)
            .filter(|node| seen.insert(Rc::as_ptr(node)))
            .collect();
        dirty.sort_by_key(|node| node.borrow().depth);
        dirty
    }

    fn is_empty(&self) -> bool {
        self.queue.borrow().is_empty()
    }
}

/// One render pass: renders components and collects their effects.
struct Pass {
    scheduler: Scheduler,
    generation: u64,
    effects: Vec<PendingEffect>,
    rendered: usize,
}

impl Pass {
    fn new(scheduler: Scheduler, generation: u64) -> Self {
        Self {
            scheduler,
            generation,
            effects: Vec::new(),
            rendered: 0,
        }
    }

    fn render_node(&mut self, node: &NodeRef) -> Result<()> {
        let (element, env, mut hooks) = {
            let mut n = node.borrow_mut();
            n.rendered_in = self.generation;
            (n.element.clone(), n.env.clone(), std::mem::take(&mut n.hooks))
        };

        let mut cx = Cx::new(
            &mut hooks,
            env,
            Rc::downgrade(node),
            self.scheduler.clone(),
            &mut self.effects,
            element.name(),
        );
        let result = element.render(&mut cx);
        let child_env = cx.into_child_env();
        node.borrow_mut().hooks = hooks;
        self.rendered += 1;

        let children = result?;
        self.reconcile(node, children, child_env)
    }

    /// Match `elements` against the node's current children by position and
    /// component kind, then render them.
    fn reconcile(&mut self, parent: &NodeRef, elements: Children, env: Env) -> Result<()> {
        let (previous, depth) = {
            let mut p = parent.borrow_mut();
            (std::mem::take(&mut p.children), p.depth + 1)
        };
        let mut previous = previous.into_iter();

        for element in elements {
            let node = match previous.next() {
                Some(existing) if existing.borrow().element.same_kind(&element) => {
                    {
                        let mut n = existing.borrow_mut();
                        n.element = element;
                        n.env = env.clone();
                    }
                    existing
                }
                Some(stale) => {
                    unmount(&stale);
                    mount_node(element, env.clone(), depth)
                }
                None => mount_node(element, env.clone(), depth),
            };
            parent.borrow_mut().children.push(Rc::clone(&node));

            if let Err(err) = self.render_node(&node) {
                previous.for_each(|stale| unmount(&stale));
                return Err(err);
            }
        }

        for stale in previous {
            unmount(&stale);
        }
        Ok(())
    }

    fn commit(self) -> usize {
        for effect in self.effects {
            effect.commit();
        }
        self.rendered
    }
}

fn mount_node(element: Element, env: Env, depth: usize) -> NodeRef {
    tracing::debug!(component = element.name(), depth, "mounting component");
    Node::new(element, env, depth)
}

/// Unmount a node: descendants first, then this node's effect cleanups in
/// hook order. Dropping the hooks releases anything memoized on mount.
fn unmount(node: &NodeRef) {
    let (children, hooks, name) = {
        let mut n = node.borrow_mut();
        n.mounted = false;
        (
            std::mem::take(&mut n.children),
            std::mem::take(&mut n.hooks),
            n.element.name(),
        )
    };
    for child in &children {
        unmount(child);
    }
    for hook in &hooks {
        run_cleanup(hook.as_ref());
    }
    drop(hooks);
    tracing::debug!(component = name, "unmounted component");
}

/// A mounted component tree.
///
/// Render errors propagate out of [`mount`](Self::mount),
/// [`render`](Self::render), [`act`](Self::act) and [`flush`](Self::flush);
/// the tree is torn down before the error is returned. Dropping a tree
/// unmounts it.
///
/// # Examples
///
/// ```
/// use std::cell::Cell;
/// use std::rc::Rc;
/// use stowaway::{Element, Tree};
///
/// let renders = Rc::new(Cell::new(0));
/// let trigger = Rc::new(Cell::new(None));
///
/// let root = Element::new({
///     let renders = renders.clone();
///     let trigger = trigger.clone();
///     move |cx| {
///         renders.set(renders.get() + 1);
///         trigger.set(Some(cx.rerender_trigger()));
///         Ok(vec![])
///     }
/// });
///
/// let mut tree = Tree::mount(root).unwrap();
/// tree.act(|| {
///     if let Some(trigger) = trigger.take() {
///         trigger.schedule();
///     }
/// })
/// .unwrap();
///
/// assert_eq!(renders.get(), 2);
/// ```
pub struct Tree {
    root: NodeRef,
    scheduler: Scheduler,
    generation: u64,
}

impl Tree {
    /// Mount `element` as the root component and commit the first render.
    pub fn mount(element: Element) -> Result<Self> {
        let mut tree = Tree {
            root: Node::new(Element::fragment(Vec::new()), Env::default(), 0),
            scheduler: Scheduler::default(),
            generation: 0,
        };
        tree.render(element)?;
        Ok(tree)
    }

    /// Render a new root element.
    ///
    /// If it is the same kind of component as the current root, the root is
    /// re-rendered with its state kept; otherwise the old tree is replaced.
    pub fn render(&mut self, element: Element) -> Result<()> {
        self.generation += 1;
        let mut pass = Pass::new(self.scheduler.clone(), self.generation);
        let result = pass.reconcile(&self.root, vec![element], Env::default());
        self.finish(pass, result).map(|_| ())
    }

    /// Re-render the whole tree from the root.
    pub fn rerender(&mut self) -> Result<()> {
        let element = self.root.borrow().children.first().map(|child| child.borrow().element.clone());
        match element {
            Some(element) => self.render(element),
            None => Ok(()),
        }
    }

    /// Run an event handler, then flush the re-renders it scheduled.
    pub fn act<R>(&mut self, f: impl FnOnce() -> R) -> Result<R> {
        let value = f();
        self.flush()?;
        Ok(value)
    }

    /// Re-render every scheduled component. Returns how many components
    /// rendered, descendants included.
    ///
    /// Fails with [`Error::RenderLoop`] if components are still scheduled
    /// after the pass limit. The tree stays mounted and the leftover
    /// re-renders stay queued for the next flush.
    pub fn flush(&mut self) -> Result<usize> {
        let mut rendered = 0;
        for _ in 0..MAX_FLUSH_PASSES {
            let dirty = self.scheduler.drain();
            if dirty.is_empty() {
                return Ok(rendered);
            }

            self.generation += 1;
            let generation = self.generation;
            let mut pass = Pass::new(self.scheduler.clone(), generation);
            let mut result = Ok(());
            for node in &dirty {
                let already_rendered = {
                    let n = node.borrow();
                    !n.mounted || n.rendered_in == generation
                };
                if already_rendered {
                    continue;
                }
                result = pass.render_node(node);
                if result.is_err() {
                    break;
                }
            }
            rendered += self.finish(pass, result)?;
        }

        if !self.scheduler.is_empty() {
            tracing::warn!(passes = MAX_FLUSH_PASSES, "components kept scheduling re-renders; giving up");
            return Err(Error::RenderLoop {
                passes: MAX_FLUSH_PASSES,
            });
        }
        Ok(rendered)
    }

    fn finish(&mut self, pass: Pass, result: Result<()>) -> Result<usize> {
        match result {
            Ok(()) => Ok(pass.commit()),
            Err(err) => {
                tracing::debug!(error = %err, "render failed, tearing down tree");
                drop(pass);
                self.unmount();
                Err(err)
            }
        }
    }

    /// Unmount every component.
    pub fn unmount(&mut self) {
        let children = std::mem::take(&mut self.root.borrow_mut().children);
        for child in &children {
            unmount(child);
        }
    }

    /// Returns `true` while a root component is mounted.
    pub fn is_mounted(&self) -> bool {
        !self.root.borrow().children.is_empty()
    }
}

impl Drop for Tree {
    fn drop(&mut self) {
        self.unmount();
    }
}

impl fmt::Debug for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tree")
            .field("mounted", &self.is_mounted())
            .field("generation", &self.generation)
            .finish()
    }
}
