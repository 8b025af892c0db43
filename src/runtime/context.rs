use std::any::Any;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

/// A propagation channel: a named slot a subtree's published value lives in.
///
/// Channels carry no state. A component publishes a value on a channel for
/// its children, and descendants resolve the nearest publication on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Channel(u64);

impl Channel {
    /// Channel a [`ContainerProvider`](crate::ContainerProvider) publishes on.
    pub const DEFAULT: Channel = Channel(0);

    /// Channel a [`Provider`](crate::Provider) publishes its published map on.
    pub(crate) const PROVIDER: Channel = Channel(1);

    /// Allocate a fresh channel.
    ///
    /// Ids come from one process-wide counter so channels handed out by
    /// different registries never alias each other.
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(2);
        Channel(NEXT.fetch_add(1, Ordering::SeqCst))
    }

    /// Get the channel's unique ID.
    pub fn id(&self) -> u64 {
        self.0
    }
}

struct Frame {
    channel: Channel,
    value: Rc<dyn Any>,
    parent: Option<Rc<Frame>>,
}

/// Scope stack of published values, passed explicitly down the tree.
///
/// Each frame shadows earlier frames on the same channel. Extending an
/// environment never touches the parent's view, so siblings can't see
/// each other's publications.
#[derive(Clone, Default)]
pub(crate) struct Env {
    head: Option<Rc<Frame>>,
}

impl Env {
    /// Return a child environment with `value` published on `channel`.
    pub(crate) fn with(&self, channel: Channel, value: Rc<dyn Any>) -> Env {
        Env {
            head: Some(Rc::new(Frame {
                channel,
                value,
                parent: self.head.clone(),
            })),
        }
    }

    /// Resolve the nearest enclosing publication on `channel`.
    pub(crate) fn lookup(&self, channel: Channel) -> Option<Rc<dyn Any>> {
        let mut frame = self.head.as_ref();
        while let Some(current) = frame {
            if current.channel == channel {
                return Some(Rc::clone(&current.value));
            }
            frame = current.parent.as_ref();
        }
        None
    }
}

impl fmt::Debug for Env {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut list = f.debug_list();
        let mut frame = self.head.as_ref();
        while let Some(current) = frame {
            list.entry(&current.channel);
            frame = current.parent.as_ref();
        }
        list.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_resolves_nearest_publication() {
        let channel = Channel::next();
        let outer = Env::default().with(channel, Rc::new(1_i32));
        let inner = outer.with(channel, Rc::new(2_i32));

        let value = inner.lookup(channel).and_then(|v| v.downcast::<i32>().ok());
        assert_eq!(value.as_deref(), Some(&2));

        let value = outer.lookup(channel).and_then(|v| v.downcast::<i32>().ok());
        assert_eq!(value.as_deref(), Some(&1));
        assert_eq!(format!("{inner:?}"), format!("[{channel:?}, {channel:?}]"));
    }

    #[test]
    fn unrelated_channels_do_not_resolve() {
        let published = Channel::next();
        let other = Channel::next();
        let env = Env::default().with(published, Rc::new("value"));

        assert!(env.lookup(other).is_none());
        assert!(Env::default().lookup(published).is_none());
        assert_ne!(published, other);
    }
}
