//! A minimal single-threaded component tree.
//!
//! This is the render/commit contract stores bind against:
//! - `Element`: a function component, identified by its closure type
//! - `Cx`: per-render hook slots, effects and scoped context lookup
//! - `Tree`: mounting, scheduled re-renders and depth-first unmounting
//!
//! Rendering a component re-renders its whole subtree. Store updates only
//! schedule the components subscribed to them.

mod cx;
mod tree;

pub use cx::{Children, Cleanup, Cx, Element, RerenderTrigger};
pub use tree::Tree;
