//! Providers and consumption hooks.
//!
//! A [`Provider`] instantiates each store definition once per mount and
//! publishes the instances for its subtree. Descendants read and subscribe
//! with [`use_store`]. The single-container flavour uses
//! [`ContainerProvider`] and [`use_container`].

mod compose;
mod hooks;

pub use compose::{compose, AnyDefinition, Provider, PublishedMap};
pub use hooks::{use_container, use_published, use_store, ContainerProvider};
