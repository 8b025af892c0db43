/// Errors raised while rendering providers and consuming stores.
///
/// The messages of the first four variants are observable: consumers match
/// on them, so they must not change.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// A [`Provider`](crate::Provider) was rendered without any store definitions.
    #[error("You must provide stores list to a <Provider> for initialization!")]
    Configuration,

    /// [`use_container`](crate::use_container) found neither an explicit
    /// container nor one on the default channel.
    #[error("You must provide a store instance!")]
    MissingStore,

    /// [`use_store`](crate::use_store) was called outside any provider scope.
    #[error("You must wrap your components with a <Provider>!")]
    MissingProvider,

    /// A provider is in scope but has no instance for the requested definition.
    #[error("Provided store instance did not initialized correctly!")]
    UninitializedStore,

    /// A hook slot changed type between two renders of the same component.
    #[error("hook #{index} changed type between renders")]
    HookOrder { index: usize },

    /// Components were still scheduling re-renders when a flush gave up.
    #[error("re-renders still pending after {passes} flush passes")]
    RenderLoop { passes: usize },
}

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;
