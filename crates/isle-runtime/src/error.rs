//! Runtime error types

use thiserror::Error;

/// Errors defining types in a [`ModuleUniverse`](crate::ModuleUniverse)
#[derive(Debug, Clone, Error)]
pub enum RuntimeError {
    /// The universe already defines a type of this name
    #[error("type `{name}` is already defined in universe `{universe}`")]
    DuplicateType {
        /// Qualified type name
        name: String,
        /// Universe name
        universe: String,
    },

    /// A referenced type is not loadable
    #[error("type `{name}` is not loadable in universe `{universe}`")]
    UnknownType {
        /// Qualified type name
        name: String,
        /// Universe name
        universe: String,
    },

    /// A type used as an interface is not one
    #[error("type `{0}` is not an interface")]
    NotAnInterface(String),
}

/// Result type for runtime operations
pub type RuntimeResult<T> = Result<T, RuntimeError>;
