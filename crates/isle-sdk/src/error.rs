//! Error taxonomy shared by universes, objects and the bridge

use std::sync::Arc;

use crate::exception::Exception;
use crate::value::Value;

/// Result type for bridge-internal operations
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Result of invoking a method on an [`Object`](crate::Object)
pub type CallResult = Result<Value, CallError>;

/// Bridge-internal failures.
///
/// These mean a call could not even be placed: the two universes disagree
/// about a type, a value has no representation on the other side, or a
/// method vanished between two nominally equivalent interfaces. They are
/// distinct from exceptions thrown by the real method, which travel as
/// [`CallError::Thrown`].
#[derive(Debug, Clone, thiserror::Error)]
pub enum BridgeError {
    /// Source type shares no equivalent interface with the destination universe
    #[error(
        "type `{type_name}` shares no equivalent interface with universe `{universe}` \
         (are both modules built against the same API version?)"
    )]
    NotBridgeable {
        /// Qualified name of the source runtime type
        type_name: String,
        /// Name of the destination universe
        universe: String,
    },

    /// A value has no representable form in the destination universe
    #[error("cannot convert {value} into universe `{target}`: {reason}")]
    ConversionError {
        /// Short rendering of the value being converted
        value: String,
        /// Name of the destination universe
        target: String,
        /// Why conversion failed
        reason: String,
    },

    /// Signature drift between nominally equivalent interfaces
    #[error(
        "method `{method}` of [{target_types}] in universe `{target_universe}` has no counterpart \
         on `{source_type}` in universe `{source_universe}` (mismatched module versions?)"
    )]
    NoSuchMethodOnSource {
        /// Attempted method signature
        method: String,
        /// Qualified name of the real object's type
        source_type: String,
        /// Interfaces implemented by the proxy
        target_types: String,
        /// Universe of the real object
        source_universe: String,
        /// Universe of the proxy
        target_universe: String,
    },

    /// Method invoked on an object whose type does not declare it
    #[error("type `{type_name}` declares no method `{method}` taking {arity} argument(s)")]
    UnknownMethod {
        /// Qualified type name
        type_name: String,
        /// Method name
        method: String,
        /// Number of arguments supplied
        arity: usize,
    },

    /// Type name not loadable in a universe
    #[error("type `{name}` is not loadable in universe `{universe}`")]
    TypeNotFound {
        /// Qualified type name
        name: String,
        /// Universe name
        universe: String,
    },

    /// Collection index out of range
    #[error("index {index} out of bounds for length {len}")]
    IndexOutOfBounds {
        /// Requested index
        index: usize,
        /// Collection length
        len: usize,
    },

    /// The universe could not construct a proxy
    #[error("proxy construction failed: {0}")]
    Proxy(String),
}

impl BridgeError {
    /// Build a [`BridgeError::ConversionError`] for `value`
    pub fn conversion(value: &Value, target: &str, reason: impl Into<String>) -> Self {
        BridgeError::ConversionError {
            value: value.describe(),
            target: target.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether this is a [`BridgeError::NotBridgeable`] outcome
    pub fn is_not_bridgeable(&self) -> bool {
        matches!(self, BridgeError::NotBridgeable { .. })
    }
}

/// Failure of a call through an object.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CallError {
    /// The real method threw; the exception has already been converted
    /// into the caller's universe
    #[error("{0}")]
    Thrown(Arc<Exception>),

    /// The call could not be placed
    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

impl CallError {
    /// Wrap an exception as a thrown call error
    pub fn thrown(exception: Exception) -> Self {
        CallError::Thrown(Arc::new(exception))
    }

    /// The thrown exception, if this is an application failure
    pub fn exception(&self) -> Option<&Arc<Exception>> {
        match self {
            CallError::Thrown(e) => Some(e),
            CallError::Bridge(_) => None,
        }
    }

    /// The bridge failure, if the call could not be placed
    pub fn bridge_error(&self) -> Option<&BridgeError> {
        match self {
            CallError::Thrown(_) => None,
            CallError::Bridge(e) => Some(e),
        }
    }
}
