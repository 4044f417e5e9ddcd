//! Objects
//!
//! Every non-value entity that lives in a universe is an [`Object`]: it knows
//! its runtime type and dispatches calls by method name. Object identity is
//! the address of the shared allocation, never structural equality.

use std::sync::Arc;

use crate::error::CallResult;
use crate::handler::InvocationHandler;
use crate::types::TypeDescriptor;
use crate::value::Value;

/// Shared handle to an object
pub type ObjectRef = Arc<dyn Object>;

/// An object living in some universe
pub trait Object: Send + Sync + 'static {
    /// Runtime type
    fn type_descriptor(&self) -> Arc<TypeDescriptor>;

    /// Invoke the method `method` with `args`.
    ///
    /// Dispatch is by name and argument count.
    fn invoke(&self, method: &str, args: &[Value]) -> CallResult;

    /// The invocation handler, if this object is a dynamic proxy
    fn invocation_handler(&self) -> Option<&Arc<dyn InvocationHandler>> {
        None
    }
}

/// Identity of an object: the address of its allocation
#[inline]
pub fn identity(obj: &ObjectRef) -> usize {
    Arc::as_ptr(obj) as *const () as usize
}

/// Reference equality between two objects
#[inline]
pub fn same_object(a: &ObjectRef, b: &ObjectRef) -> bool {
    identity(a) == identity(b)
}
