//! Platform types
//!
//! Descriptors visible identically in every universe. They are created once
//! per process and never re-described by a loader.

use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::types::{MethodSignature, TypeDescriptor, TypeKind, TypeRef};

/// Qualified name of the wrapper thrown when an exception type is not
/// loadable on the catching side
pub const FOREIGN_EXCEPTION: &str = "isle.bridge.ForeignException";

static FOREIGN_EXCEPTION_TYPE: Lazy<Arc<TypeDescriptor>> = Lazy::new(|| {
    TypeDescriptor::builder(FOREIGN_EXCEPTION, TypeKind::Exception)
        .method(MethodSignature::new("getMessage").returns(TypeRef::String))
        .build()
});

/// The foreign-exception wrapper type
pub fn foreign_exception() -> Arc<TypeDescriptor> {
    FOREIGN_EXCEPTION_TYPE.clone()
}

/// Look up a platform type by qualified name
pub fn find(name: &str) -> Option<Arc<TypeDescriptor>> {
    match name {
        FOREIGN_EXCEPTION => Some(foreign_exception()),
        _ => None,
    }
}

/// Whether `ty` is a platform type
pub fn is_platform(ty: &TypeDescriptor) -> bool {
    ty.id() == FOREIGN_EXCEPTION_TYPE.id()
}
