//! Isle SDK - Lightweight model for isolated type universes
//!
//! This crate provides the types and traits shared between type universes
//! (module loaders) and the proxy bridge, without depending on the bridge
//! itself. A loader implements [`TypeUniverse`]; objects implement
//! [`Object`]; the bridge speaks only these traits.
//!
//! # Example
//!
//! ```ignore
//! use isle_sdk::{MethodSignature, TypeDescriptor, TypeKind, TypeRef};
//!
//! let greeter = TypeDescriptor::builder("com.acme.Greeter", TypeKind::Interface)
//!     .method(MethodSignature::new("greet").param(TypeRef::String).returns(TypeRef::String))
//!     .build();
//! assert!(greeter.is_interface());
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod collections;
pub mod error;
pub mod exception;
pub mod handler;
pub mod object;
pub mod platform;
pub mod types;
pub mod universe;
pub mod value;

pub use collections::{
    HashedMap, HashedSet, MapLike, MapRef, Sequence, SequenceRef, SetLike, SetRef, VecSequence,
};
pub use error::{BridgeError, BridgeResult, CallError, CallResult};
pub use exception::Exception;
pub use handler::{Delegate, DynamicProxy, InvocationHandler};
pub use object::{identity, same_object, Object, ObjectRef};
pub use types::{
    DescriptorBuilder, DescriptorId, MethodSignature, Parameter, PrimitiveKind, TypeDescriptor,
    TypeKind, TypeRef,
};
pub use universe::{TypeUniverse, UniverseId, UniverseRef};
pub use value::{Array, ArrayRef, EnumConstant, Value};
