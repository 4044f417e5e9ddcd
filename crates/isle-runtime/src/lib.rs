//! Isle Runtime
//!
//! Reference in-process implementation of the universe capability:
//!
//! - [`ModuleUniverse`]: one module's type namespace, with parent delegation
//!   for types shared between modules
//! - [`TypeBuilder`]: defines types by name inside a universe
//! - [`NativeObject`]: objects whose methods are Rust closures
//! - [`UniverseRegistry`]: the set of loaded universes

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod define;
pub mod error;
pub mod native;
pub mod registry;
pub mod universe;

pub use define::TypeBuilder;
pub use error::{RuntimeError, RuntimeResult};
pub use native::{MethodFn, NativeObject, NativeObjectBuilder};
pub use registry::UniverseRegistry;
pub use universe::ModuleUniverse;
