//! Isle Bridge
//!
//! Lets objects from one isolated type universe be used from another. Two
//! universes never share type identity, so a call across the boundary goes
//! through a proxy that implements the destination universe's copy of the
//! interface and forwards to the real object.
//!
//! - [`resolver`] decides which destination interfaces are structurally the
//!   same as the source type's interfaces
//! - [`convert`] rebuilds values for the destination universe
//! - [`cache`] keeps one proxy per (source object, destination universe)
//! - [`invocation`] is the per-proxy dispatch function
//! - [`builder`] ties them together behind [`Bridge`]

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod builder;
pub mod cache;
pub mod convert;
pub mod invocation;
pub mod options;
pub mod resolver;

pub use builder::{Bridge, BridgeBuilder, CallingStage};
pub use cache::{BridgeKey, CacheStats, ProxyCache};
pub use convert::{Crossing, ValueConverter};
pub use invocation::BridgeHandler;
pub use options::{BridgeOptions, CollectionPolicy, OptionsError, UnbridgeablePolicy};
pub use resolver::{Equivalence, EquivalentInterfaceSet, TypeResolver};

// Re-export the object model so embedders need a single dependency
pub use isle_sdk;
