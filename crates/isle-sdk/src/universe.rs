//! The `TypeUniverse` trait: the capability a module loader provides
//!
//! A universe is a closed namespace of loadable types. Two universes never
//! share type identity, even for identically named and shaped types, unless
//! they resolve a name to the very same descriptor (platform types, or types
//! inherited from a common parent).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::{BridgeError, BridgeResult};
use crate::handler::{DynamicProxy, InvocationHandler};
use crate::object::ObjectRef;
use crate::platform;
use crate::types::TypeDescriptor;

/// Unique identifier for a universe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UniverseId(u64);

impl UniverseId {
    /// Create a new unique universe ID
    pub fn new() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        UniverseId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for UniverseId {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared handle to a universe
pub type UniverseRef = Arc<dyn TypeUniverse>;

/// A closed set of loadable types.
///
/// Owned by the module loader; the bridge only borrows it.
pub trait TypeUniverse: Send + Sync {
    /// Universe identity
    fn id(&self) -> UniverseId;

    /// Human-readable name used in diagnostics
    fn name(&self) -> &str;

    /// Test whether `name` is loadable and describe it
    fn find_type(&self, name: &str) -> Option<Arc<TypeDescriptor>>;

    /// Resolve `name` or fail with [`BridgeError::TypeNotFound`]
    fn load_type(&self, name: &str) -> BridgeResult<Arc<TypeDescriptor>> {
        self.find_type(name).ok_or_else(|| BridgeError::TypeNotFound {
            name: name.to_string(),
            universe: self.name().to_string(),
        })
    }

    /// Whether `ty` is visible here as the very same descriptor
    fn is_loadable(&self, ty: &TypeDescriptor) -> bool {
        platform::is_platform(ty)
            || self
                .find_type(ty.name())
                .is_some_and(|found| found.id() == ty.id())
    }

    /// Construct an object implementing `interfaces` whose every call is
    /// forwarded to `handler`
    fn new_proxy(
        &self,
        interfaces: &[Arc<TypeDescriptor>],
        handler: Arc<dyn InvocationHandler>,
    ) -> BridgeResult<ObjectRef> {
        if interfaces.is_empty() {
            return Err(BridgeError::Proxy(
                "a proxy must implement at least one interface".to_string(),
            ));
        }
        let class = DynamicProxy::proxy_class(interfaces);
        Ok(Arc::new(DynamicProxy::new(self.id(), class, handler)))
    }
}
