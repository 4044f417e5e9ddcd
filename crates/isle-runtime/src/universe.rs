//! Module universes
//!
//! A [`ModuleUniverse`] is the type namespace of one loaded module. Lookup
//! order is platform types, then the module's own definitions, then its
//! parent chain. Types inherited from a shared parent are the very same
//! descriptors in every child, so objects of those types cross unchanged.

use std::fmt;
use std::hash::BuildHasherDefault;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHasher};
use tracing::debug;

use isle_sdk::platform;
use isle_sdk::{
    BridgeError, BridgeResult, DescriptorId, DynamicProxy, EnumConstant, Exception,
    InvocationHandler, ObjectRef, TypeDescriptor, TypeKind, TypeUniverse, UniverseId, UniverseRef,
};

use crate::define::TypeBuilder;
use crate::error::{RuntimeError, RuntimeResult};

/// Type namespace of one loaded module
pub struct ModuleUniverse {
    id: UniverseId,
    name: String,
    parent: Option<Arc<ModuleUniverse>>,
    types: RwLock<FxHashMap<String, Arc<TypeDescriptor>>>,
    proxy_classes: DashMap<Vec<DescriptorId>, Arc<TypeDescriptor>, BuildHasherDefault<FxHasher>>,
}

impl ModuleUniverse {
    /// Create a root universe
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self::create(name.into(), None))
    }

    /// Create a universe that delegates unresolved names to `parent`
    pub fn with_parent(name: impl Into<String>, parent: &Arc<ModuleUniverse>) -> Arc<Self> {
        Arc::new(Self::create(name.into(), Some(parent.clone())))
    }

    fn create(name: String, parent: Option<Arc<ModuleUniverse>>) -> Self {
        Self {
            id: UniverseId::new(),
            name,
            parent,
            types: RwLock::new(FxHashMap::default()),
            proxy_classes: DashMap::default(),
        }
    }

    /// This universe as a shared [`TypeUniverse`] handle
    pub fn handle(self: &Arc<Self>) -> UniverseRef {
        self.clone()
    }

    /// Parent universe, if any
    pub fn parent(&self) -> Option<&Arc<ModuleUniverse>> {
        self.parent.as_ref()
    }

    /// Register a fully built descriptor
    pub fn define(&self, descriptor: Arc<TypeDescriptor>) -> RuntimeResult<Arc<TypeDescriptor>> {
        let mut types = self.types.write();
        if types.contains_key(descriptor.name()) || platform::find(descriptor.name()).is_some() {
            return Err(RuntimeError::DuplicateType {
                name: descriptor.name().to_string(),
                universe: self.name.clone(),
            });
        }
        debug!(universe = %self.name, type_name = descriptor.name(), "defined type");
        types.insert(descriptor.name().to_string(), descriptor.clone());
        Ok(descriptor)
    }

    /// Start defining an interface
    pub fn interface(&self, name: impl Into<String>) -> TypeBuilder<'_> {
        TypeBuilder::new(self, name.into(), TypeKind::Interface)
    }

    /// Start defining a class
    pub fn class(&self, name: impl Into<String>) -> TypeBuilder<'_> {
        TypeBuilder::new(self, name.into(), TypeKind::Class)
    }

    /// Start defining an exception type
    pub fn exception_type(&self, name: impl Into<String>) -> TypeBuilder<'_> {
        TypeBuilder::new(self, name.into(), TypeKind::Exception)
    }

    /// Define an enum with the given constants
    pub fn define_enum(&self, name: impl Into<String>, constants: &[&str]) -> RuntimeResult<Arc<TypeDescriptor>> {
        constants
            .iter()
            .fold(TypeBuilder::new(self, name.into(), TypeKind::Enum), |b, c| {
                b.constant(*c)
            })
            .define()
    }

    /// Constant `name` of enum `type_name`
    pub fn enum_constant(&self, type_name: &str, name: &str) -> BridgeResult<EnumConstant> {
        EnumConstant::new(self.load_type(type_name)?, name)
    }

    /// Exception of type `type_name` carrying `message`
    pub fn exception(&self, type_name: &str, message: impl Into<String>) -> BridgeResult<Exception> {
        Ok(Exception::new(self.load_type(type_name)?, message))
    }

    /// Names of the types defined directly in this universe
    pub fn defined_types(&self) -> Vec<String> {
        let mut names: Vec<String> = self.types.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub(crate) fn lookup(&self, name: &str) -> Option<Arc<TypeDescriptor>> {
        platform::find(name)
            .or_else(|| self.types.read().get(name).cloned())
            .or_else(|| self.parent.as_ref().and_then(|p| p.lookup(name)))
    }
}

impl TypeUniverse for ModuleUniverse {
    fn id(&self) -> UniverseId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn find_type(&self, name: &str) -> Option<Arc<TypeDescriptor>> {
        self.lookup(name)
    }

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
        if let Some(bad) = interfaces.iter().find(|i| !i.is_interface()) {
            return Err(BridgeError::Proxy(format!(
                "`{}` is not an interface",
                bad.name()
            )));
        }
        let key: Vec<DescriptorId> = interfaces.iter().map(|i| i.id()).collect();
        let class = self
            .proxy_classes
            .entry(key)
            .or_insert_with(|| DynamicProxy::proxy_class(interfaces))
            .value()
            .clone();
        Ok(Arc::new(DynamicProxy::new(self.id, class, handler)))
    }
}

impl fmt::Debug for ModuleUniverse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleUniverse")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("parent", &self.parent.as_ref().map(|p| p.name.clone()))
            .field("types", &self.types.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use isle_sdk::{MethodSignature, TypeRef};

    #[test]
    fn test_universe_ids_are_unique() {
        let a = ModuleUniverse::new("a");
        let b = ModuleUniverse::new("b");
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_same_name_is_not_same_type() {
        let a = ModuleUniverse::new("a");
        let b = ModuleUniverse::new("b");
        let ta = a.interface("x.Greeter").define().unwrap();
        let tb = b.interface("x.Greeter").define().unwrap();

        assert_ne!(ta.id(), tb.id());
        assert!(a.is_loadable(&ta));
        assert!(!b.is_loadable(&ta));
    }

    #[test]
    fn test_parent_types_are_shared() {
        let shared = ModuleUniverse::new("shared");
        let api = shared.interface("x.Api").define().unwrap();
        let child = ModuleUniverse::with_parent("child", &shared);

        let seen = child.find_type("x.Api").unwrap();
        assert_eq!(seen.id(), api.id());
        assert!(child.is_loadable(&api));
    }

    #[test]
    fn test_platform_types_are_visible_everywhere() {
        let a = ModuleUniverse::new("a");
        let foreign = a.find_type(platform::FOREIGN_EXCEPTION).unwrap();
        assert!(platform::is_platform(&foreign));
        assert!(a.is_loadable(&platform::foreign_exception()));
    }

    #[test]
    fn test_duplicate_definition_is_rejected() {
        let a = ModuleUniverse::new("a");
        a.interface("x.Greeter").define().unwrap();
        let err = a.interface("x.Greeter").define().unwrap_err();
        assert!(matches!(err, RuntimeError::DuplicateType { .. }));
    }

    #[test]
    fn test_proxy_classes_are_reused() {
        struct Null;
        impl InvocationHandler for Null {
            fn invoke(
                &self,
                _proxy: &DynamicProxy,
                _method: &MethodSignature,
                _args: &[isle_sdk::Value],
            ) -> isle_sdk::CallResult {
                Ok(isle_sdk::Value::Null)
            }
        }

        let a = ModuleUniverse::new("a");
        let iface = a
            .interface("x.Greeter")
            .method(MethodSignature::new("greet").returns(TypeRef::String))
            .define()
            .unwrap();

        let p1 = a.new_proxy(&[iface.clone()], Arc::new(Null)).unwrap();
        let p2 = a.new_proxy(&[iface], Arc::new(Null)).unwrap();
        assert_eq!(p1.type_descriptor().id(), p2.type_descriptor().id());
        assert!(!isle_sdk::same_object(&p1, &p2));
    }

    #[test]
    fn test_enum_helpers() {
        let a = ModuleUniverse::new("a");
        a.define_enum("x.Color", &["RED", "GREEN", "BLUE"]).unwrap();
        let green = a.enum_constant("x.Color", "GREEN").unwrap();
        assert_eq!(green.ordinal(), 1);
        assert!(a.enum_constant("x.Color", "PURPLE").is_err());
    }
}
