//! Dynamic proxies
//!
//! A [`DynamicProxy`] implements a set of interfaces by forwarding every call
//! to a single [`InvocationHandler`]. Universes construct proxies on request
//! (see [`TypeUniverse::new_proxy`](crate::TypeUniverse::new_proxy)); the
//! bridge supplies the handler.

use std::fmt;
use std::sync::Arc;

use crate::error::{BridgeError, CallResult};
use crate::object::{identity, Object, ObjectRef};
use crate::types::{MethodSignature, TypeDescriptor, TypeKind};
use crate::universe::UniverseId;
use crate::value::Value;

/// The real object behind a proxy, and the universe it lives in
#[derive(Clone)]
pub struct Delegate {
    /// The real object
    pub object: ObjectRef,
    /// Universe of the real object
    pub universe: UniverseId,
}

impl fmt::Debug for Delegate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delegate")
            .field("type", &self.object.type_descriptor().name())
            .field("universe", &self.universe)
            .finish()
    }
}

/// Single dispatch function behind a dynamic proxy
pub trait InvocationHandler: Send + Sync + 'static {
    /// Handle a call of `method` made on `proxy`.
    ///
    /// `method` is the signature as declared by the proxy's interfaces, or
    /// one of the implicit identity methods
    /// ([`MethodSignature::object_method`]) when no interface declares it.
    fn invoke(&self, proxy: &DynamicProxy, method: &MethodSignature, args: &[Value]) -> CallResult;

    /// The real object this handler forwards to, if any
    fn delegate(&self) -> Option<Delegate> {
        None
    }
}

/// Object implementing a set of interfaces by forwarding to a handler
pub struct DynamicProxy {
    universe: UniverseId,
    class: Arc<TypeDescriptor>,
    handler: Arc<dyn InvocationHandler>,
}

impl DynamicProxy {
    /// Create a proxy of `class` living in `universe`
    pub fn new(
        universe: UniverseId,
        class: Arc<TypeDescriptor>,
        handler: Arc<dyn InvocationHandler>,
    ) -> Self {
        Self {
            universe,
            class,
            handler,
        }
    }

    /// Describe a fresh proxy class implementing `interfaces`
    pub fn proxy_class(interfaces: &[Arc<TypeDescriptor>]) -> Arc<TypeDescriptor> {
        let names: Vec<&str> = interfaces.iter().map(|i| i.name()).collect();
        interfaces
            .iter()
            .fold(
                TypeDescriptor::builder(format!("$Proxy[{}]", names.join(", ")), TypeKind::Class),
                |b, iface| b.implements(iface.clone()),
            )
            .build()
    }

    /// Universe the proxy lives in
    pub fn universe(&self) -> UniverseId {
        self.universe
    }

    /// Interfaces implemented by the proxy
    pub fn interfaces(&self) -> &[Arc<TypeDescriptor>] {
        self.class.interfaces()
    }

    /// Identity of this proxy, as [`identity`] would report it
    pub fn address(&self) -> usize {
        self as *const Self as *const () as usize
    }

    /// Whether `value` is this very proxy
    pub fn is_self(&self, value: &Value) -> bool {
        match value {
            Value::Object(o) => identity(o) == self.address(),
            _ => false,
        }
    }
}

impl Object for DynamicProxy {
    fn type_descriptor(&self) -> Arc<TypeDescriptor> {
        self.class.clone()
    }

    fn invoke(&self, method: &str, args: &[Value]) -> CallResult {
        let sig = self
            .class
            .select_method(method, args)
            .cloned()
            .or_else(|| MethodSignature::object_method(method, args.len()))
            .ok_or_else(|| BridgeError::UnknownMethod {
                type_name: self.class.name().to_string(),
                method: method.to_string(),
                arity: args.len(),
            })?;
        self.handler.invoke(self, &sig, args)
    }

    fn invocation_handler(&self) -> Option<&Arc<dyn InvocationHandler>> {
        Some(&self.handler)
    }
}

impl fmt::Debug for DynamicProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicProxy")
            .field("class", &self.class.name())
            .field("universe", &self.universe)
            .finish()
    }
}
