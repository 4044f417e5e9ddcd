//! Invocation bridge
//!
//! [`BridgeHandler`] is the dispatch function installed into a destination
//! universe proxy. Every call is matched to a method of the real object,
//! arguments are converted into the source universe, the real method runs,
//! and its result or exception is converted back.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Weak};

use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHasher};
use tracing::trace;

use isle_sdk::{
    same_object, BridgeError, BridgeResult, CallError, CallResult, Delegate, DynamicProxy,
    InvocationHandler, MethodSignature, Object, ObjectRef, UniverseRef, Value,
};

use crate::builder::Bridge;
use crate::convert::Crossing;
use crate::resolver::EquivalentInterfaceSet;

/// Forwards calls on a proxy to the real object in another universe
pub struct BridgeHandler {
    bridge: Arc<Bridge>,
    source: ObjectRef,
    source_universe: UniverseRef,
    target_universe: UniverseRef,
    interfaces: Arc<EquivalentInterfaceSet>,
    /// Destination signature (rendered) -> matching source method
    methods: RwLock<FxHashMap<String, MethodSignature>>,
    proxy: OnceCell<Weak<dyn Object>>,
}

impl BridgeHandler {
    pub(crate) fn new(
        bridge: Arc<Bridge>,
        source: ObjectRef,
        source_universe: UniverseRef,
        target_universe: UniverseRef,
        interfaces: Arc<EquivalentInterfaceSet>,
    ) -> Self {
        Self {
            bridge,
            source,
            source_universe,
            target_universe,
            interfaces,
            methods: RwLock::new(FxHashMap::default()),
            proxy: OnceCell::new(),
        }
    }

    /// Record the proxy this handler serves. Called once, after the proxy has
    /// been published to the cache.
    pub(crate) fn bind(&self, proxy: &ObjectRef) {
        let _ = self.proxy.set(Arc::downgrade(proxy));
    }

    /// The real object
    pub fn source(&self) -> &ObjectRef {
        &self.source
    }

    /// The destination interfaces the proxy implements
    pub fn interfaces(&self) -> &Arc<EquivalentInterfaceSet> {
        &self.interfaces
    }

    fn bound_proxy(&self) -> Option<ObjectRef> {
        self.proxy.get().and_then(Weak::upgrade)
    }

    /// Find the source method serving destination method `wanted`
    fn source_method(&self, wanted: &MethodSignature) -> BridgeResult<MethodSignature> {
        let key = wanted.to_string();
        if let Some(found) = self.methods.read().get(&key) {
            return Ok(found.clone());
        }

        let source_type = self.source.type_descriptor();
        let mut equivalence = self
            .bridge
            .resolver()
            .equivalence(self.source_universe.as_ref(), self.target_universe.as_ref());
        let implicit = MethodSignature::object_method(&wanted.name, wanted.arity());
        let found = source_type
            .all_methods()
            .into_iter()
            .chain(implicit.as_ref())
            .find(|candidate| equivalence.methods(candidate, wanted))
            .cloned()
            .ok_or_else(|| BridgeError::NoSuchMethodOnSource {
                method: wanted.to_string(),
                source_type: source_type.name().to_string(),
                target_types: self.interfaces.names(),
                source_universe: self.source_universe.name().to_string(),
                target_universe: self.target_universe.name().to_string(),
            })?;

        self.methods.write().insert(key, found.clone());
        Ok(found)
    }

    /// Identity semantics for `equals`/`hashCode`/`toString` when no bridged
    /// interface declares them
    fn identity_method(&self, proxy: &DynamicProxy, method: &MethodSignature, args: &[Value]) -> Option<Value> {
        if self.interfaces.declares(&method.name, method.arity()) {
            return None;
        }
        match (method.name.as_str(), args) {
            ("equals", [other]) => Some(Value::Bool(proxy.is_self(other))),
            ("hashCode", []) => {
                let mut hasher = FxHasher::default();
                proxy.address().hash(&mut hasher);
                Some(Value::Int(hasher.finish() as i32))
            }
            ("toString", []) => Some(Value::str(format!(
                "proxy[{}]@{:x} -> {} in {}",
                self.interfaces.names(),
                proxy.address(),
                self.source.type_descriptor().name(),
                self.source_universe.name()
            ))),
            _ => None,
        }
    }
}

impl InvocationHandler for BridgeHandler {
    fn invoke(&self, proxy: &DynamicProxy, method: &MethodSignature, args: &[Value]) -> CallResult {
        if let Some(answer) = self.identity_method(proxy, method, args) {
            return Ok(answer);
        }

        let source_method = self.source_method(method)?;
        trace!(
            method = %method,
            source_type = self.source.type_descriptor().name(),
            "dispatching bridged call"
        );

        let converter = self.bridge.converter();
        let converted = method
            .params
            .iter()
            .zip(args)
            .map(|(param, arg)| {
                converter.convert(
                    arg,
                    &self.target_universe,
                    &self.source_universe,
                    Crossing::Argument {
                        mutated: param.mutated,
                    },
                )
            })
            .collect::<BridgeResult<Vec<_>>>()?;

        match self.source.invoke(&source_method.name, &converted) {
            Ok(Value::Object(returned)) if same_object(&returned, &self.source) => {
                match self.bound_proxy() {
                    Some(own) => Ok(Value::Object(own)),
                    None => Ok(converter.convert(
                        &Value::Object(returned),
                        &self.source_universe,
                        &self.target_universe,
                        Crossing::Return,
                    )?),
                }
            }
            Ok(value) => Ok(converter.convert(
                &value,
                &self.source_universe,
                &self.target_universe,
                Crossing::Return,
            )?),
            Err(CallError::Thrown(exception)) => Err(CallError::Thrown(
                converter.convert_exception(&exception, &self.source_universe, &self.target_universe)?,
            )),
            Err(CallError::Bridge(err)) => Err(err.into()),
        }
    }

    fn delegate(&self) -> Option<Delegate> {
        Some(Delegate {
            object: self.source.clone(),
            universe: self.source_universe.id(),
        })
    }
}

impl fmt::Debug for BridgeHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeHandler")
            .field("source_type", &self.source.type_descriptor().name())
            .field("source_universe", &self.source_universe.name())
            .field("target_universe", &self.target_universe.name())
            .field("interfaces", &self.interfaces.names())
            .finish()
    }
}
