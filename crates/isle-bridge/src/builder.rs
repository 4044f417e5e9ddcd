//! Bridge entry points
//!
//! A [`Bridge`] owns the interface-resolution cache and the proxy cache. It
//! is shared as `Arc<Bridge>`; every proxy it builds holds a reference back
//! to it for converting call arguments and results.
//!
//! ```ignore
//! let bridge = Bridge::new(BridgeOptions::default());
//! let greeter = bridge
//!     .calling(&ui_universe)
//!     .delegate(&plugin_universe)
//!     .enhance(&plugin_greeter)?;
//! ```

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use isle_sdk::{BridgeResult, ObjectRef, UniverseRef, Value};

use crate::cache::ProxyCache;
use crate::convert::{Crossing, ValueConverter};
use crate::invocation::BridgeHandler;
use crate::options::BridgeOptions;
use crate::resolver::TypeResolver;

/// Owner of the resolution and proxy caches
pub struct Bridge {
    options: BridgeOptions,
    resolver: TypeResolver,
    cache: ProxyCache,
}

impl Bridge {
    /// Create a bridge
    pub fn new(options: BridgeOptions) -> Arc<Self> {
        Arc::new(Self {
            resolver: TypeResolver::new(options.verify_signatures),
            cache: ProxyCache::new(options.purge_interval),
            options,
        })
    }

    /// Create a bridge with default options
    pub fn with_defaults() -> Arc<Self> {
        Self::new(BridgeOptions::default())
    }

    /// Options this bridge was created with
    pub fn options(&self) -> &BridgeOptions {
        &self.options
    }

    /// Interface resolver
    pub fn resolver(&self) -> &TypeResolver {
        &self.resolver
    }

    /// Proxy cache
    pub fn cache(&self) -> &ProxyCache {
        &self.cache
    }

    /// Value converter backed by this bridge
    pub fn converter(self: &Arc<Self>) -> ValueConverter {
        ValueConverter::new(self.clone())
    }

    /// Bridge `value` from `from` into `to`.
    ///
    /// Returns `None` for null. Objects whose type is loadable unchanged in
    /// `to` are returned as-is; other objects become proxies implementing the
    /// equivalent destination interfaces.
    pub fn bridge(
        self: &Arc<Self>,
        value: &Value,
        from: &UniverseRef,
        to: &UniverseRef,
    ) -> BridgeResult<Option<Value>> {
        let bridged = self.bridge_value(value, from, to)?;
        Ok((!bridged.is_null()).then_some(bridged))
    }

    /// Bridge any value, mapping null to null
    pub fn bridge_value(
        self: &Arc<Self>,
        value: &Value,
        from: &UniverseRef,
        to: &UniverseRef,
    ) -> BridgeResult<Value> {
        self.converter().convert(value, from, to, Crossing::Value)
    }

    /// Bridge every value of `values`
    pub fn bridge_all(
        self: &Arc<Self>,
        values: &[Value],
        from: &UniverseRef,
        to: &UniverseRef,
    ) -> BridgeResult<Vec<Value>> {
        let converter = self.converter();
        values
            .iter()
            .map(|v| converter.convert(v, from, to, Crossing::Value))
            .collect()
    }

    /// Bridge one object from `from` into `to`
    pub fn bridge_object(
        self: &Arc<Self>,
        object: &ObjectRef,
        from: &UniverseRef,
        to: &UniverseRef,
    ) -> BridgeResult<ObjectRef> {
        if from.id() == to.id() {
            return Ok(object.clone());
        }

        // A proxy (or chain of proxies) crossing back home unwraps to the
        // real object
        let mut current = object.clone();
        while let Some(delegate) = current.invocation_handler().and_then(|h| h.delegate()) {
            if delegate.universe == to.id() {
                debug!(
                    type_name = delegate.object.type_descriptor().name(),
                    to = to.name(),
                    "unwrapped proxy returning to its own universe"
                );
                return Ok(delegate.object);
            }
            current = delegate.object;
        }

        let source_type = object.type_descriptor();
        if to.is_loadable(&source_type) {
            return Ok(object.clone());
        }

        let interfaces = self
            .resolver
            .resolve(&source_type, from.as_ref(), to.as_ref())?;

        let mut built = None;
        let proxy = self.cache.get_or_create(object, to.id(), || {
            let handler = Arc::new(BridgeHandler::new(
                self.clone(),
                object.clone(),
                from.clone(),
                to.clone(),
                interfaces.clone(),
            ));
            let proxy = to.new_proxy(interfaces.interfaces(), handler.clone())?;
            debug!(
                source_type = source_type.name(),
                from = from.name(),
                to = to.name(),
                interfaces = %interfaces.names(),
                "built proxy"
            );
            built = Some(handler);
            Ok(proxy)
        })?;
        if let Some(handler) = built {
            handler.bind(&proxy);
        }
        Ok(proxy)
    }

    /// Start the staged form: name the universe where the proxy will be used
    pub fn calling(self: &Arc<Self>, universe: &UniverseRef) -> CallingStage {
        CallingStage {
            bridge: self.clone(),
            calling: universe.clone(),
        }
    }
}

impl fmt::Debug for Bridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bridge")
            .field("options", &self.options)
            .field("resolver", &self.resolver)
            .field("cache", &self.cache)
            .finish()
    }
}

/// First stage: the calling universe is known
#[derive(Clone)]
pub struct CallingStage {
    bridge: Arc<Bridge>,
    calling: UniverseRef,
}

impl CallingStage {
    /// Name the universe where the real objects live
    pub fn delegate(self, universe: &UniverseRef) -> BridgeBuilder {
        BridgeBuilder {
            bridge: self.bridge,
            calling: self.calling,
            delegate: universe.clone(),
        }
    }
}

/// Both universes are known; objects can be enhanced
#[derive(Clone)]
pub struct BridgeBuilder {
    bridge: Arc<Bridge>,
    calling: UniverseRef,
    delegate: UniverseRef,
}

impl BridgeBuilder {
    /// Make `object` from the delegate universe usable in the calling universe
    pub fn enhance(&self, object: &ObjectRef) -> BridgeResult<ObjectRef> {
        self.bridge
            .bridge_object(object, &self.delegate, &self.calling)
    }

    /// Bridge any value from the delegate universe into the calling universe
    pub fn enhance_value(&self, value: &Value) -> BridgeResult<Option<Value>> {
        self.bridge.bridge(value, &self.delegate, &self.calling)
    }

    /// The calling universe
    pub fn calling_universe(&self) -> &UniverseRef {
        &self.calling
    }

    /// The delegate universe
    pub fn delegate_universe(&self) -> &UniverseRef {
        &self.delegate
    }
}
