//! Value conversion across universes
//!
//! Conversion is selected from the runtime shape of a value, never from a
//! declared type. Rules, in order:
//!
//! - same universe, or a universe-independent value: as-is
//! - enum constant: same-named constant of the same-named destination enum
//! - array: new array, every element converted
//! - list / set / map: copied with converted contents, or wrapped in a live
//!   converting view when the crossing calls for one
//! - exception: destination exception of the same name, else the platform
//!   foreign-exception wrapper
//! - object: bridged through the owning [`Bridge`]

use std::sync::Arc;

use tracing::warn;

use isle_sdk::platform;
use isle_sdk::{
    Array, BridgeError, BridgeResult, EnumConstant, Exception, HashedMap, HashedSet, MapLike,
    MapRef, ObjectRef, Sequence, SequenceRef, SetLike, SetRef, UniverseRef, Value, VecSequence,
};

use crate::builder::Bridge;
use crate::options::{CollectionPolicy, UnbridgeablePolicy};

/// Where a converted value is headed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Crossing {
    /// A value handed directly to the bridge
    Value,
    /// A call argument; `mutated` is set when the parameter is declared as
    /// mutated by the callee
    Argument {
        /// Callee mutates the argument in place
        mutated: bool,
    },
    /// A call's return value
    Return,
}

impl Crossing {
    /// Crossing used for values nested inside a value of this crossing
    fn nested(self) -> Crossing {
        match self {
            Crossing::Argument { .. } => Crossing::Argument { mutated: false },
            other => other,
        }
    }
}

/// Converts values between two universes on behalf of a [`Bridge`]
#[derive(Clone)]
pub struct ValueConverter {
    bridge: Arc<Bridge>,
}

impl ValueConverter {
    pub(crate) fn new(bridge: Arc<Bridge>) -> Self {
        Self { bridge }
    }

    /// Convert `value` from universe `from` into universe `to`
    pub fn convert(
        &self,
        value: &Value,
        from: &UniverseRef,
        to: &UniverseRef,
        crossing: Crossing,
    ) -> BridgeResult<Value> {
        self.convert_at(value, from, to, crossing, 0)
    }

    fn convert_at(
        &self,
        value: &Value,
        from: &UniverseRef,
        to: &UniverseRef,
        crossing: Crossing,
        depth: usize,
    ) -> BridgeResult<Value> {
        let max_depth = self.bridge.options().max_depth;
        if depth > max_depth {
            return Err(BridgeError::conversion(
                value,
                to.name(),
                format!("value nests deeper than {} levels", max_depth),
            ));
        }
        if from.id() == to.id() {
            return Ok(value.clone());
        }

        match value {
            Value::Null
            | Value::Bool(_)
            | Value::Int(_)
            | Value::Long(_)
            | Value::Double(_)
            | Value::Char(_)
            | Value::Str(_) => Ok(value.clone()),
            Value::Enum(constant) => self.convert_enum(value, constant, to).map(Value::Enum),
            // Arrays of primitives and strings are the same array everywhere
            Value::Array(array) if array.element_type().is_portable() => Ok(value.clone()),
            Value::Array(array) => {
                let items = array
                    .to_vec()
                    .iter()
                    .map(|item| self.convert_at(item, from, to, crossing.nested(), depth + 1))
                    .collect::<BridgeResult<Vec<_>>>()?;
                Ok(Value::Array(Arc::new(Array::new(
                    array.element_type().clone(),
                    items,
                ))))
            }
            Value::List(list) => self.convert_list(list, from, to, crossing, depth),
            Value::Set(set) => self.convert_set(set, from, to, crossing, depth),
            Value::Map(map) => self.convert_map(map, from, to, crossing, depth),
            Value::Exception(exception) => self
                .convert_exception_at(exception, from, to, depth)
                .map(Value::Exception),
            Value::Object(object) => self.convert_object(value, object, from, to, crossing, depth),
        }
    }

    fn convert_enum(
        &self,
        value: &Value,
        constant: &EnumConstant,
        to: &UniverseRef,
    ) -> BridgeResult<EnumConstant> {
        if to.is_loadable(constant.ty()) {
            return Ok(constant.clone());
        }
        let ty = to
            .find_type(constant.ty().name())
            .filter(|ty| ty.is_enum())
            .ok_or_else(|| {
                BridgeError::conversion(value, to.name(), "enum type is not loadable there")
            })?;
        EnumConstant::new(ty, constant.name()).map_err(|_| {
            BridgeError::conversion(
                value,
                to.name(),
                format!("enum declares no constant `{}`", constant.name()),
            )
        })
    }

    fn live(&self, crossing: Crossing) -> bool {
        match crossing {
            Crossing::Argument { mutated } => match self.bridge.options().collections {
                CollectionPolicy::Auto => mutated,
                CollectionPolicy::CopyOnCross => false,
                CollectionPolicy::LiveView => true,
            },
            Crossing::Value | Crossing::Return => false,
        }
    }

    fn convert_list(
        &self,
        list: &SequenceRef,
        from: &UniverseRef,
        to: &UniverseRef,
        crossing: Crossing,
        depth: usize,
    ) -> BridgeResult<Value> {
        if self.live(crossing) {
            return Ok(Value::List(Arc::new(SequenceView {
                inner: list.clone(),
                side: self.side(from, to, depth),
            })));
        }
        let items = list
            .snapshot()?
            .iter()
            .map(|item| self.convert_at(item, from, to, crossing.nested(), depth + 1))
            .collect::<BridgeResult<Vec<_>>>()?;
        Ok(Value::List(Arc::new(VecSequence::from_vec(items))))
    }

    fn convert_set(
        &self,
        set: &SetRef,
        from: &UniverseRef,
        to: &UniverseRef,
        crossing: Crossing,
        depth: usize,
    ) -> BridgeResult<Value> {
        if self.live(crossing) {
            return Ok(Value::Set(Arc::new(SetView {
                inner: set.clone(),
                side: self.side(from, to, depth),
            })));
        }
        let items = set
            .snapshot()?
            .iter()
            .map(|item| self.convert_at(item, from, to, crossing.nested(), depth + 1))
            .collect::<BridgeResult<HashedSet>>()?;
        Ok(Value::Set(Arc::new(items)))
    }

    fn convert_map(
        &self,
        map: &MapRef,
        from: &UniverseRef,
        to: &UniverseRef,
        crossing: Crossing,
        depth: usize,
    ) -> BridgeResult<Value> {
        if self.live(crossing) {
            return Ok(Value::Map(Arc::new(MapView {
                inner: map.clone(),
                side: self.side(from, to, depth),
            })));
        }
        let nested = crossing.nested();
        let entries = map
            .entries()?
            .iter()
            .map(|(k, v)| {
                Ok((
                    self.convert_at(k, from, to, nested, depth + 1)?,
                    self.convert_at(v, from, to, nested, depth + 1)?,
                ))
            })
            .collect::<BridgeResult<HashedMap>>()?;
        Ok(Value::Map(Arc::new(entries)))
    }

    /// Convert an exception thrown in `from` into one catchable in `to`.
    ///
    /// Message, stack trace and causes are preserved. When the exception type
    /// is not loadable in `to`, the result is the platform foreign-exception
    /// wrapper with the original cause chain recorded as its origin.
    pub fn convert_exception(
        &self,
        exception: &Arc<Exception>,
        from: &UniverseRef,
        to: &UniverseRef,
    ) -> BridgeResult<Arc<Exception>> {
        self.convert_exception_at(exception, from, to, 0)
    }

    fn convert_exception_at(
        &self,
        exception: &Arc<Exception>,
        from: &UniverseRef,
        to: &UniverseRef,
        depth: usize,
    ) -> BridgeResult<Arc<Exception>> {
        if from.id() == to.id() || to.is_loadable(exception.ty()) {
            return Ok(exception.clone());
        }
        if depth > self.bridge.options().max_depth {
            return Err(BridgeError::conversion(
                &Value::Exception(exception.clone()),
                to.name(),
                "cause chain is too deep",
            ));
        }

        let cause = exception
            .cause()
            .map(|cause| self.convert_exception_at(cause, from, to, depth + 1))
            .transpose()?;

        let (ty, foreign) = match to
            .find_type(exception.ty().name())
            .filter(|ty| ty.is_exception())
        {
            Some(ty) => (ty, false),
            None => {
                warn!(
                    exception = exception.ty().name(),
                    from = from.name(),
                    to = to.name(),
                    "exception type not loadable on the catching side; wrapping"
                );
                (platform::foreign_exception(), true)
            }
        };

        let mut converted = match exception.message() {
            Some(message) => Exception::new(ty, message),
            None => Exception::without_message(ty),
        }
        .with_stack_trace(exception.stack_trace().to_vec());
        if let Some(cause) = cause {
            converted = converted.with_cause(cause);
        }
        if foreign {
            converted = converted.with_origin(exception.cause_chain());
        } else if let Some(origin) = exception.origin() {
            converted = converted.with_origin(origin);
        }
        Ok(Arc::new(converted))
    }

    fn convert_object(
        &self,
        value: &Value,
        object: &ObjectRef,
        from: &UniverseRef,
        to: &UniverseRef,
        crossing: Crossing,
        depth: usize,
    ) -> BridgeResult<Value> {
        match self.bridge.bridge_object(object, from, to) {
            Ok(bridged) => Ok(Value::Object(bridged)),
            Err(err) if err.is_not_bridgeable() && (depth > 0 || crossing != Crossing::Value) => {
                match self.bridge.options().unbridgeable {
                    UnbridgeablePolicy::Passthrough => {
                        warn!(
                            type_name = object.type_descriptor().name(),
                            to = to.name(),
                            "passing unbridgeable object through unchanged"
                        );
                        Ok(value.clone())
                    }
                    UnbridgeablePolicy::Fail => {
                        Err(BridgeError::conversion(value, to.name(), err.to_string()))
                    }
                }
            }
            Err(err) => Err(err),
        }
    }

    fn side(&self, from: &UniverseRef, to: &UniverseRef, depth: usize) -> ViewSide {
        ViewSide {
            converter: self.clone(),
            inner: from.clone(),
            outer: to.clone(),
            depth: depth + 1,
        }
    }
}

// ============================================================================
// Live views
// ============================================================================

/// Conversion context of a live view: `inner` owns the wrapped collection,
/// `outer` is the universe the view is handed to
struct ViewSide {
    converter: ValueConverter,
    inner: UniverseRef,
    outer: UniverseRef,
    depth: usize,
}

impl ViewSide {
    fn outward(&self, value: &Value) -> BridgeResult<Value> {
        self.converter
            .convert_at(value, &self.inner, &self.outer, Crossing::Return, self.depth)
    }

    fn inward(&self, value: &Value) -> BridgeResult<Value> {
        self.converter.convert_at(
            value,
            &self.outer,
            &self.inner,
            Crossing::Argument { mutated: false },
            self.depth,
        )
    }

    fn outward_all(&self, values: Vec<Value>) -> BridgeResult<Vec<Value>> {
        values.iter().map(|v| self.outward(v)).collect()
    }
}

/// Sequence that converts on access and writes through to the original
struct SequenceView {
    inner: SequenceRef,
    side: ViewSide,
}

impl Sequence for SequenceView {
    fn len(&self) -> usize {
        self.inner.len()
    }

    fn get(&self, index: usize) -> BridgeResult<Option<Value>> {
        self.inner
            .get(index)?
            .map(|v| self.side.outward(&v))
            .transpose()
    }

    fn set(&self, index: usize, value: Value) -> BridgeResult<Value> {
        let previous = self.inner.set(index, self.side.inward(&value)?)?;
        self.side.outward(&previous)
    }

    fn push(&self, value: Value) -> BridgeResult<()> {
        self.inner.push(self.side.inward(&value)?)
    }

    fn remove(&self, index: usize) -> BridgeResult<Value> {
        let removed = self.inner.remove(index)?;
        self.side.outward(&removed)
    }

    fn snapshot(&self) -> BridgeResult<Vec<Value>> {
        self.side.outward_all(self.inner.snapshot()?)
    }
}

/// Set that converts on access and writes through to the original
struct SetView {
    inner: SetRef,
    side: ViewSide,
}

impl SetLike for SetView {
    fn len(&self) -> usize {
        self.inner.len()
    }

    fn contains(&self, value: &Value) -> BridgeResult<bool> {
        self.inner.contains(&self.side.inward(value)?)
    }

    fn insert(&self, value: Value) -> BridgeResult<bool> {
        self.inner.insert(self.side.inward(&value)?)
    }

    fn remove(&self, value: &Value) -> BridgeResult<bool> {
        self.inner.remove(&self.side.inward(value)?)
    }

    fn snapshot(&self) -> BridgeResult<Vec<Value>> {
        self.side.outward_all(self.inner.snapshot()?)
    }
}

/// Map that converts keys and values on access and writes through
struct MapView {
    inner: MapRef,
    side: ViewSide,
}

impl MapLike for MapView {
    fn len(&self) -> usize {
        self.inner.len()
    }

    fn get(&self, key: &Value) -> BridgeResult<Option<Value>> {
        self.inner
            .get(&self.side.inward(key)?)?
            .map(|v| self.side.outward(&v))
            .transpose()
    }

    fn insert(&self, key: Value, value: Value) -> BridgeResult<Option<Value>> {
        self.inner
            .insert(self.side.inward(&key)?, self.side.inward(&value)?)?
            .map(|v| self.side.outward(&v))
            .transpose()
    }

    fn remove(&self, key: &Value) -> BridgeResult<Option<Value>> {
        self.inner
            .remove(&self.side.inward(key)?)?
            .map(|v| self.side.outward(&v))
            .transpose()
    }

    fn entries(&self) -> BridgeResult<Vec<(Value, Value)>> {
        self.inner
            .entries()?
            .iter()
            .map(|(k, v)| Ok((self.side.outward(k)?, self.side.outward(v)?)))
            .collect()
    }
}
