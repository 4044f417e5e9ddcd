//! Runtime value shapes that cross a universe boundary
//!
//! Primitives and strings are plain data and mean the same thing in every
//! universe. Enums, arrays, collections, exceptions and objects carry
//! universe-specific type information and must be converted when they cross.
//!
//! Equality follows the domain's notion: primitives, strings, enums, arrays
//! and collections compare by content; objects and exceptions compare by
//! identity.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHasher;

use crate::collections::{HashedMap, HashedSet, MapRef, SequenceRef, SetRef, VecSequence};
use crate::error::{BridgeError, BridgeResult};
use crate::exception::Exception;
use crate::object::{identity, ObjectRef};
use crate::types::{TypeDescriptor, TypeRef};

/// A value as seen by one universe
#[derive(Clone)]
pub enum Value {
    /// Absent value
    Null,
    /// Boolean
    Bool(bool),
    /// 32-bit integer
    Int(i32),
    /// 64-bit integer
    Long(i64),
    /// 64-bit float
    Double(f64),
    /// Unicode scalar
    Char(char),
    /// Immutable string
    Str(Arc<str>),
    /// Enum constant
    Enum(EnumConstant),
    /// Fixed-length array
    Array(ArrayRef),
    /// Ordered sequence
    List(SequenceRef),
    /// Set of unique values
    Set(SetRef),
    /// Key/value mapping
    Map(MapRef),
    /// Exception object
    Exception(Arc<Exception>),
    /// Any other object
    Object(ObjectRef),
}

impl Value {
    // ========================================================================
    // Constructors
    // ========================================================================

    /// Create a string value
    pub fn str(s: impl AsRef<str>) -> Self {
        Value::Str(Arc::from(s.as_ref()))
    }

    /// Create a list backed by a fresh [`VecSequence`]
    pub fn list(items: impl IntoIterator<Item = Value>) -> Self {
        Value::List(Arc::new(VecSequence::from_vec(items.into_iter().collect())))
    }

    /// Create a set backed by a fresh [`HashedSet`]
    pub fn set(items: impl IntoIterator<Item = Value>) -> Self {
        Value::Set(Arc::new(HashedSet::from_iter(items)))
    }

    /// Create a map backed by a fresh [`HashedMap`]
    pub fn map(entries: impl IntoIterator<Item = (Value, Value)>) -> Self {
        Value::Map(Arc::new(HashedMap::from_iter(entries)))
    }

    /// Create an array
    pub fn array(element: TypeRef, items: Vec<Value>) -> Self {
        Value::Array(Arc::new(Array::new(element, items)))
    }

    /// Create an object value
    pub fn object(obj: ObjectRef) -> Self {
        Value::Object(obj)
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Check if value is null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Extract boolean value
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Extract i32 value
    pub fn as_int(&self) -> Option<i32> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Extract i64 value
    pub fn as_long(&self) -> Option<i64> {
        match self {
            Value::Long(i) => Some(*i),
            _ => None,
        }
    }

    /// Extract string contents
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Extract an object reference
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Extract a sequence
    pub fn as_list(&self) -> Option<&SequenceRef> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    /// Extract a set
    pub fn as_set(&self) -> Option<&SetRef> {
        match self {
            Value::Set(s) => Some(s),
            _ => None,
        }
    }

    /// Extract a map
    pub fn as_map(&self) -> Option<&MapRef> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Extract an array
    pub fn as_array(&self) -> Option<&ArrayRef> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Extract an enum constant
    pub fn as_enum(&self) -> Option<&EnumConstant> {
        match self {
            Value::Enum(e) => Some(e),
            _ => None,
        }
    }

    /// Extract an exception
    pub fn as_exception(&self) -> Option<&Arc<Exception>> {
        match self {
            Value::Exception(e) => Some(e),
            _ => None,
        }
    }

    /// Get the shape name as a string
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Long(_) => "long",
            Value::Double(_) => "double",
            Value::Char(_) => "char",
            Value::Str(_) => "string",
            Value::Enum(_) => "enum",
            Value::Array(_) => "array",
            Value::List(_) => "list",
            Value::Set(_) => "set",
            Value::Map(_) => "map",
            Value::Exception(_) => "exception",
            Value::Object(_) => "object",
        }
    }

    /// Short rendering for diagnostics; never walks into collections
    pub fn describe(&self) -> String {
        match self {
            Value::Enum(e) => format!("enum {}.{}", e.ty().name(), e.name()),
            Value::Exception(e) => format!("exception {}", e.ty().name()),
            Value::Object(o) => format!("object of type {}", o.type_descriptor().name()),
            Value::Array(a) => format!("array of {}", a.element_type()),
            Value::Str(_) | Value::List(_) | Value::Set(_) | Value::Map(_) => {
                self.type_name().to_string()
            }
            other => format!("{:?}", other),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Long(a), Value::Long(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a.to_bits() == b.to_bits(),
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Enum(a), Value::Enum(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => {
                Arc::ptr_eq(a, b) || *a.items.read() == *b.items.read()
            }
            (Value::List(a), Value::List(b)) => {
                Arc::ptr_eq(a, b) || matches!((a.snapshot(), b.snapshot()), (Ok(x), Ok(y)) if x == y)
            }
            (Value::Set(a), Value::Set(b)) => Arc::ptr_eq(a, b) || sets_equal(a, b),
            (Value::Map(a), Value::Map(b)) => Arc::ptr_eq(a, b) || maps_equal(a, b),
            (Value::Exception(a), Value::Exception(b)) => Arc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => identity(a) == identity(b),
            _ => false,
        }
    }
}

impl Eq for Value {}

fn sets_equal(a: &SetRef, b: &SetRef) -> bool {
    let (Ok(xs), Ok(ys)) = (a.snapshot(), b.snapshot()) else {
        return false;
    };
    xs.len() == ys.len() && xs.iter().all(|x| ys.contains(x))
}

fn maps_equal(a: &MapRef, b: &MapRef) -> bool {
    let (Ok(xs), Ok(ys)) = (a.entries(), b.entries()) else {
        return false;
    };
    xs.len() == ys.len() && xs.iter().all(|entry| ys.contains(entry))
}

fn hash_one<T: Hash + ?Sized>(value: &T) -> u64 {
    let mut hasher = FxHasher::default();
    value.hash(&mut hasher);
    hasher.finish()
}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Bool(b) => b.hash(state),
            Value::Int(i) => i.hash(state),
            Value::Long(i) => i.hash(state),
            Value::Double(d) => d.to_bits().hash(state),
            Value::Char(c) => c.hash(state),
            Value::Str(s) => s.hash(state),
            Value::Enum(e) => e.hash(state),
            Value::Array(a) => a.items.read().hash(state),
            Value::List(l) => l.snapshot().unwrap_or_default().hash(state),
            // Unordered shapes combine element hashes commutatively
            Value::Set(s) => s
                .snapshot()
                .unwrap_or_default()
                .iter()
                .fold(0u64, |acc, v| acc.wrapping_add(hash_one(v)))
                .hash(state),
            Value::Map(m) => m
                .entries()
                .unwrap_or_default()
                .iter()
                .fold(0u64, |acc, entry| acc.wrapping_add(hash_one(entry)))
                .hash(state),
            Value::Exception(e) => (Arc::as_ptr(e) as usize).hash(state),
            Value::Object(o) => identity(o).hash(state),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Bool(b) => write!(f, "Bool({})", b),
            Value::Int(i) => write!(f, "Int({})", i),
            Value::Long(i) => write!(f, "Long({})", i),
            Value::Double(d) => write!(f, "Double({})", d),
            Value::Char(c) => write!(f, "Char({:?})", c),
            Value::Str(s) => write!(f, "Str({:?})", s),
            Value::Enum(e) => write!(f, "Enum({}.{})", e.ty().name(), e.name()),
            Value::Array(a) => write!(f, "Array({:?})", a.to_vec()),
            Value::List(l) => match l.snapshot() {
                Ok(items) => write!(f, "List({:?})", items),
                Err(e) => write!(f, "List(<{}>)", e),
            },
            Value::Set(s) => match s.snapshot() {
                Ok(items) => write!(f, "Set({:?})", items),
                Err(e) => write!(f, "Set(<{}>)", e),
            },
            Value::Map(m) => match m.entries() {
                Ok(entries) => write!(f, "Map({:?})", entries),
                Err(e) => write!(f, "Map(<{}>)", e),
            },
            Value::Exception(e) => write!(f, "Exception({})", e),
            Value::Object(o) => {
                write!(f, "Object({}@{:#x})", o.type_descriptor().name(), identity(o))
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Long(i)
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Value::Double(d)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::str(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Arc::from(s))
    }
}

impl From<ObjectRef> for Value {
    fn from(o: ObjectRef) -> Self {
        Value::Object(o)
    }
}

// ============================================================================
// Enum constants
// ============================================================================

/// A constant of an enum type, identified by name within its descriptor
#[derive(Clone)]
pub struct EnumConstant {
    ty: Arc<TypeDescriptor>,
    name: Arc<str>,
}

impl EnumConstant {
    /// Look up `name` among the constants of `ty`
    pub fn new(ty: Arc<TypeDescriptor>, name: &str) -> BridgeResult<Self> {
        if !ty.is_enum() || ty.constant_index(name).is_none() {
            return Err(BridgeError::TypeNotFound {
                name: format!("{}.{}", ty.name(), name),
                universe: "<enum>".to_string(),
            });
        }
        Ok(Self {
            ty,
            name: Arc::from(name),
        })
    }

    /// The enum type
    pub fn ty(&self) -> &Arc<TypeDescriptor> {
        &self.ty
    }

    /// Constant name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Position among the declared constants
    pub fn ordinal(&self) -> usize {
        self.ty.constant_index(&self.name).unwrap_or(0)
    }
}

impl PartialEq for EnumConstant {
    fn eq(&self, other: &Self) -> bool {
        self.ty.id() == other.ty.id() && self.name == other.name
    }
}

impl Eq for EnumConstant {}

impl Hash for EnumConstant {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.ty.id().hash(state);
        self.name.hash(state);
    }
}

impl fmt::Debug for EnumConstant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.ty.name(), self.name)
    }
}

// ============================================================================
// Arrays
// ============================================================================

/// Shared handle to an [`Array`]
pub type ArrayRef = Arc<Array>;

/// Fixed-length array with settable elements
pub struct Array {
    element: TypeRef,
    items: RwLock<Vec<Value>>,
}

impl Array {
    /// Create an array of `element` holding `items`
    pub fn new(element: TypeRef, items: Vec<Value>) -> Self {
        Self {
            element,
            items: RwLock::new(items),
        }
    }

    /// Declared element type
    pub fn element_type(&self) -> &TypeRef {
        &self.element
    }

    /// Array length
    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    /// Check if array is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get element at index
    pub fn get(&self, index: usize) -> Option<Value> {
        self.items.read().get(index).cloned()
    }

    /// Replace element at index
    pub fn set(&self, index: usize, value: Value) -> BridgeResult<()> {
        let mut items = self.items.write();
        let len = items.len();
        let slot = items
            .get_mut(index)
            .ok_or(BridgeError::IndexOutOfBounds { index, len })?;
        *slot = value;
        Ok(())
    }

    /// Copy out the elements
    pub fn to_vec(&self) -> Vec<Value> {
        self.items.read().clone()
    }
}

impl fmt::Debug for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Array")
            .field("element", &self.element)
            .field("items", &*self.items.read())
            .finish()
    }
}
