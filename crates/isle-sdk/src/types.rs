//! Type descriptors
//!
//! An abstract, runtime-independent model of what a universe knows about a
//! type: its qualified name, its kind, the interfaces it implements and the
//! erased signatures of its methods. Signatures refer to other types by
//! qualified name ([`TypeRef::Named`]) so a descriptor never points into a
//! foreign universe.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use rustc_hash::FxHashSet;

use crate::value::Value;

// ============================================================================
// Identity
// ============================================================================

/// Process-unique identity of a type descriptor.
///
/// Two descriptors describe "the same type" only if their ids are equal,
/// regardless of name or shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DescriptorId(u64);

impl DescriptorId {
    /// Allocate a fresh descriptor id
    pub fn new() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        DescriptorId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for DescriptorId {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Kinds and references
// ============================================================================

/// Kind of a named type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// Interface: the only kind that is ever bridged by proxy
    Interface,
    /// Concrete class
    Class,
    /// Enumeration with named constants
    Enum,
    /// Throwable type
    Exception,
}

/// Primitive value kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    /// Boolean
    Bool,
    /// 32-bit signed integer
    Int,
    /// 64-bit signed integer
    Long,
    /// 64-bit float
    Double,
    /// Unicode scalar
    Char,
}

impl PrimitiveKind {
    fn admits(&self, value: &Value) -> bool {
        matches!(
            (self, value),
            (PrimitiveKind::Bool, Value::Bool(_))
                | (PrimitiveKind::Int, Value::Int(_))
                | (PrimitiveKind::Long, Value::Long(_))
                | (PrimitiveKind::Double, Value::Double(_))
                | (PrimitiveKind::Char, Value::Char(_))
        )
    }

    /// Source-level name of the primitive
    pub fn name(&self) -> &'static str {
        match self {
            PrimitiveKind::Bool => "bool",
            PrimitiveKind::Int => "int",
            PrimitiveKind::Long => "long",
            PrimitiveKind::Double => "double",
            PrimitiveKind::Char => "char",
        }
    }
}

/// Erased shape of a parameter or return type.
///
/// Generic arguments are not represented: a `List<Foo>` is just
/// [`TypeRef::List`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeRef {
    /// No value
    Void,
    /// Primitive value
    Primitive(PrimitiveKind),
    /// String value
    String,
    /// Any value at all
    Any,
    /// A named type, resolved per universe by qualified name
    Named(String),
    /// Array of the element type
    Array(Box<TypeRef>),
    /// Ordered sequence
    List,
    /// Set of unique values
    Set,
    /// Key/value mapping
    Map,
}

impl TypeRef {
    /// Reference a named type
    pub fn named(name: impl Into<String>) -> Self {
        TypeRef::Named(name.into())
    }

    /// Array of `element`
    pub fn array_of(element: TypeRef) -> Self {
        TypeRef::Array(Box::new(element))
    }

    /// `int`
    pub fn int() -> Self {
        TypeRef::Primitive(PrimitiveKind::Int)
    }

    /// `bool`
    pub fn bool() -> Self {
        TypeRef::Primitive(PrimitiveKind::Bool)
    }

    /// `long`
    pub fn long() -> Self {
        TypeRef::Primitive(PrimitiveKind::Long)
    }

    /// `double`
    pub fn double() -> Self {
        TypeRef::Primitive(PrimitiveKind::Double)
    }

    /// Whether this is a list, set or map
    pub fn is_collection(&self) -> bool {
        matches!(self, TypeRef::List | TypeRef::Set | TypeRef::Map)
    }

    /// Whether values of this type mean the same thing in every universe
    pub fn is_portable(&self) -> bool {
        match self {
            TypeRef::Primitive(_) | TypeRef::String => true,
            TypeRef::Array(element) => element.is_portable(),
            _ => false,
        }
    }

    /// Whether `value` has a runtime shape this type accepts
    pub fn admits(&self, value: &Value) -> bool {
        match (self, value) {
            (TypeRef::Any, _) => true,
            (TypeRef::Void, _) | (TypeRef::Primitive(_), Value::Null) => false,
            (_, Value::Null) => true,
            (TypeRef::Primitive(kind), value) => kind.admits(value),
            (TypeRef::String, Value::Str(_))
            | (TypeRef::List, Value::List(_))
            | (TypeRef::Set, Value::Set(_))
            | (TypeRef::Map, Value::Map(_)) => true,
            (TypeRef::Array(element), Value::Array(array)) => **element == *array.element_type(),
            (TypeRef::Named(name), Value::Enum(constant)) => constant.ty().name() == name,
            (TypeRef::Named(name), Value::Exception(exception)) => exception.ty().is_a(name),
            (TypeRef::Named(name), Value::Object(object)) => object.type_descriptor().is_a(name),
            _ => false,
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Void => write!(f, "void"),
            TypeRef::Primitive(p) => write!(f, "{}", p.name()),
            TypeRef::String => write!(f, "string"),
            TypeRef::Any => write!(f, "any"),
            TypeRef::Named(name) => write!(f, "{}", name),
            TypeRef::Array(elem) => write!(f, "{}[]", elem),
            TypeRef::List => write!(f, "list"),
            TypeRef::Set => write!(f, "set"),
            TypeRef::Map => write!(f, "map"),
        }
    }
}

// ============================================================================
// Signatures
// ============================================================================

/// A declared method parameter
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Parameter {
    /// Parameter type
    pub ty: TypeRef,
    /// The callee is documented to mutate this argument in place.
    ///
    /// Collections passed to such a parameter cross as live views so the
    /// caller observes the mutation.
    pub mutated: bool,
}

impl Parameter {
    /// Create an ordinary parameter
    pub fn new(ty: TypeRef) -> Self {
        Self { ty, mutated: false }
    }

    /// Create a parameter the callee mutates
    pub fn mutated(ty: TypeRef) -> Self {
        Self { ty, mutated: true }
    }
}

/// Erased method signature
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodSignature {
    /// Method name
    pub name: String,
    /// Parameters in order
    pub params: Vec<Parameter>,
    /// Return type
    pub returns: TypeRef,
}

impl MethodSignature {
    /// Create a `void` method with no parameters
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            returns: TypeRef::Void,
        }
    }

    /// Add a parameter
    pub fn param(mut self, ty: TypeRef) -> Self {
        self.params.push(Parameter::new(ty));
        self
    }

    /// Add a parameter the callee mutates
    pub fn mutated_param(mut self, ty: TypeRef) -> Self {
        self.params.push(Parameter::mutated(ty));
        self
    }

    /// Set the return type
    pub fn returns(mut self, ty: TypeRef) -> Self {
        self.returns = ty;
        self
    }

    /// Number of parameters
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// Whether every argument fits the declared parameter at its position
    pub fn accepts(&self, args: &[Value]) -> bool {
        self.arity() == args.len()
            && self
                .param_types()
                .zip(args)
                .all(|(ty, arg)| ty.admits(arg))
    }

    /// Iterate over parameter types
    pub fn param_types(&self) -> impl Iterator<Item = &TypeRef> {
        self.params.iter().map(|p| &p.ty)
    }

    /// The implicit identity methods every object answers
    /// (`equals`, `hashCode`, `toString`), if `name`/`arity` names one.
    pub fn object_method(name: &str, arity: usize) -> Option<MethodSignature> {
        match (name, arity) {
            ("equals", 1) => Some(
                MethodSignature::new("equals")
                    .param(TypeRef::Any)
                    .returns(TypeRef::bool()),
            ),
            ("hashCode", 0) => Some(MethodSignature::new("hashCode").returns(TypeRef::int())),
            ("toString", 0) => Some(MethodSignature::new("toString").returns(TypeRef::String)),
            _ => None,
        }
    }
}

impl fmt::Display for MethodSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            if p.mutated {
                write!(f, "mut ")?;
            }
            write!(f, "{}", p.ty)?;
        }
        write!(f, "): {}", self.returns)
    }
}

// ============================================================================
// Descriptors
// ============================================================================

/// Everything a universe knows about one named type
pub struct TypeDescriptor {
    id: DescriptorId,
    name: String,
    kind: TypeKind,
    interfaces: Vec<Arc<TypeDescriptor>>,
    superclass: Option<Arc<TypeDescriptor>>,
    methods: Vec<MethodSignature>,
    constants: Vec<String>,
}

impl TypeDescriptor {
    /// Start describing a new type
    pub fn builder(name: impl Into<String>, kind: TypeKind) -> DescriptorBuilder {
        DescriptorBuilder {
            name: name.into(),
            kind,
            interfaces: Vec::new(),
            superclass: None,
            methods: Vec::new(),
            constants: Vec::new(),
        }
    }

    /// Descriptor identity
    pub fn id(&self) -> DescriptorId {
        self.id
    }

    /// Qualified name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Type kind
    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    /// Whether this is an interface
    pub fn is_interface(&self) -> bool {
        self.kind == TypeKind::Interface
    }

    /// Whether this is an enum
    pub fn is_enum(&self) -> bool {
        self.kind == TypeKind::Enum
    }

    /// Whether this is an exception type
    pub fn is_exception(&self) -> bool {
        self.kind == TypeKind::Exception
    }

    /// Directly implemented (or, for interfaces, extended) interfaces
    pub fn interfaces(&self) -> &[Arc<TypeDescriptor>] {
        &self.interfaces
    }

    /// Superclass, if any
    pub fn superclass(&self) -> Option<&Arc<TypeDescriptor>> {
        self.superclass.as_ref()
    }

    /// Methods declared directly on this type
    pub fn methods(&self) -> &[MethodSignature] {
        &self.methods
    }

    /// Enum constant names in ordinal order
    pub fn constants(&self) -> &[String] {
        &self.constants
    }

    /// Ordinal of an enum constant
    pub fn constant_index(&self, name: &str) -> Option<usize> {
        self.constants.iter().position(|c| c == name)
    }

    /// Every interface reachable from this type, depth-first in declaration
    /// order: declared interfaces and their parents first, then those of the
    /// superclass chain. Each interface appears once.
    pub fn all_interfaces(&self) -> Vec<Arc<TypeDescriptor>> {
        let mut out = Vec::new();
        let mut seen = FxHashSet::default();
        self.collect_interfaces(&mut out, &mut seen);
        out
    }

    fn collect_interfaces(
        &self,
        out: &mut Vec<Arc<TypeDescriptor>>,
        seen: &mut FxHashSet<DescriptorId>,
    ) {
        for iface in &self.interfaces {
            if seen.insert(iface.id) {
                out.push(iface.clone());
                iface.collect_interfaces(out, seen);
            }
        }
        if let Some(parent) = &self.superclass {
            parent.collect_interfaces(out, seen);
        }
    }

    /// Declared methods followed by every inherited method
    pub fn all_methods(&self) -> Vec<&MethodSignature> {
        let mut out = Vec::new();
        self.collect_methods(&mut out);
        out
    }

    fn collect_methods<'a>(&'a self, out: &mut Vec<&'a MethodSignature>) {
        out.extend(self.methods.iter());
        for iface in &self.interfaces {
            iface.collect_methods(out);
        }
        if let Some(parent) = &self.superclass {
            parent.collect_methods(out);
        }
    }

    /// Find a declared or inherited method by name and arity
    pub fn find_method(&self, name: &str, arity: usize) -> Option<&MethodSignature> {
        self.all_methods()
            .into_iter()
            .find(|m| m.name == name && m.arity() == arity)
    }

    /// Pick the overload of `name` that fits `args`.
    ///
    /// Overloads with the same arity are told apart by the runtime shape of
    /// the arguments; the first declared one that accepts them wins. When
    /// none accepts them the first declared overload is returned, so the
    /// mismatch surfaces as a conversion failure rather than a missing method.
    pub fn select_method(&self, name: &str, args: &[Value]) -> Option<&MethodSignature> {
        let candidates: Vec<_> = self
            .all_methods()
            .into_iter()
            .filter(|m| m.name == name && m.arity() == args.len())
            .collect();
        match candidates.as_slice() {
            [] => None,
            [only] => Some(*only),
            [first, ..] => Some(
                candidates
                    .iter()
                    .copied()
                    .find(|m| m.accepts(args))
                    .unwrap_or(*first),
            ),
        }
    }

    /// Whether this type is, extends or implements the type called `name`
    pub fn is_a(&self, name: &str) -> bool {
        self.name == name
            || self.superclass.as_ref().map_or(false, |parent| parent.is_a(name))
            || self.all_interfaces().iter().any(|iface| iface.name() == name)
    }

    /// Whether a method with this name and arity is declared or inherited
    pub fn declares(&self, name: &str, arity: usize) -> bool {
        self.find_method(name, arity).is_some()
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("id", &self.id.as_u64())
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field(
                "interfaces",
                &self.interfaces.iter().map(|i| i.name()).collect::<Vec<_>>(),
            )
            .field("methods", &self.methods.len())
            .finish()
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Builder for [`TypeDescriptor`]
#[derive(Debug, Clone)]
pub struct DescriptorBuilder {
    name: String,
    kind: TypeKind,
    interfaces: Vec<Arc<TypeDescriptor>>,
    superclass: Option<Arc<TypeDescriptor>>,
    methods: Vec<MethodSignature>,
    constants: Vec<String>,
}

impl DescriptorBuilder {
    /// Implement (or extend) an interface
    pub fn implements(mut self, iface: Arc<TypeDescriptor>) -> Self {
        self.interfaces.push(iface);
        self
    }

    /// Set the superclass
    pub fn extends(mut self, parent: Arc<TypeDescriptor>) -> Self {
        self.superclass = Some(parent);
        self
    }

    /// Declare a method
    pub fn method(mut self, sig: MethodSignature) -> Self {
        self.methods.push(sig);
        self
    }

    /// Declare an enum constant
    pub fn constant(mut self, name: impl Into<String>) -> Self {
        self.constants.push(name.into());
        self
    }

    /// Finish with a fresh [`DescriptorId`]
    pub fn build(self) -> Arc<TypeDescriptor> {
        Arc::new(TypeDescriptor {
            id: DescriptorId::new(),
            name: self.name,
            kind: self.kind,
            interfaces: self.interfaces,
            superclass: self.superclass,
            methods: self.methods,
            constants: self.constants,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named_iface(name: &str, methods: &[&str]) -> Arc<TypeDescriptor> {
        methods
            .iter()
            .fold(TypeDescriptor::builder(name, TypeKind::Interface), |b, m| {
                b.method(MethodSignature::new(*m))
            })
            .build()
    }

    #[test]
    fn test_descriptor_ids_unique() {
        let a = named_iface("a.A", &[]);
        let b = named_iface("a.A", &[]);
        assert_ne!(a.id(), b.id());
        assert_eq!(a.name(), b.name());
    }

    #[test]
    fn test_all_interfaces_depth_first() {
        let base = named_iface("x.Base", &["base"]);
        let left = TypeDescriptor::builder("x.Left", TypeKind::Interface)
            .implements(base.clone())
            .build();
        let right = TypeDescriptor::builder("x.Right", TypeKind::Interface)
            .implements(base.clone())
            .build();
        let parent = TypeDescriptor::builder("x.Parent", TypeKind::Class)
            .implements(named_iface("x.Other", &[]))
            .build();
        let class = TypeDescriptor::builder("x.Impl", TypeKind::Class)
            .implements(left)
            .implements(right)
            .extends(parent)
            .build();

        let names: Vec<_> = class
            .all_interfaces()
            .iter()
            .map(|i| i.name().to_string())
            .collect();
        assert_eq!(names, vec!["x.Left", "x.Base", "x.Right", "x.Other"]);
    }

    #[test]
    fn test_find_inherited_method() {
        let base = named_iface("x.Base", &["ping"]);
        let class = TypeDescriptor::builder("x.Impl", TypeKind::Class)
            .implements(base)
            .method(MethodSignature::new("own").param(TypeRef::int()))
            .build();

        assert!(class.declares("ping", 0));
        assert!(class.declares("own", 1));
        assert!(!class.declares("own", 0));
        assert_eq!(class.all_methods().len(), 2);
    }

    #[test]
    fn test_enum_constants() {
        let color = TypeDescriptor::builder("x.Color", TypeKind::Enum)
            .constant("RED")
            .constant("GREEN")
            .build();
        assert!(color.is_enum());
        assert_eq!(color.constant_index("GREEN"), Some(1));
        assert_eq!(color.constant_index("BLUE"), None);
    }

    #[test]
    fn test_signature_display() {
        let sig = MethodSignature::new("fill")
            .mutated_param(TypeRef::List)
            .param(TypeRef::array_of(TypeRef::int()))
            .returns(TypeRef::named("x.Result"));
        assert_eq!(sig.to_string(), "fill(mut list, int[]): x.Result");
    }

    #[test]
    fn test_object_methods() {
        assert!(MethodSignature::object_method("equals", 1).is_some());
        assert!(MethodSignature::object_method("equals", 0).is_none());
        assert_eq!(
            MethodSignature::object_method("hashCode", 0).unwrap().returns,
            TypeRef::int()
        );
        assert!(MethodSignature::object_method("greet", 0).is_none());
    }

    #[test]
    fn test_type_ref_admits_runtime_shapes() {
        let named = TypeDescriptor::builder("x.Named", TypeKind::Interface).build();
        let person = TypeDescriptor::builder("x.Person", TypeKind::Class)
            .implements(named)
            .build();
        let color = TypeDescriptor::builder("x.Color", TypeKind::Enum)
            .constant("RED")
            .build();
        let red = Value::Enum(crate::value::EnumConstant::new(color, "RED").unwrap());

        assert!(TypeRef::int().admits(&Value::Int(1)));
        assert!(!TypeRef::int().admits(&Value::Long(1)));
        assert!(!TypeRef::int().admits(&Value::Null));
        assert!(TypeRef::String.admits(&Value::Null));
        assert!(TypeRef::List.admits(&Value::list(Vec::new())));
        assert!(!TypeRef::Set.admits(&Value::list(Vec::new())));
        assert!(TypeRef::array_of(TypeRef::int()).admits(&Value::array(TypeRef::int(), vec![])));
        assert!(TypeRef::named("x.Color").admits(&red));
        assert!(!TypeRef::named("x.Other").admits(&red));
        assert!(TypeRef::Any.admits(&red));
        assert!(person.is_a("x.Named"));
        assert!(person.is_a("x.Person"));
        assert!(!person.is_a("x.Color"));
    }

    #[test]
    fn test_portable_types() {
        assert!(TypeRef::int().is_portable());
        assert!(TypeRef::String.is_portable());
        assert!(TypeRef::array_of(TypeRef::array_of(TypeRef::double())).is_portable());
        assert!(!TypeRef::array_of(TypeRef::named("x.Color")).is_portable());
        assert!(!TypeRef::List.is_portable());
    }
}
