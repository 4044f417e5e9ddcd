//! Type equivalence resolution
//!
//! Two universes never share type identity, so "the same interface" has to be
//! decided structurally: same qualified name, and every method of the
//! destination interface has a source method with the same name, arity and
//! pairwise-equivalent parameter and return types.
//!
//! Results are cached per (source type, source universe, destination
//! universe), negative outcomes included.

use std::fmt;
use std::hash::BuildHasherDefault;
use std::sync::Arc;

use dashmap::DashMap;
use rustc_hash::{FxHashSet, FxHasher};
use tracing::debug;

use isle_sdk::{
    BridgeError, BridgeResult, DescriptorId, MethodSignature, TypeDescriptor, TypeKind, TypeRef,
    TypeUniverse, UniverseId,
};

/// Destination-universe interfaces structurally equivalent to the interfaces
/// of a source type
pub struct EquivalentInterfaceSet {
    source_type: Arc<TypeDescriptor>,
    universe: UniverseId,
    interfaces: Vec<Arc<TypeDescriptor>>,
}

impl EquivalentInterfaceSet {
    /// The source type this set was computed for
    pub fn source_type(&self) -> &Arc<TypeDescriptor> {
        &self.source_type
    }

    /// Destination universe of the interfaces
    pub fn universe(&self) -> UniverseId {
        self.universe
    }

    /// Destination interfaces, in discovery order
    pub fn interfaces(&self) -> &[Arc<TypeDescriptor>] {
        &self.interfaces
    }

    /// Number of interfaces
    pub fn len(&self) -> usize {
        self.interfaces.len()
    }

    /// Whether the set is empty (never true for a published set)
    pub fn is_empty(&self) -> bool {
        self.interfaces.is_empty()
    }

    /// Whether any interface declares `name` taking `arity` arguments
    pub fn declares(&self, name: &str, arity: usize) -> bool {
        self.interfaces.iter().any(|i| i.declares(name, arity))
    }

    /// Comma-separated interface names for diagnostics
    pub fn names(&self) -> String {
        self.interfaces
            .iter()
            .map(|i| i.name())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Debug for EquivalentInterfaceSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EquivalentInterfaceSet")
            .field("source_type", &self.source_type.name())
            .field("interfaces", &self.names())
            .finish()
    }
}

// ============================================================================
// Structural equivalence
// ============================================================================

/// One structural comparison between a source and a destination universe.
///
/// Interface pairs under comparison are assumed equivalent while their
/// methods are checked, so recursive signatures (`Node next()`) terminate.
pub struct Equivalence<'a> {
    source: &'a dyn TypeUniverse,
    target: &'a dyn TypeUniverse,
    verify_signatures: bool,
    assumed: FxHashSet<(DescriptorId, DescriptorId)>,
}

impl<'a> Equivalence<'a> {
    /// Compare types of `source` against types of `target`
    pub fn new(source: &'a dyn TypeUniverse, target: &'a dyn TypeUniverse, verify_signatures: bool) -> Self {
        Self {
            source,
            target,
            verify_signatures,
            assumed: FxHashSet::default(),
        }
    }

    /// Whether source interface `src` and destination interface `dst` are the
    /// same interface
    pub fn interfaces(&mut self, src: &Arc<TypeDescriptor>, dst: &Arc<TypeDescriptor>) -> bool {
        if src.id() == dst.id() {
            return true;
        }
        if src.name() != dst.name() || !src.is_interface() || !dst.is_interface() {
            return false;
        }
        if !self.verify_signatures {
            return true;
        }

        let pair = (src.id(), dst.id());
        if self.assumed.contains(&pair) {
            return true;
        }
        // Pairs accepted while `pair` is assumed stand or fall with it
        let before = self.assumed.clone();
        self.assumed.insert(pair);

        let src_methods = src.all_methods();
        let equivalent = dst.all_methods().into_iter().all(|wanted| {
            src_methods
                .iter()
                .any(|candidate| self.methods(candidate, wanted))
        });
        if !equivalent {
            self.assumed = before;
        }
        equivalent
    }

    /// Whether source method `src` can serve a call of destination method `dst`
    pub fn methods(&mut self, src: &MethodSignature, dst: &MethodSignature) -> bool {
        src.name == dst.name
            && src.arity() == dst.arity()
            && src
                .param_types()
                .zip(dst.param_types())
                .all(|(a, b)| self.types(a, b))
            && self.types(&src.returns, &dst.returns)
    }

    /// Whether source type reference `src` is equivalent to destination type
    /// reference `dst`
    pub fn types(&mut self, src: &TypeRef, dst: &TypeRef) -> bool {
        match (src, dst) {
            (TypeRef::Void, TypeRef::Void)
            | (TypeRef::String, TypeRef::String)
            | (TypeRef::Any, TypeRef::Any)
            | (TypeRef::List, TypeRef::List)
            | (TypeRef::Set, TypeRef::Set)
            | (TypeRef::Map, TypeRef::Map) => true,
            (TypeRef::Primitive(a), TypeRef::Primitive(b)) => a == b,
            (TypeRef::Array(a), TypeRef::Array(b)) => self.types(a, b),
            (TypeRef::Named(a), TypeRef::Named(b)) => a == b && self.named(a),
            _ => false,
        }
    }

    fn named(&mut self, name: &str) -> bool {
        let (src, dst) = match (self.source.find_type(name), self.target.find_type(name)) {
            (Some(src), Some(dst)) => (src, dst),
            // Unresolvable on both sides: nothing to disagree about
            (None, None) => return true,
            _ => return false,
        };
        if src.id() == dst.id() {
            return true;
        }
        match (src.kind(), dst.kind()) {
            (TypeKind::Interface, TypeKind::Interface) => self.interfaces(&src, &dst),
            (TypeKind::Enum, TypeKind::Enum) | (TypeKind::Exception, TypeKind::Exception) => true,
            _ => false,
        }
    }
}

// ============================================================================
// Resolver
// ============================================================================

type ResolutionKey = (DescriptorId, UniverseId, UniverseId);

/// Caching resolver of [`EquivalentInterfaceSet`]s
pub struct TypeResolver {
    verify_signatures: bool,
    resolved: DashMap<
        ResolutionKey,
        BridgeResult<Arc<EquivalentInterfaceSet>>,
        BuildHasherDefault<FxHasher>,
    >,
}

impl TypeResolver {
    /// Create a resolver
    pub fn new(verify_signatures: bool) -> Self {
        Self {
            verify_signatures,
            resolved: DashMap::default(),
        }
    }

    /// Start a structural comparison between two universes
    pub fn equivalence<'a>(
        &self,
        source: &'a dyn TypeUniverse,
        target: &'a dyn TypeUniverse,
    ) -> Equivalence<'a> {
        Equivalence::new(source, target, self.verify_signatures)
    }

    /// Compute (or fetch) the destination interfaces equivalent to the
    /// interfaces of `source_type`.
    ///
    /// Fails with [`BridgeError::NotBridgeable`] when there are none.
    pub fn resolve(
        &self,
        source_type: &Arc<TypeDescriptor>,
        source: &dyn TypeUniverse,
        target: &dyn TypeUniverse,
    ) -> BridgeResult<Arc<EquivalentInterfaceSet>> {
        let key = (source_type.id(), source.id(), target.id());
        if let Some(cached) = self.resolved.get(&key) {
            return cached.value().clone();
        }

        let result = self.compute(source_type, source, target);
        match &result {
            Ok(set) => debug!(
                source_type = source_type.name(),
                target = target.name(),
                interfaces = %set.names(),
                "resolved equivalent interfaces"
            ),
            Err(err) => debug!(
                source_type = source_type.name(),
                target = target.name(),
                error = %err,
                "type is not bridgeable"
            ),
        }

        // First writer wins so every caller shares one published result
        self.resolved.entry(key).or_insert(result).value().clone()
    }

    fn compute(
        &self,
        source_type: &Arc<TypeDescriptor>,
        source: &dyn TypeUniverse,
        target: &dyn TypeUniverse,
    ) -> BridgeResult<Arc<EquivalentInterfaceSet>> {
        let mut candidates = Vec::new();
        if source_type.is_interface() {
            candidates.push(source_type.clone());
        }
        candidates.extend(source_type.all_interfaces());

        let mut equivalence = self.equivalence(source, target);
        let mut seen = FxHashSet::default();
        let mut interfaces = Vec::new();
        for candidate in &candidates {
            let Some(found) = target.find_type(candidate.name()) else {
                continue;
            };
            if seen.contains(&found.id()) {
                continue;
            }
            if equivalence.interfaces(candidate, &found) {
                seen.insert(found.id());
                interfaces.push(found);
            }
        }

        if interfaces.is_empty() {
            return Err(BridgeError::NotBridgeable {
                type_name: source_type.name().to_string(),
                universe: target.name().to_string(),
            });
        }
        Ok(Arc::new(EquivalentInterfaceSet {
            source_type: source_type.clone(),
            universe: target.id(),
            interfaces,
        }))
    }

    /// Number of cached resolutions
    pub fn len(&self) -> usize {
        self.resolved.len()
    }

    /// Whether nothing has been resolved yet
    pub fn is_empty(&self) -> bool {
        self.resolved.is_empty()
    }

    /// Forget every cached resolution
    pub fn clear(&self) {
        self.resolved.clear();
    }
}

impl fmt::Debug for TypeResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeResolver")
            .field("verify_signatures", &self.verify_signatures)
            .field("cached", &self.resolved.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustc_hash::FxHashMap;

    struct Fixed {
        id: UniverseId,
        name: &'static str,
        types: FxHashMap<String, Arc<TypeDescriptor>>,
    }

    impl Fixed {
        fn new(name: &'static str, types: Vec<Arc<TypeDescriptor>>) -> Self {
            Self {
                id: UniverseId::new(),
                name,
                types: types
                    .into_iter()
                    .map(|t| (t.name().to_string(), t))
                    .collect(),
            }
        }
    }

    impl TypeUniverse for Fixed {
        fn id(&self) -> UniverseId {
            self.id
        }

        fn name(&self) -> &str {
            self.name
        }

        fn find_type(&self, name: &str) -> Option<Arc<TypeDescriptor>> {
            self.types.get(name).cloned()
        }
    }

    fn greeter(returns: TypeRef) -> Arc<TypeDescriptor> {
        TypeDescriptor::builder("x.Greeter", TypeKind::Interface)
            .method(
                MethodSignature::new("greet")
                    .param(TypeRef::String)
                    .returns(returns),
            )
            .build()
    }

    fn node() -> Arc<TypeDescriptor> {
        TypeDescriptor::builder("x.Node", TypeKind::Interface)
            .method(MethodSignature::new("next").returns(TypeRef::named("x.Node")))
            .method(MethodSignature::new("value").returns(TypeRef::int()))
            .build()
    }

    fn implementor(name: &str, iface: &Arc<TypeDescriptor>) -> Arc<TypeDescriptor> {
        TypeDescriptor::builder(name, TypeKind::Class)
            .implements(iface.clone())
            .build()
    }

    #[test]
    fn test_resolves_structurally_equivalent_interface() {
        let a_iface = greeter(TypeRef::String);
        let b_iface = greeter(TypeRef::String);
        let a = Fixed::new("a", vec![a_iface.clone()]);
        let b = Fixed::new("b", vec![b_iface.clone()]);

        let resolver = TypeResolver::new(true);
        let set = resolver
            .resolve(&implementor("x.Impl", &a_iface), &a, &b)
            .unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.interfaces()[0].id(), b_iface.id());
        assert!(set.declares("greet", 1));
    }

    #[test]
    fn test_signature_drift_is_not_bridgeable() {
        let a_iface = greeter(TypeRef::String);
        let b = Fixed::new("b", vec![greeter(TypeRef::int())]);
        let a = Fixed::new("a", vec![a_iface.clone()]);

        let resolver = TypeResolver::new(true);
        let err = resolver
            .resolve(&implementor("x.Impl", &a_iface), &a, &b)
            .unwrap_err();
        assert!(err.is_not_bridgeable());
    }

    #[test]
    fn test_lenient_mode_matches_by_name() {
        let a_iface = greeter(TypeRef::String);
        let b = Fixed::new("b", vec![greeter(TypeRef::int())]);
        let a = Fixed::new("a", vec![a_iface.clone()]);

        let resolver = TypeResolver::new(false);
        assert!(resolver
            .resolve(&implementor("x.Impl", &a_iface), &a, &b)
            .is_ok());
    }

    #[test]
    fn test_recursive_signatures_terminate() {
        let a_node = node();
        let b_node = node();
        let a = Fixed::new("a", vec![a_node.clone()]);
        let b = Fixed::new("b", vec![b_node.clone()]);

        let resolver = TypeResolver::new(true);
        let set = resolver
            .resolve(&implementor("x.ListNode", &a_node), &a, &b)
            .unwrap();
        assert_eq!(set.interfaces()[0].id(), b_node.id());
    }

    #[test]
    fn test_results_are_cached_including_failures() {
        let a_iface = greeter(TypeRef::String);
        let a = Fixed::new("a", vec![a_iface.clone()]);
        let empty = Fixed::new("empty", vec![]);

        let resolver = TypeResolver::new(true);
        let ty = implementor("x.Impl", &a_iface);
        assert!(resolver.resolve(&ty, &a, &empty).is_err());
        assert!(resolver.resolve(&ty, &a, &empty).is_err());
        assert_eq!(resolver.len(), 1);
    }

    #[test]
    fn test_enum_and_exception_references_match_by_name() {
        let a_color = TypeDescriptor::builder("x.Color", TypeKind::Enum)
            .constant("RED")
            .build();
        let b_color = TypeDescriptor::builder("x.Color", TypeKind::Enum)
            .constant("RED")
            .build();
        let a = Fixed::new("a", vec![a_color]);
        let b = Fixed::new("b", vec![b_color]);

        let mut eq = Equivalence::new(&a, &b, true);
        assert!(eq.types(&TypeRef::named("x.Color"), &TypeRef::named("x.Color")));
        assert!(eq.types(
            &TypeRef::array_of(TypeRef::named("x.Color")),
            &TypeRef::array_of(TypeRef::named("x.Color"))
        ));
        assert!(!eq.types(&TypeRef::named("x.Color"), &TypeRef::String));
        assert!(!eq.types(&TypeRef::List, &TypeRef::Set));
    }

    fn pair(x: TypeRef) -> (Arc<TypeDescriptor>, Arc<TypeDescriptor>) {
        let i = TypeDescriptor::builder("p.I", TypeKind::Interface)
            .method(MethodSignature::new("j").returns(TypeRef::named("p.J")))
            .method(MethodSignature::new("x").returns(x))
            .build();
        let j = TypeDescriptor::builder("p.J", TypeKind::Interface)
            .method(MethodSignature::new("i").returns(TypeRef::named("p.I")))
            .build();
        (i, j)
    }

    #[test]
    fn test_failed_recursive_pair_discards_dependent_pairs() {
        let (a_i, a_j) = pair(TypeRef::int());
        let (b_i, b_j) = pair(TypeRef::String);
        let a = Fixed::new("a", vec![a_i.clone(), a_j.clone()]);
        let b = Fixed::new("b", vec![b_i.clone(), b_j.clone()]);

        let mut eq = Equivalence::new(&a, &b, true);
        assert!(!eq.interfaces(&a_i, &b_i));
        assert!(!eq.interfaces(&a_j, &b_j));

        let both = TypeDescriptor::builder("p.Both", TypeKind::Class)
            .implements(a_i.clone())
            .implements(a_j.clone())
            .build();
        let only_j = implementor("p.OnlyJ", &a_j);
        let resolver = TypeResolver::new(true);
        assert!(resolver.resolve(&both, &a, &b).unwrap_err().is_not_bridgeable());
        assert!(resolver.resolve(&only_j, &a, &b).unwrap_err().is_not_bridgeable());
    }

    #[test]
    fn test_mutually_recursive_interfaces_resolve() {
        let (a_i, a_j) = pair(TypeRef::int());
        let (b_i, b_j) = pair(TypeRef::int());
        let a = Fixed::new("a", vec![a_i.clone(), a_j.clone()]);
        let b = Fixed::new("b", vec![b_i.clone(), b_j.clone()]);

        let both = TypeDescriptor::builder("p.Both", TypeKind::Class)
            .implements(a_i)
            .implements(a_j)
            .build();
        let set = TypeResolver::new(true).resolve(&both, &a, &b).unwrap();
        let ids: Vec<_> = set.interfaces().iter().map(|i| i.id()).collect();
        assert_eq!(ids, vec![b_i.id(), b_j.id()]);
    }
}
