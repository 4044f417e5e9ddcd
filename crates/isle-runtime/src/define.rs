//! Type definition DSL
//!
//! Resolves super-types by name inside the defining universe, so a module can
//! describe its types the way its sources name them:
//!
//! ```ignore
//! universe
//!     .class("app.ConsoleGreeter")
//!     .implements("api.Greeter")
//!     .define()?;
//! ```

use std::sync::Arc;

use isle_sdk::{DescriptorBuilder, MethodSignature, TypeDescriptor, TypeKind};

use crate::error::{RuntimeError, RuntimeResult};
use crate::universe::ModuleUniverse;

/// Builder for a type defined in a [`ModuleUniverse`]
pub struct TypeBuilder<'u> {
    universe: &'u ModuleUniverse,
    inner: DescriptorBuilder,
    error: Option<RuntimeError>,
}

impl<'u> TypeBuilder<'u> {
    pub(crate) fn new(universe: &'u ModuleUniverse, name: String, kind: TypeKind) -> Self {
        Self {
            universe,
            inner: TypeDescriptor::builder(name, kind),
            error: None,
        }
    }

    fn resolve(&mut self, name: &str) -> Option<Arc<TypeDescriptor>> {
        let found = self.universe.lookup(name);
        if found.is_none() && self.error.is_none() {
            self.error = Some(RuntimeError::UnknownType {
                name: name.to_string(),
                universe: isle_sdk::TypeUniverse::name(self.universe).to_string(),
            });
        }
        found
    }

    /// Implement (or, for interfaces, extend) the interface named `name`
    pub fn implements(mut self, name: &str) -> Self {
        if let Some(iface) = self.resolve(name) {
            if !iface.is_interface() && self.error.is_none() {
                self.error = Some(RuntimeError::NotAnInterface(name.to_string()));
            }
            self.inner = self.inner.implements(iface);
        }
        self
    }

    /// Extend the class or exception named `name`
    pub fn extends(mut self, name: &str) -> Self {
        if let Some(parent) = self.resolve(name) {
            self.inner = self.inner.extends(parent);
        }
        self
    }

    /// Declare a method
    pub fn method(mut self, sig: MethodSignature) -> Self {
        self.inner = self.inner.method(sig);
        self
    }

    /// Declare an enum constant
    pub fn constant(mut self, name: &str) -> Self {
        self.inner = self.inner.constant(name);
        self
    }

    /// Build the descriptor and register it in the universe
    pub fn define(self) -> RuntimeResult<Arc<TypeDescriptor>> {
        if let Some(err) = self.error {
            return Err(err);
        }
        self.universe.define(self.inner.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use isle_sdk::TypeRef;

    #[test]
    fn test_define_with_supertypes() {
        let u = ModuleUniverse::new("u");
        let named = u
            .interface("x.Named")
            .method(MethodSignature::new("name").returns(TypeRef::String))
            .define()
            .unwrap();
        let class = u.class("x.Person").implements("x.Named").define().unwrap();

        assert_eq!(class.interfaces()[0].id(), named.id());
        assert!(class.declares("name", 0));
    }

    #[test]
    fn test_unknown_supertype_is_reported() {
        let u = ModuleUniverse::new("u");
        let err = u.class("x.Person").implements("x.Missing").define().unwrap_err();
        assert!(matches!(err, RuntimeError::UnknownType { .. }));
    }

    #[test]
    fn test_class_is_not_an_interface() {
        let u = ModuleUniverse::new("u");
        u.class("x.Base").define().unwrap();
        let err = u.class("x.Child").implements("x.Base").define().unwrap_err();
        assert!(matches!(err, RuntimeError::NotAnInterface(_)));
    }
}
