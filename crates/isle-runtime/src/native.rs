//! Closure-backed objects
//!
//! [`NativeObject`] implements [`Object`] with a method table of Rust
//! closures and a small field store. Methods receive the object itself, so
//! they can read fields or hand out `this`.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHasher};
use tracing::trace;

use isle_sdk::{BridgeError, CallResult, Object, ObjectRef, TypeDescriptor, Value};

/// Method implementation
pub type MethodFn = Arc<dyn Fn(&NativeObject, &[Value]) -> CallResult + Send + Sync>;

/// Object whose methods are Rust closures
pub struct NativeObject {
    ty: Arc<TypeDescriptor>,
    methods: FxHashMap<(String, usize), MethodFn>,
    fields: RwLock<FxHashMap<String, Value>>,
    this: Weak<NativeObject>,
}

impl NativeObject {
    /// Start building an object of type `ty`
    pub fn builder(ty: Arc<TypeDescriptor>) -> NativeObjectBuilder {
        NativeObjectBuilder {
            ty,
            methods: FxHashMap::default(),
            fields: FxHashMap::default(),
        }
    }

    /// This object as a shared handle
    pub fn this(&self) -> Option<ObjectRef> {
        self.this.upgrade().map(|this| this as ObjectRef)
    }

    /// `this` as a value; null only while the object is being dropped
    pub fn this_value(&self) -> Value {
        self.this().map(Value::Object).unwrap_or(Value::Null)
    }

    /// Read a field (null when unset)
    pub fn field(&self, name: &str) -> Value {
        self.fields.read().get(name).cloned().unwrap_or(Value::Null)
    }

    /// Write a field, returning the previous value
    pub fn set_field(&self, name: impl Into<String>, value: Value) -> Option<Value> {
        self.fields.write().insert(name.into(), value)
    }

    fn address(&self) -> usize {
        self as *const Self as *const () as usize
    }

    fn default_method(&self, method: &str, args: &[Value]) -> Option<Value> {
        match (method, args) {
            ("equals", [Value::Object(other)]) => {
                Some(Value::Bool(isle_sdk::identity(other) == self.address()))
            }
            ("equals", [_]) => Some(Value::Bool(false)),
            ("hashCode", []) => {
                let mut hasher = FxHasher::default();
                self.address().hash(&mut hasher);
                Some(Value::Int(hasher.finish() as i32))
            }
            ("toString", []) => Some(Value::str(format!(
                "{}@{:x}",
                self.ty.name(),
                self.address()
            ))),
            _ => None,
        }
    }
}

impl Object for NativeObject {
    fn type_descriptor(&self) -> Arc<TypeDescriptor> {
        self.ty.clone()
    }

    fn invoke(&self, method: &str, args: &[Value]) -> CallResult {
        trace!(type_name = self.ty.name(), method, "native call");
        if let Some(f) = self.methods.get(&(method.to_string(), args.len())) {
            return f(self, args);
        }
        self.default_method(method, args).ok_or_else(|| {
            BridgeError::UnknownMethod {
                type_name: self.ty.name().to_string(),
                method: method.to_string(),
                arity: args.len(),
            }
            .into()
        })
    }
}

impl fmt::Debug for NativeObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeObject")
            .field("type", &self.ty.name())
            .field("methods", &self.methods.len())
            .finish()
    }
}

/// Builder for [`NativeObject`]
pub struct NativeObjectBuilder {
    ty: Arc<TypeDescriptor>,
    methods: FxHashMap<(String, usize), MethodFn>,
    fields: FxHashMap<String, Value>,
}

impl NativeObjectBuilder {
    /// Implement `name` taking `arity` arguments
    pub fn method<F>(mut self, name: &str, arity: usize, f: F) -> Self
    where
        F: Fn(&NativeObject, &[Value]) -> CallResult + Send + Sync + 'static,
    {
        self.methods.insert((name.to_string(), arity), Arc::new(f));
        self
    }

    /// Initialize a field
    pub fn field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    /// Finish the object
    pub fn build(self) -> Arc<NativeObject> {
        Arc::new_cyclic(|this| NativeObject {
            ty: self.ty,
            methods: self.methods,
            fields: RwLock::new(self.fields),
            this: this.clone(),
        })
    }

    /// Finish the object as a shared [`ObjectRef`]
    pub fn build_ref(self) -> ObjectRef {
        self.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use isle_sdk::{CallError, Exception, TypeKind};

    fn counter_type() -> Arc<TypeDescriptor> {
        TypeDescriptor::builder("x.Counter", TypeKind::Class).build()
    }

    #[test]
    fn test_methods_and_fields() {
        let counter = NativeObject::builder(counter_type())
            .field("count", Value::Int(0))
            .method("increment", 0, |this, _| {
                let next = this.field("count").as_int().unwrap_or(0) + 1;
                this.set_field("count", Value::Int(next));
                Ok(Value::Int(next))
            })
            .build_ref();

        assert_eq!(counter.invoke("increment", &[]).unwrap(), Value::Int(1));
        assert_eq!(counter.invoke("increment", &[]).unwrap(), Value::Int(2));
    }

    #[test]
    fn test_this_is_the_object_itself() {
        let obj = NativeObject::builder(counter_type())
            .method("self", 0, |this, _| Ok(this.this_value()))
            .build_ref();

        let out = obj.invoke("self", &[]).unwrap();
        assert!(isle_sdk::same_object(out.as_object().unwrap(), &obj));
    }

    #[test]
    fn test_default_identity_methods() {
        let a = NativeObject::builder(counter_type()).build_ref();
        let b = NativeObject::builder(counter_type()).build_ref();

        let same = a.invoke("equals", &[Value::Object(a.clone())]).unwrap();
        let other = a.invoke("equals", &[Value::Object(b)]).unwrap();
        assert_eq!(same, Value::Bool(true));
        assert_eq!(other, Value::Bool(false));
        assert!(a.invoke("toString", &[]).unwrap().as_str().unwrap().starts_with("x.Counter@"));
    }

    #[test]
    fn test_unknown_method_and_thrown_exception() {
        let boom = TypeDescriptor::builder("x.Boom", TypeKind::Exception).build();
        let obj = NativeObject::builder(counter_type())
            .method("explode", 0, move |_, _| {
                Err(CallError::thrown(Exception::new(boom.clone(), "bang")))
            })
            .build_ref();

        let err = obj.invoke("explode", &[]).unwrap_err();
        assert_eq!(err.exception().unwrap().message(), Some("bang"));

        let err = obj.invoke("missing", &[Value::Int(1)]).unwrap_err();
        assert!(matches!(
            err.bridge_error(),
            Some(BridgeError::UnknownMethod { arity: 1, .. })
        ));
    }
}
