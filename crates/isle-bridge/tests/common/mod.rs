//! Shared fixtures: two plugin universes built against the same API, over a
//! shared parent universe

#![allow(dead_code)]

use std::sync::Arc;

use isle_bridge::isle_sdk::{
    same_object, CallError, MethodSignature, ObjectRef, TypeRef, TypeUniverse, UniverseRef, Value,
};
use isle_runtime::{ModuleUniverse, NativeObject};

pub struct World {
    pub shared: Arc<ModuleUniverse>,
    pub a: UniverseRef,
    pub b: UniverseRef,
    pub a_module: Arc<ModuleUniverse>,
    pub b_module: Arc<ModuleUniverse>,
}

/// Install the tracing subscriber once; honours `RUST_LOG`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Define the plugin API in `u`
pub fn define_api(u: &ModuleUniverse) {
    u.define_enum("api.Color", &["RED", "GREEN", "BLUE"]).unwrap();
    u.exception_type("api.Fault").define().unwrap();
    u.interface("api.Greeter")
        .method(
            MethodSignature::new("greet")
                .param(TypeRef::String)
                .returns(TypeRef::String),
        )
        .method(MethodSignature::new("favorite").returns(TypeRef::named("api.Color")))
        .method(MethodSignature::new("companion").returns(TypeRef::Any))
        .define()
        .unwrap();
    u.interface("api.Node")
        .method(MethodSignature::new("next").returns(TypeRef::named("api.Node")))
        .method(MethodSignature::new("value").returns(TypeRef::int()))
        .method(
            MethodSignature::new("is")
                .param(TypeRef::Any)
                .returns(TypeRef::bool()),
        )
        .define()
        .unwrap();
    u.interface("api.Store")
        .method(MethodSignature::new("fill").mutated_param(TypeRef::List))
        .method(
            MethodSignature::new("copyIn")
                .param(TypeRef::List)
                .returns(TypeRef::int()),
        )
        .method(MethodSignature::new("items").returns(TypeRef::List))
        .method(
            MethodSignature::new("read")
                .mutated_param(TypeRef::array_of(TypeRef::int()))
                .returns(TypeRef::int()),
        )
        .define()
        .unwrap();
    u.interface("api.Failing")
        .method(MethodSignature::new("fail").param(TypeRef::String))
        .method(MethodSignature::new("crash"))
        .define()
        .unwrap();
}

/// Shared parent plus two plugin universes `a` and `b` with identical APIs
pub fn world() -> World {
    init_tracing();

    let shared = ModuleUniverse::new("shared");
    shared
        .interface("shared.Clock")
        .method(MethodSignature::new("now").returns(TypeRef::long()))
        .define()
        .unwrap();
    shared.class("shared.SystemClock").implements("shared.Clock").define().unwrap();

    let a_module = ModuleUniverse::with_parent("plugin-a", &shared);
    let b_module = ModuleUniverse::with_parent("plugin-b", &shared);
    define_api(&a_module);
    define_api(&b_module);

    a_module.class("a.ConsoleGreeter").implements("api.Greeter").define().unwrap();
    a_module.class("a.LinkedNode").implements("api.Node").define().unwrap();
    a_module.class("a.ListStore").implements("api.Store").define().unwrap();
    a_module.class("a.FailingService").implements("api.Failing").define().unwrap();
    a_module.exception_type("a.Internal").define().unwrap();
    a_module.interface("a.Private").define().unwrap();
    a_module.class("a.Secret").implements("a.Private").define().unwrap();

    World {
        a: a_module.handle(),
        b: b_module.handle(),
        shared,
        a_module,
        b_module,
    }
}

impl World {
    /// An `a.Secret`: implements nothing known to `b`
    pub fn secret(&self) -> ObjectRef {
        NativeObject::builder(self.a.load_type("a.Secret").unwrap()).build_ref()
    }

    pub fn greeter(&self) -> ObjectRef {
        let a = self.a_module.clone();
        let secret = self.secret();
        NativeObject::builder(self.a.load_type("a.ConsoleGreeter").unwrap())
            .method("greet", 1, |_, args| {
                Ok(Value::str(format!("hello {}", args[0].as_str().unwrap_or("?"))))
            })
            .method("favorite", 0, move |_, _| {
                Ok(Value::Enum(a.enum_constant("api.Color", "GREEN")?))
            })
            .method("companion", 0, move |_, _| Ok(Value::Object(secret.clone())))
            .build_ref()
    }

    /// A node whose `next` is itself
    pub fn self_node(&self, value: i32) -> Arc<NativeObject> {
        NativeObject::builder(self.a.load_type("a.LinkedNode").unwrap())
            .field("value", Value::Int(value))
            .method("next", 0, |this, _| {
                let next = this.field("next");
                Ok(if next.is_null() { this.this_value() } else { next })
            })
            .method("value", 0, |this, _| Ok(this.field("value")))
            .method("is", 1, |this, args| {
                let me = this.this();
                Ok(Value::Bool(match (&args[0], me) {
                    (Value::Object(other), Some(me)) => same_object(other, &me),
                    _ => false,
                }))
            })
            .build()
    }

    pub fn store(&self) -> ObjectRef {
        NativeObject::builder(self.a.load_type("a.ListStore").unwrap())
            .method("fill", 1, |_, args| {
                let list = args[0].as_list().expect("list argument");
                list.push(Value::Int(42))?;
                Ok(Value::Null)
            })
            .method("copyIn", 1, |_, args| {
                let list = args[0].as_list().expect("list argument");
                list.push(Value::Int(7))?;
                Ok(Value::Int(list.len() as i32))
            })
            .method("items", 0, |_, _| Ok(Value::list(vec![Value::Int(1), Value::Int(2), Value::Int(3)])))
            .method("read", 1, |_, args| {
                let buf = args[0].as_array().expect("array argument");
                buf.set(0, Value::Int(99))?;
                Ok(Value::Int(1))
            })
            .build_ref()
    }

    pub fn failing(&self) -> ObjectRef {
        let fail_module = self.a_module.clone();
        let crash_module = self.a_module.clone();
        NativeObject::builder(self.a.load_type("a.FailingService").unwrap())
            .method("fail", 1, move |_, args| {
                let message = args[0].as_str().unwrap_or_default().to_string();
                Err(CallError::thrown(
                    fail_module
                        .exception("api.Fault", message)?
                        .with_stack_trace(vec!["a.FailingService.fail".to_string()]),
                ))
            })
            .method("crash", 0, move |_, _| {
                let cause = Arc::new(crash_module.exception("api.Fault", "disk full")?);
                Err(CallError::thrown(
                    crash_module
                        .exception("a.Internal", "internal failure")?
                        .with_stack_trace(vec![
                            "a.FailingService.crash".to_string(),
                            "a.Worker.run".to_string(),
                        ])
                        .with_cause(cause),
                ))
            })
            .build_ref()
    }
}
