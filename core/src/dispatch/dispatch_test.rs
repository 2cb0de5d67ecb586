use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::*;
use crate::error::{ErrorKind, ScriptError, SiteLocation};
use crate::lambda::{self, BodyFn, LambdaBody};
use crate::whitelist::{Lookup, Target, Whitelist};

fn whitelist() -> Arc<dyn Lookup> {
    let mut b = Whitelist::builder();
    b.class("Counter", None);
    b.method("Object", "show", &[], ScriptType::Text, |args| Ok(Val::Str(args[0].to_text())))
        .unwrap()
        .method("String", "length", &[], ScriptType::INT, |args| {
            Ok(Val::Int(args[0].as_str().map_or(0, |s| s.chars().count() as i32)))
        })
        .unwrap()
        .method("Integer", "length", &[], ScriptType::INT, |args| match args[0] {
            Val::Int(v) => Ok(Val::Int(v.to_string().len() as i32)),
            _ => anyhow::bail!("expected an int"),
        })
        .unwrap()
        .method("String", "concat", &[ScriptType::Text], ScriptType::Text, |args| {
            let (a, b) = (args[0].as_str().unwrap_or(""), args[1].as_str().unwrap_or(""));
            Ok(Val::from(format!("{a}{b}")))
        })
        .unwrap()
        .getter("Counter", "count", ScriptType::INT, |args| Ok(Val::Int(*counter(&args[0])?)))
        .unwrap()
        .setter("Counter", "count", ScriptType::INT, |args| {
            if let Val::Int(v) = args[1] {
                *counter(&args[0])? = v;
            }
            Ok(Val::Null)
        })
        .unwrap()
        .shape("IntSupplier", "getAsInt", &[], ScriptType::INT)
        .unwrap()
        .shape("Function", "apply", &[ScriptType::Def], ScriptType::Def)
        .unwrap()
        .shape("Supplier", "get", &[], ScriptType::Def)
        .unwrap();
    Arc::new(b.build())
}

fn counter(val: &Val) -> anyhow::Result<std::sync::MutexGuard<'_, i32>> {
    let cell = val
        .as_object()
        .and_then(|obj| obj.downcast_ref::<Mutex<i32>>())
        .ok_or_else(|| anyhow::anyhow!("not a counter"))?;
    cell.lock().map_err(|_| anyhow::anyhow!("poisoned counter"))
}

/// Counts how often a site falls back to resolution.
struct Counting {
    inner: LookupResolver,
    calls: AtomicUsize,
}

impl Counting {
    fn new(lookup: Arc<dyn Lookup>) -> Arc<Self> {
        Arc::new(Self {
            inner: LookupResolver::new(lookup),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Resolver for Counting {
    fn resolve(&self, site: &CallSite, args: &[Val]) -> crate::error::Result<Target> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.resolve(site, args)
    }

    fn lookup(&self) -> Option<&dyn Lookup> {
        self.inner.lookup()
    }
}

fn site(kind: DispatchKind, name: &str, signature: Signature, flags: DispatchFlags, resolver: Arc<dyn Resolver>) -> CallSite {
    CallSite::new(SiteLocation::new("dispatch_test", 11), kind, name, signature, flags, resolver, DEFAULT_PIC_DEPTH)
}

fn method(name: &str, arity: usize, resolver: Arc<dyn Resolver>) -> CallSite {
    site(DispatchKind::MethodCall, name, Signature::dynamic(arity), DispatchFlags::NONE, resolver)
}

fn binary(name: &str, ret: ScriptType, flags: DispatchFlags) -> CallSite {
    site(
        DispatchKind::BinaryOperator,
        name,
        Signature::new(vec![ScriptType::Def, ScriptType::Def], ret),
        flags,
        Arc::new(LookupResolver::new(whitelist())),
    )
}

#[test]
fn repeated_shape_resolves_once() {
    let resolver = Counting::new(whitelist());
    let site = method("length", 1, resolver.clone());
    for _ in 0..10 {
        assert_eq!(site.invoke(&[Val::from("four")]).unwrap(), Val::Int(4));
    }
    assert_eq!(resolver.calls(), 1);
    assert_eq!(site.cache().state(), CacheState::Monomorphic);
    assert_eq!(
        site.cache().stats(),
        CacheStats {
            hits: 9,
            misses: 1,
            lookups: 1
        }
    );
}

#[test]
fn new_shape_adds_an_entry() {
    let resolver = Counting::new(whitelist());
    let site = method("length", 1, resolver.clone());
    assert_eq!(site.invoke(&[Val::from("abc")]).unwrap(), Val::Int(3));
    assert_eq!(site.cache().len(), 1);
    assert_eq!(site.invoke(&[Val::Int(12345)]).unwrap(), Val::Int(5));
    assert_eq!(site.cache().len(), 2);
    assert_eq!(site.cache().state(), CacheState::Polymorphic);
    assert_eq!(site.invoke(&[Val::from("xy")]).unwrap(), Val::Int(2));
    assert_eq!(resolver.calls(), 2);
}

#[test]
fn megamorphic_site_keeps_answering() {
    let resolver = Counting::new(whitelist());
    let site = method("show", 1, resolver.clone());
    let values = [
        Val::from("s"),
        Val::Int(1),
        Val::Long(2),
        Val::Double(2.5),
        Val::Bool(true),
        Val::Char('c'),
    ];
    for round in 0..2 {
        for val in &values {
            assert_eq!(site.invoke(std::slice::from_ref(val)).unwrap(), Val::Str(val.to_text()), "round {round}");
        }
    }
    assert_eq!(site.cache().state(), CacheState::Megamorphic);
    assert_eq!(site.cache().len(), DEFAULT_PIC_DEPTH);
    // four shapes cached in round one, everything resolved once megamorphic
    assert_eq!(resolver.calls(), 12);
}

#[test]
fn null_receiver_fails_unless_allowed() {
    let resolver = Counting::new(whitelist());
    let strict = method("length", 1, resolver.clone());
    match strict.invoke(&[Val::Null]).unwrap_err() {
        ScriptError::Dispatch { reason, location, .. } => {
            assert_eq!(reason, "receiver is null");
            assert_eq!(location.to_string(), "dispatch_test@11");
        }
        other => panic!("unexpected {other:?}"),
    }
    let lenient = site(
        DispatchKind::MethodCall,
        "length",
        Signature::dynamic(1),
        DispatchFlags::ALLOWS_NULL,
        resolver.clone(),
    );
    assert_eq!(lenient.invoke(&[Val::Null]).unwrap(), Val::Null);
    assert_eq!(resolver.calls(), 0);
}

#[test]
fn failed_resolution_is_not_cached() {
    let resolver = Counting::new(whitelist());
    let site = method("length", 1, resolver.clone());
    for _ in 0..2 {
        let err = site.invoke(&[Val::Long(3)]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Dispatch);
        let message = err.to_string();
        assert!(message.contains("length(Long)"), "{message}");
        assert!(message.contains("dispatch_test@11"), "{message}");
    }
    assert_eq!(resolver.calls(), 2);
    assert!(site.cache().is_empty());
    assert_eq!(site.cache().state(), CacheState::Uninitialized);
}

#[test]
fn result_converts_to_the_site_type() {
    let implicit = binary("add", ScriptType::INT, DispatchFlags::NONE);
    assert_eq!(implicit.invoke(&[Val::Short(2), Val::Byte(3)]).unwrap(), Val::Int(5));
    let err = implicit.invoke(&[Val::Double(2.5), Val::Double(2.25)]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Coercion);

    let explicit = binary("add", ScriptType::INT, DispatchFlags::EXPLICIT_CAST);
    assert_eq!(explicit.invoke(&[Val::Double(2.5), Val::Double(2.25)]).unwrap(), Val::Int(4));
}

#[test]
fn operators_follow_numeric_promotion() {
    let add = binary("add", ScriptType::Def, DispatchFlags::NONE);
    assert_eq!(add.invoke(&[Val::Int(1), Val::Long(2)]).unwrap(), Val::Long(3));
    assert_eq!(add.invoke(&[Val::Char('a'), Val::Int(1)]).unwrap(), Val::Int(98));
    assert_eq!(add.invoke(&[Val::from("a"), Val::Int(1)]).unwrap(), Val::from("a1"));
    assert_eq!(add.invoke(&[Val::Null, Val::from("b")]).unwrap(), Val::from("nullb"));

    let lt = binary("lt", ScriptType::Def, DispatchFlags::NONE);
    assert_eq!(lt.invoke(&[Val::Int(1), Val::Double(1.5)]).unwrap(), Val::Bool(true));

    let eq = binary("eq", ScriptType::BOOL, DispatchFlags::NONE);
    assert_eq!(eq.invoke(&[Val::from("x"), Val::from("x")]).unwrap(), Val::Bool(true));
    assert_eq!(eq.invoke(&[Val::Int(2), Val::Long(2)]).unwrap(), Val::Bool(true));

    let div = binary("div", ScriptType::Def, DispatchFlags::NONE);
    let err = div.invoke(&[Val::Int(1), Val::Int(0)]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Host);
    assert!(err.to_string().contains("/ by zero"));
    assert_eq!(div.invoke(&[Val::Double(1.0), Val::Double(0.0)]).unwrap(), Val::Double(f64::INFINITY));

    let unknown = binary("pow", ScriptType::Def, DispatchFlags::NONE);
    assert_eq!(unknown.invoke(&[Val::Int(1), Val::Int(1)]).unwrap_err().kind(), ErrorKind::Dispatch);
}

#[test]
fn shifts_mask_the_distance() {
    let shift = |name: &str| {
        site(
            DispatchKind::ShiftOperator,
            name,
            Signature::dynamic(2),
            DispatchFlags::NONE,
            Arc::new(LookupResolver::new(whitelist())),
        )
    };
    assert_eq!(shift("lsh").invoke(&[Val::Int(1), Val::Int(33)]).unwrap(), Val::Int(2));
    assert_eq!(shift("lsh").invoke(&[Val::Long(1), Val::Int(33)]).unwrap(), Val::Long(1 << 33));
    assert_eq!(shift("ush").invoke(&[Val::Int(-1), Val::Long(28)]).unwrap(), Val::Int(15));
    assert_eq!(shift("rsh").invoke(&[Val::Byte(-8), Val::Int(1)]).unwrap(), Val::Int(-4));
    // shifts are not binary operators
    let misfiled = binary("lsh", ScriptType::Def, DispatchFlags::NONE);
    assert!(misfiled.invoke(&[Val::Int(1), Val::Int(1)]).is_err());
}

#[test]
fn unary_operators() {
    let unary = |name: &str| {
        site(
            DispatchKind::UnaryOperator,
            name,
            Signature::dynamic(1),
            DispatchFlags::NONE,
            Arc::new(LookupResolver::new(whitelist())),
        )
    };
    assert_eq!(unary("neg").invoke(&[Val::Short(4)]).unwrap(), Val::Int(-4));
    assert_eq!(unary("bwnot").invoke(&[Val::Long(0)]).unwrap(), Val::Long(-1));
    assert_eq!(unary("not").invoke(&[Val::Bool(false)]).unwrap(), Val::Bool(true));
    assert!(unary("not").invoke(&[Val::Int(0)]).is_err());
}

#[test]
fn compound_assignment_narrows_to_the_left_operand() {
    let site = binary("add", ScriptType::Def, DispatchFlags::COMPOUND_ASSIGNMENT);
    assert_eq!(site.invoke(&[Val::Byte(100), Val::Int(100)]).unwrap(), Val::Byte(-56));
    assert_eq!(site.invoke(&[Val::Char('a'), Val::Int(1)]).unwrap(), Val::Char('b'));
    assert_eq!(site.invoke(&[Val::from("n"), Val::Int(1)]).unwrap(), Val::from("n1"));
}

#[test]
fn field_load_and_store() {
    let lookup = whitelist();
    let resolver: Arc<dyn Resolver> = Arc::new(LookupResolver::new(lookup));
    let counter = Val::object("Counter", Mutex::new(3));
    let load = site(DispatchKind::Load, "count", Signature::dynamic(1), DispatchFlags::NONE, resolver.clone());
    let store = site(
        DispatchKind::Store,
        "count",
        Signature::new(vec![ScriptType::Def, ScriptType::Def], ScriptType::Void),
        DispatchFlags::NONE,
        resolver.clone(),
    );
    assert_eq!(load.invoke(std::slice::from_ref(&counter)).unwrap(), Val::Int(3));
    assert_eq!(store.invoke(&[counter.clone(), Val::Short(9)]).unwrap(), Val::Null);
    assert_eq!(load.invoke(std::slice::from_ref(&counter)).unwrap(), Val::Int(9));
    let missing = site(DispatchKind::Load, "total", Signature::dynamic(1), DispatchFlags::NONE, resolver);
    assert_eq!(missing.invoke(&[counter]).unwrap_err().kind(), ErrorKind::Dispatch);
}

#[test]
fn closures_dispatch_by_shape_class() {
    let lookup = whitelist();
    let resolver = Counting::new(lookup.clone());
    let make = |n: i32| {
        let body: BodyFn = Arc::new(move |_caps: &[lambda::Capture], _args: &[Val]| Ok(Val::Int(n)));
        lambda::bootstrap(
            &lookup,
            SiteLocation::detached(),
            "IntSupplier",
            LambdaBody::Compiled { arity: 0, body },
            Vec::new(),
        )
        .unwrap()
    };
    let site = method("getAsInt", 1, resolver.clone());
    assert_eq!(site.invoke(&[make(7)]).unwrap(), Val::Int(7));
    assert_eq!(site.invoke(&[make(8)]).unwrap(), Val::Int(8));
    assert_eq!(resolver.calls(), 1);
}

#[test]
fn method_reference_binds_the_receiver() {
    let resolver: Arc<dyn Resolver> = Arc::new(LookupResolver::new(whitelist()));
    let reference = site(
        DispatchKind::Reference,
        "concat",
        Signature::new(vec![ScriptType::Def], ScriptType::object("Function")),
        DispatchFlags::NONE,
        resolver.clone(),
    );
    let closure = reference.invoke(&[Val::from("pre-")]).unwrap();
    assert_eq!(closure.type_name(), "Function");
    let apply = method("apply", 2, resolver.clone());
    assert_eq!(apply.invoke(&[closure, Val::from("fix")]).unwrap(), Val::from("pre-fix"));

    let untyped = site(
        DispatchKind::Reference,
        "concat",
        Signature::dynamic(1),
        DispatchFlags::NONE,
        resolver,
    );
    assert_eq!(untyped.invoke(&[Val::from("x")]).unwrap_err().kind(), ErrorKind::Dispatch);
}

#[test]
fn one_method_references_into_several_shapes() {
    let resolver: Arc<dyn Resolver> = Arc::new(LookupResolver::new(whitelist()));
    let reference = |shape: &str| {
        site(
            DispatchKind::Reference,
            "length",
            Signature::new(vec![ScriptType::Text], ScriptType::object(shape)),
            DispatchFlags::NONE,
            resolver.clone(),
        )
    };
    let int_supplier = reference("IntSupplier").invoke(&[Val::from("four")]).unwrap();
    let supplier = reference("Supplier").invoke(&[Val::from("three")]).unwrap();
    assert_eq!(int_supplier.type_name(), "IntSupplier");
    assert_eq!(supplier.type_name(), "Supplier");

    let get_as_int = method("getAsInt", 1, resolver.clone());
    let get = method("get", 1, resolver);
    assert_eq!(get_as_int.invoke(&[int_supplier]).unwrap(), Val::Int(4));
    assert_eq!(get.invoke(&[supplier]).unwrap(), Val::Int(5));
}

#[test]
fn bootstrap_rejects_unknown_flag_bits() {
    let lookup = whitelist();
    let ctx = bootstrap::CallContext::new(&lookup, SiteLocation::new("dispatch_test", 2));
    let args = [Val::from("abc")];
    let target = bootstrap::bootstrap(&ctx, DispatchKind::MethodCall, "length", &Signature::dynamic(1), 0, &args).unwrap();
    assert_eq!(target.descriptor().to_string(), "String.length(String)int");
    let err = bootstrap::bootstrap(&ctx, DispatchKind::MethodCall, "length", &Signature::dynamic(1), 0x80, &args)
        .unwrap_err();
    match err {
        ScriptError::Dispatch { reason, .. } => assert!(reason.contains("unknown flag bits"), "{reason}"),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn flags_compose() {
    let flags = DispatchFlags::ALLOWS_NULL | DispatchFlags::EXPLICIT_CAST;
    assert!(flags.contains(DispatchFlags::ALLOWS_NULL));
    assert!(!flags.contains(DispatchFlags::COMPOUND_ASSIGNMENT));
    assert_eq!(DispatchFlags::from_bits(flags.bits()), Some(flags));
    assert_eq!(DispatchFlags::from_bits(0b1000), None);
}

#[test]
fn concurrent_callers_share_one_cache() {
    let resolver = Counting::new(whitelist());
    let site = method("show", 1, resolver.clone());
    std::thread::scope(|scope| {
        for t in 0..8 {
            let site = &site;
            scope.spawn(move || {
                for i in 0..200 {
                    let arg = if (i + t) % 2 == 0 {
                        Val::from("txt")
                    } else {
                        Val::Int(i)
                    };
                    let out = site.invoke(std::slice::from_ref(&arg)).unwrap();
                    assert_eq!(out, Val::Str(arg.to_text()));
                }
            });
        }
    });
    assert_eq!(site.cache().len(), 2);
    assert_eq!(site.cache().state(), CacheState::Polymorphic);
    let calls = resolver.calls();
    assert!((2..=16).contains(&calls), "{calls}");
}
