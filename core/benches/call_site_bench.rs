use criterion::{Criterion, criterion_group, criterion_main};
use scour_core::dispatch::{CallSite, DispatchFlags, DispatchKind, LookupResolver, Signature};
use scour_core::error::SiteLocation;
use scour_core::typ::ScriptType;
use scour_core::val::Val;
use scour_core::whitelist::{Lookup, Whitelist};
use std::hint::black_box;
use std::sync::Arc;

fn lookup() -> Arc<dyn Lookup> {
    let mut b = Whitelist::builder();
    b.method("Object", "show", &[], ScriptType::Text, |args| Ok(Val::Str(args[0].to_text())))
        .unwrap();
    Arc::new(b.build())
}

fn site(lookup: &Arc<dyn Lookup>, depth: usize) -> CallSite {
    CallSite::new(
        SiteLocation::new("bench", 0),
        DispatchKind::MethodCall,
        "show",
        Signature::dynamic(1),
        DispatchFlags::NONE,
        Arc::new(LookupResolver::new(lookup.clone())),
        depth,
    )
}

fn call_site_bench(c: &mut Criterion) {
    scour_core::trace::maybe_init_tracing();
    let lookup = lookup();
    // six receiver shapes: fits a depth-8 cache, overflows the default of 4
    let args: Vec<Val> = vec![
        Val::from("s"),
        Val::Int(1),
        Val::Long(2),
        Val::Double(2.5),
        Val::Bool(true),
        Val::Char('c'),
    ];

    let mono = site(&lookup, 4);
    c.bench_function("call_site_monomorphic", |b| {
        b.iter(|| {
            let out = mono.invoke(black_box(&args[..1])).unwrap();
            black_box(out);
        })
    });

    let poly = site(&lookup, 8);
    c.bench_function("call_site_polymorphic", |b| {
        b.iter(|| {
            for arg in &args {
                let out = poly.invoke(black_box(std::slice::from_ref(arg))).unwrap();
                black_box(out);
            }
        })
    });

    let mega = site(&lookup, 4);
    c.bench_function("call_site_megamorphic", |b| {
        b.iter(|| {
            for arg in &args {
                let out = mega.invoke(black_box(std::slice::from_ref(arg))).unwrap();
                black_box(out);
            }
        })
    });
}

criterion_group!(benches, call_site_bench);
criterion_main!(benches);
