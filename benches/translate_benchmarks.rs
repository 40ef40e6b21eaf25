//! Performance benchmarks for descriptor translation and signature refresh.
//!
//! - Cold lookups: translating struct graphs into an empty cache
//! - Warm lookups: cache hits by identity token and by name
//! - Refresh: merging parameter names and attaching injection markers
//!
//! ## Profiling with Puffin
//!
//! Run with the `profile-with-puffin` feature to collect per-function timings:
//!
//! ```bash
//! cargo bench --features profile-with-puffin -- --profile-time 5
//! ```

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use typebridge::prelude::*;

#[cfg(feature = "profile-with-puffin")]
use std::collections::HashMap;

#[cfg(feature = "profile-with-puffin")]
static FRAME_VIEW: std::sync::OnceLock<puffin::GlobalFrameView> = std::sync::OnceLock::new();

/// Initialize puffin profiler.
#[cfg(feature = "profile-with-puffin")]
fn setup_profiler() {
    puffin::set_scopes_on(true);
    FRAME_VIEW.get_or_init(puffin::GlobalFrameView::default);
}

#[cfg(not(feature = "profile-with-puffin"))]
fn setup_profiler() {}

#[cfg(feature = "profile-with-puffin")]
fn end_profiling_frame() {
    puffin::GlobalProfiler::lock().new_frame();
}

#[cfg(not(feature = "profile-with-puffin"))]
fn end_profiling_frame() {}

/// Print accumulated time per top-level scope.
#[cfg(feature = "profile-with-puffin")]
fn print_profiling_stats() {
    use puffin::Reader;

    let Some(frame_view) = FRAME_VIEW.get() else {
        return;
    };
    let view = frame_view.lock();
    let scope_collection = view.scope_collection();

    let mut scope_timings: HashMap<String, i64> = HashMap::new();
    for frame in view.recent_frames() {
        let Ok(unpacked) = frame.unpacked() else {
            continue;
        };
        for (_thread_info, stream_info) in unpacked.thread_streams.iter() {
            let Ok(scopes) = Reader::from_start(&stream_info.stream).read_top_scopes() else {
                continue;
            };
            for scope in scopes {
                if let Some(details) = scope_collection.fetch_by_id(&scope.id) {
                    *scope_timings.entry(details.name().to_string()).or_insert(0) +=
                        scope.record.duration_ns;
                }
            }
        }
    }

    let mut entries: Vec<_> = scope_timings.into_iter().collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1));
    println!("\n=== Profiling Summary ===");
    for (name, ns) in entries {
        println!("  {:30} {:>10.2?}", name, std::time::Duration::from_nanos(ns as u64));
    }
}

#[cfg(not(feature = "profile-with-puffin"))]
fn print_profiling_stats() {}

/// A database with `count` structs, each pointing at the next and at itself.
fn chained_structs(count: usize) -> TypeInfoDatabase {
    (0..count).fold(TypeInfoDatabase::new(), |db, i| {
        let name = format!("node_{i}");
        let next = format!("node_{}", (i + 1) % count);
        db.with_type(
            TypeInfo::structure(name.clone(), 24)
                .with_field(0, "self", TypeInfo::pointer(format!("{name} *"), 8, TypeInfo::named(name.clone())))
                .with_field(8, "next", TypeInfo::pointer(format!("{next} *"), 8, TypeInfo::named(next)))
                .with_field(16, "value", TypeInfo::integer("long long", 8)),
        )
    })
}

fn wide_function(params: usize) -> TypeInfo {
    let func = (0..params).fold(FuncInfo::new().with_return(TypeInfo::integer("int", 4)), |f, i| {
        f.with_param(format!("arg{i}"), TypeInfo::integer("int", 4))
    });
    TypeInfo::function("wide", func.with_convention(CallingConvCode::Stdcall.into()))
}

/// Translating a struct graph into an empty cache.
fn cold_lookup_benchmarks(c: &mut Criterion) {
    setup_profiler();
    let mut group = c.benchmark_group("translate/cold");

    for count in [16usize, 128, 512] {
        let db = chained_structs(count);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("struct_chain", count), &db, |b, db| {
            b.iter(|| {
                let mut manager = TypeManager::x86_64(db);
                let id = manager.find_by_name("node_0").unwrap();
                end_profiling_frame();
                black_box((id, manager.cache().len()))
            });
        });
    }

    group.finish();
    print_profiling_stats();
}

/// Cache hits once the graph is translated.
fn warm_lookup_benchmarks(c: &mut Criterion) {
    let mut manager = TypeManager::x86_64(chained_structs(256));
    manager.find_by_name("node_0").unwrap();
    let hash = TypeHash::from_name("node_128");

    let mut group = c.benchmark_group("translate/warm");
    group.bench_function("by_identity", |b| {
        b.iter(|| black_box(manager.find(black_box("node_128"), hash).unwrap()));
    });
    group.bench_function("by_name", |b| {
        b.iter(|| black_box(manager.find_by_name(black_box("node_128")).unwrap()));
    });
    group.finish();
}

/// Signature refresh with and without an injection marker.
fn refresh_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("translate/refresh");

    for params in [2usize, 16] {
        let db = TypeInfoDatabase::new()
            .with_address(0x1000, wide_function(params))
            .with_address(0x2000, TypeInfo::function("alloca_probe", FuncInfo::new()));
        let mut manager = TypeManager::x86(db);

        let recovered = (0..params).fold(FuncInfo::new().with_return(TypeInfo::integer("int", 4)), |f, _| {
            f.with_param("", TypeInfo::integer("int", 4))
        });
        let sig = manager.parse_func(&recovered).unwrap();
        let proto = FuncProto::from_signature(&sig, manager.cache());

        group.bench_with_input(BenchmarkId::new("names", params), &proto, |b, proto| {
            b.iter(|| {
                let mut function = Function::new("wide", 0x1000, proto.clone());
                black_box(manager.update(&mut function).unwrap())
            });
        });
    }

    let mut manager = TypeManager::x86(
        TypeInfoDatabase::new().with_address(0x2000, TypeInfo::function("alloca_probe", FuncInfo::new())),
    );
    let sig = manager.parse_func(&FuncInfo::new()).unwrap();
    let proto = FuncProto::from_signature(&sig, manager.cache());
    group.bench_function("inject", |b| {
        b.iter(|| {
            let mut function = Function::new("alloca_probe", 0x2000, proto.clone());
            black_box(manager.update(&mut function).unwrap())
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    cold_lookup_benchmarks,
    warm_lookup_benchmarks,
    refresh_benchmarks
);
criterion_main!(benches);
