#![allow(dead_code)]

use criterion::{criterion_group, criterion_main, Criterion};
use holdfast::{Config, Constructible, Constructors, Container, Inject, Registration, Resolver as _};
use std::sync::Arc;

struct A(Arc<B>, Arc<C>);
struct B(i32);
struct C(Arc<CA>);
struct CA(Arc<CAA>);
struct CAA(Arc<CAAA>);
struct CAAA(Arc<CAAAA>);
struct CAAAA(Arc<CAAAAA>);
struct CAAAAA;

impl Constructible for A {
    fn constructors() -> Constructors<Self> {
        Constructors::new().with(|Inject(b): Inject<B>, Inject(c): Inject<C>| Ok(A(b, c)))
    }
}

#[inline]
fn container_with_providers(singleton: bool) -> Container {
    let container = Container::new();
    container
        .register(Registration::provider(|_| Ok(CAAAAA)).with_config(config(singleton)))
        .unwrap();
    container
        .register(Registration::provider(|scope| Ok(CAAAA(scope.resolve()?))).with_config(config(singleton)))
        .unwrap();
    container
        .register(Registration::provider(|scope| Ok(CAAA(scope.resolve()?))).with_config(config(singleton)))
        .unwrap();
    container
        .register(Registration::provider(|scope| Ok(CAA(scope.resolve()?))).with_config(config(singleton)))
        .unwrap();
    container
        .register(Registration::provider(|scope| Ok(CA(scope.resolve()?))).with_config(config(singleton)))
        .unwrap();
    container
        .register(Registration::provider(|scope| Ok(C(scope.resolve()?))).with_config(config(singleton)))
        .unwrap();
    container
        .register(Registration::provider(|_| Ok(B(2))).with_config(config(singleton)))
        .unwrap();
    container
        .register(Registration::<A>::reflective().with_config(config(singleton)))
        .unwrap();
    container
}

#[inline]
fn config(singleton: bool) -> Config {
    Config {
        singleton,
        ..Config::default()
    }
}

#[inline]
fn container_child_chain(root: &Container) {
    let app = root.enter().build();
    let session = app.enter().build();
    let request = session.enter().cache_from_parent(true).build();
    let _ = request.lookup::<A>().unwrap();
}

#[inline]
fn scope_resolve(container: &Container) {
    let scope = container.create_session().unwrap();
    let _ = scope.resolve::<A>().unwrap();
}

#[inline]
fn scope_resolve_and_dispose(container: &Container) {
    let scope = container.create_session().unwrap();
    let _ = scope.resolve::<A>().unwrap();

    scope.dispose();
}

fn criterion_benchmark(c: &mut Criterion) {
    let transient = container_with_providers(false);
    let singleton = container_with_providers(true);
    let cached_scope = transient.create_session().unwrap();

    c.bench_function("container_new", |b| b.iter(Container::new))
        .bench_function("container_with_providers", |b| b.iter(|| container_with_providers(false)))
        .bench_function("container_child_chain", |b| b.iter(|| container_child_chain(&transient)))
        .bench_function("create_session", |b| b.iter(|| transient.create_session().unwrap()))
        .bench_function("scope_resolve_transient", |b| b.iter(|| scope_resolve(&transient)))
        .bench_function("scope_resolve_singleton", |b| b.iter(|| scope_resolve(&singleton)))
        .bench_function("scope_resolve_with_cache", |b| {
            b.iter(|| cached_scope.resolve::<A>().unwrap())
        })
        .bench_function("get_singleton_instance", |b| {
            b.iter(|| singleton.get_singleton_instance::<A>().unwrap())
        })
        .bench_function("scope_resolve_and_dispose", |b| {
            b.iter(|| scope_resolve_and_dispose(&transient))
        });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
