use holdfast::{Container, DisposeErrorKind, Dispose as _, Registration, Resolver as _};
use std::{
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc, Barrier,
    },
    thread,
};

const THREADS: usize = 8;

struct Engine;

#[test]
fn test_racing_singleton_keeps_one_and_tears_down_the_rest() {
    let instantiator_call_count = Arc::new(AtomicU32::new(0));
    let finalizer_call_count = Arc::new(AtomicU32::new(0));
    let barrier = Arc::new(Barrier::new(THREADS));

    let container = Container::new();
    container
        .register(
            Registration::provider({
                let instantiator_call_count = instantiator_call_count.clone();
                let barrier = barrier.clone();
                move |_| {
                    instantiator_call_count.fetch_add(1, Ordering::SeqCst);
                    // Every thread is past the cache check before any result is stored
                    barrier.wait();
                    Ok(Engine)
                }
            })
            .singleton()
            .finalizer({
                let finalizer_call_count = finalizer_call_count.clone();
                move |_: Arc<Engine>| {
                    finalizer_call_count.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            }),
        )
        .unwrap();

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let container = container.clone();
            thread::spawn(move || container.get_singleton_instance::<Engine>().unwrap())
        })
        .collect();
    let engines: Vec<_> = handles.into_iter().map(|handle| handle.join().unwrap()).collect();

    assert!(engines.iter().all(|engine| Arc::ptr_eq(engine, &engines[0])));
    assert_eq!(instantiator_call_count.load(Ordering::SeqCst), THREADS as u32);
    assert_eq!(finalizer_call_count.load(Ordering::SeqCst), THREADS as u32 - 1);

    let scope = container.create_session().unwrap();
    assert!(Arc::ptr_eq(&scope.resolve::<Engine>().unwrap(), &engines[0]));

    container.dispose();
    assert_eq!(finalizer_call_count.load(Ordering::SeqCst), THREADS as u32);
}

#[test]
fn test_concurrent_dispose_runs_teardown_once() {
    let finalizer_call_count = Arc::new(AtomicU32::new(0));

    let container = Container::new();
    container
        .register(Registration::provider(|_| Ok(Engine)).singleton().finalizer({
            let finalizer_call_count = finalizer_call_count.clone();
            move |_: Arc<Engine>| {
                finalizer_call_count.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }))
        .unwrap();
    container.get_singleton_instance::<Engine>().unwrap();

    let barrier = Arc::new(Barrier::new(THREADS));
    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let container = container.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                container.try_dispose()
            })
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|handle| handle.join().unwrap()).collect();

    assert_eq!(results.iter().filter(|result| result.is_ok()).count(), 1);
    for failure in results.into_iter().filter_map(Result::err) {
        assert!(matches!(failure.errors[..], [DisposeErrorKind::AlreadyDisposed { .. }]));
    }
    assert_eq!(finalizer_call_count.load(Ordering::SeqCst), 1);
}

#[test]
fn test_scopes_on_many_threads() {
    let next_id = Arc::new(AtomicU32::new(0));

    struct Request(u32);

    let container = Container::new();
    container
        .register(Registration::provider({
            let next_id = next_id.clone();
            move |_| Ok(Request(next_id.fetch_add(1, Ordering::SeqCst)))
        }))
        .unwrap();

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let container = container.clone();
            thread::spawn(move || {
                let scope = container.create_session().unwrap();
                let first = scope.resolve::<Request>().unwrap();
                let second = scope.resolve::<Request>().unwrap();
                assert!(Arc::ptr_eq(&first, &second));
                first.0
            })
        })
        .collect();
    let mut ids: Vec<_> = handles.into_iter().map(|handle| handle.join().unwrap()).collect();
    ids.sort_unstable();
    ids.dedup();

    assert_eq!(ids.len(), THREADS);
    assert_eq!(next_id.load(Ordering::SeqCst), THREADS as u32);
}
