//! E3: classic producer/consumer on two semaphores returns both to their
//! initial values with nobody left blocked.

mod support;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use cluu_uthread::{Runtime, RuntimeConfig};

#[test]
fn producer_consumer_settles_back_to_initial_values() {
    const N: i64 = 4;
    let rt = Runtime::new(RuntimeConfig::default());
    let empty = rt.sem_init(N);
    let full = rt.sem_init(0);
    let produced = Arc::new(AtomicUsize::new(0));
    let consumed = Arc::new(AtomicUsize::new(0));

    let produced_clone = produced.clone();
    rt.create(0, move |rt| {
        for _ in 0..N {
            rt.sem_wait(empty).unwrap();
            produced_clone.fetch_add(1, Ordering::SeqCst);
            rt.sem_post(full).unwrap();
        }
    })
    .unwrap();

    let consumed_clone = consumed.clone();
    rt.create(0, move |rt| {
        for _ in 0..N {
            rt.sem_wait(full).unwrap();
            consumed_clone.fetch_add(1, Ordering::SeqCst);
            rt.sem_post(empty).unwrap();
        }
    })
    .unwrap();

    rt.start();

    assert_eq!(produced.load(Ordering::SeqCst), N as usize);
    assert_eq!(consumed.load(Ordering::SeqCst), N as usize);
}
