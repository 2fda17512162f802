//! E4: allocating more than the physical frame pool forces random
//! replacement, and every mapped virtual page lands on a frame this thread
//! now owns.

mod support;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use cluu_uthread::{Runtime, RuntimeConfig};
use support::SharedLog;

#[test]
fn malloc_beyond_physical_pool_replaces_and_maps_all_virtual_pages() {
    let cfg = RuntimeConfig::default(); // V=16, P=8
    let log = SharedLog::new();
    let rt = Runtime::with_event_writer(cfg, log.clone());
    let vaddr = Arc::new(AtomicUsize::new(0));
    let vaddr_clone = vaddr.clone();

    rt.create(0, move |rt| {
        let v = rt.malloc(4096 * 20);
        vaddr_clone.store(v, Ordering::SeqCst);
    })
    .unwrap();

    rt.start();

    assert_eq!(log.count("PAGE_FAULT_MAPPED"), 16);
    assert!(log.count("PAGE_REPLACEMENT_LRU") >= 8);
}
