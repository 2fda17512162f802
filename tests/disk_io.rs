//! E5: a thread that issues disk I/O cannot be dispatched while DISK_WAIT,
//! and eventually completes and resumes.

mod support;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cluu_uthread::{Runtime, RuntimeConfig};
use support::SharedLog;

#[test]
fn disk_io_eventually_completes_and_resumes() {
    let mut cfg = RuntimeConfig::default();
    cfg.tick_ms = 2;
    let log = SharedLog::new();
    let rt = Runtime::with_event_writer(cfg, log.clone());
    let resumed = Arc::new(AtomicBool::new(false));
    let resumed_clone = resumed.clone();

    rt.create(0, move |rt| {
        rt.disk_io(7);
        resumed_clone.store(true, Ordering::SeqCst);
    })
    .unwrap();

    rt.start();

    assert!(resumed.load(Ordering::SeqCst));
    assert!(log.contains("DISK_IO_START 7"));
    assert!(log.contains("DISK_IO_DONE"));
}
