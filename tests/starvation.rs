//! E6: a periodic boost lets a thread that has been waiting behind a
//! CPU-bound hog eventually run at the hog's former priority.

mod support;

use cluu_uthread::{Runtime, RuntimeConfig};
use support::{spin, SharedLog};

#[test]
fn boost_restores_q0_to_everyone_not_finished() {
    let mut cfg = RuntimeConfig::default();
    cfg.tick_ms = 2;
    cfg.q0_quantum_ms = 4;
    cfg.q1_quantum_ms = 6;
    cfg.boost_interval_ms = 30;

    let log = SharedLog::new();
    let rt = Runtime::with_event_writer(cfg, log.clone());

    rt.create(0, |_rt| {
        spin(40_000_000);
    })
    .unwrap();

    rt.create(0, |rt| {
        // Repeated voluntary yields stand in for a thread that would
        // otherwise starve behind the CPU-bound hog above.
        for _ in 0..20 {
            rt.yield_now();
        }
    })
    .unwrap();

    rt.start();

    assert!(log.contains("MLFQ_BOOST_ALL_TO_Q0"));
    assert!(log.contains("FINISHED"));
}
