//! E2: waiters are released in strict FIFO order via direct hand-off, never
//! through the counter while anyone is still waiting.

mod support;

use std::sync::{Arc, Mutex};

use cluu_uthread::{Runtime, RuntimeConfig};
use support::SharedLog;

#[test]
fn waiters_released_in_fifo_order() {
    let log = SharedLog::new();
    let rt = Runtime::with_event_writer(RuntimeConfig::default(), log.clone());
    let sem = rt.sem_init(0);
    let order = Arc::new(Mutex::new(Vec::new()));

    let order_b = order.clone();
    rt.create(0, move |rt| {
        rt.sem_wait(sem).unwrap();
        order_b.lock().unwrap().push("B");
    })
    .unwrap();

    let order_c = order.clone();
    rt.create(0, move |rt| {
        rt.sem_wait(sem).unwrap();
        order_c.lock().unwrap().push("C");
    })
    .unwrap();

    rt.create(0, move |rt| {
        rt.sem_post(sem).unwrap();
        rt.yield_now();
        rt.sem_post(sem).unwrap();
    })
    .unwrap();

    rt.start();

    assert_eq!(*order.lock().unwrap(), vec!["B", "C"]);
    assert_eq!(log.count("SIGNAL_HANDOVER"), 2);
}
