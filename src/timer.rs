/*
 * Timer
 *
 * Periodic tick source.
 *
 * The reference implementation spawns a pthread that sleeps for the tick
 * interval and calls back into the scheduler on every wakeup
 * (`timer_func`/`pthread_create`). This is the same shape with a
 * `std::thread` instead, stopped by a shared running flag rather than
 * being detached and leaked.
 */

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

pub struct Timer {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Timer {
    /// Spawns the tick thread. `on_tick` is called once per `tick_ms`
    /// interval until [`Timer::stop`] is called or the `Timer` is dropped.
    ///
    /// # Arguments
    ///
    /// * `tick_ms` - Interval, in milliseconds, between calls to `on_tick`.
    /// * `on_tick` - Callback invoked on the timer thread at each tick.
    ///
    /// # Returns
    ///
    /// Returns the running timer handle.
    pub fn start(tick_ms: u64, on_tick: impl Fn() + Send + 'static) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let running_clone = running.clone();
        let period = Duration::from_millis(tick_ms);

        let handle = std::thread::spawn(move || {
            while running_clone.load(Ordering::Acquire) {
                std::thread::sleep(period);
                if running_clone.load(Ordering::Acquire) {
                    on_tick();
                }
            }
        });

        Timer {
            running,
            handle: Some(handle),
        }
    }

    /// Signals the tick thread to stop and joins it.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.stop();
    }
}
