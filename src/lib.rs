/*
 * cluu_uthread
 *
 * A user-level threading runtime: an MLFQ scheduler multiplexing
 * cooperative-with-preemption threads onto a single OS thread via
 * `ucontext`-based stack switching, with counting semaphores, simulated
 * paging, and simulated blocking disk I/O.
 */

pub mod clock;
pub mod config;
pub mod error;
pub mod log_sink;
pub mod paging;
pub mod scheduler;
pub mod semaphore;
pub mod stack;
pub mod tcb;
pub mod timer;

mod runtime;

pub use clock::{Clock, SystemClock};
pub use config::RuntimeConfig;
pub use error::{RuntimeError, RuntimeResult};
pub use log_sink::{EventLog, EventSink};
pub use runtime::Runtime;
pub use semaphore::SemaphoreId;
pub use tcb::ThreadId;
