/*
 * Event Log
 *
 * The one persisted, required log format: `"<micros> <actor> <message>"`,
 * flushed after every line. This is distinct from the ordinary `log` facade
 * diagnostics used elsewhere in the crate.
 */

use std::io::Write;
use std::sync::Mutex;

use crate::clock::Clock;

pub trait EventSink: Send + Sync {
    /// Records one event line.
    ///
    /// # Arguments
    ///
    /// * `actor` - Name of the thread or `"SYSTEM"` that produced the event.
    /// * `message` - The event's body, e.g. `"CREATED"` or `"YIELD"`.
    fn emit(&self, actor: &str, message: &str);
}

/// Writes event lines to an arbitrary [`Write`] implementation, guarded by a
/// mutex since the scheduler lock may be held by either the dispatch loop or
/// the timer thread when an event fires.
pub struct EventLog<C: Clock, W: Write + Send> {
    clock: C,
    sink: Mutex<W>,
}

impl<C: Clock, W: Write + Send> EventLog<C, W> {
    /// Builds an event log that timestamps lines with `clock` and writes
    /// them to `sink`.
    ///
    /// # Arguments
    ///
    /// * `clock` - Source of the microsecond timestamps prefixing each line.
    /// * `sink` - Destination the formatted lines are written to.
    pub fn new(clock: C, sink: W) -> Self {
        EventLog {
            clock,
            sink: Mutex::new(sink),
        }
    }
}

impl<C: Clock, W: Write + Send> EventSink for EventLog<C, W> {
    fn emit(&self, actor: &str, message: &str) {
        let micros = self.clock.now_micros();
        let mut sink = self.sink.lock().unwrap_or_else(|e| e.into_inner());
        let _ = writeln!(sink, "{micros} {actor} {message}");
        let _ = sink.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;

    struct FixedClock;
    impl Clock for FixedClock {
        fn now_micros(&self) -> u64 {
            42
        }
    }

    #[test]
    fn emits_required_format() {
        let buf: Vec<u8> = Vec::new();
        let log = EventLog::new(FixedClock, buf);
        log.emit("T0", "CREATED");
        let sink = log.sink.lock().unwrap();
        assert_eq!(std::str::from_utf8(sink.as_slice()).unwrap(), "42 T0 CREATED\n");
    }

    #[test]
    fn works_with_real_clock() {
        let log = EventLog::new(SystemClock::new(), Vec::new());
        log.emit("SYSTEM", "BOOT");
    }
}
