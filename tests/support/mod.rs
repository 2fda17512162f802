use std::io::Write;
use std::sync::{Arc, Mutex};

/// A `Write` sink backed by a shared buffer, so a test can hand one clone to
/// the runtime's event log and inspect the other after `start()` returns.
#[derive(Clone, Default)]
pub struct SharedLog(Arc<Mutex<Vec<u8>>>);

impl SharedLog {
    pub fn new() -> Self {
        SharedLog::default()
    }

    pub fn lines(&self) -> Vec<String> {
        let buf = self.0.lock().unwrap();
        String::from_utf8_lossy(&buf)
            .lines()
            .map(|l| l.to_string())
            .collect()
    }

    pub fn contains(&self, token: &str) -> bool {
        self.lines().iter().any(|l| l.contains(token))
    }

    pub fn count(&self, token: &str) -> usize {
        self.lines().iter().filter(|l| l.contains(token)).count()
    }
}

impl Write for SharedLog {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Busy-spins for roughly `iterations` cheap arithmetic ops, standing in for
/// a CPU-bound thread body that never voluntarily yields.
pub fn spin(iterations: u64) -> u64 {
    let mut acc: u64 = 0;
    for i in 0..iterations {
        acc = acc.wrapping_add(i ^ (i >> 3));
    }
    std::hint::black_box(acc)
}
