/*
 * Semaphores
 *
 * Counting semaphores with FIFO hand-off.
 *
 * Grounded in the Mach-style port/waiter-queue shape of the teacher's IPC
 * module: a fixed id space, a FIFO queue of blocked thread ids, and a
 * single owning table the runtime consults under its own lock rather than
 * each semaphore locking itself.
 */

use std::collections::VecDeque;

use crate::tcb::{ThreadId, SENTINEL_THREAD};

pub type SemaphoreId = u32;

const FIRST_SEMAPHORE_ID: SemaphoreId = 100;

pub struct Semaphore {
    pub id: SemaphoreId,
    pub value: i64,
    pub waiters: VecDeque<ThreadId>,
    pub owner_id: ThreadId,
}

impl Semaphore {
    fn new(id: SemaphoreId, initial: i64) -> Self {
        Semaphore {
            id,
            value: initial,
            waiters: VecDeque::new(),
            owner_id: SENTINEL_THREAD,
        }
    }
}

/// Outcome of a `sem_wait` attempt, used by the runtime to decide whether
/// the calling thread keeps running or must switch away.
pub enum WaitOutcome {
    Acquired,
    Blocked,
}

/// Outcome of a `sem_post`, naming the waiter (if any) that was just handed
/// the permit directly, bypassing the counter.
pub enum PostOutcome {
    HandedOff(ThreadId),
    Incremented,
}

pub struct SemaphoreTable {
    next_id: SemaphoreId,
    semaphores: Vec<Semaphore>,
}

impl SemaphoreTable {
    pub fn new() -> Self {
        SemaphoreTable {
            next_id: FIRST_SEMAPHORE_ID,
            semaphores: Vec::new(),
        }
    }

    /// Creates a new semaphore with the given initial value.
    ///
    /// # Arguments
    ///
    /// * `initial` - Starting count.
    ///
    /// # Returns
    ///
    /// Returns the newly assigned, previously unused semaphore id.
    pub fn init(&mut self, initial: i64) -> SemaphoreId {
        let id = self.next_id;
        self.next_id += 1;
        self.semaphores.push(Semaphore::new(id, initial));
        id
    }

    fn find_mut(&mut self, id: SemaphoreId) -> Option<&mut Semaphore> {
        self.semaphores.iter_mut().find(|s| s.id == id)
    }

    pub fn get(&self, id: SemaphoreId) -> Option<&Semaphore> {
        self.semaphores.iter().find(|s| s.id == id)
    }

    /// Attempts to acquire `id` for `thread`. Returns `Acquired` if the
    /// permit was available immediately (value decremented, ownership
    /// recorded), or `Blocked` if `thread` was appended to the FIFO waiter
    /// queue and must be suspended by the caller.
    pub fn wait(&mut self, id: SemaphoreId, thread: ThreadId) -> Option<WaitOutcome> {
        let sem = self.find_mut(id)?;
        if sem.value > 0 {
            sem.value -= 1;
            sem.owner_id = thread;
            Some(WaitOutcome::Acquired)
        } else {
            sem.waiters.push_back(thread);
            Some(WaitOutcome::Blocked)
        }
    }

    /// Releases `id` on behalf of `thread`. If a waiter is queued, the
    /// permit transfers directly to it (the counter is left untouched);
    /// otherwise the counter is incremented.
    pub fn post(&mut self, id: SemaphoreId) -> Option<PostOutcome> {
        let sem = self.find_mut(id)?;
        sem.owner_id = SENTINEL_THREAD;
        if let Some(next) = sem.waiters.pop_front() {
            sem.owner_id = next;
            Some(PostOutcome::HandedOff(next))
        } else {
            sem.value += 1;
            Some(PostOutcome::Incremented)
        }
    }
}

impl Default for SemaphoreTable {
    fn default() -> Self {
        Self::new()
    }
}
