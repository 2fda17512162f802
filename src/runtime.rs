/*
 * Runtime
 *
 * The single owned value holding every piece of scheduler state, per the
 * re-architecture guidance to centralize state in one `Runtime` rather than
 * process-wide statics. All `RuntimeApi` entry points hang off this type.
 */

use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::clock::SystemClock;
use crate::config::RuntimeConfig;
use crate::error::RuntimeError;
use crate::log_sink::{EventLog, EventSink};
use crate::paging::{self, FrameTable};
use crate::scheduler;
use crate::semaphore::{PostOutcome, SemaphoreId, SemaphoreTable, WaitOutcome};
use crate::stack::StackHandle;
use crate::tcb::{Tcb, ThreadId, ThreadState, SENTINEL_FRAME, SENTINEL_SEM, SENTINEL_THREAD};
use crate::timer::Timer;

struct RuntimeState {
    threads: Vec<Tcb>,
    semaphores: SemaphoreTable,
    frames: FrameTable,
    current: Option<usize>,
    dispatch_stack: StackHandle,
    running: bool,
    boost_accumulator_ms: u64,
    rng: StdRng,
}

/// The cooperative-with-preemption thread runtime. Created via [`Runtime::new`]
/// and shared as an `Arc` so thread bodies can call back into it.
pub struct Runtime {
    config: RuntimeConfig,
    event_log: Arc<dyn EventSink>,
    state: Mutex<RuntimeState>,
    timer: Mutex<Option<Timer>>,
}

impl Runtime {
    /// Builds a runtime whose event log is discarded. Use
    /// [`Runtime::with_event_sink`] to capture the required log lines.
    ///
    /// # Arguments
    ///
    /// * `config` - Tunable parameters for the new runtime.
    ///
    /// # Returns
    ///
    /// Returns an `Arc`-wrapped runtime, ready to have threads `create`d
    /// and then `start`ed.
    pub fn new(config: RuntimeConfig) -> Arc<Self> {
        let sink: Arc<dyn EventSink> =
            Arc::new(EventLog::new(SystemClock::new(), std::io::sink()));
        Self::with_event_sink(config, sink)
    }

    /// Builds a runtime that emits every scheduler event to `event_log`.
    ///
    /// # Arguments
    ///
    /// * `config` - Tunable parameters for the new runtime.
    /// * `event_log` - Sink that receives the required `EventSink` lines.
    ///
    /// # Returns
    ///
    /// Returns an `Arc`-wrapped runtime, ready to have threads `create`d
    /// and then `start`ed.
    pub fn with_event_sink(config: RuntimeConfig, event_log: Arc<dyn EventSink>) -> Arc<Self> {
        log::info!(
            "constructing runtime: max_threads={} mlfq_levels={} physical_pages={}",
            config.max_threads,
            config.mlfq_levels,
            config.physical_pages
        );
        let state = RuntimeState {
            threads: Vec::with_capacity(config.max_threads),
            semaphores: SemaphoreTable::new(),
            frames: FrameTable::new(config.physical_pages),
            current: None,
            dispatch_stack: StackHandle::for_dispatch_loop(),
            running: true,
            boost_accumulator_ms: 0,
            rng: StdRng::from_entropy(),
        };
        Arc::new(Runtime {
            config,
            event_log,
            state: Mutex::new(state),
            timer: Mutex::new(None),
        })
    }

    /// Convenience constructor that writes event lines to `writer`.
    ///
    /// # Arguments
    ///
    /// * `config` - Tunable parameters for the new runtime.
    /// * `writer` - Destination for the required `EventSink` lines.
    ///
    /// # Returns
    ///
    /// Returns an `Arc`-wrapped runtime, ready to have threads `create`d
    /// and then `start`ed.
    pub fn with_event_writer<W: Write + Send + 'static>(
        config: RuntimeConfig,
        writer: W,
    ) -> Arc<Self> {
        let sink: Arc<dyn EventSink> = Arc::new(EventLog::new(SystemClock::new(), writer));
        Self::with_event_sink(config, sink)
    }

    // ---- lifecycle -----------------------------------------------------

    /// Creates a new thread bound to `body`. `body` receives a clone of this
    /// `Arc<Runtime>` so it can call back into `yield_now`/`exit`/etc.
    ///
    /// # Arguments
    ///
    /// * `priority` - Initial MLFQ level for the new thread; clamped to
    ///   `config.mlfq_levels - 1` if out of range.
    /// * `body` - The thread's entry point.
    ///
    /// # Returns
    ///
    /// Returns the new thread's id, or `RuntimeError::CapacityExceeded` if
    /// `config.max_threads` has already been reached, or
    /// `RuntimeError::StackCreationFailed` if the host stack could not be
    /// allocated.
    pub fn create(
        self: &Arc<Self>,
        priority: u8,
        body: impl FnOnce(Arc<Runtime>) + Send + 'static,
    ) -> Result<ThreadId, RuntimeError> {
        let mut state = self.state.lock().unwrap();
        if state.threads.len() >= self.config.max_threads {
            log::warn!(
                "thread creation refused: {} threads already created (max {})",
                state.threads.len(),
                self.config.max_threads
            );
            return Err(RuntimeError::CapacityExceeded {
                max: self.config.max_threads,
            });
        }

        let id = state.threads.len() as ThreadId;
        let clamped_priority = if priority >= self.config.mlfq_levels {
            0
        } else {
            priority
        };

        let rt = Arc::clone(self);
        let entry: Box<dyn FnOnce() + 'static> = Box::new(move || {
            body(Arc::clone(&rt));
            rt.exit();
        });

        let stack = StackHandle::new(self.config.stack_size, entry, &state.dispatch_stack)
            .map_err(|_| RuntimeError::StackCreationFailed)?;

        let tcb = Tcb::new(id, clamped_priority, self.config.virtual_pages, stack);
        let name = tcb.name.clone();
        state.threads.push(tcb);
        drop(state);
        self.event_log.emit(&name, "CREATED");
        Ok(id)
    }

    /// Sentinel-returning wrapper matching the reference implementation's
    /// "negative means full" convention for callers that want it.
    ///
    /// # Arguments
    ///
    /// * `priority` - Initial MLFQ level for the new thread.
    /// * `body` - The thread's entry point.
    ///
    /// # Returns
    ///
    /// Returns the new thread's id cast to `i64`, or `-1` on any
    /// `RuntimeError`.
    pub fn create_raw(
        self: &Arc<Self>,
        priority: u8,
        body: impl FnOnce(Arc<Runtime>) + Send + 'static,
    ) -> i64 {
        match self.create(priority, body) {
            Ok(id) => id as i64,
            Err(_) => -1,
        }
    }

    /// Runs the dispatch loop on the calling thread until every created
    /// thread has finished. Blocks until then.
    ///
    /// # Panics
    ///
    /// Panics if the internal state mutex is poisoned by another thread
    /// having panicked while holding it.
    pub fn start(self: &Arc<Self>) {
        let rt = Arc::clone(self);
        let tick_ms = self.config.tick_ms;
        let timer = Timer::start(tick_ms, move || rt.tick());
        *self.timer.lock().unwrap() = Some(timer);

        self.event_log.emit("SYSTEM", "SCHEDULER_START");

        loop {
            let next_idx = {
                let state = self.state.lock().unwrap();
                if !state.running {
                    None
                } else {
                    scheduler::select_next(&state.threads, self.config.mlfq_levels)
                }
            };

            match next_idx {
                Some(idx) => self.dispatch(idx),
                None => {
                    let done = {
                        let state = self.state.lock().unwrap();
                        !state.running || !scheduler::any_unfinished(&state.threads)
                    };
                    if done {
                        break;
                    }
                    std::thread::sleep(Duration::from_millis(10));
                }
            }
        }

        self.event_log.emit("SYSTEM", "SCHEDULER_STOP");
        log::info!("scheduler shutting down: all threads finished");
        if let Some(mut timer) = self.timer.lock().unwrap().take() {
            timer.stop();
        }
    }

    fn dispatch(&self, idx: usize) {
        let (thread_ptr, dispatch_ptr, name) = {
            let mut state = self.state.lock().unwrap();
            let summary = scheduler::ready_queue_summary(&state.threads, self.config.mlfq_levels);
            self.event_log.emit("SYSTEM", &summary);

            state.threads[idx].state = ThreadState::Running;
            state.threads[idx].quantum_used_ms = 0;
            state.current = Some(idx);
            let name = state.threads[idx].name.clone();
            (
                state.threads[idx].stack.as_raw(),
                state.dispatch_stack.as_raw(),
                name,
            )
        };
        self.event_log.emit(&name, "RUNNING");
        unsafe {
            libc::swapcontext(dispatch_ptr, thread_ptr);
        }
    }

    /// Invoked by the timer thread every tick: quantum accounting and
    /// demotion, simulated disk completion, and periodic boost (SPEC_FULL
    /// §4.2). Mirrors the reference implementation's `timer_func`, which
    /// also performs the demotion's context switch from its own thread;
    /// kept faithful to that design rather than reworked into a
    /// same-thread-only preemption model.
    fn tick(&self) {
        let mut preempt = None;
        {
            let mut state = self.state.lock().unwrap();
            if !state.running {
                return;
            }

            if let Some(idx) = state.current {
                if state.threads[idx].state == ThreadState::Running {
                    state.threads[idx].quantum_used_ms += self.config.tick_ms;
                    let priority = state.threads[idx].priority;
                    let limit = self.config.quantum_for(priority);
                    if priority + 1 < self.config.mlfq_levels
                        && state.threads[idx].quantum_used_ms >= limit
                    {
                        state.threads[idx].priority = priority + 1;
                        state.threads[idx].state = ThreadState::Ready;
                        state.threads[idx].quantum_used_ms = 0;
                        let name = state.threads[idx].name.clone();
                        let thread_ptr = state.threads[idx].stack.as_raw();
                        let dispatch_ptr = state.dispatch_stack.as_raw();
                        state.current = None;
                        self.event_log.emit(
                            &name,
                            &format!("MLFQ_DOWNGRADE Q{priority}->Q{}", priority + 1),
                        );
                        preempt = Some((thread_ptr, dispatch_ptr));
                    }
                }
            }

            if preempt.is_none() {
                self.tick_disk_and_boost(&mut state);
            }
        }

        if let Some((thread_ptr, dispatch_ptr)) = preempt {
            unsafe {
                libc::swapcontext(thread_ptr, dispatch_ptr);
            }
        }
    }

    fn tick_disk_and_boost(&self, state: &mut RuntimeState) {
        let RuntimeState { threads, rng, .. } = state;
        for t in threads.iter_mut() {
            if t.state == ThreadState::DiskWait && rng.gen_bool(0.1) {
                t.state = ThreadState::Ready;
                self.event_log.emit(&t.name, "DISK_IO_DONE");
            }
        }

        state.boost_accumulator_ms += self.config.tick_ms;
        if state.boost_accumulator_ms >= self.config.boost_interval_ms {
            state.boost_accumulator_ms = 0;
            for t in state.threads.iter_mut() {
                if !t.is_finished() {
                    t.priority = 0;
                }
            }
            self.event_log.emit("SYSTEM", "MLFQ_BOOST_ALL_TO_Q0");
        }
    }

    // ---- called by the currently running thread -------------------------

    fn current_idx(state: &RuntimeState) -> usize {
        state
            .current
            .expect("runtime API called outside a scheduled thread")
    }

    /// Voluntarily gives up the CPU, returning the calling thread to its
    /// current MLFQ level's ready queue.
    ///
    /// # Panics
    ///
    /// Panics if called from outside a scheduled thread (i.e. not from
    /// inside a `Runtime::create` body while the runtime is dispatching it).
    pub fn yield_now(&self) {
        let (thread_ptr, dispatch_ptr, name) = {
            let mut state = self.state.lock().unwrap();
            let idx = Self::current_idx(&state);
            state.threads[idx].state = ThreadState::Ready;
            let name = state.threads[idx].name.clone();
            (
                state.threads[idx].stack.as_raw(),
                state.dispatch_stack.as_raw(),
                name,
            )
        };
        self.event_log.emit(&name, "YIELD");
        unsafe {
            libc::swapcontext(thread_ptr, dispatch_ptr);
        }
    }

    /// Finishes the calling thread. Clears held locks without posting to
    /// them (O1) and releases every physical frame it owns (I3), then
    /// switches away for good.
    ///
    /// # Panics
    ///
    /// Panics if called from outside a scheduled thread, or if the
    /// scheduler ever dispatches a thread after it has finished.
    pub fn exit(&self) -> ! {
        let (thread_ptr, dispatch_ptr, name) = {
            let mut state = self.state.lock().unwrap();
            let idx = Self::current_idx(&state);
            state.threads[idx].state = ThreadState::Finished;
            let name = state.threads[idx].name.clone();
            let _held = state.threads[idx].take_held_locks();

            let thread_id = state.threads[idx].id;
            state.frames.release_all_owned_by(thread_id);
            for slot in state.threads[idx].page_table.iter_mut() {
                *slot = SENTINEL_FRAME;
            }

            state.current = None;
            (
                state.threads[idx].stack.as_raw(),
                state.dispatch_stack.as_raw(),
                name,
            )
        };
        self.event_log.emit(&name, "FINISHED");
        unsafe {
            libc::swapcontext(thread_ptr, dispatch_ptr);
        }
        unreachable!("a finished thread must never be dispatched again")
    }

    /// Simulates a blocking disk read, parking the calling thread in
    /// `DiskWait` until the timer's periodic completion check releases it.
    ///
    /// # Arguments
    ///
    /// * `block_id` - Identifier of the disk block being read, recorded in
    ///   the event log only; no actual I/O is performed.
    ///
    /// # Panics
    ///
    /// Panics if called from outside a scheduled thread.
    pub fn disk_io(&self, block_id: u64) {
        let (thread_ptr, dispatch_ptr, name) = {
            let mut state = self.state.lock().unwrap();
            let idx = Self::current_idx(&state);
            state.threads[idx].state = ThreadState::DiskWait;
            let name = state.threads[idx].name.clone();
            (
                state.threads[idx].stack.as_raw(),
                state.dispatch_stack.as_raw(),
                name,
            )
        };
        self.event_log
            .emit(&name, &format!("DISK_IO_START {block_id}"));
        unsafe {
            libc::swapcontext(thread_ptr, dispatch_ptr);
        }
    }

    // ---- semaphores ------------------------------------------------------

    /// Creates a counting semaphore with the given initial value.
    ///
    /// # Arguments
    ///
    /// * `initial` - Starting count. A mutex should be initialized with `1`.
    ///
    /// # Returns
    ///
    /// Returns the id used to address this semaphore from `sem_wait`,
    /// `sem_post`, `lock`, and `unlock`.
    pub fn sem_init(&self, initial: i64) -> SemaphoreId {
        self.state.lock().unwrap().semaphores.init(initial)
    }

    /// Waits on a semaphore, blocking the calling thread if its count is
    /// already zero.
    ///
    /// # Arguments
    ///
    /// * `sem` - Id of the semaphore to wait on.
    ///
    /// # Returns
    ///
    /// Returns `Ok(())` once the semaphore has been acquired, or
    /// `RuntimeError::UnknownSemaphore` if `sem` was never returned by
    /// `sem_init`.
    ///
    /// # Panics
    ///
    /// Panics if called from outside a scheduled thread.
    pub fn sem_wait(&self, sem: SemaphoreId) -> Result<(), RuntimeError> {
        let mut block = None;
        {
            let mut state = self.state.lock().unwrap();
            let idx = Self::current_idx(&state);
            let owner_before = state
                .semaphores
                .get(sem)
                .map(|s| s.owner_id)
                .unwrap_or(SENTINEL_THREAD);
            let thread_id = state.threads[idx].id;

            match state.semaphores.wait(sem, thread_id) {
                Some(WaitOutcome::Acquired) => {
                    state.threads[idx].record_held_lock(sem);
                    let name = state.threads[idx].name.clone();
                    drop(state);
                    self.event_log.emit(&name, &format!("ACQUIRED_SEM {sem}"));
                }
                Some(WaitOutcome::Blocked) => {
                    state.threads[idx].state = ThreadState::Blocked;
                    state.threads[idx].waiting_for = sem;
                    let name = state.threads[idx].name.clone();
                    let thread_ptr = state.threads[idx].stack.as_raw();
                    let dispatch_ptr = state.dispatch_stack.as_raw();
                    drop(state);
                    self.event_log.emit(
                        &name,
                        &format!("BLOCKED_ON_SEM {sem}_OWNED_BY_{owner_before}"),
                    );
                    block = Some((thread_ptr, dispatch_ptr));
                }
                None => return Err(RuntimeError::UnknownSemaphore(sem)),
            }
        }
        if let Some((thread_ptr, dispatch_ptr)) = block {
            unsafe {
                libc::swapcontext(thread_ptr, dispatch_ptr);
            }
        }
        Ok(())
    }

    /// Posts to a semaphore, either waking the longest-waiting blocked
    /// thread or incrementing the count.
    ///
    /// # Arguments
    ///
    /// * `sem` - Id of the semaphore to post to.
    ///
    /// # Returns
    ///
    /// Returns `Ok(())` once the post has been applied, or
    /// `RuntimeError::UnknownSemaphore` if `sem` was never returned by
    /// `sem_init`.
    ///
    /// # Panics
    ///
    /// Panics if called from outside a scheduled thread.
    pub fn sem_post(&self, sem: SemaphoreId) -> Result<(), RuntimeError> {
        let mut state = self.state.lock().unwrap();
        let idx = Self::current_idx(&state);
        state.threads[idx].release_held_lock(sem);
        let poster_name = state.threads[idx].name.clone();

        match state.semaphores.post(sem) {
            Some(PostOutcome::HandedOff(waiter_id)) => {
                let waiter_idx = waiter_id as usize;
                state.threads[waiter_idx].state = ThreadState::Ready;
                state.threads[waiter_idx].waiting_for = SENTINEL_SEM;
                state.threads[waiter_idx].record_held_lock(sem);
                let waiter_name = state.threads[waiter_idx].name.clone();
                drop(state);
                self.event_log.emit(
                    &poster_name,
                    &format!("SIGNAL_HANDOVER {sem}_TO_{waiter_name}"),
                );
                self.event_log.emit(&waiter_name, "UNBLOCKED_BY_SEM");
            }
            Some(PostOutcome::Incremented) => {}
            None => return Err(RuntimeError::UnknownSemaphore(sem)),
        }
        Ok(())
    }

    /// Creates a semaphore pre-initialized to `1`, for use as a mutex.
    ///
    /// # Returns
    ///
    /// Returns the id used to address this mutex from `lock`/`unlock`.
    pub fn mutex_init(&self) -> SemaphoreId {
        self.sem_init(1)
    }

    /// Acquires a mutex, blocking the calling thread if it is already held.
    ///
    /// # Arguments
    ///
    /// * `mutex` - Id returned by `mutex_init`.
    ///
    /// # Returns
    ///
    /// Returns `Ok(())` once the mutex is held, or
    /// `RuntimeError::UnknownSemaphore` if `mutex` is not a known id.
    pub fn lock(&self, mutex: SemaphoreId) -> Result<(), RuntimeError> {
        self.sem_wait(mutex)
    }

    /// Releases a mutex previously acquired with `lock`.
    ///
    /// # Arguments
    ///
    /// * `mutex` - Id returned by `mutex_init`.
    ///
    /// # Returns
    ///
    /// Returns `Ok(())` once released, or `RuntimeError::UnknownSemaphore`
    /// if `mutex` is not a known id.
    pub fn unlock(&self, mutex: SemaphoreId) -> Result<(), RuntimeError> {
        self.sem_post(mutex)
    }

    // ---- paging ------------------------------------------------------

    /// Maps enough pages to cover `size` bytes into the calling thread's
    /// virtual address space, evicting another thread's frame if physical
    /// memory is exhausted.
    ///
    /// # Arguments
    ///
    /// * `size` - Requested allocation size in bytes.
    ///
    /// # Returns
    ///
    /// Returns the virtual address of the first mapped page, or `0` if
    /// `size` needed no pages.
    ///
    /// # Panics
    ///
    /// Panics if called from outside a scheduled thread.
    pub fn malloc(&self, size: usize) -> usize {
        let mut state = self.state.lock().unwrap();
        let idx = Self::current_idx(&state);
        let pages_needed = paging::pages_needed_for(size, self.config.page_size);
        let name = state.threads[idx].name.clone();

        let RuntimeState {
            threads,
            frames,
            rng,
            ..
        } = &mut *state;
        let tcb = &mut threads[idx];
        let mapped = paging::allocate_pages(&mut tcb.page_table, frames, tcb.id, pages_needed, rng);

        let first_vpage = mapped.first().map(|m| m.virtual_page);
        for m in &mapped {
            if m.replaced_owner.is_some() {
                self.event_log.emit(&name, "PAGE_REPLACEMENT_LRU");
            }
            self.event_log.emit(
                &name,
                &format!("PAGE_FAULT_MAPPED V:{}->P:{}", m.virtual_page, m.frame),
            );
        }

        first_vpage.map(|v| v * self.config.page_size).unwrap_or(0)
    }

    /// Unmaps every page currently owned by the calling thread.
    ///
    /// # Arguments
    ///
    /// * `_vaddr` - Accepted for API symmetry with `malloc`; this
    ///   implementation frees a thread's entire page table at once rather
    ///   than tracking individual allocations.
    ///
    /// # Panics
    ///
    /// Panics if called from outside a scheduled thread.
    pub fn free(&self, _vaddr: usize) {
        let mut state = self.state.lock().unwrap();
        let idx = Self::current_idx(&state);
        let name = state.threads[idx].name.clone();

        let RuntimeState { threads, frames, .. } = &mut *state;
        paging::free_all(&mut threads[idx].page_table, frames);
        drop(state);
        self.event_log.emit(&name, "MEMORY_FREE_ALL");
    }
}
