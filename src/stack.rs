/*
 * Stack Switching
 *
 * The reference implementation binds each thread to a `ucontext_t` plus a
 * backing stack buffer and moves between them with `swapcontext`. This
 * module is the direct Rust translation through the `libc` crate's FFI
 * bindings for `ucontext.h`, kept behind a small capability surface so the
 * scheduler only ever says "create a stack for this closure" and "switch".
 */

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;

use libc::ucontext_t;

use crate::error::RuntimeError;

/// A suspended (or currently running) execution context: a `ucontext_t`
/// bound to its own backing stack.
///
/// The stack buffer must outlive every switch that may resume into it, so it
/// is owned here rather than passed in separately.
pub struct StackHandle {
    context: UnsafeCell<ucontext_t>,
    // Kept alive for the lifetime of the handle; ucontext_t points into it.
    _stack: Vec<u8>,
}

// The context buffer is only ever touched from the single OS thread driving
// the dispatch loop; it crosses threads solely by residing inside a TCB
// behind the runtime's lock, never accessed concurrently.
unsafe impl Send for StackHandle {}

impl StackHandle {
    /// A handle with no backing stack of its own, representing the
    /// dispatch loop's original context. Swapping into another handle from
    /// here suspends the dispatch loop and resumes it on return.
    pub fn for_dispatch_loop() -> Self {
        StackHandle {
            context: UnsafeCell::new(unsafe { MaybeUninit::zeroed().assume_init() }),
            _stack: Vec::new(),
        }
    }

    /// Creates a new suspended stack of `stack_size` bytes whose first
    /// resumption runs `entry` to completion.
    ///
    /// `return_to` mirrors the reference implementation's `uc_link =
    /// &main_context`: if `entry` ever returns instead of the thread calling
    /// `exit()` itself, control resumes in `return_to` rather than
    /// terminating the process.
    ///
    /// # Arguments
    ///
    /// * `stack_size` - Size in bytes of the backing stack buffer.
    /// * `entry` - Closure to run on first resumption of this context.
    /// * `return_to` - Context control resumes in if `entry` returns.
    ///
    /// # Returns
    ///
    /// Returns the new handle, or `RuntimeError::StackCreationFailed` if
    /// `getcontext` fails.
    pub fn new(
        stack_size: usize,
        entry: Box<dyn FnOnce() + 'static>,
        return_to: &StackHandle,
    ) -> Result<Self, RuntimeError> {
        let mut stack = vec![0u8; stack_size];
        let mut ctx: ucontext_t = unsafe { MaybeUninit::zeroed().assume_init() };

        if unsafe { libc::getcontext(&mut ctx) } != 0 {
            return Err(RuntimeError::StackCreationFailed);
        }

        ctx.uc_stack.ss_sp = stack.as_mut_ptr() as *mut libc::c_void;
        ctx.uc_stack.ss_size = stack_size;
        ctx.uc_stack.ss_flags = 0;
        ctx.uc_link = return_to.ptr();

        // makecontext's varargs are plain `int`s; a fat closure pointer
        // does not fit in one, so box it again and split the resulting
        // thin pointer across two u32 halves, reassembled in the trampoline.
        let double_boxed: Box<Box<dyn FnOnce()>> = Box::new(entry);
        let raw = Box::into_raw(double_boxed) as usize;
        let hi = (raw >> 32) as u32;
        let lo = (raw & 0xffff_ffff) as u32;

        unsafe {
            let func: extern "C" fn() = std::mem::transmute(trampoline as extern "C" fn(u32, u32));
            libc::makecontext(&mut ctx, func, 2, hi, lo);
        }

        Ok(StackHandle {
            context: UnsafeCell::new(ctx),
            _stack: stack,
        })
    }

    fn ptr(&self) -> *mut ucontext_t {
        self.context.get()
    }

    /// Raw pointer to the underlying `ucontext_t`, for callers that must
    /// perform the `swapcontext` themselves outside a [`StackSwitch`] impl
    /// (the scheduler releases its lock before switching, so it cannot hold
    /// a borrow of the owning `Tcb` across the call).
    pub(crate) fn as_raw(&self) -> *mut ucontext_t {
        self.context.get()
    }
}

/// Reconstructs the boxed entry closure from the two halves passed through
/// `makecontext` and runs it. Never returns under normal use: the closure's
/// last act is calling the runtime's `exit`, which switches away for good.
extern "C" fn trampoline(hi: u32, lo: u32) {
    let raw = ((hi as usize) << 32) | (lo as usize);
    let boxed: Box<Box<dyn FnOnce()>> = unsafe { Box::from_raw(raw as *mut Box<dyn FnOnce()>) };
    (*boxed)();
}

/// Host stack-switch capability, abstracted per the runtime's re-architecture
/// guidance so the scheduler never talks to `libc` directly.
pub trait StackSwitch {
    fn switch(&self, from: &StackHandle, to: &StackHandle);
}

/// The POSIX `ucontext.h`-backed implementation.
pub struct UcontextSwitch;

impl StackSwitch for UcontextSwitch {
    fn switch(&self, from: &StackHandle, to: &StackHandle) {
        unsafe {
            libc::swapcontext(from.ptr(), to.ptr());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn switch_runs_entry_and_returns_to_dispatch_loop() {
        let ran = Arc::new(AtomicBool::new(false));
        let ran_clone = ran.clone();

        let dispatch = StackHandle::for_dispatch_loop();
        let worker = StackHandle::new(
            64 * 1024,
            Box::new(move || {
                ran_clone.store(true, Ordering::SeqCst);
            }),
            &dispatch,
        )
        .expect("stack creation should succeed");

        let switcher = UcontextSwitch;
        // The closure runs to completion and falls off the end of the
        // trampoline; uc_link resumes `dispatch`, so this switch returns
        // normally instead of terminating the process.
        switcher.switch(&dispatch, &worker);

        assert!(ran.load(Ordering::SeqCst));
    }
}
