/*
 * Scheduler
 *
 * MLFQ selection and the scheduler's required observability line.
 *
 * Kept as free functions over `&[Tcb]` rather than a `Scheduler`
 * struct with its own state: MLFQ is the only policy this runtime ever
 * runs, so the policy/mechanism trait split the teacher uses for its
 * pluggable schedulers would only add indirection here.
 */

use crate::tcb::{Tcb, ThreadState};

/// Picks the next thread to run: the lowest-id `Ready` thread at the lowest
/// priority level.
///
/// # Arguments
///
/// * `threads` - All threads known to the runtime.
/// * `levels` - Number of MLFQ levels configured.
///
/// # Returns
///
/// Returns the index into `threads` (ids and indices coincide for the
/// lifetime of this runtime), or `None` if nothing is ready.
pub fn select_next(threads: &[Tcb], levels: u8) -> Option<usize> {
    for level in 0..levels {
        if let Some(idx) = threads
            .iter()
            .position(|t| t.priority == level && t.state == ThreadState::Ready)
        {
            return Some(idx);
        }
    }
    None
}

/// Reports whether any thread has not yet reached `ThreadState::Finished`.
pub fn any_unfinished(threads: &[Tcb]) -> bool {
    threads.iter().any(|t| !t.is_finished())
}

/// Builds the required `"MLFQ: Q0[...] Q1[...] Q2[...]"` observability line,
/// listing ready thread names in scan order at each level.
///
/// # Arguments
///
/// * `threads` - All threads known to the runtime.
/// * `levels` - Number of MLFQ levels configured.
///
/// # Returns
///
/// Returns the formatted summary line.
pub fn ready_queue_summary(threads: &[Tcb], levels: u8) -> String {
    let mut out = String::from("MLFQ:");
    for level in 0..levels {
        let names: Vec<&str> = threads
            .iter()
            .filter(|t| t.priority == level && t.state == ThreadState::Ready)
            .map(|t| t.name.as_str())
            .collect();
        out.push_str(&format!(" Q{level}[{}]", names.join(",")));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stack::StackHandle;

    fn tcb_with(id: u32, priority: u8, state: ThreadState) -> Tcb {
        let mut t = Tcb::new(id, priority, 16, StackHandle::for_dispatch_loop());
        t.state = state;
        t
    }

    #[test]
    fn selects_lowest_id_at_lowest_ready_priority() {
        let threads = vec![
            tcb_with(0, 1, ThreadState::Ready),
            tcb_with(1, 0, ThreadState::Ready),
            tcb_with(2, 0, ThreadState::Ready),
        ];
        assert_eq!(select_next(&threads, 3), Some(1));
    }

    #[test]
    fn skips_non_ready_threads() {
        let threads = vec![
            tcb_with(0, 0, ThreadState::Running),
            tcb_with(1, 0, ThreadState::Blocked),
            tcb_with(2, 0, ThreadState::Ready),
        ];
        assert_eq!(select_next(&threads, 3), Some(2));
    }

    #[test]
    fn none_when_nothing_ready() {
        let threads = vec![tcb_with(0, 0, ThreadState::Finished)];
        assert_eq!(select_next(&threads, 3), None);
        assert!(!any_unfinished(&threads));
    }

    #[test]
    fn summary_lists_names_per_level() {
        let threads = vec![
            tcb_with(0, 0, ThreadState::Ready),
            tcb_with(1, 1, ThreadState::Ready),
            tcb_with(2, 0, ThreadState::Blocked),
        ];
        assert_eq!(ready_queue_summary(&threads, 3), "MLFQ: Q0[T0] Q1[T1] Q2[]");
    }
}
