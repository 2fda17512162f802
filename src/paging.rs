/*
 * Paging
 *
 * Simulated paging: a fixed-size shared frame pool and per-thread page
 * tables. Nothing here touches real memory; `malloc`/`free` only update
 * bookkeeping and return a fabricated virtual address, as the reference
 * implementation does.
 */

use rand::Rng;

use crate::tcb::{ThreadId, SENTINEL_FRAME, SENTINEL_THREAD};

/// Physical frame ownership, shared across every thread.
pub struct FrameTable {
    owners: Vec<ThreadId>,
}

impl FrameTable {
    /// Creates a frame table with `physical_pages` frames, all free.
    ///
    /// # Arguments
    ///
    /// * `physical_pages` - Number of physical frames the runtime manages.
    pub fn new(physical_pages: usize) -> Self {
        FrameTable {
            owners: vec![SENTINEL_THREAD; physical_pages],
        }
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }

    /// Returns the id of the thread owning `frame`, or `SENTINEL_THREAD` if
    /// the frame is free.
    pub fn owner(&self, frame: usize) -> ThreadId {
        self.owners[frame]
    }

    fn first_free(&self) -> Option<usize> {
        self.owners.iter().position(|id| *id == SENTINEL_THREAD)
    }

    /// Frees every frame currently owned by `thread`.
    ///
    /// # Arguments
    ///
    /// * `thread` - Id of the thread whose frames are being released.
    pub fn release_all_owned_by(&mut self, thread: ThreadId) {
        for owner in self.owners.iter_mut() {
            if *owner == thread {
                *owner = SENTINEL_THREAD;
            }
        }
    }

    pub fn release_frame(&mut self, frame: usize) {
        self.owners[frame] = SENTINEL_THREAD;
    }

    fn claim(&mut self, frame: usize, thread: ThreadId) {
        self.owners[frame] = thread;
    }
}

/// Result of mapping one virtual page during `malloc`.
pub struct PageMapping {
    pub virtual_page: usize,
    pub frame: usize,
    /// Set when the frame was reclaimed from another thread rather than
    /// taken from the free pool; that thread's page table now has a
    /// dangling entry (see O3 -- implemented as specified, not patched).
    pub replaced_owner: Option<ThreadId>,
}

/// Maps up to `pages_needed` free virtual pages of `page_table` to frames in
/// `frames`, falling back to uniform-random replacement once the frame pool
/// is exhausted.
///
/// # Arguments
///
/// * `page_table` - The requesting thread's virtual page table.
/// * `frames` - The runtime's shared physical frame pool.
/// * `owner` - Id of the requesting thread, recorded as the new frame owner.
/// * `pages_needed` - Number of additional pages to map.
/// * `rng` - Source of randomness for victim selection once frames run out.
///
/// # Returns
///
/// Returns one [`PageMapping`] per page actually mapped, in the order they
/// were mapped.
pub fn allocate_pages(
    page_table: &mut [usize],
    frames: &mut FrameTable,
    owner: ThreadId,
    mut pages_needed: usize,
    rng: &mut impl Rng,
) -> Vec<PageMapping> {
    let mut mapped = Vec::new();
    for (v, slot) in page_table.iter_mut().enumerate() {
        if pages_needed == 0 {
            break;
        }
        if *slot != SENTINEL_FRAME {
            continue;
        }

        let (frame, replaced_owner) = if let Some(free) = frames.first_free() {
            (free, None)
        } else {
            let victim = rng.gen_range(0..frames.len());
            let previous = frames.owner(victim);
            let replaced = if previous != SENTINEL_THREAD {
                Some(previous)
            } else {
                None
            };
            log::debug!(
                "frame pool exhausted: evicting frame {victim} from thread {previous} for thread {owner}"
            );
            (victim, replaced)
        };

        frames.claim(frame, owner);
        *slot = frame;
        mapped.push(PageMapping {
            virtual_page: v,
            frame,
            replaced_owner,
        });
        pages_needed -= 1;
    }
    mapped
}

/// Unmaps every page owned by `owner` in `page_table`, releasing the
/// corresponding frames back to the pool.
///
/// # Arguments
///
/// * `page_table` - The thread's virtual page table to clear.
/// * `frames` - The runtime's shared physical frame pool.
pub fn free_all(page_table: &mut [usize], frames: &mut FrameTable) {
    for slot in page_table.iter_mut() {
        if *slot != SENTINEL_FRAME {
            frames.release_frame(*slot);
            *slot = SENTINEL_FRAME;
        }
    }
}

/// Computes the number of pages needed to cover `size` bytes.
///
/// # Arguments
///
/// * `size` - Requested allocation size in bytes.
/// * `page_size` - Size of one page in bytes.
///
/// # Returns
///
/// Returns `size` divided by `page_size`, rounded up.
pub fn pages_needed_for(size: usize, page_size: usize) -> usize {
    size.div_ceil(page_size)
}
