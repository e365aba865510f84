//! Connection slot table: the process-wide admission bound.
//!
//! A fixed table of atomic slots shared between the accept loop and every
//! handler task. Each in-flight connection holds exactly one slot, claimed
//! by the accept loop at acceptance and released by the owning handler when
//! it finishes, whatever path it exits through.

use std::{
    os::fd::RawFd,
    sync::{
        atomic::{AtomicI32, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::time::sleep;

/// Sentinel for an unowned slot.
pub(crate) const FREE: i32 = -1;

/// Fixed-capacity table of in-flight connection descriptors.
///
/// The table length is rounded up to a power of two so the claim scan wraps
/// with a plain index mask. A slot is only ever written by its owner: the
/// accept loop claims it with one compare-exchange, the owning handler's
/// [`SlotGuard`] stores the free sentinel back. No further locking exists,
/// and no lock is held across a suspension point.
pub(crate) struct SlotTable {
    slots: Box<[AtomicI32]>,
    mask: usize,
    retry: Duration,
}

impl SlotTable {
    pub(crate) fn new(capacity: usize, retry: Duration) -> Self {
        let len = capacity.max(2).next_power_of_two();
        let slots = (0..len).map(|_| AtomicI32::new(FREE)).collect::<Vec<_>>();

        Self {
            slots: slots.into_boxed_slice(),
            mask: len - 1,
            retry,
        }
    }

    #[inline(always)]
    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    /// Claims the first free slot after `after`, wrapping with the index
    /// mask, and records `fd` in it.
    ///
    /// A full wraparound without a free slot is admission backpressure, not
    /// an error: the caller sleeps `retry` and rescans until some handler
    /// releases. This is the only place the server sheds load.
    pub(crate) async fn acquire(&self, after: usize, fd: RawFd) -> usize {
        loop {
            let mut index = after;
            for _ in 0..self.slots.len() {
                index = (index + 1) & self.mask;
                if self.slots[index]
                    .compare_exchange(FREE, fd, Ordering::AcqRel, Ordering::Relaxed)
                    .is_ok()
                {
                    return index;
                }
            }

            sleep(self.retry).await;
        }
    }

    #[inline(always)]
    pub(crate) fn release(&self, index: usize) {
        self.slots[index].store(FREE, Ordering::Release);
    }

    #[cfg(test)]
    pub(crate) fn in_flight(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.load(Ordering::Acquire) != FREE)
            .count()
    }
}

/// Ownership token for one claimed slot.
///
/// Moved into the handler task; dropping it releases the slot. Drop runs on
/// every exit path of the task, panic unwinding included, so a claimed slot
/// is released exactly once and can never leak.
pub(crate) struct SlotGuard {
    table: Arc<SlotTable>,
    index: usize,
}

impl SlotGuard {
    #[inline(always)]
    pub(crate) fn new(table: Arc<SlotTable>, index: usize) -> Self {
        Self { table, index }
    }
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.table.release(self.index);
    }
}
