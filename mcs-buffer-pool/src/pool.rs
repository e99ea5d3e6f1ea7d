use std::sync::{Arc, Condvar, Mutex};
use std::time::Instant;

use mcs_types::{Offset, Size};

use crate::error::Error;
use crate::interruption::InterruptionContext;

struct Inner {
    free: Vec<Offset>,
    failed: Option<String>,
}

/// A fixed set of equal-sized slots carved out of a local segment.
/// Internally a stack of free offsets guarded by a mutex and condition
/// variable, matching `original_source/block_device/include/mcs/block_device/Buffer.hpp`'s
/// `_guard`/`_block_available_or_interrupted`/`_available` fields. The pool
/// itself is agnostic to what backs the offsets — a caller pairs it with a
/// materialized segment (§4.C) and indexes into it by slot offset.
pub struct BufferPool {
    slot_size: Size,
    inner: Mutex<Inner>,
    condvar: Condvar,
}

impl BufferPool {
    pub fn new(slot_count: usize, slot_size: Size) -> Arc<Self> {
        let free = (0..slot_count as u64)
            .map(|i| Offset::new(i * slot_size.as_u64()))
            .collect();
        Arc::new(BufferPool {
            slot_size,
            inner: Mutex::new(Inner { free, failed: None }),
            condvar: Condvar::new(),
        })
    }

    pub fn slot_size(&self) -> Size {
        self.slot_size
    }

    /// §4.G `acquire`. Blocks until a slot is free, `deadline` passes, the
    /// context is interrupted, or the pool has been marked failed.
    pub fn acquire(
        self: &Arc<Self>,
        ctx: &InterruptionContext,
        deadline: Instant,
    ) -> Result<BufferedBlock, Error> {
        let mut guard = self.inner.lock().unwrap();
        loop {
            if let Some(message) = &guard.failed {
                return Err(Error::PoolFailed(message.clone()));
            }
            if ctx.is_interrupted() {
                return Err(Error::Interrupted);
            }
            if let Some(offset) = guard.free.pop() {
                return Ok(BufferedBlock {
                    pool: Arc::clone(self),
                    offset,
                });
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(Error::Timeout);
            }
            let (g, timeout_result) = self
                .condvar
                .wait_timeout(guard, deadline - now)
                .expect("buffer pool mutex poisoned");
            guard = g;
            let _ = timeout_result;
        }
    }

    /// Sets `ctx`'s sticky interruption flag and wakes every waiter — not
    /// just one, because a single `notify_one` could wake a thread that is
    /// blocked on a *different* context and isn't the one being
    /// interrupted, leaving the actually-interrupted waiter asleep.
    pub fn interrupt(&self, ctx: &InterruptionContext) {
        let _guard = self.inner.lock().unwrap();
        ctx.set_interrupted();
        self.condvar.notify_all();
    }

    /// Marks the pool itself as failed: every blocked and future `acquire`
    /// fails with [`Error::PoolFailed`] until a new pool is built.
    pub fn error(&self, message: impl Into<String>) {
        let mut guard = self.inner.lock().unwrap();
        guard.failed = Some(message.into());
        drop(guard);
        self.condvar.notify_all();
    }

    fn release(&self, offset: Offset) {
        let mut guard = self.inner.lock().unwrap();
        guard.free.push(offset);
        drop(guard);
        // notify_all, not notify_one: a notify_one could wake a waiter that
        // has already timed out or been interrupted and is about to give up
        // its turn at the lock without taking the slot, stranding it.
        self.condvar.notify_all();
    }
}

/// A held slot. The offset is returned to the pool on drop, including on
/// an unwinding panic.
pub struct BufferedBlock {
    pool: Arc<BufferPool>,
    offset: Offset,
}

impl BufferedBlock {
    pub fn offset(&self) -> Offset {
        self.offset
    }

    pub fn slot_size(&self) -> Size {
        self.pool.slot_size()
    }
}

impl Drop for BufferedBlock {
    fn drop(&mut self) {
        self.pool.release(self.offset);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    fn far_deadline() -> Instant {
        Instant::now() + Duration::from_secs(60)
    }

    #[test]
    fn acquire_and_release_recycle_the_single_slot() {
        let pool = BufferPool::new(1, Size::new(16));
        let ctx = InterruptionContext::new();
        let block = pool.acquire(&ctx, far_deadline()).unwrap();
        drop(block);
        pool.acquire(&ctx, far_deadline()).unwrap();
    }

    #[test]
    fn acquire_times_out_when_no_slot_is_free() {
        let pool = BufferPool::new(1, Size::new(16));
        let ctx = InterruptionContext::new();
        let _held = pool.acquire(&ctx, far_deadline()).unwrap();
        let err = pool
            .acquire(&ctx, Instant::now() + Duration::from_millis(20))
            .unwrap_err();
        assert!(matches!(err, Error::Timeout));
    }

    /// Seed scenario (g).
    #[test]
    fn interrupt_is_sticky() {
        let pool = BufferPool::new(1, Size::new(16));
        let main_ctx = InterruptionContext::new();
        let held = pool.acquire(&main_ctx, far_deadline()).unwrap();

        let waiter_pool = Arc::clone(&pool);
        let waiter_ctx = InterruptionContext::new();
        let signal_ctx = waiter_ctx.clone();

        let handle = thread::spawn(move || {
            waiter_pool.acquire(&waiter_ctx, far_deadline())
        });

        thread::sleep(Duration::from_millis(50));
        pool.interrupt(&signal_ctx);

        let result = handle.join().unwrap();
        assert!(matches!(result, Err(Error::Interrupted)));

        let second = pool.acquire(&signal_ctx, far_deadline());
        assert!(matches!(second, Err(Error::Interrupted)));

        drop(held);
    }

    #[test]
    fn release_wakes_a_blocked_waiter() {
        let pool = BufferPool::new(1, Size::new(16));
        let ctx = InterruptionContext::new();
        let held = pool.acquire(&ctx, far_deadline()).unwrap();

        let waiter_pool = Arc::clone(&pool);
        let waiter_ctx = InterruptionContext::new();
        let handle = thread::spawn(move || waiter_pool.acquire(&waiter_ctx, far_deadline()));

        thread::sleep(Duration::from_millis(50));
        drop(held);

        let result = handle.join().unwrap();
        assert!(result.is_ok());
    }
}
