use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A sticky interruption flag shared between the thread that may call
/// [`crate::BufferPool::interrupt`] and the thread blocked in
/// [`crate::BufferPool::acquire`]. Once interrupted, every subsequent
/// `acquire` call made with the same context fails immediately — the
/// context never un-interrupts.
#[derive(Clone, Debug, Default)]
pub struct InterruptionContext(Arc<AtomicBool>);

impl InterruptionContext {
    pub fn new() -> Self {
        InterruptionContext(Arc::new(AtomicBool::new(false)))
    }

    pub fn is_interrupted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub(crate) fn set_interrupted(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}
