use super::BufferHandle;
use crate::error::Result;
use std::sync::Mutex;

/// A single growable scratch buffer per context (§5, §9). The dispatcher
/// may resize it before enqueue; concurrent operations on the same context
/// must serialize externally — this type does not attempt to arbitrate
/// that, it only tracks the backing allocation.
#[derive(Debug, Default)]
pub struct Workspace {
    capacity_bytes: Mutex<usize>,
    buffer: Mutex<Option<BufferHandle>>,
}

impl Workspace {
    pub fn new() -> Self {
        Workspace { capacity_bytes: Mutex::new(0), buffer: Mutex::new(None) }
    }

    pub fn capacity_bytes(&self) -> usize {
        *self.capacity_bytes.lock().unwrap()
    }

    /// Grows the scratch buffer to at least `bytes`, reallocating via
    /// `alloc` only when the current one is too small. Never shrinks: the
    /// buffer lives for the context's lifetime, as compiled programs do
    /// (§3 Lifecycle).
    pub fn ensure(&self, bytes: usize, alloc: impl FnOnce(usize) -> Result<BufferHandle>) -> Result<BufferHandle> {
        let mut cap = self.capacity_bytes.lock().unwrap();
        let mut slot = self.buffer.lock().unwrap();
        if slot.is_none() || *cap < bytes {
            *slot = Some(alloc(bytes)?);
            *cap = bytes;
        }
        Ok(slot.as_ref().unwrap().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{Backend, Buffer, Context, SimBackend};
    use std::sync::Arc;

    #[test]
    fn new_workspace_has_zero_capacity() {
        let ws = Workspace::new();
        assert_eq!(ws.capacity_bytes(), 0);
    }

    #[test]
    fn ensure_allocates_once_and_reuses_for_smaller_requests() {
        let ctx = SimBackend::new_queue(Backend::OpenClLike).0;
        let ws = Workspace::new();
        let mut allocations = 0;
        let first = ws
            .ensure(1024, |bytes| {
                allocations += 1;
                ctx.allocate(bytes)
            })
            .unwrap();
        let second = ws
            .ensure(512, |bytes| {
                allocations += 1;
                ctx.allocate(bytes)
            })
            .unwrap();
        assert_eq!(allocations, 1);
        assert_eq!(ws.capacity_bytes(), 1024);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn ensure_regrows_when_request_exceeds_capacity() {
        let ctx = SimBackend::new_queue(Backend::OpenClLike).0;
        let ws = Workspace::new();
        ws.ensure(256, |bytes| ctx.allocate(bytes)).unwrap();
        let grown = ws.ensure(4096, |bytes| ctx.allocate(bytes)).unwrap();
        assert_eq!(ws.capacity_bytes(), 4096);
        assert_eq!(grown.size_bytes(), 4096);
    }
}
