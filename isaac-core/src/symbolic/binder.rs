use crate::driver::BufferHandle;
use std::collections::HashMap;
use std::sync::Arc;

/// Which kernel-argument slot family a buffer reference belongs to. A
/// buffer used as both input and output of the same kernel gets two
/// distinct ids — one per role (§3 Binder).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BufferRole {
    Assignee,
    Bound,
}

/// Assigns each distinct buffer handle a stable integer id, separately per
/// role, so repeated reads of the same buffer share one kernel argument
/// while a read+write buffer gets two. Owned by the annotation pass; one
/// `Binder` per tree (§3).
#[derive(Default)]
pub struct Binder {
    next: HashMap<BufferRole, u64>,
    ids: HashMap<(usize, BufferRole), u64>,
}

impl Binder {
    pub fn new() -> Self {
        Binder::default()
    }

    pub fn bind(&mut self, buffer: &BufferHandle, role: BufferRole) -> u64 {
        let key = Arc::as_ptr(buffer) as *const u8 as usize;
        let next = &mut self.next;
        *self
            .ids
            .entry((key, role))
            .or_insert_with(|| {
                let counter = next.entry(role).or_insert(0);
                let id = *counter;
                *counter += 1;
                id
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{Backend, Context, SimBackend};

    fn ctx() -> Arc<dyn Context> {
        SimBackend::new_queue(Backend::OpenClLike).0
    }

    #[test]
    fn repeated_binds_of_the_same_buffer_and_role_return_the_same_id() {
        let ctx = ctx();
        let buf = ctx.allocate(64).unwrap();
        let mut binder = Binder::new();
        let first = binder.bind(&buf, BufferRole::Bound);
        let second = binder.bind(&buf, BufferRole::Bound);
        assert_eq!(first, second);
    }

    #[test]
    fn distinct_buffers_get_distinct_ids_within_a_role() {
        let ctx = ctx();
        let a = ctx.allocate(64).unwrap();
        let b = ctx.allocate(64).unwrap();
        let mut binder = Binder::new();
        let id_a = binder.bind(&a, BufferRole::Bound);
        let id_b = binder.bind(&b, BufferRole::Bound);
        assert_ne!(id_a, id_b);
    }

    #[test]
    fn same_buffer_in_different_roles_gets_independent_ids() {
        let ctx = ctx();
        let buf = ctx.allocate(64).unwrap();
        let mut binder = Binder::new();
        let assignee_id = binder.bind(&buf, BufferRole::Assignee);
        let bound_id = binder.bind(&buf, BufferRole::Bound);
        assert_eq!(assignee_id, 0);
        assert_eq!(bound_id, 0);
    }
}
