use super::binder::Binder;
use super::object::SymbolicObject;
use std::collections::HashMap;

/// The result of the single annotation DFS (§3, §4.1): one `SymbolicObject`
/// per node index, plus the binder that assigned buffer ids and the
/// DFS-annotation order kernel arguments must be bound in (§4.3 "Common
/// enqueue argument order").
pub struct SymbolicTable {
    objects: HashMap<usize, SymbolicObject>,
    pub(crate) binder: Binder,
    /// Node indices of every distinct bound (read) buffer leaf, in
    /// first-encountered DFS order — the order `enqueue` must bind them in.
    pub bound_buffer_nodes: Vec<usize>,
    /// Node indices of distinct assignee (written) buffer leaves, same
    /// ordering discipline.
    pub assignee_buffer_nodes: Vec<usize>,
    /// Node indices of host-scalar leaves, in DFS order.
    pub host_scalar_nodes: Vec<usize>,
}

impl SymbolicTable {
    pub(crate) fn new(binder: Binder) -> Self {
        SymbolicTable {
            objects: HashMap::new(),
            binder,
            bound_buffer_nodes: Vec::new(),
            assignee_buffer_nodes: Vec::new(),
            host_scalar_nodes: Vec::new(),
        }
    }

    pub fn get(&self, idx: usize) -> &SymbolicObject {
        self.objects.get(&idx).unwrap_or_else(|| panic!("no symbolic object for node {idx}"))
    }

    pub(crate) fn insert(&mut self, obj: SymbolicObject) {
        self.objects.insert(obj.node_idx, obj);
    }

    pub fn contains(&self, idx: usize) -> bool {
        self.objects.contains_key(&idx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contains_reflects_inserted_objects_only() {
        let mut table = SymbolicTable::new(Binder::new());
        assert!(!table.contains(0));
        table.insert(SymbolicObject {
            node_idx: 0,
            kind: super::super::object::SymbolicKind::HostScalar {
                name: "s0".into(),
                value: isaac_types::Scalar::new(isaac_types::ScalarValue::Float32(1.0)),
            },
        });
        assert!(table.contains(0));
        assert!(!table.contains(1));
    }

    #[test]
    fn get_panics_for_a_missing_node() {
        let table = SymbolicTable::new(Binder::new());
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| table.get(42)));
        assert!(result.is_err());
    }

    #[test]
    fn bound_and_assignee_node_lists_start_empty() {
        let table = SymbolicTable::new(Binder::new());
        assert!(table.bound_buffer_nodes.is_empty());
        assert!(table.assignee_buffer_nodes.is_empty());
        assert!(table.host_scalar_nodes.is_empty());
    }
}
