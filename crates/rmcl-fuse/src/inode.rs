use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

/// The FUSE root inode number, fixed by convention.
pub const ROOT_INODE: u64 = 1;

/// A bidirectional inode↔id bijection.
///
/// Holds no cached attributes: `getattr` synthesizes them live from the
/// current `Item` rather than from a stored snapshot. Once an inode is
/// assigned to an id it is never reassigned, even if the id later
/// disappears from the item graph.
pub struct InodeTable {
    by_inode: DashMap<u64, String>,
    by_id: DashMap<String, u64>,
    next_inode: AtomicU64,
}

impl InodeTable {
    /// Builds a table with root and the mode file preassigned fixed inodes.
    pub fn new(root_id: &str, mode_id: &str) -> Self {
        let table = InodeTable {
            by_inode: DashMap::new(),
            by_id: DashMap::new(),
            next_inode: AtomicU64::new(ROOT_INODE + 1),
        };
        table.by_inode.insert(ROOT_INODE, root_id.to_string());
        table.by_id.insert(root_id.to_string(), ROOT_INODE);

        let mode_inode = table.next_inode.fetch_add(1, Ordering::SeqCst);
        table.by_inode.insert(mode_inode, mode_id.to_string());
        table.by_id.insert(mode_id.to_string(), mode_inode);
        table
    }

    /// Returns the inode for `id`, allocating a fresh one on first sight.
    pub fn inode_for(&self, id: &str) -> u64 {
        if let Some(existing) = self.by_id.get(id) {
            return *existing.value();
        }
        let inode = self.next_inode.fetch_add(1, Ordering::SeqCst);
        self.by_id.insert(id.to_string(), inode);
        self.by_inode.insert(inode, id.to_string());
        inode
    }

    /// Looks up the id behind an already-allocated inode.
    pub fn id_for(&self, inode: u64) -> Option<String> {
        self.by_inode.get(&inode).map(|e| e.value().clone())
    }

    pub fn len(&self) -> usize {
        self.by_inode.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_inode.is_empty()
    }
}
