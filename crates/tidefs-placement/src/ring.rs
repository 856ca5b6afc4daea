//! Replica ring of a block
//!
//! Positions `0..N` of the ring map onto storage node indices, either
//! directly or through a permutation. The replica set is always the run of
//! positions `end .. end + len` (mod N): replicas are added after the newest
//! position and evicted from `end`, the oldest one.

use std::sync::Arc;

#[derive(Clone, Debug, PartialEq, Eq)]
enum Layout {
    /// Position `p` is node `p`
    Sequential,
    /// Position `p` is node `perm[p]`
    Permuted(Arc<[usize]>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReplicaRing {
    end: usize,
    len: usize,
    nodes: usize,
    layout: Layout,
}

impl ReplicaRing {
    /// Ring over no nodes at all
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            end: 0,
            len: 0,
            nodes: 0,
            layout: Layout::Sequential,
        }
    }

    /// `len` replicas on nodes `start, start + 1, ...` (mod `nodes`)
    #[must_use]
    pub fn sequential(nodes: usize, start: usize, len: usize) -> Self {
        if nodes == 0 {
            return Self::empty();
        }
        Self {
            end: start % nodes,
            len: len.min(nodes),
            nodes,
            layout: Layout::Sequential,
        }
    }

    /// `len` replicas on `perm[start], perm[start + 1], ...`
    #[must_use]
    pub fn permuted(perm: Arc<[usize]>, start: usize, len: usize) -> Self {
        let nodes = perm.len();
        if nodes == 0 {
            return Self::empty();
        }
        Self {
            end: start % nodes,
            len: len.min(nodes),
            nodes,
            layout: Layout::Permuted(perm),
        }
    }

    /// Number of replicas
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// True when every node holds a replica
    #[must_use]
    pub const fn is_full(&self) -> bool {
        self.len == self.nodes
    }

    fn node_at(&self, position: usize) -> usize {
        let position = position % self.nodes;
        match &self.layout {
            Layout::Sequential => position,
            Layout::Permuted(perm) => perm[position],
        }
    }

    /// The `i`-th replica, oldest first
    #[must_use]
    pub fn member(&self, i: usize) -> Option<usize> {
        (i < self.len).then(|| self.node_at(self.end + i))
    }

    /// Replica node indices, oldest first
    pub fn members(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.len).map(|i| self.node_at(self.end + i))
    }

    /// Node that the next replica would go to
    #[must_use]
    pub fn next_to_add(&self) -> Option<usize> {
        (self.len < self.nodes).then(|| self.node_at(self.end + self.len))
    }

    /// Node holding the oldest replica, the next one to evict
    #[must_use]
    pub fn oldest(&self) -> Option<usize> {
        (self.len > 0).then(|| self.node_at(self.end))
    }

    /// Extend the ring by one; returns the node added
    pub fn push(&mut self) -> Option<usize> {
        let node = self.next_to_add()?;
        self.len += 1;
        Some(node)
    }

    /// Evict the oldest replica; returns the node removed
    pub fn pop_oldest(&mut self) -> Option<usize> {
        let node = self.oldest()?;
        self.end = (self.end + 1) % self.nodes;
        self.len -= 1;
        Some(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_ring() {
        let mut ring = ReplicaRing::sequential(4, 3, 2);
        assert_eq!(ring.members().collect::<Vec<_>>(), vec![3, 0]);
        assert_eq!(ring.next_to_add(), Some(1));
        assert_eq!(ring.oldest(), Some(3));

        assert_eq!(ring.push(), Some(1));
        assert_eq!(ring.push(), Some(2));
        assert!(ring.is_full());
        assert_eq!(ring.push(), None);

        assert_eq!(ring.pop_oldest(), Some(3));
        assert_eq!(ring.members().collect::<Vec<_>>(), vec![0, 1, 2]);
        // the evicted node is the next one to come back
        assert_eq!(ring.next_to_add(), Some(3));
    }

    #[test]
    fn test_permuted_ring() {
        let perm: Arc<[usize]> = Arc::from(vec![2, 0, 3, 1]);
        let mut ring = ReplicaRing::permuted(perm, 1, 2);
        assert_eq!(ring.members().collect::<Vec<_>>(), vec![0, 3]);
        assert_eq!(ring.member(1), Some(3));
        assert_eq!(ring.member(2), None);
        assert_eq!(ring.push(), Some(1));
        assert_eq!(ring.pop_oldest(), Some(0));
        assert_eq!(ring.members().collect::<Vec<_>>(), vec![3, 1]);
    }

    #[test]
    fn test_empty_ring() {
        let mut ring = ReplicaRing::sequential(0, 5, 3);
        assert!(ring.is_empty());
        assert_eq!(ring.members().count(), 0);
        assert_eq!(ring.push(), None);
        assert_eq!(ring.pop_oldest(), None);

        let mut ring = ReplicaRing::sequential(3, 1, 0);
        assert_eq!(ring.oldest(), None);
        assert_eq!(ring.push(), Some(1));
    }

    #[test]
    fn test_len_is_clamped() {
        let ring = ReplicaRing::sequential(3, 0, 10);
        assert_eq!(ring.len(), 3);
        assert_eq!(ring.members().collect::<Vec<_>>(), vec![0, 1, 2]);
    }
}
