use super::NodeId;

/// Which of two candidate distances to the same node wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relaxation {
    Shorter,
    Longer,
}

impl Relaxation {
    /// Whether `candidate` is strictly better than `current`.
    pub fn improves(self, candidate: f64, current: f64) -> bool {
        match self {
            Relaxation::Shorter => candidate < current,
            Relaxation::Longer => candidate > current,
        }
    }
}

/// Priority list of nodes kept sorted by distance, best entry first.
///
/// Each node appears at most once. [`DistanceQueue::add`] relaxes an existing
/// entry instead of adding a duplicate.
#[derive(Debug, Clone)]
pub struct DistanceQueue {
    relaxation: Relaxation,
    entries: Vec<(NodeId, f64)>,
}

impl DistanceQueue {
    pub fn new(relaxation: Relaxation) -> Self {
        Self {
            relaxation,
            entries: Vec::new(),
        }
    }

    pub fn relaxation(&self) -> Relaxation {
        self.relaxation
    }

    /// Insert `node` at `distance`, or move its entry if `distance` is
    /// strictly better. Returns whether the queue changed.
    pub fn add(&mut self, node: NodeId, distance: f64) -> bool {
        if let Some(pos) = self.entries.iter().position(|&(n, _)| n == node) {
            if !self.relaxation.improves(distance, self.entries[pos].1) {
                return false;
            }
            self.entries.remove(pos);
        }
        let relaxation = self.relaxation;
        // Ties keep insertion order.
        let at = self
            .entries
            .partition_point(|&(_, d)| !relaxation.improves(distance, d));
        self.entries.insert(at, (node, distance));
        true
    }

    /// Remove and return the best entry.
    pub fn pop(&mut self) -> Option<(NodeId, f64)> {
        if self.entries.is_empty() {
            None
        } else {
            Some(self.entries.remove(0))
        }
    }

    pub fn peek(&self) -> Option<(NodeId, f64)> {
        self.entries.first().copied()
    }

    pub fn remove(&mut self, node: NodeId) -> Option<f64> {
        let pos = self.entries.iter().position(|&(n, _)| n == node)?;
        Some(self.entries.remove(pos).1)
    }

    pub fn get(&self, node: NodeId) -> Option<f64> {
        self.entries
            .iter()
            .find(|&&(n, _)| n == node)
            .map(|&(_, d)| d)
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.get(node).is_some()
    }

    /// Entries from best to worst.
    pub fn iter(&self) -> impl Iterator<Item = &(NodeId, f64)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
