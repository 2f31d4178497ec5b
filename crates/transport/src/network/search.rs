use std::collections::{HashMap, HashSet, VecDeque};

use pathfinding::prelude::dijkstra;

use super::{DistanceQueue, Network, NodeId, PipeId, Relaxation};
use crate::error::TransportError;

/// Traversal direction over the pipe topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Pipe start to end.
    Downstream,
    /// Pipe end to start.
    Upstream,
}

/// A node reached by a search with its cumulative pipe length.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeDistance {
    pub node: NodeId,
    pub distance: f64,
}

/// Shortest pipe route between two manholes.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub nodes: Vec<NodeId>,
    pub pipes: Vec<PipeId>,
    pub length: f64,
}

/// Lengths are compared in whole millimetres by the route search.
const ROUTE_COST_SCALE: f64 = 1000.0;

impl Network {
    /// Edges leaving `node` in `direction`: `(pipe, next node, length)`.
    /// Horizontal pipes are walked in both directions.
    pub fn edges(
        &self,
        node: NodeId,
        direction: Direction,
    ) -> impl Iterator<Item = (PipeId, NodeId, f64)> + '_ {
        let (forward, backward) = match direction {
            Direction::Downstream => (&self.outgoing, &self.incoming),
            Direction::Upstream => (&self.incoming, &self.outgoing),
        };
        let along = forward
            .get(node.0)
            .into_iter()
            .flatten()
            .map(|&id| &self.pipes[id.0]);
        let against = backward
            .get(node.0)
            .into_iter()
            .flatten()
            .map(|&id| &self.pipes[id.0])
            .filter(|p| p.is_horizontal());
        along
            .chain(against)
            .map(move |p| (p.id, p.other_end(node), p.length))
    }

    /// Dijkstra from `start`. Every reachable node is reported once, in
    /// settling order, with its shortest cumulative length.
    pub fn shortest_distances(
        &self,
        start: NodeId,
        direction: Direction,
    ) -> Result<Vec<NodeDistance>, TransportError> {
        self.check_node(start)?;
        let mut queue = DistanceQueue::new(Relaxation::Shorter);
        let mut seen = HashSet::new();
        let mut result = Vec::new();
        queue.add(start, 0.0);

        while let Some((node, distance)) = queue.pop() {
            if !seen.insert(node) {
                continue;
            }
            result.push(NodeDistance { node, distance });
            for (_, next, length) in self.edges(node, direction) {
                if !seen.contains(&next) {
                    queue.add(next, distance + length);
                }
            }
        }
        Ok(result)
    }

    /// Longest downstream distance from `start` to every reachable node.
    ///
    /// A node is expanded only once all of its reachable predecessors have
    /// been expanded, so its distance is final when reported. Cycles
    /// (including every horizontal pipe) leave no node ready; the pending
    /// node with the greatest tentative distance is then expanded anyway.
    pub fn longest_distances(&self, start: NodeId) -> Result<Vec<NodeDistance>, TransportError> {
        self.check_node(start)?;
        let reachable: HashSet<NodeId> = self
            .shortest_distances(start, Direction::Downstream)?
            .into_iter()
            .map(|d| d.node)
            .collect();

        let mut pending_in: HashMap<NodeId, usize> = HashMap::new();
        for &node in &reachable {
            for (_, next, _) in self.edges(node, Direction::Downstream) {
                if next != start {
                    *pending_in.entry(next).or_default() += 1;
                }
            }
        }

        let mut queue = DistanceQueue::new(Relaxation::Longer);
        let mut seen = HashSet::new();
        let mut result = Vec::new();
        queue.add(start, 0.0);

        while !queue.is_empty() {
            let ready = queue
                .iter()
                .find(|(n, _)| pending_in.get(n).copied().unwrap_or(0) == 0)
                .map(|&(n, _)| n);
            let node = match ready {
                Some(n) => n,
                None => match queue.peek() {
                    Some((n, _)) => n,
                    None => break,
                },
            };
            let Some(distance) = queue.remove(node) else {
                break;
            };
            seen.insert(node);
            result.push(NodeDistance { node, distance });

            for (_, next, length) in self.edges(node, Direction::Downstream) {
                if seen.contains(&next) {
                    continue;
                }
                if let Some(count) = pending_in.get_mut(&next) {
                    *count = count.saturating_sub(1);
                }
                queue.add(next, distance + length);
            }
        }
        Ok(result)
    }

    /// Every pipe reachable from `start` following pipe direction.
    pub fn downstream_pipes(&self, start: NodeId) -> Result<Vec<PipeId>, TransportError> {
        self.reachable_pipes(start, Direction::Downstream)
    }

    /// Every pipe reachable from `start` against pipe direction.
    pub fn upstream_pipes(&self, start: NodeId) -> Result<Vec<PipeId>, TransportError> {
        self.reachable_pipes(start, Direction::Upstream)
    }

    fn reachable_pipes(
        &self,
        start: NodeId,
        direction: Direction,
    ) -> Result<Vec<PipeId>, TransportError> {
        self.check_node(start)?;
        let mut seen_nodes = HashSet::from([start]);
        let mut seen_pipes = HashSet::new();
        let mut pipes = Vec::new();
        let mut frontier = VecDeque::from([start]);

        while let Some(node) = frontier.pop_front() {
            for (pipe, next, _) in self.edges(node, direction) {
                if seen_pipes.insert(pipe) {
                    pipes.push(pipe);
                }
                if seen_nodes.insert(next) {
                    frontier.push_back(next);
                }
            }
        }
        Ok(pipes)
    }

    /// Shortest downstream route from `from` to `to`, or `None` when `to` is
    /// not reachable.
    pub fn route(&self, from: NodeId, to: NodeId) -> Result<Option<Route>, TransportError> {
        self.check_node(from)?;
        self.check_node(to)?;

        let result = dijkstra(
            &from,
            |&node| {
                self.edges(node, Direction::Downstream)
                    .map(|(_, next, length)| (next, (length * ROUTE_COST_SCALE).round() as u64))
                    .collect::<Vec<_>>()
            },
            |&node| node == to,
        );
        let Some((nodes, _cost)) = result else {
            return Ok(None);
        };

        let mut pipes = Vec::with_capacity(nodes.len().saturating_sub(1));
        let mut length = 0.0;
        for pair in nodes.windows(2) {
            let (pipe, _, len) = self
                .edges(pair[0], Direction::Downstream)
                .filter(|&(_, next, _)| next == pair[1])
                .min_by(|a, b| a.2.total_cmp(&b.2))
                .ok_or(TransportError::UnknownNode(pair[1].0))?;
            pipes.push(pipe);
            length += len;
        }
        Ok(Some(Route {
            nodes,
            pipes,
            length,
        }))
    }
}
