// src/graph/neighborhood.rs
// 邻域工具：可达性检查、两跳邻域大小、惰性邻域流

use std::collections::{HashSet, VecDeque};

use super::types::{Graph, NodeId};

/// 从 `start` 出发、BFS 深度不超过 `n` 的范围内（含自身）是否至少有 `n` 个节点
///
/// 用于拒绝孤立节点或过小的连通块作为种子。
pub fn has_min_reachable_nodes(graph: &Graph, start: NodeId, n: usize) -> bool {
    if n <= 1 {
        return true;
    }
    let mut seen = HashSet::from([start]);
    let mut queue = VecDeque::from([(start, 0usize)]);
    while let Some((u, depth)) = queue.pop_front() {
        if depth == n {
            continue;
        }
        for &v in graph.neighbors(u) {
            if seen.insert(v) {
                if seen.len() >= n {
                    return true;
                }
                queue.push_back((v, depth + 1));
            }
        }
    }
    false
}

/// 半径 2 的自我中心子图节点数（含自身）
pub fn two_hop_size(graph: &Graph, node: NodeId) -> usize {
    let mut seen = HashSet::from([node]);
    for &v in graph.neighbors(node) {
        seen.insert(v);
        for &w in graph.neighbors(v) {
            seen.insert(w);
        }
    }
    seen.len()
}

/// 惰性邻域流
///
/// 从种子出发逐个产出新发现的节点，直到已访问节点数达到 `max_nodes`。
/// 种子本身计入 `max_nodes` 但不会被产出，因此最多产出 `max_nodes - 1` 个节点。
///
/// 只能单次遍历：没有 reset，需要重新开始时为同一种子构造新的流。
#[derive(Debug)]
pub struct NeighborhoodStream<'g> {
    graph: &'g Graph,
    visited: HashSet<NodeId>,
    frontier: VecDeque<NodeId>,
    max_nodes: usize,
}

impl<'g> NeighborhoodStream<'g> {
    pub fn new(graph: &'g Graph, start: NodeId, max_nodes: usize) -> Self {
        Self {
            graph,
            visited: HashSet::from([start]),
            frontier: graph.neighbors(start).iter().copied().collect(),
            max_nodes,
        }
    }

    /// 已访问节点数（含种子）
    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }
}

impl Iterator for NeighborhoodStream<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        while self.visited.len() < self.max_nodes {
            let node = self.frontier.pop_front()?;
            if self.visited.insert(node) {
                let visited = &self.visited;
                self.frontier
                    .extend(self.graph.neighbors(node).iter().copied().filter(|v| !visited.contains(v)));
                return Some(node);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn star(leaves: usize) -> Graph {
        let edges: Vec<(NodeId, NodeId)> = (1..=leaves).map(|l| (0, l)).collect();
        Graph::undirected(leaves + 1, &edges)
    }

    #[test]
    fn test_reachability() {
        let g = Graph::undirected(5, &[(0, 1), (1, 2), (3, 4)]);
        assert!(has_min_reachable_nodes(&g, 0, 3));
        assert!(!has_min_reachable_nodes(&g, 3, 3));
        assert!(has_min_reachable_nodes(&g, 3, 1));
    }

    #[test]
    fn test_two_hop_size() {
        let g = star(4);
        assert_eq!(two_hop_size(&g, 1), 5);
        let path = Graph::undirected(5, &[(0, 1), (1, 2), (2, 3), (3, 4)]);
        assert_eq!(two_hop_size(&path, 0), 3);
    }

    #[test]
    fn test_stream_respects_cap() {
        let g = star(6);
        let produced: Vec<NodeId> = NeighborhoodStream::new(&g, 0, 4).collect();
        assert_eq!(produced, vec![1, 2, 3]);
    }

    #[test]
    fn test_stream_yields_each_node_once() {
        let g = Graph::undirected(4, &[(0, 1), (1, 2), (2, 0), (2, 3)]);
        let mut produced: Vec<NodeId> = NeighborhoodStream::new(&g, 0, 100).collect();
        produced.sort_unstable();
        assert_eq!(produced, vec![1, 2, 3]);
    }

    #[test]
    fn test_stream_is_exhausted_after_one_pass() {
        let g = star(2);
        let mut stream = NeighborhoodStream::new(&g, 0, 10);
        assert_eq!(stream.by_ref().count(), 2);
        assert_eq!(stream.next(), None);
        assert_eq!(stream.visited_count(), 3);
    }
}
