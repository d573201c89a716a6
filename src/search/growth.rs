// src/search/growth.rs
// 单条生长轨迹：节点列表 + 前沿，以及候选扩展的批量评分

use anyhow::{Context, Result};
use rustc_hash::FxHashSet;
use std::collections::BTreeSet;

use crate::graph::{Graph, NodeId, Pattern};
use crate::oracle::{Embedding, OracleClient};

/// 从种子出发逐节点生长的轨迹
///
/// 前沿按节点编号有序，保证同样的随机源下扩展顺序一致。
#[derive(Debug, Clone)]
pub struct Growth<'g> {
    graph: &'g Graph,
    graph_index: usize,
    nodes: Vec<NodeId>,
    visited: FxHashSet<NodeId>,
    frontier: BTreeSet<NodeId>,
    anchor: Option<NodeId>,
}

impl<'g> Growth<'g> {
    /// 以 `seed` 为起点；`node_anchored` 时种子即锚点
    pub fn new(graph: &'g Graph, graph_index: usize, seed: NodeId, node_anchored: bool) -> Self {
        let frontier = graph.neighbors(seed).iter().copied().filter(|&v| v != seed).collect();
        let mut visited = FxHashSet::default();
        visited.insert(seed);
        Self {
            graph,
            graph_index,
            nodes: vec![seed],
            visited,
            frontier,
            anchor: node_anchored.then_some(seed),
        }
    }

    /// 按生长顺序重放节点列表
    ///
    /// 节点越界、重复或不在当时的前沿上（即不连通）时返回 `None`。
    pub fn replay(graph: &'g Graph, graph_index: usize, nodes: &[NodeId], node_anchored: bool) -> Option<Self> {
        let (&seed, rest) = nodes.split_first()?;
        if !graph.contains(seed) {
            return None;
        }
        let mut growth = Self::new(graph, graph_index, seed, node_anchored);
        for &node in rest {
            if !growth.frontier.contains(&node) {
                return None;
            }
            growth.push(node);
        }
        Some(growth)
    }

    pub fn graph(&self) -> &'g Graph {
        self.graph
    }

    pub fn graph_index(&self) -> usize {
        self.graph_index
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    pub fn seed(&self) -> NodeId {
        self.nodes[0]
    }

    pub fn frontier(&self) -> &BTreeSet<NodeId> {
        &self.frontier
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.visited.contains(&node)
    }

    /// 前沿为空或已达上限时不能再生长
    pub fn is_exhausted(&self, max_size: usize) -> bool {
        self.frontier.is_empty() || self.nodes.len() >= max_size
    }

    /// 加入节点；前沿 = (前沿 ∪ 邻居(node)) − 已访问 − {node}
    pub fn push(&mut self, node: NodeId) {
        self.visited.insert(node);
        self.nodes.push(node);
        self.frontier.remove(&node);
        let visited = &self.visited;
        self.frontier
            .extend(self.graph.neighbors(node).iter().copied().filter(|v| !visited.contains(v)));
    }

    /// 当前节点集的诱导子图
    pub fn pattern(&self) -> Pattern {
        Pattern::induce(self.graph, self.graph_index, &self.nodes, self.anchor)
    }

    /// 当前节点集加上 `node` 的诱导子图
    pub fn extended(&self, node: NodeId) -> Pattern {
        let mut nodes = self.nodes.clone();
        nodes.push(node);
        Pattern::induce(self.graph, self.graph_index, &nodes, self.anchor)
    }
}

/// 一个已评分的扩展
#[derive(Debug, Clone)]
pub struct ScoredExtension {
    pub node: NodeId,
    pub pattern: Pattern,
    pub embedding: Embedding,
}

/// 批量嵌入 `nodes` 对应的扩展
///
/// 锚定模式下每个候选的锚点都是种子。
pub fn embed_extensions(
    oracle: &OracleClient,
    growth: &Growth<'_>,
    nodes: &[NodeId],
) -> Result<Vec<ScoredExtension>> {
    let patterns: Vec<Pattern> = nodes.iter().map(|&v| growth.extended(v)).collect();
    let anchors: Option<Vec<NodeId>> = growth.anchor.map(|a| vec![a; patterns.len()]);
    let embeddings = oracle
        .embed(&patterns, anchors.as_deref())
        .with_context(|| format!("嵌入图 {} 上的 {} 个扩展失败", growth.graph_index, patterns.len()))?;
    Ok(nodes
        .iter()
        .zip(patterns)
        .zip(embeddings)
        .map(|((&node, pattern), embedding)| ScoredExtension { node, pattern, embedding })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frontier_update() {
        let g = Graph::undirected(5, &[(0, 1), (1, 2), (2, 3), (3, 4), (4, 0)]);
        let mut growth = Growth::new(&g, 0, 0, true);
        assert_eq!(growth.frontier().iter().copied().collect::<Vec<_>>(), vec![1, 4]);
        growth.push(1);
        assert_eq!(growth.frontier().iter().copied().collect::<Vec<_>>(), vec![2, 4]);
        growth.push(2);
        assert_eq!(growth.nodes(), &[0, 1, 2]);
        assert!(!growth.is_exhausted(4));
        assert!(growth.is_exhausted(3));

        let p = growth.pattern();
        assert_eq!(p.anchor, Some(0));
        assert!(p.is_weakly_connected());
    }

    #[test]
    fn test_replay_rejects_malformed_orders() {
        let g = Graph::undirected(4, &[(0, 1), (1, 2), (2, 3)]);
        assert_eq!(Growth::replay(&g, 0, &[1, 2, 3], false).unwrap().len(), 3);
        assert!(Growth::replay(&g, 0, &[], false).is_none());
        assert!(Growth::replay(&g, 0, &[0, 2], false).is_none());
        assert!(Growth::replay(&g, 0, &[0, 1, 1], false).is_none());
        assert!(Growth::replay(&g, 0, &[9], false).is_none());
    }

    #[test]
    fn test_self_loop_not_in_frontier() {
        let g = Graph::undirected(2, &[(0, 0), (0, 1)]);
        let growth = Growth::new(&g, 0, 0, false);
        assert_eq!(growth.frontier().len(), 1);
        assert_eq!(growth.extended(1).anchor, None);
    }
}
