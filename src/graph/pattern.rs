// src/graph/pattern.rs
// 子图模式：从源图按节点集诱导出的子图

use serde::{Deserialize, Serialize};

use super::types::{Graph, NodeId};

/// 模式排序键：(源图下标, 排序后的节点集, 锚点, 生长顺序)
pub type PatternKey = (usize, Vec<NodeId>, Option<NodeId>, Vec<NodeId>);

/// 诱导子图模式
///
/// `nodes` 保持生长顺序，`nodes[0]` 为种子节点。
/// `edges` 使用局部下标（指向 `nodes`），自环在诱导时被去除。
/// 锚定模式下 `anchor` 为种子节点在源图中的编号。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    /// 源图在数据集中的下标
    pub graph_index: usize,
    /// 源图节点编号（生长顺序）
    pub nodes: Vec<NodeId>,
    /// 节点标签，与 `nodes` 一一对应
    pub labels: Vec<u32>,
    /// 局部下标表示的边；无向图中总满足 i < j
    pub edges: Vec<(usize, usize)>,
    pub directed: bool,
    /// 锚点（源图节点编号）
    pub anchor: Option<NodeId>,
}

impl Pattern {
    /// 在 `graph` 上按 `nodes` 诱导子图
    ///
    /// # 参数
    ///
    /// * `graph` - 源图
    /// * `graph_index` - 源图下标
    /// * `nodes` - 节点列表（不得重复）
    /// * `anchor` - 锚点，必须属于 `nodes`
    pub fn induce(graph: &Graph, graph_index: usize, nodes: &[NodeId], anchor: Option<NodeId>) -> Self {
        let mut edges = Vec::new();
        for (i, &u) in nodes.iter().enumerate() {
            for &v in graph.neighbors(u) {
                if v == u {
                    continue;
                }
                if let Some(j) = nodes.iter().position(|&w| w == v) {
                    if graph.is_directed() || i < j {
                        edges.push((i, j));
                    }
                }
            }
        }
        edges.sort_unstable();

        Self {
            graph_index,
            nodes: nodes.to_vec(),
            labels: nodes.iter().map(|&v| graph.label(v)).collect(),
            edges,
            directed: graph.is_directed(),
            anchor,
        }
    }

    /// 节点数
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    /// 种子节点（生长起点）
    pub fn seed(&self) -> Option<NodeId> {
        self.nodes.first().copied()
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.nodes.contains(&node)
    }

    /// 锚点的局部下标
    pub fn anchor_index(&self) -> Option<usize> {
        let anchor = self.anchor?;
        self.nodes.iter().position(|&v| v == anchor)
    }

    /// 每个节点的锚点标记
    pub fn anchor_flags(&self) -> Vec<bool> {
        let idx = self.anchor_index();
        (0..self.len()).map(|i| Some(i) == idx).collect()
    }

    /// 局部邻接表 (出邻居, 入邻居)；无向图两者相同
    pub fn local_adjacency(&self) -> (Vec<Vec<usize>>, Vec<Vec<usize>>) {
        let n = self.len();
        let mut out = vec![Vec::new(); n];
        let mut inn = vec![Vec::new(); n];
        for &(i, j) in &self.edges {
            out[i].push(j);
            inn[j].push(i);
            if !self.directed {
                out[j].push(i);
                inn[i].push(j);
            }
        }
        (out, inn)
    }

    /// 每个节点的度（有向图为入度 + 出度）
    pub fn degrees(&self) -> Vec<usize> {
        let mut deg = vec![0; self.len()];
        for &(i, j) in &self.edges {
            deg[i] += 1;
            deg[j] += 1;
        }
        deg
    }

    /// 弱连通检查
    pub fn is_weakly_connected(&self) -> bool {
        if self.is_empty() {
            return false;
        }
        let (out, inn) = self.local_adjacency();
        let mut seen = vec![false; self.len()];
        let mut stack = vec![0];
        seen[0] = true;
        while let Some(u) = stack.pop() {
            for &v in out[u].iter().chain(inn[u].iter()) {
                if !seen[v] {
                    seen[v] = true;
                    stack.push(v);
                }
            }
        }
        seen.into_iter().all(|s| s)
    }

    /// 确定性的代表元排序键：(源图下标, 排序后的节点集, 锚点, 生长顺序)
    ///
    /// 同一节点集从不同种子长出的模式键不同，比较结果与合并顺序无关。
    pub fn key(&self) -> PatternKey {
        let mut sorted = self.nodes.clone();
        sorted.sort_unstable();
        (self.graph_index, sorted, self.anchor, self.nodes.clone())
    }
}
