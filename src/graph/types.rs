// src/graph/types.rs
// 数据集图结构：带标签、可选有向的邻接表图

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::ops::Index;
use std::path::Path;

/// 图内节点编号 (稠密索引 0..n)
pub type NodeId = usize;

// ==============================================================================
// --- 输入格式 ---
// ==============================================================================

/// 单个图的 JSON 描述
///
/// `labels` 可省略，省略时所有节点标签为 0。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphSpec {
    #[serde(default)]
    pub directed: bool,
    pub num_nodes: usize,
    #[serde(default)]
    pub labels: Vec<u32>,
    pub edges: Vec<(NodeId, NodeId)>,
}

// ==============================================================================
// --- 图 ---
// ==============================================================================

/// 只读的带标签图
///
/// 无向图中 `successors` 是对称的邻接表；有向图额外维护 `predecessors`。
/// 搜索期间图不可变。
#[derive(Debug, Clone)]
pub struct Graph {
    directed: bool,
    labels: Vec<u32>,
    successors: Vec<Vec<NodeId>>,
    predecessors: Vec<Vec<NodeId>>,
    num_edges: usize,
}

impl Graph {
    /// 由边列表构造图，重复边会被合并
    ///
    /// # 参数
    ///
    /// * `num_nodes` - 节点数
    /// * `edges` - 边列表，端点必须小于 `num_nodes`
    /// * `directed` - 是否为有向图
    pub fn from_edges(num_nodes: usize, edges: &[(NodeId, NodeId)], directed: bool) -> Self {
        let mut successors = vec![Vec::new(); num_nodes];
        let mut predecessors = if directed { vec![Vec::new(); num_nodes] } else { Vec::new() };

        for &(u, v) in edges {
            successors[u].push(v);
            if directed {
                predecessors[v].push(u);
            } else if u != v {
                successors[v].push(u);
            }
        }
        for list in successors.iter_mut().chain(predecessors.iter_mut()) {
            list.sort_unstable();
            list.dedup();
        }

        let num_edges = if directed {
            successors.iter().map(Vec::len).sum()
        } else {
            // 每条无向边在两端各出现一次，自环只出现一次
            let mut total = 0;
            for (u, list) in successors.iter().enumerate() {
                total += list.iter().filter(|&&v| v >= u).count();
            }
            total
        };

        Self {
            directed,
            labels: vec![0; num_nodes],
            successors,
            predecessors,
            num_edges,
        }
    }

    /// 无向图快捷构造
    pub fn undirected(num_nodes: usize, edges: &[(NodeId, NodeId)]) -> Self {
        Self::from_edges(num_nodes, edges, false)
    }

    /// 有向图快捷构造
    pub fn directed(num_nodes: usize, edges: &[(NodeId, NodeId)]) -> Self {
        Self::from_edges(num_nodes, edges, true)
    }

    /// 校验并由 JSON 描述构造
    pub fn from_spec(spec: &GraphSpec) -> Result<Self> {
        if let Some(&(u, v)) = spec.edges.iter().find(|(u, v)| *u >= spec.num_nodes || *v >= spec.num_nodes) {
            bail!("边 ({}, {}) 超出节点范围 0..{}", u, v, spec.num_nodes);
        }
        let mut graph = Self::from_edges(spec.num_nodes, &spec.edges, spec.directed);
        if !spec.labels.is_empty() {
            graph = graph.with_labels(spec.labels.clone())?;
        }
        Ok(graph)
    }

    /// 设置节点标签
    pub fn with_labels(mut self, labels: Vec<u32>) -> Result<Self> {
        if labels.len() != self.num_nodes() {
            bail!("标签数量 {} 与节点数 {} 不一致", labels.len(), self.num_nodes());
        }
        self.labels = labels;
        Ok(self)
    }

    pub fn num_nodes(&self) -> usize {
        self.successors.len()
    }

    pub fn num_edges(&self) -> usize {
        self.num_edges
    }

    pub fn is_directed(&self) -> bool {
        self.directed
    }

    pub fn contains(&self, node: NodeId) -> bool {
        node < self.num_nodes()
    }

    pub fn label(&self, node: NodeId) -> u32 {
        self.labels[node]
    }

    /// 生长方向上的邻居（有向图为后继）
    #[inline]
    pub fn neighbors(&self, node: NodeId) -> &[NodeId] {
        &self.successors[node]
    }

    /// 前驱节点；无向图与 `neighbors` 相同
    #[inline]
    pub fn predecessors(&self, node: NodeId) -> &[NodeId] {
        if self.directed { &self.predecessors[node] } else { &self.successors[node] }
    }

    /// 是否存在边 u -> v（无向图不区分方向）
    #[inline]
    pub fn has_edge(&self, u: NodeId, v: NodeId) -> bool {
        self.successors[u].binary_search(&v).is_ok()
    }
}

// ==============================================================================
// --- 数据集 ---
// ==============================================================================

/// 有序、可索引的图集合
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    graphs: Vec<Graph>,
}

impl Dataset {
    pub fn new(graphs: Vec<Graph>) -> Self {
        Self { graphs }
    }

    /// 由 JSON 描述列表构造
    pub fn from_specs(specs: &[GraphSpec]) -> Result<Self> {
        let graphs = specs
            .iter()
            .enumerate()
            .map(|(i, spec)| Graph::from_spec(spec).with_context(|| format!("第 {} 个图无效", i)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { graphs })
    }

    /// 从 JSON 文件加载（内容为 `GraphSpec` 数组）
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("无法读取数据集文件 {}", path.display()))?;
        let specs: Vec<GraphSpec> = serde_json::from_str(&raw)
            .with_context(|| format!("数据集文件格式错误 {}", path.display()))?;
        Self::from_specs(&specs)
    }

    pub fn len(&self) -> usize {
        self.graphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.graphs.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&Graph> {
        self.graphs.get(idx)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Graph> {
        self.graphs.iter()
    }

    /// 所有图的节点总数
    pub fn total_nodes(&self) -> usize {
        self.graphs.iter().map(Graph::num_nodes).sum()
    }
}

impl Index<usize> for Dataset {
    type Output = Graph;

    fn index(&self, idx: usize) -> &Self::Output {
        &self.graphs[idx]
    }
}
