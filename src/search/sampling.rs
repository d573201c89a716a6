// src/search/sampling.rs
// 种子采样：按节点数加权选图、可达性拒绝采样、两跳邻域启发式

use anyhow::{Context, Result};
use rand::Rng;
use rand::distributions::{Distribution, WeightedIndex};

use crate::graph::{Dataset, NodeId, has_min_reachable_nodes, two_hop_size};

/// 启发式种子选择的采样次数上限
pub const LOOKAHEAD_SAMPLES: usize = 10;

/// 按节点数加权的图采样器
#[derive(Debug, Clone)]
pub struct GraphSampler {
    dist: WeightedIndex<usize>,
}

impl GraphSampler {
    pub fn new(dataset: &Dataset) -> Result<Self> {
        let weights: Vec<usize> = dataset.iter().map(|g| g.num_nodes()).collect();
        let dist = WeightedIndex::new(&weights).context("数据集中没有可采样的节点")?;
        Ok(Self { dist })
    }

    /// 采样一个图下标（空图权重为 0，不会被选中）
    pub fn sample_graph<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        self.dist.sample(rng)
    }

    /// 采样 (图下标, 均匀随机节点)
    pub fn sample_node<R: Rng + ?Sized>(&self, dataset: &Dataset, rng: &mut R) -> (usize, NodeId) {
        let graph_index = self.sample_graph(rng);
        let node = rng.gen_range(0..dataset[graph_index].num_nodes());
        (graph_index, node)
    }

    /// 拒绝采样：节点周围至少可达 `min_size` 个节点
    ///
    /// 尝试 `max_attempts` 次仍失败时返回 `None`。
    pub fn sample_reachable<R: Rng + ?Sized>(
        &self,
        dataset: &Dataset,
        rng: &mut R,
        min_size: usize,
        max_attempts: usize,
    ) -> Option<(usize, NodeId)> {
        (0..max_attempts).find_map(|_| {
            let (graph_index, node) = self.sample_node(dataset, rng);
            has_min_reachable_nodes(&dataset[graph_index], node, min_size).then_some((graph_index, node))
        })
    }

    /// 两跳邻域启发式：在同一个图里采样至多 10 个节点，
    /// 保留两跳邻域不小于 `min_size` 且最大的那个；都不满足时退回均匀随机节点
    pub fn sample_two_hop<R: Rng + ?Sized>(
        &self,
        dataset: &Dataset,
        rng: &mut R,
        min_size: usize,
    ) -> (usize, NodeId) {
        let graph_index = self.sample_graph(rng);
        let graph = &dataset[graph_index];
        let n = graph.num_nodes();

        let mut best: Option<(NodeId, usize)> = None;
        for _ in 0..LOOKAHEAD_SAMPLES.min(n) {
            let node = rng.gen_range(0..n);
            let size = two_hop_size(graph, node);
            if size >= min_size && best.map_or(true, |(_, s)| size > s) {
                best = Some((node, size));
            }
        }
        match best {
            Some((node, _)) => (graph_index, node),
            None => (graph_index, rng.gen_range(0..n)),
        }
    }
}
