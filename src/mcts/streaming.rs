// src/mcts/streaming.rs
// 内存优化 MCTS 代理：惰性邻域流 + 有界 LRU 模式缓存

use anyhow::{Context, Result};
use log::{debug, info};
use rand::Rng;
use rand::rngs::StdRng;
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::BTreeMap;
use std::sync::Arc;

use super::cache::PatternCache;
use crate::graph::{Dataset, Graph, NodeId, NeighborhoodStream, Signature, wl_hash};
use crate::oracle::OracleClient;
use crate::search::{
    AgentBase, AgentPhase, GraphSampler, Growth, LOOKAHEAD_SAMPLES, RankedPatterns, SearchAgent, SearchConfig,
    make_rng, select_most_frequent,
};

/// 每隔多少次模拟释放一次预言机缓存
const RELEASE_EVERY: u64 = 100;

/// 内存优化 MCTS 代理
///
/// 不物化邻域：从种子出发的邻域流逐个产出节点，
/// 只有位于模式前沿、且预言机均值分数超过阈值的节点才被接受。
/// 计数按 (尺寸, 签名) 汇总，代表模式放在固定容量的 LRU 缓存里；
/// 被淘汰的签名在输出时跳过。
pub struct MemoryEfficientMctsAgent {
    base: AgentBase,
    sampler: GraphSampler,
    rng: StdRng,
    cache: PatternCache,
    visit_counts: BTreeMap<usize, FxHashMap<Signature, u64>>,
    visited_seeds: FxHashSet<(usize, NodeId)>,
    max_size: usize,
    simulations: u64,
}

impl MemoryEfficientMctsAgent {
    pub fn new(dataset: Arc<Dataset>, oracle: OracleClient, config: SearchConfig) -> Result<Self> {
        let mut base = AgentBase::new(dataset, oracle, config)?;
        base.use_reduced_precision();
        let sampler = GraphSampler::new(&base.dataset)?;
        let rng = make_rng(base.config.seed);
        let cache = PatternCache::new(base.config.cache_capacity);
        let max_size = base.config.min_pattern_size;
        Ok(Self {
            base,
            sampler,
            rng,
            cache,
            visit_counts: BTreeMap::new(),
            visited_seeds: FxHashSet::default(),
            max_size,
            simulations: 0,
        })
    }

    pub fn cache(&self) -> &PatternCache {
        &self.cache
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// 某尺寸某签名的计数
    pub fn visit_count(&self, size: usize, signature: &Signature) -> u64 {
        self.visit_counts.get(&size).and_then(|m| m.get(signature)).copied().unwrap_or(0)
    }

    /// 前瞻选种：采样至多 10 个节点，保留 min_pattern_size 步内流出节点最多者
    fn lookahead_seed(&mut self, graph: &Graph) -> NodeId {
        let min_size = self.base.config.min_pattern_size;
        let mut best: Option<(NodeId, usize)> = None;
        for _ in 0..LOOKAHEAD_SAMPLES.min(graph.num_nodes()) {
            let node = self.rng.gen_range(0..graph.num_nodes());
            let reachable = NeighborhoodStream::new(graph, node, min_size).count();
            if best.map_or(true, |(_, r)| reachable > r) {
                best = Some((node, reachable));
            }
        }
        best.map_or(0, |(node, _)| node)
    }

    fn count(&mut self, growth: &Growth<'_>) {
        if growth.len() < self.base.config.min_pattern_size {
            return;
        }
        let pattern = growth.pattern();
        let signature = wl_hash(&pattern, self.base.config.node_anchored);
        *self
            .visit_counts
            .entry(pattern.len())
            .or_insert_with(FxHashMap::default)
            .entry(signature)
            .or_insert(0) += 1;
        self.cache.insert(signature, pattern);
    }

    fn simulate(&mut self) -> Result<()> {
        if self.simulations % RELEASE_EVERY == 0 {
            self.base.oracle.release_cache();
        }
        self.simulations += 1;

        let dataset = Arc::clone(&self.base.dataset);
        let graph_index = self.sampler.sample_graph(&mut self.rng);
        let graph = &dataset[graph_index];
        let seed = self.lookahead_seed(graph);
        self.visited_seeds.insert((graph_index, seed));

        let node_anchored = self.base.config.node_anchored;
        let threshold = self.base.config.acceptance_threshold;
        let mut growth = Growth::new(graph, graph_index, seed, node_anchored);
        self.count(&growth);

        for next in NeighborhoodStream::new(graph, seed, self.base.config.stream_node_cap) {
            if growth.len() >= self.max_size {
                break;
            }
            if !growth.frontier().contains(&next) {
                continue;
            }
            let candidate = growth.extended(next);
            if candidate.num_edges() == 0 {
                continue;
            }
            let anchors = node_anchored.then(|| [seed]);
            let embedding = self
                .base
                .oracle
                .embed(std::slice::from_ref(&candidate), anchors.as_ref().map(|a| a.as_slice()))
                .with_context(|| format!("嵌入图 {} 的候选失败", graph_index))?
                .pop()
                .context("预言机没有返回嵌入")?;

            let accepted = self
                .base
                .oracle
                .mean_prediction(&embedding)
                .is_some_and(|mean| mean > threshold);
            if accepted {
                growth.push(next);
                self.count(&growth);
            }
        }
        Ok(())
    }
}

impl SearchAgent for MemoryEfficientMctsAgent {
    fn init_search(&mut self, n_trials: usize) -> Result<()> {
        self.base.start(n_trials);
        self.cache.clear();
        self.visit_counts.clear();
        self.visited_seeds.clear();
        self.max_size = self.base.config.min_pattern_size;
        self.simulations = 0;
        info!(
            "内存优化 MCTS: {} 次模拟, 缓存容量 {}, 邻域流上限 {}",
            n_trials,
            self.cache.capacity(),
            self.base.config.stream_node_cap
        );
        Ok(())
    }

    fn step(&mut self) -> Result<()> {
        self.base.oracle.release_cache();
        info!("尺寸上限 {}, 已有 {} 个不同种子", self.max_size, self.visited_seeds.len());
        let per_size = self.base.n_trials / self.base.config.size_span();
        for _ in 0..per_size {
            self.simulate()?;
        }
        self.max_size += 1;
        Ok(())
    }

    fn is_search_done(&self) -> bool {
        self.max_size > self.base.config.max_pattern_size
    }

    fn rank(&self) -> RankedPatterns {
        let mut ranked = self.base.empty_ranking();
        for (size, slot) in ranked.iter_mut() {
            let Some(counts) = self.visit_counts.get(size) else {
                continue;
            };
            let entries = counts
                .iter()
                .filter_map(|(&signature, &count)| self.cache.peek(&signature).map(|p| (count, signature, p.clone())));
            *slot = select_most_frequent(entries, self.base.config.out_batch_size);
        }
        debug!("缓存 {} 项, 累计淘汰 {} 次", self.cache.len(), self.cache.evictions());
        ranked
    }

    fn finish_search(&mut self) -> RankedPatterns {
        let ranked = self.rank();
        self.cache.clear();
        self.visit_counts.clear();
        self.base.phase = AgentPhase::Done;
        ranked
    }

    fn phase(&self) -> AgentPhase {
        self.base.phase
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Pattern;
    use crate::oracle::{Embedding, ScoringConvention, ScoringOracle};
    use ndarray::{Array1, Array2, array};

    /// 每个参考行的分数都是常数
    struct ConstantOracle(f32);

    impl ScoringOracle for ConstantOracle {
        fn embed(&self, candidates: &[Pattern], _anchors: Option<&[NodeId]>) -> Result<Vec<Embedding>> {
            Ok(candidates.iter().map(|_| array![0.0]).collect())
        }

        fn predict(&self, references: &Array2<f32>, _candidate: &Embedding) -> Array1<f32> {
            Array1::from_elem(references.nrows(), self.0)
        }

        fn contains(&self, prediction: f32) -> bool {
            prediction <= 0.5
        }
    }

    fn agent(score: f32, capacity: usize) -> MemoryEfficientMctsAgent {
        // 两个三角形由 2-3 相连
        let g = Graph::undirected(6, &[(0, 1), (1, 2), (2, 0), (2, 3), (3, 4), (4, 5), (5, 3)]);
        let dataset = Arc::new(Dataset::new(vec![g]));
        let oracle = OracleClient::new(Arc::new(ConstantOracle(score)), vec![array![[0.0], [0.0]]], ScoringConvention::Order)
            .unwrap();
        let config = SearchConfig {
            min_pattern_size: 2,
            max_pattern_size: 4,
            node_anchored: true,
            cache_capacity: capacity,
            seed: Some(5),
            ..Default::default()
        };
        MemoryEfficientMctsAgent::new(dataset, oracle, config).unwrap()
    }

    #[test]
    fn test_accepting_oracle_grows_connected_patterns() {
        let ranked = agent(1.0, 100).run_search(9).unwrap();
        assert_eq!(ranked.keys().copied().collect::<Vec<_>>(), vec![2, 3, 4]);
        for (size, patterns) in &ranked {
            assert!(!patterns.is_empty());
            for p in patterns {
                assert_eq!(p.len(), *size);
                assert!(p.is_weakly_connected());
                assert_eq!(p.anchor, p.seed());
            }
        }
    }

    #[test]
    fn test_rejecting_oracle_never_grows() {
        let ranked = agent(0.1, 100).run_search(9).unwrap();
        assert!(ranked.values().all(Vec::is_empty));
    }

    #[test]
    fn test_evicted_buckets_are_skipped() {
        let mut a = agent(1.0, 1);
        a.init_search(9).unwrap();
        while !a.is_search_done() {
            a.step().unwrap();
        }
        assert_eq!(a.cache().len(), 1);
        let emitted: usize = a.rank().values().map(Vec::len).sum();
        assert_eq!(emitted, 1);
    }
}
