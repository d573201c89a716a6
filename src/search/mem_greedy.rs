// src/search/mem_greedy.rs
// 内存优化贪心代理
//
// 与贪心代理相同的生长规则，但前沿按 batch_size 分块送入预言机，
// 在加速硬件上可走降精度路径。n_beams > 1 时切换为束驱动模式：
// 维护一池部分生长的状态，每轮每个状态保留至多 n_beams 个扩展。

use anyhow::Result;
use log::{debug, info, warn};
use rand::rngs::StdRng;
use std::collections::BTreeSet;
use std::sync::Arc;

use super::accumulator::{PatternAccumulator, cmp_score};
use super::agent::{AgentBase, AgentPhase, RankedPatterns, SearchAgent, make_rng};
use super::config::SearchConfig;
use super::growth::{Growth, ScoredExtension, embed_extensions};
use super::sampling::GraphSampler;
use crate::graph::{Dataset, NodeId, wl_hash};
use crate::oracle::OracleClient;

/// 束驱动模式中的一个部分状态
#[derive(Debug, Clone)]
pub struct BeamState {
    pub score: f32,
    pub graph_index: usize,
    /// 生长顺序的节点列表，首个为种子
    pub nodes: Vec<NodeId>,
}

/// 内存优化贪心代理
pub struct MemoryEfficientGreedyAgent {
    base: AgentBase,
    sampler: GraphSampler,
    rng: StdRng,
    accumulator: PatternAccumulator,
    trials_completed: usize,
    beam_pool: Vec<BeamState>,
}

impl MemoryEfficientGreedyAgent {
    pub fn new(dataset: Arc<Dataset>, oracle: OracleClient, config: SearchConfig) -> Result<Self> {
        let mut base = AgentBase::new(dataset, oracle, config)?;
        base.use_reduced_precision();
        let sampler = GraphSampler::new(&base.dataset)?;
        let rng = make_rng(base.config.seed);
        Ok(Self {
            base,
            sampler,
            rng,
            accumulator: PatternAccumulator::new(),
            trials_completed: 0,
            beam_pool: Vec::new(),
        })
    }

    fn beam_mode(&self) -> bool {
        self.base.config.n_beams > 1
    }

    pub fn trials_completed(&self) -> usize {
        self.trials_completed
    }

    /// 当前束池（只在束驱动模式下非空）
    pub fn beam_pool(&self) -> &[BeamState] {
        &self.beam_pool
    }

    /// 放入一个外部构造的部分状态；畸形状态在下一轮被跳过
    pub fn push_beam_state(&mut self, state: BeamState) {
        self.beam_pool.push(state);
    }

    /// 分块评估前沿，返回分数最低的 `keep` 个扩展（升序）
    fn best_extensions(&self, growth: &Growth<'_>, keep: usize) -> Result<Vec<(f32, ScoredExtension)>> {
        let frontier: Vec<NodeId> = growth.frontier().iter().copied().collect();
        let mut scored = Vec::with_capacity(frontier.len());
        for chunk in frontier.chunks(self.base.config.batch_size) {
            for ext in embed_extensions(&self.base.oracle, growth, chunk)? {
                scored.push((self.base.oracle.score(&ext.embedding), ext));
            }
        }
        // 稳定排序：同分时保留前沿顺序
        scored.sort_by(|a, b| cmp_score(a.0, b.0));
        scored.truncate(keep);
        Ok(scored)
    }

    /// 单次贪心试验
    fn run_trial(&mut self) -> Result<()> {
        let dataset = Arc::clone(&self.base.dataset);
        let (graph_index, seed) = self.sampler.sample_node(&dataset, &mut self.rng);
        let mut growth = Growth::new(&dataset[graph_index], graph_index, seed, self.base.config.node_anchored);

        while !growth.is_exhausted(self.base.config.max_pattern_size) {
            let Some((score, best)) = self.best_extensions(&growth, 1)?.into_iter().next() else {
                break;
            };
            growth.push(best.node);
            if growth.len() >= self.base.config.min_pattern_size {
                let signature = wl_hash(&best.pattern, self.base.config.node_anchored);
                self.accumulator.record(best.pattern, score, signature);
            }
        }
        self.trials_completed += 1;
        Ok(())
    }

    /// 为束池补充新的种子状态
    fn seed_beam_pool(&mut self, count: usize) {
        for _ in 0..count {
            let (graph_index, seed) = self.sampler.sample_node(&self.base.dataset, &mut self.rng);
            self.beam_pool.push(BeamState { score: 0.0, graph_index, nodes: vec![seed] });
        }
        self.trials_completed += count;
    }

    /// 把一个状态推进一个节点，返回新状态
    fn advance(&mut self, state: &BeamState) -> Result<Vec<BeamState>> {
        let dataset = Arc::clone(&self.base.dataset);
        let Some(graph) = dataset.get(state.graph_index) else {
            warn!("跳过畸形束状态: 图下标 {} 越界", state.graph_index);
            return Ok(Vec::new());
        };
        let Some(growth) = Growth::replay(graph, state.graph_index, &state.nodes, self.base.config.node_anchored)
        else {
            warn!("跳过畸形束状态: 节点序列 {:?} 在图 {} 中不连通", state.nodes, state.graph_index);
            return Ok(Vec::new());
        };
        if growth.is_exhausted(self.base.config.max_pattern_size) {
            return Ok(Vec::new());
        }

        let mut next = Vec::new();
        for (score, ext) in self.best_extensions(&growth, self.base.config.n_beams)? {
            let mut nodes = state.nodes.clone();
            nodes.push(ext.node);
            if nodes.len() >= self.base.config.min_pattern_size {
                let signature = wl_hash(&ext.pattern, self.base.config.node_anchored);
                self.accumulator.record(ext.pattern, score, signature);
            }
            next.push(BeamState { score, graph_index: state.graph_index, nodes });
        }
        Ok(next)
    }

    fn beam_round(&mut self) {
        if self.beam_pool.is_empty() {
            let remaining = self.base.n_trials.saturating_sub(self.trials_completed);
            self.seed_beam_pool(self.base.config.trials_per_step.min(remaining));
        }

        let pool = std::mem::take(&mut self.beam_pool);
        let mut next_pool = Vec::new();
        let mut graphs = BTreeSet::new();
        for state in &pool {
            graphs.insert(state.graph_index);
            match self.advance(state) {
                Ok(next) => next_pool.extend(next),
                Err(e) => warn!("推进束状态失败 (图 {}): {:#}", state.graph_index, e),
            }
        }

        next_pool.sort_by(|a, b| cmp_score(a.score, b.score).then_with(|| a.nodes.cmp(&b.nodes)));
        next_pool.truncate(self.base.config.n_beams * self.base.config.batch_size);
        info!("处理来自 {} 个图的束, 下一轮 {} 个状态", graphs.len(), next_pool.len());
        self.beam_pool = next_pool;
    }
}

impl SearchAgent for MemoryEfficientGreedyAgent {
    fn init_search(&mut self, n_trials: usize) -> Result<()> {
        self.base.start(n_trials);
        self.accumulator = PatternAccumulator::new();
        self.trials_completed = 0;
        self.beam_pool.clear();
        info!(
            "内存优化贪心: {} 次试验, 分块 {}, 束数 {}, 精度 {:?}",
            n_trials,
            self.base.config.batch_size,
            self.base.config.n_beams,
            self.base.oracle.precision()
        );
        Ok(())
    }

    fn step(&mut self) -> Result<()> {
        self.base.oracle.release_cache();

        if self.beam_mode() {
            self.beam_round();
        } else {
            let remaining = self.base.n_trials.saturating_sub(self.trials_completed);
            for _ in 0..self.base.config.trials_per_step.min(remaining) {
                self.run_trial()?;
            }
            debug!("完成 {}/{} 次试验", self.trials_completed, self.base.n_trials);
        }
        Ok(())
    }

    fn is_search_done(&self) -> bool {
        self.trials_completed >= self.base.n_trials && self.beam_pool.is_empty()
    }

    fn rank(&self) -> RankedPatterns {
        self.accumulator.rank(&self.base.config.rank_method, &self.base.config)
    }

    fn finish_search(&mut self) -> RankedPatterns {
        let ranked = self.rank();
        self.accumulator = PatternAccumulator::new();
        self.beam_pool.clear();
        self.base.phase = AgentPhase::Done;
        ranked
    }

    fn phase(&self) -> AgentPhase {
        self.base.phase
    }
}
