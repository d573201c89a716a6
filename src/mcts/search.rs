// src/mcts/search.rs
// 基于规范签名状态的 UCT 树搜索代理

use anyhow::Result;
use log::{debug, info, trace};
use rand::rngs::StdRng;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use super::node::{PatternArena, StateKey, StatsTable};
use crate::graph::{Dataset, NodeId, wl_hash};
use crate::oracle::{Embedding, OracleClient};
use crate::search::{
    AgentBase, AgentPhase, GraphSampler, Growth, RankedPatterns, SearchAgent, SearchConfig, embed_extensions,
    make_rng, select_most_frequent,
};

/// 新种子拒绝采样的尝试上限
pub const MAX_SEED_ATTEMPTS: usize = 1000;

/// 由预言机均值分数计算搜索价值: -ln(mean + 1) + 1
///
/// 均值越低（越像参考邻域的子图）价值越高；没有均值时为 0。
pub fn search_value(mean: Option<f32>) -> f32 {
    match mean {
        Some(m) => {
            let v = -(m + 1.0).ln() + 1.0;
            if v.is_finite() { v } else { 0.0 }
        }
        None => 0.0,
    }
}

/// UCT = Q + c * sqrt(ln(N_parent) / N_child)，N 为 0 时按 1 计
#[inline]
pub fn uct_score(q: f32, c_uct: f32, parent_visits: u64, child_visits: u64) -> f32 {
    let parent = parent_visits.max(1) as f32;
    let child = child_visits.max(1) as f32;
    q + c_uct * (parent.ln() / child).sqrt()
}

/// MCTS 搜索代理
///
/// 每个 step 在当前尺寸上限 `max_size` 下跑 `n_trials / 尺寸数` 次模拟，
/// 然后把 `max_size` 加一；超过最大尺寸时结束。
pub struct MctsAgent {
    base: AgentBase,
    sampler: GraphSampler,
    rng: StdRng,
    stats: StatsTable,
    arena: PatternArena,
    visited_seeds: BTreeSet<(usize, NodeId)>,
    max_size: usize,
    simulations: u64,
}

impl MctsAgent {
    pub fn new(dataset: Arc<Dataset>, oracle: OracleClient, config: SearchConfig) -> Result<Self> {
        let base = AgentBase::new(dataset, oracle, config)?;
        let sampler = GraphSampler::new(&base.dataset)?;
        let rng = make_rng(base.config.seed);
        let max_size = base.config.min_pattern_size;
        Ok(Self {
            base,
            sampler,
            rng,
            stats: StatsTable::new(),
            arena: PatternArena::new(),
            visited_seeds: BTreeSet::new(),
            max_size,
            simulations: 0,
        })
    }

    pub fn stats(&self) -> &StatsTable {
        &self.stats
    }

    pub fn arena(&self) -> &PatternArena {
        &self.arena
    }

    pub fn distinct_seeds(&self) -> usize {
        self.visited_seeds.len()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// 选种子：已访问种子的 UCT 最高者不低于“新种子”的分数时利用它，否则采样新种子
    fn choose_seed(&mut self) -> Option<(usize, NodeId)> {
        let c_uct = self.base.config.c_uct;
        let mut best: Option<((usize, NodeId), f32)> = None;
        for &(graph_index, node) in &self.visited_seeds {
            let totals = self.stats.totals(&StateKey::Seed { graph_index, node });
            let score = uct_score(totals.q_value(), c_uct, self.simulations, u64::from(totals.visits));
            if best.map_or(true, |(_, s)| score > s) {
                best = Some(((graph_index, node), score));
            }
        }

        let fresh_score = c_uct * (self.simulations.max(1) as f32).ln().sqrt();
        if let Some((seed, score)) = best {
            if score >= fresh_score {
                return Some(seed);
            }
        }

        let seed = self.sampler.sample_reachable(
            &self.base.dataset,
            &mut self.rng,
            self.base.config.min_pattern_size,
            MAX_SEED_ATTEMPTS,
        )?;
        self.visited_seeds.insert(seed);
        Some(seed)
    }

    /// 一次模拟：选种子、沿 UCT 生长到 max_size、把终点价值回传给整条轨迹
    fn simulate(&mut self) -> Result<()> {
        let Some((graph_index, seed)) = self.choose_seed() else {
            debug!("{} 次尝试内没有找到满足最小尺寸的种子，放弃本次模拟", MAX_SEED_ATTEMPTS);
            return Ok(());
        };
        let dataset = Arc::clone(&self.base.dataset);
        let node_anchored = self.base.config.node_anchored;
        let c_uct = self.base.config.c_uct;

        let mut growth = Growth::new(&dataset[graph_index], graph_index, seed, node_anchored);
        let mut cur_state = StateKey::Seed { graph_index, node: seed };
        let mut trajectory = vec![cur_state];
        let mut terminal_value = 0.0;

        while !growth.is_exhausted(self.max_size) {
            let frontier: Vec<NodeId> = growth.frontier().iter().copied().collect();
            let extensions = embed_extensions(&self.base.oracle, &growth, &frontier)?;
            let parent_visits = u64::from(self.stats.totals(&cur_state).visits);

            let mut best: Option<(usize, f32, f32, StateKey)> = None;
            for (i, ext) in extensions.iter().enumerate() {
                let value = self.value_of(&ext.embedding);
                let next_state = StateKey::Pattern(wl_hash(&ext.pattern, node_anchored));
                let next = self.stats.totals(&next_state);
                let score = uct_score(next.q_value(), c_uct, parent_visits, u64::from(next.visits));
                if best.map_or(true, |(_, s, _, _)| score > s) {
                    best = Some((i, score, value, next_state));
                }
            }
            let Some((best_idx, _, value, next_state)) = best else {
                break;
            };

            let chosen = &extensions[best_idx];
            growth.push(chosen.node);
            terminal_value = value;
            cur_state = next_state;
            trajectory.push(cur_state);
            if let StateKey::Pattern(signature) = cur_state {
                self.arena.insert(signature, chosen.pattern.clone());
            }
        }

        // 终点价值回传给轨迹上的每条转移
        for pair in trajectory.windows(2) {
            self.stats.record(pair[0], pair[1], terminal_value);
        }
        trace!(
            "模拟: 图 {} 种子 {} 长度 {} 价值 {:.4}",
            graph_index,
            seed,
            growth.len(),
            terminal_value
        );
        self.simulations += 1;
        Ok(())
    }

    fn value_of(&self, embedding: &Embedding) -> f32 {
        search_value(self.base.oracle.mean_prediction(embedding))
    }
}

impl SearchAgent for MctsAgent {
    fn init_search(&mut self, n_trials: usize) -> Result<()> {
        self.base.start(n_trials);
        self.stats.clear();
        self.arena.clear();
        self.visited_seeds.clear();
        self.max_size = self.base.config.min_pattern_size;
        self.simulations = 0;
        info!("MCTS: {} 次模拟, c_uct = {}", n_trials, self.base.config.c_uct);
        Ok(())
    }

    fn step(&mut self) -> Result<()> {
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

    /// 按目标状态在所有前驱上的访问次数之和排序，每个状态输出其代表模式
    fn rank(&self) -> RankedPatterns {
        let mut ranked = self.base.empty_ranking();
        let mut per_size: BTreeMap<usize, Vec<_>> = BTreeMap::new();
        for (state, count) in self.stats.incoming_visits() {
            let StateKey::Pattern(signature) = state else {
                continue;
            };
            if let Some(pattern) = self.arena.get(&signature) {
                per_size.entry(pattern.len()).or_insert_with(Vec::new).push((count, signature, pattern.clone()));
            }
        }
        for (size, slot) in ranked.iter_mut() {
            if let Some(entries) = per_size.remove(size) {
                *slot = select_most_frequent(entries, self.base.config.out_batch_size);
                debug!("尺寸 {}: 输出 {} 个模式", size, slot.len());
            }
        }
        ranked
    }

    fn finish_search(&mut self) -> RankedPatterns {
        let ranked = self.rank();
        self.stats.clear();
        self.arena.clear();
        self.base.phase = AgentPhase::Done;
        ranked
    }

    fn phase(&self) -> AgentPhase {
        self.base.phase
    }
}
