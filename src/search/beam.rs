// src/search/beam.rs
// 束搜索代理：每个目标尺寸维护一条固定宽度的束，按尺寸轮转同步生长

use anyhow::{Context, Result};
use log::{debug, info};
use rand::rngs::StdRng;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use super::accumulator::{PatternAccumulator, cmp_score};
use super::agent::{AgentBase, AgentPhase, RankedPatterns, SearchAgent, make_rng};
use super::config::{RankMethod, SearchConfig};
use super::sampling::GraphSampler;
use crate::graph::{Dataset, Graph, NodeId, Pattern, wl_hash};
use crate::oracle::OracleClient;

/// 束成员
#[derive(Debug, Clone)]
pub struct BeamEntry {
    /// 归一化分数，越低越好
    pub score: f32,
    pub pattern: Pattern,
    pub graph_index: usize,
    pub seed: NodeId,
}

/// 束搜索代理
pub struct BeamSearchAgent {
    base: AgentBase,
    sampler: GraphSampler,
    rng: StdRng,
    beams: BTreeMap<usize, Vec<BeamEntry>>,
    accumulator: PatternAccumulator,
    trials_completed: usize,
    current_size: usize,
}

impl BeamSearchAgent {
    pub fn new(dataset: Arc<Dataset>, oracle: OracleClient, config: SearchConfig) -> Result<Self> {
        let mut base = AgentBase::new(dataset, oracle, config)?;
        base.use_reduced_precision();
        let sampler = GraphSampler::new(&base.dataset)?;
        let rng = make_rng(base.config.seed);
        let current_size = base.config.min_pattern_size;
        Ok(Self {
            base,
            sampler,
            rng,
            beams: BTreeMap::new(),
            accumulator: PatternAccumulator::new(),
            trials_completed: 0,
            current_size,
        })
    }

    pub fn trials_completed(&self) -> usize {
        self.trials_completed
    }

    pub fn current_size(&self) -> usize {
        self.current_size
    }

    /// 某尺寸当前的束
    pub fn beam(&self, size: usize) -> &[BeamEntry] {
        self.beams.get(&size).map(Vec::as_slice).unwrap_or(&[])
    }

    /// 批量嵌入并计算归一化分数；没有边的模式无效，分数为 +inf
    fn score_patterns(&self, patterns: &[Pattern], seeds: &[NodeId]) -> Result<Vec<f32>> {
        let anchors = self.base.config.node_anchored.then_some(seeds);
        let embeddings = self
            .base
            .oracle
            .embed(patterns, anchors)
            .context("束搜索评分失败")?;
        Ok(patterns
            .iter()
            .zip(&embeddings)
            .map(|(p, e)| if p.num_edges() == 0 { f32::INFINITY } else { self.base.oracle.normalized_score(e) })
            .collect())
    }

    /// 把种子按邻居列表顺序长到最小尺寸（不经预言机）
    fn initial_nodes(&self, graph: &Graph, seed: NodeId) -> Option<Vec<NodeId>> {
        let min_size = self.base.config.min_pattern_size;
        let mut nodes = vec![seed];
        for &v in graph.neighbors(seed) {
            if nodes.len() >= min_size {
                break;
            }
            if !nodes.contains(&v) {
                nodes.push(v);
            }
        }
        (nodes.len() >= min_size).then_some(nodes)
    }

    /// 抽取一批新种子作为最小尺寸的束；每个尝试过的种子都计为一次试验
    fn seed_cohort(&mut self) -> Result<()> {
        let remaining = self.base.n_trials.saturating_sub(self.trials_completed);
        let cohort = (2 * self.base.config.beam_width).min(remaining);

        let dataset = Arc::clone(&self.base.dataset);
        let mut patterns = Vec::new();
        let mut seeds = Vec::new();
        for _ in 0..cohort {
            let (graph_index, seed) =
                self.sampler
                    .sample_two_hop(&dataset, &mut self.rng, self.base.config.min_pattern_size);
            let graph = &dataset[graph_index];
            if let Some(nodes) = self.initial_nodes(graph, seed) {
                patterns.push(Pattern::induce(graph, graph_index, &nodes, self.base.anchor_for(seed)));
                seeds.push(seed);
            }
        }
        self.trials_completed += cohort;

        let scores = self.score_patterns(&patterns, &seeds)?;
        let entries = patterns
            .into_iter()
            .zip(seeds)
            .zip(scores)
            .map(|((pattern, seed), score)| BeamEntry { score, graph_index: pattern.graph_index, pattern, seed })
            .collect();
        let beam = self.select(entries);
        debug!("新种子批次: 尝试 {} 个, 保留 {} 个", cohort, beam.len());
        self.beams.insert(self.base.config.min_pattern_size, beam);
        Ok(())
    }

    /// 升序排序后保留 beam_width 个
    fn select(&self, mut entries: Vec<BeamEntry>) -> Vec<BeamEntry> {
        entries.sort_by(|a, b| cmp_score(a.score, b.score).then_with(|| a.pattern.key().cmp(&b.pattern.key())));
        entries.truncate(self.base.config.beam_width);
        entries
    }

    /// 束中每个成员的所有前沿扩展；不新增边的扩展被丢弃
    fn grow(&self, beam: &[BeamEntry]) -> Result<Vec<BeamEntry>> {
        let mut candidates = Vec::new();
        for entry in beam {
            let graph = &self.base.dataset[entry.graph_index];
            let frontier: BTreeSet<NodeId> = entry
                .pattern
                .nodes
                .iter()
                .flat_map(|&u| graph.neighbors(u).iter().copied())
                .filter(|v| !entry.pattern.contains(*v))
                .collect();
            let frontier: Vec<NodeId> = frontier.into_iter().collect();

            for chunk in frontier.chunks(self.base.config.batch_size) {
                let patterns: Vec<Pattern> = chunk
                    .iter()
                    .map(|&v| {
                        let mut nodes = entry.pattern.nodes.clone();
                        nodes.push(v);
                        Pattern::induce(graph, entry.graph_index, &nodes, entry.pattern.anchor)
                    })
                    .filter(|p| p.num_edges() > entry.pattern.num_edges())
                    .collect();
                if patterns.is_empty() {
                    continue;
                }
                let seeds = vec![entry.seed; patterns.len()];
                let scores = self.score_patterns(&patterns, &seeds)?;
                candidates.extend(patterns.into_iter().zip(scores).map(|(pattern, score)| BeamEntry {
                    score,
                    pattern,
                    graph_index: entry.graph_index,
                    seed: entry.seed,
                }));
            }
        }
        Ok(self.select(candidates))
    }
}

impl SearchAgent for BeamSearchAgent {
    fn init_search(&mut self, n_trials: usize) -> Result<()> {
        self.base.start(n_trials);
        self.beams.clear();
        self.accumulator = PatternAccumulator::new();
        self.trials_completed = 0;
        self.current_size = self.base.config.min_pattern_size;
        info!(
            "束搜索: {} 次试验, 束宽 {}, 尺寸 {}..={}",
            n_trials, self.base.config.beam_width, self.base.config.min_pattern_size, self.base.config.max_pattern_size
        );
        Ok(())
    }

    fn step(&mut self) -> Result<()> {
        self.base.oracle.release_cache();
        let size = self.current_size;

        if size == self.base.config.min_pattern_size {
            self.seed_cohort()?;
        }

        let current = self.beams.get(&size).cloned().unwrap_or_default();
        if !current.is_empty() && size < self.base.config.max_pattern_size {
            let next = self.grow(&current)?;
            if !next.is_empty() {
                self.beams.insert(size + 1, next);
            }
        }

        // 每次访问都记录当前束，轮转中同一成员可能被重复计数；无边的单节点种子不记录
        for entry in current.into_iter().filter(|e| e.pattern.num_edges() > 0) {
            let signature = wl_hash(&entry.pattern, self.base.config.node_anchored);
            self.accumulator.record(entry.pattern, entry.score, signature);
        }
        debug!("尺寸 {} 的束: {} 个成员", size, self.beam(size).len());

        self.current_size = if size >= self.base.config.max_pattern_size {
            self.base.config.min_pattern_size
        } else {
            size + 1
        };
        Ok(())
    }

    fn is_search_done(&self) -> bool {
        self.trials_completed >= self.base.n_trials
    }

    fn rank(&self) -> RankedPatterns {
        self.accumulator.rank(&RankMethod::Counts, &self.base.config)
    }

    fn finish_search(&mut self) -> RankedPatterns {
        let ranked = self.rank();
        self.accumulator = PatternAccumulator::new();
        self.beams.clear();
        self.base.phase = AgentPhase::Done;
        ranked
    }

    fn phase(&self) -> AgentPhase {
        self.base.phase
    }
}
