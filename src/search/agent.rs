// src/search/agent.rs
// 搜索代理契约与策略分派
//
// 生命周期: Uninitialized -> Running -> Done
// run_search(n) = init_search(n) -> { step() }* -> finish_search()

use anyhow::{Result, bail};
use log::info;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::beam::BeamSearchAgent;
use super::config::{SearchConfig, StrategyKind};
use super::greedy::GreedyAgent;
use super::mem_greedy::MemoryEfficientGreedyAgent;
use crate::graph::{Dataset, NodeId, Pattern};
use crate::mcts::{MctsAgent, MemoryEfficientMctsAgent};
use crate::oracle::{OracleClient, Precision};

/// 排序输出：尺寸 -> 有序模式列表
pub type RankedPatterns = BTreeMap<usize, Vec<Pattern>>;

/// 代理所处阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AgentPhase {
    #[default]
    Uninitialized,
    Running,
    Done,
}

/// 搜索代理特征 (Trait)
///
/// `step` 只做有界的一份工作（一批模拟、一轮束扩展、MCTS 的一次尺寸递增），
/// 从不试图一次跑到终止。
pub trait SearchAgent {
    /// 分配累加器，进入 Running
    fn init_search(&mut self, n_trials: usize) -> Result<()>;

    /// 执行一步
    fn step(&mut self) -> Result<()>;

    fn is_search_done(&self) -> bool;

    /// 对当前累加器排序；纯函数，可重复调用
    fn rank(&self) -> RankedPatterns;

    /// 排序、丢弃累加器并进入 Done
    fn finish_search(&mut self) -> RankedPatterns;

    fn phase(&self) -> AgentPhase;

    /// 完整运行一次搜索
    fn run_search(&mut self, n_trials: usize) -> Result<RankedPatterns> {
        self.init_search(n_trials)?;
        while !self.is_search_done() {
            self.step()?;
        }
        Ok(self.finish_search())
    }
}

// ==============================================================================
// --- 共享上下文 ---
// ==============================================================================

/// 各代理共用的只读句柄与配置
pub struct AgentBase {
    pub dataset: Arc<Dataset>,
    pub oracle: OracleClient,
    pub config: SearchConfig,
    pub phase: AgentPhase,
    pub n_trials: usize,
}

impl AgentBase {
    /// 校验配置与数据集后构造
    pub fn new(dataset: Arc<Dataset>, oracle: OracleClient, config: SearchConfig) -> Result<Self> {
        config.validate()?;
        if dataset.is_empty() || dataset.total_nodes() == 0 {
            bail!("数据集为空");
        }
        Ok(Self { dataset, oracle, config, phase: AgentPhase::Uninitialized, n_trials: 0 })
    }

    /// 预言机位于加速硬件且配置允许时切换到降精度
    pub fn use_reduced_precision(&mut self) {
        if self.config.reduced_precision && self.oracle.is_accelerated() {
            info!("启用降精度评分路径");
            self.oracle = self.oracle.clone().with_precision(Precision::Reduced);
        }
    }

    /// 进入 Running
    pub fn start(&mut self, n_trials: usize) {
        self.n_trials = n_trials;
        self.phase = AgentPhase::Running;
    }

    /// 锚定模式下返回种子本身
    pub fn anchor_for(&self, seed: NodeId) -> Option<NodeId> {
        self.config.node_anchored.then_some(seed)
    }

    /// 每个尺寸都为空的排序结果
    pub fn empty_ranking(&self) -> RankedPatterns {
        (self.config.min_pattern_size..=self.config.max_pattern_size)
            .map(|size| (size, Vec::new()))
            .collect()
    }
}

/// 按配置构造随机数生成器：有种子时可复现，否则取系统熵
pub fn make_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    }
}

// ==============================================================================
// --- 策略分派 ---
// ==============================================================================

/// 五种搜索策略的标签联合
pub enum SearchStrategy {
    Mcts(MctsAgent),
    Greedy(GreedyAgent),
    MemGreedy(MemoryEfficientGreedyAgent),
    MemMcts(MemoryEfficientMctsAgent),
    Beam(BeamSearchAgent),
}

impl SearchStrategy {
    /// 按策略名构造代理
    pub fn new(
        kind: StrategyKind,
        dataset: Arc<Dataset>,
        oracle: OracleClient,
        config: SearchConfig,
    ) -> Result<Self> {
        Ok(match kind {
            StrategyKind::Mcts => Self::Mcts(MctsAgent::new(dataset, oracle, config)?),
            StrategyKind::Greedy => Self::Greedy(GreedyAgent::new(dataset, oracle, config)?),
            StrategyKind::MemGreedy => Self::MemGreedy(MemoryEfficientGreedyAgent::new(dataset, oracle, config)?),
            StrategyKind::MemMcts => Self::MemMcts(MemoryEfficientMctsAgent::new(dataset, oracle, config)?),
            StrategyKind::Beam => Self::Beam(BeamSearchAgent::new(dataset, oracle, config)?),
        })
    }

    pub fn kind(&self) -> StrategyKind {
        match self {
            Self::Mcts(_) => StrategyKind::Mcts,
            Self::Greedy(_) => StrategyKind::Greedy,
            Self::MemGreedy(_) => StrategyKind::MemGreedy,
            Self::MemMcts(_) => StrategyKind::MemMcts,
            Self::Beam(_) => StrategyKind::Beam,
        }
    }

    fn agent(&self) -> &dyn SearchAgent {
        match self {
            Self::Mcts(a) => a,
            Self::Greedy(a) => a,
            Self::MemGreedy(a) => a,
            Self::MemMcts(a) => a,
            Self::Beam(a) => a,
        }
    }

    fn agent_mut(&mut self) -> &mut dyn SearchAgent {
        match self {
            Self::Mcts(a) => a,
            Self::Greedy(a) => a,
            Self::MemGreedy(a) => a,
            Self::MemMcts(a) => a,
            Self::Beam(a) => a,
        }
    }
}

impl SearchAgent for SearchStrategy {
    fn init_search(&mut self, n_trials: usize) -> Result<()> {
        self.agent_mut().init_search(n_trials)
    }

    fn step(&mut self) -> Result<()> {
        self.agent_mut().step()
    }

    fn is_search_done(&self) -> bool {
        self.agent().is_search_done()
    }

    fn rank(&self) -> RankedPatterns {
        self.agent().rank()
    }

    fn finish_search(&mut self) -> RankedPatterns {
        self.agent_mut().finish_search()
    }

    fn phase(&self) -> AgentPhase {
        self.agent().phase()
    }
}
