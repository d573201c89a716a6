// src/search/mod.rs
// 搜索代理框架
// ==========================================================================
//
// 所有策略共享同一契约 (SearchAgent)：
// 1. init_search: 分配累加器
// 2. step: 一份有界的工作，直到 is_search_done
// 3. finish_search: 排序输出并丢弃累加器
//
// 贪心类代理的结果按 尺寸 -> 规范签名 -> 追加 累加，
// 由 counts / margin / hybrid 三种策略排序。

pub mod accumulator;
pub mod agent;
pub mod beam;
pub mod config;
pub mod greedy;
pub mod growth;
pub mod mem_greedy;
pub mod pool;
pub mod sampling;

// 统一导出所有公共接口
pub use accumulator::{PatternAccumulator, ScoredPattern, cmp_score, representative, select_most_frequent};
pub use agent::{AgentBase, AgentPhase, RankedPatterns, SearchAgent, SearchStrategy, make_rng};
pub use beam::{BeamEntry, BeamSearchAgent};
pub use config::{RankMethod, SearchConfig, StrategyKind};
pub use greedy::{GreedyAgent, run_greedy_trial, trial_rng};
pub use growth::{Growth, ScoredExtension, embed_extensions};
pub use mem_greedy::{BeamState, MemoryEfficientGreedyAgent};
pub use pool::{WorkerContext, WorkerPool};
pub use sampling::{GraphSampler, LOOKAHEAD_SAMPLES};
