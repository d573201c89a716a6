//! # subgraph_miner - 嵌入空间中的频繁子图模式挖掘
//!
//! 在一组图上搜索出现最频繁的诱导子图模式。候选子图从种子节点逐节点生长，
//! 由评分预言机与参考嵌入集比较打分，用 WL 规范签名去重，按估计频率排序。
//!
//! ## 模块
//! - `graph`: 图与数据集、诱导子图模式、WL 规范哈希、邻域流
//! - `oracle`: 评分预言机接口与结构计数参考实现
//! - `search`: 搜索代理契约、贪心/内存优化贪心/束搜索代理、并行工作池
//! - `mcts`: MCTS 代理与内存优化 MCTS 代理
//!
//! ## 使用示例
//! ```rust,no_run
//! use std::sync::Arc;
//! use ndarray::array;
//! use subgraph_miner::{Dataset, Graph, OracleClient, ScoringConvention, SearchAgent,
//!     SearchConfig, SearchStrategy, StrategyKind, StructuralOracle};
//!
//! let ring = Graph::undirected(6, &[(0, 1), (1, 2), (2, 3), (3, 4), (4, 5), (5, 0)]);
//! let dataset = Arc::new(Dataset::new(vec![ring]));
//! let refs = vec![array![[6.0, 6.0, 6.0, 6.0, 0.0, 0.0, 0.0, 0.0]]];
//! let oracle = OracleClient::new(Arc::new(StructuralOracle::default()), refs, ScoringConvention::Order)?;
//! let config = SearchConfig { min_pattern_size: 3, max_pattern_size: 4, ..Default::default() };
//! let mut agent = SearchStrategy::new(StrategyKind::Greedy, dataset, oracle, config)?;
//! let ranked = agent.run_search(100)?;
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod graph;
pub mod mcts;
pub mod oracle;
pub mod search;

// 重新导出核心类型，方便外部使用
pub use graph::{Dataset, Graph, GraphSpec, NodeId, Pattern, Signature, wl_hash};
pub use mcts::{MctsAgent, MemoryEfficientMctsAgent};
pub use oracle::{Embedding, OracleClient, ScoringConvention, ScoringOracle, StructuralOracle};
pub use search::{
    BeamSearchAgent, GreedyAgent, MemoryEfficientGreedyAgent, RankMethod, RankedPatterns, SearchAgent, SearchConfig,
    SearchStrategy, StrategyKind,
};
