// src/mcts/mod.rs
// 子图模式空间上的蒙特卡洛树搜索
// ==========================================================================
//
// 两个 MCTS 代理:
// 1. MctsAgent: 状态为规范签名，UCT 选择，终点价值回传整条轨迹
// 2. MemoryEfficientMctsAgent: 惰性邻域流 + 阈值接受，计数放在有界 LRU 缓存里
//
// 两者都在 step 中把尺寸上限从 min_pattern_size 逐步推到 max_pattern_size。

pub mod cache;
pub mod node;
pub mod search;
pub mod streaming;

// 统一导出所有公共接口
pub use cache::PatternCache;
pub use node::{EdgeStats, PatternArena, StateKey, StatsTable};
pub use search::{MAX_SEED_ATTEMPTS, MctsAgent, search_value, uct_score};
pub use streaming::MemoryEfficientMctsAgent;
