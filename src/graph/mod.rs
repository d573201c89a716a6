// ==============================================================================
// --- 模块声明 ---
// ==============================================================================

pub mod neighborhood;
pub mod pattern;
pub mod types;
pub mod wl_hash;

// ==============================================================================
// --- 公共 API 重导出 ---
// ==============================================================================

// 从 types.rs 导出图与数据集
pub use types::{Dataset, Graph, GraphSpec, NodeId};

// 从 pattern.rs 导出子图模式
pub use pattern::{Pattern, PatternKey};

// 从 wl_hash.rs 导出规范哈希
pub use wl_hash::{Signature, wl_hash};

// 从 neighborhood.rs 导出邻域工具
pub use neighborhood::{NeighborhoodStream, has_min_reachable_nodes, two_hop_size};
