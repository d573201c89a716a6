// src/oracle/mod.rs
// 评分预言机接口定义
//
// 预言机是外部嵌入模型的边界：把候选子图批量映射为定长嵌入，
// 并将候选嵌入与参考嵌入集比较。搜索代理只通过 `OracleClient` 访问它。

pub mod client;
pub mod structural;

use anyhow::Result;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::graph::{NodeId, Pattern};

pub use client::{OracleClient, Precision};
pub use structural::StructuralOracle;

/// 嵌入向量
pub type Embedding = Array1<f32>;

/// 评分约定
///
/// * `Order`：分类式，统计被判定为“包含”候选的参考嵌入个数
/// * `Mlp`：回归式，直接累加兼容度分数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoringConvention {
    #[default]
    Order,
    Mlp,
}

impl FromStr for ScoringConvention {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "order" => Ok(Self::Order),
            "mlp" => Ok(Self::Mlp),
            other => anyhow::bail!("未知的评分约定: {}", other),
        }
    }
}

impl fmt::Display for ScoringConvention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Order => write!(f, "order"),
            Self::Mlp => write!(f, "mlp"),
        }
    }
}

/// 评分预言机特征 (Trait)
///
/// 实现者需要线程安全：并行贪心代理会把同一个预言机共享给所有工作线程。
pub trait ScoringOracle: Send + Sync {
    /// 批量计算候选子图的嵌入
    ///
    /// # 参数
    ///
    /// * `candidates` - 候选子图
    /// * `anchors` - 锚定模式下每个候选的锚点，非锚定模式为 `None`
    ///
    /// # 返回
    ///
    /// 与 `candidates` 等长的嵌入列表
    fn embed(&self, candidates: &[Pattern], anchors: Option<&[NodeId]>) -> Result<Vec<Embedding>>;

    /// 每个参考嵌入相对候选的原始违背分数（越低越可能包含候选）
    ///
    /// `references` 每行是一个参考嵌入。
    fn predict(&self, references: &Array2<f32>, candidate: &Embedding) -> Array1<f32>;

    /// 分类头：该原始分数是否判定为“包含”
    fn contains(&self, prediction: f32) -> bool;

    /// 回归头：每个参考嵌入与候选的兼容度（越高越好）
    fn compatibility(&self, references: &Array2<f32>, candidate: &Embedding) -> Array1<f32> {
        self.predict(references, candidate).mapv(|p| -p)
    }

    /// 是否运行在加速硬件上（决定是否启用降精度路径）
    fn is_accelerated(&self) -> bool {
        false
    }

    /// 释放设备端缓存；默认无操作
    fn release_cache(&self) {}
}
