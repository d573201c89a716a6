// src/oracle/client.rs
// 预言机客户端：参考嵌入集 + 评分约定 + 精度模式

use anyhow::{Result, bail};
use log::debug;
use ndarray::Array2;
use std::sync::Arc;

use super::{Embedding, ScoringConvention, ScoringOracle};
use crate::graph::{NodeId, Pattern};

/// 数值精度模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Precision {
    #[default]
    Full,
    /// bfloat16 舍入后再比较，换取吞吐
    Reduced,
}

/// 把 f32 舍入到 bfloat16 可表示的值（就近舍入）
#[inline]
fn round_bf16(x: f32) -> f32 {
    if !x.is_finite() {
        return x;
    }
    let bits = x.to_bits();
    let rounded = bits.wrapping_add(0x7FFF + ((bits >> 16) & 1));
    f32::from_bits(rounded & 0xFFFF_0000)
}

/// 预言机客户端
///
/// 克隆开销很小（内部均为 `Arc`），可直接放进工作线程上下文。
#[derive(Clone)]
pub struct OracleClient {
    oracle: Arc<dyn ScoringOracle>,
    references: Arc<Vec<Array2<f32>>>,
    convention: ScoringConvention,
    precision: Precision,
    n_references: usize,
}

impl OracleClient {
    /// 创建客户端
    ///
    /// # 参数
    ///
    /// * `oracle` - 预言机
    /// * `references` - 参考嵌入批次，每个批次每行一个嵌入
    /// * `convention` - 评分约定
    pub fn new(
        oracle: Arc<dyn ScoringOracle>,
        references: Vec<Array2<f32>>,
        convention: ScoringConvention,
    ) -> Result<Self> {
        let n_references: usize = references.iter().map(|b| b.nrows()).sum();
        if n_references == 0 {
            bail!("参考嵌入集为空");
        }
        Ok(Self {
            oracle,
            references: Arc::new(references),
            convention,
            precision: Precision::Full,
            n_references,
        })
    }

    /// 切换精度；降精度时参考嵌入只转换一次
    pub fn with_precision(mut self, precision: Precision) -> Self {
        if precision == Precision::Reduced && self.precision != Precision::Reduced {
            let reduced: Vec<Array2<f32>> = self.references.iter().map(|b| b.mapv(round_bf16)).collect();
            self.references = Arc::new(reduced);
        }
        self.precision = precision;
        self
    }

    pub fn convention(&self) -> ScoringConvention {
        self.convention
    }

    pub fn precision(&self) -> Precision {
        self.precision
    }

    pub fn reference_count(&self) -> usize {
        self.n_references
    }

    pub fn is_accelerated(&self) -> bool {
        self.oracle.is_accelerated()
    }

    pub fn release_cache(&self) {
        self.oracle.release_cache();
    }

    /// 批量嵌入候选子图
    pub fn embed(&self, candidates: &[Pattern], anchors: Option<&[NodeId]>) -> Result<Vec<Embedding>> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }
        let mut embs = self.oracle.embed(candidates, anchors)?;
        if embs.len() != candidates.len() {
            bail!("预言机返回 {} 个嵌入，期望 {}", embs.len(), candidates.len());
        }
        if self.precision == Precision::Reduced {
            for emb in embs.iter_mut() {
                emb.mapv_inplace(round_bf16);
            }
        }
        debug!("嵌入 {} 个候选", candidates.len());
        Ok(embs)
    }

    /// 按评分约定计算分数，越低越好
    ///
    /// * `Order`：-(判定为包含候选的参考嵌入数)
    /// * `Mlp`：-(兼容度总和)
    pub fn score(&self, candidate: &Embedding) -> f32 {
        match self.convention {
            ScoringConvention::Order => {
                let contained: usize = self
                    .references
                    .iter()
                    .map(|batch| {
                        self.oracle
                            .predict(batch, candidate)
                            .iter()
                            .filter(|&&p| self.oracle.contains(p))
                            .count()
                    })
                    .sum();
                -(contained as f32)
            }
            ScoringConvention::Mlp => {
                let total: f64 = self
                    .references
                    .iter()
                    .map(|batch| self.oracle.compatibility(batch, candidate).iter().map(|&c| c as f64).sum::<f64>())
                    .sum();
                -(total as f32)
            }
        }
    }

    /// 按参考嵌入数归一化的分数
    pub fn normalized_score(&self, candidate: &Embedding) -> f32 {
        self.score(candidate) / self.n_references.max(1) as f32
    }

    /// 原始违背分数的均值；没有参考嵌入时为 `None`
    pub fn mean_prediction(&self, candidate: &Embedding) -> Option<f32> {
        if self.n_references == 0 {
            return None;
        }
        let total: f64 = self
            .references
            .iter()
            .map(|batch| self.oracle.predict(batch, candidate).iter().map(|&p| p as f64).sum::<f64>())
            .sum();
        Some((total / self.n_references as f64) as f32)
    }
}
