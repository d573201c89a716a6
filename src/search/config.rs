// src/search/config.rs
// 搜索配置与策略选择

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::oracle::ScoringConvention;

/// 排序策略
///
/// 名称无法识别时保留为 `Unrecognized`，在排序阶段记录警告并跳过该尺寸。
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RankMethod {
    /// 按规范哈希桶的成员数排序
    #[default]
    Counts,
    /// 按分数升序，按哈希去重
    Margin,
    /// 最大桶成员少于 3 时用 margin，否则用 counts
    Hybrid,
    Unrecognized(String),
}

impl From<&str> for RankMethod {
    fn from(name: &str) -> Self {
        match name {
            "counts" => Self::Counts,
            "margin" => Self::Margin,
            "hybrid" => Self::Hybrid,
            other => Self::Unrecognized(other.to_string()),
        }
    }
}

impl From<String> for RankMethod {
    fn from(name: String) -> Self {
        Self::from(name.as_str())
    }
}

impl From<RankMethod> for String {
    fn from(method: RankMethod) -> Self {
        method.to_string()
    }
}

impl fmt::Display for RankMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Counts => write!(f, "counts"),
            Self::Margin => write!(f, "margin"),
            Self::Hybrid => write!(f, "hybrid"),
            Self::Unrecognized(name) => write!(f, "{}", name),
        }
    }
}

/// 搜索策略种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Mcts,
    Greedy,
    MemGreedy,
    MemMcts,
    Beam,
}

impl FromStr for StrategyKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "mcts" => Ok(Self::Mcts),
            "greedy" => Ok(Self::Greedy),
            "mem_greedy" => Ok(Self::MemGreedy),
            "mem_mcts" => Ok(Self::MemMcts),
            "beam" => Ok(Self::Beam),
            other => bail!("未知的搜索策略: {}", other),
        }
    }
}

/// 搜索配置参数
///
/// 所有代理共用一份配置，各代理只读取自己关心的字段。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// 最小模式大小（节点数）
    pub min_pattern_size: usize,
    /// 最大模式大小（节点数）
    pub max_pattern_size: usize,
    /// 每个尺寸输出的模式数
    pub out_batch_size: usize,
    /// 是否为锚定模式
    pub node_anchored: bool,
    /// 评分约定
    pub convention: ScoringConvention,
    /// 排序策略（贪心类代理）
    pub rank_method: RankMethod,
    /// UCT 探索常数 (c_uct)
    pub c_uct: f32,
    /// 并行贪心的工作线程数
    pub n_workers: usize,
    /// 并行贪心每个 step 提交的试验数
    pub trials_per_step: usize,
    /// 一次送入预言机的候选数
    pub batch_size: usize,
    /// 内存优化贪心：每个部分状态保留的扩展数
    pub n_beams: usize,
    /// 束搜索宽度
    pub beam_width: usize,
    /// 内存优化 MCTS：模式缓存容量
    pub cache_capacity: usize,
    /// 内存优化 MCTS：邻域流节点上限
    pub stream_node_cap: usize,
    /// 内存优化 MCTS：接受候选的均值阈值
    pub acceptance_threshold: f32,
    /// 预言机在加速硬件上时是否启用降精度
    pub reduced_precision: bool,
    /// 随机种子；`None` 时取系统熵
    pub seed: Option<u64>,
}

impl Default for SearchConfig {
    /// 默认配置
    ///
    /// * pattern size: 5..=20
    /// * out_batch_size: 10
    /// * c_uct: 0.7
    /// * n_workers: 4
    /// * batch_size: 64
    fn default() -> Self {
        Self {
            min_pattern_size: 5,
            max_pattern_size: 20,
            out_batch_size: 10,
            node_anchored: false,
            convention: ScoringConvention::Order,
            rank_method: RankMethod::Counts,
            c_uct: 0.7,
            n_workers: 4,
            trials_per_step: 64,
            batch_size: 64,
            n_beams: 1,
            beam_width: 5,
            cache_capacity: 10_000,
            stream_node_cap: 1000,
            acceptance_threshold: 0.5,
            reduced_precision: true,
            seed: None,
        }
    }
}

impl SearchConfig {
    /// 校验配置，构造代理前调用
    pub fn validate(&self) -> Result<()> {
        if self.min_pattern_size == 0 {
            bail!("min_pattern_size 必须 >= 1");
        }
        if self.min_pattern_size > self.max_pattern_size {
            bail!(
                "min_pattern_size ({}) 大于 max_pattern_size ({})",
                self.min_pattern_size,
                self.max_pattern_size
            );
        }
        if self.beam_width == 0 || self.batch_size == 0 || self.cache_capacity == 0 {
            bail!("beam_width / batch_size / cache_capacity 必须 >= 1");
        }
        if self.trials_per_step == 0 {
            bail!("trials_per_step 必须 >= 1");
        }
        Ok(())
    }

    /// 目标尺寸数 (max - min + 1)
    pub fn size_span(&self) -> usize {
        self.max_pattern_size + 1 - self.min_pattern_size
    }

    /// 尺寸是否在输出范围内
    pub fn in_range(&self, size: usize) -> bool {
        (self.min_pattern_size..=self.max_pattern_size).contains(&size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rank_method_names() {
        assert_eq!(RankMethod::from("hybrid"), RankMethod::Hybrid);
        assert_eq!(RankMethod::from("bogus"), RankMethod::Unrecognized("bogus".into()));
        assert_eq!(RankMethod::Margin.to_string(), "margin");
    }

    #[test]
    fn test_validate() {
        assert!(SearchConfig::default().validate().is_ok());
        let bad = SearchConfig { min_pattern_size: 6, max_pattern_size: 5, ..Default::default() };
        assert!(bad.validate().is_err());
        let zero = SearchConfig { min_pattern_size: 0, ..Default::default() };
        assert!(zero.validate().is_err());
    }

    #[test]
    fn test_deserialize_partial_config() {
        let cfg: SearchConfig =
            serde_json::from_str(r#"{"min_pattern_size": 3, "max_pattern_size": 4, "rank_method": "margin"}"#).unwrap();
        assert_eq!(cfg.size_span(), 2);
        assert_eq!(cfg.rank_method, RankMethod::Margin);
        assert_eq!(cfg.beam_width, 5);
    }

    #[test]
    fn test_strategy_kind_parse() {
        assert_eq!("mem_mcts".parse::<StrategyKind>().unwrap(), StrategyKind::MemMcts);
        assert!("dfs".parse::<StrategyKind>().is_err());
    }
}
