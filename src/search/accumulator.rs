// src/search/accumulator.rs
// 候选模式累加器与排序策略
//
// 两张稀疏表：
// - candidates: 尺寸 -> [(分数, 签名, 模式)]，供 margin 排序
// - buckets:    尺寸 -> 签名 -> [模式]，供 counts 排序
//
// 合并是按 尺寸 -> 签名 -> 追加 的结合操作；排序结果只依赖表的内容，
// 与追加顺序无关。

use log::{info, warn};
use rustc_hash::{FxHashMap, FxHashSet};
use std::cmp::{Ordering, Reverse};
use std::collections::BTreeMap;

use super::agent::RankedPatterns;
use super::config::{RankMethod, SearchConfig};
use crate::graph::{Pattern, Signature};

/// hybrid 策略切换到 counts 所需的最大桶成员数
const HYBRID_MIN_BUCKET: usize = 3;

/// 带分数与签名的候选
#[derive(Debug, Clone)]
pub struct ScoredPattern {
    /// 越低越好
    pub score: f32,
    pub signature: Signature,
    pub pattern: Pattern,
}

/// 每个尺寸的候选与哈希桶
#[derive(Debug, Clone, Default)]
pub struct PatternAccumulator {
    candidates: BTreeMap<usize, Vec<ScoredPattern>>,
    buckets: BTreeMap<usize, FxHashMap<Signature, Vec<Pattern>>>,
}

impl PatternAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一个候选（同时进入候选表和哈希桶）
    pub fn record(&mut self, pattern: Pattern, score: f32, signature: Signature) {
        let size = pattern.len();
        self.buckets
            .entry(size)
            .or_insert_with(FxHashMap::default)
            .entry(signature)
            .or_insert_with(Vec::new)
            .push(pattern.clone());
        self.candidates
            .entry(size)
            .or_insert_with(Vec::new)
            .push(ScoredPattern { score, signature, pattern });
    }

    /// 合并另一个累加器（追加，不去重）
    pub fn merge(&mut self, other: PatternAccumulator) {
        for (size, scored) in other.candidates {
            self.candidates.entry(size).or_insert_with(Vec::new).extend(scored);
        }
        for (size, buckets) in other.buckets {
            let mine = self.buckets.entry(size).or_insert_with(FxHashMap::default);
            for (signature, patterns) in buckets {
                mine.entry(signature).or_insert_with(Vec::new).extend(patterns);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty() && self.buckets.is_empty()
    }

    /// 所有尺寸的候选总数
    pub fn total_candidates(&self) -> usize {
        self.candidates.values().map(Vec::len).sum()
    }

    /// 某尺寸的不同签名数
    pub fn distinct_signatures(&self, size: usize) -> usize {
        self.buckets.get(&size).map_or(0, FxHashMap::len)
    }

    /// 某尺寸最大哈希桶的成员数
    pub fn largest_bucket(&self, size: usize) -> usize {
        self.buckets
            .get(&size)
            .and_then(|b| b.values().map(Vec::len).max())
            .unwrap_or(0)
    }

    /// 按给定策略对 `[min, max]` 中每个尺寸排序
    ///
    /// 纯函数：不修改累加器，也不消耗随机数，重复调用结果相同。
    /// 无法识别的策略记录警告，该尺寸输出为空。
    pub fn rank(&self, method: &RankMethod, config: &SearchConfig) -> RankedPatterns {
        let mut ranked = RankedPatterns::new();
        for size in config.min_pattern_size..=config.max_pattern_size {
            let method = match method {
                RankMethod::Hybrid => {
                    if self.largest_bucket(size) < HYBRID_MIN_BUCKET {
                        RankMethod::Margin
                    } else {
                        RankMethod::Counts
                    }
                }
                other => other.clone(),
            };
            info!("尺寸 {} 使用排序策略 '{}'", size, method);

            let patterns = match method {
                RankMethod::Counts | RankMethod::Hybrid => self.rank_counts(size, config.out_batch_size),
                RankMethod::Margin => self.rank_margin(size, config.out_batch_size),
                RankMethod::Unrecognized(ref name) => {
                    warn!("无法识别的排序策略 '{}'，跳过尺寸 {}", name, size);
                    Vec::new()
                }
            };
            ranked.insert(size, patterns);
        }
        ranked
    }

    /// counts：按桶成员数降序，每个桶输出一个代表元
    pub fn rank_counts(&self, size: usize, limit: usize) -> Vec<Pattern> {
        let Some(buckets) = self.buckets.get(&size) else {
            return Vec::new();
        };
        let entries = buckets.iter().filter_map(|(&signature, patterns)| {
            representative(patterns).map(|p| (patterns.len() as u64, signature, p.clone()))
        });
        select_most_frequent(entries, limit)
    }

    /// margin：按分数升序，按签名去重（先出现者即分数最好者胜出）
    pub fn rank_margin(&self, size: usize, limit: usize) -> Vec<Pattern> {
        let Some(cands) = self.candidates.get(&size) else {
            return Vec::new();
        };
        let mut order: Vec<&ScoredPattern> = cands.iter().collect();
        order.sort_by(|a, b| {
            cmp_score(a.score, b.score)
                .then_with(|| a.pattern.key().cmp(&b.pattern.key()))
                .then_with(|| a.signature.cmp(&b.signature))
        });

        let mut seen = FxHashSet::default();
        let mut out = Vec::new();
        for cand in order {
            if out.len() >= limit {
                break;
            }
            if seen.insert(cand.signature) {
                out.push(cand.pattern.clone());
            }
        }
        out
    }
}

/// 桶的确定性代表元：排序键最小的模式
pub fn representative(patterns: &[Pattern]) -> Option<&Pattern> {
    patterns.iter().min_by(|a, b| a.key().cmp(&b.key()))
}

/// 按计数降序取前 `limit` 个
///
/// 计数相同时按代表元排序键、再按签名升序，结果与输入顺序无关。
pub fn select_most_frequent(
    entries: impl IntoIterator<Item = (u64, Signature, Pattern)>,
    limit: usize,
) -> Vec<Pattern> {
    let mut entries: Vec<(u64, Signature, Pattern)> = entries.into_iter().collect();
    entries.sort_by(|a, b| {
        Reverse(a.0)
            .cmp(&Reverse(b.0))
            .then_with(|| a.2.key().cmp(&b.2.key()))
            .then_with(|| a.1.cmp(&b.1))
    });
    entries.truncate(limit);
    entries.into_iter().map(|(_, _, p)| p).collect()
}

/// 浮点分数的全序比较（NaN 视为最差）
#[inline]
pub fn cmp_score(a: f32, b: f32) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        _ => a.total_cmp(&b),
    }
}
