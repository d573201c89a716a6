// src/mcts/node.rs
// MCTS 状态、转移统计表与代表模式内存池

use rustc_hash::FxHashMap;
use slab::Slab;

use crate::graph::{NodeId, Pattern, Signature};

// ============================================================================
// 状态与统计
// ============================================================================

/// MCTS 状态
///
/// 种子是独立的状态种类；其余状态是模式的规范签名，
/// 同构的生长轨迹（即使来自不同的图）被合并到同一状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StateKey {
    Seed { graph_index: usize, node: NodeId },
    Pattern(Signature),
}

/// 一条转移（或一个状态出边汇总）的累计统计
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EdgeStats {
    /// 价值总和 (W)
    pub value_sum: f32,
    /// 访问次数 (N)
    pub visits: u32,
}

impl EdgeStats {
    /// Q = W / N；N 为 0 时返回 0.0
    pub fn q_value(&self) -> f32 {
        if self.visits == 0 { 0.0 } else { self.value_sum / self.visits as f32 }
    }
}

/// (状态, 下一状态) -> 统计
///
/// 单调增长，从不剪枝。另外维护每个状态全部出边的汇总，
/// 使 UCT 计算不必遍历出边。
#[derive(Debug, Default)]
pub struct StatsTable {
    edges: FxHashMap<StateKey, FxHashMap<StateKey, EdgeStats>>,
    totals: FxHashMap<StateKey, EdgeStats>,
}

impl StatsTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一次转移：访问 +1，价值 + value
    pub fn record(&mut self, from: StateKey, to: StateKey, value: f32) {
        let edge = self.edges.entry(from).or_default().entry(to).or_insert(EdgeStats::default());
        edge.value_sum += value;
        edge.visits += 1;

        let total = self.totals.entry(from).or_insert(EdgeStats::default());
        total.value_sum += value;
        total.visits += 1;
    }

    /// 某状态所有出边的汇总；未访问过的状态为零
    pub fn totals(&self, state: &StateKey) -> EdgeStats {
        self.totals.get(state).copied().unwrap_or_default()
    }

    pub fn edge(&self, from: &StateKey, to: &StateKey) -> Option<EdgeStats> {
        self.edges.get(from).and_then(|m| m.get(to)).copied()
    }

    /// 转移条数
    pub fn num_transitions(&self) -> usize {
        self.edges.values().map(FxHashMap::len).sum()
    }

    /// 每个目标状态在所有前驱转移上的访问次数之和
    pub fn incoming_visits(&self) -> FxHashMap<StateKey, u64> {
        let mut counts: FxHashMap<StateKey, u64> = FxHashMap::default();
        for targets in self.edges.values() {
            for (to, stats) in targets {
                *counts.entry(*to).or_insert(0) += u64::from(stats.visits);
            }
        }
        counts
    }

    pub fn clear(&mut self) {
        self.edges.clear();
        self.totals.clear();
    }
}

// ============================================================================
// 代表模式内存池 (基于 Slab)
// ============================================================================

/// 规范签名 -> 代表模式
///
/// 每个签名只保留一个代表：排序键 (图下标, 排序后的节点集) 最小者，
/// 因此输出与模拟的先后顺序无关。
#[derive(Debug, Default)]
pub struct PatternArena {
    patterns: Slab<Pattern>,
    index: FxHashMap<Signature, usize>,
}

impl PatternArena {
    pub fn new() -> Self {
        Self { patterns: Slab::with_capacity(1024), index: FxHashMap::default() }
    }

    /// 登记一个模式；已有代表时保留排序键较小者
    pub fn insert(&mut self, signature: Signature, pattern: Pattern) {
        match self.index.get(&signature) {
            Some(&slot) => {
                let current = &mut self.patterns[slot];
                if pattern.key() < current.key() {
                    *current = pattern;
                }
            }
            None => {
                let slot = self.patterns.insert(pattern);
                self.index.insert(signature, slot);
            }
        }
    }

    #[inline]
    pub fn get(&self, signature: &Signature) -> Option<&Pattern> {
        self.index.get(signature).map(|&slot| &self.patterns[slot])
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn clear(&mut self) {
        self.patterns.clear();
        self.index.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Graph;

    #[test]
    fn test_stats_insert_or_update() {
        let mut table = StatsTable::new();
        let seed = StateKey::Seed { graph_index: 0, node: 3 };
        let a = StateKey::Pattern(11);
        let b = StateKey::Pattern(22);

        assert_eq!(table.totals(&seed), EdgeStats::default());
        table.record(seed, a, 0.5);
        table.record(seed, a, 1.5);
        table.record(seed, b, 1.0);
        table.record(a, b, 1.0);

        assert_eq!(table.edge(&seed, &a), Some(EdgeStats { value_sum: 2.0, visits: 2 }));
        assert_eq!(table.totals(&seed).visits, 3);
        assert!((table.totals(&seed).q_value() - 1.0).abs() < 1e-6);
        assert_eq!(table.num_transitions(), 3);

        let incoming = table.incoming_visits();
        assert_eq!(incoming[&a], 2);
        assert_eq!(incoming[&b], 2);
        assert!(!incoming.contains_key(&seed));
    }

    #[test]
    fn test_arena_keeps_smallest_representative() {
        let g = Graph::undirected(4, &[(0, 1), (1, 2), (2, 3)]);
        let mut arena = PatternArena::new();
        arena.insert(7, Pattern::induce(&g, 0, &[2, 3], None));
        arena.insert(7, Pattern::induce(&g, 0, &[1, 0], None));
        arena.insert(7, Pattern::induce(&g, 0, &[2, 1], None));
        assert_eq!(arena.len(), 1);
        assert_eq!(arena.get(&7).unwrap().key().1, vec![0, 1]);
        assert!(arena.get(&8).is_none());
    }
}
