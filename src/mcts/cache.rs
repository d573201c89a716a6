// src/mcts/cache.rs
// 固定容量的 LRU 模式缓存

use rustc_hash::FxHashMap;
use slab::Slab;
use std::collections::BTreeMap;

use crate::graph::{Pattern, Signature};

#[derive(Debug)]
struct CacheSlot {
    signature: Signature,
    pattern: Pattern,
    last_used: u64,
}

/// 规范签名 -> 代表模式的 LRU 缓存
///
/// 槽位存放在 Slab 中；`recency` 按最近使用时间索引槽位，
/// 淘汰时弹出时间最早的一个。`peek` 不更新使用时间。
#[derive(Debug)]
pub struct PatternCache {
    capacity: usize,
    slots: Slab<CacheSlot>,
    index: FxHashMap<Signature, usize>,
    recency: BTreeMap<u64, usize>,
    tick: u64,
    evictions: u64,
}

impl PatternCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            slots: Slab::with_capacity(capacity.min(4096)),
            index: FxHashMap::default(),
            recency: BTreeMap::new(),
            tick: 0,
            evictions: 0,
        }
    }

    fn touch(&mut self, slot: usize) {
        self.tick += 1;
        let entry = &mut self.slots[slot];
        self.recency.remove(&entry.last_used);
        entry.last_used = self.tick;
        self.recency.insert(self.tick, slot);
    }

    /// 插入或刷新；已存在时保留排序键较小的代表
    pub fn insert(&mut self, signature: Signature, pattern: Pattern) {
        if let Some(&slot) = self.index.get(&signature) {
            if pattern.key() < self.slots[slot].pattern.key() {
                self.slots[slot].pattern = pattern;
            }
            self.touch(slot);
            return;
        }

        if self.slots.len() >= self.capacity {
            self.evict_oldest();
        }
        self.tick += 1;
        let slot = self.slots.insert(CacheSlot { signature, pattern, last_used: self.tick });
        self.index.insert(signature, slot);
        self.recency.insert(self.tick, slot);
    }

    fn evict_oldest(&mut self) {
        if let Some((_, slot)) = self.recency.pop_first() {
            let evicted = self.slots.remove(slot);
            self.index.remove(&evicted.signature);
            self.evictions += 1;
        }
    }

    /// 读取并标记为最近使用
    pub fn get(&mut self, signature: &Signature) -> Option<&Pattern> {
        let slot = *self.index.get(signature)?;
        self.touch(slot);
        Some(&self.slots[slot].pattern)
    }

    /// 只读查看，不影响淘汰顺序
    pub fn peek(&self, signature: &Signature) -> Option<&Pattern> {
        self.index.get(signature).map(|&slot| &self.slots[slot].pattern)
    }

    pub fn contains(&self, signature: &Signature) -> bool {
        self.index.contains_key(signature)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 累计淘汰次数
    pub fn evictions(&self) -> u64 {
        self.evictions
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.index.clear();
        self.recency.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Graph;

    fn pattern(nodes: &[usize]) -> Pattern {
        let g = Graph::undirected(6, &[(0, 1), (1, 2), (2, 3), (3, 4), (4, 5)]);
        Pattern::induce(&g, 0, nodes, None)
    }

    #[test]
    fn test_evicts_least_recently_used() {
        let mut cache = PatternCache::new(2);
        cache.insert(1, pattern(&[0, 1]));
        cache.insert(2, pattern(&[1, 2]));
        // 访问 1，使 2 成为最久未用
        assert!(cache.get(&1).is_some());
        cache.insert(3, pattern(&[2, 3]));

        assert_eq!(cache.len(), 2);
        assert!(cache.contains(&1));
        assert!(!cache.contains(&2));
        assert!(cache.contains(&3));
        assert_eq!(cache.evictions(), 1);
    }

    #[test]
    fn test_peek_does_not_refresh() {
        let mut cache = PatternCache::new(2);
        cache.insert(1, pattern(&[0, 1]));
        cache.insert(2, pattern(&[1, 2]));
        assert!(cache.peek(&1).is_some());
        cache.insert(3, pattern(&[2, 3]));
        assert!(!cache.contains(&1));
    }

    #[test]
    fn test_reinsert_refreshes_and_keeps_smallest() {
        let mut cache = PatternCache::new(2);
        cache.insert(1, pattern(&[3, 4]));
        cache.insert(2, pattern(&[1, 2]));
        cache.insert(1, pattern(&[0, 1]));
        cache.insert(3, pattern(&[4, 5]));
        assert_eq!(cache.peek(&1).unwrap().key().1, vec![0, 1]);
        assert!(!cache.contains(&2));
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let mut cache = PatternCache::new(0);
        cache.insert(1, pattern(&[0]));
        cache.insert(2, pattern(&[1]));
        assert_eq!(cache.capacity(), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.contains(&2));
    }
}
