//! 端到端搜索场景：环、星形图、输出上限、确定性与排序幂等。

use anyhow::Result;
use ndarray::{Array1, Array2, array};
use std::sync::Arc;

use subgraph_miner::graph::{Dataset, Graph, NodeId, Pattern};
use subgraph_miner::oracle::{Embedding, OracleClient, ScoringConvention, ScoringOracle};
use subgraph_miner::search::{RankMethod, RankedPatterns, SearchAgent, SearchConfig, SearchStrategy, StrategyKind};

// =============================================================================
// 测试夹具
// =============================================================================

/// 对任何候选都给出相同分数的预言机
struct ConstantOracle;

impl ScoringOracle for ConstantOracle {
    fn embed(&self, candidates: &[Pattern], _anchors: Option<&[NodeId]>) -> Result<Vec<Embedding>> {
        Ok(candidates.iter().map(|_| array![1.0, 1.0]).collect())
    }

    fn predict(&self, references: &Array2<f32>, _candidate: &Embedding) -> Array1<f32> {
        Array1::from_elem(references.nrows(), 1.0)
    }

    fn contains(&self, prediction: f32) -> bool {
        prediction <= 0.5
    }
}

fn constant_oracle() -> OracleClient {
    OracleClient::new(Arc::new(ConstantOracle), vec![array![[1.0, 1.0], [1.0, 1.0]]], ScoringConvention::Order)
        .unwrap()
}

fn ring(n: usize) -> Graph {
    let edges: Vec<(NodeId, NodeId)> = (0..n).map(|i| (i, (i + 1) % n)).collect();
    Graph::undirected(n, &edges)
}

fn star(leaves: usize) -> Graph {
    let edges: Vec<(NodeId, NodeId)> = (1..=leaves).map(|l| (0, l)).collect();
    Graph::undirected(leaves + 1, &edges)
}

fn ring_config() -> SearchConfig {
    SearchConfig {
        min_pattern_size: 3,
        max_pattern_size: 5,
        out_batch_size: 2,
        node_anchored: true,
        rank_method: RankMethod::Counts,
        n_workers: 1,
        trials_per_step: 20,
        seed: Some(7),
        ..Default::default()
    }
}

fn run(kind: StrategyKind, graph: Graph, config: SearchConfig, n_trials: usize) -> RankedPatterns {
    let dataset = Arc::new(Dataset::new(vec![graph]));
    let mut agent = SearchStrategy::new(kind, dataset, constant_oracle(), config).unwrap();
    agent.run_search(n_trials).unwrap()
}

const ALL_STRATEGIES: [StrategyKind; 5] = [
    StrategyKind::Mcts,
    StrategyKind::Greedy,
    StrategyKind::MemGreedy,
    StrategyKind::MemMcts,
    StrategyKind::Beam,
];

// =============================================================================
// 场景
// =============================================================================

/// 10 节点环上的锚定路径：每个尺寸至少出现“锚点在端点”和“锚点在内部”两类，
/// out_batch_size = 2 时每个尺寸恰好输出两个不同的连通弧
#[test]
fn scenario_ring_emits_two_arcs_per_size() {
    let ranked = run(StrategyKind::Greedy, ring(10), ring_config(), 200);

    assert_eq!(ranked.keys().copied().collect::<Vec<_>>(), vec![3, 4, 5]);
    for (size, patterns) in &ranked {
        assert_eq!(patterns.len(), 2, "尺寸 {} 应输出两个模式", size);
        for p in patterns {
            assert_eq!(p.len(), *size);
            assert!(p.is_weakly_connected());
            // 环上 k < n 个节点的连通诱导子图是一条路径
            assert_eq!(p.num_edges(), size - 1);
        }
        assert_ne!(
            subgraph_miner::wl_hash(&patterns[0], true),
            subgraph_miner::wl_hash(&patterns[1], true),
            "同一尺寸的两个输出不应同构"
        );
    }
}

/// 无向星形图：种子可以是叶子，但所有尺寸不小于 2 的连通模式都包含中心
#[test]
fn star_patterns_all_contain_center() {
    let config = SearchConfig {
        min_pattern_size: 2,
        max_pattern_size: 4,
        out_batch_size: 5,
        node_anchored: true,
        n_workers: 1,
        seed: Some(11),
        ..Default::default()
    };
    let ranked = run(StrategyKind::Greedy, star(5), config, 60);

    for (size, patterns) in &ranked {
        assert!(!patterns.is_empty(), "尺寸 {} 不应为空", size);
        for p in patterns {
            assert_eq!(p.len(), *size);
            assert!(p.contains(0), "模式 {:?} 不含中心", p.nodes);
            assert_eq!(p.num_edges(), size - 1);
            assert_eq!(p.anchor, p.seed());
        }
    }
}

fn directed_star(leaves: usize) -> Graph {
    let edges: Vec<(NodeId, NodeId)> = (1..=leaves).map(|l| (0, l)).collect();
    Graph::directed(leaves + 1, &edges)
}

fn center_config() -> SearchConfig {
    SearchConfig {
        min_pattern_size: 2,
        max_pattern_size: 4,
        out_batch_size: 3,
        node_anchored: true,
        n_workers: 1,
        seed: Some(3),
        ..Default::default()
    }
}

/// 锚定在中心：有向星形图的叶子没有出边，只有中心能作为种子长到 2 个节点，
/// 因此每个输出模式都以中心为锚点
#[test]
fn scenario_star_anchored_at_center() {
    let ranked = run(StrategyKind::Mcts, directed_star(5), center_config(), 30);

    for (size, patterns) in &ranked {
        assert!(!patterns.is_empty(), "尺寸 {} 不应为空", size);
        for p in patterns {
            assert_eq!(p.anchor, Some(0));
            assert_eq!(p.seed(), Some(0));
            assert_eq!(p.num_edges(), size - 1);
        }
    }
}

#[test]
fn every_strategy_anchors_star_patterns_at_center() {
    for kind in ALL_STRATEGIES {
        let ranked = run(kind, directed_star(5), center_config(), 30);
        let emitted: Vec<&Pattern> = ranked.values().flatten().collect();
        assert!(!emitted.is_empty(), "{:?} 没有输出任何模式", kind);
        for p in emitted {
            assert_eq!(p.anchor, Some(0), "{:?}", kind);
            assert_eq!(p.nodes[0], 0, "{:?}", kind);
            assert_eq!(p.num_edges(), p.len() - 1, "{:?}", kind);
        }
    }
}

/// out_batch_size = 0：每个尺寸都有键且为空，不报错
#[test]
fn scenario_zero_out_batch_yields_empty_sizes() {
    for kind in ALL_STRATEGIES {
        let config = SearchConfig { out_batch_size: 0, ..ring_config() };
        let ranked = run(kind, ring(10), config, 30);
        assert_eq!(ranked.len(), 3, "{:?}", kind);
        assert!(ranked.values().all(Vec::is_empty), "{:?}", kind);
    }
}

// =============================================================================
// 所有策略共有的性质
// =============================================================================

#[test]
fn every_strategy_respects_size_bounds_and_anchor() {
    for kind in ALL_STRATEGIES {
        let ranked = run(kind, ring(10), ring_config(), 60);
        assert!(ranked.keys().all(|&s| (3..=5).contains(&s)), "{:?}", kind);
        let emitted: usize = ranked.values().map(Vec::len).sum();
        assert!(emitted > 0, "{:?} 没有输出任何模式", kind);
        for (size, patterns) in &ranked {
            assert!(patterns.len() <= 2, "{:?}", kind);
            for p in patterns {
                assert_eq!(p.len(), *size, "{:?}", kind);
                assert!(p.is_weakly_connected(), "{:?}", kind);
                assert!(p.anchor.is_some(), "{:?}", kind);
                assert_eq!(p.anchor, p.seed(), "{:?}", kind);
            }
        }
    }
}

#[test]
fn unanchored_patterns_carry_no_anchor() {
    for kind in ALL_STRATEGIES {
        let config = SearchConfig { node_anchored: false, ..ring_config() };
        let ranked = run(kind, ring(10), config, 60);
        assert!(ranked.values().flatten().all(|p| p.anchor.is_none()), "{:?}", kind);
    }
}

#[test]
fn seeded_greedy_is_deterministic() {
    let a = run(StrategyKind::Greedy, ring(10), ring_config(), 80);
    let b = run(StrategyKind::Greedy, ring(10), ring_config(), 80);
    assert_eq!(a, b);
}

/// 并行与串行执行同一批试验，合并结果的排序相同
#[test]
fn parallel_greedy_matches_serial() {
    let serial = run(StrategyKind::Greedy, ring(10), ring_config(), 80);
    let parallel = run(StrategyKind::Greedy, ring(10), SearchConfig { n_workers: 4, ..ring_config() }, 80);
    assert_eq!(serial, parallel);
}

#[test]
fn rank_is_idempotent() {
    for kind in ALL_STRATEGIES {
        let dataset = Arc::new(Dataset::new(vec![ring(10)]));
        let mut agent = SearchStrategy::new(kind, dataset, constant_oracle(), ring_config()).unwrap();
        agent.init_search(40).unwrap();
        while !agent.is_search_done() {
            agent.step().unwrap();
        }
        let first = agent.rank();
        assert_eq!(first, agent.rank(), "{:?}", kind);
        assert_eq!(first, agent.finish_search(), "{:?}", kind);
    }
}

#[test]
fn unknown_rank_method_skips_every_size() {
    let config = SearchConfig { rank_method: RankMethod::from("frequency"), ..ring_config() };
    let ranked = run(StrategyKind::Greedy, ring(10), config, 40);
    assert_eq!(ranked.len(), 3);
    assert!(ranked.values().all(Vec::is_empty));
}

#[test]
fn invalid_config_is_rejected() {
    let dataset = Arc::new(Dataset::new(vec![ring(10)]));
    let config = SearchConfig { min_pattern_size: 6, max_pattern_size: 4, ..Default::default() };
    assert!(SearchStrategy::new(StrategyKind::Greedy, dataset, constant_oracle(), config).is_err());
}
