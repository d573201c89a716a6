// src/oracle/structural.rs
// 结构计数预言机：无需神经网络的顺序嵌入参考实现
//
// 嵌入的每一维在“诱导子图”关系下单调不减，因此
// 若 A 是 B 的子图，则逐维 emb(A) <= emb(B)，违背分数为 0。

use anyhow::Result;
use ndarray::{Array1, Array2, Axis};

use super::{Embedding, ScoringOracle};
use crate::graph::{NodeId, Pattern};

/// 结构计数顺序嵌入
///
/// 维度：节点数、边数、度 >= 1..=4 的节点数、三角形数、锚点度
#[derive(Debug, Clone)]
pub struct StructuralOracle {
    /// 违背分数不超过该值即判定为包含
    margin: f32,
}

impl Default for StructuralOracle {
    fn default() -> Self {
        Self { margin: 0.5 }
    }
}

impl StructuralOracle {
    pub const DIM: usize = 8;

    pub fn new(margin: f32) -> Self {
        Self { margin }
    }

    /// 计算单个模式的嵌入
    pub fn embed_one(&self, pattern: &Pattern, anchor: Option<NodeId>) -> Embedding {
        let degrees = pattern.degrees();
        let mut emb = Array1::<f32>::zeros(Self::DIM);
        emb[0] = pattern.len() as f32;
        emb[1] = pattern.num_edges() as f32;
        for (k, slot) in (1..=4).zip(2..6) {
            emb[slot] = degrees.iter().filter(|&&d| d >= k).count() as f32;
        }
        emb[6] = triangles(pattern) as f32;
        if let Some(idx) = anchor.and_then(|a| pattern.nodes.iter().position(|&v| v == a)) {
            emb[7] = degrees[idx] as f32;
        }
        emb
    }
}

/// 无向视角下的三角形数
fn triangles(pattern: &Pattern) -> usize {
    let n = pattern.len();
    let mut adj = vec![vec![false; n]; n];
    for &(i, j) in &pattern.edges {
        adj[i][j] = true;
        adj[j][i] = true;
    }
    let mut count = 0;
    for a in 0..n {
        for b in (a + 1)..n {
            if !adj[a][b] {
                continue;
            }
            for c in (b + 1)..n {
                if adj[a][c] && adj[b][c] {
                    count += 1;
                }
            }
        }
    }
    count
}

impl ScoringOracle for StructuralOracle {
    fn embed(&self, candidates: &[Pattern], anchors: Option<&[NodeId]>) -> Result<Vec<Embedding>> {
        Ok(candidates
            .iter()
            .enumerate()
            .map(|(i, p)| self.embed_one(p, anchors.and_then(|a| a.get(i).copied())))
            .collect())
    }

    fn predict(&self, references: &Array2<f32>, candidate: &Embedding) -> Array1<f32> {
        references.map_axis(Axis(1), |row| {
            row.iter()
                .zip(candidate.iter())
                .map(|(&r, &c)| {
                    let d = (c - r).max(0.0);
                    d * d
                })
                .sum::<f32>()
        })
    }

    fn contains(&self, prediction: f32) -> bool {
        prediction <= self.margin
    }

    fn compatibility(&self, references: &Array2<f32>, candidate: &Embedding) -> Array1<f32> {
        self.predict(references, candidate).mapv(|p| (-p).exp())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Graph;
    use ndarray::stack;

    #[test]
    fn test_embedding_of_triangle() {
        let g = Graph::undirected(3, &[(0, 1), (1, 2), (2, 0)]);
        let p = Pattern::induce(&g, 0, &[0, 1, 2], Some(0));
        let emb = StructuralOracle::default().embed_one(&p, Some(0));
        assert_eq!(emb.to_vec(), vec![3.0, 3.0, 3.0, 3.0, 0.0, 0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_subgraph_has_zero_violation() {
        let g = Graph::undirected(4, &[(0, 1), (1, 2), (2, 0), (2, 3)]);
        let oracle = StructuralOracle::default();
        let small = oracle.embed_one(&Pattern::induce(&g, 0, &[0, 1], None), None);
        let big = oracle.embed_one(&Pattern::induce(&g, 0, &[0, 1, 2, 3], None), None);
        let refs = stack(Axis(0), &[big.view()]).unwrap();

        let forward = oracle.predict(&refs, &small);
        assert_eq!(forward[0], 0.0);
        assert!(oracle.contains(forward[0]));

        let refs_small = stack(Axis(0), &[small.view()]).unwrap();
        let backward = oracle.predict(&refs_small, &big);
        assert!(backward[0] > 0.0);
        assert!(!oracle.contains(backward[0]));
    }
}
