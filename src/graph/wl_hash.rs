// src/graph/wl_hash.rs
// Weisfeiler-Lehman 规范签名
//
// 用于判断两个模式是否“结构相同”。签名只依赖结构、节点标签与锚点位置，
// 与节点编号和插入顺序无关。碰撞是可接受的近似。

use rustc_hash::FxHasher;
use std::hash::{Hash, Hasher};

use super::pattern::Pattern;

/// 规范签名
pub type Signature = u64;

#[inline]
fn fx_hash<T: Hash>(value: &T) -> u64 {
    let mut h = FxHasher::default();
    value.hash(&mut h);
    h.finish()
}

/// 计算模式的 WL 签名
///
/// # 参数
///
/// * `pattern` - 待哈希的模式
/// * `node_anchored` - 是否将锚点标记纳入初始颜色
///
/// # 算法
///
/// 1. 初始颜色 = hash(标签, 锚点标记)
/// 2. 每轮：新颜色 = hash(旧颜色, 排序后的出邻居颜色, 排序后的入邻居颜色)
/// 3. 颜色类数不再增加时停止
/// 4. 将每轮排序后的颜色直方图与节点数、边数一起折叠为签名
pub fn wl_hash(pattern: &Pattern, node_anchored: bool) -> Signature {
    let n = pattern.len();
    let anchors = pattern.anchor_flags();
    let (out, inn) = pattern.local_adjacency();

    let mut colors: Vec<u64> = (0..n)
        .map(|i| fx_hash(&(pattern.labels[i], node_anchored && anchors[i])))
        .collect();

    let mut signature = FxHasher::default();
    (n, pattern.num_edges(), pattern.directed).hash(&mut signature);
    fold_histogram(&colors, &mut signature);

    let mut classes = count_classes(&colors);
    for _ in 0..n {
        let next: Vec<u64> = (0..n)
            .map(|i| {
                let mut out_colors: Vec<u64> = out[i].iter().map(|&j| colors[j]).collect();
                out_colors.sort_unstable();
                if pattern.directed {
                    let mut in_colors: Vec<u64> = inn[i].iter().map(|&j| colors[j]).collect();
                    in_colors.sort_unstable();
                    fx_hash(&(colors[i], out_colors, in_colors))
                } else {
                    fx_hash(&(colors[i], out_colors))
                }
            })
            .collect();

        let next_classes = count_classes(&next);
        colors = next;
        fold_histogram(&colors, &mut signature);
        if next_classes <= classes {
            break;
        }
        classes = next_classes;
    }

    signature.finish()
}

fn fold_histogram(colors: &[u64], hasher: &mut FxHasher) {
    let mut sorted = colors.to_vec();
    sorted.sort_unstable();
    sorted.hash(hasher);
}

fn count_classes(colors: &[u64]) -> usize {
    let mut sorted = colors.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    sorted.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Graph;

    fn path4() -> Graph {
        Graph::undirected(4, &[(0, 1), (1, 2), (2, 3)])
    }

    #[test]
    fn test_invariant_under_node_order() {
        let g = path4();
        let a = Pattern::induce(&g, 0, &[0, 1, 2, 3], None);
        let b = Pattern::induce(&g, 0, &[2, 3, 1, 0], None);
        assert_eq!(wl_hash(&a, false), wl_hash(&b, false));
    }

    #[test]
    fn test_invariant_under_relabeling() {
        // 同构的路径，节点编号完全不同
        let g1 = Graph::undirected(4, &[(0, 1), (1, 2), (2, 3)]);
        let g2 = Graph::undirected(4, &[(3, 0), (0, 2), (2, 1)]);
        let a = Pattern::induce(&g1, 0, &[1, 0, 2, 3], Some(1));
        let b = Pattern::induce(&g2, 1, &[0, 3, 2, 1], Some(0));
        assert_eq!(wl_hash(&a, true), wl_hash(&b, true));
    }

    #[test]
    fn test_path_and_star_differ() {
        let star = Graph::undirected(4, &[(0, 1), (0, 2), (0, 3)]);
        let a = Pattern::induce(&path4(), 0, &[0, 1, 2, 3], None);
        let b = Pattern::induce(&star, 0, &[0, 1, 2, 3], None);
        assert_ne!(wl_hash(&a, false), wl_hash(&b, false));
    }

    #[test]
    fn test_anchor_position_matters_only_when_anchored() {
        let g = path4();
        let end = Pattern::induce(&g, 0, &[0, 1, 2], Some(0));
        let mid = Pattern::induce(&g, 0, &[1, 0, 2], Some(1));
        assert_ne!(wl_hash(&end, true), wl_hash(&mid, true));
        assert_eq!(wl_hash(&end, false), wl_hash(&mid, false));
    }

    #[test]
    fn test_labels_change_signature() {
        let g = path4();
        let labeled = path4().with_labels(vec![0, 5, 0, 0]).unwrap();
        let a = Pattern::induce(&g, 0, &[0, 1, 2], None);
        let b = Pattern::induce(&labeled, 0, &[0, 1, 2], None);
        assert_ne!(wl_hash(&a, false), wl_hash(&b, false));
    }

    #[test]
    fn test_direction_matters() {
        let fwd = Graph::directed(3, &[(0, 1), (1, 2)]);
        let fan = Graph::directed(3, &[(1, 0), (1, 2)]);
        let a = Pattern::induce(&fwd, 0, &[0, 1, 2], None);
        let b = Pattern::induce(&fan, 0, &[0, 1, 2], None);
        assert_ne!(wl_hash(&a, false), wl_hash(&b, false));
    }
}
