// src/search/pool.rs
// 贪心试验的固定工作线程池
//
// 架构:
// - 每个工作线程在启动时拿到同一个 Arc<WorkerContext>（数据集、预言机、配置），
//   之后只读使用，不再传输。
// - 协调者按轮转把试验编号发给各线程的任务通道。
// - 结果经共享的 mpsc 通道按完成顺序返回，协调者逐个合并。

use anyhow::{Result, anyhow};
use log::{debug, info, warn};
use std::any::Any;
use std::ops::Range;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, mpsc};
use std::thread::{self, JoinHandle};

use super::accumulator::PatternAccumulator;
use super::config::SearchConfig;
use super::greedy::run_greedy_trial;
use super::sampling::GraphSampler;
use crate::graph::Dataset;
use crate::oracle::OracleClient;

/// 工作线程的只读上下文
pub struct WorkerContext {
    pub dataset: Arc<Dataset>,
    pub oracle: OracleClient,
    pub config: SearchConfig,
    pub sampler: GraphSampler,
}

impl WorkerContext {
    pub fn new(dataset: Arc<Dataset>, oracle: OracleClient, config: SearchConfig) -> Result<Self> {
        let sampler = GraphSampler::new(&dataset)?;
        Ok(Self { dataset, oracle, config, sampler })
    }
}

type TrialResult = (usize, Result<PatternAccumulator>);

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "未知 panic".to_string()
    }
}

/// 固定大小的工作线程池
pub struct WorkerPool {
    job_txs: Vec<mpsc::Sender<usize>>,
    result_rx: mpsc::Receiver<TrialResult>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// 启动 `n_workers` 个线程，上下文只交付一次
    pub fn new(n_workers: usize, context: Arc<WorkerContext>) -> Self {
        let n_workers = n_workers.max(1);
        let (result_tx, result_rx) = mpsc::channel();
        let mut job_txs = Vec::with_capacity(n_workers);
        let mut handles = Vec::with_capacity(n_workers);

        for worker_id in 0..n_workers {
            let (job_tx, job_rx) = mpsc::channel::<usize>();
            let ctx = Arc::clone(&context);
            let result_tx = result_tx.clone();

            let handle = thread::spawn(move || {
                debug!("[Worker-{}] 初始化完成", worker_id);
                for trial_idx in job_rx {
                    // panic 转成错误回传，协调者不会空等丢失的结果
                    let result = panic::catch_unwind(AssertUnwindSafe(|| run_greedy_trial(&ctx, trial_idx)))
                        .unwrap_or_else(|payload| {
                            Err(anyhow!("[Worker-{}] 试验 {} panic: {}", worker_id, trial_idx, panic_message(&*payload)))
                        });
                    if result_tx.send((trial_idx, result)).is_err() {
                        break;
                    }
                }
                debug!("[Worker-{}] 退出", worker_id);
            });

            job_txs.push(job_tx);
            handles.push(handle);
        }
        info!("启动 {} 个工作线程", n_workers);

        Self { job_txs, result_rx, handles }
    }

    pub fn size(&self) -> usize {
        self.job_txs.len()
    }

    /// 执行一批试验并按完成顺序合并
    ///
    /// 任一试验失败时仍会收齐本批所有结果，再返回第一个错误。
    pub fn run_batch(&self, trials: Range<usize>) -> Result<PatternAccumulator> {
        let expected = trials.len();
        for trial_idx in trials {
            let worker = trial_idx % self.job_txs.len();
            self.job_txs[worker]
                .send(trial_idx)
                .map_err(|_| anyhow!("工作线程 {} 已退出", worker))?;
        }

        let mut merged = PatternAccumulator::new();
        let mut first_error = None;
        for _ in 0..expected {
            let (trial_idx, result) = self
                .result_rx
                .recv()
                .map_err(|_| anyhow!("所有工作线程已退出"))?;
            match result {
                Ok(acc) => merged.merge(acc),
                Err(e) => {
                    warn!("试验 {} 失败: {:#}", trial_idx, e);
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(merged),
        }
    }

    /// 关闭任务通道并等待所有线程退出
    pub fn shutdown(&mut self) {
        self.job_txs.clear();
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                warn!("工作线程异常退出");
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Graph, NodeId, Pattern};
    use crate::oracle::{Embedding, ScoringConvention, ScoringOracle};
    use ndarray::{Array1, Array2, array};
    use std::sync::atomic::{AtomicBool, Ordering};

    /// 第一次 embed 调用 panic，之后正常
    struct FlakyOracle {
        tripped: AtomicBool,
    }

    impl ScoringOracle for FlakyOracle {
        fn embed(&self, candidates: &[Pattern], _anchors: Option<&[NodeId]>) -> Result<Vec<Embedding>> {
            if !self.tripped.swap(true, Ordering::SeqCst) {
                panic!("嵌入模型崩溃");
            }
            Ok(candidates.iter().map(|_| array![0.0]).collect())
        }

        fn predict(&self, references: &Array2<f32>, _candidate: &Embedding) -> Array1<f32> {
            Array1::zeros(references.nrows())
        }

        fn contains(&self, prediction: f32) -> bool {
            prediction <= 0.5
        }
    }

    fn context() -> Arc<WorkerContext> {
        let g = Graph::undirected(6, &[(0, 1), (1, 2), (2, 3), (3, 4), (4, 5), (5, 0)]);
        let dataset = Arc::new(Dataset::new(vec![g]));
        let oracle = OracleClient::new(
            Arc::new(FlakyOracle { tripped: AtomicBool::new(false) }),
            vec![array![[0.0]]],
            ScoringConvention::Order,
        )
        .unwrap();
        let config = SearchConfig { min_pattern_size: 2, max_pattern_size: 3, seed: Some(1), ..Default::default() };
        Arc::new(WorkerContext::new(dataset, oracle, config).unwrap())
    }

    #[test]
    fn test_panicking_trial_fails_the_batch() {
        let pool = WorkerPool::new(4, context());
        let err = pool.run_batch(0..64).unwrap_err();
        assert!(format!("{:#}", err).contains("panic"));

        // 工作线程仍然存活，下一批正常完成
        let acc = pool.run_batch(64..80).unwrap();
        assert!(!acc.is_empty());
    }

    #[test]
    fn test_batch_merges_every_trial() {
        let ctx = context();
        // 先消耗掉 panic
        let _ = panic::catch_unwind(AssertUnwindSafe(|| run_greedy_trial(&ctx, 0)));
        let pool = WorkerPool::new(3, Arc::clone(&ctx));
        let acc = pool.run_batch(0..12).unwrap();
        assert_eq!(acc.total_candidates(), 12 * 2);
    }
}
