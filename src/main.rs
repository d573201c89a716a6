// src/main.rs
// 子图模式挖掘演示程序
//
// 流程:
// 1. 读取配置: MINER_CONFIG 指向的 JSON 文件，环境变量覆盖策略/模拟次数/输出路径
// 2. 加载数据集: 第一个命令行参数为 JSON 数据集路径，缺省时合成环与星形图
// 3. 采样参考邻域并用预言机嵌入，得到参考嵌入集
// 4. 运行所选搜索策略，把排序结果写成 JSON

use anyhow::{Context, Result};
use log::{info, warn};
use ndarray::{Array2, Axis, stack};
use rand::Rng;
use rand::distributions::{Distribution, WeightedIndex};
use std::env;
use std::fs::{self, File};
use std::io::BufWriter;
use std::sync::Arc;
use std::time::Instant;

use subgraph_miner::graph::{Dataset, Graph, NeighborhoodStream, Pattern};
use subgraph_miner::oracle::{Embedding, OracleClient, ScoringOracle, StructuralOracle};
use subgraph_miner::search::{SearchAgent, SearchConfig, SearchStrategy, StrategyKind, make_rng};

/// 参考邻域总数
const N_REFERENCES: usize = 256;
/// 每个参考嵌入批次的行数
const REFERENCE_BATCH: usize = 64;

// ================ 程序入口 ================

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run() {
        eprintln!("挖掘失败: {:#}", e);
        std::process::exit(1);
    }
    Ok(())
}

// ================ 主流程 ================

fn run() -> Result<()> {
    // --- 1. 配置 ---
    let mut config = match env::var("MINER_CONFIG") {
        Ok(path) => {
            let raw = fs::read_to_string(&path).with_context(|| format!("无法读取配置文件 {}", path))?;
            serde_json::from_str::<SearchConfig>(&raw).with_context(|| format!("配置文件格式错误 {}", path))?
        }
        Err(_) => SearchConfig::default(),
    };
    let strategy: StrategyKind = env::var("MINER_STRATEGY").as_deref().unwrap_or("greedy").parse()?;
    let n_trials: usize = match env::var("MINER_TRIALS") {
        Ok(raw) => raw.parse().with_context(|| format!("MINER_TRIALS 不是整数: {}", raw))?,
        Err(_) => 1000,
    };
    let out_path = env::var("MINER_OUT").unwrap_or_else(|_| "patterns.json".to_string());

    // --- 2. 数据集 ---
    let args: Vec<String> = env::args().collect();
    let dataset = if args.len() > 1 {
        info!("正在加载数据集: {}", args[1]);
        Dataset::load_json(&args[1])?
    } else {
        warn!("未指定数据集，使用合成的环与星形图");
        config.max_pattern_size = config.max_pattern_size.min(8);
        config.min_pattern_size = config.min_pattern_size.min(config.max_pattern_size);
        synthetic_dataset()
    };
    let dataset = Arc::new(dataset);

    println!("\n=== 子图模式挖掘配置 ===");
    println!("策略: {:?}", strategy);
    println!("模拟次数: {}", n_trials);
    println!("图数量: {} (节点总数 {})", dataset.len(), dataset.total_nodes());
    println!("模式尺寸: {}..={}", config.min_pattern_size, config.max_pattern_size);
    println!("锚定: {}, 排序: {}, 评分约定: {}", config.node_anchored, config.rank_method, config.convention);

    // --- 3. 参考嵌入 ---
    let oracle: Arc<dyn ScoringOracle> = Arc::new(StructuralOracle::default());
    let references = sample_references(&dataset, oracle.as_ref(), &config)?;
    let client = OracleClient::new(oracle, references, config.convention)?;
    info!("参考嵌入: {} 个", client.reference_count());

    // --- 4. 搜索 ---
    let start = Instant::now();
    let mut agent = SearchStrategy::new(strategy, Arc::clone(&dataset), client, config)?;
    let ranked = agent.run_search(n_trials)?;
    info!("搜索完成，耗时 {:.2}s", start.elapsed().as_secs_f64());

    for (size, patterns) in &ranked {
        println!("尺寸 {}: {} 个模式", size, patterns.len());
    }

    // --- 5. 输出 ---
    let file = File::create(&out_path).with_context(|| format!("无法创建输出文件 {}", out_path))?;
    serde_json::to_writer_pretty(BufWriter::new(file), &ranked)?;
    println!("结果已写入 {}", out_path);
    Ok(())
}

// ================ 参考邻域采样 ================

/// 按节点数加权采样图与节点，取 BFS 邻域诱导子图并嵌入
fn sample_references(dataset: &Dataset, oracle: &dyn ScoringOracle, config: &SearchConfig) -> Result<Vec<Array2<f32>>> {
    let mut rng = make_rng(config.seed);
    let weights: Vec<usize> = dataset.iter().map(Graph::num_nodes).collect();
    let dist = WeightedIndex::new(&weights).context("数据集中没有可采样的节点")?;
    let radius_nodes = config.max_pattern_size.max(1);

    let mut batches = Vec::new();
    let mut remaining = N_REFERENCES;
    while remaining > 0 {
        let batch_len = remaining.min(REFERENCE_BATCH);
        let mut neighborhoods: Vec<Pattern> = Vec::with_capacity(batch_len);
        let mut anchors = Vec::with_capacity(batch_len);
        for _ in 0..batch_len {
            let graph_index = dist.sample(&mut rng);
            let graph = &dataset[graph_index];
            let node = rng.gen_range(0..graph.num_nodes());
            let mut nodes = vec![node];
            nodes.extend(NeighborhoodStream::new(graph, node, radius_nodes));
            let anchor = config.node_anchored.then_some(node);
            neighborhoods.push(Pattern::induce(graph, graph_index, &nodes, anchor));
            anchors.push(node);
        }

        let anchors = config.node_anchored.then_some(anchors.as_slice());
        let embs: Vec<Embedding> = oracle.embed(&neighborhoods, anchors)?;
        let views: Vec<_> = embs.iter().map(|e| e.view()).collect();
        batches.push(stack(Axis(0), &views).context("参考嵌入维度不一致")?);
        remaining -= batch_len;
    }
    Ok(batches)
}

/// 合成数据集：若干环与星形图
fn synthetic_dataset() -> Dataset {
    let mut graphs = Vec::new();
    for n in [8usize, 10, 12] {
        let edges: Vec<(usize, usize)> = (0..n).map(|i| (i, (i + 1) % n)).collect();
        graphs.push(Graph::undirected(n, &edges));
    }
    for leaves in [5usize, 7] {
        let edges: Vec<(usize, usize)> = (1..=leaves).map(|l| (0, l)).collect();
        graphs.push(Graph::undirected(leaves + 1, &edges));
    }
    Dataset::new(graphs)
}
