use log::{debug, info};
use ndarray::prelude::*;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::error::{ClusterError, Result};
use crate::kmeans::{KMeansParams, LloydState, check_samples, imbalance_factor, kmeans_lloyd, sq_dist};
use crate::model::Clusterer;

/// 二分树上的一个节点
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct BisectNode {
    /// 用于路由的聚类中心
    center: Array1<f64>,
    /// 左右子节点，叶子节点为 None
    children: Option<[usize; 2]>,
    /// 叶子节点的聚类标签
    label: Option<usize>,
}

/// 二分 KMeans 模型
///
/// 从包含全部向量的单个聚类开始，每次选取距离和最大的叶子用 2-means 一分为二，
/// 直到叶子数量达到 k。预测时从根节点开始，每层选择更近的子节点。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BisectingKMeansModel {
    nodes: Vec<BisectNode>,
    n_clusters: usize,
    n_features: usize,
    inertia: f64,
}

impl BisectingKMeansModel {
    pub fn fit(x: ArrayView2<f64>, k: usize, params: &KMeansParams) -> Result<Self> {
        let n = x.nrows();
        check_samples(n, k)?;

        let mut rng = StdRng::seed_from_u64(params.seed);
        let root = x.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(x.ncols()));

        let mut nodes = vec![BisectNode { center: root, children: None, label: None }];
        // 训练过程中每个节点包含的向量和距离和，不需要保存
        let mut members: Vec<Vec<usize>> = vec![(0..n).collect()];
        let mut sse = vec![node_sse(x, &members[0], nodes[0].center.view())];
        // 保持从左到右的顺序，叶子的标签即其在此列表中的位置
        let mut leaves = vec![0];

        while leaves.len() < k {
            let pos = leaves
                .iter()
                .enumerate()
                .filter(|(_, id)| members[**id].len() >= 2)
                .max_by(|(_, a), (_, b)| sse[**a].total_cmp(&sse[**b]))
                .map(|(pos, _)| pos)
                .ok_or(ClusterError::InsufficientSamples { samples: n, clusters: k })?;
            let id = leaves[pos];

            let sub = x.select(Axis(0), &members[id]);
            let state = bisect(sub.view(), params, &mut rng);
            debug!(
                "拆分节点 {id}：{} 个向量，距离和 {:.4} -> {:.4}",
                members[id].len(),
                sse[id],
                state.distsum
            );

            let mut split = [vec![], vec![]];
            for (&i, &a) in members[id].iter().zip(&state.assignments) {
                split[a].push(i);
            }

            let mut children = [0; 2];
            for (side, side_members) in split.into_iter().enumerate() {
                let center = state.centroids.row(side).to_owned();
                sse.push(node_sse(x, &side_members, center.view()));
                members.push(side_members);
                children[side] = nodes.len();
                nodes.push(BisectNode { center, children: None, label: None });
            }
            nodes[id].children = Some(children);
            members[id] = vec![];
            leaves[pos] = children[0];
            leaves.insert(pos + 1, children[1]);
        }

        let mut frequency = vec![];
        for (label, &id) in leaves.iter().enumerate() {
            nodes[id].label = Some(label);
            frequency.push(members[id].len());
        }
        let inertia = leaves.iter().map(|&id| sse[id]).sum::<f64>();

        info!(
            "二分 KMeans 训练完成：k = {k}，距离和 {inertia:.4}，不平衡度 {:.2}",
            imbalance_factor(&frequency)
        );

        Ok(Self { nodes, n_clusters: k, n_features: x.ncols(), inertia })
    }

    /// 训练集到叶子中心的距离平方和
    pub fn inertia(&self) -> f64 {
        self.inertia
    }

    fn predict_one(&self, point: ArrayView1<f64>) -> Result<usize> {
        let node = |i: usize| {
            self.nodes.get(i).ok_or_else(|| ClusterError::CorruptModel(format!("节点 {i} 不存在")))
        };

        let mut current = node(0)?;
        while let Some([l, r]) = current.children {
            let (left, right) = (node(l)?, node(r)?);
            current = if sq_dist(point, right.center.view()) < sq_dist(point, left.center.view()) {
                right
            } else {
                left
            };
        }
        current.label.ok_or_else(|| ClusterError::CorruptModel("叶子节点缺少标签".to_string()))
    }
}

impl Clusterer for BisectingKMeansModel {
    fn n_features(&self) -> usize {
        self.n_features
    }

    fn n_clusters(&self) -> usize {
        self.n_clusters
    }

    fn predict(&self, x: ArrayView2<f64>) -> Result<Vec<usize>> {
        if x.ncols() != self.n_features {
            return Err(ClusterError::DimensionMismatch {
                expected: self.n_features,
                found: x.ncols(),
            });
        }
        x.outer_iter().map(|row| self.predict_one(row)).collect()
    }
}

/// 使用 2-means 将一个节点一分为二，取多次初始化中距离和最小的结果
fn bisect(x: ArrayView2<f64>, params: &KMeansParams, rng: &mut StdRng) -> LloydState {
    let mut best = kmeans_lloyd(x, 2, params.max_iter, params.tol, rng);
    for _ in 1..params.n_init {
        let state = kmeans_lloyd(x, 2, params.max_iter, params.tol, rng);
        if state.distsum < best.distsum {
            best = state;
        }
    }
    best
}

fn node_sse(x: ArrayView2<f64>, members: &[usize], center: ArrayView1<f64>) -> f64 {
    members.iter().map(|&i| sq_dist(x.row(i), center)).sum()
}
