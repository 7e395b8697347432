use log::{debug, info};
use ndarray::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{ClusterError, Result};
use crate::model::Clusterer;

/// KMeans 训练参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KMeansParams {
    /// 单次训练的最大迭代次数
    pub max_iter: usize,
    /// 使用不同初始中心点重复训练的次数，取距离和最小的结果
    pub n_init: usize,
    /// 收敛阈值，相对于各维度方差的均值
    pub tol: f64,
    /// 随机数种子
    pub seed: u64,
}

impl Default for KMeansParams {
    fn default() -> Self {
        Self { max_iter: 300, n_init: 10, tol: 1e-4, seed: 0 }
    }
}

/// 单次 Lloyd 迭代的结果
#[derive(Debug, Clone)]
pub(crate) struct LloydState {
    /// 聚类中心
    pub centroids: Array2<f64>,
    /// 每个向量所属的聚类中心，与 centroids 一致
    pub assignments: Vec<usize>,
    /// 所有向量到其聚类中心的距离平方和
    pub distsum: f64,
    /// 每个聚类中心包含的向量数量
    pub centroid_frequency: Vec<usize>,
    /// 实际迭代次数
    pub n_iter: usize,
}

/// 训练完成的 KMeans 模型
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KMeansModel {
    centroids: Array2<f64>,
    inertia: f64,
}

impl KMeansModel {
    /// 使用 k-means++ 初始化训练 KMeans 模型
    ///
    /// 参数：
    /// - x: 输入向量，每行一个
    /// - k: 聚类中心数量
    /// - params: 训练参数
    pub fn fit(x: ArrayView2<f64>, k: usize, params: &KMeansParams) -> Result<Self> {
        check_samples(x.nrows(), k)?;

        let run = |init: usize| {
            let mut rng = StdRng::seed_from_u64(params.seed.wrapping_add(init as u64));
            let state = kmeans_lloyd(x, k, params.max_iter, params.tol, &mut rng);
            debug!("第 {} 次初始化：迭代 {} 轮，距离和 {:.4}", init + 1, state.n_iter, state.distsum);
            state
        };

        let mut best = run(0);
        for init in 1..params.n_init {
            let state = run(init);
            if state.distsum < best.distsum {
                best = state;
            }
        }

        info!(
            "KMeans 训练完成：k = {k}，距离和 {:.4}，不平衡度 {:.2}",
            best.distsum,
            imbalance_factor(&best.centroid_frequency)
        );

        Ok(Self { centroids: best.centroids, inertia: best.distsum })
    }

    /// 训练集到聚类中心的距离平方和
    pub fn inertia(&self) -> f64 {
        self.inertia
    }
}

impl Clusterer for KMeansModel {
    fn n_features(&self) -> usize {
        self.centroids.ncols()
    }

    fn n_clusters(&self) -> usize {
        self.centroids.nrows()
    }

    fn predict(&self, x: ArrayView2<f64>) -> Result<Vec<usize>> {
        if x.ncols() != self.n_features() {
            return Err(ClusterError::DimensionMismatch {
                expected: self.n_features(),
                found: x.ncols(),
            });
        }
        let (assignments, _) = update_assignments(x, self.centroids.view());
        Ok(assignments)
    }
}

pub(crate) fn check_samples(samples: usize, k: usize) -> Result<()> {
    if k == 0 || samples < k {
        return Err(ClusterError::InsufficientSamples { samples, clusters: k });
    }
    Ok(())
}

/// 一次完整的 Lloyd 迭代，调用方保证 `x.nrows() >= k > 0`
pub(crate) fn kmeans_lloyd(
    x: ArrayView2<f64>,
    k: usize,
    max_iter: usize,
    tol: f64,
    rng: &mut StdRng,
) -> LloydState {
    let tol = tol * mean_variance(x);
    let mut centroids = init_kmeans_plus_plus(x, k, rng);
    let mut prev_assignments = vec![];
    let mut n_iter = 0;

    for _ in 0..max_iter {
        n_iter += 1;
        let (assignments, distances) = update_assignments(x, centroids.view());
        let new_centroids = update_centroids(x, &assignments, &distances, k);
        let shift = (&new_centroids - &centroids).mapv(|v| v * v).sum();
        centroids = new_centroids;

        if assignments == prev_assignments || shift <= tol {
            break;
        }
        prev_assignments = assignments;
    }

    // 最终的分配结果必须与返回的聚类中心一致
    let (assignments, distances) = update_assignments(x, centroids.view());
    let mut centroid_frequency = vec![0; k];
    for &a in &assignments {
        centroid_frequency[a] += 1;
    }

    LloydState {
        centroids,
        assignments,
        distsum: distances.iter().sum(),
        centroid_frequency,
        n_iter,
    }
}

/// k-means++ 初始化：按到已选中心距离的平方加权抽样
fn init_kmeans_plus_plus(x: ArrayView2<f64>, k: usize, rng: &mut StdRng) -> Array2<f64> {
    let n = x.nrows();
    let mut centroids = Array2::zeros((k, x.ncols()));

    let first = rng.random_range(0..n);
    centroids.row_mut(0).assign(&x.row(first));
    let mut closest: Vec<f64> = (0..n).map(|i| sq_dist(x.row(i), x.row(first))).collect();

    for c in 1..k {
        let total: f64 = closest.iter().sum();
        let chosen = if total > 0.0 {
            let threshold = rng.random::<f64>() * total;
            let mut acc = 0.0;
            closest
                .iter()
                .position(|d| {
                    acc += d;
                    acc > threshold
                })
                .unwrap_or(n - 1)
        } else {
            // 所有点都与已选中心重合
            rng.random_range(0..n)
        };

        centroids.row_mut(c).assign(&x.row(chosen));
        for (i, d) in closest.iter_mut().enumerate() {
            *d = d.min(sq_dist(x.row(i), x.row(chosen)));
        }
    }

    centroids
}

/// 将每个点分配给最近的聚类中心，返回聚类中心序号和距离平方
pub(crate) fn update_assignments(
    x: ArrayView2<f64>,
    centroids: ArrayView2<f64>,
) -> (Vec<usize>, Vec<f64>) {
    (0..x.nrows()).into_par_iter().map(|i| nearest(x.row(i), centroids)).unzip()
}

/// 计算新的聚类中心，空的聚类中心会被移动到离其中心最远的点上
fn update_centroids(
    x: ArrayView2<f64>,
    assignments: &[usize],
    distances: &[f64],
    k: usize,
) -> Array2<f64> {
    let mut sums = Array2::<f64>::zeros((k, x.ncols()));
    let mut counts = vec![0usize; k];
    for (i, &a) in assignments.iter().enumerate() {
        let mut row = sums.row_mut(a);
        row += &x.row(i);
        counts[a] += 1;
    }

    let mut far: Vec<usize> = (0..x.nrows()).collect();
    far.sort_by(|&a, &b| distances[b].total_cmp(&distances[a]));
    let mut far = far.into_iter();

    for (c, &count) in counts.iter().enumerate() {
        if count > 0 {
            sums.row_mut(c).mapv_inplace(|v| v / count as f64);
        } else if let Some(i) = far.next() {
            sums.row_mut(c).assign(&x.row(i));
        }
    }

    sums
}

pub(crate) fn nearest(point: ArrayView1<f64>, centroids: ArrayView2<f64>) -> (usize, f64) {
    let mut best_cluster = 0;
    let mut min_distance = f64::INFINITY;
    for (j, centroid) in centroids.outer_iter().enumerate() {
        let d = sq_dist(point, centroid);
        if d < min_distance {
            min_distance = d;
            best_cluster = j;
        }
    }
    (best_cluster, min_distance)
}

#[inline]
pub(crate) fn sq_dist(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

fn mean_variance(x: ArrayView2<f64>) -> f64 {
    if x.nrows() == 0 || x.ncols() == 0 {
        return 0.0;
    }
    x.var_axis(Axis(0), 0.0).mean().unwrap_or(0.0)
}

/// 计算不平衡因子
pub(crate) fn imbalance_factor(hist: &[usize]) -> f32 {
    let (mut tot, mut uf) = (0.0, 0.0);
    for h in hist {
        let h = *h as f32;
        tot += h;
        uf += h.powf(2.0);
    }
    uf * hist.len() as f32 / tot.powf(2.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::same_partition;

    /// 两组明显分开的二维向量
    fn two_blobs() -> Array2<f64> {
        array![
            [0.0, 0.0],
            [0.5, 0.2],
            [0.1, 0.6],
            [0.4, 0.4],
            [10.0, 10.0],
            [10.3, 9.8],
            [9.7, 10.4],
            [10.1, 10.2],
        ]
    }

    #[test]
    fn test_fit_two_blobs() {
        let x = two_blobs();
        let model = KMeansModel::fit(x.view(), 2, &KMeansParams::default()).unwrap();
        assert_eq!(model.n_clusters(), 2);
        assert_eq!(model.n_features(), 2);

        let labels = model.predict(x.view()).unwrap();
        assert!(labels[..4].iter().all(|&l| l == labels[0]));
        assert!(labels[4..].iter().all(|&l| l == labels[4]));
        assert_ne!(labels[0], labels[4]);
    }

    #[test]
    fn test_fit_is_partition_stable() {
        let x = two_blobs();
        let a = KMeansModel::fit(x.view(), 2, &KMeansParams { seed: 1, ..Default::default() })
            .unwrap()
            .predict(x.view())
            .unwrap();
        let b = KMeansModel::fit(x.view(), 2, &KMeansParams { seed: 99, ..Default::default() })
            .unwrap()
            .predict(x.view())
            .unwrap();
        assert!(same_partition(&a, &b));
    }

    #[test]
    fn test_fit_same_seed_is_deterministic() {
        let x = two_blobs();
        let params = KMeansParams { seed: 7, n_init: 3, ..Default::default() };
        let a = KMeansModel::fit(x.view(), 3, &params).unwrap();
        let b = KMeansModel::fit(x.view(), 3, &params).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_insufficient_samples() {
        let x = array![[1.0, 2.0], [3.0, 4.0]];
        let err = KMeansModel::fit(x.view(), 3, &KMeansParams::default()).unwrap_err();
        assert!(matches!(err, ClusterError::InsufficientSamples { samples: 2, clusters: 3 }));

        let err = KMeansModel::fit(x.view(), 0, &KMeansParams::default()).unwrap_err();
        assert!(matches!(err, ClusterError::InsufficientSamples { .. }));
    }

    #[test]
    fn test_predict_dimension_mismatch() {
        let x = two_blobs();
        let model = KMeansModel::fit(x.view(), 2, &KMeansParams::default()).unwrap();
        let err = model.predict(array![[1.0, 2.0, 3.0]].view()).unwrap_err();
        assert!(matches!(err, ClusterError::DimensionMismatch { expected: 2, found: 3 }));
    }

    #[test]
    fn test_identical_points() {
        let x = Array2::<f64>::ones((6, 3));
        let model = KMeansModel::fit(x.view(), 2, &KMeansParams::default()).unwrap();
        assert_eq!(model.inertia(), 0.0);
        assert_eq!(model.predict(x.view()).unwrap().len(), 6);
    }

    #[test]
    fn test_kmeans_plus_plus_distinct() {
        let x = two_blobs();
        let mut rng = StdRng::seed_from_u64(3);
        let c = init_kmeans_plus_plus(x.view(), 2, &mut rng);
        assert_ne!(c.row(0), c.row(1));
    }

    #[test]
    fn test_imbalance_factor() {
        assert_eq!(imbalance_factor(&[4, 4]), 1.0);
        assert_eq!(imbalance_factor(&[8, 0]), 2.0);
    }
}
