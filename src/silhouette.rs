use ndarray::prelude::*;
use rayon::prelude::*;

use crate::error::{ClusterError, Result};
use crate::kmeans::sq_dist;

/// 计算所有样本轮廓系数的平均值
///
/// 要求聚类数量在 2 到 n - 1 之间。只有一个样本的聚类，其样本的轮廓系数记为 0。
pub fn silhouette_score(x: ArrayView2<f64>, labels: &[usize]) -> Result<f64> {
    let n = x.nrows();
    if labels.len() != n {
        return Err(ClusterError::DimensionMismatch { expected: n, found: labels.len() });
    }

    let nl = labels.iter().max().map_or(0, |m| m + 1);
    let mut counts = vec![0usize; nl];
    for &l in labels {
        counts[l] += 1;
    }
    let n_labels = counts.iter().filter(|&&c| c > 0).count();
    if n_labels < 2 || n_labels >= n {
        return Err(ClusterError::InsufficientSamples { samples: n, clusters: n_labels });
    }

    let scores: Vec<f64> = (0..n)
        .into_par_iter()
        .map(|i| {
            let own = labels[i];
            if counts[own] <= 1 {
                return 0.0;
            }

            let mut sums = vec![0.0; nl];
            for j in 0..n {
                if i != j {
                    sums[labels[j]] += sq_dist(x.row(i), x.row(j)).sqrt();
                }
            }

            let a = sums[own] / (counts[own] - 1) as f64;
            let b = (0..nl)
                .filter(|&c| c != own && counts[c] > 0)
                .map(|c| sums[c] / counts[c] as f64)
                .fold(f64::INFINITY, f64::min);

            let m = a.max(b);
            if m > 0.0 { (b - a) / m } else { 0.0 }
        })
        .collect();

    Ok(scores.iter().sum::<f64>() / n as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_well_separated() {
        let x = array![[0.0], [0.1], [10.0], [10.1]];
        let score = silhouette_score(x.view(), &[0, 0, 1, 1]).unwrap();
        assert!(score > 0.95, "score = {score}");
    }

    #[test]
    fn test_bad_assignment_is_negative() {
        let x = array![[0.0], [0.1], [10.0], [10.1]];
        let score = silhouette_score(x.view(), &[0, 1, 0, 1]).unwrap();
        assert!(score < 0.0, "score = {score}");
    }

    #[test]
    fn test_known_value() {
        // 样本 0：a = 1，b = (4 + 5) / 2 = 4.5，s = 3.5 / 4.5
        // 样本 1：a = 1，b = (3 + 4) / 2 = 3.5，s = 2.5 / 3.5
        // 样本 2、3：a = 1，b 分别为 3.5 和 4.5
        let x = array![[0.0], [1.0], [4.0], [5.0]];
        let score = silhouette_score(x.view(), &[0, 0, 1, 1]).unwrap();
        let expected = (3.5 / 4.5 + 2.5 / 3.5 + 2.5 / 3.5 + 3.5 / 4.5) / 4.0;
        assert!((score - expected).abs() < 1e-12);
    }

    #[test]
    fn test_singleton_cluster_scores_zero() {
        let x = array![[0.0], [0.2], [9.0]];
        let score = silhouette_score(x.view(), &[0, 0, 1]).unwrap();
        // 样本 2 单独成簇，轮廓系数为 0
        let s0 = (9.0 - 0.2) / 9.0;
        let s1 = (8.8 - 0.2) / 8.8;
        assert!((score - (s0 + s1) / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_label_count_out_of_range() {
        let x = array![[0.0], [1.0], [2.0]];
        assert!(matches!(
            silhouette_score(x.view(), &[0, 0, 0]),
            Err(ClusterError::InsufficientSamples { clusters: 1, .. })
        ));
        assert!(matches!(
            silhouette_score(x.view(), &[0, 1, 2]),
            Err(ClusterError::InsufficientSamples { clusters: 3, .. })
        ));
    }
}
