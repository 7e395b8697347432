use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::ops::RangeInclusive;
use std::path::PathBuf;

use clap::ValueEnum;
use indicatif::{ProgressBar, ProgressIterator};
use log::{info, warn};
use ndarray::prelude::*;
use serde::{Deserialize, Serialize};

use crate::bisecting::BisectingKMeansModel;
use crate::config::WorkDir;
use crate::error::{ClusterError, Result};
use crate::kmeans::{KMeansModel, KMeansParams};
use crate::record::VectorTable;
use crate::silhouette::silhouette_score;
use crate::utils::pb_style;

/// 自动选择 k 时尝试的候选值
pub const AUTO_K_CANDIDATES: RangeInclusive<usize> = 2..=10;

/// 未指定 k 且未开启自动选择时使用的聚类数量
pub const DEFAULT_K: usize = 5;

/// 训练完成、可以用于预测的聚类模型
pub trait Clusterer {
    /// 训练时向量的维度
    fn n_features(&self) -> usize;

    /// 聚类中心数量
    fn n_clusters(&self) -> usize;

    /// 为每个向量返回其聚类标签，维度不一致时返回 DimensionMismatch
    fn predict(&self, x: ArrayView2<f64>) -> Result<Vec<usize>>;
}

/// 聚类算法
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Algorithm {
    /// KMeans
    Kmeans,
    /// 二分 KMeans
    BisectingKmeans,
}

impl Algorithm {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Kmeans => "kmeans",
            Self::BisectingKmeans => "bisecting-kmeans",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 聚类数量
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterCount {
    /// 固定数量
    Fixed(usize),
    /// 根据轮廓系数从候选值中选择
    Auto,
}

impl ClusterCount {
    /// 由命令行参数确定聚类数量，显式指定的 k 优先
    pub fn from_args(k: Option<usize>, auto: bool) -> Self {
        match (k, auto) {
            (Some(k), _) => Self::Fixed(k),
            (None, true) => Self::Auto,
            (None, false) => Self::Fixed(DEFAULT_K),
        }
    }

    fn min_clusters(&self) -> usize {
        match self {
            Self::Fixed(k) => *k,
            Self::Auto => *AUTO_K_CANDIDATES.start(),
        }
    }
}

/// 持久化的聚类模型
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ClusterModel {
    KMeans(KMeansModel),
    Bisecting(BisectingKMeansModel),
}

impl ClusterModel {
    pub fn fit(
        algorithm: Algorithm,
        x: ArrayView2<f64>,
        k: usize,
        params: &KMeansParams,
    ) -> Result<Self> {
        Ok(match algorithm {
            Algorithm::Kmeans => Self::KMeans(KMeansModel::fit(x, k, params)?),
            Algorithm::BisectingKmeans => Self::Bisecting(BisectingKMeansModel::fit(x, k, params)?),
        })
    }

    pub fn algorithm(&self) -> Algorithm {
        match self {
            Self::KMeans(_) => Algorithm::Kmeans,
            Self::Bisecting(_) => Algorithm::BisectingKmeans,
        }
    }

    fn inner(&self) -> &dyn Clusterer {
        match self {
            Self::KMeans(m) => m,
            Self::Bisecting(m) => m,
        }
    }
}

impl Clusterer for ClusterModel {
    fn n_features(&self) -> usize {
        self.inner().n_features()
    }

    fn n_clusters(&self) -> usize {
        self.inner().n_clusters()
    }

    fn predict(&self, x: ArrayView2<f64>) -> Result<Vec<usize>> {
        self.inner().predict(x)
    }
}

/// 模型的存取接口，与具体的序列化方式无关
pub trait ModelStore {
    /// 加载指定算法的模型，不存在时返回 None
    fn load(&self, algorithm: Algorithm) -> Result<Option<ClusterModel>>;

    /// 保存模型，覆盖已有的文件
    fn save(&self, algorithm: Algorithm, model: &ClusterModel) -> Result<()>;
}

/// 以 bincode 格式将模型保存在工作目录下
#[derive(Debug, Clone)]
pub struct DirModelStore {
    workdir: WorkDir,
}

impl DirModelStore {
    /// 打开工作目录，目录必须已经存在
    pub fn open<P: Into<PathBuf>>(path: P) -> Result<Self> {
        let workdir = WorkDir::new(path);
        if !workdir.path().is_dir() {
            return Err(ClusterError::FileNotFound(workdir.path().to_path_buf()));
        }
        Ok(Self { workdir })
    }
}

impl ModelStore for DirModelStore {
    fn load(&self, algorithm: Algorithm) -> Result<Option<ClusterModel>> {
        let path = self.workdir.model(algorithm);
        if !path.exists() {
            return Ok(None);
        }
        let reader = BufReader::new(File::open(&path)?);
        let model: ClusterModel = bincode::deserialize_from(reader)?;
        if model.algorithm() != algorithm {
            return Err(ClusterError::CorruptModel(format!(
                "{} 中保存的是 {} 模型",
                path.display(),
                model.algorithm()
            )));
        }
        Ok(Some(model))
    }

    fn save(&self, algorithm: Algorithm, model: &ClusterModel) -> Result<()> {
        let path = self.workdir.model(algorithm);
        let mut writer = BufWriter::new(File::create(&path)?);
        bincode::serialize_into(&mut writer, model)?;
        writer.flush()?;
        info!("模型已保存到 {}", path.display());
        Ok(())
    }
}

/// 种子键到聚类标签的有序映射
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterAssignment {
    entries: Vec<(i64, usize)>,
}

impl ClusterAssignment {
    /// 按位置将键与标签配对
    pub fn new(keys: &[i64], labels: &[usize]) -> Self {
        Self { entries: keys.iter().copied().zip(labels.iter().copied()).collect() }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (i64, usize)> + '_ {
        self.entries.iter().copied()
    }

    pub fn labels(&self) -> Vec<usize> {
        self.entries.iter().map(|(_, c)| *c).collect()
    }
}

/// 将向量表转换为矩阵，所有向量的维度必须相同
pub fn to_matrix(table: &VectorTable) -> Result<Array2<f64>> {
    let d = table.vectors().first().map_or(0, Vec::len);
    let mut x = Array2::zeros((table.len(), d));
    for (mut row, v) in x.outer_iter_mut().zip(table.vectors()) {
        if v.len() != d {
            return Err(ClusterError::DimensionMismatch { expected: d, found: v.len() });
        }
        row.iter_mut().zip(v).for_each(|(dst, &src)| *dst = src as f64);
    }
    Ok(x)
}

/// 训练新模型，返回模型和训练集的聚类标签
pub fn fit(
    x: ArrayView2<f64>,
    count: ClusterCount,
    algorithm: Algorithm,
    params: &KMeansParams,
) -> Result<(ClusterModel, Vec<usize>)> {
    match count {
        ClusterCount::Fixed(k) => {
            let model = ClusterModel::fit(algorithm, x, k, params)?;
            let labels = model.predict(x)?;
            Ok((model, labels))
        }
        ClusterCount::Auto => select_k(x, algorithm, params),
    }
}

/// 依次尝试所有候选 k，选择轮廓系数最大的一个；系数相同时保留较小的 k
fn select_k(
    x: ArrayView2<f64>,
    algorithm: Algorithm,
    params: &KMeansParams,
) -> Result<(ClusterModel, Vec<usize>)> {
    let n = x.nrows();
    let candidates: Vec<usize> = AUTO_K_CANDIDATES.collect();
    let mut fits = vec![];

    let pb = ProgressBar::new(candidates.len() as u64).with_style(pb_style());
    for k in candidates.into_iter().progress_with(pb.clone()) {
        // 轮廓系数要求聚类数量小于样本数量
        if k >= n {
            warn!("样本数量 {n} 不足，跳过 k = {k}");
            continue;
        }

        let model = ClusterModel::fit(algorithm, x, k, params)?;
        let labels = model.predict(x)?;
        let score = match silhouette_score(x, &labels) {
            Ok(score) => score,
            Err(ClusterError::InsufficientSamples { clusters, .. }) => {
                warn!("k = {k} 时只得到 {clusters} 个有效聚类，跳过");
                continue;
            }
            Err(e) => return Err(e),
        };
        info!("k = {k}，轮廓系数 {score:.4}");
        pb.set_message(format!("k = {k}，轮廓系数 {score:.4}"));

        fits.push((k, score, model, labels));
    }
    pb.finish_and_clear();

    let best = best_candidate(fits.iter().map(|(k, score, ..)| (*k, *score)));
    let pos = best.and_then(|k| fits.iter().position(|fit| fit.0 == k)).ok_or(
        ClusterError::InsufficientSamples { samples: n, clusters: *AUTO_K_CANDIDATES.start() },
    )?;
    let (k, score, model, labels) = fits.swap_remove(pos);
    info!("选择 k = {k}，轮廓系数 {score:.4}");
    Ok((model, labels))
}

/// 从 (k, 轮廓系数) 中选出得分最高的 k，得分相同时取靠前的
fn best_candidate(scores: impl IntoIterator<Item = (usize, f64)>) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (k, score) in scores {
        if best.is_none_or(|(_, best_score)| score > best_score) {
            best = Some((k, score));
        }
    }
    best.map(|(k, _)| k)
}

/// 已有模型时只预测，否则训练并保存新模型
///
/// 模型一旦保存，k 就固定下来，之后传入的 count 会被忽略。
pub fn fit_or_load<S: ModelStore + ?Sized>(
    table: &VectorTable,
    count: ClusterCount,
    algorithm: Algorithm,
    store: &S,
    params: &KMeansParams,
) -> Result<ClusterAssignment> {
    if table.is_empty() {
        return Err(ClusterError::InsufficientSamples {
            samples: 0,
            clusters: count.min_clusters(),
        });
    }
    let x = to_matrix(table)?;

    let labels = match store.load(algorithm)? {
        Some(model) => {
            info!(
                "使用已有的 {algorithm} 模型进行预测：k = {}，维度 {}",
                model.n_clusters(),
                model.n_features()
            );
            match count {
                ClusterCount::Fixed(k) if k != model.n_clusters() => {
                    warn!("已有模型的 k = {}，忽略参数 k = {k}", model.n_clusters())
                }
                ClusterCount::Auto => warn!("已有模型，忽略自动选择 k"),
                _ => {}
            }
            if model.n_features() != x.ncols() {
                return Err(ClusterError::DimensionMismatch {
                    expected: model.n_features(),
                    found: x.ncols(),
                });
            }
            model.predict(x.view())?
        }
        None => {
            let (model, labels) = fit(x.view(), count, algorithm, params)?;
            store.save(algorithm, &model)?;
            labels
        }
    };

    Ok(ClusterAssignment::new(table.keys(), &labels))
}

/// 判断两组标签是否为同一种划分，忽略标签编号本身
pub fn same_partition(a: &[usize], b: &[usize]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut forward = HashMap::new();
    let mut backward = HashMap::new();
    a.iter().zip(b).all(|(&x, &y)| {
        *forward.entry(x).or_insert(y) == y && *backward.entry(y).or_insert(x) == x
    })
}
