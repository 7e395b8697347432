use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use crate::cli::*;
use crate::kmeans::KMeansParams;
use crate::model::Algorithm;

/// 模糊测试器输出目录下，与生成种子相关的子目录名
pub const FUZZER_SUBDIR: &str = "cludafl";

/// 模糊测试器请求新种子时创建的文件前缀
pub const REQUEST_PREFIX: &str = "input-";

#[derive(Parser, Debug, Clone)]
#[command(name = "seedcluster", version)]
pub struct Opts {
    #[command(subcommand)]
    pub subcmd: SubCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum SubCommand {
    /// 对种子的特征向量进行聚类
    Cluster(ClusterCommand),
    /// 使用 Thompson 采样从若干候选中选择一个
    Sample(SampleCommand),
    /// 监听模糊测试器的请求，调用大模型生成新种子
    Watch(WatchCommand),
}

#[derive(Parser, Debug, Clone)]
pub struct KMeansOptions {
    /// 随机数种子，相同的种子得到相同的结果
    #[arg(long, value_name = "SEED", default_value_t = 0)]
    pub seed: u64,
    /// 使用不同初始中心点重复训练的次数
    #[arg(long, value_name = "N", default_value_t = 10, value_parser = clap::value_parser!(u32).range(1..))]
    pub n_init: u32,
    /// 单次训练的最大迭代次数
    #[arg(long, value_name = "N", default_value_t = 300)]
    pub max_iter: usize,
}

impl From<&KMeansOptions> for KMeansParams {
    fn from(opts: &KMeansOptions) -> Self {
        Self {
            max_iter: opts.max_iter,
            n_init: opts.n_init as usize,
            seed: opts.seed,
            ..Default::default()
        }
    }
}

/// 聚类工作目录，保存训练好的模型
#[derive(Debug, Clone)]
pub struct WorkDir {
    path: PathBuf,
}

impl WorkDir {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// 返回指定算法的模型文件路径
    pub fn model(&self, algorithm: Algorithm) -> PathBuf {
        self.path.join(format!("{}.pkl", algorithm.name()))
    }
}

/// 模糊测试器的输出目录
#[derive(Debug, Clone)]
pub struct FuzzerDir {
    path: PathBuf,
}

impl FuzzerDir {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    /// 返回需要监听的目录
    pub fn root(&self) -> PathBuf {
        self.path.join(FUZZER_SUBDIR)
    }

    /// 返回模糊测试器读取新种子的队列目录
    pub fn queue(&self) -> PathBuf {
        self.root().join("queue")
    }

    /// 返回第 n 个生成种子的临时文件路径，以 '.' 开头的文件会被模糊测试器忽略
    pub fn tmp_input(&self, n: usize) -> PathBuf {
        self.root().join(format!(".tmp_input-{n}"))
    }

    /// 返回第 n 个生成种子在队列中的路径
    pub fn queued_input(&self, n: usize) -> PathBuf {
        self.queue().join(format!("tmp_input-{n}"))
    }

    /// 判断文件是否为模糊测试器发出的请求
    pub fn is_request(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with(REQUEST_PREFIX))
    }
}
