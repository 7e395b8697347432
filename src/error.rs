use std::path::PathBuf;

use thiserror::Error;

pub type Result<T, E = ClusterError> = std::result::Result<T, E>;

/// 聚类流程中的错误，全部为致命错误
#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("文件或目录不存在: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("第 {line} 行记录格式错误: {reason}")]
    MalformedRecord { line: usize, reason: String },

    #[error("向量维度不一致: 期望 {expected}，实际 {found}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("样本数量不足: {samples} 个样本无法划分为 {clusters} 个聚类")]
    InsufficientSamples { samples: usize, clusters: usize },

    #[error("模型文件已损坏: {0}")]
    CorruptModel(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<bincode::Error> for ClusterError {
    fn from(err: bincode::Error) -> Self {
        match *err {
            bincode::ErrorKind::Io(e) if e.kind() != std::io::ErrorKind::UnexpectedEof => Self::Io(e),
            e => Self::CorruptModel(e.to_string()),
        }
    }
}

/// Thompson 采样的参数错误
#[derive(Debug, Error, PartialEq)]
pub enum SampleError {
    #[error("至少需要一个候选")]
    Empty,

    #[error("候选参数必须成对出现，实际得到 {0} 个")]
    OddCount(usize),

    #[error("第 {index} 个候选的参数无效: alpha = {alpha}, beta = {beta}")]
    InvalidArm { index: usize, alpha: f64, beta: f64 },
}

/// 生成新种子时的错误，只影响当前这一次请求
#[derive(Debug, Error)]
pub enum SeedGenError {
    #[error("HTTP 请求失败: {0}")]
    Request(#[from] reqwest::Error),

    #[error("服务器返回错误 {status}: {body}")]
    Server { status: u16, body: String },

    #[error("模型没有返回任何内容")]
    EmptyResponse,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
