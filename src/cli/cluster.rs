use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use log::info;
use tokio::task::block_in_place;

use crate::cli::SubCommandExtend;
use crate::config::{KMeansOptions, Opts};
use crate::model::{Algorithm, ClusterCount, DirModelStore, fit_or_load};
use crate::output::save_clusters;
use crate::record::{KeySelector, read_result};

#[derive(Parser, Debug, Clone)]
pub struct ClusterCommand {
    /// 种子特征向量文件
    pub vector_path: PathBuf,
    /// 聚类算法
    #[arg(value_enum)]
    pub algorithm: Algorithm,
    /// 保存模型的工作目录，必须已经存在
    pub workdir: PathBuf,
    /// 聚类数量，已有模型时忽略
    #[arg(short, long)]
    pub k: Option<usize>,
    /// 根据轮廓系数自动选择聚类数量，与 -k 同时指定时以 -k 为准
    #[arg(long)]
    pub auto_k: bool,
    /// 结果输出文件，不指定时输出到标准输出
    #[arg(short, long, value_name = "PATH", default_value_t = String::new(), hide_default_value = true)]
    pub output: String,
    /// 作为种子标识的字段
    #[arg(long, value_enum, default_value_t = KeySelector::Hash)]
    pub key: KeySelector,
    #[command(flatten)]
    pub kmeans: KMeansOptions,
}

impl SubCommandExtend for ClusterCommand {
    async fn run(&self, _opts: &Opts) -> Result<()> {
        let table = read_result(&self.vector_path, self.key)?;
        info!("读取到 {} 个种子", table.len());

        let store = DirModelStore::open(&self.workdir)?;
        let count = ClusterCount::from_args(self.k, self.auto_k);
        let params = (&self.kmeans).into();
        let assignment = block_in_place(|| fit_or_load(&table, count, self.algorithm, &store, &params))?;

        save_clusters(&assignment, &self.output)?;
        info!("完成 {} 个种子的聚类", assignment.len());
        Ok(())
    }
}
