use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, ensure};
use clap::Parser;

use crate::cli::SubCommandExtend;
use crate::config::{FuzzerDir, Opts};
use crate::seedgen::{ChatClient, DEFAULT_ENDPOINT, DEFAULT_MODEL, SeedGenerator};

#[derive(Parser, Debug, Clone)]
pub struct WatchCommand {
    /// 被测程序名称
    pub program: String,
    /// 模糊测试器的输出目录
    pub out_dir: PathBuf,
    /// chat completions 接口地址
    #[arg(long, default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,
    /// 使用的模型
    #[arg(long, default_value = DEFAULT_MODEL)]
    pub model: String,
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true, default_value = "")]
    pub api_key: String,
    /// 收到请求后等待的时间（毫秒）
    #[arg(long, value_name = "MS", default_value_t = 500)]
    pub delay_ms: u64,
    /// 请求模型的超时时间（秒）
    #[arg(long, value_name = "SECS", default_value_t = 180)]
    pub timeout_secs: u64,
}

impl SubCommandExtend for WatchCommand {
    async fn run(&self, _opts: &Opts) -> Result<()> {
        let dir = FuzzerDir::new(&self.out_dir);
        ensure!(dir.root().is_dir(), "目录不存在: {}", dir.root().display());

        let client =
            ChatClient::new(&self.endpoint, &self.model, &self.api_key, Duration::from_secs(self.timeout_secs))?;
        let generator = SeedGenerator::new(dir, &self.program, client, Duration::from_millis(self.delay_ms));
        Arc::new(generator).watch().await
    }
}
