use anyhow::Result;
use clap::Parser;
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::cli::SubCommandExtend;
use crate::config::Opts;
use crate::sampling::{parse_arms, thompson_select};

#[derive(Parser, Debug, Clone)]
pub struct SampleCommand {
    /// 每个候选的 alpha 和 beta，依次排列
    #[arg(required = true, value_name = "ALPHA BETA")]
    pub params: Vec<u32>,
    /// 随机数种子，不指定时使用系统熵源
    #[arg(long)]
    pub seed: Option<u64>,
}

impl SubCommandExtend for SampleCommand {
    async fn run(&self, _opts: &Opts) -> Result<()> {
        let arms = parse_arms(&self.params)?;
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        println!("{}", thompson_select(&arms, &mut rng)?);
        Ok(())
    }
}
