use anyhow::Result;
use clap::Parser;

use seedcluster::Opts;
use seedcluster::cli::SubCommandExtend;
use seedcluster::config::SubCommand;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let opts = Opts::parse();

    match &opts.subcmd {
        SubCommand::Cluster(config) => config.run(&opts).await,
        SubCommand::Sample(config) => config.run(&opts).await,
        SubCommand::Watch(config) => config.run(&opts).await,
    }
}
