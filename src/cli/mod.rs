mod cluster;
mod sample;
mod watch;

pub use cluster::*;
pub use sample::*;
pub use watch::*;

use crate::config::Opts;

pub trait SubCommandExtend {
    fn run(&self, opts: &Opts) -> impl std::future::Future<Output = anyhow::Result<()>> + Send;
}
