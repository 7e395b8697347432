pub mod bisecting;
pub mod cli;
pub mod config;
pub mod error;
pub mod kmeans;
pub mod model;
pub mod output;
pub mod record;
pub mod sampling;
mod sbsv;
pub mod seedgen;
pub mod silhouette;
pub mod utils;

pub use config::Opts;
pub use error::{ClusterError, Result};
pub use model::{Algorithm, ClusterAssignment, ClusterCount, DirModelStore, ModelStore, fit_or_load};
pub use record::{KeySelector, VectorTable, read_result};
