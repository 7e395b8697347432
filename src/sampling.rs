//! Thompson 采样：对每个候选从 Beta(alpha, beta) 中抽样，选择抽样值最大的候选

use rand::Rng;
use rand_distr::{Beta, Distribution};

use crate::error::SampleError;

/// 将扁平的参数列表按 (alpha, beta) 两两分组
pub fn parse_arms(values: &[u32]) -> Result<Vec<(f64, f64)>, SampleError> {
    if values.is_empty() {
        return Err(SampleError::Empty);
    }
    if values.len() % 2 != 0 {
        return Err(SampleError::OddCount(values.len()));
    }
    Ok(values.chunks_exact(2).map(|c| (c[0] as f64, c[1] as f64)).collect())
}

/// 返回抽样值最大的候选序号，相同时取靠前的
pub fn thompson_select<R: Rng + ?Sized>(
    arms: &[(f64, f64)],
    rng: &mut R,
) -> Result<usize, SampleError> {
    if arms.is_empty() {
        return Err(SampleError::Empty);
    }

    let mut best = (0, f64::NEG_INFINITY);
    for (index, &(alpha, beta)) in arms.iter().enumerate() {
        let dist = Beta::new(alpha, beta).map_err(|_| SampleError::InvalidArm { index, alpha, beta })?;
        let sample = dist.sample(rng);
        if sample > best.1 {
            best = (index, sample);
        }
    }
    Ok(best.0)
}
