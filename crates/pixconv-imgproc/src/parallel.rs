use rayon::prelude::*;
use thiserror::Error;

/// Number of pixels from which [`ExecutionStrategy::Auto`] goes parallel.
pub const AUTO_PARALLEL_MIN_PIXELS: usize = 100_000;

/// Errors that can occur during parallel execution.
#[derive(Error, Debug, PartialEq)]
pub enum ParallelError {
    /// The thread pool failed to build.
    #[error("failed to build thread pool: {0}")]
    BuildError(String),

    /// The requested thread count is invalid.
    #[error("thread count must be > 0, got {0}")]
    InvalidThreadCount(usize),

    /// The row stride must be valid.
    #[error("row stride must be > 0, got {0}")]
    InvalidRowStride(usize),
}

/// Controls how rows, tiles and channels are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionStrategy {
    /// Run sequentially on the current thread.
    ///
    /// Useful for small images, debugging, or when the overhead of parallelization
    /// outweighs the benefits.
    Serial,

    /// Use the global Rayon thread pool.
    Parallel,

    /// Parallel for work of at least [`AUTO_PARALLEL_MIN_PIXELS`] pixels, serial otherwise.
    #[default]
    Auto,

    /// Run on a local thread pool with `n` threads.
    ///
    /// # Warning
    /// Creates a new thread pool on every call, which has significant overhead.
    /// Use this primarily for benchmarking or specific isolation needs.
    Fixed(usize),
}

impl ExecutionStrategy {
    /// Whether work over `num_pixels` pixels runs on more than one thread.
    pub fn is_parallel(&self, num_pixels: usize) -> bool {
        match self {
            ExecutionStrategy::Serial => false,
            ExecutionStrategy::Parallel => true,
            ExecutionStrategy::Auto => num_pixels >= AUTO_PARALLEL_MIN_PIXELS,
            ExecutionStrategy::Fixed(_) => true,
        }
    }

    fn install<R: Send>(&self, op: impl FnOnce() -> R + Send) -> Result<R, ParallelError> {
        match self {
            ExecutionStrategy::Fixed(0) => Err(ParallelError::InvalidThreadCount(0)),
            ExecutionStrategy::Fixed(n) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(*n)
                    .build()
                    .map_err(|e| ParallelError::BuildError(e.to_string()))?;
                Ok(pool.install(op))
            }
            _ => Ok(op()),
        }
    }
}

/// Apply `f(row_index, row)` to every row of `dst`.
///
/// # Arguments
///
/// * `strategy` - The execution strategy.
/// * `dst` - The destination buffer, `row_len` elements per row.
/// * `row_len` - Number of elements in one row.
/// * `f` - The per-row operation. Each call only sees its own row.
pub fn for_each_row<T, F>(
    strategy: ExecutionStrategy,
    dst: &mut [T],
    row_len: usize,
    f: F,
) -> Result<(), ParallelError>
where
    T: Send,
    F: Fn(usize, &mut [T]) + Send + Sync,
{
    if row_len == 0 {
        return Err(ParallelError::InvalidRowStride(row_len));
    }

    if !strategy.is_parallel(dst.len()) {
        dst.chunks_mut(row_len)
            .enumerate()
            .for_each(|(r, row)| f(r, row));
        return Ok(());
    }

    strategy.install(|| {
        dst.par_chunks_mut(row_len)
            .enumerate()
            .for_each(|(r, row)| f(r, row));
    })
}

/// Run `f(i)` for every `i` in `0..n` and collect the results in order.
///
/// `work_size` is the number of pixels the whole job touches and feeds the
/// [`ExecutionStrategy::Auto`] decision.
pub fn map_indexed<R, F>(
    strategy: ExecutionStrategy,
    n: usize,
    work_size: usize,
    f: F,
) -> Result<Vec<R>, ParallelError>
where
    R: Send,
    F: Fn(usize) -> R + Send + Sync,
{
    if !strategy.is_parallel(work_size) {
        return Ok((0..n).map(f).collect());
    }

    strategy.install(|| (0..n).into_par_iter().map(f).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_each_row_serial() -> Result<(), ParallelError> {
        let mut dst = vec![0; 6];
        for_each_row(ExecutionStrategy::Serial, &mut dst, 3, |r, row| {
            row.iter_mut().enumerate().for_each(|(c, v)| *v = r * 10 + c)
        })?;
        assert_eq!(dst, vec![0, 1, 2, 10, 11, 12]);
        Ok(())
    }

    #[test]
    fn test_for_each_row_parallel() -> Result<(), ParallelError> {
        let mut dst = vec![0; 6];
        for_each_row(ExecutionStrategy::Parallel, &mut dst, 2, |r, row| {
            row.iter_mut().for_each(|v| *v = r)
        })?;
        assert_eq!(dst, vec![0, 0, 1, 1, 2, 2]);
        Ok(())
    }

    #[test]
    fn test_for_each_row_invalid_stride() {
        let mut dst = vec![0u8; 4];
        let res = for_each_row(ExecutionStrategy::Serial, &mut dst, 0, |_, _| {});
        assert_eq!(res, Err(ParallelError::InvalidRowStride(0)));
    }

    #[test]
    fn test_map_indexed_fixed() -> Result<(), ParallelError> {
        let out = map_indexed(ExecutionStrategy::Fixed(2), 4, 0, |i| i * i)?;
        assert_eq!(out, vec![0, 1, 4, 9]);
        Ok(())
    }

    #[test]
    fn test_map_indexed_fixed_error() {
        let res = map_indexed(ExecutionStrategy::Fixed(0), 4, 0, |i| i);
        assert_eq!(res, Err(ParallelError::InvalidThreadCount(0)));
    }

    #[test]
    fn test_auto_threshold() {
        assert!(!ExecutionStrategy::Auto.is_parallel(AUTO_PARALLEL_MIN_PIXELS - 1));
        assert!(ExecutionStrategy::Auto.is_parallel(AUTO_PARALLEL_MIN_PIXELS));
    }
}
