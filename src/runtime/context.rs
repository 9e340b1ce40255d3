//! Library context: configuration plus the worker pool.

use rayon::{ThreadPool, ThreadPoolBuilder};

use super::config::ArlConfig;
use crate::error::ArlError;

/// Owns the configuration and the thread pool that numerical work runs in.
pub struct ArlContext {
    config: ArlConfig,
    pool: ThreadPool,
}

impl ArlContext {
    /// Create a context with a pool of `config.worker_count` threads.
    pub fn new(config: ArlConfig) -> Result<Self, ArlError> {
        let workers = config.worker_count.max(1);
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("arl-worker-{i}"))
            .build()?;
        log::debug!("ArlContext: started {workers} workers");
        Ok(Self { config, pool })
    }

    pub fn config(&self) -> &ArlConfig {
        &self.config
    }

    /// Run `f` inside the worker pool; rayon iterators in `f` use its threads.
    pub fn install<R, F>(&self, f: F) -> R
    where
        R: Send,
        F: FnOnce() -> R + Send,
    {
        self.pool.install(f)
    }

    /// Number of threads in the pool.
    pub fn worker_count(&self) -> usize {
        self.pool.current_num_threads()
    }
}

impl std::fmt::Debug for ArlContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArlContext")
            .field("config", &self.config)
            .field("workers", &self.worker_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_install_uses_pool() {
        let ctx = ArlContext::new(ArlConfig {
            worker_count: 2,
            ..Default::default()
        })
        .unwrap();
        assert_eq!(ctx.worker_count(), 2);
        let threads = ctx.install(rayon::current_num_threads);
        assert_eq!(threads, 2);
    }
}
