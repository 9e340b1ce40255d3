//! Library configuration.

use crate::deconvolution::DeconvolveConfig;

/// Default number of w slices for the wide-field predict used by
/// `arl_predict_function`.
pub const DEFAULT_VIS_SLICES: usize = 51;

/// Environment variable overriding the worker count (0 = auto).
pub const ENV_NUM_THREADS: &str = "ARL_NUM_THREADS";

/// Environment variable overriding the number of w slices.
pub const ENV_VIS_SLICES: &str = "ARL_VIS_SLICES";

/// Environment variable holding the `env_logger` filter.
pub const ENV_LOG: &str = "ARL_LOG";

/// Configuration for the library context.
#[derive(Clone, Debug)]
pub struct ArlConfig {
    /// Number of worker threads.
    pub worker_count: usize,
    /// Number of w slices for wide-field prediction.
    pub vis_slices: usize,
    /// Settings used by `arl_deconvolve_cube`.
    pub deconvolve: DeconvolveConfig,
}

impl Default for ArlConfig {
    fn default() -> Self {
        Self {
            worker_count: num_cpus::get(),
            vis_slices: DEFAULT_VIS_SLICES,
            deconvolve: DeconvolveConfig::default(),
        }
    }
}

impl ArlConfig {
    /// Defaults overlaid with `ARL_NUM_THREADS` and `ARL_VIS_SLICES`.
    ///
    /// Unparseable values are ignored with a warning.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(n) = read_env(ENV_NUM_THREADS) {
            if n > 0 {
                config.worker_count = n;
            }
        }
        if let Some(n) = read_env(ENV_VIS_SLICES) {
            if n > 0 {
                config.vis_slices = n;
            }
        }
        config
    }
}

fn read_env(key: &str) -> Option<usize> {
    let value = std::env::var(key).ok()?;
    match value.trim().parse::<usize>() {
        Ok(n) => Some(n),
        Err(_) => {
            log::warn!("ignoring {key}={value:?}: not a non-negative integer");
            None
        }
    }
}
