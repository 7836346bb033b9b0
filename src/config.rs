//! Configuration for map-reduce runs, and the process-wide defaults used by
//! [`Builder::default()`](crate::Builder).
use parking_lot::Mutex;
use std::sync::LazyLock;

const DEFAULT_NUM_THREADS: usize = 4;
const DEFAULT_THREAD_NAME: &str = "forage";

pub(crate) static DEFAULTS: LazyLock<Mutex<Config>> = LazyLock::new(|| {
    let mut config = Config::default();
    reset_config_defaults(&mut config);
    Mutex::new(config)
});

/// Settings for the worker threads of a run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Config {
    /// The number of worker threads; must be greater than zero.
    pub num_threads: Option<usize>,
    /// Prefix for the names of spawned threads (`"{name}-worker-{i}"`, `"{name}-feeder"`).
    pub thread_name: Option<String>,
    /// Stack size (in bytes) of spawned threads.
    pub thread_stack_size: Option<usize>,
}

impl Config {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_defaults() -> Self {
        DEFAULTS.lock().clone()
    }

    /// Returns the configured thread name prefix, or the default prefix if none is set.
    pub(crate) fn thread_name_or_default(&self) -> &str {
        self.thread_name.as_deref().unwrap_or(DEFAULT_THREAD_NAME)
    }

    /// Returns a `std::thread::Builder` for a thread whose name ends with `suffix`.
    pub(crate) fn thread_builder(&self, suffix: &str) -> std::thread::Builder {
        let mut builder = std::thread::Builder::new()
            .name(format!("{}-{suffix}", self.thread_name_or_default()));
        if let Some(size) = self.thread_stack_size {
            builder = builder.stack_size(size);
        }
        builder
    }
}

/// Sets the number of threads a `Builder` is configured with when using `Builder::default()`.
pub fn set_num_threads_default(num_threads: usize) {
    DEFAULTS.lock().num_threads = Some(num_threads);
}

/// Sets the number of threads a `Builder` is configured with when using `Builder::default()` to
/// the number of available CPU cores.
pub fn set_num_threads_default_all() {
    set_num_threads_default(num_cpus::get());
}

/// Sets the thread name prefix a `Builder` is configured with when using `Builder::default()`.
pub fn set_thread_name_default<T: Into<String>>(name: T) {
    DEFAULTS.lock().thread_name = Some(name.into());
}

/// Resets all builder defaults to their initial values.
pub fn reset_defaults() {
    let mut config = DEFAULTS.lock();
    reset_config_defaults(&mut config);
}

fn reset_config_defaults(config: &mut Config) {
    config.num_threads = Some(DEFAULT_NUM_THREADS);
    config.thread_name = Some(DEFAULT_THREAD_NAME.into());
    config.thread_stack_size = None;
}
