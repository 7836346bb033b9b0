use crate::cancel::CancelToken;
use crate::config::{Config, DEFAULTS};
use crate::error::MapReduceError;

/// A `Builder` for map-reduce runs.
///
/// The configuration options available:
/// * `num_threads`: number of worker threads that transform inputs.
/// * `thread_name`: name prefix for each of the threads spawned by a run.
/// * `thread_stack_size`: stack size (in bytes) for each of the threads spawned by a run.
///
/// Calling `Builder::new()` creates an unconfigured `Builder`, while calling `Builder::default()`
/// creates a `Builder` with `num_threads` and `thread_name` set to the global default values,
/// which can be changed using the `forage::set_*_default` functions.
///
/// A `Builder` may be reused for any number of runs; each run creates its own worker pool.
///
/// # Examples
///
/// Sum the lengths of some words on eight threads, each with a 4 MB stack:
///
/// ```
/// use forage::{Builder, CancelToken};
///
/// let builder = Builder::new()
///     .num_threads(8)
///     .thread_stack_size(4_000_000);
///
/// let total = builder.map_reduce(
///     &CancelToken::new(),
///     ["bumble", "honey", "carpenter"],
///     |word| Ok::<_, ()>(word.len()),
///     |acc, len| Ok(acc + len),
///     0,
/// );
/// assert_eq!(total.unwrap(), 20);
/// ```
#[derive(Clone, Debug)]
pub struct Builder(Config);

impl Builder {
    /// Returns a new `Builder` with no options configured.
    pub fn new() -> Self {
        Self(Config::empty())
    }

    /// Sets the number of worker threads. A run with zero worker threads fails with
    /// `PoolError::NoWorkers`.
    pub fn num_threads(mut self, num: usize) -> Self {
        self.0.num_threads = Some(num);
        self
    }

    /// Sets the number of worker threads to the global default value.
    pub fn with_default_num_threads(mut self) -> Self {
        self.0.num_threads = DEFAULTS.lock().num_threads;
        self
    }

    /// Specifies that runs will use one worker thread per available CPU core.
    pub fn with_thread_per_core(mut self) -> Self {
        self.0.num_threads = Some(num_cpus::get());
        self
    }

    /// Sets the name prefix for each of the threads spawned by a run. Worker threads are named
    /// `"{name}-worker-{index}"` and the feeder thread `"{name}-feeder"`. If not specified, the
    /// prefix `"forage"` is used.
    ///
    /// # Examples
    ///
    /// ```
    /// use forage::{Builder, CancelToken};
    /// use std::thread;
    ///
    /// let names = Builder::new()
    ///     .num_threads(2)
    ///     .thread_name("pollen")
    ///     .map_reduce(
    ///         &CancelToken::new(),
    ///         0..10,
    ///         |_| Ok::<_, ()>(thread::current().name().unwrap().to_owned()),
    ///         |acc: &Vec<String>, name| {
    ///             let mut acc = acc.clone();
    ///             acc.push(name);
    ///             Ok(acc)
    ///         },
    ///         Vec::new(),
    ///     )
    ///     .unwrap();
    /// assert!(names.iter().all(|name| name.starts_with("pollen-worker-")));
    /// ```
    pub fn thread_name<T: Into<String>>(mut self, name: T) -> Self {
        self.0.thread_name = Some(name.into());
        self
    }

    /// Sets the stack size (in bytes) for each of the threads spawned by a run. If not specified,
    /// threads will have a stack size [as specified in the `std::thread` documentation][thread].
    ///
    /// [thread]: https://doc.rust-lang.org/nightly/std/thread/index.html#stack-size
    pub fn thread_stack_size(mut self, size: usize) -> Self {
        self.0.thread_stack_size = Some(size);
        self
    }

    /// Returns the configuration of this `Builder`.
    pub fn config(&self) -> &Config {
        &self.0
    }

    /// Runs `map` on every input using a new pool of worker threads configured by this
    /// `Builder`, and folds the outputs into `initial` with `reduce` on the calling thread. See
    /// [`map_reduce`](crate::map_reduce) for details.
    pub fn map_reduce<T, I, O, E, R, M, F>(
        &self,
        cancel: &CancelToken,
        inputs: T,
        map: M,
        reduce: F,
        initial: R,
    ) -> Result<R, MapReduceError<R, E>>
    where
        T: IntoIterator<Item = I>,
        T::IntoIter: Send + 'static,
        I: Send + 'static,
        O: Send + 'static,
        E: Send + 'static,
        M: Fn(I) -> Result<O, E> + Send + Sync + 'static,
        F: FnMut(&R, O) -> Result<R, E>,
    {
        super::run(self.0.clone(), cancel, inputs, map, reduce, initial)
    }
}

impl Default for Builder {
    /// Returns a new `Builder` configured with the global default values.
    fn default() -> Self {
        Self(Config::with_defaults())
    }
}

impl From<Config> for Builder {
    fn from(config: Config) -> Self {
        Self(config)
    }
}
