//! A parallel map-reduce primitive built on a fixed pool of worker threads.
//!
//! [`map_reduce`] applies a map function to every item of an input sequence on a pool of worker
//! threads, and folds the outputs into an accumulator with a reduce function on the calling
//! thread. Inputs are handed to the workers, and outputs to the reducer, through rendezvous
//! channels, so neither side can run ahead of the other.
//!
//! A failure of either function on one item does not abort the run: the item's contribution is
//! left out of the accumulator, the failure is collected, and all of the collected failures are
//! returned in a [`MapReduceError::Failed`] along with the accumulator. A map function that
//! panics is treated the same way.
//!
//! A run can be interrupted by cancelling the [`CancelToken`] passed to it, or by giving the
//! token a deadline. The run then returns promptly with [`MapReduceError::Interrupted`] and the
//! accumulator as it stood, without waiting for the remaining inputs.
//!
//! # Examples
//!
//! ```
//! use forage::{map_reduce, CancelToken, MapReduceError};
//!
//! let cancel = CancelToken::new();
//! let result = map_reduce(
//!     &cancel,
//!     2,
//!     vec![1u64, 2, 3, 4],
//!     |x| if x % 2 == 0 { Err(format!("{x} is even")) } else { Ok(x * x) },
//!     |acc, x| Ok(acc + x),
//!     0,
//! );
//! match result {
//!     Err(MapReduceError::Failed { value, errors }) => {
//!         assert_eq!(value, 10);
//!         assert_eq!(errors.len(), 2);
//!     }
//!     _ => unreachable!(),
//! }
//! ```
//!
//! Use a [`Builder`] to configure the worker threads:
//!
//! ```
//! use forage::{Builder, CancelToken};
//! use std::time::Duration;
//!
//! let cancel = CancelToken::with_timeout(Duration::from_secs(10));
//! let longest = Builder::default()
//!     .thread_name("wordcount")
//!     .map_reduce(
//!         &cancel,
//!         ["drone", "worker", "queen"],
//!         |word| Ok::<_, ()>(word.len()),
//!         |acc: &usize, len| Ok(*acc.max(&len)),
//!         0,
//!     );
//! assert_eq!(longest.unwrap(), 6);
//! ```
mod cancel;
mod channel;
mod config;
mod error;
mod job;
mod panic;
mod pool;

pub use cancel::{CancelToken, Interrupted};
pub use config::{
    reset_defaults, set_num_threads_default, set_num_threads_default_all,
    set_thread_name_default, Config,
};
pub use error::{AggregateError, Failure, MapReduceError, TransformError};
pub use job::{map_reduce, Builder};
pub use panic::Panic;
pub use pool::PoolError;
