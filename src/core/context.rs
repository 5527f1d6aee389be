//! Execution context for the training core.
//!
//! The thread pool is a process-wide collaborator injected by the caller;
//! no core operation reaches for ambient globals. Every parallel region in
//! this crate runs on the context's pool.

use crate::core::error::{HistError, Result};
use std::sync::Arc;

/// Shared execution context: thread count and the rayon pool that all
/// parallel phases run on.
#[derive(Clone)]
pub struct Context {
    n_threads: usize,
    pool: Arc<rayon::ThreadPool>,
}

impl Context {
    /// Creates a context with the given thread count.
    ///
    /// # Arguments
    /// * `n_threads` - Number of worker threads; 0 means all available cores
    pub fn new(n_threads: usize) -> Result<Self> {
        let n_threads = if n_threads == 0 {
            num_cpus::get()
        } else {
            n_threads
        };
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(n_threads)
            .build()
            .map_err(|e| HistError::threading(e.to_string()))?;
        Ok(Context {
            n_threads,
            pool: Arc::new(pool),
        })
    }

    /// Number of worker threads.
    pub fn threads(&self) -> usize {
        self.n_threads
    }

    /// The rayon pool backing this context.
    pub fn pool(&self) -> &rayon::ThreadPool {
        &self.pool
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("n_threads", &self.n_threads)
            .finish()
    }
}
