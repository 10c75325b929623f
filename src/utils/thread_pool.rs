use once_cell::sync::OnceCell;
use rayon::ThreadPoolBuilder;
use std::sync::Arc;

static SHARED_POOL: OnceCell<Arc<rayon::ThreadPool>> = OnceCell::new();

/// Upper bound on the default worker count
const MAX_DEFAULT_THREADS: usize = 8;

/// Default number of hashing workers: available CPUs, capped
#[must_use]
pub fn default_thread_count() -> usize {
    num_cpus::get().min(MAX_DEFAULT_THREADS)
}

/// Build a dedicated pool with `num_threads` workers
///
/// # Errors
///
/// Returns an error if the operating system refuses to spawn the workers
pub fn build_pool(num_threads: usize) -> anyhow::Result<Arc<rayon::ThreadPool>> {
    let pool = ThreadPoolBuilder::new()
        .num_threads(num_threads.max(1))
        .thread_name(|i| format!("replisync-worker-{i}"))
        .build()?;
    Ok(Arc::new(pool))
}

/// Get the process-wide pool, creating it with default settings if needed
///
/// # Errors
///
/// Returns an error if the pool cannot be created on first use
pub fn shared_pool() -> anyhow::Result<Arc<rayon::ThreadPool>> {
    SHARED_POOL
        .get_or_try_init(|| build_pool(default_thread_count()))
        .cloned()
}

/// Pick the pool for a requested worker count, where 0 means "default"
///
/// # Errors
///
/// Returns an error if a pool cannot be created
pub fn pool_for(num_threads: usize) -> anyhow::Result<Arc<rayon::ThreadPool>> {
    if num_threads == 0 {
        shared_pool()
    } else {
        build_pool(num_threads)
    }
}

mod num_cpus {
    use std::sync::LazyLock;

    static NUM_CPUS: LazyLock<usize> = LazyLock::new(|| {
        std::thread::available_parallelism()
            .map(std::num::NonZeroUsize::get)
            .unwrap_or(1)
    });

    pub fn get() -> usize {
        *NUM_CPUS
    }
}
