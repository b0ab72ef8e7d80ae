//! Thread pool setup.

/// Run a closure inside a rayon pool of the requested size.
///
/// Thread count semantics:
/// - `0` = auto (the global pool, all available cores)
/// - `n > 0` = a dedicated pool of exactly `n` threads
///
/// If the dedicated pool cannot be created the closure runs on the global
/// pool instead.
pub fn run_with_threads<T: Send>(n_threads: usize, f: impl FnOnce() -> T + Send) -> T {
    if n_threads == 0 {
        return f();
    }
    match rayon::ThreadPoolBuilder::new().num_threads(n_threads).build() {
        Ok(pool) => pool.install(f),
        Err(err) => {
            tracing::warn!(n_threads, %err, "failed to build thread pool, using the global pool");
            f()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_uses_current_pool() {
        assert_eq!(run_with_threads(0, || 42), 42);
    }

    #[test]
    fn explicit_pool_size() {
        let threads = run_with_threads(2, rayon::current_num_threads);
        assert_eq!(threads, 2);
    }
}
