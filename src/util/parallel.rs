use rayon::prelude::*;

/// Maps `func` over `items` on the rayon pool, preserving input order.
pub fn run_in_parallel<T, R, F>(items: Vec<T>, func: F) -> Vec<R>
where
    T: Send,
    R: Send,
    F: Fn(T) -> R + Send + Sync,
{
    if items.len() <= 1 {
        return items.into_iter().map(func).collect();
    }
    items.into_par_iter().map(func).collect()
}
