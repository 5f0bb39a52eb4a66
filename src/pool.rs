//! Fixed-size worker pool draining a shared queue.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Mutex;
use tracing::{debug, error};

/// Run `job` over every item with at most `concurrency` in flight, returning
/// results in the order the items came in.
///
/// Spawns `min(concurrency, items)` workers that pull indexed items from a
/// shared queue until it drains, then reassembles results by index.
pub async fn run_pool<T, R, F, Fut>(items: Vec<T>, concurrency: usize, job: F) -> Vec<R>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
{
    let total = items.len();
    if total == 0 {
        return Vec::new();
    }

    let workers = concurrency.max(1).min(total);
    debug!(workers, total, "starting worker pool");

    let queue: Arc<Mutex<VecDeque<(usize, T)>>> =
        Arc::new(Mutex::new(items.into_iter().enumerate().collect()));
    let job = Arc::new(job);

    let handles: Vec<_> = (0..workers)
        .map(|_| {
            let queue = Arc::clone(&queue);
            let job = Arc::clone(&job);
            tokio::spawn(async move {
                let mut completed = Vec::new();
                loop {
                    // The guard drops before the job runs.
                    let next = queue.lock().await.pop_front();
                    let Some((index, item)) = next else { break };
                    completed.push((index, job(item).await));
                }
                completed
            })
        })
        .collect();

    let mut slots: Vec<Option<R>> = Vec::with_capacity(total);
    slots.resize_with(total, || None);

    for handle in join_all(handles).await {
        match handle {
            Ok(completed) => {
                for (index, result) in completed {
                    slots[index] = Some(result);
                }
            }
            Err(join_error) => {
                error!(%join_error, "pool worker panicked");
            }
        }
    }

    slots.into_iter().flatten().collect()
}
