use std::future::Future;
use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::{mpsc, Semaphore};
use tracing::warn;

/// Run `task` over `items` with at most `workers` in flight. Results come
/// back in completion order; a task that panics is logged and dropped.
pub async fn run<I, R, F, Fut>(items: Vec<I>, workers: usize, label: &str, task: F) -> Vec<R>
where
    I: Send + 'static,
    R: Send + 'static,
    F: Fn(I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
{
    let workers = workers.max(1);
    let total = items.len();
    let task = Arc::new(task);
    let semaphore = Arc::new(Semaphore::new(workers));

    let pb = ProgressBar::new(total as u64);
    pb.set_style(progress_style());
    pb.set_message(label.to_string());

    // Workers send results, the caller collects them
    let (tx, mut rx) = mpsc::channel::<R>(workers * 2);

    let mut handles = Vec::with_capacity(total);
    for item in items {
        let task = Arc::clone(&task);
        let sem = Arc::clone(&semaphore);
        let tx = tx.clone();

        handles.push(tokio::spawn(async move {
            let Ok(_permit) = sem.acquire().await else {
                return;
            };
            let result = task(item).await;
            let _ = tx.send(result).await;
        }));
    }

    // Drop our copy of tx so rx closes when all spawned tasks finish
    drop(tx);

    let mut results = Vec::with_capacity(total);
    while let Some(result) = rx.recv().await {
        results.push(result);
        pb.inc(1);
    }
    pb.finish_and_clear();

    for handle in handles {
        if let Err(e) = handle.await {
            warn!("{} task failed: {}", label, e);
        }
    }
    results
}

fn progress_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{msg} [{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")
        .map(|s| s.progress_chars("=> "))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
}
