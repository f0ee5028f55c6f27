//! Concurrency-limited fan-out that keeps results in input order.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures_util::future::join_all;
use tracing::debug;

/// Clamp a requested concurrency to `1..=count`.
pub fn clamp_concurrency(requested: usize, count: usize) -> usize {
    requested.clamp(1, count.max(1))
}

/// Run `work` over every item with at most `limit` calls in flight.
///
/// Exactly `min(limit, items.len())` loops claim indices from a shared cursor
/// until it runs past the end. The returned vector is positioned like `items`
/// whatever order the calls finish in.
pub async fn run_bounded<'a, T, R, F, Fut>(items: &'a [T], limit: usize, work: F) -> Vec<R>
where
    F: Fn(usize, &'a T) -> Fut,
    Fut: Future<Output = R>,
{
    if items.is_empty() {
        return Vec::new();
    }

    let workers = clamp_concurrency(limit, items.len());
    let cursor = AtomicUsize::new(0);
    debug!(workers, items = items.len(), "Starting bounded fan-out");

    let loops = (0..workers).map(|worker| {
        let cursor = &cursor;
        let work = &work;
        async move {
            let mut finished = Vec::new();
            loop {
                let index = cursor.fetch_add(1, Ordering::SeqCst);
                if index >= items.len() {
                    break;
                }
                debug!(worker, index, "Worker loop claimed item");
                finished.push((index, work(index, &items[index]).await));
            }
            finished
        }
    });

    let mut slots: Vec<Option<R>> = std::iter::repeat_with(|| None).take(items.len()).collect();
    for (index, result) in join_all(loops).await.into_iter().flatten() {
        slots[index] = Some(result);
    }
    slots.into_iter().flatten().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_clamp_concurrency() {
        assert_eq!(clamp_concurrency(4, 2), 2);
        assert_eq!(clamp_concurrency(0, 3), 1);
        assert_eq!(clamp_concurrency(2, 6), 2);
        assert_eq!(clamp_concurrency(3, 0), 1);
    }

    #[tokio::test]
    async fn test_empty_input_runs_nothing() {
        let calls = AtomicUsize::new(0);
        let results: Vec<usize> = run_bounded(&[] as &[u64], 3, |i, _| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { i }
        })
        .await;
        assert!(results.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_results_follow_input_order() {
        // Earlier items take longer, so completion order is reversed.
        let delays: Vec<u64> = vec![60, 50, 40, 30, 20, 10];

        for count in 1..=delays.len() {
            for limit in 1..=4 {
                let items = &delays[..count];
                let in_flight = Arc::new(AtomicUsize::new(0));
                let peak = Arc::new(AtomicUsize::new(0));

                let results = run_bounded(items, limit, |index, delay| {
                    let in_flight = in_flight.clone();
                    let peak = peak.clone();
                    let delay = *delay;
                    async move {
                        let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(delay)).await;
                        in_flight.fetch_sub(1, Ordering::SeqCst);
                        format!("{}:{}", index, delay)
                    }
                })
                .await;

                let expected: Vec<String> = items
                    .iter()
                    .enumerate()
                    .map(|(i, d)| format!("{}:{}", i, d))
                    .collect();
                assert_eq!(results, expected, "count={} limit={}", count, limit);
                assert_eq!(
                    peak.load(Ordering::SeqCst),
                    clamp_concurrency(limit, count),
                    "count={} limit={}",
                    count,
                    limit
                );
            }
        }
    }
}
