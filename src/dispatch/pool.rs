use futures_util::StreamExt;
use futures_util::stream;
use tokio_util::sync::CancellationToken;

/// Runs `deliver` for every item with at most `concurrency` calls in flight.
///
/// Once `cancel` fires, calls still running are dropped and items not yet
/// started resolve through `cancelled` instead, so the output always holds
/// exactly one entry per input item. Output order is completion order.
pub(crate) async fn fan_out<I, T, F, Fut, C>(
    items: impl IntoIterator<Item = I>,
    concurrency: usize,
    cancel: &CancellationToken,
    deliver: F,
    cancelled: C,
) -> Vec<T>
where
    I: Copy,
    F: Fn(I) -> Fut,
    Fut: Future<Output = T>,
    C: Fn(I) -> T,
{
    let deliver = &deliver;
    let cancelled = &cancelled;
    // Collected first so the stream type does not name the closure, which
    // keeps the returned future `Send` for callers like axum handlers.
    let deliveries: Vec<_> = items
        .into_iter()
        .map(|item| async move {
            tokio::select! {
                biased;
                () = cancel.cancelled() => cancelled(item),
                outcome = deliver(item) => outcome,
            }
        })
        .collect();
    stream::iter(deliveries)
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await
}
