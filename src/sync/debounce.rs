use std::time::Duration;

use tokio::sync::mpsc;

/// Coalesce a bursty input stream, search-as-you-type style: a value is
/// forwarded only once `window` passes without a newer one arriving.
/// Intermediate values are dropped; closing the input flushes the last
/// pending value and ends the output stream.
pub fn debounce<T: Send + 'static>(
    mut input: mpsc::Receiver<T>,
    window: Duration,
) -> mpsc::Receiver<T> {
    let (tx, rx) = mpsc::channel(8);
    tokio::spawn(async move {
        let mut pending: Option<T> = None;
        loop {
            match pending.take() {
                None => match input.recv().await {
                    Some(value) => pending = Some(value),
                    None => break,
                },
                Some(held) => {
                    tokio::select! {
                        newer = input.recv() => match newer {
                            Some(value) => pending = Some(value),
                            None => {
                                let _ = tx.send(held).await;
                                break;
                            }
                        },
                        _ = tokio::time::sleep(window) => {
                            if tx.send(held).await.is_err() {
                                break;
                            }
                        }
                    }
                }
            }
        }
    });
    rx
}
