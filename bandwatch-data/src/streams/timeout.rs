//! Idle read timeout for WebSocket streams.
//!
//! Binance may stop sending on a socket without closing it. Wrapping the read half in a
//! [`TimeoutStream`] turns such a silent connection into an ended stream, which the
//! [`super::client::StreamingClient`] treats like any other disconnect.

use futures::Stream;
use std::{
    pin::Pin,
    task::{Context, Poll},
    time::Duration,
};
use tokio::time::{Instant, Sleep};

/// Default read timeout for WebSocket streams (2 minutes).
pub const DEFAULT_WS_READ_TIMEOUT: Duration = Duration::from_secs(120);

/// Ends the inner stream if it yields nothing for `timeout_duration`.
#[derive(Debug)]
pub struct TimeoutStream<S> {
    inner: S,
    timeout_duration: Duration,
    deadline: Pin<Box<Sleep>>,
}

impl<S> TimeoutStream<S> {
    pub fn new(inner: S, timeout_duration: Duration) -> Self {
        Self {
            inner,
            timeout_duration,
            deadline: Box::pin(tokio::time::sleep(timeout_duration)),
        }
    }
}

impl<S> Stream for TimeoutStream<S>
where
    S: Stream + Unpin,
{
    type Item = S::Item;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let timeout_duration = self.timeout_duration;

        match Pin::new(&mut self.inner).poll_next(cx) {
            Poll::Ready(Some(item)) => {
                self.deadline.as_mut().reset(Instant::now() + timeout_duration);
                Poll::Ready(Some(item))
            }
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => match self.deadline.as_mut().poll(cx) {
                Poll::Ready(()) => {
                    tracing::warn!(
                        timeout_secs = timeout_duration.as_secs(),
                        "WebSocket read timeout, no data received"
                    );
                    self.deadline.as_mut().reset(Instant::now() + timeout_duration);
                    Poll::Ready(None)
                }
                Poll::Pending => Poll::Pending,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::{StreamExt, stream};

    #[tokio::test(start_paused = true)]
    async fn test_silent_stream_ends_after_timeout() {
        let started = Instant::now();
        let mut stream = TimeoutStream::new(stream::pending::<u8>(), Duration::from_secs(120));

        assert_eq!(stream.next().await, None);
        assert_eq!(started.elapsed(), Duration::from_secs(120));
    }

    #[tokio::test(start_paused = true)]
    async fn test_items_reset_the_deadline() {
        let (tx, rx) = futures::channel::mpsc::unbounded::<u8>();
        let mut stream = TimeoutStream::new(rx, Duration::from_secs(10));

        tokio::spawn(async move {
            for item in 0..3 {
                tokio::time::sleep(Duration::from_secs(8)).await;
                let _ = tx.unbounded_send(item);
            }
            // Keep the sender alive so only the timeout can end the stream
            tokio::time::sleep(Duration::from_secs(3_600)).await;
            drop(tx);
        });

        let started = Instant::now();
        let items: Vec<u8> = stream.by_ref().collect().await;
        assert_eq!(items, vec![0, 1, 2]);
        assert_eq!(started.elapsed(), Duration::from_secs(34));
    }
}
