//! Async stream of raw sensor values.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::stream::Stream;
use tokio::sync::mpsc;

/// Raw cumulative counter values delivered by a [`StepSensor`](crate::StepSensor).
///
/// The stream ends when the sensor side drops its sender, which is how
/// `unregister` is observed by consumers.
#[derive(Debug)]
pub struct SensorStream {
    receiver: mpsc::Receiver<u64>,
}

impl SensorStream {
    /// Wrap an mpsc receiver.
    pub fn new(receiver: mpsc::Receiver<u64>) -> Self {
        Self { receiver }
    }

    /// Create a connected sender/stream pair.
    pub fn channel(buffer: usize) -> (mpsc::Sender<u64>, Self) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (tx, Self::new(rx))
    }
}

impl Stream for SensorStream {
    type Item = u64;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.receiver).poll_recv(cx)
    }
}
