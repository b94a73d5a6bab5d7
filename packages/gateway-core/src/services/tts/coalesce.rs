//! Chunk coalescing (§4.4 "Chunk coalescing", §4.7 backpressure).
//!
//! Vendors emit varying sub-kilobyte chunks. A producer task drains the
//! vendor's raw stream and accumulates bytes until at least
//! [`crate::constants::TTS_COALESCE_MIN_BYTES`] have built up, then pushes
//! the accumulated chunk into a bounded queue. The queue bound provides
//! backpressure: a full queue blocks the producer until the writer drains
//! it. Dropping the receiver (writer gone) stops the producer at its next
//! send. A dedicated task pushes into a bounded `tokio::sync::mpsc`
//! channel, consumed downstream as a `Stream`.

use bytes::{Bytes, BytesMut};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;

use super::provider::{AudioStream, TtsError};
use crate::runtime::TaskSpawner;

/// Drains `raw` on a background task, coalescing into chunks of at least
/// `min_bytes`, and returns a `Stream` fed by the bounded queue of capacity
/// `queue_capacity`. The first error encountered ends the coalesced stream
/// after flushing whatever was buffered.
pub fn coalesce(
    mut raw: AudioStream,
    min_bytes: usize,
    queue_capacity: usize,
    spawner: &dyn TaskSpawner,
) -> impl tokio_stream::Stream<Item = Result<Bytes, TtsError>> + Send + 'static {
    let (tx, rx) = mpsc::channel::<Result<Bytes, TtsError>>(queue_capacity);

    spawner.spawn(async move {
        let mut buf = BytesMut::new();
        loop {
            match raw.next().await {
                Some(Ok(chunk)) => {
                    buf.extend_from_slice(&chunk);
                    if buf.len() >= min_bytes {
                        let out = buf.split().freeze();
                        if tx.send(Ok(out)).await.is_err() {
                            return; // writer gone
                        }
                    }
                }
                Some(Err(e)) => {
                    if !buf.is_empty() {
                        let out = buf.split().freeze();
                        let _ = tx.send(Ok(out)).await;
                    }
                    let _ = tx.send(Err(e)).await;
                    return;
                }
                None => {
                    if !buf.is_empty() {
                        let out = buf.split().freeze();
                        let _ = tx.send(Ok(out)).await;
                    }
                    return;
                }
            }
        }
    });

    ReceiverStream::new(rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::TokioSpawner;
    use futures::stream;

    fn test_stream(chunks: Vec<&'static [u8]>) -> AudioStream {
        Box::pin(stream::iter(
            chunks.into_iter().map(|c| Ok(Bytes::from_static(c))),
        ))
    }

    #[tokio::test]
    async fn coalesces_small_chunks_into_minimum_size() {
        let spawner = TokioSpawner::current();
        let raw = test_stream(vec![&[0u8; 400], &[0u8; 400], &[0u8; 400]]);
        let mut out = coalesce(raw, 1000, 8, &spawner);

        let first = out.next().await.unwrap().unwrap();
        assert!(first.len() >= 1000);
        // Remaining 200 bytes flush on stream end.
        let second = out.next().await.unwrap().unwrap();
        assert_eq!(second.len(), 200);
        assert!(out.next().await.is_none());
    }

    #[tokio::test]
    async fn flushes_remainder_on_end_even_if_under_minimum() {
        let spawner = TokioSpawner::current();
        let raw = test_stream(vec![&[1u8; 10]]);
        let mut out = coalesce(raw, 1024, 8, &spawner);
        let chunk = out.next().await.unwrap().unwrap();
        assert_eq!(chunk.len(), 10);
    }
}
