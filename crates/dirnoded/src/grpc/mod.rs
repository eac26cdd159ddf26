//! Generated gRPC types and the five service implementations that
//! multiplex behind dirnoded's single listener (C10, §4.10, §6).

pub mod dirnode {
    tonic::include_proto!("dirnode.v1");

    pub const FILE_DESCRIPTOR_SET: &[u8] = tonic::include_file_descriptor_set!("dirnode_descriptor");
}

pub mod sign;
pub mod routing;
pub mod search;
pub mod store;
pub mod sync;

/// Bounded channel depth used for every streaming RPC's response channel
/// (§5 "streaming RPCs use bounded channels (typical depth 1-16)").
pub const STREAM_CHANNEL_DEPTH: usize = 16;

use std::pin::Pin;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::{Stream, StreamExt};
use tonic::Status;

pub type RpcStream<T> = Pin<Box<dyn Stream<Item = Result<T, Status>> + Send + 'static>>;

/// Drives one client->server->client bidi stream (§5): a receiver task
/// pulls accepted requests off `inbound` in order, a handler task maps
/// each to a response (or a per-item error, which does not close the
/// stream — §7 "Local I/O errors on single-item bidi streams terminate
/// that item only"), and a sender task forwards responses to `outbound`
/// 1:1 in acceptance order. `outbound`'s bounded channel is the stream's
/// only backpressure: the handler stalls once it's full. Dropping the
/// caller's context (stream cancellation) drops `inbound`/`outbound` and
/// both tasks exit promptly.
pub fn spawn_stream_pipeline<Req, Resp, F, Fut>(
    mut inbound: tonic::Streaming<Req>,
    handler: F,
) -> RpcStream<Resp>
where
    Req: Send + 'static,
    Resp: Send + 'static,
    F: Fn(Req) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<Resp, Status>> + Send + 'static,
{
    let (tx, rx) = tokio::sync::mpsc::channel(STREAM_CHANNEL_DEPTH);
    let handler = std::sync::Arc::new(handler);
    tokio::spawn(async move {
        while let Some(item) = inbound.next().await {
            let handler = handler.clone();
            match item {
                Ok(req) => {
                    let result = handler(req).await;
                    if tx.send(result).await.is_err() {
                        break;
                    }
                }
                Err(status) => {
                    if tx.send(Err(status)).await.is_err() {
                        break;
                    }
                }
            }
        }
        // tx dropped here: the done signal for this stream.
    });
    Box::pin(ReceiverStream::new(rx))
}
