//! Dual consumption of a streamed module source
//!
//! Streaming compilation has two consumers for one response body: the compiler
//! needs the bytes now, and the binary registry needs them later for
//! symbolication. The body can only be read once, so it is tee'd into two
//! independent chunk streams before either consumer starts. Both consumers and
//! the driver that feeds them run concurrently under one `join!`; neither path
//! waits head-of-line behind the other, and compilation latency is unchanged
//! by the capture.

use anyhow::{Context as _, Result};
use futures::channel::mpsc::{self, UnboundedReceiver};
use futures::{Future, Stream, StreamExt};
use std::io;
use wasmtime::{Engine, Module};

/// Chunked byte stream, the shape of a network response body.
pub type ByteChunk = Vec<u8>;

/// Split `source` into two identical chunk streams.
///
/// Returns the driver future plus the two receivers. The driver completes when
/// the source is exhausted, propagating the first source error; the receivers
/// then end. The driver must be polled concurrently with both consumers or
/// nothing flows.
pub(crate) fn tee<S>(
    source: S,
) -> (
    impl Future<Output = io::Result<()>>,
    UnboundedReceiver<ByteChunk>,
    UnboundedReceiver<ByteChunk>,
)
where
    S: Stream<Item = io::Result<ByteChunk>> + Unpin,
{
    let (compile_tx, compile_rx) = mpsc::unbounded();
    let (capture_tx, capture_rx) = mpsc::unbounded();

    let driver = async move {
        let mut source = source;
        while let Some(chunk) = source.next().await {
            let chunk = chunk?;
            // A consumer hanging up early (e.g. compile failed) is not an
            // error for the other one.
            let _ = compile_tx.unbounded_send(chunk.clone());
            let _ = capture_tx.unbounded_send(chunk);
        }
        Ok(())
    };

    (driver, compile_rx, capture_rx)
}

/// The streaming-compile delegate: consume chunks and hand the assembled
/// module source to the compiler.
pub(crate) async fn compile_chunks(
    engine: &Engine,
    mut chunks: UnboundedReceiver<ByteChunk>,
) -> Result<Module> {
    let mut source = Vec::new();
    while let Some(chunk) = chunks.next().await {
        source.extend_from_slice(&chunk);
    }
    Module::new(engine, &source).context("failed to compile streamed module")
}

/// The capture delegate: materialize the stream into one buffer for the
/// binary registry.
pub(crate) async fn materialize(mut chunks: UnboundedReceiver<ByteChunk>) -> Vec<u8> {
    let mut buffer = Vec::new();
    while let Some(chunk) = chunks.next().await {
        buffer.extend_from_slice(&chunk);
    }
    buffer
}
