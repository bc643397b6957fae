// ABOUTME: Forwards runtime output streams to caller-owned sinks on a dedicated task.
// ABOUTME: Closes each sink exactly once on completion, failure, or cancellation.

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::{Stream, StreamExt};
use parking_lot::Mutex;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use super::error::{ErrorKind, LifecycleError, Operation, RuntimeFailure, normalize};
use crate::runtime::{LogChunk, LogStream};
use crate::types::ContainerId;

/// Where relayed bytes are written.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Sink {
    /// The process's standard output.
    Stdout,
    /// The process's standard error.
    Stderr,
    /// Drop everything.
    #[default]
    Discard,
    /// An in-memory buffer the caller keeps a handle to.
    Buffer(SinkBuffer),
}

impl Sink {
    fn open(&self) -> Box<dyn AsyncWrite + Send + Unpin> {
        match self {
            Sink::Stdout => Box::new(tokio::io::stdout()),
            Sink::Stderr => Box::new(tokio::io::stderr()),
            Sink::Discard => Box::new(tokio::io::sink()),
            Sink::Buffer(buffer) => Box::new(BufferWriter(buffer.clone())),
        }
    }
}

/// Shared byte buffer that records how often it was closed.
#[derive(Clone, Default)]
pub struct SinkBuffer {
    inner: Arc<Mutex<BufferState>>,
}

#[derive(Default)]
struct BufferState {
    data: Vec<u8>,
    closes: usize,
}

impl SinkBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> Vec<u8> {
        self.inner.lock().data.clone()
    }

    pub fn contents_lossy(&self) -> String {
        String::from_utf8_lossy(&self.inner.lock().data).into_owned()
    }

    pub fn close_count(&self) -> usize {
        self.inner.lock().closes
    }
}

impl std::fmt::Debug for SinkBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.lock();
        f.debug_struct("SinkBuffer")
            .field("len", &state.data.len())
            .field("closes", &state.closes)
            .finish()
    }
}

// Buffers compare by identity: two handles are equal when they write to the same place.
impl PartialEq for SinkBuffer {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for SinkBuffer {}

struct BufferWriter(SinkBuffer);

impl AsyncWrite for BufferWriter {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.0.inner.lock().data.extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.0.inner.lock().closes += 1;
        Poll::Ready(Ok(()))
    }
}

/// How a relay ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RelayOutcome {
    /// The runtime closed the stream.
    #[default]
    Completed,
    /// The caller cancelled or dropped the session first.
    Cancelled,
}

/// Byte counts and outcome of a finished relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RelayReport {
    pub stdout_bytes: u64,
    pub stderr_bytes: u64,
    pub outcome: RelayOutcome,
}

/// A running relay.
///
/// Dropping the session cancels the relay; the task then closes its sinks
/// and exits on its own.
#[must_use = "dropping a relay session cancels the stream"]
pub struct RelaySession {
    cancel: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<Result<RelayReport, LifecycleError>>>,
    operation: Operation,
    handle: Option<ContainerId>,
}

impl RelaySession {
    /// Ask the relay to stop forwarding. Idempotent.
    pub fn cancel(&mut self) {
        if let Some(tx) = self.cancel.take() {
            let _ = tx.send(());
        }
    }

    /// Wait for the stream to end and the sinks to be closed.
    pub async fn finish(mut self) -> Result<RelayReport, LifecycleError> {
        let Some(task) = self.task.take() else {
            return Ok(RelayReport::default());
        };
        let joined = task.await;
        joined.map_err(|e| {
            LifecycleError::new(
                ErrorKind::Io,
                self.operation,
                self.handle.clone(),
                format!("relay task failed: {}", e),
            )
        })?
    }

    /// Cancel, then wait for the sinks to be closed.
    pub async fn cancel_and_finish(mut self) -> Result<RelayReport, LifecycleError> {
        self.cancel();
        self.finish().await
    }
}

/// Start relaying `stream` into `output` (stdout frames) and `error` (stderr frames).
///
/// Must be called within a tokio runtime.
pub fn spawn<S, E>(
    operation: Operation,
    handle: Option<ContainerId>,
    stream: S,
    output: Sink,
    error: Sink,
) -> RelaySession
where
    S: Stream<Item = Result<LogChunk, E>> + Send + Unpin + 'static,
    E: RuntimeFailure + Send + 'static,
{
    let (cancel_tx, cancel_rx) = oneshot::channel();
    let task = tokio::spawn(run(
        operation,
        handle.clone(),
        stream,
        output,
        error,
        cancel_rx,
    ));
    RelaySession {
        cancel: Some(cancel_tx),
        task: Some(task),
        operation,
        handle,
    }
}

async fn run<S, E>(
    operation: Operation,
    handle: Option<ContainerId>,
    mut stream: S,
    output: Sink,
    error: Sink,
    mut cancel: oneshot::Receiver<()>,
) -> Result<RelayReport, LifecycleError>
where
    S: Stream<Item = Result<LogChunk, E>> + Unpin,
    E: RuntimeFailure,
{
    // One writer per distinct sink, so a sink shared by both streams is closed once.
    let shared = output == error;
    let mut out = output.open();
    let mut err = if shared { None } else { Some(error.open()) };

    let mut report = RelayReport::default();
    let mut failure = None;

    loop {
        tokio::select! {
            biased;
            _ = &mut cancel => {
                report.outcome = RelayOutcome::Cancelled;
                break;
            }
            next = stream.next() => match next {
                Some(Ok(chunk)) => {
                    let len = chunk.data.len() as u64;
                    let writer = match (chunk.stream, err.as_mut()) {
                        (LogStream::Stderr, Some(err)) => err,
                        _ => &mut out,
                    };
                    if let Err(e) = writer.write_all(&chunk.data).await {
                        failure = Some(normalize(operation, handle.as_ref(), e));
                        break;
                    }
                    match chunk.stream {
                        LogStream::Stdout => report.stdout_bytes += len,
                        LogStream::Stderr => report.stderr_bytes += len,
                    }
                }
                Some(Err(e)) => {
                    failure = Some(normalize(operation, handle.as_ref(), e));
                    break;
                }
                None => break,
            }
        }
    }

    let mut close_result = out.shutdown().await;
    if let Some(mut err) = err {
        let closed = err.shutdown().await;
        close_result = close_result.and(closed);
    }

    match (failure, close_result) {
        (Some(failure), _) => Err(failure),
        (None, Err(e)) => Err(normalize(operation, handle.as_ref(), e)),
        (None, Ok(())) => Ok(report),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffers_compare_by_identity() {
        let a = SinkBuffer::new();
        let b = SinkBuffer::new();
        assert_eq!(Sink::Buffer(a.clone()), Sink::Buffer(a.clone()));
        assert_ne!(Sink::Buffer(a), Sink::Buffer(b));
    }

    #[tokio::test]
    async fn buffer_writer_counts_shutdowns() {
        let buffer = SinkBuffer::new();
        let mut writer = Sink::Buffer(buffer.clone()).open();
        writer.write_all(b"hello").await.unwrap();
        writer.shutdown().await.unwrap();
        assert_eq!(buffer.contents(), b"hello");
        assert_eq!(buffer.close_count(), 1);
    }
}
