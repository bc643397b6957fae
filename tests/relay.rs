// ABOUTME: Integration tests for the stream relay.
// ABOUTME: Checks frame routing, ordering, sink closing, and cancellation.

use dockyard::orchestration::{ErrorKind, Operation, RelayOutcome, Sink, SinkBuffer, spawn_relay};
use dockyard::runtime::{LogChunk, LogError};
use dockyard::types::ContainerId;
use futures::stream;
use futures::StreamExt;

fn frames(chunks: Vec<LogChunk>) -> impl futures::Stream<Item = Result<LogChunk, LogError>> + Send + Unpin {
    stream::iter(chunks.into_iter().map(Ok))
}

#[tokio::test]
async fn frames_are_routed_in_order() {
    let out = SinkBuffer::new();
    let err = SinkBuffer::new();
    let chunks = vec![
        LogChunk::stdout("1"),
        LogChunk::stderr("a"),
        LogChunk::stdout("2"),
        LogChunk::stderr("b"),
        LogChunk::stdout("3"),
    ];

    let report = spawn_relay(
        Operation::Logs,
        None,
        frames(chunks),
        Sink::Buffer(out.clone()),
        Sink::Buffer(err.clone()),
    )
    .finish()
    .await
    .unwrap();

    assert_eq!(out.contents(), b"123");
    assert_eq!(err.contents(), b"ab");
    assert_eq!(report.stdout_bytes, 3);
    assert_eq!(report.stderr_bytes, 2);
    assert_eq!(report.outcome, RelayOutcome::Completed);
}

#[tokio::test]
async fn shared_sink_keeps_interleaving_and_closes_once() {
    let combined = SinkBuffer::new();
    let chunks = vec![
        LogChunk::stdout("out-1 "),
        LogChunk::stderr("err-1 "),
        LogChunk::stdout("out-2"),
    ];

    spawn_relay(
        Operation::Attach,
        None,
        frames(chunks),
        Sink::Buffer(combined.clone()),
        Sink::Buffer(combined.clone()),
    )
    .finish()
    .await
    .unwrap();

    assert_eq!(combined.contents_lossy(), "out-1 err-1 out-2");
    assert_eq!(combined.close_count(), 1);
}

#[tokio::test]
async fn empty_stream_still_closes_sinks() {
    let out = SinkBuffer::new();
    let err = SinkBuffer::new();

    let report = spawn_relay(
        Operation::Logs,
        None,
        frames(Vec::new()),
        Sink::Buffer(out.clone()),
        Sink::Buffer(err.clone()),
    )
    .finish()
    .await
    .unwrap();

    assert_eq!(report.stdout_bytes + report.stderr_bytes, 0);
    assert_eq!(out.close_count(), 1);
    assert_eq!(err.close_count(), 1);
}

#[tokio::test]
async fn stream_failure_keeps_delivered_bytes() {
    let out = SinkBuffer::new();
    let err = SinkBuffer::new();
    let id = ContainerId::new("abcdef0123456789");
    let broken = stream::iter(vec![
        Ok(LogChunk::stdout("before ")),
        Err(LogError::StreamError("connection reset".to_string())),
        Ok(LogChunk::stdout("after")),
    ]);

    let failure = spawn_relay(
        Operation::Attach,
        Some(id.clone()),
        broken,
        Sink::Buffer(out.clone()),
        Sink::Buffer(err.clone()),
    )
    .finish()
    .await
    .unwrap_err();

    assert_eq!(failure.kind(), ErrorKind::Io);
    assert_eq!(failure.operation(), Operation::Attach);
    assert_eq!(failure.handle(), Some(&id));
    assert!(failure.message().contains("connection reset"));
    assert_eq!(out.contents(), b"before ");
    assert_eq!(out.close_count(), 1);
    assert_eq!(err.close_count(), 1);
}

#[tokio::test]
async fn cancel_stops_an_open_stream() {
    let out = SinkBuffer::new();
    let err = SinkBuffer::new();
    let endless = frames(vec![LogChunk::stdout("ready\n")]).chain(stream::pending());

    let mut session = spawn_relay(
        Operation::Logs,
        None,
        endless,
        Sink::Buffer(out.clone()),
        Sink::Buffer(err.clone()),
    );
    session.cancel();
    session.cancel();
    let report = session.finish().await.unwrap();

    assert_eq!(report.outcome, RelayOutcome::Cancelled);
    assert_eq!(out.close_count(), 1);
    assert_eq!(err.close_count(), 1);
}

#[tokio::test]
async fn dropping_the_session_closes_sinks() {
    let out = SinkBuffer::new();
    let endless = frames(Vec::new()).chain(stream::pending());

    drop(spawn_relay(
        Operation::Logs,
        None,
        endless,
        Sink::Buffer(out.clone()),
        Sink::Discard,
    ));

    for _ in 0..100 {
        if out.close_count() == 1 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    assert_eq!(out.close_count(), 1);
}
