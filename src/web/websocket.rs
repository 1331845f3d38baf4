use super::AppState;
use crate::logging::LogStore;
use crate::types::LogEntry;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{sink::SinkExt, stream::StreamExt, Sink, Stream};
use serde::Serialize;
use std::fmt;
use tokio::sync::watch;
use tracing::{debug, error};

#[derive(Serialize, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WebSocketMessage {
    Snapshot { entries: Vec<LogEntry> },
}

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (sender, receiver) = socket.split();
    stream_snapshots(&state.store, sender, receiver).await;
}

/// Sends a snapshot message on subscribe and after every store change,
/// until the client closes or errors.
async fn stream_snapshots<S, R, E>(store: &LogStore, sender: S, mut receiver: R)
where
    S: Sink<Message> + Unpin + Send + 'static,
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: fmt::Display,
{
    // Each snapshot is the full sequence, so only the latest one is kept.
    let (snapshot_tx, snapshot_rx) = watch::channel(Vec::new());
    let subscription = store.subscribe(move |entries| {
        snapshot_tx.send_replace(entries);
    });
    debug!(
        "WebSocket client subscribed ({} observers)",
        store.observer_count()
    );

    let send_task = tokio::spawn(forward_snapshots(snapshot_rx, sender));

    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Close(_)) => {
                debug!("WebSocket client disconnected");
                break;
            }
            Err(e) => {
                error!("WebSocket error: {}", e);
                break;
            }
            _ => {}
        }
    }

    subscription.unsubscribe();
    send_task.abort();
}

/// Writes the latest snapshot to `sender` whenever it changes. Snapshots
/// replaced while a send is pending are skipped.
async fn forward_snapshots<S>(mut snapshots: watch::Receiver<Vec<LogEntry>>, mut sender: S)
where
    S: Sink<Message> + Unpin,
{
    while snapshots.changed().await.is_ok() {
        let entries = snapshots.borrow_and_update().clone();
        let json = match serde_json::to_string(&WebSocketMessage::Snapshot { entries }) {
            Ok(j) => j,
            Err(e) => {
                error!("Failed to serialize WebSocket message: {}", e);
                continue;
            }
        };

        if sender.send(Message::Text(json)).await.is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::channel::mpsc::{unbounded, UnboundedReceiver};
    use serde_json::{json, Value};
    use std::time::Duration;

    async fn next_snapshot(outgoing: &mut UnboundedReceiver<Message>) -> Vec<LogEntry> {
        let message = tokio::time::timeout(Duration::from_secs(5), outgoing.next())
            .await
            .expect("snapshot within timeout")
            .expect("socket still open");
        match message {
            Message::Text(text) => {
                let value: Value = serde_json::from_str(&text).unwrap();
                assert_eq!(value["type"], json!("snapshot"));
                serde_json::from_value(value["entries"].clone()).unwrap()
            }
            other => panic!("unexpected message {:?}", other),
        }
    }

    #[test]
    fn test_snapshot_message_shape() {
        let message = WebSocketMessage::Snapshot { entries: vec![] };
        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            json!({ "type": "snapshot", "entries": [] })
        );
    }

    #[tokio::test]
    async fn test_streams_snapshots_until_client_closes() {
        let store = LogStore::new();
        store.info("before connect", "ws", None);

        let (outgoing_tx, mut outgoing) = unbounded::<Message>();
        let (incoming, incoming_rx) = unbounded::<Result<Message, axum::Error>>();
        let session = tokio::spawn({
            let store = store.clone();
            async move { stream_snapshots(&store, outgoing_tx, incoming_rx).await }
        });

        let first = next_snapshot(&mut outgoing).await;
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].message, "before connect");
        assert_eq!(store.observer_count(), 1);

        store.warn("after connect", "ws", None);
        let second = next_snapshot(&mut outgoing).await;
        assert_eq!(second.len(), 2);
        assert_eq!(second[1].message, "after connect");

        store.clear();
        assert!(next_snapshot(&mut outgoing).await.is_empty());

        incoming.unbounded_send(Ok(Message::Close(None))).unwrap();
        session.await.unwrap();
        assert_eq!(store.observer_count(), 0);
    }

    #[tokio::test]
    async fn test_dropped_incoming_stream_unsubscribes() {
        let store = LogStore::new();
        let (outgoing_tx, _outgoing) = unbounded::<Message>();
        let (incoming, incoming_rx) = unbounded::<Result<Message, axum::Error>>();

        drop(incoming);
        stream_snapshots(&store, outgoing_tx, incoming_rx).await;
        assert_eq!(store.observer_count(), 0);
    }

    #[tokio::test]
    async fn test_stalled_client_only_gets_latest_snapshot() {
        let store = LogStore::new();
        let (snapshot_tx, snapshot_rx) = watch::channel(Vec::new());
        let subscription = store.subscribe(move |entries| {
            snapshot_tx.send_replace(entries);
        });
        for i in 0..50 {
            store.info(format!("burst {}", i), "ws", None);
        }

        let (outgoing_tx, mut outgoing) = unbounded::<Message>();
        let forwarder = tokio::spawn(forward_snapshots(snapshot_rx, outgoing_tx));

        let latest = next_snapshot(&mut outgoing).await;
        assert_eq!(latest.len(), 50);

        subscription.unsubscribe();
        forwarder.await.unwrap();
        assert!(outgoing.next().await.is_none());
    }
}
