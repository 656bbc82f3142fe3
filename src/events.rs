//! Progress/event bus types (spec 4's event bus component, schema in 6).
//!
//! Events for one `DownloadItem` are delivered in order; events across items
//! are interleaved. The bus itself is a thin `tokio::sync::mpsc` wrapper so
//! the orchestrator and download queue can emit from multiple tasks while a
//! single subscriber drains an ordered stream.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::coordinate::Coordinate;
use crate::model::dependency::DependencyNode;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Event {
    Status {
        phase: Phase,
        message: String,
    },
    Progress {
        id: String,
        name: String,
        version: String,
        bytes_done: u64,
        bytes_total: u64,
        speed: f64,
        percent: f64,
    },
    DepsResolved {
        original: Vec<Coordinate>,
        all: Vec<Coordinate>,
        trees: Vec<DependencyNode>,
        failed: Vec<FailedCoordinate>,
    },
    ItemComplete {
        id: String,
        name: String,
        version: String,
        status: String,
    },
    Complete {
        success: bool,
        output_path: String,
        stats: CompleteStats,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Resolving,
    Downloading,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedCoordinate {
    pub coord: Coordinate,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompleteStats {
    pub total_items: usize,
    pub completed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub duration_ms: u64,
    pub total_bytes: u64,
}

/// Sending half, cloned into every task that needs to emit events.
#[derive(Clone)]
pub struct EventSender(mpsc::Sender<Event>);

impl EventSender {
    /// Events are best-effort: a dropped receiver (caller stopped listening)
    /// must not fail the job, and a full channel must not block the caller
    /// indefinitely, so a blocking `try_send` failure is retried on a spawned
    /// task rather than awaited in place.
    pub fn send(&self, event: Event) {
        match self.0.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                let sender = self.0.clone();
                tokio::spawn(async move {
                    let _ = sender.send(event).await;
                });
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }
}

/// Creates a bounded channel and returns the sender plus a stream the caller
/// can poll for events, per the `download(job) -> stream<Event>` interface.
#[must_use]
pub fn event_channel(capacity: usize) -> (EventSender, ReceiverStream<Event>) {
    let (tx, rx) = mpsc::channel(capacity);
    (EventSender(tx), ReceiverStream::new(rx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    #[tokio::test]
    async fn events_are_delivered_in_send_order() {
        let (tx, mut stream) = event_channel(8);
        tx.send(Event::Status {
            phase: Phase::Resolving,
            message: "starting".into(),
        });
        tx.send(Event::Status {
            phase: Phase::Downloading,
            message: "done resolving".into(),
        });
        drop(tx);

        let first = stream.next().await.unwrap();
        let second = stream.next().await.unwrap();
        assert!(matches!(first, Event::Status { phase: Phase::Resolving, .. }));
        assert!(matches!(second, Event::Status { phase: Phase::Downloading, .. }));
    }
}
