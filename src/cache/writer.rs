//! Fire-and-forget writes to the durable tier.
//!
//! Requests never wait on the durable store. Writes go into a bounded queue
//! drained by one task; when the queue is full the write is dropped with a
//! warning, and store failures only show up in logs.

use crate::cache::durable::{DurableRecord, DurableStore};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

enum WriteOp {
    Put { key: String, record: DurableRecord },
    RecordMissing { query: String },
    Flush(oneshot::Sender<()>),
}

impl WriteOp {
    fn describe(&self) -> &str {
        match self {
            Self::Put { key, .. } => key,
            Self::RecordMissing { query } => query,
            Self::Flush(_) => "flush",
        }
    }
}

#[derive(Clone)]
pub struct DurableWriter {
    tx: mpsc::Sender<WriteOp>,
}

impl DurableWriter {
    /// Start the drain task. Must be called inside a tokio runtime.
    pub fn spawn(store: Arc<dyn DurableStore>, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        tokio::spawn(drain(store, rx));
        Self { tx }
    }

    pub fn put(&self, key: String, record: DurableRecord) {
        self.enqueue(WriteOp::Put { key, record });
    }

    pub fn record_missing(&self, query: String) {
        self.enqueue(WriteOp::RecordMissing { query });
    }

    /// Wait until every write queued before this call has been attempted.
    pub async fn flush(&self) {
        let (done, rx) = oneshot::channel();
        if self.tx.send(WriteOp::Flush(done)).await.is_ok() {
            let _ = rx.await;
        }
    }

    fn enqueue(&self, op: WriteOp) {
        match self.tx.try_send(op) {
            Ok(()) => {}
            Err(TrySendError::Full(op)) => {
                warn!(target_key = op.describe(), "Durable write queue full, dropping write");
            }
            Err(TrySendError::Closed(op)) => {
                debug!(target_key = op.describe(), "Durable writer stopped, dropping write");
            }
        }
    }
}

async fn drain(store: Arc<dyn DurableStore>, mut rx: mpsc::Receiver<WriteOp>) {
    while let Some(op) = rx.recv().await {
        match op {
            WriteOp::Put { key, record } => {
                if let Err(e) = store.put(&key, &record).await {
                    warn!(key = %key, error = %e, "Durable write failed");
                }
            }
            WriteOp::RecordMissing { query } => match store.record_missing(&query, Utc::now()).await {
                Ok(record) if record.flagged => {
                    info!(query = %query, count = record.count, "Search keeps returning nothing, flagged");
                }
                Ok(record) => debug!(query = %query, count = record.count, "Recorded empty search"),
                Err(e) => warn!(query = %query, error = %e, "Failed to record empty search"),
            },
            WriteOp::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
    debug!("Durable writer stopped");
}
