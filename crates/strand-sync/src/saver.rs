use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};
use uuid::Uuid;

use strand_types::models::ChatMessage;

/// Persistence seam between the controller and the thread store. Production
/// wires this to the HTTP thread service; tests use an in-memory mock.
pub trait TranscriptStore: Clone + Send + Sync + 'static {
    fn save_messages(
        &self,
        thread_id: Uuid,
        messages: Vec<ChatMessage>,
    ) -> impl Future<Output = anyhow::Result<DateTime<Utc>>> + Send;

    fn rename_thread(
        &self,
        thread_id: Uuid,
        title: String,
    ) -> impl Future<Output = anyhow::Result<()>> + Send;
}

#[derive(Debug, Clone, PartialEq)]
pub enum SaveStatus {
    Started,
    Saved {
        transcript: Vec<ChatMessage>,
        updated_at: DateTime<Utc>,
    },
    Failed {
        error: String,
    },
}

/// Timer-armed write-coalescing queue keyed by thread id.
///
/// Each thread gets one worker holding the latest snapshot in a watch
/// channel: rapid edits within the debounce window collapse into one write,
/// at most one save is in flight per thread, and a snapshot arriving during
/// a flight supersedes anything queued behind it. Saves always carry the
/// full transcript, so later writes subsume earlier ones.
pub struct SaveQueue<S> {
    store: S,
    debounce: Duration,
    status_tx: Option<mpsc::UnboundedSender<(Uuid, SaveStatus)>>,
    workers: Mutex<HashMap<Uuid, watch::Sender<Option<Vec<ChatMessage>>>>>,
}

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

impl<S: TranscriptStore> SaveQueue<S> {
    pub fn new(store: S, debounce: Duration) -> Self {
        Self {
            store,
            debounce,
            status_tx: None,
            workers: Mutex::new(HashMap::new()),
        }
    }

    /// Report save lifecycle events (used to drive the session phase).
    pub fn with_status(mut self, tx: mpsc::UnboundedSender<(Uuid, SaveStatus)>) -> Self {
        self.status_tx = Some(tx);
        self
    }

    /// Hand the queue the current full transcript for a thread. The write
    /// happens after a quiet window; a newer snapshot replaces this one.
    pub fn schedule(&self, thread_id: Uuid, transcript: Vec<ChatMessage>) {
        let mut workers = match self.workers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let transcript = if let Some(tx) = workers.get(&thread_id) {
            match tx.send(Some(transcript)) {
                Ok(()) => return,
                // Worker exited (shouldn't happen while the sender is held);
                // recover the snapshot, fall through and respawn.
                Err(watch::error::SendError(snapshot)) => snapshot.unwrap(),
            }
        } else {
            transcript
        };

        let (tx, rx) = watch::channel(None);
        tx.send_replace(Some(transcript));
        tokio::spawn(worker_loop(
            self.store.clone(),
            thread_id,
            rx,
            self.debounce,
            self.status_tx.clone(),
        ));
        workers.insert(thread_id, tx);
    }
}

async fn worker_loop<S: TranscriptStore>(
    store: S,
    thread_id: Uuid,
    mut rx: watch::Receiver<Option<Vec<ChatMessage>>>,
    debounce: Duration,
    status_tx: Option<mpsc::UnboundedSender<(Uuid, SaveStatus)>>,
) {
    let emit = |status: SaveStatus| {
        if let Some(tx) = &status_tx {
            let _ = tx.send((thread_id, status));
        }
    };

    loop {
        // Queue dropped with nothing pending: done.
        if !rx.has_changed().unwrap_or(false) && rx.changed().await.is_err() {
            break;
        }

        // Quiet window: superseding snapshots re-arm the timer. A closed
        // channel ends the wait so the final snapshot still flushes.
        loop {
            tokio::select! {
                _ = tokio::time::sleep(debounce) => break,
                changed = rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        let Some(snapshot) = rx.borrow_and_update().clone() else {
            continue;
        };

        emit(SaveStatus::Started);
        match store.save_messages(thread_id, snapshot.clone()).await {
            Ok(updated_at) => {
                debug!("Thread {} saved ({} messages)", thread_id, snapshot.len());
                emit(SaveStatus::Saved {
                    transcript: snapshot,
                    updated_at,
                });
            }
            Err(e) => {
                warn!("Thread {} save failed: {:#}", thread_id, e);
                emit(SaveStatus::Failed {
                    error: e.to_string(),
                });
            }
        }
    }
}
