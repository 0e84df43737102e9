use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::warn;
use uuid::Uuid;

use strand_types::models::ChatMessage;

use crate::saver::{DEFAULT_DEBOUNCE, SaveQueue, SaveStatus, TranscriptStore};
use crate::session::{ChatSession, Phase, SessionError, SyncOutcome};

/// Glue between the pure [`ChatSession`] state machine and the IO edges:
/// the debounced save queue and the one-shot rename call. One controller per
/// open thread view.
pub struct ChatController<S: TranscriptStore> {
    session: Arc<Mutex<ChatSession>>,
    store: S,
    queue: SaveQueue<S>,
    thread_id: Uuid,
}

impl<S: TranscriptStore> ChatController<S> {
    pub fn new(store: S, thread_id: Uuid, transcript: Vec<ChatMessage>) -> Self {
        Self::with_debounce(store, thread_id, transcript, DEFAULT_DEBOUNCE)
    }

    pub fn with_debounce(
        store: S,
        thread_id: Uuid,
        transcript: Vec<ChatMessage>,
        debounce: Duration,
    ) -> Self {
        let session = Arc::new(Mutex::new(ChatSession::new(thread_id, transcript)));

        // Save lifecycle events drive the session phase (Saving, back to
        // Idle, or back to SyncPending on failure).
        let (status_tx, mut status_rx) = mpsc::unbounded_channel();
        let queue = SaveQueue::new(store.clone(), debounce).with_status(status_tx);

        let session_for_status = Arc::clone(&session);
        tokio::spawn(async move {
            while let Some((_, status)) = status_rx.recv().await {
                let mut session = lock(&session_for_status);
                match status {
                    SaveStatus::Started => session.note_saving(),
                    SaveStatus::Saved { transcript, .. } => session.note_saved(transcript),
                    SaveStatus::Failed { .. } => session.note_save_failed(),
                }
            }
        });

        Self {
            session,
            store,
            queue,
            thread_id,
        }
    }

    pub fn phase(&self) -> Phase {
        lock(&self.session).phase()
    }

    pub fn transcript(&self) -> Vec<ChatMessage> {
        lock(&self.session).transcript().to_vec()
    }

    pub fn begin_stream(
        &self,
        user_text: impl Into<String>,
        model: Option<String>,
    ) -> Result<(), SessionError> {
        lock(&self.session).begin_stream(user_text, model)
    }

    pub fn append_delta(&self, text: &str) -> Result<(), SessionError> {
        lock(&self.session).append_delta(text)
    }

    pub fn finish_stream(&self) -> Result<(), SessionError> {
        let outcome = lock(&self.session).finish_stream()?;
        self.apply(outcome);
        Ok(())
    }

    pub fn cancel_stream(&self) -> Result<(), SessionError> {
        let outcome = lock(&self.session).cancel_stream()?;
        self.apply(outcome);
        Ok(())
    }

    pub fn truncate_to(&self, len: usize) -> Result<(), SessionError> {
        let outcome = lock(&self.session).truncate_to(len)?;
        self.apply(outcome);
        Ok(())
    }

    fn apply(&self, outcome: SyncOutcome) {
        if let Some(title) = outcome.rename {
            // Renames are one-shot and small; no debouncing, fire directly.
            let store = self.store.clone();
            let thread_id = self.thread_id;
            tokio::spawn(async move {
                if let Err(e) = store.rename_thread(thread_id, title).await {
                    warn!("Thread {} auto-rename failed: {:#}", thread_id, e);
                }
            });
        }

        if let Some(snapshot) = outcome.save {
            self.queue.schedule(self.thread_id, snapshot);
        }
    }
}

fn lock<T>(mutex: &Arc<Mutex<T>>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::saver::tests::MockStore;
    use strand_types::models::Role;

    fn controller(store: &MockStore) -> ChatController<MockStore> {
        ChatController::new(store.clone(), Uuid::new_v4(), Vec::new())
    }

    #[tokio::test(start_paused = true)]
    async fn first_exchange_saves_and_renames() {
        let store = MockStore::default();
        let ctl = controller(&store);

        ctl.begin_stream("Hello", None).unwrap();
        ctl.append_delta("Hi! How can I help?").unwrap();
        ctl.finish_stream().unwrap();
        assert_eq!(ctl.phase(), Phase::SyncPending);

        tokio::time::sleep(Duration::from_millis(400)).await;

        let saves = store.saved();
        assert_eq!(saves.len(), 1);
        let transcript = &saves[0].1;
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript[0].role, Role::User);
        assert_eq!(transcript[1].content, "Hi! How can I help?");

        // Scenario B: thread title becomes the first user message.
        assert_eq!(store.renamed(), vec![(ctl.thread_id, "Hello".to_string())]);
        assert_eq!(ctl.phase(), Phase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_stream_persists_partial_output() {
        let store = MockStore::default();
        let ctl = controller(&store);

        ctl.begin_stream("Explain lifetimes", None).unwrap();
        ctl.append_delta("Lifetimes are").unwrap();
        ctl.cancel_stream().unwrap();

        tokio::time::sleep(Duration::from_millis(400)).await;

        let saves = store.saved();
        assert_eq!(saves.len(), 1);
        assert_eq!(saves[0].1[1].content, "Lifetimes are");
    }

    #[tokio::test(start_paused = true)]
    async fn retry_truncates_and_restreams() {
        let store = MockStore::default();
        let ctl = controller(&store);

        ctl.begin_stream("q1", None).unwrap();
        ctl.append_delta("bad answer").unwrap();
        ctl.finish_stream().unwrap();
        tokio::time::sleep(Duration::from_millis(400)).await;

        // Retry: drop the reply, stream a replacement. Both mutations fall
        // inside one debounce window and coalesce.
        ctl.truncate_to(1).unwrap();
        ctl.begin_stream("q1 rephrased", None).unwrap();
        ctl.append_delta("better answer").unwrap();
        ctl.finish_stream().unwrap();
        tokio::time::sleep(Duration::from_millis(400)).await;

        let saves = store.saved();
        assert_eq!(saves.len(), 2);
        let last = &saves[1].1;
        assert_eq!(last.len(), 3);
        assert_eq!(last[2].content, "better answer");
    }

    #[tokio::test(start_paused = true)]
    async fn unchanged_transcript_is_not_resaved() {
        let store = MockStore::default();
        let ctl = controller(&store);

        ctl.begin_stream("q", None).unwrap();
        ctl.finish_stream().unwrap();
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(store.saved().len(), 1);

        // A no-op truncation schedules nothing new.
        ctl.truncate_to(2).unwrap();
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(store.saved().len(), 1);
        assert_eq!(ctl.phase(), Phase::Idle);
    }
}
