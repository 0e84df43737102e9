use thiserror::Error;
use uuid::Uuid;

use strand_types::models::ChatMessage;

/// Lifecycle of one open thread view.
///
/// Idle -> Streaming (tokens arriving) -> SyncPending (transcript differs
/// from the persisted snapshot) -> Saving -> Idle. Cancellation and stream
/// completion take the same path; a partial transcript saves like any other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Streaming,
    SyncPending,
    Saving,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("a stream is already active")]
    StreamActive,
    #[error("no active stream")]
    NotStreaming,
    #[error("truncation beyond transcript length")]
    BadTruncation,
}

/// What the controller must do after a transcript mutation: schedule a
/// debounced save, and possibly fire the one-time auto-rename.
#[derive(Debug, Default, PartialEq)]
pub struct SyncOutcome {
    pub save: Option<Vec<ChatMessage>>,
    pub rename: Option<String>,
}

/// Pure transcript state machine; all IO lives in the controller and queue.
pub struct ChatSession {
    thread_id: Uuid,
    transcript: Vec<ChatMessage>,
    /// Last snapshot known to be persisted; saves are skipped when the
    /// transcript matches it.
    last_saved: Vec<ChatMessage>,
    phase: Phase,
    title_applied: bool,
}

impl ChatSession {
    /// Open a session over a loaded thread. A transcript that already holds
    /// an exchange keeps its title; a fresh one gets auto-titled after the
    /// first reply.
    pub fn new(thread_id: Uuid, transcript: Vec<ChatMessage>) -> Self {
        let title_applied = transcript.len() >= 2;
        Self {
            thread_id,
            last_saved: transcript.clone(),
            transcript,
            phase: Phase::Idle,
            title_applied,
        }
    }

    pub fn thread_id(&self) -> Uuid {
        self.thread_id
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn transcript(&self) -> &[ChatMessage] {
        &self.transcript
    }

    /// Append the user's message plus an empty assistant entry and enter
    /// Streaming. Deltas accumulate into the assistant entry.
    pub fn begin_stream(
        &mut self,
        user_text: impl Into<String>,
        model: Option<String>,
    ) -> Result<(), SessionError> {
        if self.phase == Phase::Streaming {
            return Err(SessionError::StreamActive);
        }

        self.transcript.push(ChatMessage::user(user_text));
        let mut reply = ChatMessage::assistant("");
        reply.model = model;
        self.transcript.push(reply);
        self.phase = Phase::Streaming;
        Ok(())
    }

    pub fn append_delta(&mut self, text: &str) -> Result<(), SessionError> {
        if self.phase != Phase::Streaming {
            return Err(SessionError::NotStreaming);
        }
        if let Some(reply) = self.transcript.last_mut() {
            reply.content.push_str(text);
        }
        Ok(())
    }

    pub fn finish_stream(&mut self) -> Result<SyncOutcome, SessionError> {
        if self.phase != Phase::Streaming {
            return Err(SessionError::NotStreaming);
        }
        Ok(self.complete())
    }

    /// Stopping mid-flight keeps exactly what has accumulated; the partial
    /// transcript is eligible for the normal debounced save.
    pub fn cancel_stream(&mut self) -> Result<SyncOutcome, SessionError> {
        if self.phase != Phase::Streaming {
            return Err(SessionError::NotStreaming);
        }
        Ok(self.complete())
    }

    /// Edit/retry/branch: drop the continuation, keep a prefix. The caller
    /// re-enters Streaming with a fresh `begin_stream`.
    pub fn truncate_to(&mut self, len: usize) -> Result<SyncOutcome, SessionError> {
        if self.phase == Phase::Streaming {
            return Err(SessionError::StreamActive);
        }
        if len > self.transcript.len() {
            return Err(SessionError::BadTruncation);
        }

        self.transcript.truncate(len);
        Ok(self.sync_outcome(None))
    }

    fn complete(&mut self) -> SyncOutcome {
        // One-time rename after the first completed exchange: the transcript
        // holds exactly the first user message and its reply.
        let rename = if !self.title_applied && self.transcript.len() == 2 {
            self.title_applied = true;
            Some(self.transcript[0].content.clone())
        } else {
            None
        };

        self.sync_outcome(rename)
    }

    fn sync_outcome(&mut self, rename: Option<String>) -> SyncOutcome {
        // Change detection: a no-op mutation schedules nothing, leaving the
        // stored updated_at untouched.
        let save = if self.transcript != self.last_saved {
            self.phase = Phase::SyncPending;
            Some(self.transcript.clone())
        } else {
            self.phase = Phase::Idle;
            None
        };

        SyncOutcome { save, rename }
    }

    // Save lifecycle notifications, fed back from the save queue.

    pub fn note_saving(&mut self) {
        if self.phase == Phase::SyncPending {
            self.phase = Phase::Saving;
        }
    }

    pub fn note_saved(&mut self, snapshot: Vec<ChatMessage>) {
        self.last_saved = snapshot;
        // A superseding edit may already be pending behind the completed
        // save; only a clean transcript returns to Idle.
        if self.phase != Phase::Streaming {
            self.phase = if self.transcript == self.last_saved {
                Phase::Idle
            } else {
                Phase::SyncPending
            };
        }
    }

    pub fn note_save_failed(&mut self) {
        // Failed persistence never blocks chatting; the transcript stays
        // dirty and the next mutation retries through the queue.
        if self.phase == Phase::Saving {
            self.phase = Phase::SyncPending;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> ChatSession {
        ChatSession::new(Uuid::new_v4(), Vec::new())
    }

    #[test]
    fn stream_lifecycle_and_phases() {
        let mut s = session();
        assert_eq!(s.phase(), Phase::Idle);

        s.begin_stream("Hello", Some("gpt-4o-mini".into())).unwrap();
        assert_eq!(s.phase(), Phase::Streaming);
        assert_eq!(s.begin_stream("again", None), Err(SessionError::StreamActive));

        s.append_delta("Hi ").unwrap();
        s.append_delta("there").unwrap();

        let outcome = s.finish_stream().unwrap();
        assert_eq!(s.phase(), Phase::SyncPending);
        let saved = outcome.save.unwrap();
        assert_eq!(saved.len(), 2);
        assert_eq!(saved[1].content, "Hi there");
        assert_eq!(saved[1].model.as_deref(), Some("gpt-4o-mini"));

        s.note_saving();
        assert_eq!(s.phase(), Phase::Saving);
        s.note_saved(saved);
        assert_eq!(s.phase(), Phase::Idle);
    }

    #[test]
    fn first_exchange_triggers_one_time_rename() {
        let mut s = session();
        s.begin_stream("What is Rust?", None).unwrap();
        s.append_delta("A language.").unwrap();
        let outcome = s.finish_stream().unwrap();
        assert_eq!(outcome.rename.as_deref(), Some("What is Rust?"));

        s.note_saved(outcome.save.unwrap());

        // Second exchange: no rename.
        s.begin_stream("Tell me more", None).unwrap();
        let outcome = s.finish_stream().unwrap();
        assert_eq!(outcome.rename, None);
    }

    #[test]
    fn loaded_thread_is_never_auto_renamed() {
        let transcript = vec![ChatMessage::user("old"), ChatMessage::assistant("reply")];
        let mut s = ChatSession::new(Uuid::new_v4(), transcript);

        s.begin_stream("next", None).unwrap();
        let outcome = s.finish_stream().unwrap();
        assert_eq!(outcome.rename, None);
    }

    #[test]
    fn cancellation_keeps_partial_transcript() {
        let mut s = session();
        s.begin_stream("Hello", None).unwrap();
        s.append_delta("partial answ").unwrap();

        let outcome = s.cancel_stream().unwrap();
        let saved = outcome.save.unwrap();
        assert_eq!(saved[1].content, "partial answ");
        assert_eq!(s.phase(), Phase::SyncPending);
    }

    #[test]
    fn truncation_discards_continuation() {
        let mut s = session();
        s.begin_stream("q1", None).unwrap();
        s.append_delta("a1").unwrap();
        let o = s.finish_stream().unwrap();
        s.note_saved(o.save.unwrap());

        let outcome = s.truncate_to(1).unwrap();
        assert_eq!(s.transcript().len(), 1);
        assert_eq!(outcome.save.as_ref().unwrap().len(), 1);

        assert_eq!(s.truncate_to(5), Err(SessionError::BadTruncation));
    }

    #[test]
    fn no_op_mutation_schedules_nothing() {
        let mut s = session();
        s.begin_stream("q", None).unwrap();
        let o = s.finish_stream().unwrap();
        s.note_saved(o.save.unwrap());

        // Truncating to the full length changes nothing.
        let outcome = s.truncate_to(s.transcript().len()).unwrap();
        assert_eq!(outcome.save, None);
        assert_eq!(s.phase(), Phase::Idle);
    }

    #[test]
    fn save_failure_leaves_transcript_dirty() {
        let mut s = session();
        s.begin_stream("q", None).unwrap();
        s.finish_stream().unwrap();
        s.note_saving();
        s.note_save_failed();
        assert_eq!(s.phase(), Phase::SyncPending);
    }
}
