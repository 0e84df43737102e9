//! Client-resident orchestration of one open conversation: local transcript
//! state, streaming lifecycle, and debounced persistence back to the thread
//! store. Persistence is reached through the [`TranscriptStore`] trait so the
//! same controller drives an HTTP client in production and a mock in tests.

pub mod controller;
pub mod saver;
pub mod session;

pub use controller::ChatController;
pub use saver::{SaveQueue, SaveStatus, TranscriptStore};
pub use session::{ChatSession, Phase, SessionError, SyncOutcome};
