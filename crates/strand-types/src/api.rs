use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::ChatMessage;

// -- Session claims --

/// Bearer-token claims shared by the REST middleware and the chat gateway.
/// Canonical definition lives here in strand-types to eliminate duplication.
/// Tokens are issued by the external identity provider; this service only
/// validates them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the owning user's identifier, opaque to this service.
    pub sub: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
    pub exp: usize,
}

// -- Threads --

/// Sidebar listing entry; the transcript is omitted to keep the list cheap.
#[derive(Debug, Serialize, Deserialize)]
pub struct ThreadSummary {
    pub id: Uuid,
    pub title: String,
    pub pinned: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ThreadResponse {
    pub id: Uuid,
    pub title: String,
    pub messages: Vec<ChatMessage>,
    pub pinned: bool,
    pub share_id: Uuid,
    pub require_auth: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Public view of a shared thread. The owner's identity and the private
/// thread id stay hidden; `require_auth` is returned so the viewing layer
/// can gate display (gating is a UI concern, not store-level access control).
#[derive(Debug, Serialize, Deserialize)]
pub struct SharedThreadResponse {
    pub title: String,
    pub messages: Vec<ChatMessage>,
    pub require_auth: bool,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SaveMessagesRequest {
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SaveMessagesResponse {
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RenameThreadRequest {
    pub title: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SetPinnedRequest {
    pub pinned: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SetRequireAuthRequest {
    pub require_auth: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RotateShareResponse {
    pub share_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BranchThreadRequest {
    pub title: String,
    /// Already-truncated transcript prefix to seed the fork with.
    pub messages: Vec<ChatMessage>,
}

// -- Chat gateway --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub model: Option<String>,
}

// -- User settings --

#[derive(Debug, Serialize, Deserialize)]
pub struct AiSettingsResponse {
    pub ai_nickname: Option<String>,
    pub ai_personality: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateAiSettingsRequest {
    #[serde(default)]
    pub ai_nickname: Option<String>,
    #[serde(default)]
    pub ai_personality: Option<String>,
}
