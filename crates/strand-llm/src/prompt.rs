use strand_types::models::{ChatMessage, Role};

/// Fixed formatting instruction sent with every conversation that does not
/// carry its own system message.
pub const FORMATTING_PROMPT: &str = "You are a helpful assistant. \
Format responses in Markdown. Use fenced code blocks with a language tag \
for code, and keep answers direct and well-structured.";

/// Per-user behavior adjustments, sourced from the user's saved settings.
#[derive(Debug, Clone, Default)]
pub struct Persona {
    pub nickname: Option<String>,
    pub personality: Option<String>,
}

impl Persona {
    pub fn is_empty(&self) -> bool {
        self.nickname.is_none() && self.personality.is_none()
    }
}

/// Prepend the fixed system prompt unless the conversation already has one.
/// Injection is idempotent: a list with a system entry is left untouched,
/// so repeated calls never stack prompts.
pub fn ensure_system_prompt(messages: &mut Vec<ChatMessage>, persona: Option<&Persona>) {
    if messages.iter().any(|m| m.role == Role::System) {
        return;
    }

    let mut content = String::from(FORMATTING_PROMPT);
    if let Some(p) = persona.filter(|p| !p.is_empty()) {
        if let Some(nickname) = &p.nickname {
            content.push_str(&format!(" The user calls you {nickname}."));
        }
        if let Some(personality) = &p.personality {
            content.push_str(&format!(" Behavior preferences: {personality}."));
        }
    }

    messages.insert(0, ChatMessage::system(content));
}
