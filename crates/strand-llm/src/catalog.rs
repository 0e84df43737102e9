/// Static model catalog: provider model id to a plain capability descriptor.
/// Rendering concerns (icons, grouping) belong to the UI, not here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelSpec {
    pub id: &'static str,
    pub display_name: &'static str,
    /// Accepts image input.
    pub vision: bool,
    /// Emits extended reasoning before the answer.
    pub reasoning: bool,
    /// Low-latency tier, suitable as a default.
    pub fast: bool,
}

pub const MODELS: &[ModelSpec] = &[
    ModelSpec {
        id: "gpt-4o",
        display_name: "GPT-4o",
        vision: true,
        reasoning: false,
        fast: false,
    },
    ModelSpec {
        id: "gpt-4o-mini",
        display_name: "GPT-4o mini",
        vision: true,
        reasoning: false,
        fast: true,
    },
    ModelSpec {
        id: "o4-mini",
        display_name: "o4-mini",
        vision: false,
        reasoning: true,
        fast: true,
    },
    ModelSpec {
        id: "llama-3.3-70b-versatile",
        display_name: "Llama 3.3 70B",
        vision: false,
        reasoning: false,
        fast: true,
    },
    ModelSpec {
        id: "deepseek-r1-distill-llama-70b",
        display_name: "DeepSeek R1 70B",
        vision: false,
        reasoning: true,
        fast: false,
    },
];

pub fn find_model(id: &str) -> Option<&'static ModelSpec> {
    MODELS.iter().find(|m| m.id == id)
}
