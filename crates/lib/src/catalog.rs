//! Static model catalog: the models a thread can be switched to.
//!
//! The table is compiled in and read-only. The first entry is the default model
//! for new threads unless the configuration names another entry.

use serde::Serialize;

/// One selectable model: what the user sees and what is sent upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelEntry {
    pub display_name: &'static str,
    pub api_identifier: &'static str,
    pub description: &'static str,
}

static CATALOG: [ModelEntry; 6] = [
    ModelEntry {
        display_name: "DeepSeek V3",
        api_identifier: "deepseek/deepseek-chat-v3-0324",
        description: "General-purpose chat model with strong coding and reasoning.",
    },
    ModelEntry {
        display_name: "DeepSeek R1",
        api_identifier: "deepseek/deepseek-r1",
        description: "Reasoning model; slower, thinks before it answers.",
    },
    ModelEntry {
        display_name: "Llama 3.3 70B",
        api_identifier: "meta-llama/llama-3.3-70b-instruct",
        description: "Meta's multilingual instruction-tuned 70B model.",
    },
    ModelEntry {
        display_name: "Gemini 2.0 Flash",
        api_identifier: "google/gemini-2.0-flash-001",
        description: "Fast, low-latency model from Google with a long context window.",
    },
    ModelEntry {
        display_name: "Mistral Small 3.1",
        api_identifier: "mistralai/mistral-small-3.1-24b-instruct",
        description: "Compact 24B model, good for quick everyday questions.",
    },
    ModelEntry {
        display_name: "Qwen3 235B",
        api_identifier: "qwen/qwen3-235b-a22b",
        description: "Large mixture-of-experts model from Alibaba's Qwen team.",
    },
];

/// All catalog entries in display order.
pub fn models() -> &'static [ModelEntry] {
    &CATALOG
}

/// The default model for new threads (first catalog entry).
pub fn default_model() -> &'static ModelEntry {
    &CATALOG[0]
}

/// Look up an entry by its display name (exact match).
pub fn by_display_name(name: &str) -> Option<&'static ModelEntry> {
    CATALOG.iter().find(|m| m.display_name == name)
}

/// Look up an entry by the identifier sent to the completion service.
pub fn by_api_identifier(id: &str) -> Option<&'static ModelEntry> {
    CATALOG.iter().find(|m| m.api_identifier == id)
}

/// Resolve a user- or config-supplied model name: API identifier first, then display name
/// (display names are matched case-insensitively here since they are typed by hand).
pub fn resolve(name: &str) -> Option<&'static ModelEntry> {
    let name = name.trim();
    by_api_identifier(name).or_else(|| {
        CATALOG
            .iter()
            .find(|m| m.display_name.eq_ignore_ascii_case(name))
    })
}
