//! Prompt assembly for the answer path.

use chorus_common::config::BackendStrength;
use chorus_common::message::ConversationMessage;

use crate::capability::{TelemetrySnapshot, WeatherReport};

/// Base system prompt shared by every answering backend.
pub const ASSISTANT_PERSONA: &str = "You are a capable desktop assistant. \
Answer the user's latest message directly, using the conversation and any \
provided context. Be concise and concrete.";

/// System prompt tailored to what a backend is good at.
pub fn tailor_system_prompt(strength: BackendStrength) -> String {
    let emphasis = match strength {
        BackendStrength::Analytical => {
            "Optimize for analytical accuracy and structured output."
        }
        BackendStrength::Creative => {
            "Optimize for timely relevance and creative insight."
        }
    };
    format!("{ASSISTANT_PERSONA} {emphasis}")
}

/// Assemble the user prompt: optional context hints, the recent
/// conversation window, then the new utterance.
pub fn build_user_prompt(
    window: &[ConversationMessage],
    utterance: &str,
    hints: &[String],
) -> String {
    let mut prompt = String::new();
    for hint in hints {
        prompt.push_str(hint);
        prompt.push('\n');
    }
    if !hints.is_empty() {
        prompt.push('\n');
    }
    if !window.is_empty() {
        prompt.push_str("Conversation so far:\n");
        for message in window {
            prompt.push_str(&format!("{}: {}\n", message.role, message.content));
        }
        prompt.push('\n');
    }
    prompt.push_str(&format!("user: {utterance}"));
    prompt
}

pub fn telemetry_hint(snapshot: &TelemetrySnapshot) -> String {
    format!(
        "System Information:\nCPU Usage: {:.1}%\nMemory Usage: {:.1}%\nDisk Usage: {:.1}%",
        snapshot.cpu_percent, snapshot.memory_percent, snapshot.disk_percent
    )
}

pub fn weather_hint(report: &WeatherReport) -> String {
    format!(
        "Current weather in {}: {:.1}°C, {}, humidity {}%",
        report.city, report.temperature_c, report.description, report.humidity
    )
}

const SYSTEM_KEYWORDS: [&str; 5] = ["system", "cpu", "memory", "disk", "performance"];
const WEATHER_KEYWORDS: [&str; 3] = ["weather", "temperature", "forecast"];

/// Whether the utterance is asking about the local machine.
pub fn mentions_system(text: &str) -> bool {
    let lower = text.to_lowercase();
    SYSTEM_KEYWORDS.iter().any(|k| lower.contains(k))
}

/// Whether the utterance is asking about the weather.
pub fn mentions_weather(text: &str) -> bool {
    let lower = text.to_lowercase();
    WEATHER_KEYWORDS.iter().any(|k| lower.contains(k))
}

/// Pull a city out of "... in <city>" phrasing, falling back to the
/// configured default. Only the word right after "in" is taken.
pub fn extract_city(text: &str, default_city: &str) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    for pair in words.windows(2) {
        if pair[0].eq_ignore_ascii_case("in") {
            let city = pair[1].trim_matches(|c: char| !c.is_alphanumeric());
            if !city.is_empty() {
                return city.to_string();
            }
        }
    }
    default_city.to_string()
}
