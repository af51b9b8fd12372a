//! Request analysis produced ahead of backend fan-out.
//!
//! The analyzer asks a model for this structure as strict JSON; every
//! field carries a defensive default so a partial or garbled reply still
//! yields a usable analysis instead of an error.

use serde::{Deserialize, Serialize};

/// What shape of answer the request calls for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", from = "String")]
pub enum ResponseKind {
    Factual,
    Creative,
    Analytical,
    Procedural,
    General,
}

impl ResponseKind {
    /// Lenient parse; unknown labels collapse to `General`.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "factual" => Self::Factual,
            "creative" => Self::Creative,
            "analytical" => Self::Analytical,
            "procedural" => Self::Procedural,
            _ => Self::General,
        }
    }

    /// Kinds that are expected to show visible structure (lists, steps).
    pub fn expects_structure(&self) -> bool {
        matches!(self, Self::Analytical | Self::Procedural)
    }
}

impl From<String> for ResponseKind {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl Default for ResponseKind {
    fn default() -> Self {
        Self::General
    }
}

/// Model-assessed profile of a request, driving backend selection,
/// scoring and synthesis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestAnalysis {
    /// 0.0 (trivial) to 1.0 (multi-part reasoning).
    #[serde(default = "default_complexity")]
    pub complexity: f64,

    /// Capability tokens the answer should demonstrate.
    #[serde(default = "default_capabilities")]
    pub required_capabilities: Vec<String>,

    #[serde(default = "default_topic")]
    pub topic_category: String,

    #[serde(default, rename = "response_type")]
    pub response_kind: ResponseKind,

    /// 0.0 (timeless) to 1.0 (needs fresh data).
    #[serde(default = "default_time_sensitivity")]
    pub time_sensitivity: f64,
}

fn default_complexity() -> f64 {
    0.5
}

fn default_capabilities() -> Vec<String> {
    vec!["general".to_string()]
}

fn default_topic() -> String {
    "general".to_string()
}

fn default_time_sensitivity() -> f64 {
    0.5
}

impl Default for RequestAnalysis {
    fn default() -> Self {
        Self {
            complexity: default_complexity(),
            required_capabilities: default_capabilities(),
            topic_category: default_topic(),
            response_kind: ResponseKind::default(),
            time_sensitivity: default_time_sensitivity(),
        }
    }
}

impl RequestAnalysis {
    /// Clamp numeric fields into range and lowercase capability tokens.
    /// Model output is untrusted; this runs on every parsed analysis.
    pub fn normalized(mut self) -> Self {
        self.complexity = self.complexity.clamp(0.0, 1.0);
        self.time_sensitivity = self.time_sensitivity.clamp(0.0, 1.0);
        for cap in &mut self.required_capabilities {
            *cap = cap.trim().to_lowercase();
        }
        self.required_capabilities.retain(|c| !c.is_empty());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_fallback_profile() {
        let analysis = RequestAnalysis::default();
        assert_eq!(analysis.complexity, 0.5);
        assert_eq!(analysis.required_capabilities, vec!["general"]);
        assert_eq!(analysis.topic_category, "general");
        assert_eq!(analysis.response_kind, ResponseKind::General);
        assert_eq!(analysis.time_sensitivity, 0.5);
    }

    #[test]
    fn partial_json_fills_missing_fields() {
        let analysis: RequestAnalysis =
            serde_json::from_str(r#"{"complexity": 0.9, "response_type": "analytical"}"#).unwrap();
        assert_eq!(analysis.complexity, 0.9);
        assert_eq!(analysis.response_kind, ResponseKind::Analytical);
        assert_eq!(analysis.required_capabilities, vec!["general"]);
    }

    #[test]
    fn unknown_response_type_collapses_to_general() {
        let analysis: RequestAnalysis =
            serde_json::from_str(r#"{"response_type": "informational"}"#).unwrap();
        assert_eq!(analysis.response_kind, ResponseKind::General);
    }

    #[test]
    fn normalized_clamps_out_of_range_values() {
        let analysis = RequestAnalysis {
            complexity: 3.2,
            time_sensitivity: -0.4,
            required_capabilities: vec![" Code ".to_string(), "".to_string()],
            ..RequestAnalysis::default()
        }
        .normalized();
        assert_eq!(analysis.complexity, 1.0);
        assert_eq!(analysis.time_sensitivity, 0.0);
        assert_eq!(analysis.required_capabilities, vec!["code"]);
    }

    #[test]
    fn structure_expectation_tracks_kind() {
        assert!(ResponseKind::Analytical.expects_structure());
        assert!(ResponseKind::Procedural.expects_structure());
        assert!(!ResponseKind::Creative.expects_structure());
        assert!(!ResponseKind::General.expects_structure());
    }
}
