//! Response quality scoring.
//!
//! A pure, deterministic score in `[0, 1]` for one candidate text against
//! the request analysis. Identical inputs always produce identical scores,
//! which keeps ranking and synthesis reproducible.

use chorus_common::analysis::RequestAnalysis;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

/// Texts shorter than this (in characters) look like non-answers.
pub const SHORT_TEXT_LIMIT: usize = 20;
pub const SHORT_TEXT_FACTOR: f64 = 0.5;
/// Texts longer than this tend to bury the answer.
pub const LONG_TEXT_LIMIT: usize = 1000;
pub const LONG_TEXT_FACTOR: f64 = 0.8;
/// Penalty when a structured answer was expected but none was given.
pub const STRUCTURE_FACTOR: f64 = 0.7;

/// Line breaks, bullets, or numbered points count as structure.
static STRUCTURE_MARKERS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n|•|-|\d\.").unwrap());

/// Score one candidate text. Lengths are measured in characters, not
/// bytes, so multibyte answers are judged by what the user actually sees.
pub fn score(text: &str, analysis: &RequestAnalysis) -> f64 {
    let mut quality: f64 = 1.0;

    let length = text.chars().count();
    if length < SHORT_TEXT_LIMIT {
        quality *= SHORT_TEXT_FACTOR;
    } else if length > LONG_TEXT_LIMIT {
        quality *= LONG_TEXT_FACTOR;
    }

    if !analysis.required_capabilities.is_empty() {
        let lower = text.to_lowercase();
        let words: HashSet<&str> = lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();
        let overlap = analysis
            .required_capabilities
            .iter()
            .filter(|cap| words.contains(cap.as_str()))
            .count();
        let fraction = overlap as f64 / analysis.required_capabilities.len() as f64;
        quality *= 0.5 + fraction.min(0.5);
    }

    if analysis.response_kind.expects_structure() && !STRUCTURE_MARKERS.is_match(text) {
        quality *= STRUCTURE_FACTOR;
    }

    quality.clamp(0.0, 1.0)
}
