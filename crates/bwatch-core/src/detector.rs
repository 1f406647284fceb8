//! Classroom-code detection.
//!
//! Codes follow a fixed grammar: one digit 1–5 followed by two uppercase
//! letters, anchored on word boundaries (`1AA`, `3BC`, `5XY`).

use std::collections::BTreeSet;

use regex::Regex;

pub struct ClassCodeDetector {
    pattern: Regex,
}

impl ClassCodeDetector {
    pub fn new() -> Self {
        Self {
            pattern: Regex::new(r"\b[1-5][A-Z]{2}\b").expect("valid regex"),
        }
    }

    /// Unique codes mentioned in `text`, sorted for stable display.
    pub fn detect(&self, text: &str) -> BTreeSet<String> {
        self.pattern
            .find_iter(text)
            .map(|m| m.as_str().to_string())
            .collect()
    }
}

impl Default for ClassCodeDetector {
    fn default() -> Self {
        Self::new()
    }
}
