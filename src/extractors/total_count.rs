//! Result-count extraction
//!
//! The count is located by an ordered list of strategies. The first one that
//! returns a value wins; results are never combined.

use regex::Regex;
use scraper::{Html, Selector};

use super::document::{compile_selectors, element_text, visible_text_nodes};
use crate::config::ExtractionConfig;
use crate::error::{Result, ScraperError};

/// Longest text accepted as a count. Keeps whole paragraphs that happen to
/// mention "results" out of the field.
const MAX_COUNT_TEXT_LEN: usize = 120;

pub struct CountRules {
    selectors: Vec<Selector>,
    pattern: Regex,
    word: Regex,
}

impl CountRules {
    pub fn from_config(config: &ExtractionConfig) -> Result<Self> {
        let words: Vec<String> = config
            .count_words
            .iter()
            .map(|w| w.trim().to_lowercase())
            .filter(|w| !w.is_empty())
            .collect();
        let alternation = if words.is_empty() {
            "results?".to_string()
        } else {
            words.iter().map(|w| regex::escape(w)).collect::<Vec<_>>().join("|")
        };
        let compile = |pattern: String| {
            Regex::new(&pattern).map_err(|e| ScraperError::Config(format!("count pattern: {e}")))
        };

        Ok(Self {
            selectors: compile_selectors(&config.count_selectors),
            pattern: compile(format!(r"(?i)\d[\d.,]*\s*(?:{alternation})\b"))?,
            word: compile(format!(r"(?i)\b(?:{alternation})\b"))?,
        })
    }

    fn looks_like_count(&self, text: &str) -> bool {
        text.chars().count() <= MAX_COUNT_TEXT_LEN && self.pattern.is_match(text)
    }

    /// Whole-word match, so "ads" does not hit "downloads".
    fn mentions_results(&self, text: &str) -> bool {
        self.word.is_match(text)
    }
}

pub struct CountStrategy {
    pub name: &'static str,
    pub run: fn(&Html, &CountRules) -> Option<String>,
}

/// Strategies in priority order.
pub const COUNT_STRATEGIES: [CountStrategy; 2] = [
    CountStrategy {
        name: "structural_selectors",
        run: structural_selectors,
    },
    CountStrategy {
        name: "text_scan",
        run: text_scan,
    },
];

/// Run the strategies in order; `None` means no strategy found a count.
pub fn find_total_count(document: &Html, rules: &CountRules) -> Option<String> {
    COUNT_STRATEGIES.iter().find_map(|strategy| {
        let found = (strategy.run)(document, rules);
        match &found {
            Some(text) => tracing::debug!(strategy = strategy.name, count = %text, "Found result count"),
            None => tracing::debug!(strategy = strategy.name, "No result count"),
        }
        found
    })
}

/// Known heading/class selectors whose text reads like "36 results".
pub fn structural_selectors(document: &Html, rules: &CountRules) -> Option<String> {
    rules.selectors.iter().find_map(|selector| {
        document
            .select(selector)
            .map(|el| single_line(&element_text(&el)))
            .find(|text| rules.looks_like_count(text))
    })
}

/// Any text node mentioning a result word that also carries a digit.
pub fn text_scan(document: &Html, rules: &CountRules) -> Option<String> {
    visible_text_nodes(&document.root_element())
        .filter(|text| text.chars().count() <= MAX_COUNT_TEXT_LEN)
        .find(|text| rules.mentions_results(text) && text.chars().any(|c| c.is_ascii_digit()))
        .map(single_line)
}

fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
