//! Result records handed to the presentation layer
//!
//! The serialized shape is the downloadable JSON document. Its keys match
//! the files the tool has always produced (`total_resultados`, `anuncios`,
//! `texto`, `erro`); English names are accepted when reading.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::error::ScraperError;

/// Count value when no strategy located a result count.
pub const TOTAL_NOT_FOUND: &str = "not found";

/// Count value for API lookups made without a credential.
pub const TOTAL_UNKNOWN_WITHOUT_CREDENTIAL: &str = "unknown without credential";

/// Snippet for ads that carry no creative text.
pub const SNIPPET_PLACEHOLDER: &str = "N/A";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub timestamp: DateTime<Local>,
    #[serde(rename = "url", alias = "sourceUrl")]
    pub source_url: String,
    #[serde(rename = "total_resultados", alias = "totalCount")]
    pub total_count: Option<String>,
    #[serde(rename = "anuncios", alias = "ads", default)]
    pub ads: Vec<AdRecord>,
    #[serde(
        rename = "erro",
        alias = "error",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub error: Option<String>,
    #[serde(
        rename = "mensagem",
        alias = "message",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub message: Option<String>,
}

impl ExtractionResult {
    pub fn new(source_url: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now(),
            source_url: source_url.into(),
            total_count: None,
            ads: Vec::new(),
            error: None,
            message: None,
        }
    }

    /// A request that died on transport: no count, no ads, only the error.
    pub fn failed(source_url: impl Into<String>, err: &ScraperError) -> Self {
        Self {
            error: Some(err.to_string()),
            ..Self::new(source_url)
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdRecord {
    /// 1-based discovery position within the result.
    pub index: usize,
    pub id: String,
    #[serde(rename = "texto", alias = "snippetText")]
    pub snippet_text: String,
    #[serde(
        rename = "url",
        alias = "sourceLink",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub source_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_start_time: Option<String>,
}

impl AdRecord {
    /// Builds a record, falling back to `card_<index>` for a missing id and to
    /// the placeholder for blank text, and cutting the text to `snippet_chars`.
    pub fn new(
        index: usize,
        id: Option<String>,
        text: &str,
        source_link: Option<String>,
        snippet_chars: usize,
    ) -> Self {
        let id = id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| synthetic_id(index));
        let text = text.trim();
        let snippet_text = if text.is_empty() {
            SNIPPET_PLACEHOLDER.to_string()
        } else {
            truncate_chars(text, snippet_chars).to_string()
        };

        Self {
            index,
            id,
            snippet_text,
            source_link,
            creation_time: None,
            delivery_start_time: None,
        }
    }
}

pub fn synthetic_id(index: usize) -> String {
    format!("card_{index}")
}

/// Prefix of at most `max_chars` characters. Shorter input is returned whole.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_pos, _)) => &text[..byte_pos],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_chars_bounds() {
        assert_eq!(truncate_chars("", 5), "");
        assert_eq!(truncate_chars("abc", 5), "abc");
        assert_eq!(truncate_chars("abcde", 5), "abcde");
        assert_eq!(truncate_chars("abcdef", 5), "abcde");
        // multi-byte characters are counted, not bytes
        assert_eq!(truncate_chars("anúncios", 3), "anú");

        let long = "x".repeat(5000);
        for cap in [1, 50, 500, 1000] {
            assert_eq!(truncate_chars(&long, cap).chars().count(), cap);
        }
    }

    #[test]
    fn test_ad_record_fallbacks() {
        let ad = AdRecord::new(3, None, "  some text  ", None, 500);
        assert_eq!(ad.id, "card_3");
        assert_eq!(ad.snippet_text, "some text");

        let ad = AdRecord::new(1, Some("  ".into()), "", None, 500);
        assert_eq!(ad.id, "card_1");
        assert_eq!(ad.snippet_text, SNIPPET_PLACEHOLDER);
    }

    #[test]
    fn test_failed_result_is_empty() {
        let err = ScraperError::Navigation("timed out".into());
        let result = ExtractionResult::failed("https://example.com", &err);
        assert!(result.is_error());
        assert!(result.ads.is_empty());
        assert!(result.total_count.is_none());
        assert_eq!(result.error.as_deref(), Some("Navigation failed: timed out"));
    }

    #[test]
    fn test_serialized_keys() {
        let mut result = ExtractionResult::new("https://example.com/lib");
        result.total_count = Some("36 results".into());
        result.ads.push(AdRecord::new(1, Some("42".into()), "text", None, 500));

        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["url"], "https://example.com/lib");
        assert_eq!(value["total_resultados"], "36 results");
        assert_eq!(value["anuncios"][0]["index"], 1);
        assert_eq!(value["anuncios"][0]["id"], "42");
        assert_eq!(value["anuncios"][0]["texto"], "text");
        assert!(value["anuncios"][0].get("url").is_none());
        assert!(value.get("erro").is_none());
        assert!(value.get("mensagem").is_none());
    }

    #[test]
    fn test_reads_english_keys() {
        let json = r#"{
            "timestamp": "2024-05-01T10:00:00-03:00",
            "sourceUrl": "https://example.com",
            "totalCount": null,
            "ads": [],
            "error": "boom"
        }"#;
        let result: ExtractionResult = serde_json::from_str(json).unwrap();
        assert_eq!(result.source_url, "https://example.com");
        assert_eq!(result.error.as_deref(), Some("boom"));
    }
}
