//! Extraction engine: page snapshot in, normalized record out.

use crate::config::ExtractionConfig;
use crate::error::Result;
use crate::extractors::{extract_ad_cards, find_total_count, CardRules, CountRules, DocumentHandle};
use crate::record::{AdRecord, ExtractionResult, TOTAL_NOT_FOUND};

/// Compiled extraction rules. Build once, reuse for every page.
pub struct ExtractionEngine {
    count_rules: CountRules,
    card_rules: CardRules,
}

impl ExtractionEngine {
    pub fn new(config: &ExtractionConfig) -> Result<Self> {
        Ok(Self {
            count_rules: CountRules::from_config(config)?,
            card_rules: CardRules::from_config(config)?,
        })
    }

    /// Raw count text, or [`TOTAL_NOT_FOUND`] when no strategy matched.
    pub fn total_count(&self, document: &DocumentHandle) -> String {
        find_total_count(document.html(), &self.count_rules)
            .unwrap_or_else(|| TOTAL_NOT_FOUND.to_string())
    }

    pub fn ad_cards(&self, document: &DocumentHandle) -> Vec<AdRecord> {
        extract_ad_cards(document.html(), &self.card_rules)
    }

    /// Count and cards from a single snapshot.
    pub fn extract(&self, document: &DocumentHandle) -> ExtractionResult {
        let mut result = ExtractionResult::new(document.url());
        result.total_count = Some(self.total_count(document));
        result.ads = self.ad_cards(document);
        tracing::info!(
            url = %document.url(),
            total = result.total_count.as_deref().unwrap_or_default(),
            ads = result.ads.len(),
            "Extraction finished"
        );
        result
    }
}
