//! Ad card extraction
//!
//! Two tiers, tried in order. Tier A follows anchors that link to a single
//! ad and climbs to the card wrapping them; Tier B runs only when Tier A
//! found nothing and takes broad containers filtered by text length and a
//! banner blacklist. Every candidate either becomes an [`AdRecord`] or is
//! skipped with a [`CardSkip`] reason; nothing aborts the pass.
//!
//! Class names of the wrapper come from the live site and change without
//! notice. The ancestor walk is bounded by `max_ancestor_depth` and simply
//! misses when the markup moves on.

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use super::document::{compile_selectors, element_text};
use crate::config::ExtractionConfig;
use crate::error::{Result, ScraperError};
use crate::record::AdRecord;

/// Why a candidate element did not become an ad.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CardSkip {
    /// Anchor href carries no ad identifier.
    NoAdId,
    /// No ancestor within reach matched a card wrapper class.
    NoContainer,
    /// Container already used through another anchor, or nested inside (or
    /// wrapping) a container already emitted.
    Duplicate,
    EmptyText,
    /// Text length (in chars) not above the minimum.
    TooShort(usize),
    /// Text contains an excluded term such as a cookie banner marker.
    Excluded(String),
}

pub struct CardRules {
    link_selector: Option<Selector>,
    id_pattern: Regex,
    wrapper_classes: Vec<String>,
    max_ancestor_depth: usize,
    generic_selectors: Vec<Selector>,
    min_text_len: usize,
    exclusion_terms: Vec<String>,
    max_ads: usize,
    snippet_chars: usize,
}

impl CardRules {
    pub fn from_config(config: &ExtractionConfig) -> Result<Self> {
        let link_selector = compile_selectors(std::slice::from_ref(&config.ad_link_selector))
            .into_iter()
            .next();
        let id_pattern = Regex::new(&format!(
            r"[?&]{}=(\d+)",
            regex::escape(config.ad_id_param.trim())
        ))
        .map_err(|e| ScraperError::Config(format!("ad id pattern: {e}")))?;

        Ok(Self {
            link_selector,
            id_pattern,
            wrapper_classes: config
                .card_wrapper_classes
                .iter()
                .filter(|c| !c.trim().is_empty())
                .cloned()
                .collect(),
            max_ancestor_depth: config.max_ancestor_depth,
            generic_selectors: compile_selectors(&config.generic_card_selectors),
            min_text_len: config.min_card_text_len,
            exclusion_terms: config
                .exclusion_terms
                .iter()
                .map(|t| t.trim().to_lowercase())
                .filter(|t| !t.is_empty())
                .collect(),
            max_ads: config.max_ads,
            snippet_chars: config.snippet_chars,
        })
    }

    pub fn ad_id(&self, href: &str) -> Option<String> {
        self.id_pattern
            .captures(href)
            .map(|caps| caps[1].to_string())
    }
}

/// Tier A, falling back to Tier B when it yields nothing.
pub fn extract_ad_cards(document: &Html, rules: &CardRules) -> Vec<AdRecord> {
    let anchored = link_anchored(document, rules);
    if !anchored.is_empty() {
        tracing::debug!(count = anchored.len(), "Link-anchored cards found");
        return anchored;
    }
    let generic = generic_containers(document, rules);
    tracing::debug!(count = generic.len(), "Generic container cards found");
    generic
}

/// Tier A: cards located through anchors to individual ads.
pub fn link_anchored(document: &Html, rules: &CardRules) -> Vec<AdRecord> {
    let Some(selector) = &rules.link_selector else {
        return Vec::new();
    };

    let mut ads = Vec::new();
    let mut seen = Vec::new();
    for anchor in document.select(selector) {
        if ads.len() >= rules.max_ads {
            break;
        }
        match anchored_card(anchor, rules, &mut seen, ads.len() + 1) {
            Ok(ad) => ads.push(ad),
            Err(reason) => tracing::debug!(?reason, "Skipping anchored card"),
        }
    }
    ads
}

/// Tier B: broad containers with enough text that are not banners.
pub fn generic_containers(document: &Html, rules: &CardRules) -> Vec<AdRecord> {
    let mut ads = Vec::new();
    let mut emitted = Vec::new();
    'selectors: for selector in &rules.generic_selectors {
        for element in document.select(selector) {
            if ads.len() >= rules.max_ads {
                break 'selectors;
            }
            match generic_card(element, rules, &mut emitted, ads.len() + 1) {
                Ok(ad) => ads.push(ad),
                Err(reason) => tracing::debug!(?reason, "Skipping generic card"),
            }
        }
    }
    ads
}

fn anchored_card<'a>(
    anchor: ElementRef<'a>,
    rules: &CardRules,
    seen: &mut Vec<ElementRef<'a>>,
    index: usize,
) -> std::result::Result<AdRecord, CardSkip> {
    let href = anchor.value().attr("href").unwrap_or_default();
    let ad_id = rules.ad_id(href).ok_or(CardSkip::NoAdId)?;
    let wrapper = find_wrapper(anchor, rules).ok_or(CardSkip::NoContainer)?;
    if seen.contains(&wrapper) {
        return Err(CardSkip::Duplicate);
    }
    seen.push(wrapper);

    let text = element_text(&wrapper);
    if text.is_empty() {
        return Err(CardSkip::EmptyText);
    }
    Ok(AdRecord::new(
        index,
        Some(ad_id),
        &text,
        Some(href.to_string()),
        rules.snippet_chars,
    ))
}

fn generic_card<'a>(
    element: ElementRef<'a>,
    rules: &CardRules,
    emitted: &mut Vec<ElementRef<'a>>,
    index: usize,
) -> std::result::Result<AdRecord, CardSkip> {
    if emitted.iter().any(|&other| overlaps(element, other)) {
        return Err(CardSkip::Duplicate);
    }

    let text = element_text(&element);
    if text.is_empty() {
        return Err(CardSkip::EmptyText);
    }
    let len = text.chars().count();
    if len <= rules.min_text_len {
        return Err(CardSkip::TooShort(len));
    }
    let lower = text.to_lowercase();
    if let Some(term) = rules.exclusion_terms.iter().find(|t| lower.contains(t.as_str())) {
        return Err(CardSkip::Excluded(term.clone()));
    }

    emitted.push(element);
    Ok(AdRecord::new(index, None, &text, None, rules.snippet_chars))
}

/// Same element, or one contains the other.
fn overlaps(a: ElementRef<'_>, b: ElementRef<'_>) -> bool {
    a.id() == b.id()
        || a.ancestors().any(|node| node.id() == b.id())
        || b.ancestors().any(|node| node.id() == a.id())
}

/// Nearest ancestor, within `max_ancestor_depth` levels, whose class
/// attribute contains one of the wrapper fragments.
fn find_wrapper<'a>(anchor: ElementRef<'a>, rules: &CardRules) -> Option<ElementRef<'a>> {
    anchor
        .ancestors()
        .take(rules.max_ancestor_depth)
        .filter_map(ElementRef::wrap)
        .find(|el| {
            el.value().attr("class").is_some_and(|class| {
                rules
                    .wrapper_classes
                    .iter()
                    .any(|fragment| class.contains(fragment.as_str()))
            })
        })
}
