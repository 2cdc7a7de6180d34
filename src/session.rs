//! Search sessions over a shared navigator
//!
//! The navigator is a single-writer resource: one page load, scroll and
//! snapshot sequence at a time. Concurrent searches queue on the mutex
//! instead of driving the same tab from two threads.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::config::ScraperConfig;
use crate::engine::ExtractionEngine;
use crate::error::Result;
use crate::extractors::DocumentHandle;
use crate::navigator::{ChromeNavigator, Navigator};
use crate::record::ExtractionResult;
use crate::target::SearchTarget;

pub struct LibraryScraper<N: Navigator> {
    session: Mutex<N>,
    engine: ExtractionEngine,
    config: ScraperConfig,
}

impl LibraryScraper<ChromeNavigator> {
    /// Scraper backed by a headless Chrome launched on the first search.
    pub fn with_chrome(config: ScraperConfig) -> Result<Self> {
        let navigator = ChromeNavigator::new(config.browser.clone());
        Self::new(navigator, config)
    }
}

impl<N: Navigator> LibraryScraper<N> {
    pub fn new(navigator: N, config: ScraperConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            session: Mutex::new(navigator),
            engine: ExtractionEngine::new(&config.extraction)?,
            config,
        })
    }

    pub fn config(&self) -> &ScraperConfig {
        &self.config
    }

    pub fn engine(&self) -> &ExtractionEngine {
        &self.engine
    }

    /// Load the library page for `target` and extract count and cards.
    ///
    /// The count is read before scrolling, the cards after. Transport
    /// failures end up in `error`; the session stays usable.
    pub fn search(&self, target: &SearchTarget) -> ExtractionResult {
        let url = target.library_url(&self.config.library);
        tracing::info!(kind = ?target.kind(), %url, "Starting library search");

        let mut session = self.lock_session();
        if let Err(e) = session.open(&url) {
            tracing::warn!(%url, error = %e, "Navigation failed");
            return ExtractionResult::failed(url, &e);
        }
        let source_url = session.current_url().unwrap_or(url);

        let first = match session.current_document() {
            Ok(doc) => doc,
            Err(e) => return ExtractionResult::failed(source_url, &e),
        };
        let total_count = self.engine.total_count(&first);
        drop(first);

        let browser = &self.config.browser;
        session.scroll_progressive(browser.scroll_steps, browser.scroll_delay());

        let scrolled = match session.current_document() {
            Ok(doc) => doc,
            Err(e) => return ExtractionResult::failed(source_url, &e),
        };
        let ads = self.engine.ad_cards(&scrolled);
        drop(session);

        tracing::info!(url = %source_url, total = %total_count, ads = ads.len(), "Search finished");
        let mut result = ExtractionResult::new(source_url);
        result.total_count = Some(total_count);
        result.ads = ads;
        result
    }

    /// Run the engine over a page captured elsewhere.
    pub fn extract_html(&self, html: &str, url: &str) -> ExtractionResult {
        self.engine.extract(&DocumentHandle::parse(html, url))
    }

    /// Release the browser session. A later search starts a new one.
    pub fn close(&self) {
        self.lock_session().close();
    }

    fn lock_session(&self) -> MutexGuard<'_, N> {
        self.session.lock().unwrap_or_else(|poisoned: PoisonError<_>| {
            tracing::warn!("Navigator lock poisoned by a panicked search; reusing session");
            poisoned.into_inner()
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;
    use crate::navigator::StaticNavigator;
    use crate::record::TOTAL_NOT_FOUND;

    const PAGE_ID: &str = "675929692278580";

    fn page_url() -> String {
        SearchTarget::page_id(PAGE_ID)
            .unwrap()
            .library_url(&ScraperConfig::default().library)
    }

    fn page_html() -> String {
        let card = "Texto do anúncio longo o bastante para ultrapassar cinquenta caracteres";
        format!(
            r#"<div role="heading" aria-level="3">36 results</div>
            <div data-pagelet="1">{card} 1</div>
            <div data-pagelet="2">{card} 2</div>
            <div data-pagelet="3">{card} 3</div>"#
        )
    }

    #[test]
    fn test_search_end_to_end() {
        let nav = StaticNavigator::new().with_page(page_url(), page_html());
        let scraper = LibraryScraper::new(nav, ScraperConfig::default()).unwrap();

        let target = SearchTarget::url(&format!(
            "https://www.facebook.com/ads/library/?view_all_page_id={PAGE_ID}"
        ))
        .unwrap();
        let result = scraper.search(&target);

        assert!(result.error.is_none());
        assert_eq!(result.source_url, page_url());
        assert_eq!(result.total_count.as_deref(), Some("36 results"));
        assert_eq!(result.ads.len(), 3);
        assert_eq!(result.ads[2].index, 3);

        let session = scraper.lock_session();
        assert_eq!(session.opened, vec![page_url()]);
        assert_eq!(session.scrolls.len(), 1);
        assert_eq!(session.scrolls[0].0, 3);
    }

    #[test]
    fn test_navigation_failure_keeps_session() {
        let nav = StaticNavigator::new().with_page(page_url(), page_html());
        let scraper = LibraryScraper::new(nav, ScraperConfig::default()).unwrap();

        let missing = SearchTarget::page_id("1").unwrap();
        let failed = scraper.search(&missing);
        assert!(failed.error.as_deref().unwrap().starts_with("Navigation failed"));
        assert!(failed.ads.is_empty());
        assert!(failed.total_count.is_none());

        let ok = scraper.search(&SearchTarget::page_id(PAGE_ID).unwrap());
        assert!(ok.error.is_none());
        assert_eq!(ok.ads.len(), 3);
    }

    #[test]
    fn test_page_without_matches_is_not_an_error() {
        let nav = StaticNavigator::new().with_page(page_url(), "<p>Nothing</p>");
        let scraper = LibraryScraper::new(nav, ScraperConfig::default()).unwrap();
        let result = scraper.search(&SearchTarget::page_id(PAGE_ID).unwrap());

        assert!(result.error.is_none());
        assert_eq!(result.total_count.as_deref(), Some(TOTAL_NOT_FOUND));
        assert!(result.ads.is_empty());
    }

    #[test]
    fn test_concurrent_searches_serialize() {
        let nav = StaticNavigator::new().with_page(page_url(), page_html());
        let scraper = Arc::new(LibraryScraper::new(nav, ScraperConfig::default()).unwrap());
        let target = SearchTarget::page_id(PAGE_ID).unwrap();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let scraper = Arc::clone(&scraper);
                let target = target.clone();
                thread::spawn(move || scraper.search(&target))
            })
            .collect();
        for handle in handles {
            let result = handle.join().unwrap();
            assert_eq!(result.ads.len(), 3);
        }
        assert_eq!(scraper.lock_session().opened.len(), 4);
    }

    #[test]
    fn test_extract_html_without_browser() {
        let scraper =
            LibraryScraper::new(StaticNavigator::new(), ScraperConfig::default()).unwrap();
        let result = scraper.extract_html(&page_html(), "file:///saved.html");
        assert_eq!(result.source_url, "file:///saved.html");
        assert_eq!(result.ads.len(), 3);
    }
}
