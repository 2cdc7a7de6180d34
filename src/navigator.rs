//! Navigator adapters
//!
//! A navigator owns one browser-like session: it loads a URL, scrolls to
//! trigger lazy loading and hands out snapshots of the rendered page.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use headless_chrome::{Browser, LaunchOptions, Tab};

use crate::config::BrowserConfig;
use crate::error::{Result, ScraperError};
use crate::extractors::DocumentHandle;

/// Scroll steps tolerated to fail in a row before giving up on scrolling.
const MAX_SCROLL_FAILURES: u32 = 2;

pub trait Navigator {
    /// Load `url` and wait for the page to settle.
    fn open(&mut self, url: &str) -> Result<()>;

    /// Repeat {scroll to bottom, wait, scroll up a little, wait} `steps`
    /// times. Never fails; stops early when scrolling keeps failing.
    fn scroll_progressive(&mut self, steps: u32, settle: Duration);

    /// Snapshot of the page as currently rendered.
    fn current_document(&self) -> Result<DocumentHandle>;

    /// URL the session ended up on after redirects, if a page is open.
    fn current_url(&self) -> Option<String>;

    /// Release the session. Safe to call repeatedly.
    fn close(&mut self);
}

/// Slot for a session launched on demand. A session found dead after a
/// failure is dropped so the next request launches a fresh one.
struct SessionSlot<S> {
    session: Option<S>,
}

impl<S> SessionSlot<S> {
    fn new() -> Self {
        Self { session: None }
    }

    fn get_or_launch(&mut self, launch: impl FnOnce() -> Result<S>) -> Result<&S> {
        if self.session.is_none() {
            self.session = Some(launch()?);
        }
        self.session
            .as_ref()
            .ok_or_else(|| ScraperError::BrowserLaunch("session missing after launch".into()))
    }

    fn current(&self) -> Option<&S> {
        self.session.as_ref()
    }

    /// Drop the session unless `is_alive` says otherwise. Returns whether it
    /// was dropped.
    fn discard_if_dead(&mut self, is_alive: impl FnOnce(&S) -> bool) -> bool {
        match &self.session {
            Some(session) if !is_alive(session) => {
                self.session = None;
                true
            }
            _ => false,
        }
    }

    fn take(&mut self) -> Option<S> {
        self.session.take()
    }
}

struct ChromeSession {
    browser: Browser,
    tab: Arc<Tab>,
}

impl ChromeSession {
    fn launch(config: &BrowserConfig) -> Result<Self> {
        let args: Vec<&OsStr> = [
            "--no-sandbox",
            "--disable-dev-shm-usage",
            "--disable-gpu",
            "--disable-blink-features=AutomationControlled",
            "--disable-software-rasterizer",
            "--disable-extensions",
            "--log-level=3",
        ]
        .into_iter()
        .map(OsStr::new)
        .collect();

        let options = LaunchOptions {
            headless: config.headless,
            sandbox: false,
            path: config.chrome_path.as_ref().map(PathBuf::from),
            args,
            idle_browser_timeout: config.idle_timeout(),
            ..Default::default()
        };

        tracing::info!(headless = config.headless, "Launching headless browser");
        let browser =
            Browser::new(options).map_err(|e| ScraperError::BrowserLaunch(e.to_string()))?;
        let tab = browser
            .new_tab()
            .map_err(|e| ScraperError::BrowserLaunch(format!("failed to create tab: {e}")))?;
        tab.set_default_timeout(config.navigation_timeout());
        Ok(Self { browser, tab })
    }

    /// Round trip to the browser; fails once Chrome exited or the
    /// connection idled out.
    fn is_alive(&self) -> bool {
        self.browser.get_version().is_ok()
    }
}

/// Headless Chrome session, launched on first use and kept for later pages.
pub struct ChromeNavigator {
    config: BrowserConfig,
    session: SessionSlot<ChromeSession>,
}

impl ChromeNavigator {
    pub fn new(config: BrowserConfig) -> Self {
        Self {
            config,
            session: SessionSlot::new(),
        }
    }

    fn tab(&self) -> Option<Arc<Tab>> {
        self.session.current().map(|session| Arc::clone(&session.tab))
    }

    fn drop_if_disconnected(&mut self) {
        if self.session.discard_if_dead(ChromeSession::is_alive) {
            tracing::warn!("Browser connection lost, relaunching on next request");
        }
    }

    fn scroll_step(tab: &Tab, back_px: u32, settle: Duration) -> Result<()> {
        let evaluate = |js: &str| {
            tab.evaluate(js, false)
                .map(|_| ())
                .map_err(|e| ScraperError::Navigation(format!("scroll failed: {e}")))
        };
        evaluate("window.scrollTo(0, document.body.scrollHeight);")?;
        std::thread::sleep(settle);
        evaluate(&format!("window.scrollBy(0, -{back_px});"))?;
        std::thread::sleep(settle);
        Ok(())
    }
}

impl Navigator for ChromeNavigator {
    fn open(&mut self, url: &str) -> Result<()> {
        let config = &self.config;
        let tab = Arc::clone(&self.session.get_or_launch(|| ChromeSession::launch(config))?.tab);
        tracing::info!(url, "Navigating");
        let navigated = tab
            .navigate_to(url)
            .and_then(|tab| tab.wait_until_navigated())
            .map(|_| ());
        if let Err(e) = navigated {
            self.drop_if_disconnected();
            return Err(ScraperError::Navigation(format!("{url}: {e}")));
        }
        std::thread::sleep(self.config.settle_delay());
        Ok(())
    }

    fn scroll_progressive(&mut self, steps: u32, settle: Duration) {
        let Some(tab) = self.tab() else {
            return;
        };
        let mut failures = 0;
        for step in 0..steps {
            match Self::scroll_step(&tab, self.config.scroll_back_px, settle) {
                Ok(()) => failures = 0,
                Err(e) => {
                    failures += 1;
                    tracing::warn!(step, error = %e, "Scroll step failed");
                    if failures >= MAX_SCROLL_FAILURES {
                        self.drop_if_disconnected();
                        break;
                    }
                }
            }
        }
    }

    fn current_document(&self) -> Result<DocumentHandle> {
        let tab = self
            .tab()
            .ok_or_else(|| ScraperError::Navigation("no page is open".into()))?;
        let html = tab
            .get_content()
            .map_err(|e| ScraperError::Navigation(format!("failed to read page: {e}")))?;
        Ok(DocumentHandle::parse(&html, tab.get_url()))
    }

    fn current_url(&self) -> Option<String> {
        self.tab().map(|tab| tab.get_url())
    }

    fn close(&mut self) {
        if let Some(session) = self.session.take() {
            if let Err(e) = session.tab.close(true) {
                tracing::debug!(error = %e, "Tab already gone");
            }
            tracing::info!("Browser session closed");
        }
    }
}

impl Drop for ChromeNavigator {
    fn drop(&mut self) {
        self.close();
    }
}

/// Serves captured HTML by URL. Used to replay saved pages without a browser.
#[derive(Debug, Default)]
pub struct StaticNavigator {
    pages: HashMap<String, String>,
    current: Option<String>,
    /// Scroll requests received, as `(steps, settle)`.
    pub scrolls: Vec<(u32, Duration)>,
    /// URLs opened, in order.
    pub opened: Vec<String>,
}

impl StaticNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: impl Into<String>, html: impl Into<String>) -> Self {
        self.pages.insert(url.into(), html.into());
        self
    }
}

impl Navigator for StaticNavigator {
    fn open(&mut self, url: &str) -> Result<()> {
        self.opened.push(url.to_string());
        if !self.pages.contains_key(url) {
            self.current = None;
            return Err(ScraperError::Navigation(format!("{url}: no captured page")));
        }
        self.current = Some(url.to_string());
        Ok(())
    }

    fn scroll_progressive(&mut self, steps: u32, settle: Duration) {
        self.scrolls.push((steps, settle));
    }

    fn current_document(&self) -> Result<DocumentHandle> {
        let url = self
            .current
            .as_ref()
            .ok_or_else(|| ScraperError::Navigation("no page is open".into()))?;
        let html = self
            .pages
            .get(url)
            .ok_or_else(|| ScraperError::Navigation(format!("{url}: no captured page")))?;
        Ok(DocumentHandle::parse(html, url.clone()))
    }

    fn current_url(&self) -> Option<String> {
        self.current.clone()
    }

    fn close(&mut self) {
        self.current = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_navigator_serves_pages() {
        let mut nav = StaticNavigator::new().with_page("https://a.test/", "<p>hello</p>");
        assert!(nav.current_document().is_err());

        nav.open("https://a.test/").unwrap();
        let doc = nav.current_document().unwrap();
        assert_eq!(doc.url(), "https://a.test/");
        assert_eq!(nav.current_url().as_deref(), Some("https://a.test/"));

        nav.close();
        nav.close();
        assert!(nav.current_url().is_none());
    }

    #[test]
    fn test_static_navigator_unknown_url() {
        let mut nav = StaticNavigator::new();
        let err = nav.open("https://missing.test/").unwrap_err();
        assert!(matches!(err, ScraperError::Navigation(_)));
        assert_eq!(nav.opened, vec!["https://missing.test/".to_string()]);
    }

    #[test]
    fn test_dead_session_is_relaunched() {
        // (generation, alive)
        let mut slot: SessionSlot<(u32, bool)> = SessionSlot::new();
        let mut launches = 0u32;
        let mut launch = |alive: bool| -> Result<(u32, bool)> {
            launches += 1;
            Ok((launches, alive))
        };

        assert_eq!(slot.get_or_launch(|| launch(true)).unwrap().0, 1);
        // reused while alive
        assert_eq!(slot.get_or_launch(|| launch(true)).unwrap().0, 1);
        assert!(!slot.discard_if_dead(|s| s.1));
        assert_eq!(slot.current().map(|s| s.0), Some(1));

        // the browser went away: the cached session is dropped once
        slot.session = Some((1, false));
        assert!(slot.discard_if_dead(|s| s.1));
        assert!(slot.current().is_none());
        assert!(!slot.discard_if_dead(|s| s.1));

        assert_eq!(slot.get_or_launch(|| launch(true)).unwrap().0, 2);
    }

    #[test]
    fn test_failed_launch_leaves_slot_empty() {
        let mut slot: SessionSlot<u32> = SessionSlot::new();
        let err = slot
            .get_or_launch(|| Err(ScraperError::BrowserLaunch("no chrome".into())))
            .unwrap_err();
        assert!(matches!(err, ScraperError::BrowserLaunch(_)));
        assert!(slot.current().is_none());
        assert_eq!(*slot.get_or_launch(|| Ok(5)).unwrap(), 5);
        assert_eq!(slot.take(), Some(5));
        assert!(slot.take().is_none());
    }

    #[test]
    fn test_chrome_navigator_is_lazy() {
        // no browser is launched until a page is opened
        let mut nav = ChromeNavigator::new(BrowserConfig::default());
        assert!(nav.current_url().is_none());
        assert!(nav.current_document().is_err());
        nav.scroll_progressive(3, Duration::ZERO);
        nav.close();
    }
}
