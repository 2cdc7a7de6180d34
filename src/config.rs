//! Scraper configuration
//!
//! Every number the page markup or the hosting environment can invalidate
//! (caps, delays, selectors, marker words) is a knob here. Defaults follow the
//! browser-driven release of the tool; the caps and delays varied between
//! releases, so none of them is baked into the extraction code.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScraperError};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    pub library: LibraryConfig,
    pub browser: BrowserConfig,
    pub extraction: ExtractionConfig,
    pub api: ApiConfig,
}

/// Where the browsable ads library lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// Base URL of the library page, without query string.
    pub base_url: String,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.facebook.com/ads/library/".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Chrome/Chromium binary. `None` lets headless_chrome discover one.
    pub chrome_path: Option<String>,
    pub headless: bool,
    pub settle_delay_secs: u64,
    pub navigation_timeout_secs: u64,
    pub scroll_steps: u32,
    pub scroll_delay_secs: u64,
    /// Pixels scrolled back up after each jump to the bottom.
    pub scroll_back_px: u32,
    /// Chrome shuts down after this long without a command; the next
    /// request relaunches it.
    pub idle_timeout_secs: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            chrome_path: None,
            headless: true,
            settle_delay_secs: 5,
            navigation_timeout_secs: 30,
            scroll_steps: 3,
            scroll_delay_secs: 2,
            scroll_back_px: 300,
            idle_timeout_secs: 600,
        }
    }
}

impl BrowserConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_secs(self.settle_delay_secs)
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }

    pub fn scroll_delay(&self) -> Duration {
        Duration::from_secs(self.scroll_delay_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

/// Selector and threshold knobs for the extraction engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Maximum number of ads in one result.
    pub max_ads: usize,
    /// Character budget of each ad snippet.
    pub snippet_chars: usize,
    /// Generic containers need strictly more characters than this.
    pub min_card_text_len: usize,
    /// Case-insensitive substrings marking cookie/consent banners.
    pub exclusion_terms: Vec<String>,

    /// Structural selectors tried for the result count, in priority order.
    pub count_selectors: Vec<String>,
    /// Words that follow the number in a result count ("36 results").
    pub count_words: Vec<String>,

    /// Anchors pointing at a single ad.
    pub ad_link_selector: String,
    /// Query parameter carrying the ad identifier in those anchors.
    pub ad_id_param: String,
    /// Class fragments identifying a card wrapper during the ancestor walk.
    pub card_wrapper_classes: Vec<String>,
    pub max_ancestor_depth: usize,
    /// Broad container selectors used when no anchored card was found.
    pub generic_card_selectors: Vec<String>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            max_ads: 20,
            snippet_chars: 500,
            min_card_text_len: 50,
            exclusion_terms: vec!["cookie".to_string(), "consent".to_string()],
            count_selectors: vec![
                "div[role='heading'][aria-level='3']".to_string(),
                "[role='heading']".to_string(),
                "h1, h2, h3".to_string(),
                "div[class*='x8t9es0']".to_string(),
                "span[class*='x8t9es0']".to_string(),
            ],
            count_words: vec![
                "results".to_string(),
                "result".to_string(),
                "resultados".to_string(),
                "resultado".to_string(),
                "anúncios".to_string(),
                "ads".to_string(),
            ],
            ad_link_selector: "a[href*='id=']".to_string(),
            ad_id_param: "id".to_string(),
            card_wrapper_classes: vec![
                "_7jvw".to_string(),
                "xh8yej3".to_string(),
                "x1plvlek".to_string(),
            ],
            max_ancestor_depth: 12,
            generic_card_selectors: vec![
                "div[data-pagelet]".to_string(),
                "div[role='article']".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Versioned ads archive endpoint.
    pub endpoint: String,
    pub timeout_secs: u64,
    pub page_limit: u32,
    pub fields: Vec<String>,
    /// Fallback bearer credential when the caller supplies none.
    pub access_token: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://graph.facebook.com/v18.0/ads_archive".to_string(),
            timeout_secs: 30,
            page_limit: 20,
            fields: vec![
                "id".to_string(),
                "ad_creation_time".to_string(),
                "ad_creative_bodies".to_string(),
                "ad_delivery_start_time".to_string(),
                "ad_snapshot_url".to_string(),
                "page_name".to_string(),
            ],
            access_token: None,
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl ScraperConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: ScraperConfig = serde_json::from_str(json)
            .map_err(|e| ScraperError::Config(format!("invalid config JSON: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overlaid with `ADLIB_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(host) = env::var("ADLIB_HOST") {
            config.library.base_url = host;
        }
        if let Ok(path) = env::var("ADLIB_CHROME_PATH") {
            config.browser.chrome_path = Some(path);
        }
        override_parsed("ADLIB_HEADLESS", &mut config.browser.headless)?;
        override_parsed("ADLIB_SETTLE_SECS", &mut config.browser.settle_delay_secs)?;
        override_parsed(
            "ADLIB_NAV_TIMEOUT_SECS",
            &mut config.browser.navigation_timeout_secs,
        )?;
        override_parsed("ADLIB_SCROLL_STEPS", &mut config.browser.scroll_steps)?;
        override_parsed("ADLIB_SCROLL_DELAY_SECS", &mut config.browser.scroll_delay_secs)?;
        override_parsed("ADLIB_IDLE_TIMEOUT_SECS", &mut config.browser.idle_timeout_secs)?;
        override_parsed("ADLIB_MAX_ADS", &mut config.extraction.max_ads)?;
        override_parsed("ADLIB_SNIPPET_CHARS", &mut config.extraction.snippet_chars)?;
        if let Ok(endpoint) = env::var("ADLIB_API_ENDPOINT") {
            config.api.endpoint = endpoint;
        }
        override_parsed("ADLIB_API_TIMEOUT_SECS", &mut config.api.timeout_secs)?;
        if let Ok(token) = env::var("ADLIB_ACCESS_TOKEN") {
            if !token.trim().is_empty() {
                config.api.access_token = Some(token);
            }
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.extraction.max_ads == 0 {
            return Err(ScraperError::Config("extraction.max_ads must be > 0".into()));
        }
        if self.extraction.snippet_chars == 0 {
            return Err(ScraperError::Config(
                "extraction.snippet_chars must be > 0".into(),
            ));
        }
        if self.api.page_limit == 0 {
            return Err(ScraperError::Config("api.page_limit must be > 0".into()));
        }
        url::Url::parse(&self.library.base_url).map_err(|e| {
            ScraperError::Config(format!("library.base_url is not a URL: {e}"))
        })?;
        Ok(())
    }
}

fn override_parsed<T: FromStr>(key: &str, slot: &mut T) -> Result<()> {
    if let Ok(raw) = env::var(key) {
        *slot = raw
            .trim()
            .parse()
            .map_err(|_| ScraperError::Config(format!("{key} has an invalid value: {raw}")))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    /// Serializes tests that touch `ADLIB_*` variables.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const ENV_KEYS: [&str; 5] = [
        "ADLIB_MAX_ADS",
        "ADLIB_HEADLESS",
        "ADLIB_IDLE_TIMEOUT_SECS",
        "ADLIB_ACCESS_TOKEN",
        "ADLIB_HOST",
    ];

    fn clear_env() {
        for key in ENV_KEYS {
            env::remove_var(key);
        }
    }

    #[test]
    fn test_from_env_overlay() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();
        env::set_var("ADLIB_MAX_ADS", " 7 ");
        env::set_var("ADLIB_HEADLESS", "false");
        env::set_var("ADLIB_IDLE_TIMEOUT_SECS", "60");
        env::set_var("ADLIB_ACCESS_TOKEN", "tok");

        let config = ScraperConfig::from_env();
        clear_env();
        let config = config.unwrap();

        assert_eq!(config.extraction.max_ads, 7);
        assert!(!config.browser.headless);
        assert_eq!(config.browser.idle_timeout(), Duration::from_secs(60));
        assert_eq!(config.api.access_token.as_deref(), Some("tok"));
        // untouched knobs keep their defaults
        assert_eq!(config.extraction.snippet_chars, 500);
    }

    #[test]
    fn test_from_env_rejects_bad_values() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();

        env::set_var("ADLIB_MAX_ADS", "lots");
        let bad_number = ScraperConfig::from_env();
        env::set_var("ADLIB_MAX_ADS", "0");
        let zero = ScraperConfig::from_env();
        env::remove_var("ADLIB_MAX_ADS");
        env::set_var("ADLIB_HOST", "not a url");
        let bad_host = ScraperConfig::from_env();
        clear_env();

        let err = bad_number.unwrap_err();
        assert!(matches!(err, ScraperError::Config(_)));
        assert!(err.to_string().contains("ADLIB_MAX_ADS"));
        assert!(matches!(zero, Err(ScraperError::Config(_))));
        assert!(matches!(bad_host, Err(ScraperError::Config(_))));
    }

    #[test]
    fn test_defaults() {
        let config = ScraperConfig::default();
        assert_eq!(config.extraction.max_ads, 20);
        assert_eq!(config.extraction.snippet_chars, 500);
        assert_eq!(config.extraction.min_card_text_len, 50);
        assert_eq!(config.browser.settle_delay(), Duration::from_secs(5));
        assert_eq!(config.api.page_limit, 20);
        assert_eq!(config.api.timeout(), Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = ScraperConfig::from_json(
            r#"{"extraction": {"max_ads": 30, "snippet_chars": 1000}, "browser": {"settle_delay_secs": 10}}"#,
        )
        .unwrap();
        assert_eq!(config.extraction.max_ads, 30);
        assert_eq!(config.extraction.snippet_chars, 1000);
        assert_eq!(config.extraction.min_card_text_len, 50);
        assert_eq!(config.browser.settle_delay_secs, 10);
        assert_eq!(config.browser.scroll_steps, 3);
    }

    #[test]
    fn test_zero_cap_rejected() {
        let err = ScraperConfig::from_json(r#"{"extraction": {"max_ads": 0}}"#).unwrap_err();
        assert!(matches!(err, ScraperError::Config(_)));
    }

    #[test]
    fn test_bad_json_is_config_error() {
        let err = ScraperConfig::from_json("{not json").unwrap_err();
        assert!(matches!(err, ScraperError::Config(_)));
    }
}
