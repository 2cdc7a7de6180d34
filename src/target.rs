//! Search targets and library URL construction

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::LibraryConfig;
use crate::error::{Result, ScraperError};

/// Region filter accepted by the ads library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Country {
    #[default]
    All,
    Br,
    Us,
    Pt,
    Es,
    Ar,
    Mx,
}

impl Country {
    pub fn code(&self) -> &'static str {
        match self {
            Country::All => "ALL",
            Country::Br => "BR",
            Country::Us => "US",
            Country::Pt => "PT",
            Country::Es => "ES",
            Country::Ar => "AR",
            Country::Mx => "MX",
        }
    }
}

impl fmt::Display for Country {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Country {
    type Err = ScraperError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "" | "ALL" => Ok(Country::All),
            "BR" => Ok(Country::Br),
            "US" => Ok(Country::Us),
            "PT" => Ok(Country::Pt),
            "ES" => Ok(Country::Es),
            "AR" => Ok(Country::Ar),
            "MX" => Ok(Country::Mx),
            other => Err(ScraperError::InvalidTarget(format!(
                "unsupported country code: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    PageId,
    Url,
    Keyword,
}

/// A resolved lookup. Built once per submission and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchTarget {
    kind: TargetKind,
    value: String,
    country: Country,
}

fn page_id_param() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"view_all_page_id=(\d+)").expect("static regex"))
}

impl SearchTarget {
    pub fn page_id(id: &str) -> Result<Self> {
        let id = id.trim();
        if id.is_empty() || !id.chars().all(|c| c.is_ascii_digit()) {
            return Err(ScraperError::InvalidTarget(format!(
                "page id must be numeric, got {id:?}"
            )));
        }
        Ok(Self {
            kind: TargetKind::PageId,
            value: id.to_string(),
            country: Country::All,
        })
    }

    /// A URL carrying `view_all_page_id=<digits>` becomes a page-id target;
    /// anything else must be an absolute http(s) URL and is loaded as given.
    pub fn url(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if let Some(caps) = page_id_param().captures(raw) {
            return Self::page_id(&caps[1]);
        }

        let parsed = url::Url::parse(raw)
            .map_err(|e| ScraperError::InvalidTarget(format!("invalid URL {raw:?}: {e}")))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(ScraperError::InvalidTarget(format!(
                "unsupported URL scheme: {}",
                parsed.scheme()
            )));
        }
        Ok(Self {
            kind: TargetKind::Url,
            value: raw.to_string(),
            country: Country::All,
        })
    }

    pub fn keyword(term: &str, country: Country) -> Result<Self> {
        let term = term.trim();
        if term.is_empty() {
            return Err(ScraperError::InvalidTarget("search term is empty".into()));
        }
        Ok(Self {
            kind: TargetKind::Keyword,
            value: term.to_string(),
            country,
        })
    }

    pub fn resolve(kind: TargetKind, value: &str, country: Option<&str>) -> Result<Self> {
        match kind {
            TargetKind::PageId => Self::page_id(value),
            TargetKind::Url => Self::url(value),
            TargetKind::Keyword => {
                let country = country.map(str::parse::<Country>).transpose()?.unwrap_or_default();
                Self::keyword(value, country)
            }
        }
    }

    pub fn kind(&self) -> TargetKind {
        self.kind
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn country(&self) -> Country {
        self.country
    }

    /// Concrete library URL to load for this target.
    pub fn library_url(&self, library: &LibraryConfig) -> String {
        let key = match self.kind {
            TargetKind::Url => return self.value.clone(),
            TargetKind::PageId => "view_all_page_id",
            TargetKind::Keyword => "q",
        };
        let params = [
            ("active_status", "all"),
            ("ad_type", "all"),
            ("country", self.country.code()),
            (key, self.value.as_str()),
        ];
        match url::Url::parse_with_params(&library.base_url, &params) {
            Ok(url) => url.to_string(),
            // base_url is validated with the config; keep a usable string regardless
            Err(_) => format!(
                "{}?active_status=all&ad_type=all&country={}&{}={}",
                library.base_url, self.country, key, self.value
            ),
        }
    }
}
