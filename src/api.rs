//! Ads archive API client
//!
//! Bypasses the browser: one GET against the hosted archive endpoint,
//! mapped into the same record the page extraction produces. A single page
//! of results is fetched; there is no retry and no pagination.

use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::config::{ApiConfig, ExtractionConfig, LibraryConfig};
use crate::error::{Result, ScraperError};
use crate::record::{AdRecord, ExtractionResult, TOTAL_UNKNOWN_WITHOUT_CREDENTIAL};
use crate::target::SearchTarget;

pub const MISSING_CREDENTIAL_MESSAGE: &str =
    "An access token is required to query the ads archive API; open the library URL in a browser instead.";

#[derive(Debug, Deserialize)]
struct ArchivePage {
    #[serde(default)]
    data: Vec<Value>,
}

pub struct ArchiveClient {
    agent: ureq::Agent,
    api: ApiConfig,
    library: LibraryConfig,
    max_ads: usize,
    snippet_chars: usize,
}

impl ArchiveClient {
    pub fn new(api: &ApiConfig, library: &LibraryConfig, extraction: &ExtractionConfig) -> Self {
        let agent = ureq::Agent::new_with_config(
            ureq::Agent::config_builder()
                .timeout_global(Some(api.timeout()))
                .http_status_as_error(false)
                .user_agent(concat!("adlib_scraper/", env!("CARGO_PKG_VERSION")))
                .build(),
        );

        Self {
            agent,
            api: api.clone(),
            library: library.clone(),
            max_ads: extraction.max_ads,
            snippet_chars: extraction.snippet_chars,
        }
    }

    /// Query URL for `page_id`. The credential travels in a header and never
    /// appears here.
    pub fn query_url(&self, page_id: &str) -> Result<String> {
        let page_ids = format!("[\"{page_id}\"]");
        let fields = self.api.fields.join(",");
        let limit = self.api.page_limit.to_string();
        let url = Url::parse_with_params(
            &self.api.endpoint,
            &[
                ("search_page_ids", page_ids.as_str()),
                ("fields", fields.as_str()),
                ("limit", limit.as_str()),
            ],
        )
        .map_err(|e| ScraperError::Config(format!("api.endpoint is not a URL: {e}")))?;
        Ok(url.to_string())
    }

    /// Fetch the first page of ads for a page id.
    ///
    /// Without a credential this is a degraded success carrying only the
    /// library URL and an explanation. A page id that is not numeric is the
    /// caller's error; transport failures come back inside the result.
    pub fn fetch_by_page_id(
        &self,
        page_id: &str,
        credential: Option<&str>,
    ) -> Result<ExtractionResult> {
        let target = SearchTarget::page_id(page_id)?;

        let credential = credential
            .or(self.api.access_token.as_deref())
            .map(str::trim)
            .filter(|c| !c.is_empty());
        let Some(token) = credential else {
            tracing::info!(page_id, "No credential, returning library URL only");
            let mut result = ExtractionResult::new(target.library_url(&self.library))
                .with_message(MISSING_CREDENTIAL_MESSAGE);
            result.total_count = Some(TOTAL_UNKNOWN_WITHOUT_CREDENTIAL.to_string());
            return Ok(result);
        };

        let url = match self.query_url(target.value()) {
            Ok(url) => url,
            Err(e) => return Ok(ExtractionResult::failed(target.library_url(&self.library), &e)),
        };
        tracing::info!(page_id, endpoint = %self.api.endpoint, "Querying ads archive");

        Ok(match self.get(&url, token) {
            Ok((status, body)) => {
                parse_archive_response(status, &body, &url, self.max_ads, self.snippet_chars)
            }
            Err(e) => {
                tracing::warn!(page_id, error = %e, "Ads archive request failed");
                ExtractionResult::failed(url, &e)
            }
        })
    }

    fn get(&self, url: &str, token: &str) -> Result<(u16, String)> {
        let response = self
            .agent
            .get(url)
            .header("Authorization", format!("Bearer {token}"))
            .call()?;
        let status = response.status().as_u16();
        let body = response.into_body().read_to_string()?;
        Ok((status, body))
    }
}

/// Map an archive response body onto a result.
pub fn parse_archive_response(
    status: u16,
    body: &str,
    url: &str,
    max_ads: usize,
    snippet_chars: usize,
) -> ExtractionResult {
    match parse_page(status, body) {
        Ok(items) => {
            let ads: Vec<AdRecord> = items
                .into_iter()
                .take(max_ads)
                .enumerate()
                .map(|(i, item)| map_ad(i + 1, &item, snippet_chars))
                .collect();
            let mut result = ExtractionResult::new(url);
            result.total_count = Some(format!("{} results", ads.len()));
            result.ads = ads;
            tracing::info!(ads = result.ads.len(), "Ads archive page mapped");
            result
        }
        Err(e) => {
            tracing::warn!(status, error = %e, "Ads archive returned an error");
            ExtractionResult::failed(url, &e)
        }
    }
}

fn parse_page(status: u16, body: &str) -> Result<Vec<Value>> {
    let json: Value = match serde_json::from_str(body) {
        Ok(json) => json,
        Err(e) if (200..300).contains(&status) => return Err(e.into()),
        Err(_) => {
            return Err(ScraperError::Http {
                status,
                message: body.chars().take(200).collect(),
            })
        }
    };

    // any top-level `error` is an error envelope, well-formed or not
    if let Some(error) = json.get("error") {
        let message = match error {
            Value::Object(body) => body.get("message").and_then(Value::as_str),
            Value::String(message) => Some(message.as_str()),
            _ => None,
        }
        .filter(|m| !m.trim().is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("API error (status {status})"));
        return Err(ScraperError::Api(message));
    }
    if !(200..300).contains(&status) {
        return Err(ScraperError::Http {
            status,
            message: body.chars().take(200).collect(),
        });
    }

    let page: ArchivePage = serde_json::from_value(json)?;
    Ok(page.data)
}

/// Each field is read on its own; a field of the wrong shape is dropped
/// without touching the others.
fn map_ad(index: usize, item: &Value, snippet_chars: usize) -> AdRecord {
    let text_field = |name: &str| item.get(name).and_then(Value::as_str).map(str::to_string);

    let id = item.get("id").and_then(|id| match id {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    });
    let body = item
        .get("ad_creative_bodies")
        .and_then(Value::as_array)
        .and_then(|bodies| {
            bodies
                .iter()
                .filter_map(Value::as_str)
                .find(|b| !b.trim().is_empty())
        })
        .unwrap_or_default();
    let link = text_field("ad_snapshot_url").map(|link| strip_access_token(&link));

    let mut record = AdRecord::new(index, id, body, link, snippet_chars);
    record.creation_time = text_field("ad_creation_time");
    record.delivery_start_time = text_field("ad_delivery_start_time");
    record
}

/// Snapshot links embed the caller's token; drop it before the link is
/// stored or exported.
fn strip_access_token(link: &str) -> String {
    let Ok(mut url) = Url::parse(link) else {
        return link.to_string();
    };
    if !url.query_pairs().any(|(k, _)| k == "access_token") {
        return link.to_string();
    }
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != "access_token")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }
    url.to_string()
}
