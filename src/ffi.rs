//! FFI interface for the host UI
//!
//! The presentation layer drives the scraper through these C-compatible
//! functions. Requests and results cross the boundary as JSON.

use std::ffi::{c_char, CStr, CString};
use std::ptr;

use serde::{Deserialize, Serialize};

use crate::api::ArchiveClient;
use crate::config::ScraperConfig;
use crate::engine::ExtractionEngine;
use crate::error::{Result, ScraperError};
use crate::extractors::DocumentHandle;
use crate::logging::init_logging;
use crate::navigator::ChromeNavigator;
use crate::record::ExtractionResult;
use crate::session::LibraryScraper;
use crate::target::{SearchTarget, TargetKind};

/// Result struct returned to the host.
/// Both pointers are owned by Rust and must be freed via `adlib_free_result`
#[repr(C)]
pub struct AdlibResultFFI {
    /// JSON-serialized ExtractionResult (null-terminated)
    pub json_ptr: *mut c_char,
    /// Error message if the request itself was invalid (null-terminated), or null
    pub error_ptr: *mut c_char,
}

/// Long-lived scraper owned by the host. One browser session per handle;
/// searches on the same handle run one at a time.
pub struct ScraperHandle {
    scraper: LibraryScraper<ChromeNavigator>,
    archive: ArchiveClient,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    #[default]
    Browser,
    Api,
}

/// Search request from the host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    pub mode: TargetKind,
    pub value: String,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub source: Source,
    #[serde(default)]
    pub access_token: Option<String>,
}

impl ScraperHandle {
    pub fn new(config: ScraperConfig) -> Result<Self> {
        let archive = ArchiveClient::new(&config.api, &config.library, &config.extraction);
        Ok(Self {
            scraper: LibraryScraper::with_chrome(config)?,
            archive,
        })
    }

    /// Transport failures come back inside the result; only an invalid
    /// request is an `Err`.
    pub fn search(&self, request: &SearchRequest) -> Result<ExtractionResult> {
        let target =
            SearchTarget::resolve(request.mode, &request.value, request.country.as_deref())?;
        match request.source {
            Source::Browser => Ok(self.scraper.search(&target)),
            Source::Api if target.kind() == TargetKind::PageId => self
                .archive
                .fetch_by_page_id(target.value(), request.access_token.as_deref()),
            Source::Api => Err(ScraperError::InvalidTarget(
                "API lookups need a page id or a URL carrying one".into(),
            )),
        }
    }
}

/// Create a scraper handle.
///
/// # Arguments
/// * `config_json` - JSON-serialized ScraperConfig (null-terminated), or null
///   to load the configuration from `ADLIB_*` environment variables
///
/// # Returns
/// A handle to pass to `adlib_search`, or null if the configuration is invalid
///
/// # Safety
/// - `config_json` must be null or a valid null-terminated C string
/// - The handle must be released with `adlib_scraper_free`
#[no_mangle]
pub unsafe extern "C" fn adlib_scraper_new(config_json: *const c_char) -> *mut ScraperHandle {
    init_logging();

    let config = if config_json.is_null() {
        ScraperConfig::from_env()
    } else {
        match CStr::from_ptr(config_json).to_str() {
            Ok(s) => ScraperConfig::from_json(s),
            Err(_) => Err(ScraperError::Config("Invalid UTF-8 in config JSON".into())),
        }
    };

    match config.and_then(ScraperHandle::new) {
        Ok(handle) => Box::into_raw(Box::new(handle)),
        Err(e) => {
            tracing::error!(error = %e, "Failed to create scraper");
            ptr::null_mut()
        }
    }
}

/// Release a handle and its browser session.
///
/// # Safety
/// - `handle` must be null or have been returned by `adlib_scraper_new`
/// - Must only be called once per handle, after all searches have returned
#[no_mangle]
pub unsafe extern "C" fn adlib_scraper_free(handle: *mut ScraperHandle) {
    if !handle.is_null() {
        let handle = Box::from_raw(handle);
        handle.scraper.close();
    }
}

/// Run one search.
///
/// # Arguments
/// * `handle` - Handle from `adlib_scraper_new`
/// * `request_json` - JSON-serialized SearchRequest (null-terminated)
///
/// # Returns
/// AdlibResultFFI with json_ptr set to the ExtractionResult (possibly carrying
/// its own `erro` field) or error_ptr set when the request was invalid
///
/// # Safety
/// - `handle` must be a live handle from `adlib_scraper_new`
/// - `request_json` must be a valid null-terminated C string
/// - Caller must free the result via `adlib_free_result`
#[no_mangle]
pub unsafe extern "C" fn adlib_search(
    handle: *const ScraperHandle,
    request_json: *const c_char,
) -> AdlibResultFFI {
    let Some(handle) = handle.as_ref() else {
        return make_error_result("Scraper handle is null");
    };

    let request_str = match read_c_str(request_json) {
        Ok(s) => s,
        Err(msg) => return make_error_result(msg),
    };
    let request: SearchRequest = match serde_json::from_str(request_str) {
        Ok(r) => r,
        Err(e) => return make_error_result(&format!("Failed to parse request JSON: {}", e)),
    };

    match handle.search(&request) {
        Ok(result) => make_json_result(&result),
        Err(e) => make_error_result(&e.to_string()),
    }
}

/// Extract from HTML captured by the host, without a browser.
///
/// # Arguments
/// * `html_ptr` - Pointer to HTML content (UTF-8, not necessarily null-terminated)
/// * `html_len` - Length of HTML content in bytes
/// * `url` - Page URL recorded in the result (null-terminated), may be null
/// * `config_json` - JSON-serialized ScraperConfig, or null for defaults
///
/// # Safety
/// - `html_ptr` must point to valid memory of at least `html_len` bytes
/// - `url` and `config_json` must be null or valid null-terminated C strings
/// - Caller must free the result via `adlib_free_result`
#[no_mangle]
pub unsafe extern "C" fn adlib_extract_html(
    html_ptr: *const c_char,
    html_len: usize,
    url: *const c_char,
    config_json: *const c_char,
) -> AdlibResultFFI {
    let html = if html_ptr.is_null() || html_len == 0 {
        ""
    } else {
        let slice = std::slice::from_raw_parts(html_ptr as *const u8, html_len);
        match std::str::from_utf8(slice) {
            Ok(s) => s,
            Err(_) => return make_error_result("Invalid UTF-8 in HTML content"),
        }
    };

    let url = if url.is_null() {
        ""
    } else {
        match read_c_str(url) {
            Ok(s) => s,
            Err(msg) => return make_error_result(msg),
        }
    };

    let config = if config_json.is_null() {
        ScraperConfig::default()
    } else {
        let parsed = read_c_str(config_json)
            .map_err(|msg| ScraperError::Config(msg.to_string()))
            .and_then(ScraperConfig::from_json);
        match parsed {
            Ok(c) => c,
            Err(e) => return make_error_result(&e.to_string()),
        }
    };

    match ExtractionEngine::new(&config.extraction) {
        Ok(engine) => make_json_result(&engine.extract(&DocumentHandle::parse(html, url))),
        Err(e) => make_error_result(&e.to_string()),
    }
}

/// Free an AdlibResultFFI returned by this library
///
/// # Safety
/// - `result` must have been returned by `adlib_search` or `adlib_extract_html`
/// - Must only be called once per result
#[no_mangle]
pub unsafe extern "C" fn adlib_free_result(result: AdlibResultFFI) {
    if !result.json_ptr.is_null() {
        drop(CString::from_raw(result.json_ptr));
    }
    if !result.error_ptr.is_null() {
        drop(CString::from_raw(result.error_ptr));
    }
}

unsafe fn read_c_str<'a>(ptr: *const c_char) -> std::result::Result<&'a str, &'static str> {
    if ptr.is_null() {
        return Err("Request JSON is null");
    }
    CStr::from_ptr(ptr)
        .to_str()
        .map_err(|_| "Invalid UTF-8 in request")
}

fn make_json_result(result: &ExtractionResult) -> AdlibResultFFI {
    match serde_json::to_string(result) {
        Ok(json) => match CString::new(json) {
            Ok(cstr) => AdlibResultFFI {
                json_ptr: cstr.into_raw(),
                error_ptr: ptr::null_mut(),
            },
            Err(_) => make_error_result("Result JSON contains null bytes"),
        },
        Err(e) => make_error_result(&format!("Failed to serialize result: {}", e)),
    }
}

// Helper to create error result
fn make_error_result(msg: &str) -> AdlibResultFFI {
    let error_cstr = CString::new(msg).unwrap_or_else(|_| CString::new("Unknown error").unwrap());
    AdlibResultFFI {
        json_ptr: ptr::null_mut(),
        error_ptr: error_cstr.into_raw(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::TOTAL_UNKNOWN_WITHOUT_CREDENTIAL;

    unsafe fn take_json(result: AdlibResultFFI) -> serde_json::Value {
        assert!(result.error_ptr.is_null(), "unexpected error");
        let json = CStr::from_ptr(result.json_ptr).to_str().unwrap().to_string();
        adlib_free_result(result);
        serde_json::from_str(&json).unwrap()
    }

    unsafe fn take_error(result: AdlibResultFFI) -> String {
        assert!(result.json_ptr.is_null());
        let msg = CStr::from_ptr(result.error_ptr).to_str().unwrap().to_string();
        adlib_free_result(result);
        msg
    }

    #[test]
    fn test_api_search_without_credential() {
        let config = CString::new("{}").unwrap();
        let request = CString::new(
            r#"{"mode": "url", "value": "https://www.facebook.com/ads/library/?view_all_page_id=675929692278580", "source": "api"}"#,
        )
        .unwrap();

        unsafe {
            let handle = adlib_scraper_new(config.as_ptr());
            assert!(!handle.is_null());
            let json = take_json(adlib_search(handle, request.as_ptr()));
            adlib_scraper_free(handle);

            assert_eq!(json["total_resultados"], TOTAL_UNKNOWN_WITHOUT_CREDENTIAL);
            assert_eq!(json["anuncios"].as_array().unwrap().len(), 0);
            assert!(json["url"]
                .as_str()
                .unwrap()
                .ends_with("view_all_page_id=675929692278580"));
            assert!(json.get("erro").is_none());
        }
    }

    #[test]
    fn test_invalid_requests() {
        let config = CString::new(r#"{"extraction": {"max_ads": 5}}"#).unwrap();
        unsafe {
            let handle = adlib_scraper_new(config.as_ptr());

            let bad_json = CString::new("{").unwrap();
            assert!(take_error(adlib_search(handle, bad_json.as_ptr()))
                .starts_with("Failed to parse request JSON"));

            let keyword_api =
                CString::new(r#"{"mode": "keyword", "value": "shoes", "source": "api"}"#).unwrap();
            assert!(take_error(adlib_search(handle, keyword_api.as_ptr()))
                .contains("page id"));

            let bad_id = CString::new(r#"{"mode": "page_id", "value": "12x"}"#).unwrap();
            assert!(take_error(adlib_search(handle, bad_id.as_ptr()))
                .starts_with("Invalid search target"));

            assert_eq!(
                take_error(adlib_search(ptr::null(), bad_id.as_ptr())),
                "Scraper handle is null"
            );
            adlib_scraper_free(handle);
        }
    }

    #[test]
    fn test_invalid_config_gives_null_handle() {
        let config = CString::new(r#"{"extraction": {"max_ads": 0}}"#).unwrap();
        unsafe {
            assert!(adlib_scraper_new(config.as_ptr()).is_null());
        }
    }

    #[test]
    fn test_extract_html() {
        let html = r#"<h3>7 results</h3><div data-pagelet="x">Um anúncio com texto longo o suficiente para ser considerado um card.</div>"#;
        let url = CString::new("file:///capture.html").unwrap();
        unsafe {
            let json = take_json(adlib_extract_html(
                html.as_ptr() as *const c_char,
                html.len(),
                url.as_ptr(),
                ptr::null(),
            ));
            assert_eq!(json["url"], "file:///capture.html");
            assert_eq!(json["total_resultados"], "7 results");
            assert_eq!(json["anuncios"][0]["id"], "card_1");
        }
    }
}
