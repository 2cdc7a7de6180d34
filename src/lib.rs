//! Ads Library scraper core
//!
//! Looks up advertisers in the public ads library and returns a normalized
//! record of what was found:
//! - Search targets (page id, library URL, keyword + country)
//! - Headless browser navigation with progressive scrolling
//! - Result-count and ad-card extraction with fail-soft selector chains
//! - Ads archive API client as a browser-free alternative
//! - JSON download documents
//! - FFI interface for the host UI

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod export;
pub mod extractors;
pub mod ffi;
pub mod logging;
pub mod navigator;
pub mod record;
pub mod session;
pub mod target;

pub use api::ArchiveClient;
pub use config::ScraperConfig;
pub use engine::ExtractionEngine;
pub use error::{Result, ScraperError};
pub use extractors::DocumentHandle;
pub use ffi::*;
pub use logging::init_logging;
pub use navigator::{ChromeNavigator, Navigator, StaticNavigator};
pub use record::{AdRecord, ExtractionResult};
pub use session::LibraryScraper;
pub use target::{Country, SearchTarget, TargetKind};
