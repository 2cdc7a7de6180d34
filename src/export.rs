//! JSON download documents

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::error::Result;
use crate::record::ExtractionResult;

/// Pretty-printed document offered for download. Non-ASCII text is kept
/// as-is rather than escaped.
pub fn to_json_document(result: &ExtractionResult) -> Result<String> {
    Ok(serde_json::to_string_pretty(result)?)
}

pub fn from_json_document(json: &str) -> Result<ExtractionResult> {
    Ok(serde_json::from_str(json)?)
}

/// `meta_ads_YYYYMMDD_HHMMSS.json`
pub fn download_file_name(at: &DateTime<Local>) -> String {
    format!("meta_ads_{}.json", at.format("%Y%m%d_%H%M%S"))
}

/// Write `result` into `dir` under its download name and return the path.
pub fn write_json(dir: &Path, result: &ExtractionResult) -> Result<PathBuf> {
    let path = dir.join(download_file_name(&result.timestamp));
    fs::write(&path, to_json_document(result)?)?;
    tracing::info!(path = %path.display(), ads = result.ads.len(), "Wrote result document");
    Ok(path)
}

pub fn read_json(path: &Path) -> Result<ExtractionResult> {
    from_json_document(&fs::read_to_string(path)?)
}
