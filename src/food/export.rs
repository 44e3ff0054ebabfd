use std::path::{Path, PathBuf};

use bytes::Bytes;
use lazy_static::lazy_static;
use regex::Regex;
use time::{format_description::FormatItem, macros::format_description, Date};
use tracing::{error, info, warn};

use crate::{
    error::{ApiError, CrudError, ValidationError},
    food::api::FoodApi,
};

pub const EXPORT_FAILED: &str = "Failed to export CSV. Please try again.";

/// Optional, inclusive date bounds of an export.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportRange {
    start: Option<Date>,
    end: Option<Date>,
}

const ISO_DATE: &[FormatItem<'_>] = format_description!("[year]-[month]-[day]");

fn iso(date: Date) -> String {
    date.format(ISO_DATE).unwrap_or_else(|_| date.to_string())
}

fn parse_date(raw: Option<&str>) -> Result<Option<Date>, ValidationError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(raw) => Date::parse(raw, ISO_DATE)
            .map(Some)
            .map_err(|_| ValidationError::new(format!("Invalid date `{raw}`; use YYYY-MM-DD"))),
    }
}

impl ExportRange {
    pub fn all_time() -> Self {
        Self::default()
    }

    pub fn new(start: Option<Date>, end: Option<Date>) -> Result<Self, ValidationError> {
        if let (Some(s), Some(e)) = (start, end) {
            if s > e {
                return Err(ValidationError::new("Start date cannot be after end date"));
            }
        }
        Ok(Self { start, end })
    }

    /// Reads `YYYY-MM-DD` bounds; blank input means unbounded.
    pub fn parse(start: Option<&str>, end: Option<&str>) -> Result<Self, ValidationError> {
        Self::new(parse_date(start)?, parse_date(end)?)
    }

    pub fn start(&self) -> Option<Date> {
        self.start
    }

    pub fn end(&self) -> Option<Date> {
        self.end
    }

    pub fn query(&self) -> Vec<(&'static str, String)> {
        let mut query = Vec::new();
        if let Some(start) = self.start {
            query.push(("startDate", iso(start)));
        }
        if let Some(end) = self.end {
            query.push(("endDate", iso(end)));
        }
        query
    }

    /// Used when the server does not name the file. An end date alone is not reflected.
    pub fn default_filename(&self) -> String {
        match (self.start, self.end) {
            (Some(s), Some(e)) => format!("food_items_{}_to_{}.csv", iso(s), iso(e)),
            (Some(s), None) => format!("food_items_from_{}.csv", iso(s)),
            _ => "food_items_all_time.csv".to_string(),
        }
    }

    pub fn describe(&self) -> String {
        match (self.start, self.end) {
            (None, None) => "Export all food items (all time)".to_string(),
            (Some(s), Some(e)) => format!("Export items from {} to {}", iso(s), iso(e)),
            (Some(s), None) => format!("Export items from {} onwards", iso(s)),
            (None, Some(e)) => format!("Export items up to {}", iso(e)),
        }
    }
}

/// File name announced in a `Content-Disposition` header, stripped of any directory part.
/// The extended `filename*=charset''value` form wins and is percent-decoded.
pub fn filename_from_disposition(header: &str) -> Option<String> {
    lazy_static! {
        static ref EXT_FILENAME_RE: Regex =
            Regex::new(r#"(?i)filename\*\s*=\s*"?[^'";]*'[^']*'([^";]+)"?"#).unwrap();
        static ref FILENAME_RE: Regex =
            Regex::new(r#"(?i)filename\s*=\s*"?([^";]+)"?"#).unwrap();
    }
    let raw = match EXT_FILENAME_RE.captures(header).and_then(|c| c.get(1)) {
        Some(encoded) => urlencoding::decode(encoded.as_str().trim()).ok()?.into_owned(),
        None => FILENAME_RE.captures(header)?.get(1)?.as_str().trim().to_owned(),
    };
    Path::new(&raw)
        .file_name()
        .and_then(|name| name.to_str())
        .filter(|name| !name.is_empty() && *name != "..")
        .map(str::to_owned)
}

/// CSV body of an export with the name to save it under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvDownload {
    pub bytes: Bytes,
    pub filename: String,
}

/// Downloads the export for `range` and writes it into `dir`.
pub async fn export_csv(
    api: &FoodApi,
    range: &ExportRange,
    dir: &Path,
) -> Result<PathBuf, CrudError> {
    let download = match api.export(range).await {
        Ok(download) => download,
        Err(ApiError::Unauthorized(_)) => return Err(CrudError::SessionExpired),
        Err(e) => {
            warn!(error = %e, "export request failed");
            return Err(CrudError::Rejected(EXPORT_FAILED.to_string()));
        }
    };

    let path = dir.join(&download.filename);
    if let Err(e) = tokio::fs::write(&path, &download.bytes).await {
        error!(error = %e, path = %path.display(), "could not write export");
        return Err(CrudError::Rejected(EXPORT_FAILED.to_string()));
    }
    info!(path = %path.display(), bytes = download.bytes.len(), "export written");
    Ok(path)
}
