//! Photo field rules: names, tags, locators and listing parameters.
//!
//! These functions are pure. They are shared by the upload path, the
//! repository and the HTTP layer so every entry point normalizes input the
//! same way.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Error, Result};

/// Maximum trimmed length of a photo name, in characters.
pub const MAX_NAME_LEN: usize = 40;

/// Maximum number of tags kept per photo; extras are dropped.
pub const MAX_TAGS: usize = 10;

/// Maximum length of the persisted tag string.
pub const MAX_TAGS_LEN: usize = 255;

/// Separator used when tags are persisted as one string.
pub const TAG_SEPARATOR: &str = ", ";

/// Page size used when the client sends nothing usable.
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Upper bound for page size.
pub const MAX_PAGE_SIZE: u32 = 50;

/// Default upload ceiling: 10 MiB.
pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

// ---------------------------------------------------------------------------
// Locator
// ---------------------------------------------------------------------------

/// Reference from a metadata row to its blob, e.g. `/uploads/1700000000-42.jpg`.
///
/// The last path segment is the blob's file name inside the blob store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Locator(String);

impl Locator {
    /// Wrap a stored locator string.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Build a locator from a public prefix and a blob file name.
    pub fn from_parts(prefix: &str, file_name: &str) -> Self {
        let prefix = prefix.trim_end_matches('/');
        Self(format!("{prefix}/{file_name}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The blob file name: everything after the final `/`.
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Names and tags
// ---------------------------------------------------------------------------

/// Validated upload fields, ready to persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPhoto {
    pub name: String,
    pub tags: Vec<String>,
}

impl NewPhoto {
    /// Validate raw form fields.
    ///
    /// The name is required and must be 1-40 characters after trimming.
    /// Tags are parsed with [`parse_tags`]; an absent tags field means no tags.
    pub fn from_form(name: Option<&str>, tags: Option<&str>) -> Result<Self> {
        let name = validate_name(name)?;
        let tags = parse_tags(tags.unwrap_or_default());
        if encode_tags(&tags).is_some_and(|s| s.chars().count() > MAX_TAGS_LEN) {
            return Err(Error::Validation(format!(
                "Tags may be at most {MAX_TAGS_LEN} characters in total"
            )));
        }
        Ok(Self { name, tags })
    }

    /// Tags in their persisted form.
    pub fn encoded_tags(&self) -> Option<String> {
        encode_tags(&self.tags)
    }
}

/// Trim and length-check a photo name.
pub fn validate_name(name: Option<&str>) -> Result<String> {
    let trimmed = name.map(str::trim).unwrap_or_default();
    let len = trimmed.chars().count();
    if len == 0 || len > MAX_NAME_LEN {
        return Err(Error::Validation(format!(
            "Name is required and must be at most {MAX_NAME_LEN} characters"
        )));
    }
    Ok(trimmed.to_string())
}

/// Split a comma-separated tag list, trimming entries, dropping empties and
/// keeping only the first [`MAX_TAGS`].
pub fn parse_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .take(MAX_TAGS)
        .map(String::from)
        .collect()
}

/// Join tags for storage. An empty list is stored as NULL.
pub fn encode_tags(tags: &[String]) -> Option<String> {
    if tags.is_empty() {
        None
    } else {
        Some(tags.join(TAG_SEPARATOR))
    }
}

/// Parse a stored tag string back into a list.
pub fn decode_tags(stored: Option<&str>) -> Vec<String> {
    stored
        .map(|s| {
            s.split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Listing parameters
// ---------------------------------------------------------------------------

/// Column the listing is ordered by. Ties always break on `id` descending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    Name,
    #[default]
    UploadedAt,
}

impl SortField {
    /// `name` selects [`SortField::Name`]; anything else sorts by date.
    pub fn from_param(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some(s) if s.eq_ignore_ascii_case("name") => SortField::Name,
            _ => SortField::UploadedAt,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    /// `asc` selects ascending; anything else is descending.
    pub fn from_param(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some(s) if s.eq_ignore_ascii_case("asc") => SortOrder::Asc,
            _ => SortOrder::Desc,
        }
    }
}

/// A normalized page request. `number >= 1`, `size` in `1..=MAX_PAGE_SIZE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub number: u32,
    pub size: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            number: 1,
            size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PageRequest {
    /// Normalize raw query values. Never fails: non-numeric or non-positive
    /// values fall back to the defaults, oversized page sizes are clamped.
    pub fn from_params(page: Option<&str>, page_size: Option<&str>) -> Self {
        let number = parse_positive(page).map_or(1, |n| n.min(u32::MAX as i64) as u32);
        let size = parse_positive(page_size)
            .map_or(DEFAULT_PAGE_SIZE, |n| n.min(MAX_PAGE_SIZE as i64) as u32);
        Self { number, size }
    }

    /// Rows to skip before this page.
    pub fn offset(&self) -> i64 {
        (self.number as i64 - 1) * self.size as i64
    }
}

fn parse_positive(raw: Option<&str>) -> Option<i64> {
    raw?.trim().parse::<i64>().ok().filter(|n| *n > 0)
}

/// A listing request after normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    /// Case-insensitive substring to match against names.
    pub search: Option<String>,
    pub sort: SortField,
    pub order: SortOrder,
    pub page: PageRequest,
}

impl ListQuery {
    /// Normalize a search term: trimmed, empty means no filter.
    pub fn normalize_search(raw: Option<&str>) -> Option<String> {
        raw.map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
    }
}
