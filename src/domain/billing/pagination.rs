//! Page requests, page envelopes and sort order for billing reads.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::domain::foundation::{DomainError, ErrorCode};

pub const DEFAULT_PER_PAGE: u32 = 25;
pub const MAX_PER_PAGE: u32 = 100;

/// Sort order for subscription and billing event listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    CreatedAtAsc,
    #[default]
    CreatedAtDesc,
    UpdatedAtAsc,
    UpdatedAtDesc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::CreatedAtAsc => "created_at_asc",
            SortOrder::CreatedAtDesc => "created_at_desc",
            SortOrder::UpdatedAtAsc => "updated_at_asc",
            SortOrder::UpdatedAtDesc => "updated_at_desc",
        }
    }
}

impl FromStr for SortOrder {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "created_at_asc" => Ok(SortOrder::CreatedAtAsc),
            "created_at_desc" | "" => Ok(SortOrder::CreatedAtDesc),
            "updated_at_asc" => Ok(SortOrder::UpdatedAtAsc),
            "updated_at_desc" => Ok(SortOrder::UpdatedAtDesc),
            other => Err(DomainError::validation(
                "order",
                format!("Unknown sort order '{}'", other),
            )),
        }
    }
}

/// A clamped page request. Pages are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    per_page: u32,
}

impl PageRequest {
    /// Builds a request, defaulting to page 1 of 25 and clamping the page
    /// size to `1..=100`.
    pub fn new(page: Option<u32>, per_page: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            per_page: per_page
                .unwrap_or(DEFAULT_PER_PAGE)
                .clamp(1, MAX_PER_PAGE),
        }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn per_page(&self) -> u32 {
        self.per_page
    }

    /// Number of rows to skip.
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.per_page)
    }

    /// `ceil(total / per_page)`.
    pub fn total_pages(&self, total: u64) -> u32 {
        let pages = total.div_ceil(u64::from(self.per_page));
        u32::try_from(pages).unwrap_or(u32::MAX)
    }

    /// Fails with `PageOutOfRange` when the page lies past the last page.
    /// Page 1 is always in range, even for an empty result.
    pub fn ensure_in_range(&self, total: u64) -> Result<(), DomainError> {
        let total_pages = self.total_pages(total);
        if self.page > 1 && self.page > total_pages {
            return Err(DomainError::new(
                ErrorCode::PageOutOfRange,
                format!("Page {} exceeds total pages {}", self.page, total_pages),
            )
            .with_detail("page", self.page.to_string())
            .with_detail("total_pages", total_pages.to_string()));
        }
        Ok(())
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// One page of results plus the pagination envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub total_pages: u32,
    pub page: u32,
    pub per_page: u32,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: u64, request: &PageRequest) -> Self {
        Self {
            items,
            total,
            total_pages: request.total_pages(total),
            page: request.page(),
            per_page: request.per_page(),
        }
    }

    /// Projects the items, keeping the envelope.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            total_pages: self.total_pages,
            page: self.page,
            per_page: self.per_page,
        }
    }
}
