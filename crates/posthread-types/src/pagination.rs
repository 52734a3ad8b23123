//! Offset pagination shared by every list operation.

use serde::{Deserialize, Serialize};

/// Page size used when the requested limit is out of range.
pub const DEFAULT_PAGE_LIMIT: u32 = 20;
/// Largest accepted page size.
pub const MAX_PAGE_LIMIT: u32 = 100;

/// A normalized pagination request.
///
/// Construct with [`PageRequest::new`], which clamps out-of-range input
/// instead of rejecting it: a limit outside `(0, 100]` becomes
/// [`DEFAULT_PAGE_LIMIT`] and a negative offset becomes `0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub limit: u32,
    pub offset: u64,
}

impl PageRequest {
    pub fn new(limit: i64, offset: i64) -> Self {
        let limit = if limit <= 0 || limit > i64::from(MAX_PAGE_LIMIT) {
            DEFAULT_PAGE_LIMIT
        } else {
            limit as u32
        };
        let offset = if offset < 0 { 0 } else { offset as u64 };
        Self { limit, offset }
    }

    /// Builds a request from optional query parameters.
    pub fn from_query(limit: Option<i64>, offset: Option<i64>) -> Self {
        Self::new(limit.unwrap_or(0), offset.unwrap_or(0))
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_LIMIT,
            offset: 0,
        }
    }
}

/// Pagination metadata returned alongside a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInfo {
    pub total: u64,
    pub limit: u32,
    pub offset: u64,
    /// `offset + limit < total`.
    pub has_more: bool,
}

impl PageInfo {
    pub fn new(total: u64, request: PageRequest) -> Self {
        Self {
            total,
            limit: request.limit,
            offset: request.offset,
            has_more: request.offset.saturating_add(u64::from(request.limit)) < total,
        }
    }
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub info: PageInfo,
}

impl<T> Page<T> {
    /// Cuts a page out of an already ordered, complete result set.
    pub fn from_sorted(all: Vec<T>, request: PageRequest) -> Self {
        let total = all.len() as u64;
        let items = all
            .into_iter()
            .skip(usize::try_from(request.offset).unwrap_or(usize::MAX))
            .take(request.limit as usize)
            .collect();
        Self {
            items,
            info: PageInfo::new(total, request),
        }
    }

    /// Transforms every item while keeping the pagination metadata.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            info: self.info,
        }
    }
}
