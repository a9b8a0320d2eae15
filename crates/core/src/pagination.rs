//! Pagination/filter engine shared by every listing.
//!
//! Turns caller-supplied `page`, `page_size` and `sort` values into a [`ListQuery`]
//! whose sort column is always one of the listing's allow-listed `&'static str`
//! names. Nothing derived from request input is ever spliced into SQL text.

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::validator::Validator;

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE: i64 = 10_000_000;
pub const MAX_PAGE_SIZE: i64 = 100;
pub const DEFAULT_SORT: &str = "id";

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// Resolve a requested sort key (`name` or `-name`) against an allow-list of
/// bare column names.
///
/// The returned column is the allow-list entry itself, not the caller's string.
pub fn resolve_sort(
    requested: &str,
    allow_list: &[&'static str],
) -> DomainResult<(&'static str, SortDirection)> {
    let (bare, direction) = match requested.strip_prefix('-') {
        Some(rest) => (rest, SortDirection::Desc),
        None => (requested, SortDirection::Asc),
    };

    allow_list
        .iter()
        .find(|column| **column == bare)
        .map(|column| (*column, direction))
        .ok_or_else(|| DomainError::field("sort", "invalid sort value"))
}

/// Offset/limit window of a page.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Window {
    pub limit: i64,
    pub offset: i64,
}

/// Callers validate `page >= 1` and `1 <= page_size <= MAX_PAGE_SIZE` first.
pub fn compute_window(page: i64, page_size: i64) -> Window {
    Window {
        limit: page_size,
        offset: (page - 1) * page_size,
    }
}

/// Position of a page within the full matching set.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub current_page: i64,
    pub page_size: i64,
    pub first_page: i64,
    pub last_page: i64,
    pub total_records: i64,
}

/// Page metadata for `total_records` matches.
///
/// No matches yields all-zero metadata (not "page 1 of 1"). A requested page past
/// `last_page` is echoed back unchanged.
pub fn build_metadata(total_records: i64, page: i64, page_size: i64) -> Metadata {
    if total_records == 0 {
        return Metadata::default();
    }

    Metadata {
        current_page: page,
        page_size,
        first_page: 1,
        last_page: (total_records + page_size - 1) / page_size,
        total_records,
    }
}

/// Raw paging/sorting parameters as supplied by a caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filters {
    pub page: i64,
    pub page_size: i64,
    pub sort: String,
}

impl Default for Filters {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            page_size: DEFAULT_PAGE_SIZE,
            sort: DEFAULT_SORT.to_string(),
        }
    }
}

impl Filters {
    pub fn new(page: i64, page_size: i64, sort: impl Into<String>) -> Self {
        Self {
            page,
            page_size,
            sort: sort.into(),
        }
    }

    /// Record every paging/sorting violation into `v`.
    pub fn validate(&self, v: &mut Validator, allow_list: &[&'static str]) {
        v.check(self.page > 0, "page", "must be greater than zero");
        v.check(self.page <= MAX_PAGE, "page", "must be a maximum of 10 million");
        v.check(self.page_size > 0, "page_size", "must be greater than zero");
        v.check(
            self.page_size <= MAX_PAGE_SIZE,
            "page_size",
            "must be a maximum of 100",
        );
        v.check(
            resolve_sort(&self.sort, allow_list).is_ok(),
            "sort",
            "invalid sort value",
        );
    }

    /// Validate into a store-ready query; reports all violations at once.
    pub fn into_query(self, allow_list: &[&'static str]) -> DomainResult<ListQuery> {
        let mut v = Validator::new();
        self.validate(&mut v, allow_list);
        v.finish()?;

        let (sort_column, direction) = resolve_sort(&self.sort, allow_list)?;
        Ok(ListQuery {
            page: self.page,
            page_size: self.page_size,
            sort_column,
            direction,
        })
    }
}

/// Validated paging/sorting specification handed to the entity store.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ListQuery {
    page: i64,
    page_size: i64,
    sort_column: &'static str,
    direction: SortDirection,
}

impl ListQuery {
    pub fn page(&self) -> i64 {
        self.page
    }

    pub fn page_size(&self) -> i64 {
        self.page_size
    }

    pub fn sort_column(&self) -> &'static str {
        self.sort_column
    }

    pub fn direction(&self) -> SortDirection {
        self.direction
    }

    pub fn window(&self) -> Window {
        compute_window(self.page, self.page_size)
    }

    pub fn metadata(&self, total_records: i64) -> Metadata {
        build_metadata(total_records, self.page, self.page_size)
    }
}
