use serde::Serialize;

use crate::error::QueueError;

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_LIMIT: i64 = 10;
pub const MAX_LIMIT: i64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub limit: i64,
}

impl PageRequest {
    pub fn from_query(page: Option<i64>, limit: Option<i64>) -> Result<Self, QueueError> {
        let page = page.unwrap_or(DEFAULT_PAGE);
        let limit = limit.unwrap_or(DEFAULT_LIMIT);
        if page < 1 {
            return Err(QueueError::Validation("page must be a positive integer".into()));
        }
        if !(1..=MAX_LIMIT).contains(&limit) {
            return Err(QueueError::Validation(format!(
                "limit must be between 1 and {MAX_LIMIT}"
            )));
        }
        Ok(Self { page, limit })
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaginationMeta {
    pub total_items: i64,
    pub total_pages: i64,
    pub current_page: i64,
    pub item_count: i64,
}

impl PaginationMeta {
    pub fn new(total_items: i64, req: PageRequest, item_count: usize) -> Self {
        let total_pages = (total_items + req.limit - 1) / req.limit;
        Self {
            total_items,
            total_pages,
            current_page: req.page,
            item_count: item_count as i64,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub pagination: PaginationMeta,
}
