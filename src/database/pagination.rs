use serde::{Deserialize, Serialize};

use crate::constants::{MAX_RECIPE_COUNT_PER_PAGE, RECIPE_COUNT_PER_PAGE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub limit: i64,
    pub offset: i64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: RECIPE_COUNT_PER_PAGE,
            offset: 0,
        }
    }
}

impl Pagination {
    /// Non-positive limits fall back to the default page size, large ones are capped.
    pub fn new(limit: i64, offset: i64) -> Self {
        let limit = if limit <= 0 {
            RECIPE_COUNT_PER_PAGE
        } else {
            limit.min(MAX_RECIPE_COUNT_PER_PAGE)
        };

        Self {
            limit,
            offset: offset.max(0),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub rows: Vec<T>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

impl<T> Page<T> {
    pub fn from_rows(rows: Vec<T>, total: i64, pagination: Pagination) -> Self {
        Self {
            rows,
            total,
            limit: pagination.limit,
            offset: pagination.offset,
        }
    }

    pub fn next_offset(&self) -> Option<i64> {
        let next = self.offset + self.limit;
        (next < self.total).then_some(next)
    }

    pub fn prev_offset(&self) -> Option<i64> {
        (self.offset > 0).then(|| (self.offset - self.limit).max(0))
    }
}
