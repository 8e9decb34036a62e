use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 200;

/// Page request as received from query strings. Missing values use the defaults.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Pagination {
    pub page: Option<u32>,
    pub size: Option<u32>,
}

/// Normalised page window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub page: u32,
    pub size: u32,
    pub skip: u32,
}

impl Pagination {
    pub fn new(page: u32, size: u32) -> Self {
        Self { page: Some(page), size: Some(size) }
    }

    pub fn window(&self) -> PageWindow {
        let page = self.page.unwrap_or(DEFAULT_PAGE).max(1);
        let size = self.size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);

        PageWindow {
            page,
            size,
            skip: (page - 1).saturating_mul(size),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total_records: u64,
    pub page: u32,
    pub size: u32,
}
