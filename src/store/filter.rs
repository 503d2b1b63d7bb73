//! List/pagination types shared by the config store (spec.md §4.3).

use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_LIMIT: u32 = 20;
pub const MAX_LIMIT: u32 = 1000;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigListFilter {
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub limit: Option<u32>,
}

impl ConfigListFilter {
    pub fn page(&self) -> u32 {
        self.page.filter(|p| *p >= 1).unwrap_or(DEFAULT_PAGE)
    }

    pub fn limit(&self) -> u32 {
        self.limit
            .map(|l| l.clamp(1, MAX_LIMIT))
            .unwrap_or(DEFAULT_LIMIT)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u32,
}

pub fn paginate<T: Clone>(mut items: Vec<T>, page: u32, limit: u32) -> Page<T> {
    let total = items.len();
    let total_pages = ((total as u32) + limit - 1) / limit.max(1);
    let total_pages = total_pages.max(1);
    let start = ((page.saturating_sub(1)) * limit) as usize;
    if start >= items.len() {
        items.clear();
    } else {
        let end = (start + limit as usize).min(items.len());
        items = items[start..end].to_vec();
    }
    Page {
        items,
        total,
        page,
        limit,
        total_pages,
    }
}
