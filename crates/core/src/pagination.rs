//! Offset pagination arithmetic.

use serde::Serialize;

/// One page of results plus the unpaginated match count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Rows matching search + filters before LIMIT/OFFSET.
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: i64, page: u32, per_page: u32) -> Self {
        Self {
            items,
            total,
            page: page.max(1),
            per_page: per_page.max(1),
        }
    }

    pub fn empty(page: u32, per_page: u32) -> Self {
        Self::new(Vec::new(), 0, page, per_page)
    }

    /// Last page number; an empty result still has one (empty) page.
    pub fn last_page(&self) -> u32 {
        last_page(self.total, self.per_page)
    }

    /// 1-based position of the first item on this page, `None` when empty.
    pub fn from(&self) -> Option<i64> {
        (!self.items.is_empty())
            .then(|| i64::from(self.page - 1) * i64::from(self.per_page) + 1)
    }

    /// 1-based position of the last item on this page, `None` when empty.
    pub fn to(&self) -> Option<i64> {
        self.from().map(|from| from + self.items.len() as i64 - 1)
    }

    pub fn meta(&self) -> PageMeta {
        PageMeta {
            total: self.total,
            page: self.page,
            per_page: self.per_page,
            last_page: self.last_page(),
            from: self.from(),
            to: self.to(),
        }
    }
}

/// Serializable pagination block of a listing response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageMeta {
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
    pub last_page: u32,
    pub from: Option<i64>,
    pub to: Option<i64>,
}

pub fn last_page(total: i64, per_page: u32) -> u32 {
    let per_page = i64::from(per_page.max(1));
    let pages = (total.max(0) + per_page - 1) / per_page;
    u32::try_from(pages.max(1)).unwrap_or(u32::MAX)
}
