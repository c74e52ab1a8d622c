//! Shared page-number pagination helpers.

use serde::Serialize;

pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// A requested page as read from the `page` query parameter.
///
/// Parsing never fails: anything that is not a positive integer requests the
/// first page, and the number is clamped against the collection size later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub number: u64,
    pub size: u32,
}

impl PageRequest {
    pub fn new(number: u64, size: u32) -> Self {
        Self {
            number: number.max(1),
            size: size.max(1),
        }
    }

    pub fn first(size: u32) -> Self {
        Self::new(1, size)
    }

    pub fn parse(raw: Option<&str>, size: u32) -> Self {
        let number = raw
            .map(str::trim)
            .and_then(|value| value.parse::<i64>().ok())
            .filter(|value| *value > 0)
            .map(|value| value as u64)
            .unwrap_or(1);
        Self::new(number, size)
    }

    /// Resolve against `total_items`, clamping past-the-end numbers to the last page.
    pub fn resolve(self, total_items: u64) -> PageWindow {
        let size = u64::from(self.size);
        let total_pages = total_items.div_ceil(size).max(1);
        let number = self.number.clamp(1, total_pages);
        PageWindow {
            number,
            total_pages,
            total_items,
            offset: (number - 1) * size,
            limit: self.size,
        }
    }
}

/// Concrete slice bounds for a resolved page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub number: u64,
    pub total_pages: u64,
    pub total_items: u64,
    pub offset: u64,
    pub limit: u32,
}

impl PageWindow {
    pub fn into_page<T>(self, mut items: Vec<T>) -> Page<T> {
        items.truncate(self.limit as usize);
        Page {
            items,
            number: self.number,
            total_pages: self.total_pages,
            total_items: self.total_items,
        }
    }
}

/// One page of an ordered collection plus navigation metadata.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: u64,
    pub total_pages: u64,
    pub total_items: u64,
}

impl<T> Page<T> {
    pub fn has_next(&self) -> bool {
        self.number < self.total_pages
    }

    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    pub fn next_number(&self) -> Option<u64> {
        self.has_next().then(|| self.number + 1)
    }

    pub fn previous_number(&self) -> Option<u64> {
        self.has_previous().then(|| self.number - 1)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            number: self.number,
            total_pages: self.total_pages,
            total_items: self.total_items,
        }
    }
}
