use serde::Serialize;

/// Page sizes a client may ask for.
pub const ALLOWED_PAGE_SIZES: [u32; 4] = [10, 20, 50, 100];

/// Used when the requested page size is missing or not allowed.
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// Normalized page/page-size pair.
///
/// `page` is 1-based and never below 1; `per_page` is always one of
/// [`ALLOWED_PAGE_SIZES`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageRequest {
    page: u32,
    per_page: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PageRequest {
    pub fn new(page: i64, per_page: i64) -> Self {
        let page = u32::try_from(page.max(1)).unwrap_or(u32::MAX);
        let per_page = u32::try_from(per_page)
            .ok()
            .filter(|p| ALLOWED_PAGE_SIZES.contains(p))
            .unwrap_or(DEFAULT_PAGE_SIZE);
        Self { page, per_page }
    }

    /// Parse raw query-string values; unparseable values fall back to defaults.
    pub fn from_raw(page: Option<&str>, per_page: Option<&str>) -> Self {
        let page = page.and_then(|p| p.trim().parse::<i64>().ok()).unwrap_or(1);
        let per_page = per_page
            .and_then(|p| p.trim().parse::<i64>().ok())
            .unwrap_or(i64::from(DEFAULT_PAGE_SIZE));
        Self::new(page, per_page)
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn per_page(&self) -> u32 {
        self.per_page
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.per_page)
    }

    pub fn limit(&self) -> u64 {
        u64::from(self.per_page)
    }
}

/// One page of a filtered, ordered collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Number of records matching the filter (all pages).
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
    pub total_pages: u32,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: u64, request: &PageRequest) -> Self {
        let per_page = u64::from(request.per_page());
        let total_pages = u32::try_from(total.div_ceil(per_page)).unwrap_or(u32::MAX);
        Self {
            items,
            total,
            page: request.page(),
            per_page: request.per_page(),
            total_pages,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            per_page: self.per_page,
            total_pages: self.total_pages,
        }
    }
}
