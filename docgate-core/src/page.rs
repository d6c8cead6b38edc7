//! Pagination parameters and result pages for list operations.
//!
//! Pages are 1-indexed. Requesting a page past the end of the data is not an error: it
//! yields a [`Page`] with no items whose `total` still reports the number of matches.

use serde::{Deserialize, Serialize};

use crate::error::{DocumentStoreError, DocumentStoreResult};

/// A single page of listed results.
///
/// # Example
///
/// ```ignore
/// use docgate::page::Page;
///
/// let page: Page<String> = Page::builder(vec!["item1".to_string()])
///     .with_total(100)
///     .with_next_page(Some(2))
///     .build();
///
/// assert_eq!(page.items.len(), 1);
/// assert_eq!(page.total, 100);
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Page<T> {
    /// The items contained in this page.
    pub items: Vec<T>,
    /// Total count of matching items across all pages.
    pub total: usize,
    /// The next page number (if more pages exist).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page: Option<usize>,
    /// The previous page number (if this is not the first page).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_page: Option<usize>,
}

impl<T> Page<T> {
    /// Creates a new builder for constructing a page with custom settings.
    pub fn builder(items: Vec<T>) -> PageBuilder<T> {
        PageBuilder::new(items)
    }

    /// Transforms every item, keeping the pagination metadata.
    pub fn try_map<U, E>(self, f: impl FnMut(T) -> Result<U, E>) -> Result<Page<U>, E> {
        Ok(Page {
            items: self.items.into_iter().map(f).collect::<Result<Vec<_>, E>>()?,
            total: self.total,
            next_page: self.next_page,
            previous_page: self.previous_page,
        })
    }
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            total: 0,
            next_page: None,
            previous_page: None,
        }
    }
}

/// Builder for constructing [`Page`] instances with fluent API.
pub struct PageBuilder<T> {
    items: Vec<T>,
    total: usize,
    next_page: Option<usize>,
    previous_page: Option<usize>,
}

impl<T> PageBuilder<T> {
    /// Creates a new builder with the given items.
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items,
            total: 0,
            next_page: None,
            previous_page: None,
        }
    }

    /// Sets the total count of items across all pages.
    pub fn with_total(mut self, total: usize) -> Self {
        self.total = total;
        self
    }

    /// Sets the next page number (or `None` if this is the last page).
    pub fn with_next_page(mut self, next_page: Option<usize>) -> Self {
        self.next_page = next_page;
        self
    }

    /// Sets the previous page number (or `None` if this is the first page).
    pub fn with_previous_page(mut self, previous_page: Option<usize>) -> Self {
        self.previous_page = previous_page;
        self
    }

    /// Builds and returns the final [`Page`] instance.
    pub fn build(self) -> Page<T> {
        Page {
            items: self.items,
            total: self.total,
            next_page: self.next_page,
            previous_page: self.previous_page,
        }
    }
}

/// Which page to retrieve and how many items per page.
///
/// # Example
///
/// ```ignore
/// use docgate::page::PaginationParams;
///
/// let params = PaginationParams::new(2, 50);
/// assert_eq!(params.offset(), 50);
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationParams {
    /// The page number (1-indexed).
    pub page: usize,
    /// Number of items per page.
    pub size: usize,
}

impl PaginationParams {
    /// Creates new pagination parameters without validating them.
    pub fn new(page: usize, size: usize) -> Self {
        Self { page, size }
    }

    /// Creates a new builder for constructing pagination parameters.
    pub fn builder() -> PaginationParamsBuilder {
        PaginationParamsBuilder::new()
    }

    /// Calculates the number of items to skip for this page.
    pub fn offset(&self) -> usize {
        self.page.saturating_sub(1).saturating_mul(self.size)
    }

    /// Checks that page and size are at least 1 and clamps size to `max_size`.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Validation`] when either value is zero.
    pub fn bounded(self, max_size: usize) -> DocumentStoreResult<Self> {
        if self.page == 0 {
            return Err(DocumentStoreError::validation("page must be at least 1"));
        }
        if self.size == 0 {
            return Err(DocumentStoreError::validation("size must be at least 1"));
        }

        Ok(Self {
            page: self.page,
            size: self.size.min(max_size.max(1)),
        })
    }

    /// Wraps the items of this page with navigation metadata, given the total match count.
    pub fn page_of<T>(&self, items: Vec<T>, total: usize) -> Page<T> {
        let end = self.offset().saturating_add(items.len());

        Page::builder(items)
            .with_total(total)
            .with_next_page(if end < total { Some(self.page + 1) } else { None })
            .with_previous_page(if self.page > 1 { Some(self.page - 1) } else { None })
            .build()
    }
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self { page: 1, size: 10 }
    }
}

/// Builder for [`PaginationParams`] with optional overrides of the defaults.
pub struct PaginationParamsBuilder {
    page: Option<usize>,
    size: Option<usize>,
    default_size: usize,
}

impl PaginationParamsBuilder {
    /// Creates a new builder with no parameters set.
    pub fn new() -> Self {
        Self { page: None, size: None, default_size: 10 }
    }

    /// Sets the page number (1-indexed).
    pub fn with_page(mut self, page: Option<usize>) -> Self {
        self.page = page;
        self
    }

    /// Sets the number of items per page.
    pub fn with_size(mut self, size: Option<usize>) -> Self {
        self.size = size;
        self
    }

    /// Sets the size used when none was requested.
    pub fn with_default_size(mut self, default_size: usize) -> Self {
        self.default_size = default_size;
        self
    }

    /// Builds and returns the [`PaginationParams`], falling back to page 1 and the default size.
    pub fn build(self) -> PaginationParams {
        PaginationParams {
            page: self.page.unwrap_or(1),
            size: self.size.unwrap_or(self.default_size),
        }
    }
}

impl Default for PaginationParamsBuilder {
    fn default() -> Self {
        Self::new()
    }
}
