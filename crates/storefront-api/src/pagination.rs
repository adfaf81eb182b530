//! # Page-Number Pagination
//!
//! List endpoints return `{count, next, previous, results}` where `next`
//! and `previous` are page numbers (1-based) or `null`. Requesting a page
//! past the end is a 404; the first page of an empty list is not.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::config::MAX_PAGE_SIZE;
use crate::error::AppError;
use crate::routes::admin::AdminOrderRow;
use crate::routes::products::ProductView;

/// One page of a list result.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[aliases(ProductPage = Page<ProductView>, AdminOrderPage = Page<AdminOrderRow>)]
pub struct Page<T> {
    /// Total number of items across all pages.
    pub count: usize,
    pub next: Option<u32>,
    pub previous: Option<u32>,
    pub results: Vec<T>,
}

/// Resolve the effective page size: the requested size clamped to
/// `1..=MAX_PAGE_SIZE`, or the default when absent or zero.
pub fn effective_page_size(requested: Option<u32>, default: u32) -> u32 {
    match requested {
        None | Some(0) => default,
        Some(n) => n.min(MAX_PAGE_SIZE),
    }
}

/// Slice an already filtered and ordered list into one page.
pub fn paginate<T>(items: Vec<T>, page: Option<u32>, page_size: u32) -> Result<Page<T>, AppError> {
    let page = page.unwrap_or(1);
    let page_size = page_size.max(1) as usize;
    let count = items.len();
    let pages = count.div_ceil(page_size).max(1);

    if page == 0 || page as usize > pages {
        return Err(AppError::NotFound(format!(
            "invalid page {page}: there are {pages} page(s)"
        )));
    }

    let start = (page as usize - 1) * page_size;
    let results: Vec<T> = items.into_iter().skip(start).take(page_size).collect();

    Ok(Page {
        count,
        next: ((page as usize) < pages).then(|| page + 1),
        previous: (page > 1).then(|| page - 1),
        results,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_page_links() {
        let page = paginate((1..=25).collect::<Vec<_>>(), None, 10).unwrap();
        assert_eq!(page.count, 25);
        assert_eq!(page.results, (1..=10).collect::<Vec<_>>());
        assert_eq!(page.next, Some(2));
        assert_eq!(page.previous, None);
    }

    #[test]
    fn last_partial_page() {
        let page = paginate((1..=25).collect::<Vec<_>>(), Some(3), 10).unwrap();
        assert_eq!(page.results, vec![21, 22, 23, 24, 25]);
        assert_eq!(page.next, None);
        assert_eq!(page.previous, Some(2));
    }

    #[test]
    fn empty_list_first_page_ok() {
        let page = paginate(Vec::<u8>::new(), Some(1), 10).unwrap();
        assert_eq!(page.count, 0);
        assert!(page.results.is_empty());
        assert_eq!(page.next, None);
    }

    #[test]
    fn out_of_range_pages_are_not_found() {
        assert!(matches!(
            paginate((1..=5).collect::<Vec<_>>(), Some(2), 10),
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            paginate((1..=5).collect::<Vec<_>>(), Some(0), 10),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn page_size_clamping() {
        assert_eq!(effective_page_size(None, 10), 10);
        assert_eq!(effective_page_size(Some(0), 10), 10);
        assert_eq!(effective_page_size(Some(25), 10), 25);
        assert_eq!(effective_page_size(Some(1_000), 10), MAX_PAGE_SIZE);
    }
}
