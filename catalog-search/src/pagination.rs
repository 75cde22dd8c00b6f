use serde::{Deserialize, Serialize};

/// Page counts at or below this are rendered in full.
const FULL_RANGE_LIMIT: u32 = 7;

/// One slot in the rendered pager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "page", rename_all = "snake_case")]
pub enum PageToken {
    Page(u32),
    Ellipsis,
}

/// The "showing x–y of z" line. `first_item` and `last_item` are 1-based and
/// both 0 when nothing matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageWindow {
    pub first_item: u64,
    pub last_item: u64,
    pub total: u64,
}

pub fn total_pages(total_items: u64, page_size: u32) -> u32 {
    if page_size == 0 {
        return 0;
    }
    let pages = total_items.div_ceil(u64::from(page_size));
    u32::try_from(pages).unwrap_or(u32::MAX)
}

/// Page buttons for `current` out of `total_pages`.
///
/// Up to seven pages are listed in full. Beyond that: page 1, an ellipsis when
/// `current > 3`, the neighbours of `current`, an ellipsis when
/// `current < total_pages - 2`, and the last page. A gap of a single page is
/// still shown as an ellipsis.
pub fn page_range(current: u32, total_pages: u32) -> Vec<PageToken> {
    if total_pages <= FULL_RANGE_LIMIT {
        return (1..=total_pages).map(PageToken::Page).collect();
    }

    let current = i64::from(current);
    let last = i64::from(total_pages);
    let mut tokens = vec![PageToken::Page(1)];

    if current > 3 {
        tokens.push(PageToken::Ellipsis);
    }

    let start = (current - 1).max(2);
    let end = (current + 1).min(last - 1);
    tokens.extend((start..=end).map(|page| PageToken::Page(page as u32)));

    if current < last - 2 {
        tokens.push(PageToken::Ellipsis);
    }

    tokens.push(PageToken::Page(total_pages));
    tokens
}

pub fn page_window(page: u32, page_size: u32, total: u64) -> PageWindow {
    let first_item = u64::from(page.max(1) - 1) * u64::from(page_size) + 1;
    if total == 0 || page_size == 0 || first_item > total {
        return PageWindow {
            first_item: 0,
            last_item: 0,
            total,
        };
    }

    PageWindow {
        first_item,
        last_item: (first_item + u64::from(page_size) - 1).min(total),
        total,
    }
}
