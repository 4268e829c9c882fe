//! Page arithmetic shared by every list screen, regardless of entity type.
//!
//! Callers are responsible for clamping `page` into `[0, max_page]` before
//! handing it over; these are precondition-checked utilities, not validators.

/// Highest valid 0-indexed page for `total` entries: `ceil(total / page_size) - 1`,
/// floored at 0 when the collection is empty.
pub fn max_page(total: u64, page_size: u64) -> u32 {
    debug_assert!(page_size >= 1, "page_size must be >= 1");
    if total == 0 {
        return 0;
    }
    (total.div_ceil(page_size) - 1) as u32
}

/// Slice of `items` covered by `page`.
pub fn page_slice<T>(items: &[T], page: usize, page_size: usize) -> &[T] {
    debug_assert!(page_size >= 1, "page_size must be >= 1");
    let start = page.saturating_mul(page_size).min(items.len());
    let end = start.saturating_add(page_size).min(items.len());
    &items[start..end]
}
