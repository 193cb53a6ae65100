//! Page parameters of list endpoints

pub const DEFAULT_PAGE_SIZE: u32 = 25;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Storage window for a requested page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
	pub offset: usize,
	pub limit: usize,
	/// Effective 1-based page number
	pub page: u32,
	/// Effective page size after clamping
	pub page_size: u32,
}

/// Resolve optional `page`/`page_size` into an offset and limit.
/// Pages start at 1; sizes are clamped to `1..=MAX_PAGE_SIZE`.
pub fn page_window(page: Option<u32>, page_size: Option<u32>) -> PageWindow {
	let page_size = page_size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
	let page = page.unwrap_or(1).max(1);
	PageWindow {
		offset: (page as usize - 1).saturating_mul(page_size as usize),
		limit: page_size as usize,
		page,
		page_size,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_defaults_and_clamping() {
		let window = page_window(None, None);
		assert_eq!(window.offset, 0);
		assert_eq!(window.limit, 25);
		assert_eq!(window.page, 1);

		let window = page_window(Some(0), Some(1000));
		assert_eq!(window.page, 1);
		assert_eq!(window.page_size, MAX_PAGE_SIZE);

		let window = page_window(Some(3), Some(10));
		assert_eq!(window.offset, 20);
		assert_eq!(window.limit, 10);
	}
}
