use crate::types::Recommendation;

/// Number of pages needed to show `len` items, `page_size` at a time.
pub fn total_pages(len: usize, page_size: usize) -> usize {
    if page_size == 0 {
        return 0;
    }
    len.div_ceil(page_size)
}

/// Slice out a 1-indexed page.
///
/// Pages past the end (and page 0) are empty.
///
/// ```rust
/// use lastfm_recommender::queue::page;
///
/// let items: Vec<u32> = (0..12).collect();
/// assert_eq!(page(&items, 1, 5), &[0, 1, 2, 3, 4]);
/// assert_eq!(page(&items, 3, 5), &[10, 11]);
/// assert!(page(&items, 4, 5).is_empty());
/// ```
pub fn page<T>(items: &[T], page_number: usize, page_size: usize) -> &[T] {
    if page_number == 0 || page_size == 0 {
        return &[];
    }
    let start = (page_number - 1).saturating_mul(page_size);
    if start >= items.len() {
        return &[];
    }
    let end = start.saturating_add(page_size).min(items.len());
    &items[start..end]
}

/// The recommendations currently on offer, with a page cursor.
///
/// The queue is only ever shrunk by [`remove`](Self::remove) or replaced
/// wholesale by [`replace`](Self::replace). While it is non-empty the cursor
/// stays within `1..=total_pages()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecommendationQueue {
    items: Vec<Recommendation>,
    page: usize,
    page_size: usize,
}

impl Default for RecommendationQueue {
    fn default() -> Self {
        Self::new(5)
    }
}

impl RecommendationQueue {
    pub fn new(page_size: usize) -> Self {
        Self {
            items: Vec::new(),
            page: 1,
            page_size: page_size.max(1),
        }
    }

    pub fn from_items(items: Vec<Recommendation>, page_size: usize) -> Self {
        let mut queue = Self::new(page_size);
        queue.replace(items);
        queue
    }

    /// Swap in a freshly built list and go back to the first page.
    pub fn replace(&mut self, items: Vec<Recommendation>) {
        self.items = items;
        self.page = 1;
    }

    pub fn items(&self) -> &[Recommendation] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Recommendation> {
        self.items.get(index)
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn current_page(&self) -> usize {
        self.page
    }

    pub fn total_pages(&self) -> usize {
        total_pages(self.items.len(), self.page_size)
    }

    pub fn page(&self, page_number: usize) -> &[Recommendation] {
        page(&self.items, page_number, self.page_size)
    }

    pub fn current_items(&self) -> &[Recommendation] {
        self.page(self.page)
    }

    /// Absolute index of the first item on the current page.
    pub fn page_start(&self) -> usize {
        (self.page - 1) * self.page_size
    }

    /// Translate a position on the current page into a queue index.
    pub fn absolute_index(&self, page_relative: usize) -> Option<usize> {
        (page_relative < self.current_items().len()).then(|| self.page_start() + page_relative)
    }

    /// Remove the item at an absolute queue index.
    ///
    /// Out-of-range indices are ignored. If the removal empties the current
    /// page, the cursor falls back to the new last page.
    pub fn remove(&mut self, index: usize) -> Option<Recommendation> {
        if index >= self.items.len() {
            return None;
        }
        let removed = self.items.remove(index);
        self.page = self.page.min(self.total_pages()).max(1);
        Some(removed)
    }

    /// Advance one page; returns whether the cursor moved.
    pub fn next_page(&mut self) -> bool {
        if self.page < self.total_pages() {
            self.page += 1;
            true
        } else {
            false
        }
    }

    /// Go back one page; returns whether the cursor moved.
    pub fn previous_page(&mut self) -> bool {
        if self.page > 1 {
            self.page -= 1;
            true
        } else {
            false
        }
    }
}
