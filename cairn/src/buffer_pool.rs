//! Manages the buffer pool, a bounded in-memory cache of disk pages.
//!
//! The pool never touches the disk: the engine flushes a page before it
//! becomes pool-resident, so eviction can drop entries unconditionally.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::{Page, PageId};

/// A cached page plus the logical time it was last touched.
struct CacheEntry {
    page: Rc<RefCell<Page>>,
    last_used: u64,
}

/// LRU cache keyed by page id. Recency comes from a monotone logical clock;
/// eviction scans for the smallest tick (O(N) is fine at N = 100).
pub struct BufferPool {
    entries: HashMap<PageId, CacheEntry>,
    clock: u64,
    capacity: usize,
}

impl BufferPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            clock: 0,
            capacity,
        }
    }

    /// On hit, refreshes the entry's recency and hands out the page.
    pub fn get(&mut self, page_id: PageId) -> Option<Rc<RefCell<Page>>> {
        self.clock += 1;
        let clock = self.clock;
        let entry = self.entries.get_mut(&page_id)?;
        entry.last_used = clock;
        Some(entry.page.clone())
    }

    /// Inserts a page, evicting the least recently used entry first if the
    /// pool is full. An existing entry for the same id is overwritten.
    pub fn put(&mut self, page_id: PageId, page: Rc<RefCell<Page>>) {
        if self.entries.len() >= self.capacity {
            self.evict();
        }
        self.clock += 1;
        self.entries.insert(
            page_id,
            CacheEntry {
                page,
                last_used: self.clock,
            },
        );
    }

    /// Drops the entry with the oldest tick; ties break toward the smallest
    /// page id.
    fn evict(&mut self) {
        let victim = self
            .entries
            .iter()
            .min_by_key(|(id, entry)| (entry.last_used, **id))
            .map(|(id, _)| *id);
        if let Some(id) = victim {
            self.entries.remove(&id);
        }
    }

    /// Pages whose in-memory bytes differ from the on-disk copy.
    pub fn dirty_pages(&self) -> Vec<Rc<RefCell<Page>>> {
        self.entries
            .values()
            .filter(|entry| entry.page.borrow().dirty)
            .map(|entry| entry.page.clone())
            .collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(id: PageId) -> Rc<RefCell<Page>> {
        Rc::new(RefCell::new(Page::new(id)))
    }

    #[test]
    fn get_returns_cached_page() {
        let mut pool = BufferPool::new(4);
        pool.put(1, page(1));
        assert!(pool.get(1).is_some());
        assert!(pool.get(2).is_none());
    }

    #[test]
    fn pool_never_exceeds_capacity() {
        let mut pool = BufferPool::new(3);
        for id in 1..=10 {
            pool.put(id, page(id));
        }
        assert_eq!(pool.len(), 3);
    }

    #[test]
    fn eviction_drops_least_recently_used() {
        let mut pool = BufferPool::new(3);
        pool.put(1, page(1));
        pool.put(2, page(2));
        pool.put(3, page(3));

        // Touch 1 so that 2 becomes the oldest.
        pool.get(1);
        pool.put(4, page(4));

        assert!(pool.get(2).is_none());
        assert!(pool.get(1).is_some());
        assert!(pool.get(3).is_some());
        assert!(pool.get(4).is_some());
    }

    #[test]
    fn put_overwrites_existing_entry() {
        let mut pool = BufferPool::new(4);
        pool.put(1, page(1));
        let replacement = page(1);
        replacement.borrow_mut().dirty = true;
        pool.put(1, replacement);

        assert_eq!(pool.len(), 1);
        assert!(pool.get(1).unwrap().borrow().dirty);
    }

    #[test]
    fn dirty_pages_reports_only_dirty_entries() {
        let mut pool = BufferPool::new(4);
        pool.put(1, page(1));
        let dirty = page(2);
        dirty.borrow_mut().dirty = true;
        pool.put(2, dirty);

        let reported = pool.dirty_pages();
        assert_eq!(reported.len(), 1);
        assert_eq!(reported[0].borrow().id, 2);
    }

    #[test]
    fn clear_forgets_everything() {
        let mut pool = BufferPool::new(4);
        pool.put(1, page(1));
        pool.put(2, page(2));
        pool.clear();
        assert!(pool.is_empty());
        assert!(pool.get(1).is_none());
    }
}
