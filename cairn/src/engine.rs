//! The storage engine coordinator.
//!
//! Owns the pager, buffer pool, index, and journal, and sequences them so
//! that every mutation reaches disk in the order: intent entry, page write,
//! COMMIT entry. Reads bypass the journal. The engine is single-threaded;
//! two engines over the same files is undefined.

use std::borrow::Cow;
use std::cell::RefCell;
use std::io;
use std::path::Path;
use std::rc::Rc;

use crate::btree::BPlusTree;
use crate::buffer_pool::BufferPool;
use crate::journal::{JournalManager, JournalOp};
use crate::page::{copy_truncated, read_cstr};
use crate::pager::Pager;
use crate::{Page, PageId, Record, CACHE_SIZE, DATA_FILE, JOURNAL_FILE, KEY_MAX, ORDER, PAGE_SIZE};

/// Oversize keys behave as their stored truncation everywhere, so lookups,
/// duplicate checks, and the rebuilt index all agree with what the page
/// actually holds.
fn normalized_key(key: &str) -> Cow<'_, str> {
    if key.len() < KEY_MAX {
        Cow::Borrowed(key)
    } else {
        let mut buf = [0u8; KEY_MAX];
        copy_truncated(&mut buf, key);
        Cow::Owned(read_cstr(&buf))
    }
}

/// A point-in-time report of the on-disk footprint and configuration.
#[derive(Debug, Clone, Copy)]
pub struct EngineStats {
    pub file_size: u64,
    pub page_count: u64,
    pub page_size: usize,
    pub cache_capacity: usize,
}

/// The public face of the store: insert / get / update / remove, plus the
/// checkpoint and diagnostics.
pub struct StorageEngine {
    pager: Pager,
    pool: BufferPool,
    index: BPlusTree,
    journal: JournalManager,
}

impl StorageEngine {
    /// Opens (creating if missing) the engine's files under `dir` and
    /// rebuilds the index from the data file.
    pub fn open<P: AsRef<Path>>(dir: P) -> io::Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let pager = Pager::open(dir.join(DATA_FILE))?;
        let journal = JournalManager::open(dir.join(JOURNAL_FILE))?;

        let mut engine = Self {
            pager,
            pool: BufferPool::new(CACHE_SIZE),
            index: BPlusTree::new(ORDER),
            journal,
        };
        engine.rebuild_index()?;
        Ok(engine)
    }

    /// Scans every existing page and indexes the live records. The index is
    /// never persisted, so this runs on each open.
    fn rebuild_index(&mut self) -> io::Result<()> {
        let page_count = self.pager.page_count()?;
        for page_id in 1..=page_count {
            let page = self.pager.read_page(page_id)?;
            let rec = page.read_record();
            if !rec.deleted && rec.key[0] != 0 {
                self.index.insert(&rec.key(), page_id);
            }
        }
        crate::cairn_debug_log!(
            "[StorageEngine::rebuild_index] Indexed {} page(s)",
            page_count
        );
        Ok(())
    }

    /// Inserts a new record. Returns `Ok(false)` if the key already exists.
    pub fn insert(&mut self, key: &str, value: &str) -> io::Result<bool> {
        let key = normalized_key(key);
        let key: &str = &key;
        if self.index.search(key) != 0 {
            return Ok(false);
        }

        // Intent first, durably; only then may the data file change.
        self.journal.log(JournalOp::Insert, key, value, 0)?;

        let page_id = self.pager.allocate_page();
        let rec = Record::new(key, value, page_id);
        let page = Rc::new(RefCell::new(Page::new(page_id)));
        page.borrow_mut().write_record(&rec);
        self.pool.put(page_id, page.clone());
        self.flush_page(&page)?;

        self.index.insert(key, page_id);
        self.journal.commit()?;
        Ok(true)
    }

    /// Fetches the value stored under `key`, or `None` if the key is absent
    /// or tombstoned.
    pub fn get(&mut self, key: &str) -> io::Result<Option<String>> {
        let key = normalized_key(key);
        let key: &str = &key;
        let page_id = self.index.search(key);
        if page_id == 0 {
            return Ok(None);
        }

        let page = self.load_page(page_id)?;
        let rec = page.borrow().read_record();
        if rec.deleted {
            return Ok(None);
        }
        Ok(Some(rec.value()))
    }

    /// Overwrites the value of an existing record in place. Returns
    /// `Ok(false)` if the key is absent or tombstoned (no resurrection).
    pub fn update(&mut self, key: &str, new_value: &str) -> io::Result<bool> {
        let key = normalized_key(key);
        let key: &str = &key;
        let page_id = self.index.search(key);
        if page_id == 0 {
            return Ok(false);
        }

        self.journal.log(JournalOp::Update, key, new_value, page_id)?;

        let page = self.load_page(page_id)?;
        let mut rec = page.borrow().read_record();
        if rec.deleted {
            return Ok(false);
        }

        rec.set_value(new_value);
        page.borrow_mut().write_record(&rec);
        self.flush_page(&page)?;

        self.journal.commit()?;
        Ok(true)
    }

    /// Tombstones a record and unlinks it from the index. Returns
    /// `Ok(false)` if the key is absent.
    pub fn remove(&mut self, key: &str) -> io::Result<bool> {
        let key = normalized_key(key);
        let key: &str = &key;
        let page_id = self.index.search(key);
        if page_id == 0 {
            return Ok(false);
        }

        self.journal.log(JournalOp::Delete, key, "", page_id)?;

        let page = self.load_page(page_id)?;
        let mut rec = page.borrow().read_record();
        rec.deleted = true;
        page.borrow_mut().write_record(&rec);
        self.flush_page(&page)?;

        self.index.remove(key);
        self.journal.commit()?;
        Ok(true)
    }

    /// The checkpoint: flush every dirty page, sync the data file, then
    /// truncate the journal. Once this returns, replay would start from an
    /// empty journal.
    pub fn flush_all(&mut self) -> io::Result<()> {
        for page in self.pool.dirty_pages() {
            self.flush_page(&page)?;
        }
        self.pager.sync()?;
        self.journal.truncate()
    }

    /// Diagnostic full-file search bypassing index and cache: reads every
    /// page in order and returns the first live record matching `key`.
    pub fn linear_scan(&mut self, key: &str) -> io::Result<Option<String>> {
        let key = normalized_key(key);
        let key: &str = &key;
        let page_count = self.pager.page_count()?;
        for page_id in 1..=page_count {
            let page = self.pager.read_page(page_id)?;
            let rec = page.read_record();
            if !rec.deleted && rec.key() == key {
                return Ok(Some(rec.value()));
            }
        }
        Ok(None)
    }

    pub fn stats(&self) -> io::Result<EngineStats> {
        Ok(EngineStats {
            file_size: self.pager.file_size()?,
            page_count: self.pager.page_count()?,
            page_size: PAGE_SIZE,
            cache_capacity: self.pool.capacity(),
        })
    }

    /// Writes the stats report to stdout.
    pub fn print_stats(&self) -> io::Result<()> {
        let stats = self.stats()?;
        println!("=== Database Statistics ===");
        println!("File size: {} bytes", stats.file_size);
        println!("Number of pages: {}", stats.page_count);
        println!("Page size: {} bytes", stats.page_size);
        println!("Cache size: {} pages", stats.cache_capacity);
        Ok(())
    }

    /// Index height, for diagnostics and benchmarks.
    pub fn index_height(&self) -> usize {
        self.index.height()
    }

    /// Cache hit path first; on miss the page comes off the disk and joins
    /// the pool.
    fn load_page(&mut self, page_id: PageId) -> io::Result<Rc<RefCell<Page>>> {
        if let Some(page) = self.pool.get(page_id) {
            return Ok(page);
        }
        let page = Rc::new(RefCell::new(self.pager.read_page(page_id)?));
        self.pool.put(page_id, page.clone());
        Ok(page)
    }

    fn flush_page(&mut self, page: &Rc<RefCell<Page>>) -> io::Result<()> {
        let mut page = page.borrow_mut();
        self.pager.write_page(&page)?;
        page.dirty = false;
        Ok(())
    }
}

impl Drop for StorageEngine {
    fn drop(&mut self) {
        // Best-effort checkpoint; files close when the fields drop.
        let _ = self.flush_all();
    }
}
