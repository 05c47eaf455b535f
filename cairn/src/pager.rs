use std::fs::{create_dir_all, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::{failpoint, Page, PageId, PAGE_SIZE};

/// Owns the data file and the page-id allocator.
///
/// Pages are addressed from 1; the byte range `[0, PAGE_SIZE)` is never
/// written, so a file holding pages `1..=n` is `(n + 1) * PAGE_SIZE` bytes.
pub struct Pager {
    file: File,
    next_page_id: PageId,
}

impl Pager {
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let path_ref = path.as_ref();
        crate::cairn_debug_log!("[Pager::open] Opening data file at: {path_ref:?}");
        if let Some(parent) = path_ref.parent() {
            create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path_ref)?;

        let file_size = file.metadata()?.len();
        let next_page_id = (file_size / PAGE_SIZE as u64 + 1).max(1);
        crate::cairn_debug_log!(
            "[Pager::open] File size: {file_size}, next_page_id: {next_page_id}"
        );

        Ok(Self { file, next_page_id })
    }

    /// Reads the page at `page_id`. A page past the end of the file comes
    /// back zeroed, as does the tail of a short read.
    pub fn read_page(&mut self, page_id: PageId) -> io::Result<Page> {
        crate::cairn_debug_log!("[Pager::read_page] Reading page_id: {page_id}");
        let mut page = Page::new(page_id);
        let offset = page_id * PAGE_SIZE as u64;
        if offset >= self.file.metadata()?.len() {
            return Ok(page);
        }

        self.file.seek(SeekFrom::Start(offset))?;
        let mut filled = 0;
        while filled < PAGE_SIZE {
            let n = self.file.read(&mut page.data[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }

        Ok(page)
    }

    /// Writes the page's bytes at its slot. Durability is deferred to
    /// [`Pager::sync`]; the journal is the per-operation durability anchor.
    pub fn write_page(&mut self, page: &Page) -> io::Result<()> {
        crate::cairn_debug_log!("[Pager::write_page] Writing page_id: {}", page.id);
        failpoint::maybe_fail("pager_write")?;
        let offset = page.id * PAGE_SIZE as u64;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(&page.data)?;
        if page.id >= self.next_page_id {
            self.next_page_id = page.id + 1;
        }
        Ok(())
    }

    /// Vends the next page id. Ids are strictly monotone and never reused
    /// within a process lifetime.
    pub fn allocate_page(&mut self) -> PageId {
        let page_id = self.next_page_id;
        self.next_page_id += 1;
        crate::cairn_debug_log!("[Pager::allocate_page] Allocating new page_id: {page_id}");
        page_id
    }

    pub fn sync(&mut self) -> io::Result<()> {
        self.file.sync_data()
    }

    pub fn file_size(&self) -> io::Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    /// Number of page slots covered by the current file size, including the
    /// unused slot 0.
    pub fn page_count(&self) -> io::Result<u64> {
        Ok(self.file_size()? / PAGE_SIZE as u64)
    }
}
