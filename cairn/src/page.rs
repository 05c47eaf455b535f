use bytes::{Buf, BufMut};

use crate::{PageId, KEY_MAX, PAGE_SIZE, VALUE_MAX};

/// Serialized record size: key, value, page id, deleted byte.
/// The rest of the page is zero padding.
pub const RECORD_SIZE: usize = KEY_MAX + VALUE_MAX + 8 + 1;

/// The single key-value tuple stored in a page.
///
/// Key and value are fixed-size NUL-terminated buffers; the last byte of
/// each is reserved for the terminator, so oversize input is truncated at
/// `KEY_MAX - 1` / `VALUE_MAX - 1` bytes.
#[derive(Clone)]
pub struct Record {
    pub key: [u8; KEY_MAX],
    pub value: [u8; VALUE_MAX],
    /// The record's own home page.
    pub page_id: PageId,
    /// Soft-delete tombstone.
    pub deleted: bool,
}

impl Record {
    pub fn new(key: &str, value: &str, page_id: PageId) -> Self {
        let mut rec = Record {
            key: [0; KEY_MAX],
            value: [0; VALUE_MAX],
            page_id,
            deleted: false,
        };
        copy_truncated(&mut rec.key, key);
        copy_truncated(&mut rec.value, value);
        rec
    }

    pub fn key(&self) -> String {
        read_cstr(&self.key)
    }

    pub fn value(&self) -> String {
        read_cstr(&self.value)
    }

    /// Overwrites the value in place, truncating oversize input.
    pub fn set_value(&mut self, value: &str) {
        self.value = [0; VALUE_MAX];
        copy_truncated(&mut self.value, value);
    }
}

/// Copies at most `dst.len() - 1` bytes of `src`, leaving the terminator.
pub(crate) fn copy_truncated(dst: &mut [u8], src: &str) {
    let n = src.len().min(dst.len() - 1);
    dst[..n].copy_from_slice(&src.as_bytes()[..n]);
}

/// Reads a NUL-terminated buffer back into a `String`.
/// Embedded NULs in the original input are not supported.
pub(crate) fn read_cstr(buf: &[u8]) -> String {
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    String::from_utf8_lossy(&buf[..end]).into_owned()
}

/// A fixed `PAGE_SIZE` region of the data file holding at most one record.
#[derive(Debug, Clone)]
pub struct Page {
    pub id: PageId,
    pub data: [u8; PAGE_SIZE],
    /// In-memory only: the page differs from its on-disk copy.
    pub dirty: bool,
}

impl Page {
    pub fn new(id: PageId) -> Self {
        Page {
            id,
            data: [0; PAGE_SIZE],
            dirty: false,
        }
    }

    /// Serializes `rec` into the page buffer and marks the page dirty.
    ///
    /// Host byte order: key at 0, value at `KEY_MAX`, page id and deleted
    /// byte after; everything past `RECORD_SIZE` stays zero.
    pub fn write_record(&mut self, rec: &Record) {
        let mut cursor = &mut self.data[..];
        cursor.put_slice(&rec.key);
        cursor.put_slice(&rec.value);
        cursor.put_u64_ne(rec.page_id);
        cursor.put_u8(rec.deleted as u8);
        self.dirty = true;
    }

    /// Deserializes the record stored in this page.
    pub fn read_record(&self) -> Record {
        let mut buf = &self.data[..];
        let mut key = [0u8; KEY_MAX];
        buf.copy_to_slice(&mut key);
        let mut value = [0u8; VALUE_MAX];
        buf.copy_to_slice(&mut value);
        let page_id = buf.get_u64_ne();
        let deleted = buf.get_u8() != 0;
        Record {
            key,
            value,
            page_id,
            deleted,
        }
    }
}
