//! The write-ahead journal.
//!
//! Every mutation appends an intent entry here, durably, before the data
//! file is touched, and a COMMIT entry after the page write lands. The
//! journal is truncated at checkpoint; it is recorded but not replayed at
//! open (recovery is a future routine working from [`JournalManager::entries`]).

use crc32fast::Hasher;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use bytes::{Buf, BufMut};

use crate::page::{copy_truncated, read_cstr};
use crate::{failpoint, PageId, KEY_MAX, VALUE_MAX};

/// Serialized size of one journal entry: kind, key, value, checksum, page id.
pub const ENTRY_SIZE: usize = 4 + KEY_MAX + VALUE_MAX + 4 + 8;

/// Byte range the entry checksum covers (everything but the checksum itself).
const CRC_OFFSET: usize = 4 + KEY_MAX + VALUE_MAX;

/// The kind of operation a journal entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum JournalOp {
    Insert = 1,
    Update = 2,
    Delete = 3,
    /// Marks the preceding intent entry as fully applied.
    Commit = 4,
}

impl JournalOp {
    pub const fn as_u32(self) -> u32 {
        self as u32
    }

    pub fn from_u32(value: u32) -> io::Result<Self> {
        match value {
            1 => Ok(Self::Insert),
            2 => Ok(Self::Update),
            3 => Ok(Self::Delete),
            4 => Ok(Self::Commit),
            other => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unknown journal op: {other}"),
            )),
        }
    }
}

/// A single fixed-size entry. Unused fields are zero-padded; key and value
/// follow the same NUL-terminated convention as [`crate::Record`].
#[derive(Clone, Debug)]
pub struct JournalEntry {
    pub op: JournalOp,
    pub key: [u8; KEY_MAX],
    pub value: [u8; VALUE_MAX],
    pub page_id: PageId,
}

impl JournalEntry {
    pub fn new(op: JournalOp, key: &str, value: &str, page_id: PageId) -> Self {
        let mut entry = JournalEntry {
            op,
            key: [0; KEY_MAX],
            value: [0; VALUE_MAX],
            page_id,
        };
        copy_truncated(&mut entry.key, key);
        copy_truncated(&mut entry.value, value);
        entry
    }

    pub fn key(&self) -> String {
        read_cstr(&self.key)
    }

    pub fn value(&self) -> String {
        read_cstr(&self.value)
    }

    pub fn to_bytes(&self) -> [u8; ENTRY_SIZE] {
        let mut buf = [0u8; ENTRY_SIZE];
        let mut cursor = &mut buf[..];
        cursor.put_u32_ne(self.op.as_u32());
        cursor.put_slice(&self.key);
        cursor.put_slice(&self.value);
        cursor.put_u32_ne(0); // checksum patched below
        cursor.put_u64_ne(self.page_id);

        let crc = entry_crc(&buf);
        buf[CRC_OFFSET..CRC_OFFSET + 4].copy_from_slice(&crc.to_ne_bytes());
        buf
    }

    pub fn from_bytes(buf: &[u8; ENTRY_SIZE]) -> io::Result<Self> {
        let stored = u32::from_ne_bytes(buf[CRC_OFFSET..CRC_OFFSET + 4].try_into().unwrap());
        if stored != entry_crc(buf) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "journal entry CRC mismatch",
            ));
        }

        let mut cursor = &buf[..];
        let op = JournalOp::from_u32(cursor.get_u32_ne())?;
        let mut key = [0u8; KEY_MAX];
        cursor.copy_to_slice(&mut key);
        let mut value = [0u8; VALUE_MAX];
        cursor.copy_to_slice(&mut value);
        cursor.advance(4);
        let page_id = cursor.get_u64_ne();
        Ok(JournalEntry {
            op,
            key,
            value,
            page_id,
        })
    }
}

fn entry_crc(buf: &[u8; ENTRY_SIZE]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(&buf[..CRC_OFFSET]);
    hasher.update(&buf[CRC_OFFSET + 4..]);
    hasher.finalize()
}

/// The journal manager.
pub struct JournalManager {
    file: File,
    path: PathBuf,
}

impl JournalManager {
    /// Opens (creating if missing) the journal file.
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let path_buf = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path_buf)?;
        Ok(Self {
            file,
            path: path_buf,
        })
    }

    /// Appends one entry and flushes it to disk before returning.
    ///
    /// An error here is fatal to the enclosing operation: the caller must
    /// not proceed to the page write without the intent on disk.
    pub fn log(&mut self, op: JournalOp, key: &str, value: &str, page_id: PageId) -> io::Result<()> {
        failpoint::maybe_fail("journal_append")?;
        let entry = JournalEntry::new(op, key, value, page_id);
        self.file.seek(SeekFrom::End(0))?;
        self.file.write_all(&entry.to_bytes())?;
        self.file.sync_data()
    }

    /// Appends the COMMIT marker for the current operation.
    pub fn commit(&mut self) -> io::Result<()> {
        self.log(JournalOp::Commit, "", "", 0)
    }

    /// Wipes the journal: removes the file and recreates it empty. Only
    /// called once every dirty page has reached the data file.
    pub fn truncate(&mut self) -> io::Result<()> {
        let _ = std::fs::remove_file(&self.path);
        self.file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.path)?;
        Ok(())
    }

    /// Reads back every entry, verifying checksums.
    pub fn entries(&mut self) -> io::Result<Vec<JournalEntry>> {
        self.file.seek(SeekFrom::Start(0))?;
        let mut raw = Vec::new();
        self.file.read_to_end(&mut raw)?;

        if raw.len() % ENTRY_SIZE != 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "journal length is not a whole number of entries",
            ));
        }

        let mut entries = Vec::with_capacity(raw.len() / ENTRY_SIZE);
        for chunk in raw.chunks_exact(ENTRY_SIZE) {
            let buf: &[u8; ENTRY_SIZE] = chunk.try_into().unwrap();
            entries.push(JournalEntry::from_bytes(buf)?);
        }
        Ok(entries)
    }

    pub fn len(&self) -> io::Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    pub fn is_empty(&self) -> io::Result<bool> {
        Ok(self.len()? == 0)
    }
}
