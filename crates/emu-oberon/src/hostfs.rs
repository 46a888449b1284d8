//! HostFS: a host directory served to the guest as a sector-addressable
//! filesystem.
//!
//! The guest's filesystem layer addresses files by "sector number". The
//! bridge hands out ids of `SECTOR_MAGIC + slot` from an append-only table
//! of (short name, host path) pairs; the guest never sees a host path.
//! Every slot whose index is a multiple of 29 is left empty, so ids are
//! deliberately non-contiguous — guest code depends on that numbering.
//!
//! Rename, delete and create never destroy data directly: displaced files
//! move to uniquely-named `~OvW~`/`~Del~`/`~New~` stash entries inside the
//! served directory (which the enumerator hides, along with dotfiles).
//! Host I/O errors are silent; the guest observes sector 0 or unchanged
//! command-block fields and applies its own retry policy.

use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Datelike, Local, Timelike};

use crate::device::HostFs;

/// Base of the guest-visible sector id space.
pub const SECTOR_MAGIC: u32 = 290_000_000;

/// Table capacity; ids beyond this are never allocated.
const MAX_FILES: usize = 4096;

/// Longest enumeration prefix the guest can set.
const PREFIX_LEN: usize = 32;

struct Entry {
    /// Guest-visible short name.
    name: String,
    /// Host path backing the sector id.
    path: PathBuf,
}

pub struct HostDir {
    dir: PathBuf,
    /// Slot table; index + `SECTOR_MAGIC` is the guest's sector id.
    /// `None` marks the deliberate gaps.
    entries: Vec<Option<Entry>>,
    /// Enumeration cursor, live between Enumerate-Start and the final
    /// Enumerate-Next.
    cursor: Option<fs::ReadDir>,
    prefix: String,
}

impl HostDir {
    /// Serve `dir`. Fails if the directory cannot be enumerated.
    pub fn open(dir: &Path) -> std::io::Result<Self> {
        fs::read_dir(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            entries: Vec::new(),
            cursor: None,
            prefix: String::new(),
        })
    }

    /// Look a short name up, registering it on first sight if the file
    /// exists on disk. Returns the sector id, or 0.
    fn search_file(&mut self, filename: &str) -> u32 {
        for (i, entry) in self.entries.iter().enumerate() {
            if let Some(entry) = entry {
                if entry.name == filename {
                    return SECTOR_MAGIC + i as u32;
                }
            }
        }
        if self.entries.len() < MAX_FILES - 1 {
            let full = self.dir.join(filename);
            if full.exists() {
                if self.entries.len() % 29 == 0 {
                    // Keep the id gap.
                    self.entries.push(None);
                }
                self.entries.push(Some(Entry {
                    name: filename.to_string(),
                    path: full,
                }));
                return SECTOR_MAGIC + self.entries.len() as u32 - 1;
            }
        }
        0
    }

    /// Create a uniquely named, empty stash file in the served directory.
    fn make_stash(&self, prefix: &str) -> Option<PathBuf> {
        let file = tempfile::Builder::new()
            .prefix(prefix)
            .rand_bytes(6)
            .tempfile_in(&self.dir)
            .ok()?;
        file.into_temp_path().keep().ok()
    }

    fn enumerate_next(&mut self, offset: usize, ram: &mut [u32]) {
        let found = loop {
            let Some(cursor) = &mut self.cursor else {
                break None;
            };
            match cursor.next() {
                None | Some(Err(_)) => break None,
                Some(Ok(entry)) => {
                    let name = entry.file_name().to_string_lossy().into_owned();
                    if name.starts_with(&self.prefix)
                        && !name.starts_with('~')
                        && !name.starts_with('.')
                    {
                        break Some(name);
                    }
                }
            }
        };
        match found {
            None => put(ram, offset + 1, 0),
            Some(name) => {
                let sector = self.search_file(&name);
                put(ram, offset + 1, sector);
                write_cstr(ram, offset + 2, &name);
            }
        }
    }

    fn stat(&mut self, offset: usize, ram: &mut [u32]) {
        let sector = word(ram, offset + 1).wrapping_sub(SECTOR_MAGIC) as usize;
        let Some(Some(entry)) = self.entries.get(sector) else {
            return;
        };
        let Ok(meta) = fs::metadata(&entry.path) else {
            return;
        };
        let Ok(mtime) = meta.modified() else {
            return;
        };
        let stamp: DateTime<Local> = mtime.into();
        let packed = stamp.second()
            + stamp.minute() * 0x40
            + stamp.hour() * 0x1000
            + stamp.day() * 0x2_0000
            + stamp.month0() * 0x40_0000
            + (stamp.year() as u32 % 100) * 0x400_0000;
        put(ram, offset + 2, packed);
        put(ram, offset + 3, meta.len() as u32);
    }

    /// Give the placeholder file behind `sector` its real name, displacing
    /// any file already carrying it into an `~OvW~` stash.
    fn insert(&mut self, offset: usize, ram: &mut [u32]) {
        let filename = read_cstr(ram, offset + 2);
        let sector = word(ram, offset + 1).wrapping_sub(SECTOR_MAGIC) as usize;
        let old_path = match self.entries.get(sector) {
            Some(Some(entry)) if entry.name.starts_with('~') => entry.path.clone(),
            _ => return,
        };
        let new_full = self.dir.join(&filename);

        if new_full.exists() {
            let pos = self.entries.iter().position(|entry| {
                entry.as_ref().is_some_and(|entry| entry.name == filename)
            });
            match pos {
                None => {
                    // Name exists on disk but was never handed to the
                    // guest: plain overwrite.
                    let _ = fs::remove_file(&new_full);
                }
                Some(pos) => {
                    if let Some(stash) = self.make_stash("~OvW~") {
                        let _ = fs::rename(&new_full, &stash);
                        self.entries[pos] = Some(Entry {
                            name: "~OvW".to_string(),
                            path: stash,
                        });
                    }
                }
            }
        }

        let _ = fs::rename(&old_path, &new_full);
        self.entries[sector] = Some(Entry {
            name: filename,
            path: new_full,
        });
    }

    fn delete(&mut self, offset: usize, ram: &mut [u32]) {
        let filename = read_cstr(ram, offset + 2);
        let sector = self.search_file(&filename);
        put(ram, offset + 1, sector);
        if sector == 0 {
            return;
        }
        let idx = (sector - SECTOR_MAGIC) as usize;
        if let Some(stash) = self.make_stash(&format!("~Del~{filename}_")) {
            if let Some(Some(entry)) = self.entries.get(idx) {
                let _ = fs::rename(&entry.path, &stash);
            }
            self.entries[idx] = Some(Entry {
                name: "~Del".to_string(),
                path: stash,
            });
        }
    }

    fn create(&mut self, offset: usize, ram: &mut [u32]) {
        let name = read_cstr(ram, offset + 2);
        if let Some(stash) = self.make_stash(&format!("~New~{name}_")) {
            let short = stash
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            let sector = self.search_file(&short);
            put(ram, offset + 1, sector);
        }
    }

    fn read_buf(&mut self, offset: usize, ram: &mut [u32]) {
        let sector = word(ram, offset + 1).wrapping_sub(SECTOR_MAGIC) as usize;
        let file_offset = word(ram, offset + 2);
        let len = word(ram, offset + 3) as usize;
        let dest = (word(ram, offset + 4) / 4) as usize;

        let Some(Some(entry)) = self.entries.get(sector) else {
            return;
        };
        let Ok(mut file) = File::open(&entry.path) else {
            return;
        };
        if file.seek(SeekFrom::Start(u64::from(file_offset))).is_err() {
            return;
        }
        // Never read more than fits between dest and the end of RAM.
        let room = ram.len().saturating_sub(dest) * 4;
        let mut data = vec![0u8; len.min(room)];
        let mut filled = 0;
        while filled < data.len() {
            match file.read(&mut data[filled..]) {
                Ok(0) | Err(_) => break,
                Ok(n) => filled += n,
            }
        }
        for (i, &byte) in data[..filled].iter().enumerate() {
            let shift = (i % 4 * 8) as u32;
            if let Some(slot) = ram.get_mut(dest + i / 4) {
                *slot = (*slot & !(0xFF << shift)) | (u32::from(byte) << shift);
            }
        }
    }

    fn write_buf(&mut self, offset: usize, ram: &mut [u32]) {
        let sector = word(ram, offset + 1).wrapping_sub(SECTOR_MAGIC) as usize;
        let file_offset = word(ram, offset + 2);
        let len = word(ram, offset + 3) as usize;
        let src = (word(ram, offset + 4) / 4) as usize;

        let Some(Some(entry)) = self.entries.get(sector) else {
            return;
        };
        let Ok(mut file) = File::options().read(true).write(true).open(&entry.path) else {
            return;
        };
        if file.seek(SeekFrom::Start(u64::from(file_offset))).is_err() {
            return;
        }
        let room = ram.len().saturating_sub(src) * 4;
        let len = len.min(room);
        let mut data = Vec::with_capacity(len);
        for i in 0..len {
            let byte = (ram[src + i / 4] >> (i % 4 * 8)) as u8;
            data.push(byte);
        }
        let _ = file.write_all(&data);
    }
}

impl HostFs for HostDir {
    fn write(&mut self, cmd_addr: u32, ram: &mut [u32]) {
        let offset = (cmd_addr / 4) as usize;
        let Some(&op) = ram.get(offset) else {
            return;
        };
        match op {
            0 => {
                // Search by name.
                let name = read_cstr(ram, offset + 2);
                let sector = self.search_file(&name);
                put(ram, offset + 1, sector);
            }
            1 => {
                // Enumerate start: latch the prefix, rewind, fall through.
                let mut prefix = read_cstr(ram, offset + 2);
                prefix.truncate(PREFIX_LEN);
                self.prefix = prefix;
                self.cursor = fs::read_dir(&self.dir).ok();
                self.enumerate_next(offset, ram);
            }
            2 => self.enumerate_next(offset, ram),
            3 => self.stat(offset, ram),
            4 => self.insert(offset, ram),
            5 => self.delete(offset, ram),
            6 => self.create(offset, ram),
            7 => self.read_buf(offset, ram),
            8 => self.write_buf(offset, ram),
            _ => {}
        }
    }
}

fn word(ram: &[u32], idx: usize) -> u32 {
    ram.get(idx).copied().unwrap_or(0)
}

fn put(ram: &mut [u32], idx: usize, value: u32) {
    if let Some(slot) = ram.get_mut(idx) {
        *slot = value;
    }
}

/// Read a NUL-terminated guest string (little-endian bytes within words).
/// Non-ASCII bytes degrade to `?`; length is capped at 255.
fn read_cstr(ram: &[u32], word_idx: usize) -> String {
    let mut out = String::new();
    'words: for slot in ram.iter().skip(word_idx) {
        for byte_idx in 0..4 {
            let byte = (slot >> (byte_idx * 8)) as u8;
            if byte == 0 || out.len() >= 255 {
                break 'words;
            }
            out.push(if byte.is_ascii() { byte as char } else { '?' });
        }
    }
    out
}

/// Write a NUL-terminated guest string, bounds-checked per byte.
fn write_cstr(ram: &mut [u32], word_idx: usize, s: &str) {
    for (i, byte) in s.bytes().chain(std::iter::once(0)).enumerate() {
        let shift = (i % 4 * 8) as u32;
        if let Some(slot) = ram.get_mut(word_idx + i / 4) {
            *slot = (*slot & !(0xFF << shift)) | (u32::from(byte) << shift);
        }
    }
}
