//! Append-only archive writer
//!
//! Wraps `zip::ZipWriter`, creating parent directory entries on demand and
//! dropping duplicate names. In reproducible mode every entry carries the
//! same fixed timestamp.

use crate::error::{OsrcError, OsrcResult};
use chrono::{Datelike, Local, Timelike};
use std::collections::HashSet;
use std::io::{self, Read, Seek, Write};
use tracing::debug;
use zip::write::FileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

pub struct ArchiveWriter<W: Write + Seek> {
    zip: ZipWriter<W>,
    written: HashSet<String>,
    timestamp: DateTime,
}

impl<W: Write + Seek> ArchiveWriter<W> {
    pub fn new(inner: W, reproducible: bool) -> Self {
        let timestamp = if reproducible {
            reproducible_timestamp()
        } else {
            current_timestamp()
        };
        Self {
            zip: ZipWriter::new(inner),
            written: HashSet::new(),
            timestamp,
        }
    }

    /// Whether an entry with this name was already written
    pub fn contains(&self, name: &str) -> bool {
        self.written.contains(name)
    }

    /// Write a file entry from memory. Returns `false` for a duplicate name.
    pub fn write_bytes(&mut self, name: &str, content: &[u8]) -> OsrcResult<bool> {
        self.write_reader(name, &mut io::Cursor::new(content), false)
    }

    /// Stream a file entry. Nested archives are `stored` uncompressed.
    pub fn write_reader(
        &mut self,
        name: &str,
        content: &mut impl Read,
        stored: bool,
    ) -> OsrcResult<bool> {
        if self.written.contains(name) {
            debug!("Skipping duplicate entry {}", name);
            return Ok(false);
        }
        self.write_parent_directories(name)?;

        let method = if stored {
            CompressionMethod::Stored
        } else {
            CompressionMethod::Deflated
        };
        let options = FileOptions::default()
            .compression_method(method)
            .last_modified_time(self.timestamp)
            .unix_permissions(0o644);
        self.zip
            .start_file(name, options)
            .map_err(|e| OsrcError::zip(format!("starting entry {}", name), e))?;
        io::copy(content, &mut self.zip)
            .map_err(|e| OsrcError::io(format!("writing entry {}", name), e))?;
        self.written.insert(name.to_string());
        Ok(true)
    }

    /// Write a directory entry (name ends in `/`) and its parents
    pub fn write_directory(&mut self, name: &str) -> OsrcResult<()> {
        self.write_parent_directories(name)?;
        if self.written.contains(name) {
            return Ok(());
        }
        let options = FileOptions::default()
            .last_modified_time(self.timestamp)
            .unix_permissions(0o755);
        self.zip
            .add_directory(name, options)
            .map_err(|e| OsrcError::zip(format!("adding directory {}", name), e))?;
        self.written.insert(name.to_string());
        Ok(())
    }

    fn write_parent_directories(&mut self, name: &str) -> OsrcResult<()> {
        let trimmed = name.trim_end_matches('/');
        let mut parents = Vec::new();
        for (index, c) in trimmed.char_indices() {
            if c == '/' {
                parents.push(trimmed[..=index].to_string());
            }
        }
        for parent in parents {
            if !self.written.contains(&parent) {
                let options = FileOptions::default()
                    .last_modified_time(self.timestamp)
                    .unix_permissions(0o755);
                self.zip
                    .add_directory(parent.as_str(), options)
                    .map_err(|e| OsrcError::zip(format!("adding directory {}", parent), e))?;
                self.written.insert(parent);
            }
        }
        Ok(())
    }

    pub fn finish(mut self) -> OsrcResult<W> {
        self.zip
            .finish()
            .map_err(|e| OsrcError::zip("finishing archive", e))
    }
}

fn reproducible_timestamp() -> DateTime {
    DateTime::from_date_and_time(1980, 2, 1, 0, 0, 0).unwrap_or_default()
}

fn current_timestamp() -> DateTime {
    let now = Local::now();
    DateTime::from_date_and_time(
        now.year().clamp(1980, 2107) as u16,
        now.month() as u8,
        now.day() as u8,
        now.hour() as u8,
        now.minute() as u8,
        now.second() as u8,
    )
    .unwrap_or_else(|_| reproducible_timestamp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use zip::ZipArchive;

    fn names(bytes: Vec<u8>) -> Vec<String> {
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect()
    }

    #[test]
    fn parents_are_written_once() {
        let mut writer = ArchiveWriter::new(Cursor::new(Vec::new()), true);
        writer.write_bytes("a/b/one.txt", b"1").unwrap();
        writer.write_bytes("a/b/two.txt", b"2").unwrap();
        writer.write_directory("a/c/").unwrap();
        let bytes = writer.finish().unwrap().into_inner();
        assert_eq!(
            names(bytes),
            vec!["a/", "a/b/", "a/b/one.txt", "a/b/two.txt", "a/c/"]
        );
    }

    #[test]
    fn duplicates_are_dropped() {
        let mut writer = ArchiveWriter::new(Cursor::new(Vec::new()), true);
        assert!(writer.write_bytes("x.txt", b"first").unwrap());
        assert!(!writer.write_bytes("x.txt", b"second").unwrap());
        assert!(writer.contains("x.txt"));
        let bytes = writer.finish().unwrap().into_inner();
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut content = String::new();
        archive.by_name("x.txt").unwrap().read_to_string(&mut content).unwrap();
        assert_eq!(content, "first");
    }

    #[test]
    fn reproducible_output_is_byte_identical() {
        let build = || {
            let mut writer = ArchiveWriter::new(Cursor::new(Vec::new()), true);
            writer.write_bytes("META-INF/MANIFEST.MF", b"Manifest-Version: 1.0\r\n\r\n").unwrap();
            writer
                .write_reader("BOOT-INF/lib/a.jar", &mut Cursor::new(b"PK\x03\x04".to_vec()), true)
                .unwrap();
            writer.finish().unwrap().into_inner()
        };
        assert_eq!(build(), build());
    }

    #[test]
    fn nested_archives_are_stored() {
        let mut writer = ArchiveWriter::new(Cursor::new(Vec::new()), true);
        writer
            .write_reader("lib/a.jar", &mut Cursor::new(vec![0u8; 64]), true)
            .unwrap();
        let bytes = writer.finish().unwrap().into_inner();
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        let entry = archive.by_name("lib/a.jar").unwrap();
        assert_eq!(entry.compression(), CompressionMethod::Stored);
    }
}
