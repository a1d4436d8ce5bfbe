//! Application content for the build container

use crate::buildpack::builder::BuildOwner;
use crate::error::{OsrcError, OsrcResult};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tar::{EntryType, Header};
use zip::ZipArchive;

/// 1980-01-01T00:00:01Z, so identical archives produce identical tars
const NORMALIZED_MTIME: u64 = 315_532_801;

/// Convert the entries of a zip archive into a tar stream owned by `owner`
pub fn archive_to_tar(path: &Path, owner: &BuildOwner) -> OsrcResult<Vec<u8>> {
    let file =
        File::open(path).map_err(|e| OsrcError::io(format!("opening {}", path.display()), e))?;
    let mut archive = ZipArchive::new(BufReader::new(file))
        .map_err(|e| OsrcError::zip(format!("reading {}", path.display()), e))?;

    let mut builder = tar::Builder::new(Vec::new());
    for index in 0..archive.len() {
        let entry = archive
            .by_index(index)
            .map_err(|e| OsrcError::zip(format!("reading {}", path.display()), e))?;
        let name = entry.name().to_string();

        let mut header = Header::new_gnu();
        header.set_uid(owner.uid);
        header.set_gid(owner.gid);
        header.set_mtime(NORMALIZED_MTIME);
        if entry.is_dir() {
            header.set_entry_type(EntryType::Directory);
            header.set_mode(0o755);
            header.set_size(0);
            builder
                .append_data(&mut header, &name, std::io::empty())
                .map_err(|e| OsrcError::io(format!("adding {} to tar", name), e))?;
        } else {
            header.set_entry_type(EntryType::Regular);
            header.set_mode(entry.unix_mode().map(|m| m & 0o7777).unwrap_or(0o644));
            header.set_size(entry.size());
            builder
                .append_data(&mut header, &name, entry)
                .map_err(|e| OsrcError::io(format!("adding {} to tar", name), e))?;
        }
    }

    builder
        .into_inner()
        .map_err(|e| OsrcError::io(format!("finishing tar for {}", path.display()), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use tempfile::TempDir;
    use zip::write::FileOptions;
    use zip::ZipWriter;

    #[test]
    fn zip_entries_become_owned_tar_entries() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("app.jar");
        let mut writer = ZipWriter::new(File::create(&path).unwrap());
        writer.add_directory("BOOT-INF/", FileOptions::default()).unwrap();
        writer
            .start_file("BOOT-INF/classes/a.txt", FileOptions::default())
            .unwrap();
        writer.write_all(b"hello").unwrap();
        writer.finish().unwrap();

        let tar = archive_to_tar(&path, &BuildOwner::of(1000, 1001)).unwrap();
        let mut archive = tar::Archive::new(tar.as_slice());
        let mut seen = Vec::new();
        for entry in archive.entries().unwrap() {
            let mut entry = entry.unwrap();
            let header = entry.header();
            assert_eq!(header.uid().unwrap(), 1000);
            assert_eq!(header.gid().unwrap(), 1001);
            assert_eq!(header.mtime().unwrap(), NORMALIZED_MTIME);
            let name = entry
                .path()
                .unwrap()
                .display()
                .to_string()
                .trim_end_matches('/')
                .to_string();
            let mut content = String::new();
            entry.read_to_string(&mut content).unwrap();
            seen.push((name, content));
        }
        assert_eq!(
            seen,
            vec![
                ("BOOT-INF".to_string(), String::new()),
                ("BOOT-INF/classes/a.txt".to_string(), "hello".to_string())
            ]
        );
    }
}
