//! Archive extraction and JVM process launch

use crate::error::{OsrcError, OsrcResult};
use crate::launch::classpath::{resolve_classpath, ClasspathIndex, ClasspathLayout};
use crate::launch::entry::{select_entry, EntrySelection};
use crate::library::sha1_file;
use crate::package::manifest::{Manifest, BOOT_CLASSPATH_INDEX, UNPACK_SHA1};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info};
use zip::ZipArchive;

const COMPLETE_MARKER: &str = ".osrc-extracted";

/// Everything needed to start the archive's entry point
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchPlan {
    pub java: String,
    pub extract_root: PathBuf,
    pub classpath: Vec<PathBuf>,
    pub selection: EntrySelection,
    /// Nested entries with the SHA-1 they must have once extracted
    pub digests: Vec<(String, String)>,
}

impl LaunchPlan {
    /// `java -cp <classpath> <main> <args...>`
    pub fn command_line(&self) -> Vec<String> {
        let separator = if cfg!(windows) { ";" } else { ":" };
        let classpath = self
            .classpath
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(separator);
        let mut line = vec![
            self.java.clone(),
            "-cp".to_string(),
            classpath,
            self.selection.main_class.clone(),
        ];
        line.extend(self.selection.args.iter().cloned());
        line
    }
}

/// Starts packaged archives
#[derive(Debug, Clone)]
pub struct Launcher {
    archive: PathBuf,
    java: String,
    extract_dir: PathBuf,
}

impl Launcher {
    pub fn new(archive: impl Into<PathBuf>, java: impl Into<String>, extract_dir: impl Into<PathBuf>) -> Self {
        Self {
            archive: archive.into(),
            java: java.into(),
            extract_dir: extract_dir.into(),
        }
    }

    /// Read the archive metadata and resolve entry point and classpath
    pub fn prepare(&self, args: &[String]) -> OsrcResult<LaunchPlan> {
        let mut archive = open(&self.archive)?;
        let manifest = Manifest::read_from(&mut archive)?;
        let archive_name = self.archive.display().to_string();
        let selection = select_entry(&archive_name, manifest.as_ref(), args)?;
        let manifest = manifest.ok_or_else(|| OsrcError::ManifestMissing(self.archive.clone()))?;

        let layout = ClasspathLayout::from_manifest(&manifest)?;
        let index = match manifest.get(BOOT_CLASSPATH_INDEX) {
            Some(location) => read_entry(&mut archive, location)?
                .map(|content| ClasspathIndex::parse(&content))
                .transpose()?,
            None => None,
        };
        let names: Vec<String> = (0..archive.len())
            .map(|i| {
                archive
                    .by_index_raw(i)
                    .map(|e| e.name().to_string())
                    .map_err(|e| OsrcError::zip(format!("reading entry {}", i), e))
            })
            .collect::<OsrcResult<_>>()?;
        let entries = resolve_classpath(names.iter().map(String::as_str), &layout, index.as_ref());

        let extract_root = self.extract_dir.join(archive_digest(&self.archive)?);
        let classpath = entries
            .iter()
            .map(|entry| extract_root.join(entry.trim_end_matches('/')))
            .collect();
        let digests = manifest
            .sections()
            .filter_map(|(name, _)| {
                manifest
                    .section_attribute(name, UNPACK_SHA1)
                    .map(|sha1| (name.to_string(), sha1.to_string()))
            })
            .collect();

        debug!("Resolved {} classpath entries", entries.len());
        Ok(LaunchPlan {
            java: self.java.clone(),
            extract_root,
            classpath,
            selection,
            digests,
        })
    }

    /// Extract the archive once per content digest and verify unpacked libraries
    pub fn extract(&self, plan: &LaunchPlan) -> OsrcResult<()> {
        let root = &plan.extract_root;
        if root.join(COMPLETE_MARKER).exists() {
            debug!("Reusing extracted archive at {}", root.display());
        } else {
            extract_all(&self.archive, root)?;
            fs::write(root.join(COMPLETE_MARKER), b"")
                .map_err(|e| OsrcError::io(format!("marking {}", root.display()), e))?;
            info!("Extracted {} to {}", self.archive.display(), root.display());
        }

        for (name, expected) in &plan.digests {
            let actual = sha1_file(&root.join(name))?;
            if !actual.eq_ignore_ascii_case(expected) {
                return Err(OsrcError::DigestMismatch {
                    name: name.clone(),
                    expected: expected.clone(),
                    actual,
                });
            }
        }
        Ok(())
    }

    /// Run the plan and return the process exit code
    pub async fn run(&self, plan: &LaunchPlan) -> OsrcResult<i32> {
        self.extract(plan)?;
        let line = plan.command_line();
        info!("Starting {}", plan.selection.main_class);
        let status = Command::new(&line[0])
            .args(&line[1..])
            .status()
            .await
            .map_err(|e| OsrcError::command_failed(&plan.java, e))?;
        Ok(status.code().unwrap_or(1))
    }
}

fn open(path: &Path) -> OsrcResult<ZipArchive<BufReader<File>>> {
    let file =
        File::open(path).map_err(|e| OsrcError::io(format!("opening {}", path.display()), e))?;
    ZipArchive::new(BufReader::new(file))
        .map_err(|e| OsrcError::zip(format!("reading {}", path.display()), e))
}

fn read_entry(
    archive: &mut ZipArchive<BufReader<File>>,
    name: &str,
) -> OsrcResult<Option<String>> {
    let mut entry = match archive.by_name(name) {
        Ok(entry) => entry,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(OsrcError::zip(format!("reading {}", name), e)),
    };
    let mut content = String::new();
    entry
        .read_to_string(&mut content)
        .map_err(|e| OsrcError::io(format!("reading {}", name), e))?;
    Ok(Some(content))
}

/// First 12 hex chars of the archive's SHA-256
pub fn archive_digest(path: &Path) -> OsrcResult<String> {
    let mut file =
        File::open(path).map_err(|e| OsrcError::io(format!("opening {}", path.display()), e))?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)
        .map_err(|e| OsrcError::io(format!("hashing {}", path.display()), e))?;
    let digest = hex::encode(hasher.finalize());
    Ok(digest[..12].to_string())
}

/// Extract every entry under `root`, rejecting paths that escape it
pub fn extract_all(archive_path: &Path, root: &Path) -> OsrcResult<()> {
    let mut archive = open(archive_path)?;
    fs::create_dir_all(root)
        .map_err(|e| OsrcError::io(format!("creating {}", root.display()), e))?;
    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|e| OsrcError::zip(format!("reading {}", archive_path.display()), e))?;
        let Some(relative) = entry.enclosed_name().map(Path::to_path_buf) else {
            return Err(OsrcError::User(format!(
                "Archive entry {} escapes the extraction directory",
                entry.name()
            )));
        };
        let target = root.join(relative);
        if entry.is_dir() {
            fs::create_dir_all(&target)
                .map_err(|e| OsrcError::io(format!("creating {}", target.display()), e))?;
            continue;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| OsrcError::io(format!("creating {}", parent.display()), e))?;
        }
        let mut out = File::create(&target)
            .map_err(|e| OsrcError::io(format!("creating {}", target.display()), e))?;
        io::copy(&mut entry, &mut out)
            .map_err(|e| OsrcError::io(format!("extracting {}", target.display()), e))?;
    }
    Ok(())
}
