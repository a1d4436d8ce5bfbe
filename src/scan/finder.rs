//! Main class discovery in directories and archives

use crate::error::{OsrcError, OsrcResult};
use crate::scan::classfile;
use std::collections::BTreeSet;
use std::fs;
use std::io::{Read, Seek};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};
use zip::ZipArchive;

const CLASS_FILE_EXTENSION: &str = ".class";

/// Upper bound on buffer space reserved from a declared entry size
const MAX_PREALLOCATION: u64 = 1 << 20;

/// Scan duration after which the timeout listener is notified
pub const DEFAULT_WARNING_THRESHOLD: Duration = Duration::from_secs(10);

/// A class declaring a runnable `main` method
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MainClass {
    pub name: String,
    /// Annotation type names present on the class
    pub annotation_names: BTreeSet<String>,
}

impl MainClass {
    pub fn has_any(&self, markers: &[String]) -> bool {
        markers.iter().any(|m| self.annotation_names.contains(m))
    }
}

/// Notified when a main class search runs past its warning threshold
pub trait MainClassTimeoutWarningListener: Send + Sync {
    fn handle_timeout_warning(&self, duration: Duration, main_class: Option<&str>);
}

/// Reports slow searches through the log
#[derive(Debug, Default)]
pub struct LoggingTimeoutWarningListener;

impl MainClassTimeoutWarningListener for LoggingTimeoutWarningListener {
    fn handle_timeout_warning(&self, duration: Duration, main_class: Option<&str>) {
        warn!(
            elapsed_ms = duration.as_millis() as u64,
            found = main_class.unwrap_or("none"),
            "Searching for the main-class is taking some time, consider using the mainClass configuration parameter"
        );
    }
}

/// Finds classes with a `public static void main(String[])` method.
///
/// Candidates come back breadth-first: shallower classes before deeper
/// ones, name order within a depth.
pub struct MainClassFinder {
    threshold: Duration,
    listeners: Vec<Box<dyn MainClassTimeoutWarningListener>>,
}

impl Default for MainClassFinder {
    fn default() -> Self {
        Self::new()
    }
}

impl MainClassFinder {
    /// Finder with the logging listener and the default threshold
    pub fn new() -> Self {
        Self {
            threshold: DEFAULT_WARNING_THRESHOLD,
            listeners: vec![Box::new(LoggingTimeoutWarningListener)],
        }
    }

    pub fn with_threshold(mut self, threshold: Duration) -> Self {
        self.threshold = threshold;
        self
    }

    /// Replace the listeners
    pub fn with_listener(mut self, listener: Box<dyn MainClassTimeoutWarningListener>) -> Self {
        self.listeners = vec![listener];
        self
    }

    /// Scan a directory of compiled classes
    pub fn find_in_directory(&self, root: &Path) -> OsrcResult<Vec<MainClass>> {
        if !root.is_dir() {
            return Err(OsrcError::SourceInvalid(root.to_path_buf()));
        }
        let started = Instant::now();

        let mut class_files: Vec<(String, PathBuf)> = Vec::new();
        let walker = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_hidden_directory(entry));
        for entry in walker {
            let entry = entry.map_err(|e| {
                let context = format!("walking {}", e.path().unwrap_or(root).display());
                OsrcError::io(context, e.into())
            })?;
            if entry.file_type().is_dir()
                || !entry.file_name().to_string_lossy().ends_with(CLASS_FILE_EXTENSION)
            {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(root)
                .unwrap_or(entry.path())
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/");
            class_files.push((relative, entry.into_path()));
        }
        sort_by_depth(&mut class_files);

        let mut found = Vec::new();
        for (relative, path) in class_files {
            let bytes = fs::read(&path)
                .map_err(|e| OsrcError::io(format!("reading {}", path.display()), e))?;
            if let Some(main_class) = inspect(&relative, "", &bytes) {
                found.push(main_class);
            }
        }
        self.check_elapsed(started, found.first());
        Ok(found)
    }

    /// Scan the `.class` entries of an archive under `classes_location`
    pub fn find_in_archive<R: Read + Seek>(
        &self,
        archive: &mut ZipArchive<R>,
        classes_location: &str,
    ) -> OsrcResult<Vec<MainClass>> {
        let started = Instant::now();
        let mut class_entries: Vec<(String, usize)> = Vec::new();
        for index in 0..archive.len() {
            let entry = archive
                .by_index_raw(index)
                .map_err(|e| OsrcError::zip(format!("reading entry {}", index), e))?;
            let name = entry.name();
            if name.starts_with(classes_location) && name.ends_with(CLASS_FILE_EXTENSION) {
                class_entries.push((name.to_string(), index));
            }
        }
        sort_by_depth(&mut class_entries);

        let mut found = Vec::new();
        for (name, index) in class_entries {
            let mut entry = archive
                .by_index(index)
                .map_err(|e| OsrcError::zip(format!("reading {}", name), e))?;
            let mut bytes = Vec::with_capacity(entry.size().min(MAX_PREALLOCATION) as usize);
            entry
                .read_to_end(&mut bytes)
                .map_err(|e| OsrcError::io(format!("reading {}", name), e))?;
            if let Some(main_class) = inspect(&name, classes_location, &bytes) {
                found.push(main_class);
            }
        }
        self.check_elapsed(started, found.first());
        Ok(found)
    }

    fn check_elapsed(&self, started: Instant, first: Option<&MainClass>) {
        let elapsed = started.elapsed();
        if elapsed >= self.threshold {
            for listener in &self.listeners {
                listener.handle_timeout_warning(elapsed, first.map(|c| c.name.as_str()));
            }
        }
    }
}

fn is_hidden_directory(entry: &DirEntry) -> bool {
    entry.file_type().is_dir() && entry.file_name().to_string_lossy().starts_with('.')
}

fn sort_by_depth<T>(entries: &mut [(String, T)]) {
    entries.sort_by(|(a, _), (b, _)| {
        let depth_a = a.split('/').count();
        let depth_b = b.split('/').count();
        depth_a.cmp(&depth_b).then_with(|| a.cmp(b))
    });
}

/// Turn an entry path into a class name, keeping only classes with `main`
fn inspect(path: &str, classes_location: &str, bytes: &[u8]) -> Option<MainClass> {
    let info = match classfile::parse(bytes) {
        Ok(info) => info,
        Err(e) => {
            debug!("Skipping unreadable class {}: {}", path, e);
            return None;
        }
    };
    if !info.has_main_method {
        return None;
    }
    let name = path
        .strip_prefix(classes_location)
        .unwrap_or(path)
        .trim_end_matches(CLASS_FILE_EXTENSION)
        .replace('/', ".");
    debug!("Found main class {}", name);
    Some(MainClass {
        name,
        annotation_names: info.annotations.into_iter().collect(),
    })
}
