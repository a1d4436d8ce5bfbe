//! Library registry keyed by target path
//!
//! Built once before any entry is written, then only read. Iteration order is
//! registration order, or path order when a reproducible build is requested.

use crate::error::{OsrcError, OsrcResult};
use crate::library::Library;
use crate::package::Layout;
use std::collections::HashMap;
use tracing::debug;

/// A library together with the archive path it is written to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredLibrary {
    pub path: String,
    pub library: Library,
}

impl RegisteredLibrary {
    /// Directory part of the target path, including the trailing `/`
    pub fn location(&self) -> &str {
        match self.path.rfind('/') {
            Some(index) => &self.path[..=index],
            None => "",
        }
    }
}

/// Registry of libraries to embed
#[derive(Debug)]
pub struct LibraryRegistry {
    layout: Layout,
    reproducible: bool,
    libraries: Vec<RegisteredLibrary>,
    by_path: HashMap<String, usize>,
}

impl LibraryRegistry {
    pub fn new(layout: Layout, reproducible: bool) -> Self {
        Self {
            layout,
            reproducible,
            libraries: Vec::new(),
            by_path: HashMap::new(),
        }
    }

    /// Register a library under `library_location(name, scope) + name`.
    ///
    /// Scopes the layout does not package are skipped and `Ok(None)` is
    /// returned. Two libraries resolving to the same path is a fatal error.
    pub fn add(&mut self, library: Library) -> OsrcResult<Option<&RegisteredLibrary>> {
        let Some(location) = self.layout.library_location(&library.name, library.scope) else {
            debug!("Skipping {} library {}", library.scope, library.name);
            return Ok(None);
        };
        let path = format!("{}{}", location, library.name);
        if self.by_path.contains_key(&path) {
            return Err(OsrcError::DuplicateLibrary {
                name: library.name,
                path,
            });
        }
        debug!("Registered library {} at {}", library.name, path);
        let index = self.libraries.len();
        self.by_path.insert(path.clone(), index);
        self.libraries.push(RegisteredLibrary { path, library });
        Ok(self.libraries.last())
    }

    /// Exact-match lookup by archive entry name
    pub fn lookup(&self, entry_name: &str) -> Option<&Library> {
        self.by_path
            .get(entry_name)
            .map(|&index| &self.libraries[index].library)
    }

    /// Whether the entry names a registered library flagged for unpacking
    pub fn requires_unpack(&self, entry_name: &str) -> bool {
        self.lookup(entry_name)
            .map(|library| library.unpack_required)
            .unwrap_or(false)
    }

    /// SHA-1 of the library registered for `entry_name`
    pub fn sha1_hash(&self, entry_name: &str) -> OsrcResult<String> {
        let library = self
            .lookup(entry_name)
            .ok_or_else(|| OsrcError::LibraryNotRegistered(entry_name.to_string()))?;
        library.sha1()
    }

    /// Libraries in enumeration order
    pub fn iter(&self) -> impl Iterator<Item = &RegisteredLibrary> {
        let mut ordered: Vec<&RegisteredLibrary> = self.libraries.iter().collect();
        if self.reproducible {
            ordered.sort_by(|a, b| a.path.cmp(&b.path));
        }
        ordered.into_iter()
    }

    /// Libraries that will physically be written
    pub fn included(&self) -> impl Iterator<Item = &RegisteredLibrary> {
        self.iter().filter(|registered| registered.library.included)
    }

    pub fn len(&self) -> usize {
        self.libraries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.libraries.is_empty()
    }
}
