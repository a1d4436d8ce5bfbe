//! Classpath reconstruction from an archive's nested structure

use crate::error::{OsrcError, OsrcResult};
use crate::package::manifest::{Manifest, BOOT_CLASSES, BOOT_LIB};
use std::collections::HashSet;

/// Precomputed list of nested libraries
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClasspathIndex {
    entries: Vec<String>,
    lookup: HashSet<String>,
}

impl ClasspathIndex {
    /// Parse `- "path"` lines
    pub fn parse(content: &str) -> OsrcResult<Self> {
        let mut index = Self::default();
        for line in content.lines() {
            if line.trim().is_empty() {
                continue;
            }
            let path = line
                .strip_prefix("- \"")
                .and_then(|rest| rest.strip_suffix('"'))
                .ok_or_else(|| OsrcError::ClasspathIndexMalformed(line.to_string()))?;
            if index.lookup.insert(path.to_string()) {
                index.entries.push(path.to_string());
            }
        }
        Ok(index)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lookup.contains(name)
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Where nested classpath items live inside an archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClasspathLayout {
    /// Top-level directory searched for nested items
    pub root: String,
    pub classes: String,
    pub libs: Vec<String>,
}

impl ClasspathLayout {
    pub fn from_manifest(manifest: &Manifest) -> OsrcResult<Self> {
        let classes = manifest
            .get(BOOT_CLASSES)
            .ok_or_else(|| OsrcError::ManifestMalformed(format!("missing {}", BOOT_CLASSES)))?;
        let lib = manifest
            .get(BOOT_LIB)
            .ok_or_else(|| OsrcError::ManifestMalformed(format!("missing {}", BOOT_LIB)))?;
        let root = match lib.find('/') {
            Some(index) => lib[..=index].to_string(),
            None => String::new(),
        };
        let mut libs = vec![lib.to_string()];
        if lib == "WEB-INF/lib/" {
            libs.push("WEB-INF/lib-provided/".to_string());
        }
        Ok(Self {
            root,
            classes: classes.to_string(),
            libs,
        })
    }

    fn is_search_candidate(&self, name: &str) -> bool {
        name.starts_with(&self.root)
    }

    fn is_nested_archive(&self, name: &str) -> bool {
        if name.ends_with('/') {
            return name == self.classes;
        }
        self.libs
            .iter()
            .any(|lib| name.starts_with(lib.as_str()) && name.len() > lib.len())
    }
}

/// Walks entry names yielding nested classpath items.
///
/// Once a directory is yielded, entries below it are skipped.
pub struct NestedEntries<'a, I> {
    names: I,
    layout: &'a ClasspathLayout,
    index: Option<&'a ClasspathIndex>,
    included_directory: Option<String>,
}

impl<'a, I> NestedEntries<'a, I>
where
    I: Iterator<Item = &'a str>,
{
    pub fn new(names: I, layout: &'a ClasspathLayout, index: Option<&'a ClasspathIndex>) -> Self {
        Self {
            names,
            layout,
            index,
            included_directory: None,
        }
    }
}

impl<'a, I> Iterator for NestedEntries<'a, I>
where
    I: Iterator<Item = &'a str>,
{
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        for name in self.names.by_ref() {
            if let Some(directory) = &self.included_directory {
                if name.starts_with(directory.as_str()) {
                    continue;
                }
            }
            if !self.layout.is_search_candidate(name) || !self.layout.is_nested_archive(name) {
                continue;
            }
            if self.index.map(|i| i.contains(name)).unwrap_or(false) {
                continue;
            }
            if name.ends_with('/') {
                self.included_directory = Some(name.to_string());
            }
            return Some(name);
        }
        None
    }
}

/// Classpath entry names: nested items in archive order, then indexed ones
pub fn resolve_classpath<'a>(
    names: impl Iterator<Item = &'a str>,
    layout: &'a ClasspathLayout,
    index: Option<&'a ClasspathIndex>,
) -> Vec<String> {
    let mut classpath: Vec<String> = NestedEntries::new(names, layout, index)
        .map(String::from)
        .collect();
    if let Some(index) = index {
        classpath.extend(index.entries().iter().cloned());
    }
    classpath
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jar_layout() -> ClasspathLayout {
        let mut manifest = Manifest::new();
        manifest.set(BOOT_CLASSES, "BOOT-INF/classes/");
        manifest.set(BOOT_LIB, "BOOT-INF/lib/");
        ClasspathLayout::from_manifest(&manifest).unwrap()
    }

    const NAMES: &[&str] = &[
        "META-INF/MANIFEST.MF",
        "BOOT-INF/",
        "BOOT-INF/classes/",
        "BOOT-INF/classes/a/A.class",
        "BOOT-INF/lib/",
        "BOOT-INF/lib/a.jar",
        "BOOT-INF/lib/b.jar",
        "BOOT-INF/lib/c.jar",
        "BOOT-INF/classpath.idx",
    ];

    #[test]
    fn nested_items_without_index() {
        let layout = jar_layout();
        let classpath = resolve_classpath(NAMES.iter().copied(), &layout, None);
        assert_eq!(
            classpath,
            vec![
                "BOOT-INF/classes/",
                "BOOT-INF/lib/a.jar",
                "BOOT-INF/lib/b.jar",
                "BOOT-INF/lib/c.jar"
            ]
        );
    }

    #[test]
    fn indexed_entries_are_not_rescanned() {
        let layout = jar_layout();
        let index =
            ClasspathIndex::parse("- \"BOOT-INF/lib/c.jar\"\n- \"BOOT-INF/lib/a.jar\"\n").unwrap();
        let classpath = resolve_classpath(NAMES.iter().copied(), &layout, Some(&index));
        assert_eq!(
            classpath,
            vec![
                "BOOT-INF/classes/",
                "BOOT-INF/lib/b.jar",
                "BOOT-INF/lib/c.jar",
                "BOOT-INF/lib/a.jar"
            ]
        );
    }

    #[test]
    fn war_layout_includes_provided_libraries() {
        let mut manifest = Manifest::new();
        manifest.set(BOOT_CLASSES, "WEB-INF/classes/");
        manifest.set(BOOT_LIB, "WEB-INF/lib/");
        let layout = ClasspathLayout::from_manifest(&manifest).unwrap();
        let names = [
            "WEB-INF/classes/",
            "WEB-INF/classes/x/",
            "WEB-INF/lib/a.jar",
            "WEB-INF/lib-provided/p.jar",
            "other/lib/z.jar",
        ];
        let classpath = resolve_classpath(names.iter().copied(), &layout, None);
        assert_eq!(
            classpath,
            vec![
                "WEB-INF/classes/",
                "WEB-INF/lib/a.jar",
                "WEB-INF/lib-provided/p.jar"
            ]
        );
    }

    #[test]
    fn malformed_index_line_fails() {
        let err = ClasspathIndex::parse("BOOT-INF/lib/a.jar\n").unwrap_err();
        assert!(matches!(err, OsrcError::ClasspathIndexMalformed(_)));
        assert!(ClasspathIndex::parse("").unwrap().is_empty());
    }

    #[test]
    fn missing_boot_attributes_fail() {
        assert!(ClasspathLayout::from_manifest(&Manifest::new()).is_err());
    }
}
