//! JAR manifest reading and writing
//!
//! Attribute order is preserved so that identical inputs produce identical
//! manifest bytes. Lines are wrapped at 72 bytes with single-space
//! continuation lines.

use crate::error::{OsrcError, OsrcResult};
use std::io::{Read, Seek};
use zip::result::ZipError;
use zip::ZipArchive;

pub const MANIFEST_NAME: &str = "META-INF/MANIFEST.MF";

pub const MANIFEST_VERSION: &str = "Manifest-Version";
pub const MAIN_CLASS: &str = "Main-Class";
pub const SERVICE_CLASS: &str = "Service-Class";
pub const TASK_CLASS: &str = "Task-Class";
pub const BOOT_VERSION: &str = "Osrc-Boot-Version";
pub const OSRC_VERSION: &str = "Osrc-Version";
pub const BOOT_CLASSES: &str = "Osrc-Boot-Classes";
pub const BOOT_LIB: &str = "Osrc-Boot-Lib";
pub const BOOT_CLASSPATH_INDEX: &str = "Osrc-Boot-Classpath-Index";
pub const BOOT_LAYERS_INDEX: &str = "Osrc-Boot-Layers-Index";
pub const UNPACK_SHA1: &str = "Osrc-Unpack-Sha1";

const SECTION_NAME: &str = "Name";
const MAX_LINE_BYTES: usize = 72;

type Attributes = Vec<(String, String)>;

/// Main attributes plus named per-entry sections
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    main: Attributes,
    sections: Vec<(String, Attributes)>,
}

impl Default for Manifest {
    fn default() -> Self {
        Self::new()
    }
}

impl Manifest {
    /// Empty manifest carrying only `Manifest-Version: 1.0`
    pub fn new() -> Self {
        Self {
            main: vec![(MANIFEST_VERSION.to_string(), "1.0".to_string())],
            sections: Vec::new(),
        }
    }

    pub fn parse(content: &str) -> OsrcResult<Self> {
        let mut main: Attributes = Vec::new();
        let mut sections: Vec<(String, Attributes)> = Vec::new();
        let mut current: Attributes = Vec::new();
        let mut in_main = true;

        let mut flush = |current: &mut Attributes, in_main: &mut bool| -> OsrcResult<()> {
            if *in_main {
                main.append(current);
                *in_main = false;
            } else if !current.is_empty() {
                let (key, name) = current.remove(0);
                if !key.eq_ignore_ascii_case(SECTION_NAME) {
                    return Err(OsrcError::ManifestMalformed(format!(
                        "section starts with {} instead of Name",
                        key
                    )));
                }
                sections.push((name, std::mem::take(current)));
            }
            Ok(())
        };

        for line in content.split('\n').map(|l| l.trim_end_matches('\r')) {
            if line.is_empty() {
                flush(&mut current, &mut in_main)?;
                continue;
            }
            if let Some(continuation) = line.strip_prefix(' ') {
                match current.last_mut() {
                    Some((_, value)) => value.push_str(continuation),
                    None => return Err(OsrcError::ManifestMalformed(line.to_string())),
                }
                continue;
            }
            match line.split_once(": ") {
                Some((key, value)) if !key.is_empty() => {
                    current.push((key.to_string(), value.to_string()))
                }
                _ => match line.strip_suffix(':') {
                    Some(key) if !key.is_empty() && !key.contains(' ') => {
                        current.push((key.to_string(), String::new()))
                    }
                    _ => return Err(OsrcError::ManifestMalformed(line.to_string())),
                },
            }
        }
        flush(&mut current, &mut in_main)?;

        Ok(Self { main, sections })
    }

    /// Main attribute, matched case-insensitively
    pub fn get(&self, key: &str) -> Option<&str> {
        lookup(&self.main, key)
    }

    /// Set a main attribute, keeping its position when it already exists
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        store(&mut self.main, key, value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        let index = self
            .main
            .iter()
            .position(|(k, _)| k.eq_ignore_ascii_case(key))?;
        Some(self.main.remove(index).1)
    }

    pub fn section_attribute(&self, section: &str, key: &str) -> Option<&str> {
        self.sections
            .iter()
            .find(|(name, _)| name == section)
            .and_then(|(_, attributes)| lookup(attributes, key))
    }

    pub fn set_section_attribute(&mut self, section: &str, key: &str, value: impl Into<String>) {
        match self.sections.iter_mut().find(|(name, _)| name == section) {
            Some((_, attributes)) => store(attributes, key, value.into()),
            None => self
                .sections
                .push((section.to_string(), vec![(key.to_string(), value.into())])),
        }
    }

    /// Section names paired with their attributes
    pub fn sections(&self) -> impl Iterator<Item = (&str, &[(String, String)])> {
        self.sections
            .iter()
            .map(|(name, attributes)| (name.as_str(), attributes.as_slice()))
    }

    /// Serialized manifest, `Manifest-Version` first
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        if let Some(version) = self.get(MANIFEST_VERSION) {
            write_attribute(&mut out, MANIFEST_VERSION, version);
        }
        for (key, value) in &self.main {
            if !key.eq_ignore_ascii_case(MANIFEST_VERSION) {
                write_attribute(&mut out, key, value);
            }
        }
        out.extend_from_slice(b"\r\n");
        for (name, attributes) in &self.sections {
            write_attribute(&mut out, SECTION_NAME, name);
            for (key, value) in attributes {
                write_attribute(&mut out, key, value);
            }
            out.extend_from_slice(b"\r\n");
        }
        out
    }

    /// Read the manifest of an archive, if it has one
    pub fn read_from<R: Read + Seek>(archive: &mut ZipArchive<R>) -> OsrcResult<Option<Self>> {
        let mut entry = match archive.by_name(MANIFEST_NAME) {
            Ok(entry) => entry,
            Err(ZipError::FileNotFound) => return Ok(None),
            Err(e) => return Err(OsrcError::zip("reading manifest", e)),
        };
        let mut content = String::new();
        entry
            .read_to_string(&mut content)
            .map_err(|e| OsrcError::io("reading manifest", e))?;
        Self::parse(&content).map(Some)
    }
}

fn lookup<'a>(attributes: &'a Attributes, key: &str) -> Option<&'a str> {
    attributes
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .map(|(_, v)| v.as_str())
}

fn store(attributes: &mut Attributes, key: &str, value: String) {
    match attributes
        .iter_mut()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
    {
        Some((_, existing)) => *existing = value,
        None => attributes.push((key.to_string(), value)),
    }
}

fn write_attribute(out: &mut Vec<u8>, key: &str, value: &str) {
    let line = format!("{}: {}", key, value);
    let mut rest = line.as_str();
    let mut limit = MAX_LINE_BYTES;
    loop {
        if rest.len() <= limit {
            out.extend_from_slice(rest.as_bytes());
            out.extend_from_slice(b"\r\n");
            return;
        }
        let mut split = limit;
        while !rest.is_char_boundary(split) {
            split -= 1;
        }
        out.extend_from_slice(rest[..split].as_bytes());
        out.extend_from_slice(b"\r\n ");
        rest = &rest[split..];
        limit = MAX_LINE_BYTES - 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_manifest_has_version() {
        let manifest = Manifest::new();
        assert_eq!(manifest.get("manifest-version"), Some("1.0"));
        assert_eq!(manifest.to_bytes(), b"Manifest-Version: 1.0\r\n\r\n".to_vec());
    }

    #[test]
    fn long_values_wrap_at_72_bytes() {
        let mut manifest = Manifest::new();
        let value = "x".repeat(200);
        manifest.set(TASK_CLASS, value.clone());
        let bytes = manifest.to_bytes();
        let text = String::from_utf8(bytes).unwrap();
        for line in text.split("\r\n") {
            assert!(line.len() <= 72, "line too long: {}", line.len());
        }
        let parsed = Manifest::parse(&text).unwrap();
        assert_eq!(parsed.get(TASK_CLASS), Some(value.as_str()));
    }

    #[test]
    fn set_replaces_in_place() {
        let mut manifest = Manifest::parse("Manifest-Version: 1.0\r\nMain-Class: a.A\r\nX: 1\r\n\r\n")
            .unwrap();
        manifest.set("main-class", "b.B");
        let text = String::from_utf8(manifest.to_bytes()).unwrap();
        assert_eq!(text, "Manifest-Version: 1.0\r\nMain-Class: b.B\r\nX: 1\r\n\r\n");
        assert_eq!(manifest.remove("X"), Some("1".to_string()));
    }

    #[test]
    fn sections_roundtrip() {
        let mut manifest = Manifest::new();
        manifest.set(MAIN_CLASS, "a.Launcher");
        manifest.set_section_attribute("BOOT-INF/lib/a.jar", UNPACK_SHA1, "abc");
        let parsed = Manifest::parse(&String::from_utf8(manifest.to_bytes()).unwrap()).unwrap();
        assert_eq!(parsed, manifest);
        assert_eq!(
            parsed.section_attribute("BOOT-INF/lib/a.jar", UNPACK_SHA1),
            Some("abc")
        );
        assert_eq!(parsed.sections().count(), 1);
    }

    #[test]
    fn malformed_line_is_rejected() {
        let err = Manifest::parse("Manifest-Version: 1.0\nnot an attribute\n").unwrap_err();
        assert!(matches!(err, OsrcError::ManifestMalformed(_)));
    }

    #[test]
    fn wrap_respects_char_boundaries() {
        let mut out = Vec::new();
        write_attribute(&mut out, "K", &"é".repeat(60));
        let text = String::from_utf8(out).unwrap();
        let parsed = Manifest::parse(&format!("{}\r\n", text)).unwrap();
        assert_eq!(parsed.get("K").map(|v| v.chars().count()), Some(60));
    }
}
