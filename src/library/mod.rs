//! Libraries packaged into an archive
//!
//! A library is a third-party or sibling-module archive that gets embedded
//! under the layout's library location. The registry deduplicates libraries
//! by target path and answers lookups while entries are written.

pub mod registry;

pub use registry::{LibraryRegistry, RegisteredLibrary};

use crate::error::{OsrcError, OsrcResult};
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Leading bytes of every zip/jar file
const ZIP_FILE_HEADER: [u8; 4] = [b'P', b'K', 3, 4];

/// Dependency scope of a library
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LibraryScope {
    Compile,
    Runtime,
    Provided,
    Custom,
}

impl fmt::Display for LibraryScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Compile => "compile",
            Self::Runtime => "runtime",
            Self::Provided => "provided",
            Self::Custom => "custom",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for LibraryScope {
    type Err = OsrcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "compile" => Ok(Self::Compile),
            "runtime" => Ok(Self::Runtime),
            "provided" => Ok(Self::Provided),
            "custom" => Ok(Self::Custom),
            other => Err(OsrcError::User(format!("Unknown library scope '{}'", other))),
        }
    }
}

/// Maven-style coordinates of a library
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryCoordinates {
    pub group_id: Option<String>,
    pub artifact_id: String,
    pub version: Option<String>,
}

impl LibraryCoordinates {
    pub fn new(
        group_id: Option<String>,
        artifact_id: impl Into<String>,
        version: Option<String>,
    ) -> Self {
        Self {
            group_id,
            artifact_id: artifact_id.into(),
            version,
        }
    }

    /// Parse `group:artifact:version`, `artifact:version` or `artifact`
    pub fn parse(value: &str) -> OsrcResult<Self> {
        let parts: Vec<&str> = value.split(':').collect();
        match parts.as_slice() {
            [artifact] if !artifact.is_empty() => Ok(Self::new(None, *artifact, None)),
            [artifact, version] => Ok(Self::new(None, *artifact, Some(version.to_string()))),
            [group, artifact, version] => Ok(Self::new(
                Some(group.to_string()),
                *artifact,
                Some(version.to_string()),
            )),
            _ => Err(OsrcError::User(format!(
                "Invalid library coordinates '{}'",
                value
            ))),
        }
    }
}

impl fmt::Display for LibraryCoordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(group) = &self.group_id {
            write!(f, "{}:", group)?;
        }
        write!(f, "{}", self.artifact_id)?;
        if let Some(version) = &self.version {
            write!(f, ":{}", version)?;
        }
        Ok(())
    }
}

/// A library file to embed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Library {
    /// File name the library is embedded under
    pub name: String,
    /// Where the library content is read from
    pub path: PathBuf,
    pub scope: LibraryScope,
    pub coordinates: Option<LibraryCoordinates>,
    /// Must be unpacked from the archive before it can be used
    pub unpack_required: bool,
    /// Built from the current project rather than resolved externally
    pub local: bool,
    /// Physically embedded in the archive
    pub included: bool,
}

impl Library {
    /// Create a library named after its file
    pub fn new(path: impl Into<PathBuf>, scope: LibraryScope) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self::named(name, path, scope)
    }

    /// Create a library embedded under an explicit name
    pub fn named(name: impl Into<String>, path: impl Into<PathBuf>, scope: LibraryScope) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            scope,
            coordinates: None,
            unpack_required: false,
            local: false,
            included: true,
        }
    }

    pub fn with_coordinates(mut self, coordinates: LibraryCoordinates) -> Self {
        self.coordinates = Some(coordinates);
        self
    }

    pub fn with_unpack_required(mut self, unpack_required: bool) -> Self {
        self.unpack_required = unpack_required;
        self
    }

    pub fn with_local(mut self, local: bool) -> Self {
        self.local = local;
        self
    }

    pub fn with_included(mut self, included: bool) -> Self {
        self.included = included;
        self
    }

    /// Whether the library is a snapshot build
    pub fn is_snapshot(&self) -> bool {
        match self.coordinates.as_ref().and_then(|c| c.version.as_deref()) {
            Some(version) => version.ends_with("SNAPSHOT"),
            None => self.name.contains("-SNAPSHOT"),
        }
    }

    /// Open the library content for reading
    pub fn open(&self) -> OsrcResult<File> {
        File::open(&self.path)
            .map_err(|e| OsrcError::io(format!("opening library {}", self.path.display()), e))
    }

    /// Whether the content starts with the zip magic bytes.
    ///
    /// Unreadable content counts as not an archive.
    pub fn is_archive(&self) -> bool {
        match File::open(&self.path) {
            Ok(mut file) => is_zip(&mut file).unwrap_or(false),
            Err(_) => false,
        }
    }

    /// SHA-1 of the library content, streamed from disk
    pub fn sha1(&self) -> OsrcResult<String> {
        let mut file = self.open()?;
        sha1_hex(&mut file)
            .map_err(|e| OsrcError::io(format!("hashing library {}", self.path.display()), e))
    }
}

/// Check the first four bytes of a stream against the zip header
pub fn is_zip(reader: &mut impl Read) -> io::Result<bool> {
    let mut header = [0u8; 4];
    match reader.read_exact(&mut header) {
        Ok(()) => Ok(header == ZIP_FILE_HEADER),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e),
    }
}

/// Hex SHA-1 of everything read from `reader`
pub fn sha1_hex(reader: &mut impl Read) -> io::Result<String> {
    let mut hasher = Sha1::new();
    io::copy(reader, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

/// Hex SHA-1 of a file on disk
pub fn sha1_file(path: &Path) -> OsrcResult<String> {
    let mut file = File::open(path)
        .map_err(|e| OsrcError::io(format!("opening {}", path.display()), e))?;
    sha1_hex(&mut file).map_err(|e| OsrcError::io(format!("hashing {}", path.display()), e))
}
