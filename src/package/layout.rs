//! Archive layouts
//!
//! A layout is the fixed set of conventions governing where classes,
//! libraries and index files live inside an archive of a given packaging
//! type, and which launcher class boots it.

use crate::error::{OsrcError, OsrcResult};
use crate::library::LibraryScope;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Supported archive layouts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    /// Executable jar: classes repackaged under `BOOT-INF/classes/`
    Jar,
    /// Executable war: classes stay under `WEB-INF/classes/`
    War,
    /// Executable expanded archive (zip or directory)
    Expanded,
    /// Jar structure without a launcher
    None,
}

impl Layout {
    /// Deduce the layout from a source file name
    pub fn for_file(path: &Path) -> OsrcResult<Self> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if name.ends_with(".jar") {
            return Ok(Self::Jar);
        }
        if name.ends_with(".war") {
            return Ok(Self::War);
        }
        if path.is_dir() || name.ends_with(".zip") {
            return Ok(Self::Expanded);
        }
        Err(OsrcError::LayoutUnknown(path.to_path_buf()))
    }

    /// Launcher class written as `Main-Class`, if the layout is bootable
    pub fn launcher_class_name(&self) -> Option<&'static str> {
        match self {
            Self::Jar => Some("com.maplecloudy.osrc.boot.loader.JarLauncher"),
            Self::War => Some("com.maplecloudy.osrc.boot.loader.WarLauncher"),
            Self::Expanded => Some("com.maplecloudy.osrc.boot.loader.PropertiesLauncher"),
            Self::None => None,
        }
    }

    /// Directory a library of the given scope is written to.
    ///
    /// `None` means the scope is not packaged by this layout.
    pub fn library_location(&self, _library_name: &str, scope: LibraryScope) -> Option<&'static str> {
        match self {
            Self::Jar | Self::Expanded | Self::None => Some("BOOT-INF/lib/"),
            Self::War => match scope {
                LibraryScope::Provided => Some("WEB-INF/lib-provided/"),
                LibraryScope::Compile | LibraryScope::Runtime | LibraryScope::Custom => {
                    Some("WEB-INF/lib/")
                }
            },
        }
    }

    /// Location of classes in the source archive
    pub fn classes_location(&self) -> &'static str {
        match self {
            Self::War => "WEB-INF/classes/",
            Self::Jar | Self::Expanded | Self::None => "",
        }
    }

    /// Location classes are moved to when repackaging, if the layout moves them
    pub fn repackaged_classes_location(&self) -> Option<&'static str> {
        match self {
            Self::Jar | Self::Expanded | Self::None => Some("BOOT-INF/classes/"),
            Self::War => None,
        }
    }

    /// Whether entries are renamed into a repackaged classes location
    pub fn is_repackaging(&self) -> bool {
        self.repackaged_classes_location().is_some()
    }

    pub fn classpath_index_location(&self) -> &'static str {
        match self {
            Self::War => "WEB-INF/classpath.idx",
            Self::Jar | Self::Expanded | Self::None => "BOOT-INF/classpath.idx",
        }
    }

    pub fn layers_index_location(&self) -> &'static str {
        match self {
            Self::War => "WEB-INF/layers.idx",
            Self::Jar | Self::Expanded | Self::None => "BOOT-INF/layers.idx",
        }
    }

    /// Whether the archive gets loader classes and a launcher `Main-Class`
    pub fn is_executable(&self) -> bool {
        !matches!(self, Self::None)
    }

    /// Reserved top-level directory that original entries are never moved into
    pub fn reserved_directory(&self) -> &'static str {
        match self {
            Self::War => "WEB-INF/",
            Self::Jar | Self::Expanded | Self::None => "BOOT-INF/",
        }
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Jar => "jar",
            Self::War => "war",
            Self::Expanded => "expanded",
            Self::None => "none",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for Layout {
    type Err = OsrcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "jar" => Ok(Self::Jar),
            "war" => Ok(Self::War),
            "expanded" | "zip" | "dir" => Ok(Self::Expanded),
            "none" => Ok(Self::None),
            other => Err(OsrcError::User(format!(
                "Unknown layout '{}': expected jar, war, expanded or none",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn layout_for_file_by_extension() {
        assert_eq!(Layout::for_file(Path::new("app.jar")).unwrap(), Layout::Jar);
        assert_eq!(Layout::for_file(Path::new("APP.WAR")).unwrap(), Layout::War);
        assert_eq!(
            Layout::for_file(Path::new("bundle.zip")).unwrap(),
            Layout::Expanded
        );
    }

    #[test]
    fn layout_for_directory_is_expanded() {
        let temp = TempDir::new().unwrap();
        assert_eq!(Layout::for_file(temp.path()).unwrap(), Layout::Expanded);
    }

    #[test]
    fn layout_for_unknown_file_fails() {
        let err = Layout::for_file(Path::new("notes.txt")).unwrap_err();
        assert!(matches!(err, OsrcError::LayoutUnknown(_)));
    }

    #[test]
    fn war_provided_scope_has_own_location() {
        assert_eq!(
            Layout::War.library_location("a.jar", LibraryScope::Provided),
            Some("WEB-INF/lib-provided/")
        );
        assert_eq!(
            Layout::War.library_location("a.jar", LibraryScope::Runtime),
            Some("WEB-INF/lib/")
        );
        assert_eq!(
            Layout::Jar.library_location("a.jar", LibraryScope::Provided),
            Some("BOOT-INF/lib/")
        );
    }

    #[test]
    fn none_layout_is_not_executable() {
        assert!(!Layout::None.is_executable());
        assert!(Layout::None.launcher_class_name().is_none());
        assert!(Layout::None.is_repackaging());
        assert!(!Layout::War.is_repackaging());
    }

    #[test]
    fn layout_parse_roundtrip() {
        for layout in [Layout::Jar, Layout::War, Layout::Expanded, Layout::None] {
            assert_eq!(layout.to_string().parse::<Layout>().unwrap(), layout);
        }
    }
}
