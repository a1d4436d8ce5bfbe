//! Listing and extracting the layers of a packaged archive

use crate::error::{OsrcError, OsrcResult};
use crate::layer::IndexedLayers;
use crate::package::manifest::{Manifest, BOOT_LAYERS_INDEX};
use std::fs::{self, File};
use std::io::{self, BufReader, Read, Seek};
use std::path::{Path, PathBuf};
use tracing::debug;
use zip::ZipArchive;

/// A layered archive opened for inspection
pub struct LayeredArchive {
    path: PathBuf,
    archive: ZipArchive<BufReader<File>>,
    layers: IndexedLayers,
}

impl LayeredArchive {
    pub fn open(path: &Path) -> OsrcResult<Self> {
        let file = File::open(path)
            .map_err(|e| OsrcError::io(format!("opening {}", path.display()), e))?;
        let mut archive = ZipArchive::new(BufReader::new(file))
            .map_err(|e| OsrcError::zip(format!("reading {}", path.display()), e))?;
        let layers = read_layers(&mut archive, path)?;
        Ok(Self {
            path: path.to_path_buf(),
            archive,
            layers,
        })
    }

    pub fn layers(&self) -> &IndexedLayers {
        &self.layers
    }

    /// Extract entries into `<destination>/<layer>/...`.
    ///
    /// With `selected` empty every layer is extracted. Returns the number of
    /// files written.
    pub fn extract(&mut self, destination: &Path, selected: &[String]) -> OsrcResult<usize> {
        for name in selected {
            if !self.layers.names().any(|layer| layer == name) {
                return Err(OsrcError::User(format!(
                    "Layer '{}' is not present in {}",
                    name,
                    self.path.display()
                )));
            }
        }

        let mut written = 0;
        for index in 0..self.archive.len() {
            let mut entry = self
                .archive
                .by_index(index)
                .map_err(|e| OsrcError::zip(format!("reading {}", self.path.display()), e))?;
            if entry.is_dir() {
                continue;
            }
            let name = entry.name().to_string();
            let layer = self.layers.layer_for(&name)?;
            if !selected.is_empty() && !selected.iter().any(|s| s == layer) {
                continue;
            }
            let Some(relative) = entry.enclosed_name().map(Path::to_path_buf) else {
                return Err(OsrcError::User(format!(
                    "Archive entry {} escapes the extraction directory",
                    name
                )));
            };
            let target = destination.join(layer).join(relative);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)
                    .map_err(|e| OsrcError::io(format!("creating {}", parent.display()), e))?;
            }
            let mut out = File::create(&target)
                .map_err(|e| OsrcError::io(format!("creating {}", target.display()), e))?;
            io::copy(&mut entry, &mut out)
                .map_err(|e| OsrcError::io(format!("extracting {}", target.display()), e))?;
            debug!("Extracted {} into layer {}", name, layer);
            written += 1;
        }
        Ok(written)
    }
}

fn read_layers<R: Read + Seek>(archive: &mut ZipArchive<R>, path: &Path) -> OsrcResult<IndexedLayers> {
    let manifest =
        Manifest::read_from(archive)?.ok_or_else(|| OsrcError::ManifestMissing(path.to_path_buf()))?;
    let location = manifest.get(BOOT_LAYERS_INDEX).ok_or_else(|| {
        OsrcError::User(format!("{} is not a layered archive", path.display()))
    })?;
    let mut entry = archive
        .by_name(location)
        .map_err(|e| OsrcError::zip(format!("reading {}", location), e))?;
    let mut content = String::new();
    entry
        .read_to_string(&mut content)
        .map_err(|e| OsrcError::io(format!("reading {}", location), e))?;
    IndexedLayers::parse(&content)
}
