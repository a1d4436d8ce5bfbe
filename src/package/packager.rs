//! Archive packaging
//!
//! `Packager` turns a plain jar or war into an executable archive:
//! manifest, application descriptor, loader classes, the original entries
//! (renamed into the repackaged classes location where the layout asks for
//! it), nested libraries, the classpath index and, when layered, the layers
//! index. `Repackager` wraps it with source validation, an optional backup
//! and a temp-file-then-rename write.

use crate::error::{OsrcError, OsrcResult};
use crate::layer::{Layer, LayerRules, LayersIndex};
use crate::library::{Library, LibraryRegistry, LibraryScope};
use crate::package::app::{AppDescriptor, ProjectInfo, APP_DESCRIPTOR_NAME};
use crate::package::manifest::{self, Manifest, MANIFEST_NAME};
use crate::package::pod::{PodClassifier, PodPlan};
use crate::package::writer::ArchiveWriter;
use crate::package::Layout;
use crate::scan::{select_main_classes, MainClass, MainClassFinder};
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Cursor, Read, Seek, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const INDEX_LIST_NAME: &str = "META-INF/INDEX.LIST";
const MODULE_INFO_NAME: &str = "module-info.class";

/// Summary of a packaging run
#[derive(Debug, Clone)]
pub struct PackageReport {
    pub destination: PathBuf,
    pub layout: Layout,
    pub pods: PodPlan,
    /// Library entries written, in classpath order
    pub libraries: Vec<String>,
    pub entries: usize,
    /// Layer contents when the archive is layered
    pub layers: Option<Vec<(Layer, Vec<String>)>>,
}

/// Writes an executable archive from a source archive and libraries
pub struct Packager {
    source: PathBuf,
    layout: Option<Layout>,
    layers: Option<LayerRules>,
    reproducible: bool,
    loader_jar: Option<PathBuf>,
    main_class: Option<String>,
    pod_classifier: PodClassifier,
    finder: MainClassFinder,
    project: ProjectInfo,
}

impl Packager {
    /// Packager for an existing source archive or expanded directory
    pub fn new(source: impl Into<PathBuf>) -> OsrcResult<Self> {
        let source = source.into();
        if !source.is_file() && !source.is_dir() {
            return Err(OsrcError::SourceInvalid(source));
        }
        let artifact = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self {
            source,
            layout: None,
            layers: None,
            reproducible: false,
            loader_jar: None,
            main_class: None,
            pod_classifier: PodClassifier::standard(),
            finder: MainClassFinder::new(),
            project: ProjectInfo {
                name: artifact.clone(),
                artifact,
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Default::default()
            },
        })
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn with_layout(mut self, layout: Layout) -> Self {
        self.layout = Some(layout);
        self
    }

    /// Enable layering with the given rules
    pub fn with_layers(mut self, layers: LayerRules) -> Self {
        self.layers = Some(layers);
        self
    }

    pub fn with_reproducible(mut self, reproducible: bool) -> Self {
        self.reproducible = reproducible;
        self
    }

    /// Archive whose entries are copied in as loader classes
    pub fn with_loader_jar(mut self, loader_jar: Option<PathBuf>) -> Self {
        self.loader_jar = loader_jar;
        self
    }

    /// Skip scanning and use this class as the sole entry
    pub fn with_main_class(mut self, main_class: Option<String>) -> Self {
        self.main_class = main_class;
        self
    }

    pub fn with_pod_classifier(mut self, classifier: PodClassifier) -> Self {
        self.pod_classifier = classifier;
        self
    }

    pub fn with_finder(mut self, finder: MainClassFinder) -> Self {
        self.finder = finder;
        self
    }

    pub fn with_project(mut self, project: ProjectInfo) -> Self {
        self.project = project;
        self
    }

    /// Layout in effect, explicit or deduced from the source name
    pub fn layout(&self) -> OsrcResult<Layout> {
        match self.layout {
            Some(layout) => Ok(layout),
            None => Layout::for_file(&self.source),
        }
    }

    /// Write the packaged archive to `out`.
    ///
    /// `package_name` is the file name the archive will be launched as.
    /// A failure part-way leaves `out` partially written.
    pub fn write<W: Write + Seek>(
        &self,
        libraries: Vec<Library>,
        package_name: &str,
        out: W,
    ) -> OsrcResult<(W, PackageReport)> {
        if self.source.is_dir() {
            let bytes = archive_directory(&self.source)?;
            let mut source = ZipArchive::new(Cursor::new(bytes))
                .map_err(|e| OsrcError::zip(format!("reading {}", self.source.display()), e))?;
            self.write_from(&mut source, libraries, package_name, out)
        } else {
            let mut source = open_archive(&self.source)?;
            self.write_from(&mut source, libraries, package_name, out)
        }
    }

    fn write_from<R: Read + Seek, W: Write + Seek>(
        &self,
        source: &mut ZipArchive<R>,
        libraries: Vec<Library>,
        package_name: &str,
        out: W,
    ) -> OsrcResult<(W, PackageReport)> {
        let layout = self.layout()?;

        let mut registry = LibraryRegistry::new(layout, self.reproducible);
        for library in libraries {
            registry.add(library)?;
        }

        let (manifest, pods) = self.build_manifest(source, layout, &registry, package_name)?;
        let mut writer = ArchiveWriter::new(out, self.reproducible);
        let mut index = self
            .layers
            .as_ref()
            .map(|rules| LayersIndex::new(rules.iter().cloned()));
        let mut recorder = EntryRecorder {
            rules: self.layers.as_ref(),
            index: index.as_mut(),
            registry: &registry,
            entries: 0,
        };

        recorder.write_bytes(&mut writer, MANIFEST_NAME, &manifest.to_bytes())?;
        let descriptor = AppDescriptor::new(&self.project, package_name, &pods);
        recorder.write_bytes(&mut writer, APP_DESCRIPTOR_NAME, &descriptor.to_json()?)?;

        if layout.is_executable() {
            self.write_loader_classes(&mut writer, &mut recorder)?;
        }
        self.write_original_entries(source, layout, &mut writer, &mut recorder)?;

        let mut written_libraries = Vec::new();
        for registered in registry.included() {
            if !registered.library.is_archive() {
                debug!("Skipping non-archive library {}", registered.library.name);
                continue;
            }
            let mut file = BufReader::new(registered.library.open()?);
            if recorder.write_reader(&mut writer, &registered.path, &mut file, true)? {
                written_libraries.push(registered.path.clone());
            }
        }

        if layout.is_repackaging() {
            let classpath_index: String = written_libraries
                .iter()
                .map(|path| format!("- \"{}\"\n", path))
                .collect();
            recorder.write_bytes(
                &mut writer,
                layout.classpath_index_location(),
                classpath_index.as_bytes(),
            )?;
        }

        let entries = recorder.entries;
        let layers = match (self.layers.as_ref(), index.as_mut()) {
            (Some(rules), Some(index)) => {
                let location = layout.layers_index_location();
                index.add(rules.layer_for_entry(location)?, location);
                let content = index.to_index_string();
                writer.write_bytes(location, content.as_bytes())?;
                Some(index.entries())
            }
            _ => None,
        };

        let out = writer.finish()?;
        info!(
            layout = %layout,
            entries = entries,
            libraries = written_libraries.len(),
            "Packaged {}",
            package_name
        );
        Ok((
            out,
            PackageReport {
                destination: PathBuf::from(package_name),
                layout,
                pods,
                libraries: written_libraries,
                entries,
                layers,
            },
        ))
    }

    fn build_manifest<R: Read + Seek>(
        &self,
        source: &mut ZipArchive<R>,
        layout: Layout,
        registry: &LibraryRegistry,
        package_name: &str,
    ) -> OsrcResult<(Manifest, PodPlan)> {
        let mut manifest = Manifest::read_from(source)?.unwrap_or_default();
        let mut pods = PodPlan::default();

        if let Some(launcher) = layout.launcher_class_name() {
            let main_classes = self.main_classes(source, layout)?;
            pods = self.pod_classifier.classify(&main_classes, package_name)?;
            manifest.set(manifest::MAIN_CLASS, launcher);
            if let Some(service) = pods.service() {
                manifest.set(manifest::SERVICE_CLASS, service.entry.clone());
            }
            let tasks: Vec<&str> = pods.tasks().map(|t| t.entry.as_str()).collect();
            if !tasks.is_empty() {
                manifest.set(manifest::TASK_CLASS, tasks.join(","));
            }
        }

        let version = env!("CARGO_PKG_VERSION");
        manifest.set(manifest::BOOT_VERSION, version);
        manifest.set(manifest::OSRC_VERSION, version);
        manifest.set(
            manifest::BOOT_CLASSES,
            layout
                .repackaged_classes_location()
                .unwrap_or(layout.classes_location()),
        );
        if let Some(lib) = layout.library_location("", LibraryScope::Compile) {
            manifest.set(manifest::BOOT_LIB, lib);
        }
        if layout.is_repackaging() {
            manifest.set(
                manifest::BOOT_CLASSPATH_INDEX,
                layout.classpath_index_location(),
            );
        }
        if self.layers.is_some() {
            manifest.set(manifest::BOOT_LAYERS_INDEX, layout.layers_index_location());
        }

        for registered in registry.included() {
            if registered.library.unpack_required {
                let sha1 = registry.sha1_hash(&registered.path)?;
                manifest.set_section_attribute(&registered.path, manifest::UNPACK_SHA1, sha1);
            }
        }
        Ok((manifest, pods))
    }

    fn main_classes<R: Read + Seek>(
        &self,
        source: &mut ZipArchive<R>,
        layout: Layout,
    ) -> OsrcResult<Vec<MainClass>> {
        if let Some(name) = &self.main_class {
            return Ok(vec![MainClass {
                name: name.clone(),
                annotation_names: Default::default(),
            }]);
        }
        let candidates = self.finder.find_in_archive(source, layout.classes_location())?;
        select_main_classes(candidates, &self.pod_classifier.marker_names())
    }

    fn write_loader_classes<W: Write + Seek>(
        &self,
        writer: &mut ArchiveWriter<W>,
        recorder: &mut EntryRecorder<'_>,
    ) -> OsrcResult<()> {
        let Some(loader_jar) = &self.loader_jar else {
            warn!("No loader jar configured, the archive will not contain loader classes");
            return Ok(());
        };
        let mut loader = open_archive(loader_jar)?;
        for index in 0..loader.len() {
            let mut entry = loader
                .by_index(index)
                .map_err(|e| OsrcError::zip(format!("reading {}", loader_jar.display()), e))?;
            let name = entry.name().to_string();
            if entry.is_dir() || name.starts_with("META-INF/") {
                continue;
            }
            recorder.write_reader(writer, &name, &mut entry, false)?;
        }
        Ok(())
    }

    fn write_original_entries<R: Read + Seek, W: Write + Seek>(
        &self,
        source: &mut ZipArchive<R>,
        layout: Layout,
        writer: &mut ArchiveWriter<W>,
        recorder: &mut EntryRecorder<'_>,
    ) -> OsrcResult<()> {
        let mut names: Vec<(usize, String)> = (0..source.len())
            .map(|i| {
                source
                    .by_index_raw(i)
                    .map(|e| (i, e.name().to_string()))
                    .map_err(|e| OsrcError::zip(format!("reading entry {}", i), e))
            })
            .collect::<OsrcResult<_>>()?;
        if self.reproducible {
            names.sort_by(|a, b| a.1.cmp(&b.1));
        }

        for (index, name) in names {
            if name == MANIFEST_NAME || name == INDEX_LIST_NAME {
                continue;
            }
            let target = transform_name(layout, &name);
            if name.ends_with('/') {
                writer.write_directory(&target)?;
                continue;
            }
            let mut entry = source
                .by_index(index)
                .map_err(|e| OsrcError::zip(format!("reading {}", name), e))?;
            recorder.write_reader(writer, &target, &mut entry, false)?;
        }
        Ok(())
    }
}

/// Name an original entry is written under
fn transform_name(layout: Layout, name: &str) -> String {
    match layout.repackaged_classes_location() {
        Some(location) if is_transformable(layout, name) => format!("{}{}", location, name),
        _ => name.to_string(),
    }
}

fn is_transformable(layout: Layout, name: &str) -> bool {
    if name.starts_with("META-INF/") {
        return name == "META-INF/aop.xml" || name.ends_with(".kotlin_module");
    }
    !name.starts_with(layout.reserved_directory()) && name != MODULE_INFO_NAME
}

/// Writes entries and records each one in the layers index
struct EntryRecorder<'a> {
    rules: Option<&'a LayerRules>,
    index: Option<&'a mut LayersIndex>,
    registry: &'a LibraryRegistry,
    entries: usize,
}

impl EntryRecorder<'_> {
    fn write_bytes<W: Write + Seek>(
        &mut self,
        writer: &mut ArchiveWriter<W>,
        name: &str,
        content: &[u8],
    ) -> OsrcResult<bool> {
        let written = writer.write_bytes(name, content)?;
        self.record(name, written)?;
        Ok(written)
    }

    fn write_reader<W: Write + Seek>(
        &mut self,
        writer: &mut ArchiveWriter<W>,
        name: &str,
        content: &mut impl Read,
        stored: bool,
    ) -> OsrcResult<bool> {
        let written = writer.write_reader(name, content, stored)?;
        self.record(name, written)?;
        Ok(written)
    }

    fn record(&mut self, name: &str, written: bool) -> OsrcResult<()> {
        if !written {
            return Ok(());
        }
        self.entries += 1;
        if let (Some(rules), Some(index)) = (self.rules, self.index.as_deref_mut()) {
            let layer = match self.registry.lookup(name) {
                Some(library) => rules.layer_for_library(library)?,
                None => rules.layer_for_entry(name)?,
            };
            index.add(layer, name);
        }
        Ok(())
    }
}

fn open_archive(path: &Path) -> OsrcResult<ZipArchive<BufReader<File>>> {
    let file =
        File::open(path).map_err(|e| OsrcError::io(format!("opening {}", path.display()), e))?;
    ZipArchive::new(BufReader::new(file))
        .map_err(|e| OsrcError::zip(format!("reading {}", path.display()), e))
}

/// Stage an expanded directory as an in-memory archive, entries in walk order
fn archive_directory(root: &Path) -> OsrcResult<Vec<u8>> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(CompressionMethod::Stored);
    let context = || format!("staging {}", root.display());
    for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| OsrcError::io(context(), e.into()))?;
        let name = entry
            .path()
            .strip_prefix(root)
            .unwrap_or(entry.path())
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");
        if entry.file_type().is_dir() {
            writer
                .add_directory(format!("{}/", name), options)
                .map_err(|e| OsrcError::zip(context(), e))?;
            continue;
        }
        writer
            .start_file(name, options)
            .map_err(|e| OsrcError::zip(context(), e))?;
        let mut file = File::open(entry.path())
            .map_err(|e| OsrcError::io(format!("opening {}", entry.path().display()), e))?;
        io::copy(&mut file, &mut writer)
            .map_err(|e| OsrcError::io(format!("reading {}", entry.path().display()), e))?;
    }
    let staged = writer.finish().map_err(|e| OsrcError::zip(context(), e))?;
    Ok(staged.into_inner())
}

/// Repackages a source archive in place or to a destination
pub struct Repackager {
    packager: Packager,
    backup: bool,
}

impl Repackager {
    pub fn new(packager: Packager) -> Self {
        Self {
            packager,
            backup: true,
        }
    }

    /// Keep a `<source>.original` copy when repackaging in place
    pub fn with_backup(mut self, backup: bool) -> Self {
        self.backup = backup;
        self
    }

    /// Repackage to `destination`, or over the source when `None`.
    ///
    /// Returns `None` when the source is already an executable archive.
    pub fn repackage(
        &self,
        destination: Option<&Path>,
        libraries: Vec<Library>,
    ) -> OsrcResult<Option<PackageReport>> {
        let source = self.packager.source();
        if source.is_dir() && destination.is_none() {
            return Err(OsrcError::User(format!(
                "{} is a directory, a destination archive is required",
                source.display()
            )));
        }
        let destination = destination.unwrap_or(source).to_path_buf();
        if is_already_packaged(source)? {
            info!("{} is already repackaged, skipping", source.display());
            return Ok(None);
        }

        if self.backup && destination == source {
            let backup = backup_path(source);
            fs::copy(source, &backup)
                .map_err(|e| OsrcError::io(format!("backing up to {}", backup.display()), e))?;
            debug!("Backed up original archive to {}", backup.display());
        }

        let package_name = destination
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let parent = destination
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        fs::create_dir_all(parent)
            .map_err(|e| OsrcError::io(format!("creating {}", parent.display()), e))?;
        let temp = parent.join(format!(
            ".{}.{}.tmp",
            package_name,
            uuid::Uuid::new_v4().simple()
        ));
        let file = File::create(&temp)
            .map_err(|e| OsrcError::io(format!("creating {}", temp.display()), e))?;

        let (out, mut report) = self
            .packager
            .write(libraries, &package_name, BufWriter::new(file))?;
        out.into_inner()
            .map_err(|e| OsrcError::io(format!("flushing {}", temp.display()), e.into_error()))?
            .sync_all()
            .map_err(|e| OsrcError::io(format!("syncing {}", temp.display()), e))?;
        fs::rename(&temp, &destination)
            .map_err(|e| OsrcError::io(format!("renaming to {}", destination.display()), e))?;

        report.destination = destination;
        Ok(Some(report))
    }
}

/// `<source>.original`
pub fn backup_path(source: &Path) -> PathBuf {
    let mut name = source.as_os_str().to_os_string();
    name.push(".original");
    PathBuf::from(name)
}

/// Whether the archive manifest already carries the boot version marker
pub fn is_already_packaged(path: &Path) -> OsrcResult<bool> {
    let manifest = if path.is_dir() {
        let location = path.join(MANIFEST_NAME);
        if !location.is_file() {
            return Ok(false);
        }
        let content = fs::read_to_string(&location)
            .map_err(|e| OsrcError::io(format!("reading {}", location.display()), e))?;
        Some(Manifest::parse(&content)?)
    } else {
        Manifest::read_from(&mut open_archive(path)?)?
    };
    Ok(manifest
        .map(|m| m.get(manifest::BOOT_VERSION).is_some())
        .unwrap_or(false))
}
