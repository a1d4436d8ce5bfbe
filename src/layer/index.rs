//! Layers index file
//!
//! ```text
//! - "dependencies":
//!   - "BOOT-INF/lib/"
//! - "application":
//!   - "BOOT-INF/classes/"
//!   - "META-INF/MANIFEST.MF"
//! ```
//!
//! Entries are folded into directory prefixes whenever everything below a
//! directory landed in the same layer.

use crate::error::{OsrcError, OsrcResult};
use crate::layer::Layer;
use std::collections::BTreeMap;
use std::io::{self, Write};

#[derive(Debug, Default)]
struct Node {
    name: String,
    layers: Vec<Layer>,
    children: Vec<Node>,
}

impl Node {
    fn update_or_add(&mut self, segment: &str, is_directory: bool, layer: &Layer) -> &mut Node {
        let node_name = if is_directory {
            format!("{}/", segment)
        } else {
            segment.to_string()
        };
        let position = match self.children.iter().position(|c| c.name == node_name) {
            Some(position) => position,
            None => {
                self.children.push(Node {
                    name: node_name,
                    layers: Vec::new(),
                    children: Vec::new(),
                });
                self.children.len() - 1
            }
        };
        let child = &mut self.children[position];
        if !child.layers.contains(layer) {
            child.layers.push(layer.clone());
        }
        child
    }

    fn build_index(&self, path: &str, index: &mut BTreeMap<Layer, Vec<String>>) {
        let name = format!("{}{}", path, self.name);
        if let [layer] = self.layers.as_slice() {
            index.entry(layer.clone()).or_default().push(name);
        } else {
            for child in &self.children {
                child.build_index(&name, index);
            }
        }
    }
}

/// Index built while entries are written
#[derive(Debug)]
pub struct LayersIndex {
    layers: Vec<Layer>,
    root: Node,
}

impl LayersIndex {
    pub fn new(layers: impl IntoIterator<Item = Layer>) -> Self {
        Self {
            layers: layers.into_iter().collect(),
            root: Node::default(),
        }
    }

    /// Record that `name` belongs to `layer`
    pub fn add(&mut self, layer: &Layer, name: &str) {
        let segments: Vec<&str> = name.split('/').filter(|s| !s.is_empty()).collect();
        let mut node = &mut self.root;
        for (i, segment) in segments.iter().enumerate() {
            let is_directory = i < segments.len() - 1 || name.ends_with('/');
            node = node.update_or_add(segment, is_directory, layer);
        }
    }

    /// Layer to sorted entries, in layer order. Layers without content are kept.
    pub fn entries(&self) -> Vec<(Layer, Vec<String>)> {
        let mut index = BTreeMap::new();
        self.root.build_index("", &mut index);
        self.layers
            .iter()
            .map(|layer| {
                let mut names = index.remove(layer).unwrap_or_default();
                names.sort();
                (layer.clone(), names)
            })
            .collect()
    }

    pub fn write_to(&self, out: &mut impl Write) -> io::Result<()> {
        for (layer, names) in self.entries() {
            writeln!(out, "- \"{}\":", layer)?;
            for name in names {
                writeln!(out, "  - \"{}\"", name)?;
            }
        }
        Ok(())
    }

    pub fn to_index_string(&self) -> String {
        let mut buffer = Vec::new();
        // Writing into a Vec cannot fail
        let _ = self.write_to(&mut buffer);
        String::from_utf8_lossy(&buffer).into_owned()
    }
}

/// Layers read back from an index file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedLayers {
    layers: Vec<(String, Vec<String>)>,
}

impl IndexedLayers {
    pub fn parse(index_file: &str) -> OsrcResult<Self> {
        let mut layers: Vec<(String, Vec<String>)> = Vec::new();
        for line in index_file.split('\n').map(|l| l.trim_end_matches('\r')) {
            if line.trim().is_empty() {
                continue;
            }
            if let Some(content) = line
                .strip_prefix("  - \"")
                .and_then(|rest| rest.strip_suffix('"'))
            {
                match layers.last_mut() {
                    Some((_, contents)) => contents.push(content.to_string()),
                    None => return Err(OsrcError::LayerIndexMalformed(line.to_string())),
                }
            } else if let Some(name) = line
                .strip_prefix("- \"")
                .and_then(|rest| rest.strip_suffix("\":"))
            {
                layers.push((name.to_string(), Vec::new()));
            } else {
                return Err(OsrcError::LayerIndexMalformed(line.to_string()));
            }
        }
        if layers.is_empty() {
            return Err(OsrcError::LayerIndexEmpty);
        }
        Ok(Self { layers })
    }

    /// Layer names in index order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.layers.iter().map(|(name, _)| name.as_str())
    }

    pub fn entries(&self) -> &[(String, Vec<String>)] {
        &self.layers
    }

    /// Layer an archive entry belongs to
    pub fn layer_for(&self, name: &str) -> OsrcResult<&str> {
        self.layers
            .iter()
            .find(|(_, candidates)| {
                candidates
                    .iter()
                    .any(|c| c == name || (c.ends_with('/') && name.starts_with(c.as_str())))
            })
            .map(|(layer, _)| layer.as_str())
            .ok_or_else(|| OsrcError::LayerNotIndexed(name.to_string()))
    }
}
