//! Rule-based layer classification
//!
//! Application content is matched on entry paths, dependency content on
//! library metadata. Rules are evaluated in declaration order and the first
//! match wins. Every archive needs a catch-all rule; an entry nothing
//! selects aborts packaging.

use crate::config::schema::{ApplicationRuleConfig, LayersConfig, LibraryRuleConfig};
use crate::error::{OsrcError, OsrcResult};
use crate::library::{Library, LibraryScope};
use std::fmt;

/// Layer holding loader classes in the standard layering
pub const LOADER_LAYER: &str = "osrc-boot-loader";

/// A named partition of archive contents
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Layer(String);

impl Layer {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Path predicate: an exact entry name, or a directory prefix ending in `/`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentSelector {
    Exact(String),
    Prefix(String),
}

impl ContentSelector {
    pub fn parse(value: &str) -> Self {
        if value.ends_with('/') {
            Self::Prefix(value.to_string())
        } else {
            Self::Exact(value.to_string())
        }
    }

    pub fn matches(&self, name: &str) -> bool {
        match self {
            Self::Exact(exact) => name == exact,
            Self::Prefix(prefix) => name.starts_with(prefix.as_str()),
        }
    }
}

/// Predicate over library metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LibraryMatcher {
    Any,
    Local,
    Snapshot,
    Scope(LibraryScope),
    /// `group:artifact[:version]` where any segment may be `*` or end in `*`
    Coordinates(String),
}

impl LibraryMatcher {
    pub fn parse(value: &str) -> OsrcResult<Self> {
        match value {
            "*" => Ok(Self::Any),
            "local" => Ok(Self::Local),
            "snapshot" => Ok(Self::Snapshot),
            _ => match value.strip_prefix("scope:") {
                Some(scope) => Ok(Self::Scope(scope.parse()?)),
                None if value.contains(':') => Ok(Self::Coordinates(value.to_string())),
                None => Err(OsrcError::User(format!(
                    "Invalid library selector '{}': expected *, local, snapshot, scope:<scope> or group:artifact[:version]",
                    value
                ))),
            },
        }
    }

    pub fn matches(&self, library: &Library) -> bool {
        match self {
            Self::Any => true,
            Self::Local => library.local,
            Self::Snapshot => library.is_snapshot(),
            Self::Scope(scope) => library.scope == *scope,
            Self::Coordinates(pattern) => {
                let Some(coords) = &library.coordinates else {
                    return false;
                };
                let mut segments = pattern.split(':');
                let group = segments.next().unwrap_or("*");
                let artifact = segments.next().unwrap_or("*");
                let version = segments.next().unwrap_or("*");
                segment_matches(group, coords.group_id.as_deref().unwrap_or(""))
                    && segment_matches(artifact, &coords.artifact_id)
                    && segment_matches(version, coords.version.as_deref().unwrap_or(""))
            }
        }
    }
}

fn segment_matches(pattern: &str, value: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => value.starts_with(prefix),
        None => pattern == value,
    }
}

/// Assigns application entries to a layer
#[derive(Debug, Clone)]
pub struct ApplicationRule {
    pub layer: Layer,
    /// Empty means everything is included
    pub includes: Vec<ContentSelector>,
    pub excludes: Vec<ContentSelector>,
}

impl ApplicationRule {
    pub fn matches(&self, name: &str) -> bool {
        let included = self.includes.is_empty() || self.includes.iter().any(|s| s.matches(name));
        included && !self.excludes.iter().any(|s| s.matches(name))
    }
}

/// Assigns libraries to a layer
#[derive(Debug, Clone)]
pub struct LibraryRule {
    pub layer: Layer,
    /// Empty means every library is included
    pub includes: Vec<LibraryMatcher>,
    pub excludes: Vec<LibraryMatcher>,
}

impl LibraryRule {
    pub fn matches(&self, library: &Library) -> bool {
        let included =
            self.includes.is_empty() || self.includes.iter().any(|m| m.matches(library));
        included && !self.excludes.iter().any(|m| m.matches(library))
    }
}

/// Ordered layer definitions plus the rules that select them
#[derive(Debug, Clone)]
pub struct LayerRules {
    order: Vec<Layer>,
    application: Vec<ApplicationRule>,
    dependencies: Vec<LibraryRule>,
}

impl LayerRules {
    /// Build rules, checking every rule names a declared layer
    pub fn new(
        order: Vec<Layer>,
        application: Vec<ApplicationRule>,
        dependencies: Vec<LibraryRule>,
    ) -> OsrcResult<Self> {
        let undeclared = application
            .iter()
            .map(|r| &r.layer)
            .chain(dependencies.iter().map(|r| &r.layer))
            .find(|layer| !order.contains(layer));
        if let Some(layer) = undeclared {
            return Err(OsrcError::User(format!(
                "Layer '{}' is used by a rule but missing from the layer order",
                layer
            )));
        }
        Ok(Self {
            order,
            application,
            dependencies,
        })
    }

    /// `dependencies`, `osrc-boot-loader`, `snapshot-dependencies`, `application`
    pub fn standard() -> Self {
        let dependencies = Layer::new("dependencies");
        let loader = Layer::new(LOADER_LAYER);
        let snapshots = Layer::new("snapshot-dependencies");
        let application = Layer::new("application");
        Self {
            order: vec![
                dependencies.clone(),
                loader.clone(),
                snapshots.clone(),
                application.clone(),
            ],
            application: vec![
                ApplicationRule {
                    layer: loader,
                    includes: vec![
                        ContentSelector::parse("com/maplecloudy/osrc/boot/loader/"),
                        ContentSelector::parse("org/springframework/boot/loader/"),
                    ],
                    excludes: vec![],
                },
                ApplicationRule {
                    layer: application.clone(),
                    includes: vec![],
                    excludes: vec![],
                },
            ],
            dependencies: vec![
                LibraryRule {
                    layer: application,
                    includes: vec![LibraryMatcher::Local],
                    excludes: vec![],
                },
                LibraryRule {
                    layer: snapshots,
                    includes: vec![LibraryMatcher::Snapshot],
                    excludes: vec![],
                },
                LibraryRule {
                    layer: dependencies,
                    includes: vec![],
                    excludes: vec![],
                },
            ],
        }
    }

    /// Rules from configuration, or the standard layering when none are set
    pub fn from_config(config: &LayersConfig) -> OsrcResult<Self> {
        if config.application.is_empty() && config.dependencies.is_empty() {
            return Ok(Self::standard());
        }

        let application = config
            .application
            .iter()
            .map(application_rule)
            .collect::<Vec<_>>();
        let dependencies = config
            .dependencies
            .iter()
            .map(library_rule)
            .collect::<OsrcResult<Vec<_>>>()?;

        let order = if config.order.is_empty() {
            let mut order: Vec<Layer> = Vec::new();
            for layer in application
                .iter()
                .map(|r| &r.layer)
                .chain(dependencies.iter().map(|r| &r.layer))
            {
                if !order.contains(layer) {
                    order.push(layer.clone());
                }
            }
            order
        } else {
            config.order.iter().map(Layer::new).collect()
        };

        Self::new(order, application, dependencies)
    }

    /// Layers in declaration order
    pub fn iter(&self) -> impl Iterator<Item = &Layer> {
        self.order.iter()
    }

    /// Layer for an application entry name
    pub fn layer_for_entry(&self, name: &str) -> OsrcResult<&Layer> {
        self.application
            .iter()
            .find(|rule| rule.matches(name))
            .map(|rule| &rule.layer)
            .ok_or_else(|| OsrcError::UnmatchedLayer {
                kind: "entry",
                name: name.to_string(),
            })
    }

    /// Layer for a library
    pub fn layer_for_library(&self, library: &Library) -> OsrcResult<&Layer> {
        self.dependencies
            .iter()
            .find(|rule| rule.matches(library))
            .map(|rule| &rule.layer)
            .ok_or_else(|| OsrcError::UnmatchedLayer {
                kind: "library",
                name: library.name.clone(),
            })
    }

    /// Classify a batch of entry names, failing on the first unmatched one
    pub fn classify<'a, I>(&self, names: I) -> OsrcResult<Vec<(&'a str, Layer)>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        names
            .into_iter()
            .map(|name| Ok((name, self.layer_for_entry(name)?.clone())))
            .collect()
    }
}

fn application_rule(config: &ApplicationRuleConfig) -> ApplicationRule {
    ApplicationRule {
        layer: Layer::new(&config.layer),
        includes: config.includes.iter().map(|s| ContentSelector::parse(s)).collect(),
        excludes: config.excludes.iter().map(|s| ContentSelector::parse(s)).collect(),
    }
}

fn library_rule(config: &LibraryRuleConfig) -> OsrcResult<LibraryRule> {
    Ok(LibraryRule {
        layer: Layer::new(&config.layer),
        includes: config
            .includes
            .iter()
            .map(|s| LibraryMatcher::parse(s))
            .collect::<OsrcResult<_>>()?,
        excludes: config
            .excludes
            .iter()
            .map(|s| LibraryMatcher::parse(s))
            .collect::<OsrcResult<_>>()?,
    })
}
