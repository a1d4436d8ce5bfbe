//! Service and task entries derived from main classes

use crate::error::{OsrcError, OsrcResult};
use crate::scan::MainClass;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Launcher argument selecting a task entry
pub const MAIN_OVERRIDE_ARG: &str = "--osrc.main=";

const JAVA_COMMAND: &str = "$JAVA_HOME/bin/java $JVM_OPS -jar";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PodRole {
    Service,
    Task,
}

impl fmt::Display for PodRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Service => write!(f, "service"),
            Self::Task => write!(f, "task"),
        }
    }
}

/// A runnable unit of the packaged application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodEntry {
    /// Command line template used to start the entry
    pub cmd: String,
    pub role: PodRole,
    /// Originating main class
    pub entry: String,
}

/// Annotation marking a main class for a role
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryMarker {
    pub annotation: String,
    pub role: PodRole,
    /// Application sub-type recorded when this marker selects the service
    pub sub_type: Option<String>,
}

impl EntryMarker {
    pub fn new(annotation: impl Into<String>, role: PodRole) -> Self {
        Self {
            annotation: annotation.into(),
            role,
            sub_type: None,
        }
    }

    pub fn with_sub_type(mut self, sub_type: impl Into<String>) -> Self {
        self.sub_type = Some(sub_type.into());
        self
    }
}

/// Pod entries plus the application sub-type
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PodPlan {
    pub entries: Vec<PodEntry>,
    pub sub_type: Option<String>,
}

impl PodPlan {
    pub fn service(&self) -> Option<&PodEntry> {
        self.entries.iter().find(|e| e.role == PodRole::Service)
    }

    pub fn tasks(&self) -> impl Iterator<Item = &PodEntry> {
        self.entries.iter().filter(|e| e.role == PodRole::Task)
    }
}

/// Assigns roles to selected main classes
#[derive(Debug, Clone)]
pub struct PodClassifier {
    markers: Vec<EntryMarker>,
}

impl Default for PodClassifier {
    fn default() -> Self {
        Self::standard()
    }
}

impl PodClassifier {
    pub fn new(markers: Vec<EntryMarker>) -> Self {
        Self { markers }
    }

    pub fn standard() -> Self {
        Self::new(vec![
            EntryMarker::new(
                "org.springframework.boot.autoconfigure.SpringBootApplication",
                PodRole::Service,
            )
            .with_sub_type("spring-boot-application"),
            EntryMarker::new("com.maplecloudy.osrt.app.annotation.Service", PodRole::Service),
            EntryMarker::new("com.maplecloudy.osrt.app.annotation.Task", PodRole::Task),
        ])
    }

    /// Markers from configured annotation names, falling back to the standard set
    pub fn from_names(service: &[String], task: &[String]) -> Self {
        if service.is_empty() && task.is_empty() {
            return Self::standard();
        }
        let markers = service
            .iter()
            .map(|a| EntryMarker::new(a, PodRole::Service))
            .chain(task.iter().map(|a| EntryMarker::new(a, PodRole::Task)))
            .collect();
        Self::new(markers)
    }

    /// Annotation names the scanner should prefer
    pub fn marker_names(&self) -> Vec<String> {
        self.markers.iter().map(|m| m.annotation.clone()).collect()
    }

    /// Build pod entries for `classes`, launched from `package_name`.
    ///
    /// A class takes the role of the first marker it carries. A class with
    /// no marker only occurs as the sole candidate and becomes the service.
    /// More than one service is rejected.
    pub fn classify(&self, classes: &[MainClass], package_name: &str) -> OsrcResult<PodPlan> {
        let mut plan = PodPlan::default();
        let mut service: Option<&str> = None;

        for class in classes {
            let marker = self
                .markers
                .iter()
                .find(|m| class.annotation_names.contains(&m.annotation));
            let role = marker.map(|m| m.role).unwrap_or(PodRole::Service);

            if role == PodRole::Service {
                if let Some(existing) = service {
                    return Err(OsrcError::MultipleServices {
                        existing: existing.to_string(),
                        duplicate: class.name.clone(),
                    });
                }
                service = Some(class.name.as_str());
                plan.sub_type = marker.and_then(|m| m.sub_type.clone());
            }

            debug!("Main class {} runs as {}", class.name, role);
            plan.entries.push(PodEntry {
                cmd: command_for(role, &class.name, package_name),
                role,
                entry: class.name.clone(),
            });
        }
        Ok(plan)
    }
}

fn command_for(role: PodRole, class_name: &str, package_name: &str) -> String {
    match role {
        PodRole::Service => format!("{} {}", JAVA_COMMAND, package_name),
        PodRole::Task => format!(
            "{} {} {}{}",
            JAVA_COMMAND, package_name, MAIN_OVERRIDE_ARG, class_name
        ),
    }
}
