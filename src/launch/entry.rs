//! Entry point selection from manifest-declared services and tasks

use crate::error::{OsrcError, OsrcResult};
use crate::package::manifest::{Manifest, SERVICE_CLASS, TASK_CLASS};
use crate::package::pod::MAIN_OVERRIDE_ARG;

/// The class to run and the arguments forwarded to it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntrySelection {
    pub main_class: String,
    pub args: Vec<String>,
}

/// Entries an archive declares
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeclaredEntries {
    pub service: Option<String>,
    pub tasks: Vec<String>,
}

impl DeclaredEntries {
    pub fn from_manifest(manifest: &Manifest) -> Self {
        Self {
            service: manifest
                .get(SERVICE_CLASS)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from),
            tasks: manifest
                .get(TASK_CLASS)
                .map(|t| {
                    t.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.service.is_none() && self.tasks.is_empty()
    }

    fn contains(&self, name: &str) -> bool {
        self.service.as_deref() == Some(name) || self.tasks.iter().any(|t| t == name)
    }

    fn available(&self) -> String {
        let mut text = String::new();
        if let Some(service) = &self.service {
            text.push_str(&format!("  the available service is {}.\n", service));
        }
        if !self.tasks.is_empty() {
            text.push_str(&format!("  the available task is {}.", self.tasks.join(",")));
        }
        text
    }
}

/// Pick the entry point for `archive_name`.
///
/// `--osrc.main=<class>` must name a declared service or task and is removed
/// from the forwarded arguments. Without it the service runs; an archive
/// that only declares tasks cannot start without a selection.
pub fn select_entry(
    archive_name: &str,
    manifest: Option<&Manifest>,
    args: &[String],
) -> OsrcResult<EntrySelection> {
    let declared = manifest.map(DeclaredEntries::from_manifest).unwrap_or_default();
    if declared.is_empty() {
        return Err(OsrcError::LaunchSelection(format!(
            "No 'Service-Class' and 'Task-Class' manifest entry specified in {}",
            archive_name
        )));
    }

    let override_position = args.iter().position(|a| a.starts_with(MAIN_OVERRIDE_ARG));
    match override_position {
        Some(position) => {
            let requested = args[position][MAIN_OVERRIDE_ARG.len()..].trim();
            if requested.is_empty() {
                return Err(OsrcError::LaunchSelection(
                    "Error:\n  the osrc.main can not be null!".to_string(),
                ));
            }
            if !declared.contains(requested) {
                return Err(OsrcError::LaunchSelection(format!(
                    "Error:\n  the osrc.main {} is not exists! \n{}",
                    requested,
                    declared.available()
                )));
            }
            let forwarded = args
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != position)
                .map(|(_, a)| a.clone())
                .collect();
            Ok(EntrySelection {
                main_class: requested.to_string(),
                args: forwarded,
            })
        }
        None => match declared.service {
            Some(service) => Ok(EntrySelection {
                main_class: service,
                args: args.to_vec(),
            }),
            None => Err(OsrcError::LaunchSelection(format!(
                "  the available task is {}.",
                declared.tasks.join(",")
            ))),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest(service: Option<&str>, tasks: Option<&str>) -> Manifest {
        let mut manifest = Manifest::new();
        if let Some(service) = service {
            manifest.set(SERVICE_CLASS, service);
        }
        if let Some(tasks) = tasks {
            manifest.set(TASK_CLASS, tasks);
        }
        manifest
    }

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn override_selects_task_and_is_stripped() {
        let m = manifest(Some("S"), Some("T1,T2"));
        let selection =
            select_entry("app.jar", Some(&m), &args(&["a", "--osrc.main=T1", "b"])).unwrap();
        assert_eq!(selection.main_class, "T1");
        assert_eq!(selection.args, args(&["a", "b"]));
    }

    #[test]
    fn unknown_override_lists_choices() {
        let m = manifest(Some("S"), Some("T1,T2"));
        let err = select_entry("app.jar", Some(&m), &args(&["--osrc.main=X"])).unwrap_err();
        assert_eq!(err.exit_code(), -1);
        let text = err.to_string();
        assert!(text.contains("X is not exists"));
        assert!(text.contains("the available service is S."));
        assert!(text.contains("the available task is T1,T2."));
    }

    #[test]
    fn empty_override_is_rejected() {
        let m = manifest(Some("S"), None);
        let err = select_entry("app.jar", Some(&m), &args(&["--osrc.main="])).unwrap_err();
        assert!(err.to_string().contains("can not be null"));
    }

    #[test]
    fn tasks_only_without_override_fails() {
        let m = manifest(None, Some("T1,T2"));
        let err = select_entry("app.jar", Some(&m), &[]).unwrap_err();
        assert!(matches!(err, OsrcError::LaunchSelection(_)));
        assert_eq!(err.to_string(), "  the available task is T1,T2.");
    }

    #[test]
    fn service_is_the_default() {
        let m = manifest(Some("S"), Some("T1,T2"));
        let selection = select_entry("app.jar", Some(&m), &args(&["x"])).unwrap();
        assert_eq!(selection.main_class, "S");
        assert_eq!(selection.args, args(&["x"]));
    }

    #[test]
    fn no_declared_entries_fails() {
        let err = select_entry("app.jar", None, &[]).unwrap_err();
        assert!(err.to_string().contains("app.jar"));
        let err = select_entry("app.jar", Some(&Manifest::new()), &[]).unwrap_err();
        assert_eq!(err.exit_code(), -1);
    }
}
