//! Application descriptor embedded at `META-INF/osrc/app.json`

use crate::package::pod::{PodEntry, PodPlan};
use serde::{Deserialize, Serialize};

pub const APP_DESCRIPTOR_NAME: &str = "META-INF/osrc/app.json";

/// Project metadata supplied by the caller
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectInfo {
    pub name: String,
    pub description: Option<String>,
    pub group: Option<String>,
    pub artifact: String,
    pub version: String,
    pub classifier: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bundle {
    pub group: Option<String>,
    pub artifact: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classifier: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageFile {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppDescriptor {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub version: String,
    pub bundle: Bundle,
    pub package: PackageFile,
    pub app_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_type: Option<String>,
    pub pods: Vec<PodEntry>,
}

impl AppDescriptor {
    pub fn new(project: &ProjectInfo, package_name: &str, plan: &PodPlan) -> Self {
        Self {
            name: project.name.clone(),
            description: project.description.clone(),
            version: project.version.clone(),
            bundle: Bundle {
                group: project.group.clone(),
                artifact: project.artifact.clone(),
                classifier: project.classifier.clone(),
            },
            package: PackageFile {
                name: package_name.to_string(),
                kind: "file".to_string(),
            },
            app_type: "runnable".to_string(),
            sub_type: plan.sub_type.clone(),
            pods: plan.entries.clone(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::pod::PodRole;

    #[test]
    fn descriptor_json_shape() {
        let project = ProjectInfo {
            name: "demo".to_string(),
            artifact: "demo".to_string(),
            version: "1.0".to_string(),
            group: Some("com.acme".to_string()),
            ..Default::default()
        };
        let plan = PodPlan {
            entries: vec![PodEntry {
                cmd: "java".to_string(),
                role: PodRole::Service,
                entry: "a.A".to_string(),
            }],
            sub_type: Some("spring-boot-application".to_string()),
        };
        let descriptor = AppDescriptor::new(&project, "demo-1.0.jar", &plan);
        let value: serde_json::Value = serde_json::from_slice(&descriptor.to_json().unwrap()).unwrap();
        assert_eq!(value["appType"], "runnable");
        assert_eq!(value["subType"], "spring-boot-application");
        assert_eq!(value["package"]["type"], "file");
        assert_eq!(value["pods"][0]["role"], "SERVICE");
        assert!(value.get("description").is_none());
    }
}
