use serde::{Deserialize, Serialize};

/// Reference to another entity, as embedded in CloudAPI payloads.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRef {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
}

impl EntityRef {
    pub fn id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
        }
    }
}

/// One page of a CloudAPI collection.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    #[serde(default)]
    pub result_total: u64,
    #[serde(default)]
    pub page_count: u64,
    #[serde(default)]
    pub page: u64,
    #[serde(default = "Vec::new")]
    pub values: Vec<T>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Org {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "enabled")]
    pub is_enabled: bool,
    #[serde(default)]
    pub is_classic_tenant: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub managed_by: Option<EntityRef>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default)]
    pub role_entity_refs: Vec<EntityRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org_entity_ref: Option<EntityRef>,
    #[serde(default)]
    pub provider_type: String,
    #[serde(default = "enabled")]
    pub enabled: bool,
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub bundle_key: String,
    #[serde(default)]
    pub read_only: bool,
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Region {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub nsx_manager: Option<EntityRef>,
    #[serde(default)]
    pub supervisors: Vec<EntityRef>,
    #[serde(default)]
    pub storage_policies: Vec<String>,
    #[serde(default)]
    pub is_enabled: bool,
    #[serde(default)]
    pub status: String,
}

/// Reply of `GET /api/versions`.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportedVersions {
    #[serde(default)]
    pub version_info: Vec<VersionInfo>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionInfo {
    pub version: String,
    #[serde(default)]
    pub deprecated: bool,
}

/// Long running operation, as referenced by the `Location` header of a `202` reply.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(default)]
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub owner: Option<EntityRef>,
    #[serde(default)]
    pub error: Option<TaskError>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskError {
    #[serde(default)]
    pub message: String,
}

impl Task {
    pub fn is_finished(&self) -> bool {
        matches!(self.status.as_str(), "success" | "error" | "aborted")
    }

    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

fn enabled() -> bool {
    true
}
