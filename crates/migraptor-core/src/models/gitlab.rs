//! GitLab resource types.

use serde::{Deserialize, Serialize};

/// A GitLab group (namespace node).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: u64,
    pub path: String,
    pub full_path: String,
    #[serde(default)]
    pub parent_id: Option<u64>,
}

/// A GitLab project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: u64,
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub path_with_namespace: String,
    #[serde(default)]
    pub container_registry_enabled: bool,
    #[serde(default)]
    pub archived: bool,
    /// Repositories whose images are backed up and which may now be deleted.
    #[serde(skip)]
    pub registry_repository_ids: Vec<u64>,
}

impl Project {
    /// Full path of the namespace the project currently lives in.
    pub fn namespace_path(&self) -> &str {
        self.path_with_namespace
            .rsplit_once('/')
            .map(|(namespace, _)| namespace)
            .unwrap_or("")
    }
}

/// A container registry repository owned by a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryRepository {
    pub id: u64,
    pub path: String,
    #[serde(default)]
    pub location: Option<String>,
}

/// A tag within a registry repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryTag {
    pub name: String,
    pub path: String,
    pub location: String,
}

/// The authenticated GitLab user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub username: String,
}
