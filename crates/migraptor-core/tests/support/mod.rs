//! In-memory doubles for the GitLab platform and the container engine.
//!
//! Both record every call in a journal so tests can assert on ordering and
//! on the absence of mutations.

#![allow(dead_code)]

use async_trait::async_trait;
use migraptor_core::{
    ContainerEngine, Group, MigraptorError, MigrationSettings, MigrationTimings, Project,
    RegistryRepository, RegistryTag, Result, SourceControl, User,
};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

pub const REGISTRY: &str = "registry.example.com";

/// Journal shared by both doubles, for ordering across collaborators.
pub type Timeline = Arc<Mutex<Vec<String>>>;

pub fn first_index(timeline: &Timeline, prefix: &str) -> Option<usize> {
    timeline.lock().unwrap().iter().position(|e| e.starts_with(prefix))
}

pub fn last_index(timeline: &Timeline, prefix: &str) -> Option<usize> {
    timeline.lock().unwrap().iter().rposition(|e| e.starts_with(prefix))
}

/// Settings with every pause removed.
pub fn settings(source: &str, destination: &str) -> MigrationSettings {
    MigrationSettings::new(source, destination).with_timings(MigrationTimings::immediate())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    CurrentUser,
    SearchGroup(String),
    ListSubgroups(u64),
    ListProjects(u64),
    CreateGroup(String, u64),
    TransferGroup(u64, u64),
    TransferProject(u64, u64),
    Archive(u64),
    Unarchive(u64),
    ListRepositories(u64),
    ListTags(u64, u64),
    DeleteRepository(u64, u64),
    DeleteTag(u64, u64, String),
}

impl Call {
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Call::CreateGroup(..)
                | Call::TransferGroup(..)
                | Call::TransferProject(..)
                | Call::Archive(_)
                | Call::Unarchive(_)
                | Call::DeleteRepository(..)
                | Call::DeleteTag(..)
        )
    }
}

#[derive(Default)]
struct PlatformState {
    groups: Vec<Group>,
    projects: HashMap<u64, Vec<Project>>,
    repositories: HashMap<u64, Vec<RegistryRepository>>,
    tags: HashMap<u64, Vec<RegistryTag>>,
    failing_groups: HashSet<u64>,
    failing_tag_listings: HashSet<u64>,
    failing_project_transfers: HashSet<u64>,
    failing_deletes: HashSet<u64>,
    keep_registries: bool,
    group_transfer_status: Option<u16>,
    archive_status: Option<u16>,
    unarchive_status: Option<u16>,
    next_group_id: u64,
    calls: Vec<Call>,
    timeline: Option<Timeline>,
}

/// A GitLab instance held in memory.
#[derive(Default)]
pub struct FakePlatform {
    state: Mutex<PlatformState>,
}

impl FakePlatform {
    pub fn new() -> Self {
        let platform = Self::default();
        platform.state.lock().unwrap().next_group_id = 1000;
        platform
    }

    pub fn with_timeline(self, timeline: Timeline) -> Self {
        self.state.lock().unwrap().timeline = Some(timeline);
        self
    }

    pub fn add_group(&self, id: u64, full_path: &str, parent_id: Option<u64>) -> Group {
        let group = Group {
            id,
            path: full_path.rsplit('/').next().unwrap().to_string(),
            full_path: full_path.to_string(),
            parent_id,
        };
        self.state.lock().unwrap().groups.push(group.clone());
        group
    }

    pub fn add_project(&self, group_id: u64, id: u64, path: &str, registry: bool, archived: bool) {
        let mut state = self.state.lock().unwrap();
        let namespace = state
            .groups
            .iter()
            .find(|g| g.id == group_id)
            .map(|g| g.full_path.clone())
            .unwrap();
        state.projects.entry(group_id).or_default().push(Project {
            id,
            name: path.to_uppercase(),
            path: path.to_string(),
            path_with_namespace: format!("{}/{}", namespace, path),
            container_registry_enabled: registry,
            archived,
            registry_repository_ids: Vec::new(),
        });
    }

    /// Add a repository at `repository_path` holding `tags`.
    pub fn add_repository(&self, project_id: u64, repository_id: u64, repository_path: &str, tags: &[&str]) {
        let mut state = self.state.lock().unwrap();
        state
            .repositories
            .entry(project_id)
            .or_default()
            .push(RegistryRepository {
                id: repository_id,
                path: repository_path.to_string(),
                location: Some(format!("{}/{}", REGISTRY, repository_path)),
            });
        state.tags.insert(
            repository_id,
            tags.iter()
                .map(|tag| RegistryTag {
                    name: tag.to_string(),
                    path: format!("{}:{}", repository_path, tag),
                    location: format!("{}/{}:{}", REGISTRY, repository_path, tag),
                })
                .collect(),
        );
    }

    pub fn fail_listing(&self, group_id: u64) {
        self.state.lock().unwrap().failing_groups.insert(group_id);
    }

    pub fn fail_tag_listing(&self, repository_id: u64) {
        self.state.lock().unwrap().failing_tag_listings.insert(repository_id);
    }

    pub fn fail_project_transfer(&self, project_id: u64) {
        self.state
            .lock()
            .unwrap()
            .failing_project_transfers
            .insert(project_id);
    }

    /// Deleting this repository answers 500 and leaves it in place.
    pub fn fail_delete(&self, repository_id: u64) {
        self.state.lock().unwrap().failing_deletes.insert(repository_id);
    }

    /// Deletions are accepted but repositories never disappear.
    pub fn keep_registries(&self) {
        self.state.lock().unwrap().keep_registries = true;
    }

    pub fn set_group_transfer_status(&self, status: u16) {
        self.state.lock().unwrap().group_transfer_status = Some(status);
    }

    pub fn set_archive_status(&self, status: u16) {
        self.state.lock().unwrap().archive_status = Some(status);
    }

    pub fn set_unarchive_status(&self, status: u16) {
        self.state.lock().unwrap().unarchive_status = Some(status);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn mutations(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_mutation).collect()
    }

    pub fn position(&self, call: &Call) -> Option<usize> {
        self.calls().iter().position(|c| c == call)
    }

    pub fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|c| predicate(c)).count()
    }

    fn record(&self, call: Call) {
        let mut state = self.state.lock().unwrap();
        if let Some(timeline) = &state.timeline {
            timeline.lock().unwrap().push(format!("{:?}", call));
        }
        state.calls.push(call);
    }
}

fn status_error(endpoint: String, status: u16) -> MigraptorError {
    MigraptorError::UnexpectedStatus { endpoint, status }
}

#[async_trait]
impl SourceControl for FakePlatform {
    async fn current_user(&self) -> Result<User> {
        self.record(Call::CurrentUser);
        Ok(User {
            id: 1,
            username: "root".into(),
        })
    }

    async fn search_group(&self, full_path: &str) -> Result<Option<Group>> {
        self.record(Call::SearchGroup(full_path.to_string()));
        let state = self.state.lock().unwrap();
        Ok(state.groups.iter().find(|g| g.full_path == full_path).cloned())
    }

    async fn list_subgroups(&self, group_id: u64) -> Result<Vec<Group>> {
        self.record(Call::ListSubgroups(group_id));
        let state = self.state.lock().unwrap();
        if state.failing_groups.contains(&group_id) {
            return Err(status_error(format!("/groups/{}/subgroups", group_id), 500));
        }
        Ok(state
            .groups
            .iter()
            .filter(|g| g.parent_id == Some(group_id))
            .cloned()
            .collect())
    }

    async fn list_projects(&self, group_id: u64) -> Result<Vec<Project>> {
        self.record(Call::ListProjects(group_id));
        let state = self.state.lock().unwrap();
        if state.failing_groups.contains(&group_id) {
            return Err(status_error(format!("/groups/{}/projects", group_id), 500));
        }
        Ok(state.projects.get(&group_id).cloned().unwrap_or_default())
    }

    async fn create_group(&self, name: &str, parent_id: u64) -> Result<Group> {
        self.record(Call::CreateGroup(name.to_string(), parent_id));
        let mut state = self.state.lock().unwrap();
        let parent = state
            .groups
            .iter()
            .find(|g| g.id == parent_id)
            .map(|g| g.full_path.clone())
            .ok_or_else(|| status_error("/groups".into(), 404))?;
        state.next_group_id += 1;
        let group = Group {
            id: state.next_group_id,
            path: name.to_string(),
            full_path: format!("{}/{}", parent, name),
            parent_id: Some(parent_id),
        };
        state.groups.push(group.clone());
        Ok(group)
    }

    async fn transfer_group(&self, group_id: u64, destination_id: u64) -> Result<u16> {
        self.record(Call::TransferGroup(group_id, destination_id));
        Ok(self.state.lock().unwrap().group_transfer_status.unwrap_or(201))
    }

    async fn transfer_project(&self, project_id: u64, destination_id: u64) -> Result<u16> {
        self.record(Call::TransferProject(project_id, destination_id));
        let state = self.state.lock().unwrap();
        if state.failing_project_transfers.contains(&project_id) {
            return Err(status_error(format!("/projects/{}/transfer", project_id), 400));
        }
        Ok(200)
    }

    async fn archive_project(&self, project_id: u64) -> Result<u16> {
        self.record(Call::Archive(project_id));
        Ok(self.state.lock().unwrap().archive_status.unwrap_or(201))
    }

    async fn unarchive_project(&self, project_id: u64) -> Result<u16> {
        self.record(Call::Unarchive(project_id));
        Ok(self.state.lock().unwrap().unarchive_status.unwrap_or(201))
    }

    async fn list_registry_repositories(&self, project_id: u64) -> Result<Vec<RegistryRepository>> {
        self.record(Call::ListRepositories(project_id));
        let state = self.state.lock().unwrap();
        Ok(state.repositories.get(&project_id).cloned().unwrap_or_default())
    }

    async fn list_repository_tags(&self, project_id: u64, repository_id: u64) -> Result<Vec<RegistryTag>> {
        self.record(Call::ListTags(project_id, repository_id));
        let state = self.state.lock().unwrap();
        if state.failing_tag_listings.contains(&repository_id) {
            return Err(status_error(
                format!("/projects/{}/registry/repositories/{}/tags", project_id, repository_id),
                500,
            ));
        }
        Ok(state.tags.get(&repository_id).cloned().unwrap_or_default())
    }

    async fn delete_repository(&self, project_id: u64, repository_id: u64) -> Result<()> {
        self.record(Call::DeleteRepository(project_id, repository_id));
        let mut state = self.state.lock().unwrap();
        if state.failing_deletes.contains(&repository_id) {
            return Err(status_error(
                format!("/projects/{}/registry/repositories/{}", project_id, repository_id),
                500,
            ));
        }
        if !state.keep_registries {
            if let Some(repositories) = state.repositories.get_mut(&project_id) {
                repositories.retain(|r| r.id != repository_id);
            }
        }
        Ok(())
    }

    async fn delete_repository_tag(&self, project_id: u64, repository_id: u64, tag: &str) -> Result<()> {
        self.record(Call::DeleteTag(project_id, repository_id, tag.to_string()));
        let mut state = self.state.lock().unwrap();
        match state.tags.get_mut(&repository_id) {
            Some(tags) if tags.iter().any(|t| t.name == tag) => {
                tags.retain(|t| t.name != tag);
                Ok(())
            }
            _ => Err(status_error(
                format!("/projects/{}/registry/repositories/{}/tags/{}", project_id, repository_id, tag),
                404,
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    Pull(String),
    Tag(String, String),
    Push(String),
}

#[derive(Default)]
struct EngineState {
    local: HashSet<String>,
    failing_pulls: HashSet<String>,
    failing_pushes: HashSet<String>,
    calls: Vec<EngineCall>,
    timeline: Option<Timeline>,
}

impl EngineState {
    fn record(&mut self, call: EngineCall) {
        if let Some(timeline) = &self.timeline {
            timeline.lock().unwrap().push(format!("{:?}", call));
        }
        self.calls.push(call);
    }
}

/// A container engine that only remembers what it was asked to do.
#[derive(Default)]
pub struct FakeEngine {
    state: Mutex<EngineState>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeline(self, timeline: Timeline) -> Self {
        self.state.lock().unwrap().timeline = Some(timeline);
        self
    }

    pub fn fail_pull(&self, reference: &str) {
        self.state.lock().unwrap().failing_pulls.insert(reference.to_string());
    }

    pub fn fail_push(&self, reference: &str) {
        self.state.lock().unwrap().failing_pushes.insert(reference.to_string());
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn pushed(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                EngineCall::Push(reference) => Some(reference),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl ContainerEngine for FakeEngine {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn pull(&self, reference: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.record(EngineCall::Pull(reference.to_string()));
        if state.failing_pulls.contains(reference) {
            return Err(MigraptorError::Engine {
                message: format!("manifest for {} not found", reference),
            });
        }
        state.local.insert(reference.to_string());
        Ok(())
    }

    async fn tag(&self, source: &str, target: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.record(EngineCall::Tag(source.to_string(), target.to_string()));
        if !state.local.contains(source) {
            return Err(MigraptorError::Engine {
                message: format!("No such image: {}", source),
            });
        }
        state.local.insert(target.to_string());
        Ok(())
    }

    async fn push(&self, reference: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.record(EngineCall::Push(reference.to_string()));
        if state.failing_pushes.contains(reference) {
            return Err(MigraptorError::Engine {
                message: format!("denied: push to {}", reference),
            });
        }
        Ok(())
    }
}
